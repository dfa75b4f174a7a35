//! Keeping secrets out of echoes and logs.

use secrecy::{ExposeSecret, SecretString};

pub const REDACTED: &str = "[REDACTED]";

/// Rebuilds a query string for diagnostics. Values of `secret_params` are
/// replaced with [`REDACTED`], and any remaining occurrence of a secret value
/// (raw or percent-encoded, e.g. echoed back through the search term) is
/// scrubbed as well.
pub fn params_used(
    params: &[(String, String)],
    secret_params: &[&str],
    secrets: &[&SecretString],
) -> String {
    let joined = params
        .iter()
        .map(|(name, value)| {
            if secret_params.contains(&name.as_str()) {
                format!("{}={}", urlencoding::encode(name), REDACTED)
            } else {
                format!("{}={}", urlencoding::encode(name), urlencoding::encode(value))
            }
        })
        .collect::<Vec<_>>()
        .join("&");
    scrub(&joined, secrets)
}

pub fn scrub(text: &str, secrets: &[&SecretString]) -> String {
    let mut result = text.to_string();
    for secret in secrets {
        let raw = secret.expose_secret();
        if raw.is_empty() {
            continue;
        }
        result = result.replace(raw, REDACTED);
        let encoded = urlencoding::encode(raw);
        if encoded != raw {
            result = result.replace(&*encoded, REDACTED);
        }
    }
    result
}

/// Last `n` characters of a secret prefixed with asterisks, for startup logs.
pub fn mask_tail(secret: &SecretString, n: usize) -> String {
    let raw = secret.expose_secret();
    let count = raw.chars().count();
    if count <= n {
        return "*".repeat(count.max(4));
    }
    let tail: String = raw.chars().skip(count - n).collect();
    format!("****{tail}")
}
