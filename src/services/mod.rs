mod cache;
mod credentials;
mod executor;
pub mod locale;
mod rate_limit;
pub mod redact;
pub mod transform;

#[cfg(test)]
mod tests;

pub use cache::ResponseCache;
pub use credentials::{Credential, CredentialBroker};
pub use executor::{
    HttpUpstream, RawResponse, RequestExecutor, Upstream, UpstreamBody, UpstreamRequest, Verb,
};
pub use rate_limit::{RateDecision, RateLimiter};
