//! Maps keyword-platform criterion ids (or plain ISO codes) onto the
//! `lr`/`cr` restricts understood by the web-search API.

pub const DEFAULT_LANGUAGE_ID: &str = "1000";
pub const DEFAULT_REGION_ID: &str = "2840";

const LANGUAGES: &[(&str, &str)] = &[
    ("1000", "en"),
    ("1001", "de"),
    ("1002", "fr"),
    ("1003", "es"),
    ("1004", "it"),
    ("1005", "ja"),
    ("1009", "da"),
    ("1010", "nl"),
    ("1014", "pt"),
    ("1015", "sv"),
    ("1031", "ru"),
];

const REGIONS: &[(&str, &str)] = &[
    ("2036", "AU"),
    ("2076", "BR"),
    ("2124", "CA"),
    ("2250", "FR"),
    ("2276", "DE"),
    ("2356", "IN"),
    ("2380", "IT"),
    ("2392", "JP"),
    ("2484", "MX"),
    ("2528", "NL"),
    ("2724", "ES"),
    ("2826", "GB"),
    ("2840", "US"),
];

/// `lang_xx` for a language criterion id or a two-letter code.
pub fn language_restrict(id: &str) -> Option<String> {
    let id = id.trim();
    let code = lookup(LANGUAGES, id).map(str::to_string).or_else(|| {
        is_alpha_code(id).then(|| id.to_ascii_lowercase())
    })?;
    Some(format!("lang_{code}"))
}

/// `countryXX` for a geo-target criterion id or a two-letter code.
pub fn country_restrict(id: &str) -> Option<String> {
    let id = id.trim();
    let code = lookup(REGIONS, id).map(str::to_string).or_else(|| {
        is_alpha_code(id).then(|| id.to_ascii_uppercase())
    })?;
    Some(format!("country{code}"))
}

fn lookup<'a>(table: &'a [(&str, &'a str)], id: &str) -> Option<&'a str> {
    table.iter().find(|(k, _)| *k == id).map(|(_, v)| *v)
}

fn is_alpha_code(id: &str) -> bool {
    id.len() == 2 && id.chars().all(|c| c.is_ascii_alphabetic())
}

/// Criterion ids end up in resource names, so only digits are accepted.
pub fn is_criterion_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= 12 && id.chars().all(|c| c.is_ascii_digit())
}
