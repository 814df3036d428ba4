/// Shared constants for extraction and cleaning.

// Source names as they appear on the wire and on the CLI
pub const POWERBI: &str = "powerbi";
pub const TABLEAU: &str = "tableau";

// Environment variables holding pre-issued bearer tokens
pub const POWERBI_TOKEN_ENV: &str = "POWERBI_ACCESS_TOKEN";
pub const TABLEAU_TOKEN_ENV: &str = "TABLEAU_ACCESS_TOKEN";

pub const DEFAULT_CONFIG_PATH: &str = "dashboard.toml";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_USER_AGENT: &str = "dashboard_unifier/0.1";
pub const DEFAULT_POWERBI_API_BASE: &str = "https://api.powerbi.com";
pub const DEFAULT_TABLEAU_API_VERSION: &str = "3.21";
pub const DEFAULT_OCR_LANG: &str = "eng";

/// Share of non-null values that must match a date or numeric pattern before
/// a whole column is converted.
pub const TYPE_CONVERSION_THRESHOLD: f64 = 0.8;

/// Share of values containing `%` before a column is treated as percentages.
pub const PERCENT_THRESHOLD: f64 = 0.5;

/// Default semantic alias table: canonical column → aliases.
pub fn default_semantic_map() -> Vec<(&'static str, Vec<&'static str>)> {
    vec![
        ("revenue_usd", vec!["revenue_$", "sales_usd", "total_sales"]),
        ("date", vec!["order_date", "created_on", "timestamp"]),
    ]
}

/// Default categorical synonyms: value → canonical value.
pub fn default_synonym_map() -> Vec<(&'static str, &'static str)> {
    vec![
        ("yes", "affirmative"),
        ("no", "negative"),
        ("n/a", "not_applicable"),
    ]
}
