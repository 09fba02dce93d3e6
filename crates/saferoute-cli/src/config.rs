//! CLI configuration from environment.

use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub engine_url: String,
    pub engine_key: Option<String>,
    pub timeout_secs: u64,
    pub safe_mode: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            engine_url: env::var("SAFEROUTE_ENGINE_URL")
                .unwrap_or_else(|_| "http://localhost:8989".to_string()),
            engine_key: env::var("SAFEROUTE_ENGINE_KEY")
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
            timeout_secs: env::var("SAFEROUTE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            safe_mode: env::var("SAFEROUTE_SAFE_MODE")
                .ok()
                .and_then(|s| parse_flag(&s))
                .unwrap_or(true),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_parse_loosely() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" off "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
