use serde::Deserialize;

use crate::error::ReconError;
use crate::matcher::MatchPolicy;

pub const DEFAULT_WINDOW_DAYS: u32 = 3;
pub const MAX_WINDOW_DAYS: u32 = 366;
pub const DEFAULT_PRODUCT: &str = "Belema";
pub const DEFAULT_CONFIDENTIALITY: &str = "Confidential: do not distribute.";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Reconciliation settings. Every section is optional; an empty file is
/// equivalent to `ReconConfig::default()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub evidence: EvidenceConfig,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            matching: MatchingConfig::default(),
            evidence: EvidenceConfig::default(),
        }
    }
}

fn default_name() -> String {
    "default".into()
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchingConfig {
    #[serde(default = "default_window_days")]
    pub window_days: u32,
    /// Brand keywords looked for in bank descriptions.
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self { window_days: default_window_days(), keywords: default_keywords() }
    }
}

fn default_window_days() -> u32 {
    DEFAULT_WINDOW_DAYS
}

fn default_keywords() -> Vec<String> {
    vec!["SHOPIFY".into()]
}

// ---------------------------------------------------------------------------
// Evidence
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EvidenceConfig {
    #[serde(default = "default_product")]
    pub product: String,
    #[serde(default = "default_confidentiality")]
    pub confidentiality: String,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self { product: default_product(), confidentiality: default_confidentiality() }
    }
}

fn default_product() -> String {
    DEFAULT_PRODUCT.into()
}

fn default_confidentiality() -> String {
    DEFAULT_CONFIDENTIALITY.into()
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.matching.window_days > MAX_WINDOW_DAYS {
            return Err(ReconError::ConfigValidation(format!(
                "matching.window_days must be at most {MAX_WINDOW_DAYS}, got {}",
                self.matching.window_days
            )));
        }

        // Keywords become part of reason codes, so keep them code-safe.
        for kw in &self.matching.keywords {
            if kw.is_empty() || !kw.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(ReconError::ConfigValidation(format!(
                    "matching.keywords: '{kw}' must be non-empty ASCII letters, digits or '_'"
                )));
            }
        }

        if self.evidence.product.trim().is_empty() {
            return Err(ReconError::ConfigValidation("evidence.product must not be empty".into()));
        }

        Ok(())
    }

    pub fn match_policy(&self) -> MatchPolicy {
        MatchPolicy::new(self.matching.window_days, &self.matching.keywords)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
name = "Acme monthly close"

[matching]
window_days = 5
keywords = ["SHOPIFY", "stripe"]

[evidence]
product = "Belema"
confidentiality = "Internal only."
"#;

    #[test]
    fn parse_full() {
        let config = ReconConfig::from_toml(FULL).unwrap();
        assert_eq!(config.name, "Acme monthly close");
        assert_eq!(config.matching.window_days, 5);
        assert_eq!(config.matching.keywords, vec!["SHOPIFY", "stripe"]);
        assert_eq!(config.evidence.confidentiality, "Internal only.");
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = ReconConfig::from_toml("").unwrap();
        assert_eq!(config.matching.window_days, 3);
        assert_eq!(config.matching.keywords, vec!["SHOPIFY"]);
        assert_eq!(config.evidence.product, "Belema");
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config = ReconConfig::from_toml("[matching]\nwindow_days = 0\n").unwrap();
        assert_eq!(config.matching.window_days, 0);
        assert_eq!(config.matching.keywords, vec!["SHOPIFY"]);
    }

    #[test]
    fn reject_oversized_window() {
        let err = ReconConfig::from_toml("[matching]\nwindow_days = 400\n").unwrap_err();
        assert_eq!(err.code(), "CONFIG_INVALID");
    }

    #[test]
    fn reject_keyword_with_spaces() {
        let err = ReconConfig::from_toml("[matching]\nkeywords = [\"PAY PAL\"]\n").unwrap_err();
        assert!(matches!(err, ReconError::ConfigValidation(_)));
    }

    #[test]
    fn reject_unknown_field() {
        let err = ReconConfig::from_toml("[matching]\nwindow = 3\n").unwrap_err();
        assert!(matches!(err, ReconError::ConfigParse(_)), "typo should fail deserialization");
    }

    #[test]
    fn reject_negative_window() {
        assert!(ReconConfig::from_toml("[matching]\nwindow_days = -1\n").is_err());
    }

    #[test]
    fn policy_upper_cases_keywords() {
        let policy = ReconConfig::from_toml(FULL).unwrap().match_policy();
        assert_eq!(policy.window_days, 5);
        assert_eq!(policy.keywords, vec!["SHOPIFY", "STRIPE"]);
    }
}
