//! Configuration access port trait.

use crate::domain::error::RuletraderError;

/// Typed lookups over `[section] key = value` configuration.
///
/// The numeric getter falls back to `default` when the key is
/// missing or unparseable; validation reports those cases separately.
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_double(&self, section: &str, key: &str, default: f64) -> f64;

    /// A non-empty, trimmed string value or `ConfigMissing`.
    fn require_string(&self, section: &str, key: &str) -> Result<String, RuletraderError> {
        self.get_string(section, key)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| RuletraderError::ConfigMissing {
                section: section.to_string(),
                key: key.to_string(),
            })
    }
}
