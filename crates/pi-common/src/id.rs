//! Install identity types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Install ID for tracking a single pipeline run.
///
/// Format: `inst-<date>-<time>-<random>`
/// Example: `inst-20260115-143022-abc123`
///
/// Also names the per-install scratch directory under `work/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstallId(pub String);

impl InstallId {
    /// Generate a new install ID.
    pub fn new() -> Self {
        let now = chrono::Utc::now();
        let random: String = uuid::Uuid::new_v4()
            .to_string()
            .chars()
            .take(6)
            .collect();
        InstallId(format!("inst-{}-{}", now.format("%Y%m%d-%H%M%S"), random))
    }

    /// Parse an existing install ID string.
    pub fn parse(s: &str) -> Option<Self> {
        if s.starts_with("inst-") && s.len() > 20 {
            Some(InstallId(s.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for InstallId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InstallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_id_format() {
        let id = InstallId::new();
        assert!(id.0.starts_with("inst-"));
        assert!(id.0.len() > 20);
        assert!(!id.as_str().contains('/'));
    }

    #[test]
    fn test_install_id_parse() {
        assert!(InstallId::parse("inst-20260115-143022-abc123").is_some());
        assert!(InstallId::parse("sess-20260115-143022-abc123").is_none());
        assert!(InstallId::parse("inst-short").is_none());
    }

    #[test]
    fn test_install_ids_are_unique() {
        assert_ne!(InstallId::new(), InstallId::new());
    }
}
