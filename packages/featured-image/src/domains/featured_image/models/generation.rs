use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::MediaRef;

/// Per-post generation state.
///
/// `None -> Processing -> Generated | Failed`; only a manual regenerate
/// moves a post back to `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    #[default]
    None,
    Processing,
    Generated,
    Failed,
}

impl GenerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationStatus::None => "none",
            GenerationStatus::Processing => "processing",
            GenerationStatus::Generated => "generated",
            GenerationStatus::Failed => "failed",
        }
    }

    /// Whether a run may claim a post in this state
    pub fn is_claimable(&self) -> bool {
        matches!(self, GenerationStatus::None | GenerationStatus::Failed)
    }
}

impl std::fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable generation metadata stored alongside a post.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationMeta {
    #[serde(default)]
    pub status: GenerationStatus,
    #[serde(default)]
    pub media_ref: Option<MediaRef>,
    /// Epoch seconds on the wire
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub generated_at: Option<DateTime<Utc>>,
}

impl GenerationMeta {
    pub fn generated(media_ref: MediaRef, at: DateTime<Utc>) -> Self {
        Self {
            status: GenerationStatus::Generated,
            media_ref: Some(media_ref),
            generated_at: Some(at),
        }
    }
}

/// Result of trying to move a post into `Processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed,
    AlreadyProcessing,
    AlreadyGenerated,
    NotFound,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_metadata_reads_as_none() {
        let meta: GenerationMeta = serde_json::from_str("{}").unwrap();
        assert_eq!(meta.status, GenerationStatus::None);
        assert!(meta.media_ref.is_none());
        assert!(meta.generated_at.is_none());
    }

    #[test]
    fn test_generated_at_is_epoch_seconds() {
        let at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let meta = GenerationMeta::generated(MediaRef::new("2025/01/a.png"), at);
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["status"], "generated");
        assert_eq!(json["generated_at"], 1_700_000_000);
        assert_eq!(json["media_ref"], "2025/01/a.png");
    }

    #[test]
    fn test_only_none_and_failed_are_claimable() {
        assert!(GenerationStatus::None.is_claimable());
        assert!(GenerationStatus::Failed.is_claimable());
        assert!(!GenerationStatus::Processing.is_claimable());
        assert!(!GenerationStatus::Generated.is_claimable());
    }
}
