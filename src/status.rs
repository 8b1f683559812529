//! Canonical payment status vocabulary.
//!
//! Every vendor-specific status string is normalized here so the rest of the
//! system reasons only in terms of `pending` / `paid` / `failed`. Genuinely
//! novel vendor states pass through unchanged and are treated as non-terminal.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanonicalStatus {
    Pending,
    Paid,
    Failed,
    /// Unrecognized vendor status, passed through verbatim.
    #[serde(untagged)]
    Other(String),
}

impl CanonicalStatus {
    /// Map a vendor status string onto the canonical set.
    pub fn normalize(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "succeeded" | "successful" | "completed" | "paid" => Self::Paid,
            "failed" | "cancelled" | "canceled" => Self::Failed,
            "pending" => Self::Pending,
            _ => Self::Other(raw.to_string()),
        }
    }

    /// `paid` and `failed` are terminal: once reached they must never regress
    /// to `pending`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid | Self::Failed)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for CanonicalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_success_variants_normalize_to_paid() {
        for raw in ["succeeded", "successful", "completed", "paid", "SUCCEEDED"] {
            assert_eq!(CanonicalStatus::normalize(raw), CanonicalStatus::Paid);
        }
    }

    #[test]
    fn vendor_failure_variants_normalize_to_failed() {
        for raw in ["failed", "cancelled", "canceled", "Cancelled"] {
            assert_eq!(CanonicalStatus::normalize(raw), CanonicalStatus::Failed);
        }
    }

    #[test]
    fn pending_stays_pending() {
        assert_eq!(CanonicalStatus::normalize("pending"), CanonicalStatus::Pending);
    }

    #[test]
    fn unknown_status_passes_through_unchanged_and_is_not_terminal() {
        let status = CanonicalStatus::normalize("requires_action");
        assert_eq!(status, CanonicalStatus::Other("requires_action".to_string()));
        assert!(!status.is_terminal());
    }

    #[test]
    fn normalization_is_deterministic() {
        assert_eq!(
            CanonicalStatus::normalize("succeeded"),
            CanonicalStatus::normalize("succeeded")
        );
    }

    #[test]
    fn only_paid_and_failed_are_terminal() {
        assert!(CanonicalStatus::Paid.is_terminal());
        assert!(CanonicalStatus::Failed.is_terminal());
        assert!(!CanonicalStatus::Pending.is_terminal());
    }

    #[test]
    fn serializes_to_lowercase_strings() {
        assert_eq!(serde_json::to_value(CanonicalStatus::Paid).unwrap(), "paid");
        assert_eq!(
            serde_json::to_value(CanonicalStatus::Other("refunded".into())).unwrap(),
            "refunded"
        );
        let parsed: CanonicalStatus = serde_json::from_value("failed".into()).unwrap();
        assert_eq!(parsed, CanonicalStatus::Failed);
    }
}
