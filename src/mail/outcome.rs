//! Results of best-effort side effects.

use serde::Serialize;

/// What happened to a side effect that must not fail its primary operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SideEffect {
    /// Not attempted (no recipient configured, nothing to send).
    Skipped,
    /// Sent to `count` recipients.
    Delivered { count: usize },
    Failed { reason: String },
}

impl SideEffect {
    pub fn delivered(&self) -> bool {
        matches!(self, SideEffect::Delivered { .. })
    }

    pub fn count(&self) -> usize {
        match self {
            SideEffect::Delivered { count } => *count,
            _ => 0,
        }
    }

    pub fn failure(&self) -> Option<&str> {
        match self {
            SideEffect::Failed { reason } => Some(reason),
            _ => None,
        }
    }
}

/// A primary outcome with the side effect that followed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithSideEffect<P> {
    pub primary: P,
    pub side_effect: SideEffect,
}

impl<P> WithSideEffect<P> {
    pub fn new(primary: P, side_effect: SideEffect) -> Self {
        Self {
            primary,
            side_effect,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        assert_eq!(SideEffect::Delivered { count: 3 }.count(), 3);
        assert!(!SideEffect::Skipped.delivered());
        let failed = SideEffect::Failed {
            reason: "timeout".to_string(),
        };
        assert_eq!(failed.failure(), Some("timeout"));
        assert_eq!(failed.count(), 0);
    }

    #[test]
    fn test_serializes_tagged() {
        let json = serde_json::to_value(SideEffect::Delivered { count: 2 }).unwrap();
        assert_eq!(json, serde_json::json!({"status": "delivered", "count": 2}));
    }
}
