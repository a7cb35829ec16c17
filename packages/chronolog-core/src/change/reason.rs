use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LogError;

/// Why a cell or entity changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeReason {
    Break,
    Place,
    Explode,
    Burn,
    Decay,
    Grow,
    Spread,
    Fade,
    Form,
    Flow,
    Interact,
    Spawn,
    Death,
    /// Written back by a restoration
    Restore,
    Unknown,
}

impl ChangeReason {
    pub const ALL: [ChangeReason; 15] = [
        ChangeReason::Break,
        ChangeReason::Place,
        ChangeReason::Explode,
        ChangeReason::Burn,
        ChangeReason::Decay,
        ChangeReason::Grow,
        ChangeReason::Spread,
        ChangeReason::Fade,
        ChangeReason::Form,
        ChangeReason::Flow,
        ChangeReason::Interact,
        ChangeReason::Spawn,
        ChangeReason::Death,
        ChangeReason::Restore,
        ChangeReason::Unknown,
    ];

    /// Stored reason code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeReason::Break => "BREAK",
            ChangeReason::Place => "PLACE",
            ChangeReason::Explode => "EXPLODE",
            ChangeReason::Burn => "BURN",
            ChangeReason::Decay => "DECAY",
            ChangeReason::Grow => "GROW",
            ChangeReason::Spread => "SPREAD",
            ChangeReason::Fade => "FADE",
            ChangeReason::Form => "FORM",
            ChangeReason::Flow => "FLOW",
            ChangeReason::Interact => "INTERACT",
            ChangeReason::Spawn => "SPAWN",
            ChangeReason::Death => "DEATH",
            ChangeReason::Restore => "RESTORE",
            ChangeReason::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeReason {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChangeReason::ALL
            .iter()
            .copied()
            .find(|reason| reason.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| LogError::UnknownReason {
                reason: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_parse_back() {
        for reason in ChangeReason::ALL {
            assert_eq!(reason.as_str().parse::<ChangeReason>().unwrap(), reason);
        }
        assert_eq!("restore".parse::<ChangeReason>().unwrap(), ChangeReason::Restore);
    }

    #[test]
    fn test_unknown_code() {
        let err = "TELEPORT".parse::<ChangeReason>().unwrap_err();
        assert!(matches!(err, LogError::UnknownReason { reason } if reason == "TELEPORT"));
    }

    #[test]
    fn test_serde_uses_codes() {
        let json = serde_json::to_string(&ChangeReason::Restore).unwrap();
        assert_eq!(json, "\"RESTORE\"");
    }
}
