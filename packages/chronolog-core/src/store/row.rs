use serde::{Deserialize, Serialize};

use crate::change::ChangeRecord;
use crate::error::{LogError, Result};
use crate::region::BlockPos;

/// Longest world id the log accepts.
pub const MAX_WORLD_LEN: usize = 36;
/// Longest subject kind tag the log accepts.
pub const MAX_KIND_LEN: usize = 16;

/// Logical row of the durable schema.
///
/// `event_id` is assigned by the row store when the row's batch commits;
/// rows built from records carry `0` until then.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRow {
    pub event_id: u64,
    pub world: String,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub timestamp: i64,
    pub source: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub from: String,
    pub to: String,
    pub reason: String,
}

impl StoredRow {
    /// Encodes a record, rejecting values the schema cannot hold.
    pub fn from_record(record: &ChangeRecord) -> Result<Self> {
        let world = record.world();
        if world.is_empty() || world.len() > MAX_WORLD_LEN {
            return Err(LogError::InvalidInput(format!(
                "world id '{}' must be 1-{} bytes",
                world, MAX_WORLD_LEN
            )));
        }
        if world.chars().any(char::is_control) {
            return Err(LogError::InvalidInput(format!(
                "world id '{}' contains control characters",
                world.escape_debug()
            )));
        }
        let subject = record.subject();
        let kind = subject.kind().tag();
        if kind.len() > MAX_KIND_LEN {
            return Err(LogError::InvalidInput(format!(
                "subject kind '{}' exceeds {} bytes",
                kind, MAX_KIND_LEN
            )));
        }
        let pos = record.pos();
        Ok(Self {
            event_id: 0,
            world: world.to_string(),
            x: pos.x,
            y: pos.y,
            z: pos.z,
            timestamp: record.timestamp(),
            source: record.source().stored_name(),
            kind: kind.to_string(),
            from: subject.serialize_from(),
            to: subject.serialize_to(),
            reason: record.reason().as_str().to_string(),
        })
    }

    pub fn pos(&self) -> BlockPos {
        BlockPos::new(self.x, self.y, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{ChangeReason, ChangeSource, Subject};

    #[test]
    fn test_encode_record() {
        let record = ChangeRecord::new(
            "overworld",
            BlockPos::new(4, 70, -3),
            1_700_000_000_000,
            ChangeSource::environment("fire").unwrap(),
            ChangeReason::Burn,
            Subject::cell("oak_planks", "air"),
        );
        let row = StoredRow::from_record(&record).unwrap();
        assert_eq!(row.event_id, 0);
        assert_eq!(row.source, "#fire");
        assert_eq!(row.kind, "CELL");
        assert_eq!(row.reason, "BURN");
        assert_eq!(row.pos(), BlockPos::new(4, 70, -3));

        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["type"], "CELL");
    }

    #[test]
    fn test_world_too_long() {
        let record = ChangeRecord::new(
            "w".repeat(MAX_WORLD_LEN + 1),
            BlockPos::new(0, 0, 0),
            0,
            ChangeSource::actor("admin").unwrap(),
            ChangeReason::Place,
            Subject::cell("air", "stone"),
        );
        assert!(matches!(
            StoredRow::from_record(&record),
            Err(LogError::InvalidInput(_))
        ));
    }
}
