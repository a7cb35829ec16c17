use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{LogError, Result};
use crate::region::BlockPos;
use crate::world::CellState;

use super::reason::ChangeReason;
use super::source::ChangeSource;
use super::subject::Subject;

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Immutable description of one state transition at one coordinate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    world: String,
    pos: BlockPos,
    timestamp: i64,
    source: ChangeSource,
    reason: ChangeReason,
    subject: Subject,
}

impl ChangeRecord {
    pub fn new(
        world: impl Into<String>,
        pos: BlockPos,
        timestamp: i64,
        source: ChangeSource,
        reason: ChangeReason,
        subject: Subject,
    ) -> Self {
        Self {
            world: world.into(),
            pos,
            timestamp,
            source,
            reason,
            subject,
        }
    }

    pub fn builder() -> ChangeRecordBuilder {
        ChangeRecordBuilder::default()
    }

    pub fn world(&self) -> &str {
        &self.world
    }

    pub fn pos(&self) -> BlockPos {
        self.pos
    }

    /// Epoch milliseconds.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn source(&self) -> &ChangeSource {
        &self.source
    }

    pub fn reason(&self) -> ChangeReason {
        self.reason
    }

    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    /// Record describing this change being undone by `source` at `timestamp`,
    /// where `overwritten` is the live state the restore replaced.
    ///
    /// Only cell changes can be restored; other subjects yield `None`.
    pub fn restored_by(
        &self,
        source: &ChangeSource,
        timestamp: i64,
        overwritten: CellState,
    ) -> Option<ChangeRecord> {
        let cell = self.subject.as_cell()?;
        Some(ChangeRecord {
            world: self.world.clone(),
            pos: self.pos,
            timestamp,
            source: source.clone(),
            reason: ChangeReason::Restore,
            subject: Subject::cell(overwritten, cell.from.clone()),
        })
    }
}

/// Step-by-step construction of a [`ChangeRecord`].
///
/// The timestamp defaults to the time of [`build`](Self::build).
#[derive(Debug, Default)]
pub struct ChangeRecordBuilder {
    location: Option<(String, BlockPos)>,
    timestamp: Option<i64>,
    source: Option<ChangeSource>,
    reason: Option<ChangeReason>,
    subject: Option<Subject>,
}

impl ChangeRecordBuilder {
    pub fn at(mut self, world: impl Into<String>, pos: BlockPos) -> Self {
        self.location = Some((world.into(), pos));
        self
    }

    pub fn at_time(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_source(mut self, source: ChangeSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_reason(mut self, reason: ChangeReason) -> Self {
        self.reason = Some(reason);
        self
    }

    pub fn with_subject(mut self, subject: Subject) -> Self {
        self.subject = Some(subject);
        self
    }

    pub fn build(self) -> Result<ChangeRecord> {
        let (world, pos) = self
            .location
            .ok_or(LogError::MissingField { field: "location" })?;
        if world.is_empty() {
            return Err(LogError::InvalidInput("world id is empty".to_string()));
        }
        Ok(ChangeRecord {
            world,
            pos,
            timestamp: self.timestamp.unwrap_or_else(now_millis),
            source: self.source.ok_or(LogError::MissingField { field: "source" })?,
            reason: self.reason.ok_or(LogError::MissingField { field: "reason" })?,
            subject: self
                .subject
                .ok_or(LogError::MissingField { field: "subject" })?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> ChangeSource {
        ChangeSource::actor("admin").unwrap()
    }

    #[test]
    fn test_builder_requires_fields() {
        let err = ChangeRecord::builder()
            .at("overworld", BlockPos::new(0, 0, 0))
            .with_source(admin())
            .with_subject(Subject::cell("stone", "air"))
            .build()
            .unwrap_err();
        assert!(matches!(err, LogError::MissingField { field: "reason" }));
    }

    #[test]
    fn test_builder_defaults_timestamp() {
        let before = now_millis();
        let record = ChangeRecord::builder()
            .at("overworld", BlockPos::new(1, 2, 3))
            .with_source(admin())
            .with_reason(ChangeReason::Break)
            .with_subject(Subject::cell("stone", "air"))
            .build()
            .unwrap();
        assert!(record.timestamp() >= before);
        assert_eq!(record.pos(), BlockPos::new(1, 2, 3));
    }

    #[test]
    fn test_restored_by_uses_overwritten_state() {
        let record = ChangeRecord::new(
            "overworld",
            BlockPos::new(0, 0, 0),
            10,
            ChangeSource::environment("fire").unwrap(),
            ChangeReason::Burn,
            Subject::cell("oak_planks", "air"),
        );
        // Someone placed glass after the fire.
        let restored = record
            .restored_by(&admin(), 20, CellState::new("glass"))
            .unwrap();
        assert_eq!(restored.reason(), ChangeReason::Restore);
        assert_eq!(restored.timestamp(), 20);
        assert_eq!(restored.source(), &admin());
        assert_eq!(restored.subject().serialize_from(), "glass");
        assert_eq!(restored.subject().serialize_to(), "oak_planks");
    }

    #[test]
    fn test_entity_changes_are_not_restored() {
        let record = ChangeRecord::new(
            "overworld",
            BlockPos::new(0, 0, 0),
            10,
            ChangeSource::environment("explosion").unwrap(),
            ChangeReason::Death,
            Subject::entity("cow", ""),
        );
        assert!(record.restored_by(&admin(), 20, CellState::empty()).is_none());
    }
}
