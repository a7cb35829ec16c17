use std::collections::HashMap;
use std::fmt;

use crate::error::{LogError, Result};
use crate::world::CellState;

/// Kind tag stored alongside every subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubjectKind {
    Cell,
    Entity,
}

impl SubjectKind {
    pub fn tag(&self) -> &'static str {
        match self {
            SubjectKind::Cell => "CELL",
            SubjectKind::Entity => "ENTITY",
        }
    }
}

impl fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Before and after state of one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellSubject {
    pub from: CellState,
    pub to: CellState,
}

/// Before and after state of an entity, kept in its serialized form.
///
/// An empty side means the entity did not exist (spawn or removal).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySubject {
    pub from: String,
    pub to: String,
}

/// What changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    Cell(CellSubject),
    Entity(EntitySubject),
}

impl Subject {
    pub fn cell(from: impl Into<CellState>, to: impl Into<CellState>) -> Self {
        Subject::Cell(CellSubject {
            from: from.into(),
            to: to.into(),
        })
    }

    pub fn entity(from: impl Into<String>, to: impl Into<String>) -> Self {
        Subject::Entity(EntitySubject {
            from: from.into(),
            to: to.into(),
        })
    }

    pub fn kind(&self) -> SubjectKind {
        match self {
            Subject::Cell(_) => SubjectKind::Cell,
            Subject::Entity(_) => SubjectKind::Entity,
        }
    }

    pub fn serialize_from(&self) -> String {
        match self {
            Subject::Cell(cell) => cell.from.as_str().to_string(),
            Subject::Entity(entity) => entity.from.clone(),
        }
    }

    pub fn serialize_to(&self) -> String {
        match self {
            Subject::Cell(cell) => cell.to.as_str().to_string(),
            Subject::Entity(entity) => entity.to.clone(),
        }
    }

    /// Cell-addressable subjects can be written back into the world.
    pub fn is_cell(&self) -> bool {
        matches!(self, Subject::Cell(_))
    }

    pub fn as_cell(&self) -> Option<&CellSubject> {
        match self {
            Subject::Cell(cell) => Some(cell),
            Subject::Entity(_) => None,
        }
    }

    /// The same transition run backwards.
    pub fn inverted(&self) -> Subject {
        match self {
            Subject::Cell(cell) => Subject::Cell(CellSubject {
                from: cell.to.clone(),
                to: cell.from.clone(),
            }),
            Subject::Entity(entity) => Subject::Entity(EntitySubject {
                from: entity.to.clone(),
                to: entity.from.clone(),
            }),
        }
    }
}

/// Rebuilds a subject from its stored `from` and `to` strings.
pub type SubjectFactory = fn(&str, &str) -> Result<Subject>;

fn cell_factory(from: &str, to: &str) -> Result<Subject> {
    if from.is_empty() || to.is_empty() {
        return Err(LogError::DataCorruption(
            "cell subject with empty state".to_string(),
        ));
    }
    Ok(Subject::cell(from, to))
}

fn entity_factory(from: &str, to: &str) -> Result<Subject> {
    Ok(Subject::entity(from, to))
}

/// Maps stored kind tags to reconstruction functions.
#[derive(Debug, Clone)]
pub struct SubjectRegistry {
    factories: HashMap<String, SubjectFactory>,
}

impl SubjectRegistry {
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry knowing `CELL` and `ENTITY`.
    pub fn with_builtin_kinds() -> Self {
        let mut registry = Self::empty();
        registry.register(SubjectKind::Cell.tag(), cell_factory);
        registry.register(SubjectKind::Entity.tag(), entity_factory);
        registry
    }

    /// Registers or replaces the factory for a kind tag.
    pub fn register(&mut self, tag: &str, factory: SubjectFactory) {
        self.factories.insert(tag.to_string(), factory);
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.factories.contains_key(tag)
    }

    /// Rebuilds a subject. Unknown tags yield [`LogError::UnknownSubjectKind`],
    /// which readers treat as "skip this row".
    pub fn reconstruct(&self, tag: &str, from: &str, to: &str) -> Result<Subject> {
        let factory = self
            .factories
            .get(tag)
            .ok_or_else(|| LogError::UnknownSubjectKind {
                kind: tag.to_string(),
            })?;
        factory(from, to)
    }
}

impl Default for SubjectRegistry {
    fn default() -> Self {
        Self::with_builtin_kinds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconstruct_builtin_kinds() {
        let registry = SubjectRegistry::with_builtin_kinds();
        let cell = registry.reconstruct("CELL", "stone", "air").unwrap();
        assert_eq!(cell, Subject::cell("stone", "air"));
        assert_eq!(cell.kind(), SubjectKind::Cell);

        let entity = registry.reconstruct("ENTITY", "", "zombie").unwrap();
        assert!(!entity.is_cell());
        assert_eq!(entity.serialize_to(), "zombie");
    }

    #[test]
    fn test_unknown_kind_signals_skip() {
        let registry = SubjectRegistry::with_builtin_kinds();
        let err = registry.reconstruct("BIOME", "plains", "desert").unwrap_err();
        assert!(matches!(err, LogError::UnknownSubjectKind { kind } if kind == "BIOME"));
    }

    #[test]
    fn test_register_custom_kind() {
        let mut registry = SubjectRegistry::empty();
        assert!(!registry.contains("CELL"));
        registry.register("LEGACY_BLOCK", |from, to| Ok(Subject::cell(from, to)));
        assert!(registry.reconstruct("LEGACY_BLOCK", "dirt", "grass").unwrap().is_cell());
    }

    #[test]
    fn test_inverted_swaps_sides() {
        let subject = Subject::cell("stone", "air");
        let inverted = subject.inverted();
        assert_eq!(inverted.serialize_from(), "air");
        assert_eq!(inverted.serialize_to(), "stone");
        assert_eq!(inverted.inverted(), subject);
    }

    #[test]
    fn test_empty_cell_state_rejected() {
        let registry = SubjectRegistry::with_builtin_kinds();
        assert!(registry.reconstruct("CELL", "", "stone").is_err());
    }
}
