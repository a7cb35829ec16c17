use std::collections::HashSet;
use std::fmt;

use crate::error::{LogError, Result};

/// Longest stored source name.
pub const MAX_SOURCE_NAME_LEN: usize = 36;

const ENVIRONMENT_PREFIX: char = '#';

const BUILTIN_ENVIRONMENT: [&str; 9] = [
    "fire",
    "lava",
    "water",
    "explosion",
    "growth",
    "decay",
    "weather",
    "piston",
    "console",
];

/// Who or what caused a change.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChangeSource {
    /// A player or operator, identified by name or UUID
    Actor(String),
    /// A world process such as fire spread or an explosion
    Environment(String),
}

impl ChangeSource {
    /// Validated actor source.
    pub fn actor(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        if name.starts_with(ENVIRONMENT_PREFIX) {
            return Err(LogError::InvalidInput(format!(
                "actor name '{}' may not start with '{}'",
                name, ENVIRONMENT_PREFIX
            )));
        }
        Ok(ChangeSource::Actor(name))
    }

    /// Validated environment source; `name` is given without the `#` prefix.
    pub fn environment(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        if name.len() + 1 > MAX_SOURCE_NAME_LEN {
            return Err(LogError::InvalidInput(format!(
                "environment name '{}' is too long",
                name
            )));
        }
        Ok(ChangeSource::Environment(name))
    }

    /// Name as stored in the log.
    pub fn stored_name(&self) -> String {
        match self {
            ChangeSource::Actor(name) => name.clone(),
            ChangeSource::Environment(name) => format!("{}{}", ENVIRONMENT_PREFIX, name),
        }
    }

    pub fn is_actor(&self) -> bool {
        matches!(self, ChangeSource::Actor(_))
    }
}

impl fmt::Display for ChangeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeSource::Actor(name) => f.write_str(name),
            ChangeSource::Environment(name) => write!(f, "{}{}", ENVIRONMENT_PREFIX, name),
        }
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(LogError::InvalidInput("source name is empty".to_string()));
    }
    if name.len() > MAX_SOURCE_NAME_LEN {
        return Err(LogError::InvalidInput(format!(
            "source name '{}' exceeds {} bytes",
            name, MAX_SOURCE_NAME_LEN
        )));
    }
    if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(LogError::InvalidInput(format!(
            "source name '{}' contains whitespace",
            name
        )));
    }
    Ok(())
}

/// Resolves stored source names back into sources.
///
/// Actor names resolve whenever they are well-formed; environment names only
/// when registered.
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    environment: HashSet<String>,
}

impl SourceRegistry {
    /// Registry with no environment sources.
    pub fn empty() -> Self {
        Self {
            environment: HashSet::new(),
        }
    }

    /// Registry knowing the built-in environment sources.
    pub fn with_builtin_sources() -> Self {
        let mut registry = Self::empty();
        for name in BUILTIN_ENVIRONMENT {
            registry.environment.insert(name.to_string());
        }
        registry
    }

    /// Registers an environment source name (without `#`).
    pub fn register_environment(&mut self, name: &str) -> Result<()> {
        let source = ChangeSource::environment(name)?;
        if let ChangeSource::Environment(name) = source {
            self.environment.insert(name);
        }
        Ok(())
    }

    /// Looks up a stored name. `None` marks the row as malformed.
    pub fn resolve(&self, stored: &str) -> Option<ChangeSource> {
        match stored.strip_prefix(ENVIRONMENT_PREFIX) {
            Some(name) if self.environment.contains(name) => {
                Some(ChangeSource::Environment(name.to_string()))
            }
            Some(_) => None,
            None => ChangeSource::actor(stored).ok(),
        }
    }

    pub fn environment_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.environment.iter().cloned().collect();
        names.sort();
        names
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::with_builtin_sources()
    }
}
