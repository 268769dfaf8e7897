//! Identifier validation and the instance naming convention.
//!
//! Template names and caller ids end up inside administrative statements
//! (`RESTORE DATABASE [..]`, file paths in `N'..'` literals) where parameter
//! binding is not available, so both are restricted to an allow-list before
//! any name is derived from them.

use crate::{INSTANCE_SEPARATOR, MAX_IDENTIFIER_LEN, SNAPSHOT_SUFFIX};
use serde::Serialize;
use std::fmt;

/// A validated template name or caller id.
///
/// Allowed characters are ASCII letters, digits and `-`. The instance
/// separator `_` is excluded so that instance names stay injective.
#[derive(Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Validate a template name.
    pub fn template(value: &str) -> crate::Result<Self> {
        Self::parse("template name", value)
    }

    /// Validate a caller id.
    pub fn caller(value: &str) -> crate::Result<Self> {
        Self::parse("caller id", value)
    }

    fn parse(component: &'static str, value: &str) -> crate::Result<Self> {
        let invalid = |reason: String| crate::Error::InvalidIdentifier {
            component,
            value: value.chars().take(MAX_IDENTIFIER_LEN * 2).collect(),
            reason,
        };

        if value.is_empty() {
            return Err(invalid("must not be empty".to_string()));
        }
        if value.len() > MAX_IDENTIFIER_LEN {
            return Err(invalid(format!(
                "must be at most {MAX_IDENTIFIER_LEN} characters, got {}",
                value.len()
            )));
        }
        if let Some(c) = value
            .chars()
            .find(|c| !matches!(c, 'a'..='z' | 'A'..='Z' | '0'..='9' | '-'))
        {
            return Err(invalid(format!(
                "invalid character {c:?} (allowed: letters, digits, '-')"
            )));
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({self})")
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Full name of a derived instance: `{template}_{caller}`.
#[derive(Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct InstanceName(String);

impl InstanceName {
    /// Derive the instance name for a template and caller.
    pub fn new(template: &Identifier, caller: &Identifier) -> Self {
        Self(format!("{template}{INSTANCE_SEPARATOR}{caller}"))
    }

    /// Validate both raw components and derive the instance name.
    pub fn resolve(template: &str, caller: &str) -> crate::Result<(Identifier, Identifier, Self)> {
        let template = Identifier::template(template)?;
        let caller = Identifier::caller(caller)?;
        let name = Self::new(&template, &caller);
        Ok((template, caller, name))
    }

    /// Name of the snapshot that serves as this instance's reset baseline.
    pub fn snapshot(&self) -> SnapshotName {
        SnapshotName(format!("{}{SNAPSHOT_SUFFIX}", self.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for InstanceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InstanceName({self})")
    }
}

impl fmt::Display for InstanceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of an instance's snapshot: `{instance}_dbss`.
#[derive(Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SnapshotName(String);

impl SnapshotName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SnapshotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SnapshotName({self})")
    }
}

impl fmt::Display for SnapshotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Backup file name for a template: `{template}.bak`.
pub fn backup_file_name(template: &Identifier) -> String {
    format!("{template}.bak")
}
