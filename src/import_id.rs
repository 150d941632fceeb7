//! Import identifiers: a bare resource ID, or `parent#child` for resources
//! nested under another (`file_id#permission_id`, `spreadsheet_id#a1_range`).

use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportId {
    Bare(String),
    Composite { parent: String, child: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImportIdError {
    #[error("import ID is empty")]
    Empty,
    #[error("import ID {0:?} must be <id> or <parent>#<child> with two non-empty parts")]
    Malformed(String),
}

impl ImportId {
    pub fn parse(raw: &str) -> Result<Self, ImportIdError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ImportIdError::Empty);
        }

        let parts: Vec<&str> = raw.split('#').collect();
        match parts.as_slice() {
            [bare] => Ok(ImportId::Bare(bare.to_string())),
            [parent, child] if !parent.is_empty() && !child.is_empty() => Ok(ImportId::Composite {
                parent: parent.to_string(),
                child: child.to_string(),
            }),
            _ => Err(ImportIdError::Malformed(raw.to_string())),
        }
    }

    pub fn as_bare(&self) -> Option<&str> {
        match self {
            ImportId::Bare(id) => Some(id.as_str()),
            ImportId::Composite { .. } => None,
        }
    }

    pub fn as_composite(&self) -> Option<(&str, &str)> {
        match self {
            ImportId::Bare(_) => None,
            ImportId::Composite { parent, child } => Some((parent.as_str(), child.as_str())),
        }
    }
}

impl fmt::Display for ImportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportId::Bare(id) => write!(f, "{}", id),
            ImportId::Composite { parent, child } => write!(f, "{}#{}", parent, child),
        }
    }
}
