//! Form definitions and the local state file

use anyhow::{Context, Result};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

use crate::form::{FormModel, StateSink};

/// Read a form definition; `.json` files are JSON, anything else TOML
pub fn load_form(path: &Path) -> Result<FormModel> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read form definition: {:?}", path))?;

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse form definition: {:?}", path)),
        _ => toml::from_str(&content).with_context(|| format!("Failed to parse form definition: {:?}", path)),
    }
}

#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<FormModel>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read state file: {:?}", self.path))?;
        let state = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {:?}", self.path))?;
        Ok(Some(state))
    }

    /// Write through a temporary file so a crash never leaves half a state
    pub fn save(&self, state: &FormModel) -> Result<()> {
        debug!("Saving state to: {:?}", self.path);
        let content = serde_json::to_string_pretty(state).context("Failed to serialize state")?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content).with_context(|| format!("Failed to write state file: {:?}", tmp))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace state file: {:?}", self.path))?;
        Ok(())
    }

    /// `None` removes the file
    pub fn store(&self, state: Option<&FormModel>) -> Result<()> {
        match state {
            Some(state) => self.save(state),
            None if self.path.exists() => {
                debug!("Removing state file: {:?}", self.path);
                fs::remove_file(&self.path)
                    .with_context(|| format!("Failed to remove state file: {:?}", self.path))
            }
            None => Ok(()),
        }
    }
}

impl StateSink for StateFile {
    fn checkpoint(&self, state: &FormModel) -> Result<()> {
        self.save(state)
    }
}
