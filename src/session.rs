//! Remembers which pane was open last, across runs.
//!
//! Read once at startup, written whenever the user moves to another pane.
//! A missing or corrupt file is treated as a fresh session.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::types::PaneId;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Pane the user was last looking at.
    pub last_pane: Option<PaneId>,
}

impl SessionState {
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating session directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// Record navigation to `pane` and persist it.
    pub fn navigate(&mut self, pane: PaneId, path: &Path) -> Result<()> {
        self.last_pane = Some(pane);
        self.save(path)
    }
}
