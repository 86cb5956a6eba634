// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

const DEFAULT_TRIGGER_FILE: &str = "dubpad-triggers.json";

/// A YAML representation of where trigger points are kept.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Storage {
    /// The JSON file holding trigger points for every sample.
    triggers: Option<PathBuf>,
}

impl Default for Storage {
    fn default() -> Self {
        Storage {
            triggers: Some(PathBuf::from(DEFAULT_TRIGGER_FILE)),
        }
    }
}

impl Storage {
    pub fn new(triggers: &Path) -> Storage {
        Storage {
            triggers: Some(triggers.to_path_buf()),
        }
    }

    /// Returns the trigger file path (default: dubpad-triggers.json).
    pub fn triggers(&self) -> PathBuf {
        self.triggers
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TRIGGER_FILE))
    }
}
