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

//! Configuration for the pad, loaded from YAML with `DUBPAD__` environment
//! overrides (for example `DUBPAD__TRANSPORT__FADE_OUT=50ms`).

use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

pub mod audio;
pub mod error;
pub mod metering;
pub mod storage;
pub mod transport;

pub use self::audio::Audio;
pub use self::error::ConfigError;
pub use self::metering::Metering;
pub use self::storage::Storage;
pub use self::transport::{Timing, Transport};

/// The complete pad configuration.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub audio: Audio,
    pub transport: Transport,
    pub metering: Metering,
    pub storage: Storage,
}

fn environment() -> Environment {
    Environment::with_prefix("DUBPAD")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

impl Settings {
    /// Loads settings from a YAML file, then applies environment overrides.
    pub fn load(path: &Path) -> Result<Settings, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path).format(FileFormat::Yaml))
            .add_source(environment())
            .build()?
            .try_deserialize()?)
    }

    /// Defaults plus environment overrides, for running without a file.
    pub fn from_env() -> Result<Settings, ConfigError> {
        Ok(Config::builder()
            .add_source(environment())
            .build()?
            .try_deserialize()?)
    }

    /// Parses settings from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Settings, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize()?)
    }

    /// Renders the settings as YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yml::to_string(self).map_err(|e| ConfigError::Invalid {
            field: "settings",
            reason: e.to_string(),
        })
    }
}
