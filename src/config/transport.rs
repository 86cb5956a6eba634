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
use std::time::Duration;

use duration_string::DurationString;
use serde::{Deserialize, Serialize};

use super::error::ConfigError;

const DEFAULT_START_LEAD: Duration = Duration::from_millis(5);
const DEFAULT_FADE_IN: Duration = Duration::from_millis(10);
const DEFAULT_FADE_OUT: Duration = Duration::from_millis(30);
const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(16);
const DEFAULT_MIN_SELECTION: f64 = 0.1;
const DEFAULT_HANDLE_GAP: f64 = 0.05;
const DEFAULT_MASTER_VOLUME: f32 = 1.0;

/// A YAML representation of the transport timing configuration.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Transport {
    /// How far ahead of the audio clock a start is scheduled, e.g. "5ms".
    start_lead: Option<String>,
    /// Fade in applied to every start, e.g. "10ms".
    fade_in: Option<String>,
    /// Fade out applied to every stop, e.g. "30ms".
    fade_out: Option<String>,
    /// The display tick interval, e.g. "16ms".
    tick_interval: Option<String>,
    /// Selections shorter than this many seconds are discarded.
    min_selection: Option<f64>,
    /// The minimum gap in seconds between the two selection handles.
    handle_gap: Option<f64>,
    /// The initial master volume (0.0 to 1.0).
    master_volume: Option<f32>,
}

impl Default for Transport {
    fn default() -> Self {
        Transport {
            start_lead: Some("5ms".to_string()),
            fade_in: Some("10ms".to_string()),
            fade_out: Some("30ms".to_string()),
            tick_interval: Some("16ms".to_string()),
            min_selection: Some(DEFAULT_MIN_SELECTION),
            handle_gap: Some(DEFAULT_HANDLE_GAP),
            master_volume: Some(DEFAULT_MASTER_VOLUME),
        }
    }
}

/// Transport timing resolved to numbers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timing {
    /// Scheduling lead in seconds.
    pub start_lead: f64,
    /// Fade in length in seconds.
    pub fade_in: f64,
    /// Fade out length in seconds.
    pub fade_out: f64,
    pub tick_interval: Duration,
    /// Minimum selection length in seconds.
    pub min_selection: f64,
    /// Minimum handle separation in seconds.
    pub handle_gap: f64,
    pub master_volume: f32,
}

impl Default for Timing {
    fn default() -> Self {
        Timing {
            start_lead: DEFAULT_START_LEAD.as_secs_f64(),
            fade_in: DEFAULT_FADE_IN.as_secs_f64(),
            fade_out: DEFAULT_FADE_OUT.as_secs_f64(),
            tick_interval: DEFAULT_TICK_INTERVAL,
            min_selection: DEFAULT_MIN_SELECTION,
            handle_gap: DEFAULT_HANDLE_GAP,
            master_volume: DEFAULT_MASTER_VOLUME,
        }
    }
}

fn parse_duration(
    field: &'static str,
    value: &Option<String>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match value {
        Some(value) => DurationString::from_string(value.clone())
            .map(Duration::from)
            .map_err(|e| ConfigError::Duration {
                field,
                reason: e.to_string(),
            }),
        None => Ok(default),
    }
}

fn non_negative(field: &'static str, value: Option<f64>, default: f64) -> Result<f64, ConfigError> {
    match value {
        Some(value) if value < 0.0 || !value.is_finite() => Err(ConfigError::Invalid {
            field,
            reason: format!("{} must be a non-negative number", value),
        }),
        Some(value) => Ok(value),
        None => Ok(default),
    }
}

impl Transport {
    /// Resolves the configuration into timing values.
    pub fn timing(&self) -> Result<Timing, ConfigError> {
        Ok(Timing {
            start_lead: parse_duration("start_lead", &self.start_lead, DEFAULT_START_LEAD)?
                .as_secs_f64(),
            fade_in: parse_duration("fade_in", &self.fade_in, DEFAULT_FADE_IN)?.as_secs_f64(),
            fade_out: parse_duration("fade_out", &self.fade_out, DEFAULT_FADE_OUT)?.as_secs_f64(),
            tick_interval: parse_duration(
                "tick_interval",
                &self.tick_interval,
                DEFAULT_TICK_INTERVAL,
            )?,
            min_selection: non_negative("min_selection", self.min_selection, DEFAULT_MIN_SELECTION)?,
            handle_gap: non_negative("handle_gap", self.handle_gap, DEFAULT_HANDLE_GAP)?,
            master_volume: self
                .master_volume
                .unwrap_or(DEFAULT_MASTER_VOLUME)
                .clamp(0.0, 1.0),
        })
    }
}
