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
use serde::{Deserialize, Serialize};

const DEFAULT_FLOOR_DB: f32 = -60.0;
const DEFAULT_PEAK_HOLD_FRAMES: u32 = 45;
const DEFAULT_PEAK_DECAY: f32 = 0.03;
const DEFAULT_HOT_PERCENT: f32 = 90.0;

/// A YAML representation of the level meter configuration.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Metering {
    /// The level in dBFS shown as an empty meter.
    floor_db: Option<f32>,
    /// How many display ticks a new peak is held.
    peak_hold_frames: Option<u32>,
    /// How much of full scale the peak falls per tick once released.
    peak_decay: Option<f32>,
    /// Meter percentage above which a channel is reported hot.
    hot_percent: Option<f32>,
}

impl Default for Metering {
    fn default() -> Self {
        Metering {
            floor_db: Some(DEFAULT_FLOOR_DB),
            peak_hold_frames: Some(DEFAULT_PEAK_HOLD_FRAMES),
            peak_decay: Some(DEFAULT_PEAK_DECAY),
            hot_percent: Some(DEFAULT_HOT_PERCENT),
        }
    }
}

impl Metering {
    /// Returns the meter floor (default: -60 dBFS). Always negative.
    pub fn floor_db(&self) -> f32 {
        self.floor_db
            .filter(|floor| *floor < 0.0)
            .unwrap_or(DEFAULT_FLOOR_DB)
    }

    /// Returns the peak hold length in ticks (default: 45).
    pub fn peak_hold_frames(&self) -> u32 {
        self.peak_hold_frames.unwrap_or(DEFAULT_PEAK_HOLD_FRAMES)
    }

    /// Returns the per tick peak decay as a fraction of full scale (default: 0.03).
    pub fn peak_decay(&self) -> f32 {
        self.peak_decay.unwrap_or(DEFAULT_PEAK_DECAY).max(0.0)
    }

    /// Returns the hot threshold in percent (default: 90).
    pub fn hot_percent(&self) -> f32 {
        self.hot_percent.unwrap_or(DEFAULT_HOT_PERCENT)
    }
}
