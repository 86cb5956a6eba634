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

//! Level metering.
//!
//! The audio graph copies the playing voice's post-gain signal into a
//! [`MeterTap`]. Once per display tick a [`StereoMeter`] turns the tap's window
//! into a percentage per channel with peak hold and decay.

use serde::Serialize;

use crate::config::Metering;

/// Frames kept by the tap (the analysis window).
pub const METER_WINDOW: usize = 256;

/// The level reported for silence.
const SILENCE_THRESHOLD: f32 = 0.0001;

/// A rolling window of the most recent frames.
#[derive(Debug, Clone)]
pub struct MeterTap {
    frames: [[f32; METER_WINDOW]; 2],
    cursor: usize,
}

impl Default for MeterTap {
    fn default() -> Self {
        MeterTap {
            frames: [[0.0; METER_WINDOW]; 2],
            cursor: 0,
        }
    }
}

impl MeterTap {
    pub fn push(&mut self, frame: [f32; 2]) {
        self.frames[0][self.cursor] = frame[0];
        self.frames[1][self.cursor] = frame[1];
        self.cursor = (self.cursor + 1) % METER_WINDOW;
    }

    pub fn clear(&mut self) {
        *self = MeterTap::default();
    }

    /// RMS of the window for each channel.
    pub fn rms(&self) -> [f32; 2] {
        let rms = |data: &[f32; METER_WINDOW]| {
            (data.iter().map(|s| s * s).sum::<f32>() / METER_WINDOW as f32).sqrt()
        };
        [rms(&self.frames[0]), rms(&self.frames[1])]
    }
}

/// Converts an RMS level to dBFS, flooring silence.
pub fn rms_to_db(rms: f32, floor_db: f32) -> f32 {
    if rms > SILENCE_THRESHOLD {
        20.0 * rms.log10()
    } else {
        floor_db
    }
}

/// Maps dBFS onto 0..=100 where the floor is 0 and 0dBFS is 100.
pub fn db_to_percent(db: f32, floor_db: f32) -> f32 {
    ((db - floor_db) / -floor_db * 100.0).clamp(0.0, 100.0)
}

/// One channel's meter state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelMeter {
    pub percent: f32,
    pub peak: f32,
    pub hold_frames: u32,
    pub peak_active: bool,
}

impl ChannelMeter {
    /// Feeds one tick's level in.
    fn update(&mut self, percent: f32, settings: &Metering) {
        self.percent = percent;
        if percent > self.peak {
            self.peak = percent;
            self.hold_frames = settings.peak_hold_frames();
            self.peak_active = true;
        } else if self.hold_frames > 0 {
            self.hold_frames -= 1;
        } else {
            self.peak = (self.peak - settings.peak_decay() * 100.0).max(0.0);
            if self.peak < 1.0 {
                self.peak_active = false;
            }
        }
    }

    pub fn is_hot(&self, settings: &Metering) -> bool {
        self.percent > settings.hot_percent()
    }
}

/// Left and right meters.
#[derive(Debug, Clone)]
pub struct StereoMeter {
    settings: Metering,
    channels: [ChannelMeter; 2],
}

impl StereoMeter {
    pub fn new(settings: Metering) -> StereoMeter {
        StereoMeter {
            settings,
            channels: [ChannelMeter::default(); 2],
        }
    }

    /// Updates both channels from the tap's current window.
    pub fn update(&mut self, tap: &MeterTap) {
        let floor = self.settings.floor_db();
        for (meter, rms) in self.channels.iter_mut().zip(tap.rms()) {
            let percent = db_to_percent(rms_to_db(rms, floor), floor);
            meter.update(percent, &self.settings);
        }
    }

    pub fn reset(&mut self) {
        self.channels = [ChannelMeter::default(); 2];
    }

    pub fn channel(&self, index: usize) -> &ChannelMeter {
        &self.channels[index.min(1)]
    }

    pub fn is_hot(&self, index: usize) -> bool {
        self.channel(index).is_hot(&self.settings)
    }
}
