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

//! Playback voices owned by the audio graph.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::asset::AudioAsset;

use super::param::AudioParam;

/// Global voice token counter.
static NEXT_VOICE_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Identifies one voice. Tokens increase monotonically, so a newer voice
/// always carries a larger token than the one it replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VoiceToken(u64);

impl VoiceToken {
    pub fn next() -> VoiceToken {
        VoiceToken(NEXT_VOICE_TOKEN.fetch_add(1, Ordering::SeqCst))
    }
}

impl fmt::Display for VoiceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "voice-{}", self.0)
    }
}

/// A region the voice wraps around, in asset seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopRegion {
    pub start: f64,
    pub end: f64,
}

/// One playing instance of an asset inside the graph.
pub struct VoiceNode {
    token: VoiceToken,
    asset: Arc<AudioAsset>,
    /// Audio time at which the first frame is produced.
    start_time: f64,
    /// Read position in asset frames.
    position: f64,
    /// Playback rate relative to the asset's native speed.
    playback_rate: f64,
    /// Output gain (fades and master volume).
    gain: AudioParam,
    loop_region: Option<LoopRegion>,
    /// Audio time at which the voice stops producing output.
    stop_time: Option<f64>,
    ended: bool,
    /// Number of times the loop region wrapped.
    wraps: u64,
}

impl VoiceNode {
    /// Creates a voice that starts reading at `offset` seconds into the asset
    /// once the audio clock reaches `start_time`.
    pub fn new(
        token: VoiceToken,
        asset: Arc<AudioAsset>,
        start_time: f64,
        offset: f64,
        playback_rate: f64,
    ) -> VoiceNode {
        let position = offset * asset.sample_rate() as f64;
        VoiceNode {
            token,
            asset,
            start_time,
            position,
            playback_rate,
            gain: AudioParam::new(0.0),
            loop_region: None,
            stop_time: None,
            ended: false,
            wraps: 0,
        }
    }

    pub fn token(&self) -> VoiceToken {
        self.token
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn gain_mut(&mut self) -> &mut AudioParam {
        &mut self.gain
    }

    pub fn gain(&self) -> &AudioParam {
        &self.gain
    }

    pub fn set_playback_rate(&mut self, rate: f64) {
        self.playback_rate = rate;
    }

    pub fn playback_rate(&self) -> f64 {
        self.playback_rate
    }

    pub fn set_loop_region(&mut self, region: Option<LoopRegion>) {
        self.loop_region = region;
    }

    pub fn loop_region(&self) -> Option<LoopRegion> {
        self.loop_region
    }

    pub fn wraps(&self) -> u64 {
        self.wraps
    }

    /// Schedules the voice to go silent at `time`. An earlier stop time wins.
    pub fn stop_at(&mut self, time: f64) {
        self.stop_time = Some(match self.stop_time {
            Some(existing) => existing.min(time),
            None => time,
        });
    }

    pub fn stop_time(&self) -> Option<f64> {
        self.stop_time
    }

    /// Whether the voice has been told to stop.
    pub fn is_stopping(&self) -> bool {
        self.stop_time.is_some()
    }

    /// The read position in asset seconds.
    pub fn position_seconds(&self) -> f64 {
        self.position / self.asset.sample_rate() as f64
    }

    /// Whether the voice will never produce output again at or after `time`.
    pub fn is_finished(&self, time: f64) -> bool {
        self.ended || self.stop_time.is_some_and(|stop| time >= stop)
    }

    /// Produces the frame for audio time `time` and advances.
    pub fn render_frame(&mut self, time: f64, output_rate: u32) -> [f32; 2] {
        if self.ended || time < self.start_time {
            return [0.0, 0.0];
        }
        if self.stop_time.is_some_and(|stop| time >= stop) {
            self.ended = true;
            return [0.0, 0.0];
        }

        let frame = self.asset.frame_at(self.position);
        let gain = self.gain.value_at(time);

        let asset_rate = self.asset.sample_rate() as f64;
        self.position += self.playback_rate * asset_rate / output_rate as f64;

        match self.loop_region {
            Some(region) if region.end > region.start => {
                let end = region.end * asset_rate;
                if self.position >= end {
                    let length = end - region.start * asset_rate;
                    while self.position >= end {
                        self.position -= length;
                    }
                    self.wraps += 1;
                }
            }
            _ => {
                if self.position >= self.asset.frames() as f64 {
                    self.ended = true;
                }
            }
        }

        [frame[0] * gain, frame[1] * gain]
    }
}
