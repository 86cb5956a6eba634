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

//! Decoded, immutable sample audio.

use std::fmt;

/// A decoded sample held in memory as stereo f32 PCM.
///
/// Mono sources are duplicated to both channels and anything wider than
/// stereo keeps its first two channels. An asset is never modified once built;
/// loading a new sample replaces it wholesale.
#[derive(Debug, Clone)]
pub struct AudioAsset {
    /// The identifier the sample was loaded under (path or URL).
    id: String,
    /// The native sample rate.
    sample_rate: u32,
    /// The number of channels in the source before stereo conversion.
    source_channels: u16,
    /// Left and right sample data.
    channels: [Vec<f32>; 2],
}

impl AudioAsset {
    /// Builds an asset from planar channel data. Returns None when there is no
    /// channel data at all or the sample rate is zero.
    pub fn from_planar(id: &str, sample_rate: u32, mut planar: Vec<Vec<f32>>) -> Option<AudioAsset> {
        if planar.is_empty() || sample_rate == 0 {
            return None;
        }
        let source_channels = planar.len() as u16;
        planar.truncate(2);
        let mut left = planar.remove(0);
        let mut right = if planar.is_empty() {
            left.clone()
        } else {
            planar.remove(0)
        };
        let len = left.len().min(right.len());
        left.truncate(len);
        right.truncate(len);

        Some(AudioAsset {
            id: id.to_string(),
            sample_rate,
            source_channels,
            channels: [left, right],
        })
    }

    /// Builds an asset from interleaved data with the given channel count.
    pub fn from_interleaved(
        id: &str,
        sample_rate: u32,
        channels: u16,
        samples: &[f32],
    ) -> Option<AudioAsset> {
        if channels == 0 {
            return None;
        }
        let channels = channels as usize;
        let mut planar = vec![Vec::with_capacity(samples.len() / channels); channels];
        for frame in samples.chunks_exact(channels) {
            for (ch, sample) in frame.iter().enumerate() {
                planar[ch].push(*sample);
            }
        }
        AudioAsset::from_planar(id, sample_rate, planar)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn source_channels(&self) -> u16 {
        self.source_channels
    }

    pub fn frames(&self) -> usize {
        self.channels[0].len()
    }

    /// The duration in seconds at the native rate.
    pub fn duration(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index.min(1)]
    }

    /// Reads a stereo frame at a fractional frame position, linearly
    /// interpolating between neighbours. Positions outside the data are silent.
    pub fn frame_at(&self, position: f64) -> [f32; 2] {
        if position < 0.0 {
            return [0.0, 0.0];
        }
        let index = position.floor() as usize;
        let frames = self.frames();
        if index >= frames {
            return [0.0, 0.0];
        }
        let frac = (position - index as f64) as f32;
        let next = index + 1;

        let mut out = [0.0; 2];
        for (ch, data) in self.channels.iter().enumerate() {
            let a = data[index];
            let b = if next < frames { data[next] } else { 0.0 };
            out[ch] = a + (b - a) * frac;
        }
        out
    }

    /// The absolute peak across both channels.
    pub fn peak(&self) -> f32 {
        self.channels
            .iter()
            .flat_map(|c| c.iter())
            .fold(0.0f32, |peak, s| peak.max(s.abs()))
    }
}

impl fmt::Display for AudioAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} channels, {}Hz, {:.2}s)",
            self.id,
            self.source_channels,
            self.sample_rate,
            self.duration()
        )
    }
}
