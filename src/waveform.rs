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

//! Mapping between sample time and horizontal waveform pixels, plus the
//! min/max envelope drawn for each pixel column.

use serde::Serialize;

/// Converts a time in seconds to an x coordinate.
pub fn time_to_x(time: f64, duration: f64, width: f64) -> f64 {
    if duration <= 0.0 {
        return 0.0;
    }
    time / duration * width
}

/// Converts an x coordinate to a time in seconds. The coordinate is clamped to
/// `[0, width]` first.
pub fn x_to_time(x: f64, duration: f64, width: f64) -> f64 {
    if width <= 0.0 {
        return 0.0;
    }
    x.clamp(0.0, width) / width * duration
}

/// The whole pixel a marker at `time` is drawn on.
pub fn marker_x(time: f64, duration: f64, width: f64) -> f64 {
    time_to_x(time, duration, width).floor()
}

/// The playhead pixel: a floored marker that never passes the right edge.
pub fn playhead_x(time: f64, duration: f64, width: f64) -> f64 {
    marker_x(time, duration, width).clamp(0.0, width.max(0.0))
}

/// The sample range drawn in one pixel column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EnvelopeColumn {
    pub min: f32,
    pub max: f32,
}

/// Computes the min/max envelope of `samples` over `width` columns. Each
/// column covers `ceil(len / width)` samples; columns past the end of the
/// data are flat at zero.
pub fn envelope(samples: &[f32], width: usize) -> Vec<EnvelopeColumn> {
    if width == 0 {
        return Vec::new();
    }
    let step = samples.len().div_ceil(width).max(1);

    (0..width)
        .map(|column| {
            let start = (column * step).min(samples.len());
            let end = (start + step).min(samples.len());
            let chunk = &samples[start..end];
            if chunk.is_empty() {
                return EnvelopeColumn { min: 0.0, max: 0.0 };
            }
            chunk.iter().fold(
                EnvelopeColumn {
                    min: 1.0,
                    max: -1.0,
                },
                |acc, s| EnvelopeColumn {
                    min: acc.min.min(*s),
                    max: acc.max.max(*s),
                },
            )
        })
        .collect()
}

/// A filled bar for one envelope column in a view of the given height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EnvelopeBar {
    pub x: f32,
    pub y: f32,
    pub height: f32,
}

/// Lays out envelope columns as one pixel wide bars, at least one pixel tall.
pub fn envelope_bars(columns: &[EnvelopeColumn], height: f32) -> Vec<EnvelopeBar> {
    let amp = height / 2.0;
    columns
        .iter()
        .enumerate()
        .map(|(x, column)| EnvelopeBar {
            x: x as f32,
            y: (1.0 + column.min) * amp,
            height: ((column.max - column.min) * amp).max(1.0),
        })
        .collect()
}
