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
//! The audio engine: a sample-accurate graph rendered by either a cpal output
//! stream or an offline WAV renderer.

pub mod cpal;
pub mod decode;
pub mod dsp;
pub mod graph;
pub mod offline;
pub mod param;
pub mod voice;

pub use self::cpal::{list_devices, DeviceInfo, Output, OutputError};
pub use decode::{decode_bytes, decode_file, LoadError};
pub use graph::{AudioGraph, SharedGraph, RENDER_QUANTUM};
pub use param::AudioParam;
pub use voice::{LoopRegion, VoiceNode, VoiceToken};
