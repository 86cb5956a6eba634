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
//! A sample performance pad: load one audio sample, play it from trigger
//! points or a looped selection, and push it through dub delay chains and
//! modulation effects while metering the output.

pub mod asset;
pub mod audio;
pub mod command;
pub mod config;
pub mod console;
pub mod effects;
pub mod meter;
pub mod persistence;
pub mod selection;
pub mod session;
pub mod transport;
pub mod triggers;
pub mod util;
pub mod waveform;

#[cfg(test)]
mod testutil;
