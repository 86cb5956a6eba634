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

//! The dub effect bank.
//!
//! Every chain is a send/return feedback delay: the voice feeds every chain's
//! input, and a chain is heard only while its wet gain is above zero. Chains
//! are built once per audio context and engaged or released by automating
//! their feedback and wet gains, so toggling never reallocates anything.

use std::fmt;
use std::str::FromStr;

use tracing::debug;

pub mod chain;
pub mod sweeps;

pub use chain::{ChainSpec, EffectChain, EffectKind};
pub use sweeps::{FilterParam, ModulationEffect, ModulationParam, ModulationRack};

/// Errors parsing effect and control names.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("unknown effect: {0}")]
    UnknownEffect(String),

    #[error("unknown filter parameter: {0}")]
    UnknownFilterParam(String),

    #[error("unknown modulation effect: {0}")]
    UnknownModulation(String),

    #[error("unknown modulation parameter: {0}")]
    UnknownModulationParam(String),
}

/// The fixed set of effect chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectName {
    Delay1,
    Delay2,
    Delay3,
    Reverb,
    TubbySwell,
    DropOut,
    Springs,
    GhostEcho,
}

impl EffectName {
    pub const ALL: [EffectName; 8] = [
        EffectName::Delay1,
        EffectName::Delay2,
        EffectName::Delay3,
        EffectName::Reverb,
        EffectName::TubbySwell,
        EffectName::DropOut,
        EffectName::Springs,
        EffectName::GhostEcho,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EffectName::Delay1 => "delay1",
            EffectName::Delay2 => "delay2",
            EffectName::Delay3 => "delay3",
            EffectName::Reverb => "reverb",
            EffectName::TubbySwell => "tubbySwell",
            EffectName::DropOut => "dropOut",
            EffectName::Springs => "springs",
            EffectName::GhostEcho => "ghostEcho",
        }
    }
}

impl fmt::Display for EffectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EffectName {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EffectName::ALL
            .into_iter()
            .find(|name| name.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseError::UnknownEffect(s.to_string()))
    }
}

/// All effect chains of one audio context.
pub struct EffectBank {
    chains: Vec<EffectChain>,
}

impl EffectBank {
    pub fn new(sample_rate: u32) -> EffectBank {
        EffectBank {
            chains: chain::CHAIN_SPECS
                .iter()
                .map(|spec| EffectChain::new(spec, sample_rate))
                .collect(),
        }
    }

    pub fn chain(&self, name: EffectName) -> Option<&EffectChain> {
        self.chains.iter().find(|chain| chain.name() == name)
    }

    pub fn chains(&self) -> impl Iterator<Item = &EffectChain> {
        self.chains.iter()
    }

    /// Engages or releases the named chain at audio time `now`. Safe to call
    /// repeatedly: pending automation is always cancelled first.
    pub fn trigger(&mut self, name: EffectName, active: bool, now: f64) {
        if let Some(chain) = self.chains.iter_mut().find(|chain| chain.name() == name) {
            debug!(effect = %name, active, now, "Triggering effect");
            chain.trigger(active, now);
        }
    }

    /// Cancels all automation and silences every chain.
    pub fn silence(&mut self, now: f64) {
        for chain in self.chains.iter_mut() {
            chain.silence(now);
        }
    }

    /// Updates the control rate (filter) parameters.
    pub fn update_control(&mut self, time: f64) {
        for chain in self.chains.iter_mut() {
            chain.update_control(time);
        }
    }

    /// Feeds one frame into every chain and returns the summed wet output.
    pub fn process(&mut self, input: [f32; 2], time: f64) -> [f32; 2] {
        let mut out = [0.0; 2];
        for chain in self.chains.iter_mut() {
            let wet = chain.process(input, time);
            out[0] += wet[0];
            out[1] += wet[1];
        }
        out
    }
}
