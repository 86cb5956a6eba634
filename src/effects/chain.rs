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
use crate::audio::dsp::{Biquad, DelayLine, FilterType, Lfo, WaveShaper};
use crate::audio::param::AudioParam;

use super::EffectName;

/// The flavour of a chain: which extra nodes sit in its feedback path and
/// which engage/release automation it uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
    /// Plain feedback delay.
    Generic,
    /// Sweeping resonant band pass and low pass in the feedback path.
    ResonantSweep,
    /// High shelf plus tape saturation in the feedback path.
    Saturation,
    /// Two allpass stages smearing the repeats like a spring tank.
    Allpass,
    /// An LFO wobbling a short pitch delay in the feedback path.
    Modulated,
}

/// Static description of a chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainSpec {
    pub name: EffectName,
    pub kind: EffectKind,
    /// Delay time in seconds.
    pub delay_time: f64,
    /// Feedback gain reached when engaged.
    pub feedback: f32,
    /// Feedback path low pass cutoff in Hz.
    pub filter_frequency: f32,
}

pub const CHAIN_SPECS: [ChainSpec; 8] = [
    ChainSpec {
        name: EffectName::Delay1,
        kind: EffectKind::Generic,
        delay_time: 0.4,
        feedback: 0.88,
        filter_frequency: 2200.0,
    },
    ChainSpec {
        name: EffectName::Delay2,
        kind: EffectKind::Generic,
        delay_time: 0.6,
        feedback: 0.85,
        filter_frequency: 1800.0,
    },
    ChainSpec {
        name: EffectName::Delay3,
        kind: EffectKind::Generic,
        delay_time: 0.8,
        feedback: 0.83,
        filter_frequency: 1500.0,
    },
    ChainSpec {
        name: EffectName::Reverb,
        kind: EffectKind::Generic,
        delay_time: 0.1,
        feedback: 0.6,
        filter_frequency: 3500.0,
    },
    ChainSpec {
        name: EffectName::TubbySwell,
        kind: EffectKind::ResonantSweep,
        delay_time: 0.4,
        feedback: 0.89,
        filter_frequency: 2200.0,
    },
    ChainSpec {
        name: EffectName::DropOut,
        kind: EffectKind::Saturation,
        delay_time: 0.12,
        feedback: 0.95,
        filter_frequency: 1200.0,
    },
    ChainSpec {
        name: EffectName::Springs,
        kind: EffectKind::Allpass,
        delay_time: 0.05,
        feedback: 0.75,
        filter_frequency: 4000.0,
    },
    ChainSpec {
        name: EffectName::GhostEcho,
        kind: EffectKind::Modulated,
        delay_time: 0.33,
        feedback: 0.92,
        filter_frequency: 2800.0,
    },
];

const MAX_DELAY_SECONDS: f64 = 1.0;
// Butterworth response in dB: no peak above unity in the feedback path.
const FILTER_Q: f32 = -3.0103;
const SATURATION_CURVE_POINTS: usize = 44100;
const PITCH_DELAY_SECONDS: f64 = 0.03;
const PITCH_LFO_RATE: f64 = 0.5;
const PITCH_LFO_REST: f32 = 0.001;

/// The nodes a chain kind adds to the base feedback loop.
enum Extras {
    None,
    ResonantSweep {
        bandpass: [Biquad; 2],
        lowpass: [Biquad; 2],
        bandpass_frequency: AudioParam,
        lowpass_frequency: AudioParam,
        filter_gain: AudioParam,
    },
    Saturation {
        shelf: [Biquad; 2],
        shelf_frequency: AudioParam,
        shaper: WaveShaper,
    },
    Allpass {
        first: [Biquad; 2],
        second: [Biquad; 2],
    },
    Modulated {
        pitch_delay: [DelayLine; 2],
        lfo: Lfo,
        lfo_gain: AudioParam,
    },
}

impl Extras {
    fn new(kind: EffectKind, sample_rate: u32) -> Extras {
        let pair = |filter_type, frequency, q| {
            [
                Biquad::new(filter_type, frequency, q, sample_rate),
                Biquad::new(filter_type, frequency, q, sample_rate),
            ]
        };

        match kind {
            EffectKind::Generic => Extras::None,
            EffectKind::ResonantSweep => Extras::ResonantSweep {
                bandpass: pair(FilterType::Bandpass, 1200.0, 4.0),
                lowpass: pair(FilterType::Lowpass, 2000.0, 2.0),
                bandpass_frequency: AudioParam::new(1200.0),
                lowpass_frequency: AudioParam::new(2000.0),
                filter_gain: AudioParam::new(0.8),
            },
            EffectKind::Saturation => Extras::Saturation {
                shelf: pair(FilterType::Highshelf(-6.0), 7000.0, 1.0),
                shelf_frequency: AudioParam::new(7000.0),
                shaper: WaveShaper::tape_saturation(SATURATION_CURVE_POINTS),
            },
            EffectKind::Allpass => Extras::Allpass {
                first: pair(FilterType::Allpass, 1400.0, 3.0),
                second: pair(FilterType::Allpass, 500.0, 3.0),
            },
            EffectKind::Modulated => Extras::Modulated {
                pitch_delay: [
                    DelayLine::new(0.1, sample_rate),
                    DelayLine::new(0.1, sample_rate),
                ],
                lfo: Lfo::new(PITCH_LFO_RATE, sample_rate),
                lfo_gain: AudioParam::new(PITCH_LFO_REST),
            },
        }
    }

    fn cancel_and_hold(&mut self, now: f64) {
        match self {
            Extras::ResonantSweep {
                bandpass_frequency,
                lowpass_frequency,
                filter_gain,
                ..
            } => {
                bandpass_frequency.cancel_and_hold_at_time(now);
                lowpass_frequency.cancel_and_hold_at_time(now);
                filter_gain.cancel_and_hold_at_time(now);
            }
            Extras::Saturation {
                shelf_frequency, ..
            } => shelf_frequency.cancel_and_hold_at_time(now),
            Extras::Modulated { lfo_gain, .. } => lfo_gain.cancel_and_hold_at_time(now),
            Extras::None | Extras::Allpass { .. } => {}
        }
    }

    /// Clears filter and delay memory.
    fn reset(&mut self) {
        match self {
            Extras::ResonantSweep {
                bandpass, lowpass, ..
            } => bandpass
                .iter_mut()
                .chain(lowpass.iter_mut())
                .for_each(Biquad::reset),
            Extras::Saturation { shelf, .. } => shelf.iter_mut().for_each(Biquad::reset),
            Extras::Allpass { first, second } => first
                .iter_mut()
                .chain(second.iter_mut())
                .for_each(Biquad::reset),
            Extras::Modulated { pitch_delay, .. } => {
                pitch_delay.iter_mut().for_each(DelayLine::clear)
            }
            Extras::None => {}
        }
    }
}

/// One feedback delay chain.
pub struct EffectChain {
    spec: ChainSpec,
    sample_rate: u32,
    delay: [DelayLine; 2],
    filter: [Biquad; 2],
    feedback: AudioParam,
    wet: AudioParam,
    extras: Extras,
    engaged: bool,
}

impl EffectChain {
    pub fn new(spec: &ChainSpec, sample_rate: u32) -> EffectChain {
        EffectChain {
            spec: *spec,
            sample_rate,
            delay: [
                DelayLine::new(MAX_DELAY_SECONDS, sample_rate),
                DelayLine::new(MAX_DELAY_SECONDS, sample_rate),
            ],
            filter: [
                Biquad::new(FilterType::Lowpass, spec.filter_frequency, FILTER_Q, sample_rate),
                Biquad::new(FilterType::Lowpass, spec.filter_frequency, FILTER_Q, sample_rate),
            ],
            feedback: AudioParam::new(0.0),
            wet: AudioParam::new(0.0),
            extras: Extras::new(spec.kind, sample_rate),
            engaged: false,
        }
    }

    pub fn name(&self) -> EffectName {
        self.spec.name
    }

    pub fn kind(&self) -> EffectKind {
        self.spec.kind
    }

    pub fn spec(&self) -> &ChainSpec {
        &self.spec
    }

    pub fn is_engaged(&self) -> bool {
        self.engaged
    }

    pub fn wet(&self) -> &AudioParam {
        &self.wet
    }

    pub fn feedback(&self) -> &AudioParam {
        &self.feedback
    }

    /// The wet gain the engage automation settles on.
    pub fn engage_wet(&self) -> f32 {
        match self.spec.kind {
            EffectKind::ResonantSweep => 0.8,
            EffectKind::Saturation => 0.75,
            EffectKind::Allpass => 0.65,
            EffectKind::Modulated | EffectKind::Generic => 0.7,
        }
    }

    /// Schedules the engage or release automation starting at `now`.
    pub fn trigger(&mut self, active: bool, now: f64) {
        self.feedback.cancel_and_hold_at_time(now);
        self.wet.cancel_and_hold_at_time(now);
        self.extras.cancel_and_hold(now);
        self.engaged = active;

        if active {
            self.engage(now);
        } else {
            self.release(now);
        }
    }

    fn engage(&mut self, now: f64) {
        let feedback = self.spec.feedback;
        let wet = self.engage_wet();

        match &mut self.extras {
            Extras::ResonantSweep {
                bandpass_frequency,
                lowpass_frequency,
                filter_gain,
                ..
            } => {
                bandpass_frequency.set_value_at_time(400.0, now);
                bandpass_frequency.exponential_ramp_to_value_at_time(2400.0, now + 0.8);
                lowpass_frequency.set_value_at_time(2000.0, now);
                lowpass_frequency.exponential_ramp_to_value_at_time(800.0, now + 1.2);
                filter_gain.set_target_at_time(0.8, now, 0.1);
                self.feedback.set_target_at_time(feedback, now, 0.05);
                self.wet.set_target_at_time(wet, now, 0.1);
            }
            Extras::Saturation {
                shelf_frequency, ..
            } => {
                shelf_frequency.set_value_at_time(7000.0, now);
                shelf_frequency.exponential_ramp_to_value_at_time(4000.0, now + 0.2);
                self.feedback.set_target_at_time(feedback, now, 0.01);
                self.wet.set_target_at_time(wet, now, 0.01);
            }
            Extras::Allpass { .. } => {
                self.feedback.set_target_at_time(feedback, now, 0.005);
                self.wet.set_target_at_time(wet, now, 0.005);
            }
            Extras::Modulated { lfo_gain, .. } => {
                self.feedback.set_target_at_time(feedback, now, 0.1);
                self.wet.set_target_at_time(wet, now, 0.2);
                lfo_gain.set_target_at_time(0.002, now, 0.1);
            }
            Extras::None => {
                self.feedback.set_target_at_time(feedback, now, 0.01);
                self.wet.set_target_at_time(wet, now, 0.01);
            }
        }
    }

    fn release(&mut self, now: f64) {
        let feedback = self.spec.feedback;

        match &mut self.extras {
            Extras::ResonantSweep {
                bandpass_frequency,
                lowpass_frequency,
                filter_gain,
                ..
            } => {
                bandpass_frequency.exponential_ramp_to_value_at_time(200.0, now + 2.0);
                lowpass_frequency.exponential_ramp_to_value_at_time(400.0, now + 1.5);
                filter_gain.set_target_at_time(0.4, now, 0.5);
                self.feedback.set_target_at_time(0.7, now, 0.5);
                self.feedback.set_target_at_time(0.5, now + 1.0, 0.5);
                self.feedback.set_target_at_time(0.0, now + 2.0, 1.0);
                self.wet.set_target_at_time(0.6, now, 0.5);
                self.wet.set_target_at_time(0.0, now + 2.0, 1.5);
            }
            Extras::Saturation {
                shelf_frequency, ..
            } => {
                shelf_frequency.exponential_ramp_to_value_at_time(2000.0, now + 0.5);
                self.feedback.set_target_at_time(0.0, now, 1.0);
                self.wet.set_target_at_time(0.0, now, 1.5);
            }
            Extras::Allpass { .. } => {
                self.feedback.set_target_at_time(0.0, now, 0.5);
                self.wet.set_target_at_time(0.0, now, 1.0);
            }
            Extras::Modulated { lfo_gain, .. } => {
                lfo_gain.set_target_at_time(0.0, now, 0.5);
                self.feedback.set_target_at_time(0.0, now, 2.0);
                self.wet.set_target_at_time(0.0, now, 2.5);
            }
            Extras::None if self.spec.name == EffectName::Reverb => {
                self.feedback.set_target_at_time(0.0, now, 0.2);
                self.wet.set_target_at_time(0.0, now, 0.8);
            }
            Extras::None => {
                // Let the repeats trail off in stages.
                let wet = self.wet.value_at(now);
                self.feedback.set_target_at_time(feedback * 0.7, now, 0.5);
                self.feedback
                    .set_target_at_time(feedback * 0.5, now + 0.5, 0.5);
                self.feedback.set_target_at_time(0.0, now + 1.0, 1.5);
                self.wet.set_target_at_time(wet * 0.95, now, 0.3);
                self.wet.set_target_at_time(0.0, now + 1.0, 2.0);
            }
        }
    }

    /// Cancels every pending automation and drops the chain to silence.
    pub fn silence(&mut self, now: f64) {
        self.feedback.cancel_and_hold_at_time(now);
        self.wet.cancel_and_hold_at_time(now);
        self.extras.cancel_and_hold(now);
        self.feedback.set_value(0.0);
        self.wet.set_value(0.0);
        self.engaged = false;
        self.delay.iter_mut().for_each(DelayLine::clear);
        self.filter.iter_mut().for_each(Biquad::reset);
        self.extras.reset();
    }

    /// Updates filter coefficients from their automated frequencies.
    pub fn update_control(&mut self, time: f64) {
        match &mut self.extras {
            Extras::ResonantSweep {
                bandpass,
                lowpass,
                bandpass_frequency,
                lowpass_frequency,
                ..
            } => {
                let band = bandpass_frequency.value_at(time);
                let low = lowpass_frequency.value_at(time);
                for filter in bandpass.iter_mut() {
                    filter.set(band, 4.0);
                }
                for filter in lowpass.iter_mut() {
                    filter.set(low, 2.0);
                }
            }
            Extras::Saturation {
                shelf,
                shelf_frequency,
                ..
            } => {
                let frequency = shelf_frequency.value_at(time);
                for filter in shelf.iter_mut() {
                    filter.set(frequency, 1.0);
                }
            }
            Extras::None | Extras::Allpass { .. } | Extras::Modulated { .. } => {}
        }
    }

    /// Runs one frame through the chain and returns the wet output.
    pub fn process(&mut self, input: [f32; 2], time: f64) -> [f32; 2] {
        let feedback = self.feedback.value_at(time);
        let wet = self.wet.value_at(time);
        let delay_frames = self.spec.delay_time * self.sample_rate as f64;

        let (filter_gain, pitch_frames) = match &mut self.extras {
            Extras::ResonantSweep { filter_gain, .. } => (filter_gain.value_at(time), 0.0),
            Extras::Modulated { lfo, lfo_gain, .. } => {
                let seconds = PITCH_DELAY_SECONDS + (lfo.next() * lfo_gain.value_at(time)) as f64;
                (1.0, seconds * self.sample_rate as f64)
            }
            _ => (1.0, 0.0),
        };

        let mut out = [0.0; 2];
        for ch in 0..2 {
            let delayed = self.delay[ch].read(delay_frames);
            let colored = match &mut self.extras {
                Extras::None => delayed,
                Extras::ResonantSweep {
                    bandpass, lowpass, ..
                } => lowpass[ch].process(bandpass[ch].process(delayed)) * filter_gain,
                Extras::Saturation { shelf, shaper, .. } => {
                    shaper.shape(shelf[ch].process(delayed))
                }
                Extras::Allpass { first, second } => {
                    second[ch].process(first[ch].process(delayed))
                }
                Extras::Modulated { pitch_delay, .. } => {
                    let shifted = pitch_delay[ch].read(pitch_frames);
                    pitch_delay[ch].write(delayed);
                    shifted
                }
            };
            let returned = self.filter[ch].process(colored) * feedback;
            self.delay[ch].write(input[ch] + returned);
            out[ch] = delayed * wet;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::{EffectChain, EffectKind, CHAIN_SPECS};
    use crate::effects::EffectName;

    fn chain(name: EffectName) -> EffectChain {
        let spec = CHAIN_SPECS.iter().find(|spec| spec.name == name).unwrap();
        EffectChain::new(spec, 44100)
    }

    #[test]
    fn kinds_match_table() {
        assert_eq!(chain(EffectName::Delay2).kind(), EffectKind::Generic);
        assert_eq!(chain(EffectName::TubbySwell).kind(), EffectKind::ResonantSweep);
        assert_eq!(chain(EffectName::DropOut).kind(), EffectKind::Saturation);
        assert_eq!(chain(EffectName::Springs).kind(), EffectKind::Allpass);
        assert_eq!(chain(EffectName::GhostEcho).kind(), EffectKind::Modulated);
    }

    #[test]
    fn engage_settles_on_targets() {
        for spec in CHAIN_SPECS.iter() {
            let mut chain = EffectChain::new(spec, 44100);
            chain.trigger(true, 1.0);
            assert!(chain.is_engaged());
            assert!((chain.wet().value_at(10.0) - chain.engage_wet()).abs() < 1e-3);
            assert!((chain.feedback().value_at(10.0) - spec.feedback).abs() < 1e-3);
        }
    }

    #[test]
    fn release_returns_to_silence() {
        for spec in CHAIN_SPECS.iter() {
            let mut chain = EffectChain::new(spec, 44100);
            chain.trigger(true, 0.0);
            chain.trigger(false, 1.0);
            assert!(!chain.is_engaged());
            assert!(chain.wet().value_at(60.0) < 1e-3, "{}", spec.name);
            assert!(chain.feedback().value_at(60.0) < 1e-3, "{}", spec.name);
        }
    }

    #[test]
    fn rapid_toggles_stay_bounded() {
        for spec in CHAIN_SPECS.iter() {
            let mut chain = EffectChain::new(spec, 44100);
            let limit = chain.engage_wet();
            for i in 0..200 {
                let now = i as f64 * 0.003;
                chain.trigger(i % 2 == 0, now);
                for step in 0..10 {
                    let t = now + step as f64 * 0.0003;
                    assert!(chain.wet().value_at(t) <= limit + 1e-6);
                }
            }
            chain.trigger(true, 1.0);
            assert!(chain.wet().value_at(100.0) <= limit + 1e-6);
            assert!(chain.feedback().value_at(100.0) <= spec.feedback + 1e-6);
        }
    }

    #[test]
    fn silence_drops_gains() {
        let mut chain = chain(EffectName::GhostEcho);
        chain.trigger(true, 0.0);
        chain.silence(0.5);
        assert_eq!(chain.wet().value_at(0.6), 0.0);
        assert_eq!(chain.feedback().value_at(0.6), 0.0);
        assert!(!chain.is_engaged());
    }

    #[test]
    fn silence_clears_every_node() {
        for spec in CHAIN_SPECS.iter() {
            let mut chain = EffectChain::new(spec, 8000);
            chain.trigger(true, 0.0);
            for i in 0..4000 {
                let time = i as f64 / 8000.0;
                if i % 128 == 0 {
                    chain.update_control(time);
                }
                let x = ((i as f32) * 0.3).sin();
                chain.process([x, x], time);
            }

            chain.silence(0.5);
            chain.trigger(true, 0.5);
            for i in 4000..8000 {
                let time = i as f64 / 8000.0;
                if i % 128 == 0 {
                    chain.update_control(time);
                }
                assert_eq!(chain.process([0.0, 0.0], time), [0.0, 0.0], "{}", spec.name);
            }
        }
    }

    #[test]
    fn processing_stays_finite_when_engaged() {
        for spec in CHAIN_SPECS.iter() {
            let mut chain = EffectChain::new(spec, 8000);
            chain.trigger(true, 0.0);
            for i in 0..16000 {
                let time = i as f64 / 8000.0;
                if i % 128 == 0 {
                    chain.update_control(time);
                }
                let x = if i < 800 { ((i as f32) * 0.1).sin() } else { 0.0 };
                let out = chain.process([x, x], time);
                assert!(out[0].is_finite() && out[1].is_finite());
                assert!(out[0].abs() < 10.0, "{} ran away", spec.name);
            }
        }
    }
}
