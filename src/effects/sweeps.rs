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

//! The modulation rack: performer-swept low and high pass filters followed by
//! bypassable flanger, phaser, chorus and tremolo stages. It sits on the
//! master bus after the dry and wet signals are summed.

use std::str::FromStr;

use tracing::debug;

use crate::audio::dsp::{Biquad, DelayLine, FilterType, Lfo, OnePoleAllpass};
use crate::audio::param::AudioParam;

use super::ParseError;

const SWEEP_TIME_CONSTANT: f64 = 0.01;
const DEFAULT_LOWPASS: f32 = 20000.0;
const DEFAULT_HIGHPASS: f32 = 20.0;
const DEFAULT_RESONANCE: f32 = 1.0;
const PHASER_STAGES: usize = 4;

/// A sweepable filter control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterParam {
    LowpassFrequency,
    LowpassResonance,
    HighpassFrequency,
    HighpassResonance,
}

impl FilterParam {
    /// The accepted range of the control.
    pub fn range(&self) -> (f32, f32) {
        match self {
            FilterParam::LowpassFrequency => (20.0, 20000.0),
            FilterParam::HighpassFrequency => (20.0, 8000.0),
            FilterParam::LowpassResonance | FilterParam::HighpassResonance => (0.1, 20.0),
        }
    }
}

impl FromStr for FilterParam {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lowpass" | "lowpassfrequency" => Ok(FilterParam::LowpassFrequency),
            "lowpassq" | "lowpassresonance" => Ok(FilterParam::LowpassResonance),
            "highpass" | "highpassfrequency" => Ok(FilterParam::HighpassFrequency),
            "highpassq" | "highpassresonance" => Ok(FilterParam::HighpassResonance),
            _ => Err(ParseError::UnknownFilterParam(s.to_string())),
        }
    }
}

/// A bypassable modulation stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModulationEffect {
    Flanger,
    Phaser,
    Chorus,
    Tremolo,
}

impl FromStr for ModulationEffect {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "flanger" => Ok(ModulationEffect::Flanger),
            "phaser" => Ok(ModulationEffect::Phaser),
            "chorus" => Ok(ModulationEffect::Chorus),
            "tremolo" => Ok(ModulationEffect::Tremolo),
            _ => Err(ParseError::UnknownModulation(s.to_string())),
        }
    }
}

/// A modulation stage parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModulationParam {
    Rate,
    Depth,
    Feedback,
}

impl FromStr for ModulationParam {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rate" => Ok(ModulationParam::Rate),
            // Tremolo calls its depth intensity.
            "depth" | "intensity" => Ok(ModulationParam::Depth),
            "feedback" => Ok(ModulationParam::Feedback),
            _ => Err(ParseError::UnknownModulationParam(s.to_string())),
        }
    }
}

/// A delay line whose time wobbles around a base delay. Used for both the
/// flanger (short delay) and the chorus (long delay).
struct ModulatedDelay {
    bypass: bool,
    rate_range: (f64, f64),
    delay: f64,
    depth: f32,
    feedback: f32,
    lfo: Lfo,
    lines: [DelayLine; 2],
    sample_rate: u32,
}

impl ModulatedDelay {
    fn new(
        rate: f64,
        rate_range: (f64, f64),
        feedback: f32,
        delay: f64,
        depth: f32,
        sample_rate: u32,
    ) -> Self {
        Self {
            bypass: true,
            rate_range,
            delay,
            depth,
            feedback,
            lfo: Lfo::new(rate, sample_rate),
            lines: [DelayLine::new(0.2, sample_rate), DelayLine::new(0.2, sample_rate)],
            sample_rate,
        }
    }

    fn clear(&mut self) {
        self.lines.iter_mut().for_each(DelayLine::clear);
    }

    fn process(&mut self, input: [f32; 2]) -> [f32; 2] {
        if self.bypass {
            return input;
        }
        let mut out = [0.0; 2];
        for (ch, sample) in input.iter().enumerate() {
            // Right channel runs a quarter cycle behind the left.
            let wobble = self.lfo.value(ch as f64 * std::f64::consts::FRAC_PI_2) as f64;
            let seconds = self.delay + self.delay * self.depth as f64 * wobble;
            let delayed = self.lines[ch].read(seconds * self.sample_rate as f64);
            self.lines[ch].write(sample + delayed * self.feedback);
            out[ch] = sample + delayed;
        }
        self.lfo.advance();
        out
    }
}

/// A four stage allpass phaser.
struct Phaser {
    bypass: bool,
    depth: f32,
    feedback: f32,
    stereo_phase: f64,
    base_frequency: f32,
    lfo: Lfo,
    stages: [[OnePoleAllpass; PHASER_STAGES]; 2],
    last: [f32; 2],
    sample_rate: u32,
}

impl Phaser {
    fn clear(&mut self) {
        self.stages
            .iter_mut()
            .flatten()
            .for_each(OnePoleAllpass::reset);
        self.last = [0.0; 2];
    }

    fn process(&mut self, input: [f32; 2]) -> [f32; 2] {
        if self.bypass {
            return input;
        }
        let mut out = [0.0; 2];
        for (ch, sample) in input.iter().enumerate() {
            let offset = (ch as f64) * self.stereo_phase.to_radians();
            // Sweep two octaves either side of the base at full depth.
            let octaves = 2.0 * self.depth * self.lfo.value(offset);
            let frequency = self.base_frequency * octaves.exp2();

            let mut signal = sample + self.last[ch] * self.feedback;
            for stage in self.stages[ch].iter_mut() {
                stage.set_frequency(frequency, self.sample_rate);
                signal = stage.process(signal);
            }
            self.last[ch] = signal;
            out[ch] = sample + signal;
        }
        self.lfo.advance();
        out
    }
}

/// Amplitude modulation.
struct Tremolo {
    bypass: bool,
    intensity: f32,
    stereo_phase: f64,
    lfo: Lfo,
}

impl Tremolo {
    fn process(&mut self, input: [f32; 2]) -> [f32; 2] {
        if self.bypass {
            return input;
        }
        let mut out = [0.0; 2];
        for (ch, sample) in input.iter().enumerate() {
            let offset = (ch as f64) * self.stereo_phase.to_radians();
            let swing = 0.5 + 0.5 * self.lfo.value(offset);
            out[ch] = sample * (1.0 - self.intensity * swing);
        }
        self.lfo.advance();
        out
    }
}

/// The master bus filter and modulation rack.
pub struct ModulationRack {
    sample_rate: u32,
    lowpass_frequency: AudioParam,
    lowpass_resonance: AudioParam,
    highpass_frequency: AudioParam,
    highpass_resonance: AudioParam,
    lowpass: [Biquad; 2],
    highpass: [Biquad; 2],
    flanger: ModulatedDelay,
    phaser: Phaser,
    chorus: ModulatedDelay,
    tremolo: Tremolo,
}

impl ModulationRack {
    pub fn new(sample_rate: u32) -> ModulationRack {
        let lowpass = || {
            Biquad::new(
                FilterType::Lowpass,
                DEFAULT_LOWPASS,
                DEFAULT_RESONANCE,
                sample_rate,
            )
        };
        let highpass = || {
            Biquad::new(
                FilterType::Highpass,
                DEFAULT_HIGHPASS,
                DEFAULT_RESONANCE,
                sample_rate,
            )
        };

        ModulationRack {
            sample_rate,
            lowpass_frequency: AudioParam::new(DEFAULT_LOWPASS),
            lowpass_resonance: AudioParam::new(DEFAULT_RESONANCE),
            highpass_frequency: AudioParam::new(DEFAULT_HIGHPASS),
            highpass_resonance: AudioParam::new(DEFAULT_RESONANCE),
            lowpass: [lowpass(), lowpass()],
            highpass: [highpass(), highpass()],
            flanger: ModulatedDelay::new(0.5, (0.05, 5.0), 0.4, 0.005, 0.7, sample_rate),
            phaser: Phaser {
                bypass: true,
                depth: 0.6,
                feedback: 0.6,
                stereo_phase: 40.0,
                base_frequency: 700.0,
                lfo: Lfo::new(0.8, sample_rate),
                stages: Default::default(),
                last: [0.0; 2],
                sample_rate,
            },
            chorus: ModulatedDelay::new(1.5, (0.05, 8.0), 0.2, 0.045, 0.5, sample_rate),
            tremolo: Tremolo {
                bypass: true,
                intensity: 0.6,
                stereo_phase: 0.0,
                lfo: Lfo::new(4.0, sample_rate),
            },
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn param_mut(&mut self, param: FilterParam) -> &mut AudioParam {
        match param {
            FilterParam::LowpassFrequency => &mut self.lowpass_frequency,
            FilterParam::LowpassResonance => &mut self.lowpass_resonance,
            FilterParam::HighpassFrequency => &mut self.highpass_frequency,
            FilterParam::HighpassResonance => &mut self.highpass_resonance,
        }
    }

    /// The automated value of a filter control at `time`.
    pub fn filter_value(&self, param: FilterParam, time: f64) -> f32 {
        match param {
            FilterParam::LowpassFrequency => self.lowpass_frequency.value_at(time),
            FilterParam::LowpassResonance => self.lowpass_resonance.value_at(time),
            FilterParam::HighpassFrequency => self.highpass_frequency.value_at(time),
            FilterParam::HighpassResonance => self.highpass_resonance.value_at(time),
        }
    }

    /// Glides a filter control towards `value` (clamped to its range).
    pub fn set_filter(&mut self, param: FilterParam, value: f32, now: f64) {
        let (min, max) = param.range();
        let value = value.clamp(min, max);
        debug!(?param, value, "Setting filter");
        let target = self.param_mut(param);
        target.cancel_and_hold_at_time(now);
        target.set_target_at_time(value, now, SWEEP_TIME_CONSTANT);
    }

    /// Opens both filters back up.
    pub fn reset_filters(&mut self, now: f64) {
        self.set_filter(FilterParam::LowpassFrequency, DEFAULT_LOWPASS, now);
        self.set_filter(FilterParam::LowpassResonance, DEFAULT_RESONANCE, now);
        self.set_filter(FilterParam::HighpassFrequency, DEFAULT_HIGHPASS, now);
        self.set_filter(FilterParam::HighpassResonance, DEFAULT_RESONANCE, now);
    }

    /// Cancels pending filter glides, holding the current settings.
    pub fn cancel(&mut self, now: f64) {
        self.lowpass_frequency.cancel_and_hold_at_time(now);
        self.lowpass_resonance.cancel_and_hold_at_time(now);
        self.highpass_frequency.cancel_and_hold_at_time(now);
        self.highpass_resonance.cancel_and_hold_at_time(now);
    }

    /// Clears the memory of every filter and delay so nothing rings on.
    pub fn reset(&mut self) {
        self.lowpass
            .iter_mut()
            .chain(self.highpass.iter_mut())
            .for_each(Biquad::reset);
        self.flanger.clear();
        self.phaser.clear();
        self.chorus.clear();
    }

    /// Switches a stage in or out. Takes effect on the next frame.
    pub fn toggle(&mut self, effect: ModulationEffect, active: bool) {
        debug!(?effect, active, "Toggling modulation");
        match effect {
            ModulationEffect::Flanger => self.flanger.bypass = !active,
            ModulationEffect::Phaser => self.phaser.bypass = !active,
            ModulationEffect::Chorus => self.chorus.bypass = !active,
            ModulationEffect::Tremolo => self.tremolo.bypass = !active,
        }
    }

    pub fn is_active(&self, effect: ModulationEffect) -> bool {
        match effect {
            ModulationEffect::Flanger => !self.flanger.bypass,
            ModulationEffect::Phaser => !self.phaser.bypass,
            ModulationEffect::Chorus => !self.chorus.bypass,
            ModulationEffect::Tremolo => !self.tremolo.bypass,
        }
    }

    /// Sets a stage parameter, clamping it to the stage's range. Returns the
    /// applied value, or None when the stage has no such parameter.
    pub fn set_param(
        &mut self,
        effect: ModulationEffect,
        param: ModulationParam,
        value: f32,
    ) -> Option<f32> {
        let applied = match (effect, param) {
            (ModulationEffect::Flanger | ModulationEffect::Chorus, ModulationParam::Rate) => {
                let stage = if effect == ModulationEffect::Flanger {
                    &mut self.flanger
                } else {
                    &mut self.chorus
                };
                let (min, max) = stage.rate_range;
                let rate = (value as f64).clamp(min, max);
                stage.lfo.set_rate(rate);
                rate as f32
            }
            (ModulationEffect::Flanger, ModulationParam::Depth) => {
                self.flanger.depth = value.clamp(0.0, 1.0);
                self.flanger.depth
            }
            (ModulationEffect::Chorus, ModulationParam::Depth) => {
                self.chorus.depth = value.clamp(0.0, 1.0);
                self.chorus.depth
            }
            (ModulationEffect::Flanger, ModulationParam::Feedback) => {
                self.flanger.feedback = value.clamp(0.0, 0.95);
                self.flanger.feedback
            }
            (ModulationEffect::Chorus, ModulationParam::Feedback) => {
                self.chorus.feedback = value.clamp(0.0, 0.95);
                self.chorus.feedback
            }
            (ModulationEffect::Phaser, ModulationParam::Rate) => {
                let rate = (value as f64).clamp(0.05, 8.0);
                self.phaser.lfo.set_rate(rate);
                rate as f32
            }
            (ModulationEffect::Phaser, ModulationParam::Depth) => {
                self.phaser.depth = value.clamp(0.0, 1.0);
                self.phaser.depth
            }
            (ModulationEffect::Phaser, ModulationParam::Feedback) => {
                self.phaser.feedback = value.clamp(0.0, 0.95);
                self.phaser.feedback
            }
            (ModulationEffect::Tremolo, ModulationParam::Rate) => {
                let rate = (value as f64).clamp(0.1, 20.0);
                self.tremolo.lfo.set_rate(rate);
                rate as f32
            }
            (ModulationEffect::Tremolo, ModulationParam::Depth) => {
                self.tremolo.intensity = value.clamp(0.0, 1.0);
                self.tremolo.intensity
            }
            (ModulationEffect::Tremolo, ModulationParam::Feedback) => return None,
        };
        Some(applied)
    }

    /// Current rate of a stage's LFO in Hz.
    pub fn rate(&self, effect: ModulationEffect) -> f32 {
        let rate = match effect {
            ModulationEffect::Flanger => self.flanger.lfo.rate(),
            ModulationEffect::Phaser => self.phaser.lfo.rate(),
            ModulationEffect::Chorus => self.chorus.lfo.rate(),
            ModulationEffect::Tremolo => self.tremolo.lfo.rate(),
        };
        rate as f32
    }

    /// Updates the filter coefficients from the automated controls.
    pub fn update_control(&mut self, time: f64) {
        let lowpass = self.lowpass_frequency.value_at(time);
        let lowpass_q = self.lowpass_resonance.value_at(time);
        let highpass = self.highpass_frequency.value_at(time);
        let highpass_q = self.highpass_resonance.value_at(time);
        for filter in self.lowpass.iter_mut() {
            filter.set(lowpass, lowpass_q);
        }
        for filter in self.highpass.iter_mut() {
            filter.set(highpass, highpass_q);
        }
    }

    pub fn process(&mut self, input: [f32; 2]) -> [f32; 2] {
        let mut frame = input;
        for ch in 0..2 {
            frame[ch] = self.highpass[ch].process(self.lowpass[ch].process(frame[ch]));
        }
        let frame = self.flanger.process(frame);
        let frame = self.phaser.process(frame);
        let frame = self.chorus.process(frame);
        self.tremolo.process(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names() {
        assert_eq!(
            "lowpass".parse::<FilterParam>(),
            Ok(FilterParam::LowpassFrequency)
        );
        assert_eq!(
            "highpassResonance".parse::<FilterParam>(),
            Ok(FilterParam::HighpassResonance)
        );
        assert_eq!(
            "Phaser".parse::<ModulationEffect>(),
            Ok(ModulationEffect::Phaser)
        );
        assert_eq!(
            "intensity".parse::<ModulationParam>(),
            Ok(ModulationParam::Depth)
        );
        assert!("bandpass".parse::<FilterParam>().is_err());
        assert!("wah".parse::<ModulationEffect>().is_err());
    }

    #[test]
    fn filter_settings_are_clamped() {
        let mut rack = ModulationRack::new(44100);
        rack.set_filter(FilterParam::HighpassFrequency, 15000.0, 0.0);
        rack.set_filter(FilterParam::LowpassFrequency, 5.0, 0.0);
        rack.set_filter(FilterParam::LowpassResonance, 50.0, 0.0);

        assert!((rack.filter_value(FilterParam::HighpassFrequency, 1.0) - 8000.0).abs() < 0.5);
        assert!((rack.filter_value(FilterParam::LowpassFrequency, 1.0) - 20.0).abs() < 0.5);
        assert!((rack.filter_value(FilterParam::LowpassResonance, 1.0) - 20.0).abs() < 0.01);
    }

    #[test]
    fn filter_sweeps_glide() {
        let mut rack = ModulationRack::new(44100);
        rack.set_filter(FilterParam::LowpassFrequency, 1000.0, 1.0);
        let early = rack.filter_value(FilterParam::LowpassFrequency, 1.005);
        assert!(early < 20000.0 && early > 1000.0);
        assert!((rack.filter_value(FilterParam::LowpassFrequency, 1.2) - 1000.0).abs() < 1.0);

        rack.reset_filters(2.0);
        assert!((rack.filter_value(FilterParam::LowpassFrequency, 3.0) - 20000.0).abs() < 1.0);
    }

    #[test]
    fn stages_start_bypassed() {
        let mut rack = ModulationRack::new(44100);
        for effect in [
            ModulationEffect::Flanger,
            ModulationEffect::Phaser,
            ModulationEffect::Chorus,
            ModulationEffect::Tremolo,
        ] {
            assert!(!rack.is_active(effect));
        }
        rack.toggle(ModulationEffect::Chorus, true);
        assert!(rack.is_active(ModulationEffect::Chorus));
        rack.toggle(ModulationEffect::Chorus, false);
        assert!(!rack.is_active(ModulationEffect::Chorus));
    }

    #[test]
    fn params_are_clamped() {
        let mut rack = ModulationRack::new(44100);
        assert_eq!(
            rack.set_param(ModulationEffect::Flanger, ModulationParam::Rate, 10.0),
            Some(5.0)
        );
        assert_eq!(
            rack.set_param(ModulationEffect::Phaser, ModulationParam::Rate, 10.0),
            Some(8.0)
        );
        assert_eq!(
            rack.set_param(ModulationEffect::Phaser, ModulationParam::Feedback, 2.0),
            Some(0.95)
        );
        assert_eq!(
            rack.set_param(ModulationEffect::Flanger, ModulationParam::Depth, -1.0),
            Some(0.0)
        );
        assert_eq!(
            rack.set_param(ModulationEffect::Tremolo, ModulationParam::Feedback, 0.5),
            None
        );
        assert!((rack.rate(ModulationEffect::Flanger) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn tremolo_modulates_amplitude() {
        let mut tremolo = Tremolo {
            bypass: false,
            intensity: 0.6,
            stereo_phase: 0.0,
            lfo: Lfo::new(4.0, 1000),
        };
        let mut min = f32::MAX;
        let mut max = f32::MIN;
        for _ in 0..1000 {
            let out = tremolo.process([0.5, 0.5]);
            min = min.min(out[0]);
            max = max.max(out[0]);
        }
        // Intensity 0.6 swings between 0.4x and 1x.
        assert!((min - 0.2).abs() < 0.01, "min {min}");
        assert!((max - 0.5).abs() < 0.01, "max {max}");
    }

    #[test]
    fn bypassed_rack_passes_audio() {
        let sample_rate = 44100;
        let mut rack = ModulationRack::new(sample_rate);
        let mut energy_in = 0.0;
        let mut energy_out = 0.0;
        for i in 0..44100 {
            if i % 128 == 0 {
                rack.update_control(i as f64 / sample_rate as f64);
            }
            let x = (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / sample_rate as f32).sin();
            let out = rack.process([x, x]);
            if i > 4410 {
                energy_in += x * x;
                energy_out += out[0] * out[0];
            }
        }
        let ratio = energy_out / energy_in;
        assert!(ratio > 0.9 && ratio < 1.1, "ratio {ratio}");
    }

    #[test]
    fn reset_stops_ringing() {
        let sample_rate = 8000;
        let mut rack = ModulationRack::new(sample_rate);
        for effect in [
            ModulationEffect::Flanger,
            ModulationEffect::Phaser,
            ModulationEffect::Chorus,
            ModulationEffect::Tremolo,
        ] {
            rack.toggle(effect, true);
        }
        rack.set_filter(FilterParam::LowpassResonance, 20.0, 0.0);
        for i in 0..2000 {
            if i % 128 == 0 {
                rack.update_control(i as f64 / sample_rate as f64);
            }
            let x = ((i as f32) * 0.2).sin();
            rack.process([x, x]);
        }

        rack.reset();
        for _ in 0..2000 {
            assert_eq!(rack.process([0.0, 0.0]), [0.0, 0.0]);
        }
    }
}
