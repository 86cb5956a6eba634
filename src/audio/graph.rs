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
//! The audio graph: every voice, the effect bank, the master insert rack and
//! the meter tap of one audio context.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::effects::{EffectBank, ModulationRack};
use crate::meter::MeterTap;

use super::voice::{VoiceNode, VoiceToken};

/// Frames between control rate updates (filter coefficients, LFO rates) and
/// voice cleanup.
pub const RENDER_QUANTUM: usize = 128;

/// The graph slot shared between the session and whatever renders it (the
/// cpal callback or an offline renderer). `None` while no context is open.
pub type SharedGraph = Arc<Mutex<Option<AudioGraph>>>;

/// Everything rendered by one audio context.
pub struct AudioGraph {
    sample_rate: u32,
    /// Frames rendered so far. This is the audio clock.
    frames: u64,
    voices: Vec<VoiceNode>,
    effects: EffectBank,
    modulation: ModulationRack,
    tap: MeterTap,
}

impl AudioGraph {
    pub fn new(sample_rate: u32) -> AudioGraph {
        AudioGraph {
            sample_rate,
            frames: 0,
            voices: Vec::new(),
            effects: EffectBank::new(sample_rate),
            modulation: ModulationRack::new(sample_rate),
            tap: MeterTap::default(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The audio clock in seconds.
    pub fn current_time(&self) -> f64 {
        self.frames as f64 / self.sample_rate as f64
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    pub fn add_voice(&mut self, voice: VoiceNode) {
        self.voices.push(voice);
    }

    pub fn voice(&self, token: VoiceToken) -> Option<&VoiceNode> {
        self.voices.iter().find(|voice| voice.token() == token)
    }

    pub fn voice_mut(&mut self, token: VoiceToken) -> Option<&mut VoiceNode> {
        self.voices.iter_mut().find(|voice| voice.token() == token)
    }

    /// Voices still in the graph, including ones fading out.
    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    /// Voices that have not been told to stop.
    pub fn live_voice_count(&self) -> usize {
        let now = self.current_time();
        self.voices
            .iter()
            .filter(|voice| !voice.is_stopping() && !voice.is_finished(now))
            .count()
    }

    pub fn effects(&self) -> &EffectBank {
        &self.effects
    }

    pub fn effects_mut(&mut self) -> &mut EffectBank {
        &mut self.effects
    }

    pub fn modulation(&self) -> &ModulationRack {
        &self.modulation
    }

    pub fn modulation_mut(&mut self) -> &mut ModulationRack {
        &mut self.modulation
    }

    pub fn meter_tap(&self) -> &MeterTap {
        &self.tap
    }

    /// Cancels all automation, stops every voice and clears the meter tap
    /// and all filter and delay memory. Used when the context closes.
    pub fn silence(&mut self) {
        let now = self.current_time();
        self.effects.silence(now);
        self.modulation.cancel(now);
        self.modulation.reset();
        for voice in self.voices.iter_mut() {
            voice.stop_at(now);
        }
        self.voices.clear();
        self.tap.clear();
    }

    /// Renders interleaved frames with `channels` channels into `output`.
    /// Mono outputs get the average of left and right, channels past the
    /// second are left silent.
    pub fn process_into_output(&mut self, output: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }

        for frame in output.chunks_mut(channels) {
            let time = self.current_time();
            if self.frames % RENDER_QUANTUM as u64 == 0 {
                self.update_control(time);
            }

            let mut dry = [0.0f32; 2];
            for voice in self.voices.iter_mut() {
                let sample = voice.render_frame(time, self.sample_rate);
                dry[0] += sample[0];
                dry[1] += sample[1];
            }
            self.tap.push(dry);

            let wet = self.effects.process(dry, time);
            let mixed = self.modulation.process([dry[0] + wet[0], dry[1] + wet[1]]);

            match frame {
                [mono] => *mono = (mixed[0] + mixed[1]) * 0.5,
                [left, right, rest @ ..] => {
                    *left = mixed[0];
                    *right = mixed[1];
                    rest.fill(0.0);
                }
                [] => {}
            }

            self.frames += 1;
        }

        self.cleanup();
    }

    /// Renders `frames` stereo frames and returns them interleaved.
    pub fn render_stereo(&mut self, frames: usize) -> Vec<f32> {
        let mut output = vec![0.0; frames * 2];
        self.process_into_output(&mut output, 2);
        output
    }

    fn update_control(&mut self, time: f64) {
        self.effects.update_control(time);
        self.modulation.update_control(time);
        self.cleanup();
    }

    /// Drops voices that will never sound again.
    fn cleanup(&mut self) {
        let now = self.current_time();
        self.voices.retain(|voice| !voice.is_finished(now));
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;
    use std::sync::Arc;

    use crate::asset::AudioAsset;
    use crate::audio::voice::{VoiceNode, VoiceToken};
    use crate::effects::EffectName;
    use crate::testutil::audio_test_utils::calculate_rms;

    use super::AudioGraph;

    const RATE: u32 = 8000;

    fn sine_asset(amplitude: f32, frames: usize) -> Arc<AudioAsset> {
        let data = (0..frames)
            .map(|i| amplitude * (2.0 * PI * 440.0 * i as f32 / RATE as f32).sin())
            .collect();
        Arc::new(AudioAsset::from_planar("sine", RATE, vec![data]).unwrap())
    }

    fn rms(samples: impl Iterator<Item = f32>) -> f32 {
        calculate_rms(&samples.collect::<Vec<_>>())
    }

    fn playing_voice(frames: usize) -> VoiceNode {
        let mut voice = VoiceNode::new(VoiceToken::next(), sine_asset(0.5, frames), 0.0, 0.0, 1.0);
        voice.gain_mut().set_value(1.0);
        voice
    }

    #[test]
    fn clock_advances_per_frame() {
        let mut graph = AudioGraph::new(1000);
        assert_eq!(graph.current_time(), 0.0);
        graph.render_stereo(500);
        assert_eq!(graph.frames_rendered(), 500);
        assert!((graph.current_time() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn voice_reaches_output() {
        let mut graph = AudioGraph::new(RATE);
        graph.add_voice(playing_voice(8000));

        let output = graph.render_stereo(1600);
        let level = rms(output.iter().skip(1600).step_by(2).copied());
        assert!((level - 0.5 / 2f32.sqrt()).abs() < 0.05, "level {level}");
    }

    #[test]
    fn finished_voices_are_dropped() {
        let mut graph = AudioGraph::new(RATE);
        let mut voice = playing_voice(8000);
        let token = voice.token();
        voice.stop_at(0.005);
        graph.add_voice(voice);
        assert_eq!(graph.voice_count(), 1);
        assert_eq!(graph.live_voice_count(), 0);

        graph.render_stereo(100);
        assert_eq!(graph.voice_count(), 0);
        assert!(graph.voice(token).is_none());
    }

    #[test]
    fn voice_ending_naturally_is_dropped() {
        let mut graph = AudioGraph::new(RATE);
        graph.add_voice(playing_voice(50));
        assert_eq!(graph.live_voice_count(), 1);
        graph.render_stereo(200);
        assert_eq!(graph.voice_count(), 0);
    }

    #[test]
    fn extra_channels_are_silent_and_mono_is_averaged() {
        let mut graph = AudioGraph::new(RATE);
        graph.add_voice(playing_voice(8000));

        let mut quad = vec![1.0; 4 * 800];
        graph.process_into_output(&mut quad, 4);
        for frame in quad.chunks(4) {
            assert_eq!(frame[2], 0.0);
            assert_eq!(frame[3], 0.0);
        }

        let mut mono = vec![0.0; 800];
        graph.process_into_output(&mut mono, 1);
        let level = rms(mono.iter().copied());
        assert!((level - 0.5 / 2f32.sqrt()).abs() < 0.05, "level {level}");
    }

    #[test]
    fn silence_empties_graph() {
        let mut graph = AudioGraph::new(RATE);
        graph.add_voice(playing_voice(8000));
        graph.effects_mut().trigger(EffectName::Delay1, true, 0.0);
        graph.render_stereo(800);

        graph.silence();
        assert_eq!(graph.voice_count(), 0);
        let output = graph.render_stereo(800);
        assert!(output.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn silence_stops_filter_ringing() {
        let mut graph = AudioGraph::new(RATE);
        graph.add_voice(playing_voice(8000));
        graph.render_stereo(800);

        graph.silence();
        let output = graph.render_stereo(800);
        let peak = output.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
        assert_eq!(peak, 0.0);
    }
}
