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
//! The playback transport.
//!
//! The transport owns no audio itself. It schedules [`VoiceNode`]s into the
//! [`AudioGraph`] against the audio clock and keeps enough bookkeeping to
//! derive the playback position from that clock. At most one voice is live:
//! starting always fades the previous voice out first, and the graph drops a
//! faded voice on its own once the clock passes the voice's stop time.

use std::sync::Arc;

use tracing::{debug, info};

use crate::asset::AudioAsset;
use crate::audio::graph::AudioGraph;
use crate::audio::voice::{LoopRegion, VoiceNode, VoiceToken};
use crate::config::Timing;
use crate::selection::Selection;

/// Slowest accepted playback speed.
pub const MIN_SPEED: f64 = 0.25;
/// Fastest accepted playback speed.
pub const MAX_SPEED: f64 = 4.0;

/// Maps speed and pitch shift onto a voice playback rate.
pub trait PitchTransform: Send {
    fn rate(&self, speed: f64, semitones: f64) -> f64;
}

/// Pitch shifting by resampling: speed and pitch are coupled.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResamplingPitch;

impl PitchTransform for ResamplingPitch {
    fn rate(&self, speed: f64, semitones: f64) -> f64 {
        speed * 2f64.powf(semitones / 12.0)
    }
}

/// Converts a 0..=100 fader position to a speed. 0 is half speed, 50 is
/// normal and 100 is double speed.
pub fn slider_to_speed(value: f64) -> f64 {
    let value = value.clamp(0.0, 100.0);
    if value <= 50.0 {
        0.5 + (value / 50.0) * 0.5
    } else {
        1.0 + ((value - 50.0) / 50.0) * 1.0
    }
}

/// The inverse of [`slider_to_speed`].
pub fn speed_to_slider(speed: f64) -> f64 {
    let speed = speed.clamp(0.5, 2.0);
    if speed <= 1.0 {
        ((speed - 0.5) / 0.5) * 50.0
    } else {
        50.0 + ((speed - 1.0) / 1.0) * 50.0
    }
}

/// How a start plays out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayMode {
    /// Play to the end of the asset.
    Full,
    /// Stop at the end of the selection.
    Selection(Selection),
    /// Loop the selection until told otherwise.
    Loop(Selection),
}

/// What a display tick observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing is playing.
    Idle,
    Playing,
    /// The looped selection wrapped since the last tick.
    Looped,
    /// Selection playback reached the selection end and stopped.
    SelectionEnded,
    /// Playback reached the end of the asset and stopped.
    Ended,
}

impl TickOutcome {
    /// Whether this tick stopped playback.
    pub fn stopped(&self) -> bool {
        matches!(self, TickOutcome::SelectionEnded | TickOutcome::Ended)
    }
}

pub struct Transport {
    timing: Timing,
    pitch: Box<dyn PitchTransform>,
    asset: Option<Arc<AudioAsset>>,
    /// The live voice.
    voice: Option<VoiceToken>,
    /// The token the position poll was started for.
    poll: Option<VoiceToken>,
    /// Audio time at which asset position zero would have played.
    position_anchor: f64,
    /// Playback rate of the live voice.
    rate: f64,
    speed: f64,
    semitones: f64,
    master_volume: f32,
    /// Bounds while playing a selection.
    selection: Option<Selection>,
    looping: bool,
}

impl Transport {
    pub fn new(timing: Timing) -> Transport {
        Transport::with_pitch(timing, Box::new(ResamplingPitch))
    }

    pub fn with_pitch(timing: Timing, pitch: Box<dyn PitchTransform>) -> Transport {
        Transport {
            timing,
            pitch,
            asset: None,
            voice: None,
            poll: None,
            position_anchor: 0.0,
            rate: 1.0,
            speed: 1.0,
            semitones: 0.0,
            master_volume: timing.master_volume,
            selection: None,
            looping: false,
        }
    }

    /// Replaces the asset. Playback of the previous asset must already have
    /// been stopped.
    pub fn set_asset(&mut self, asset: Option<Arc<AudioAsset>>) {
        self.asset = asset;
    }

    pub fn asset(&self) -> Option<&Arc<AudioAsset>> {
        self.asset.as_ref()
    }

    pub fn duration(&self) -> f64 {
        self.asset.as_ref().map_or(0.0, |asset| asset.duration())
    }

    pub fn is_playing(&self) -> bool {
        self.voice.is_some()
    }

    pub fn live_voice(&self) -> Option<VoiceToken> {
        self.voice
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// The selection bounds being played, if any.
    pub fn playing_selection(&self) -> Option<Selection> {
        self.selection
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn semitones(&self) -> f64 {
        self.semitones
    }

    pub fn master_volume(&self) -> f32 {
        self.master_volume
    }

    /// The rate the current speed and pitch settings produce.
    pub fn effective_rate(&self) -> f64 {
        self.pitch.rate(self.speed, self.semitones)
    }

    /// How long the whole asset takes to play at the current settings.
    pub fn effective_duration(&self) -> f64 {
        self.duration() / self.effective_rate()
    }

    /// Starts playing at `offset` seconds. Returns the new voice's token, or
    /// None when nothing is loaded.
    pub fn start(&mut self, graph: &mut AudioGraph, offset: f64, mode: PlayMode) -> Option<VoiceToken> {
        let Some(asset) = self.asset.clone() else {
            debug!("Ignoring start without a loaded sample");
            return None;
        };
        let duration = asset.duration();
        let offset = offset.clamp(0.0, duration);

        self.stop(graph);

        let now = graph.current_time();
        let anchor = now + self.timing.start_lead;
        let rate = self.effective_rate();
        let token = VoiceToken::next();

        let mut voice = VoiceNode::new(token, asset, anchor, offset, rate);
        let gain = voice.gain_mut();
        gain.set_value_at_time(0.0, anchor);
        gain.linear_ramp_to_value_at_time(self.master_volume, anchor + self.timing.fade_in);

        let (selection, looping) = match mode {
            PlayMode::Full => (None, false),
            PlayMode::Selection(selection) => (Some(selection), false),
            PlayMode::Loop(selection) => {
                voice.set_loop_region(Some(LoopRegion {
                    start: selection.start,
                    end: selection.end,
                }));
                (Some(selection), true)
            }
        };
        graph.add_voice(voice);

        self.voice = Some(token);
        self.poll = Some(token);
        self.position_anchor = anchor - offset / rate;
        self.rate = rate;
        self.selection = selection;
        self.looping = looping;

        info!(voice = %token, offset, rate, looping, "Starting playback");
        Some(token)
    }

    /// Fades the live voice out and resets the playback state. Returns false
    /// when nothing was playing.
    pub fn stop(&mut self, graph: &mut AudioGraph) -> bool {
        let Some(token) = self.voice.take() else {
            return false;
        };

        let now = graph.current_time();
        let fade_end = now + self.timing.fade_out;
        if let Some(voice) = graph.voice_mut(token) {
            let gain = voice.gain_mut();
            gain.cancel_and_hold_at_time(now);
            gain.linear_ramp_to_value_at_time(0.0, fade_end);
            voice.stop_at(fade_end);
        }

        self.poll = None;
        self.selection = None;
        self.looping = false;
        self.position_anchor = 0.0;
        debug!(voice = %token, fade_end, "Stopping playback");
        true
    }

    /// The playback position in asset seconds, 0 when stopped.
    pub fn position(&self, graph: &AudioGraph) -> f64 {
        if self.voice.is_none() {
            return 0.0;
        }
        ((graph.current_time() - self.position_anchor) * self.rate).max(0.0)
    }

    /// Wall clock seconds left until the end of the asset.
    pub fn remaining(&self, graph: &AudioGraph) -> f64 {
        if self.voice.is_none() {
            return self.effective_duration();
        }
        ((self.duration() - self.position(graph)) / self.rate).max(0.0)
    }

    /// The display tick poll.
    pub fn tick(&mut self, graph: &mut AudioGraph) -> TickOutcome {
        let Some(token) = self.poll else {
            return TickOutcome::Idle;
        };
        if self.voice != Some(token) {
            return TickOutcome::Idle;
        }

        let now = graph.current_time();
        let ended = graph
            .voice(token)
            .map_or(true, |voice| voice.is_finished(now));
        if ended {
            self.stop(graph);
            return TickOutcome::Ended;
        }

        let position = self.position(graph);
        if let Some(selection) = self.selection {
            if position >= selection.end {
                if self.looping && selection.length() > 0.0 {
                    // The voice already wrapped; move the anchor along with it.
                    let wraps = ((position - selection.end) / selection.length()).floor() + 1.0;
                    self.position_anchor += wraps * selection.length() / self.rate;
                    debug!(voice = %token, wraps, "Selection looped");
                    return TickOutcome::Looped;
                }
                self.stop(graph);
                return TickOutcome::SelectionEnded;
            }
        }

        if position >= self.duration() {
            self.stop(graph);
            return TickOutcome::Ended;
        }

        TickOutcome::Playing
    }

    /// Turns selection looping on or off. Turning it on while the selection
    /// is not already playing starts it.
    pub fn toggle_loop(&mut self, graph: &mut AudioGraph, selection: Selection) {
        if self.looping {
            self.looping = false;
            if let Some(voice) = self.voice.and_then(|token| graph.voice_mut(token)) {
                voice.set_loop_region(None);
            }
            debug!("Selection loop off");
            return;
        }

        if self.selection.is_some() && self.is_playing() {
            let region = self.loop_region_for(selection);
            if let Some(voice) = self.voice.and_then(|token| graph.voice_mut(token)) {
                voice.set_loop_region(Some(region));
            }
            self.selection = Some(selection);
            self.looping = true;
            debug!("Selection loop on");
        } else {
            self.start(graph, selection.start, PlayMode::Loop(selection));
        }
    }

    /// Moves the bounds of the selection being played, e.g. after a handle
    /// drag.
    pub fn update_selection(&mut self, graph: &mut AudioGraph, selection: Selection) {
        if self.selection.is_none() {
            return;
        }
        self.selection = Some(selection);
        if self.looping {
            let region = self.loop_region_for(selection);
            if let Some(voice) = self.voice.and_then(|token| graph.voice_mut(token)) {
                voice.set_loop_region(Some(region));
            }
        }
    }

    /// Forgets selection playback and keeps playing to the end of the asset.
    pub fn release_selection(&mut self, graph: &mut AudioGraph) {
        if self.looping {
            if let Some(voice) = self.voice.and_then(|token| graph.voice_mut(token)) {
                voice.set_loop_region(None);
            }
        }
        self.selection = None;
        self.looping = false;
    }

    fn loop_region_for(&self, selection: Selection) -> LoopRegion {
        LoopRegion {
            start: selection.start,
            end: selection.end,
        }
    }

    /// Sets the playback speed, clamped to [`MIN_SPEED`]..=[`MAX_SPEED`].
    pub fn set_speed(&mut self, graph: &mut AudioGraph, speed: f64) {
        if !speed.is_finite() {
            debug!(speed, "Ignoring invalid speed");
            return;
        }
        self.speed = speed.clamp(MIN_SPEED, MAX_SPEED);
        self.apply_rate(graph);
    }

    pub fn set_pitch_shift_semitones(&mut self, graph: &mut AudioGraph, semitones: f64) {
        if !semitones.is_finite() {
            debug!(semitones, "Ignoring invalid pitch shift");
            return;
        }
        self.semitones = semitones;
        self.apply_rate(graph);
    }

    /// Applies the current rate to the live voice, re-anchoring so the
    /// position does not jump.
    fn apply_rate(&mut self, graph: &mut AudioGraph) {
        let rate = self.effective_rate();
        if let Some(token) = self.voice {
            let now = graph.current_time();
            let position = (now - self.position_anchor) * self.rate;
            if let Some(voice) = graph.voice_mut(token) {
                voice.set_playback_rate(rate);
            }
            self.position_anchor = now - position / rate;
            debug!(voice = %token, rate, "Playback rate changed");
        }
        self.rate = rate;
    }

    /// Sets the master volume, clamped to 0..=1. Applies immediately to the
    /// live voice and becomes the fade in target of later starts.
    pub fn set_master_volume(&mut self, graph: &mut AudioGraph, volume: f32) {
        if !volume.is_finite() {
            return;
        }
        self.master_volume = volume.clamp(0.0, 1.0);
        let now = graph.current_time();
        if let Some(voice) = self.voice.and_then(|token| graph.voice_mut(token)) {
            let gain = voice.gain_mut();
            gain.cancel_and_hold_at_time(now);
            gain.set_value_at_time(self.master_volume, now);
        }
    }

    /// Drops all playback state without touching the graph, for when the
    /// graph itself is going away.
    pub fn reset(&mut self) {
        self.voice = None;
        self.poll = None;
        self.selection = None;
        self.looping = false;
        self.position_anchor = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use crate::audio::graph::AudioGraph;
    use crate::config::Timing;
    use crate::selection::Selection;
    use crate::testutil::sine_asset;

    use super::*;

    const RATE: u32 = 8000;

    fn transport(duration: f32) -> (Transport, AudioGraph) {
        let mut transport = Transport::new(Timing::default());
        transport.set_asset(Some(sine_asset("sine", RATE, duration)));
        (transport, AudioGraph::new(RATE))
    }

    fn advance(graph: &mut AudioGraph, seconds: f64) {
        graph.render_stereo((seconds * RATE as f64).round() as usize);
    }

    #[test]
    fn start_without_asset_does_nothing() {
        let mut transport = Transport::new(Timing::default());
        let mut graph = AudioGraph::new(RATE);
        assert!(transport.start(&mut graph, 0.0, PlayMode::Full).is_none());
        assert!(!transport.is_playing());
        assert_eq!(graph.voice_count(), 0);
    }

    #[test]
    fn start_fades_in_after_lead() {
        let (mut transport, mut graph) = transport(2.0);
        let token = transport.start(&mut graph, 0.0, PlayMode::Full).unwrap();

        let voice = graph.voice(token).unwrap();
        assert_eq!(voice.start_time(), 0.005);
        assert_eq!(voice.gain().value_at(0.005), 0.0);
        assert!((voice.gain().value_at(0.010) - 0.5).abs() < 1e-6);
        assert_eq!(voice.gain().value_at(0.02), 1.0);

        advance(&mut graph, 0.5);
        assert!((transport.position(&graph) - 0.495).abs() < 1e-9);
        assert!((transport.remaining(&graph) - 1.505).abs() < 1e-9);
    }

    #[test]
    fn offset_is_clamped() {
        let (mut transport, mut graph) = transport(1.0);
        let token = transport.start(&mut graph, 5.0, PlayMode::Full).unwrap();
        assert!((graph.voice(token).unwrap().position_seconds() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn restart_keeps_one_live_voice() {
        let (mut transport, mut graph) = transport(2.0);
        let first = transport.start(&mut graph, 0.0, PlayMode::Full).unwrap();
        advance(&mut graph, 0.1);
        let second = transport.start(&mut graph, 0.5, PlayMode::Full).unwrap();

        assert!(second > first);
        assert_eq!(transport.live_voice(), Some(second));
        assert_eq!(graph.live_voice_count(), 1);
        // The old voice is still fading out.
        assert_eq!(graph.voice_count(), 2);
        assert_eq!(graph.voice(first).unwrap().stop_time(), Some(0.1 + 0.03));

        advance(&mut graph, 0.05);
        assert_eq!(graph.voice_count(), 1);
        assert!(graph.voice(second).is_some());
    }

    #[test]
    fn stop_is_idempotent_and_cancels_poll() {
        let (mut transport, mut graph) = transport(2.0);
        transport.start(&mut graph, 0.0, PlayMode::Full);
        advance(&mut graph, 0.1);

        assert!(transport.stop(&mut graph));
        assert!(!transport.stop(&mut graph));
        assert!(!transport.is_playing());
        assert_eq!(transport.position(&graph), 0.0);
        assert_eq!(transport.tick(&mut graph), TickOutcome::Idle);
        assert_eq!(graph.live_voice_count(), 0);
    }

    #[test]
    fn stop_fades_out_before_release() {
        let (mut transport, mut graph) = transport(2.0);
        let token = transport.start(&mut graph, 0.0, PlayMode::Full).unwrap();
        advance(&mut graph, 0.1);
        transport.stop(&mut graph);

        let gain = graph.voice(token).unwrap().gain();
        assert!((gain.value_at(0.1) - 1.0).abs() < 1e-6);
        assert!((gain.value_at(0.115) - 0.5).abs() < 1e-3);
        assert_eq!(gain.value_at(0.14), 0.0);

        advance(&mut graph, 0.02);
        assert!(graph.voice(token).is_some());
        advance(&mut graph, 0.02);
        assert!(graph.voice(token).is_none());
    }

    #[test]
    fn tick_stops_at_end_of_asset() {
        let (mut transport, mut graph) = transport(0.1);
        transport.start(&mut graph, 0.0, PlayMode::Full);
        advance(&mut graph, 0.05);
        assert_eq!(transport.tick(&mut graph), TickOutcome::Playing);
        advance(&mut graph, 0.1);
        assert_eq!(transport.tick(&mut graph), TickOutcome::Ended);
        assert!(!transport.is_playing());
    }

    #[test]
    fn selection_playback_stops_at_selection_end() {
        let (mut transport, mut graph) = transport(1.0);
        let selection = Selection::new(0.2, 0.3);
        transport.start(&mut graph, 0.2, PlayMode::Selection(selection));
        assert_eq!(transport.playing_selection(), Some(selection));

        advance(&mut graph, 0.05);
        assert_eq!(transport.tick(&mut graph), TickOutcome::Playing);
        advance(&mut graph, 0.1);
        assert_eq!(transport.tick(&mut graph), TickOutcome::SelectionEnded);
        assert!(!transport.is_playing());
        assert_eq!(transport.playing_selection(), None);
    }

    #[test]
    fn loop_tracks_the_voice() {
        let (mut transport, mut graph) = transport(1.0);
        let selection = Selection::new(0.2, 0.3);
        let token = transport
            .start(&mut graph, 0.2, PlayMode::Loop(selection))
            .unwrap();

        let mut loops = 0;
        for _ in 0..40 {
            graph.render_stereo(128);
            match transport.tick(&mut graph) {
                TickOutcome::Looped => loops += 1,
                TickOutcome::Playing => {}
                outcome => panic!("unexpected {outcome:?}"),
            }
            let position = transport.position(&graph);
            let voice = graph.voice(token).unwrap().position_seconds();
            assert!((position - voice).abs() < 1e-6, "{position} vs {voice}");
            assert!((0.2..0.3).contains(&position), "{position}");
        }

        assert!(loops >= 5, "looped {loops} times");
        assert!(transport.is_looping());
        assert_eq!(transport.playing_selection(), Some(selection));
    }

    #[test]
    fn toggle_loop_starts_and_releases() {
        let (mut transport, mut graph) = transport(1.0);
        let selection = Selection::new(0.2, 0.4);

        transport.toggle_loop(&mut graph, selection);
        assert!(transport.is_looping());
        let token = transport.live_voice().unwrap();
        assert!(graph.voice(token).unwrap().loop_region().is_some());

        transport.toggle_loop(&mut graph, selection);
        assert!(!transport.is_looping());
        assert!(transport.is_playing());
        assert_eq!(graph.voice(token).unwrap().loop_region(), None);
        assert_eq!(transport.playing_selection(), Some(selection));
    }

    #[test]
    fn loop_on_while_playing_selection_keeps_voice() {
        let (mut transport, mut graph) = transport(1.0);
        let selection = Selection::new(0.2, 0.4);
        let token = transport
            .start(&mut graph, 0.2, PlayMode::Selection(selection))
            .unwrap();

        transport.toggle_loop(&mut graph, selection);
        assert_eq!(transport.live_voice(), Some(token));
        assert!(transport.is_looping());
        assert!(graph.voice(token).unwrap().loop_region().is_some());
    }

    #[test]
    fn speed_change_keeps_position_continuous() {
        let (mut transport, mut graph) = transport(2.0);
        let token = transport.start(&mut graph, 0.0, PlayMode::Full).unwrap();
        advance(&mut graph, 0.25);
        let before = transport.position(&graph);

        transport.set_speed(&mut graph, 2.0);
        assert!((transport.position(&graph) - before).abs() < 1e-9);
        assert_eq!(graph.voice(token).unwrap().playback_rate(), 2.0);

        advance(&mut graph, 0.1);
        assert!((transport.position(&graph) - (before + 0.2)).abs() < 1e-6);
        let voice = graph.voice(token).unwrap().position_seconds();
        assert!((transport.position(&graph) - voice).abs() < 1e-6);
    }

    #[test]
    fn speed_is_clamped() {
        let (mut transport, mut graph) = transport(1.0);
        transport.set_speed(&mut graph, 10.0);
        assert_eq!(transport.speed(), MAX_SPEED);
        transport.set_speed(&mut graph, 0.1);
        assert_eq!(transport.speed(), MIN_SPEED);
        transport.set_speed(&mut graph, f64::NAN);
        assert_eq!(transport.speed(), MIN_SPEED);
    }

    #[test]
    fn effective_duration_scales_with_speed() {
        let (mut transport, mut graph) = transport(10.0);
        transport.set_speed(&mut graph, 0.5);
        assert!((transport.effective_duration() - 20.0).abs() < 1e-6);
        transport.set_speed(&mut graph, 2.0);
        assert!((transport.effective_duration() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn pitch_shift_changes_rate() {
        let (mut transport, mut graph) = transport(1.0);
        transport.set_pitch_shift_semitones(&mut graph, 12.0);
        assert!((transport.effective_rate() - 2.0).abs() < 1e-12);
        transport.set_pitch_shift_semitones(&mut graph, -12.0);
        assert!((transport.effective_rate() - 0.5).abs() < 1e-12);
    }

    struct FixedRate(f64);

    impl PitchTransform for FixedRate {
        fn rate(&self, _speed: f64, _semitones: f64) -> f64 {
            self.0
        }
    }

    #[test]
    fn pitch_transform_is_pluggable() {
        let mut transport = Transport::with_pitch(Timing::default(), Box::new(FixedRate(1.5)));
        transport.set_asset(Some(sine_asset("sine", RATE, 1.0)));
        let mut graph = AudioGraph::new(RATE);
        let token = transport.start(&mut graph, 0.0, PlayMode::Full).unwrap();
        assert_eq!(graph.voice(token).unwrap().playback_rate(), 1.5);
    }

    #[test]
    fn master_volume_applies_live() {
        let (mut transport, mut graph) = transport(1.0);
        transport.set_master_volume(&mut graph, 1.5);
        assert_eq!(transport.master_volume(), 1.0);

        let token = transport.start(&mut graph, 0.0, PlayMode::Full).unwrap();
        advance(&mut graph, 0.1);
        transport.set_master_volume(&mut graph, 0.25);
        let gain = graph.voice(token).unwrap().gain();
        assert_eq!(gain.value_at(graph.current_time()), 0.25);

        transport.set_master_volume(&mut graph, -1.0);
        assert_eq!(transport.master_volume(), 0.0);
    }

    #[test]
    fn slider_mapping() {
        assert_eq!(slider_to_speed(0.0), 0.5);
        assert_eq!(slider_to_speed(50.0), 1.0);
        assert_eq!(slider_to_speed(100.0), 2.0);
        assert_eq!(slider_to_speed(25.0), 0.75);
        assert_eq!(speed_to_slider(0.5), 0.0);
        assert_eq!(speed_to_slider(1.0), 50.0);
        assert_eq!(speed_to_slider(2.0), 100.0);
        assert_eq!(speed_to_slider(1.5), 75.0);
    }
}
