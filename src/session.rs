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
//! The application context.
//!
//! A [`Session`] groups everything one performer interacts with: the audio
//! context (created on the first event, torn down by [`Session::close`]), the
//! loaded sample, the transport, the trigger pads, the selection and the
//! meters. Input arrives as [`UiEvent`]s and output leaves as [`UiState`]
//! snapshots taken on each display tick.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::asset::AudioAsset;
use crate::audio::decode::LoadError;
use crate::audio::graph::{AudioGraph, SharedGraph};
use crate::config::{ConfigError, Settings, Timing};
use crate::effects::{EffectName, FilterParam, ModulationEffect, ModulationParam};
use crate::meter::StereoMeter;
use crate::persistence::TriggerStore;
use crate::selection::{Handle, Selection, SelectionEditor};
use crate::transport::{PlayMode, TickOutcome, Transport};
use crate::triggers::{TriggerBank, TRIGGER_SLOTS};
use crate::waveform;

/// Width of the waveform view until the first resize.
pub const DEFAULT_WIDTH: f64 = 800.0;

/// A discrete input from the performer.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    /// Start playing at the given offset in seconds.
    StartAt(f64),
    /// Start playing at a trigger pad's point.
    StartPad(usize),
    Stop,
    /// Stop when playing, otherwise start from the beginning.
    TogglePlay,
    /// Store the playhead in the next trigger slot.
    Mark,
    /// Clear the selection and every trigger point.
    ClearAll,
    SetSpeed(f64),
    SetPitchShiftSemitones(f64),
    SetMasterVolume(f32),
    EffectEngage {
        name: EffectName,
        active: bool,
    },
    FilterSet {
        param: FilterParam,
        value: f32,
    },
    ModulationToggle {
        effect: ModulationEffect,
        active: bool,
    },
    ModulationSet {
        effect: ModulationEffect,
        param: ModulationParam,
        value: f32,
    },
    ResetFilters,
    /// Pointer down on the waveform at x.
    SelectionDragStart(f64),
    SelectionDrag(f64),
    SelectionDragEnd,
    /// Selects a region given in seconds.
    Select {
        start: f64,
        end: f64,
    },
    ClearSelection,
    HandleDragStart(Handle),
    HandleDrag(f64),
    HandleDragEnd,
    TriggerDragStart(usize),
    TriggerDrag(f64),
    TriggerDragEnd,
    PlaySelection,
    ToggleLoopSelection,
    /// The waveform view changed width.
    Resize(f64),
}

/// A value per output channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StereoValue<T> {
    pub left: T,
    pub right: T,
}

/// The selection as shown to the performer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SelectionState {
    pub start: f64,
    pub end: f64,
    pub looping: bool,
}

/// Everything a display needs to draw one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UiState {
    pub is_playing: bool,
    pub position_seconds: f64,
    pub effective_duration_seconds: f64,
    pub remaining_seconds: f64,
    pub playhead_x: f64,
    /// The committed selection.
    pub selection: Option<SelectionState>,
    /// The region under the pointer while a selection drag is under way.
    pub drag_selection: Option<Selection>,
    pub trigger_points: [Option<f64>; TRIGGER_SLOTS],
    pub current_pad_index: usize,
    pub meter_percent: StereoValue<f32>,
    pub peak_percent: StereoValue<f32>,
    pub peak_active: StereoValue<bool>,
    pub hot: StereoValue<bool>,
    pub sample_id: Option<String>,
    pub warning: Option<String>,
}

/// Identifies one load request. Only the most recent ticket is honored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
    sample_id: String,
}

impl LoadTicket {
    pub fn sample_id(&self) -> &str {
        &self.sample_id
    }
}

pub struct Session {
    sample_rate: u32,
    timing: Timing,
    graph: SharedGraph,
    transport: Transport,
    triggers: TriggerBank,
    selection: SelectionEditor,
    meter: StereoMeter,
    store: Box<dyn TriggerStore>,
    sample_id: Option<String>,
    width: f64,
    load_generation: u64,
    dragging_trigger: Option<usize>,
    warning: Option<String>,
}

impl Session {
    pub fn new(settings: &Settings, store: Box<dyn TriggerStore>) -> Result<Session, ConfigError> {
        let timing = settings.transport.timing()?;
        Ok(Session {
            sample_rate: settings.audio.sample_rate(),
            timing,
            graph: Arc::new(Mutex::new(None)),
            transport: Transport::new(timing),
            triggers: TriggerBank::new(),
            selection: SelectionEditor::new(timing.min_selection, timing.handle_gap),
            meter: StereoMeter::new(settings.metering.clone()),
            store,
            sample_id: None,
            width: DEFAULT_WIDTH,
            load_generation: 0,
            dragging_trigger: None,
            warning: None,
        })
    }

    /// The graph slot to hand to a renderer.
    pub fn graph(&self) -> SharedGraph {
        Arc::clone(&self.graph)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn has_context(&self) -> bool {
        self.graph.lock().is_some()
    }

    /// Creates the audio context if there is none. Returns true when one was
    /// created.
    pub fn ensure_context(&self) -> bool {
        let mut slot = self.graph.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(AudioGraph::new(self.sample_rate));
        info!(sample_rate = self.sample_rate, "Created audio context");
        true
    }

    /// Tears the audio context down. The next event creates a fresh one.
    pub fn close(&mut self) {
        {
            let mut slot = self.graph.lock();
            if let Some(graph) = slot.as_mut() {
                graph.silence();
            }
            *slot = None;
        }
        self.transport.reset();
        self.meter.reset();
        self.dragging_trigger = None;
        info!("Closed audio context");
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn triggers(&self) -> &TriggerBank {
        &self.triggers
    }

    pub fn selection(&self) -> &SelectionEditor {
        &self.selection
    }

    pub fn meter(&self) -> &StereoMeter {
        &self.meter
    }

    pub fn is_playing(&self) -> bool {
        self.transport.is_playing()
    }

    pub fn sample_id(&self) -> Option<&str> {
        self.sample_id.as_deref()
    }

    pub fn warning(&self) -> Option<&str> {
        self.warning.as_deref()
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    /// Starts a load. Any load started earlier becomes stale.
    pub fn begin_load(&mut self, sample_id: &str) -> LoadTicket {
        self.load_generation += 1;
        debug!(sample = sample_id, generation = self.load_generation, "Loading sample");
        LoadTicket {
            generation: self.load_generation,
            sample_id: sample_id.to_string(),
        }
    }

    /// Completes a load. Returns Ok(false) when the ticket is stale. A failed
    /// decode leaves the session exactly as it was.
    pub fn finish_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<AudioAsset, LoadError>,
    ) -> Result<bool, LoadError> {
        if ticket.generation != self.load_generation {
            debug!(sample = %ticket.sample_id, "Ignoring stale load");
            return Ok(false);
        }
        match result {
            Ok(asset) => {
                self.install(&ticket.sample_id, asset);
                Ok(true)
            }
            Err(e) => {
                warn!(err = %e, sample = %ticket.sample_id, "Failed to load sample");
                Err(e)
            }
        }
    }

    /// Loads an already decoded asset under its own id.
    pub fn load(&mut self, asset: AudioAsset) {
        let ticket = self.begin_load(asset.id());
        self.install(&ticket.sample_id, asset);
    }

    fn install(&mut self, sample_id: &str, asset: AudioAsset) {
        {
            let mut slot = self.graph.lock();
            match slot.as_mut() {
                Some(graph) => {
                    self.transport.stop(graph);
                }
                None => self.transport.reset(),
            }
        }

        let asset = Arc::new(asset);
        let duration = asset.duration();
        self.transport.set_asset(Some(Arc::clone(&asset)));
        self.selection.clear();
        self.meter.reset();
        self.dragging_trigger = None;
        self.sample_id = Some(sample_id.to_string());

        match self.store.load(sample_id) {
            Ok(Some(record)) => {
                let dropped = self.triggers.restore(&record, duration);
                if dropped > 0 {
                    info!(sample = sample_id, dropped, "Discarded trigger points outside the sample");
                }
            }
            Ok(None) => {
                self.triggers.clear();
                self.save_triggers();
            }
            Err(e) => {
                self.triggers.clear();
                warn!(err = %e, sample = sample_id, "Unable to load trigger points");
                self.warning = Some(format!("Unable to load trigger points: {}", e));
            }
        }

        info!(
            sample = sample_id,
            duration,
            channels = asset.source_channels(),
            sample_rate = asset.sample_rate(),
            "Loaded sample"
        );
    }

    fn save_triggers(&mut self) {
        let Some(sample_id) = self.sample_id.as_deref() else {
            return;
        };
        match self.store.save(sample_id, &self.triggers.record()) {
            Ok(()) => self.warning = None,
            Err(e) => {
                warn!(err = %e, sample = sample_id, "Unable to save trigger points");
                self.warning = Some(format!("Unable to save trigger points: {}", e));
            }
        }
    }

    fn duration(&self) -> f64 {
        self.transport.duration()
    }

    fn x_to_time(&self, x: f64) -> f64 {
        waveform::x_to_time(x, self.duration(), self.width)
    }

    /// Applies one event. Invalid events are ignored. Trigger points are
    /// saved after the graph lock is released so storage never blocks the
    /// renderer.
    pub fn handle_event(&mut self, event: UiEvent) {
        self.ensure_context();
        let graph = Arc::clone(&self.graph);
        let mut slot = graph.lock();
        let Some(graph) = slot.as_mut() else {
            return;
        };
        let now = graph.current_time();
        let loaded = self.transport.asset().is_some();
        let mut needs_save = false;

        match event {
            UiEvent::StartAt(offset) => {
                self.transport.start(graph, offset, PlayMode::Full);
            }
            UiEvent::StartPad(slot) => match self.triggers.point(slot) {
                Some(time) => {
                    self.transport.start(graph, time, PlayMode::Full);
                }
                None => debug!(slot, "Trigger pad is empty"),
            },
            UiEvent::Stop => {
                self.transport.stop(graph);
                self.meter.reset();
            }
            UiEvent::TogglePlay => {
                if self.transport.is_playing() {
                    self.transport.stop(graph);
                    self.meter.reset();
                } else {
                    self.transport.start(graph, 0.0, PlayMode::Full);
                }
            }
            UiEvent::Mark => {
                if !self.transport.is_playing() {
                    debug!("Ignoring mark while stopped");
                    return;
                }
                let position = self.transport.position(graph);
                let slot = self.triggers.mark(position);
                info!(slot, position, "Marked trigger point");
                needs_save = true;
            }
            UiEvent::ClearAll => {
                self.selection.clear();
                self.transport.release_selection(graph);
                if self.triggers.points().iter().any(Option::is_some) {
                    self.triggers.clear();
                    needs_save = true;
                }
            }
            UiEvent::SetSpeed(speed) => self.transport.set_speed(graph, speed),
            UiEvent::SetPitchShiftSemitones(semitones) => {
                self.transport.set_pitch_shift_semitones(graph, semitones)
            }
            UiEvent::SetMasterVolume(volume) => self.transport.set_master_volume(graph, volume),
            UiEvent::EffectEngage { name, active } => {
                graph.effects_mut().trigger(name, active, now);
            }
            UiEvent::FilterSet { param, value } => {
                graph.modulation_mut().set_filter(param, value, now);
            }
            UiEvent::ModulationToggle { effect, active } => {
                graph.modulation_mut().toggle(effect, active);
            }
            UiEvent::ModulationSet {
                effect,
                param,
                value,
            } => {
                if graph.modulation_mut().set_param(effect, param, value).is_none() {
                    debug!(?effect, ?param, "Modulation stage has no such parameter");
                }
            }
            UiEvent::ResetFilters => graph.modulation_mut().reset_filters(now),
            UiEvent::SelectionDragStart(x) if loaded => {
                let time = self.x_to_time(x);
                self.selection.begin(time);
            }
            UiEvent::SelectionDrag(x) => {
                let time = self.x_to_time(x);
                self.selection.drag(time);
            }
            UiEvent::SelectionDragEnd => {
                if self.selection.is_dragging() {
                    let selection = self.selection.end();
                    debug!(?selection, "Selection committed");
                }
            }
            UiEvent::Select { start, end } if loaded => {
                let duration = self.duration();
                self.selection.begin(start.clamp(0.0, duration));
                self.selection.drag(end.clamp(0.0, duration));
                self.selection.end();
            }
            UiEvent::ClearSelection => {
                self.selection.clear();
                self.transport.release_selection(graph);
            }
            UiEvent::HandleDragStart(handle) => {
                if !self.selection.begin_handle(handle) {
                    debug!(%handle, "No selection handle to grab");
                }
            }
            UiEvent::HandleDrag(x) => {
                let time = self.x_to_time(x);
                if let Some(selection) = self.selection.drag_handle(time, self.duration()) {
                    self.transport.update_selection(graph, selection);
                }
            }
            UiEvent::HandleDragEnd => {
                if let Some(selection) = self.selection.end_handle() {
                    self.transport.update_selection(graph, selection);
                }
            }
            UiEvent::TriggerDragStart(slot) => {
                if self.triggers.point(slot).is_some() {
                    self.dragging_trigger = Some(slot);
                }
            }
            UiEvent::TriggerDrag(x) => {
                if let Some(slot) = self.dragging_trigger {
                    let time = self.x_to_time(x);
                    self.triggers.set_point(slot, time, self.duration());
                }
            }
            UiEvent::TriggerDragEnd => {
                if let Some(slot) = self.dragging_trigger.take() {
                    debug!(slot, time = ?self.triggers.point(slot), "Trigger point moved");
                    needs_save = true;
                }
            }
            UiEvent::PlaySelection => match self.selection.committed() {
                Some(selection) => {
                    self.transport
                        .start(graph, selection.start, PlayMode::Selection(selection));
                }
                None => debug!("No selection to play"),
            },
            UiEvent::ToggleLoopSelection => match self.selection.committed() {
                Some(selection) => self.transport.toggle_loop(graph, selection),
                None => debug!("No selection to loop"),
            },
            UiEvent::Resize(width) => {
                if width.is_finite() && width > 0.0 {
                    self.width = width;
                }
            }
            UiEvent::SelectionDragStart(_) | UiEvent::Select { .. } => {
                debug!("Ignoring selection without a loaded sample");
            }
        }

        drop(slot);
        if needs_save {
            self.save_triggers();
        }
    }

    /// The display tick: polls the transport and updates the meters.
    pub fn tick(&mut self) -> TickOutcome {
        let graph = Arc::clone(&self.graph);
        let mut slot = graph.lock();
        let Some(graph) = slot.as_mut() else {
            return TickOutcome::Idle;
        };

        let outcome = self.transport.tick(graph);
        if self.transport.is_playing() {
            self.meter.update(graph.meter_tap());
        } else if outcome.stopped() {
            self.meter.reset();
        }
        outcome
    }

    /// Takes a snapshot for display.
    pub fn state(&self) -> UiState {
        let (position, remaining) = match self.graph.lock().as_ref() {
            Some(graph) => (
                self.transport.position(graph),
                self.transport.remaining(graph),
            ),
            None => (0.0, self.transport.effective_duration()),
        };
        let duration = self.duration();
        let stereo = |f: &dyn Fn(usize) -> f32| StereoValue {
            left: f(0),
            right: f(1),
        };

        UiState {
            is_playing: self.transport.is_playing(),
            position_seconds: position,
            effective_duration_seconds: self.transport.effective_duration(),
            remaining_seconds: remaining,
            playhead_x: waveform::playhead_x(position, duration, self.width),
            selection: self.selection.committed().map(|selection| SelectionState {
                start: selection.start,
                end: selection.end,
                looping: self.transport.is_looping(),
            }),
            drag_selection: self.selection.pending(),
            trigger_points: self.triggers.points(),
            current_pad_index: self.triggers.cursor(),
            meter_percent: stereo(&|ch| self.meter.channel(ch).percent),
            peak_percent: stereo(&|ch| self.meter.channel(ch).peak),
            peak_active: StereoValue {
                left: self.meter.channel(0).peak_active,
                right: self.meter.channel(1).peak_active,
            },
            hot: StereoValue {
                left: self.meter.is_hot(0),
                right: self.meter.is_hot(1),
            },
            sample_id: self.sample_id.clone(),
            warning: self.warning.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::audio::decode::LoadError;
    use crate::config::Settings;
    use crate::persistence::{storage_key, MemoryStore, PersistError, TriggerStore};
    use crate::testutil::sine_asset;
    use crate::triggers::TriggerRecord;

    use super::*;

    fn settings() -> Settings {
        Settings::from_yaml("audio:\n  sample_rate: 8000\n").unwrap()
    }

    fn asset(id: &str, seconds: f32) -> AudioAsset {
        (*sine_asset(id, 8000, seconds)).clone()
    }

    fn render(session: &Session, seconds: f64) {
        let frames = (seconds * session.sample_rate() as f64).round() as usize;
        session
            .graph()
            .lock()
            .as_mut()
            .expect("context")
            .render_stereo(frames);
    }

    struct FailingStore;

    impl TriggerStore for FailingStore {
        fn load(&self, _sample_id: &str) -> Result<Option<TriggerRecord>, PersistError> {
            Ok(None)
        }

        fn save(&mut self, _sample_id: &str, _record: &TriggerRecord) -> Result<(), PersistError> {
            Err(PersistError::Unavailable("quota exceeded".to_string()))
        }

        fn sample_ids(&self) -> Result<Vec<String>, PersistError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn context_is_lazy_and_closable() {
        let mut session = Session::new(&settings(), Box::new(MemoryStore::new())).unwrap();
        assert!(!session.has_context());

        session.handle_event(UiEvent::Resize(400.0));
        assert!(session.has_context());
        assert_eq!(session.width(), 400.0);

        session.close();
        assert!(!session.has_context());
        assert_eq!(session.tick(), TickOutcome::Idle);

        session.handle_event(UiEvent::Stop);
        assert!(session.has_context());
    }

    #[test]
    fn close_stops_playback() {
        let mut session = Session::new(&settings(), Box::new(MemoryStore::new())).unwrap();
        session.load(asset("dub", 1.0));
        session.handle_event(UiEvent::StartAt(0.0));
        assert!(session.is_playing());

        session.close();
        assert!(!session.is_playing());
        assert_eq!(session.state().position_seconds, 0.0);
    }

    #[test]
    fn load_restores_triggers_and_drops_stale_points() {
        let mut store = MemoryStore::new();
        store.insert_raw(
            &storage_key("dub"),
            r#"{"triggerPoints":[0.5,null,7.5,0.25],"currentPadIndex":2}"#,
        );
        let mut session = Session::new(&settings(), Box::new(store)).unwrap();
        session.load(asset("dub", 1.0));

        assert_eq!(session.triggers().points(), [Some(0.5), None, None, Some(0.25)]);
        assert_eq!(session.triggers().cursor(), 2);
        assert_eq!(session.sample_id(), Some("dub"));
    }

    #[test]
    fn load_without_record_clears_triggers() {
        let mut session = Session::new(&settings(), Box::new(MemoryStore::new())).unwrap();
        session.load(asset("first", 1.0));
        session.handle_event(UiEvent::StartAt(0.0));
        render(&session, 0.1);
        session.handle_event(UiEvent::Mark);
        assert!(session.triggers().point(0).is_some());
        session.handle_event(UiEvent::Select {
            start: 0.1,
            end: 0.5,
        });
        assert!(session.selection().committed().is_some());

        session.load(asset("second", 1.0));
        assert_eq!(session.triggers().points(), [None; 4]);
        assert!(session.selection().committed().is_none());
        assert!(!session.is_playing());
    }

    #[test]
    fn stale_load_is_ignored() {
        let mut session = Session::new(&settings(), Box::new(MemoryStore::new())).unwrap();
        let first = session.begin_load("first");
        let second = session.begin_load("second");

        assert!(session.finish_load(second, Ok(asset("second", 1.0))).unwrap());
        assert!(!session.finish_load(first, Ok(asset("first", 2.0))).unwrap());
        assert_eq!(session.sample_id(), Some("second"));
        assert!((session.transport().duration() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn failed_load_leaves_state_untouched() {
        let mut session = Session::new(&settings(), Box::new(MemoryStore::new())).unwrap();
        session.load(asset("dub", 1.0));
        session.handle_event(UiEvent::StartAt(0.0));
        render(&session, 0.2);
        session.handle_event(UiEvent::Mark);
        session.handle_event(UiEvent::EffectEngage {
            name: EffectName::Delay2,
            active: true,
        });
        let before = session.state();

        let ticket = session.begin_load("broken");
        let result = session.finish_load(ticket, Err(LoadError::NoAudioTrack));
        assert!(matches!(result, Err(LoadError::NoAudioTrack)));

        assert_eq!(session.state(), before);
        assert!(session.is_playing());
        let engaged = session
            .graph()
            .lock()
            .as_ref()
            .and_then(|graph| graph.effects().chain(EffectName::Delay2).map(|c| c.is_engaged()));
        assert_eq!(engaged, Some(true));
    }

    #[test]
    fn mark_requires_playback() {
        let mut session = Session::new(&settings(), Box::new(MemoryStore::new())).unwrap();
        session.load(asset("dub", 1.0));
        session.handle_event(UiEvent::Mark);
        assert_eq!(session.triggers().points(), [None; 4]);

        session.handle_event(UiEvent::StartAt(0.0));
        render(&session, 0.255);
        session.handle_event(UiEvent::Mark);
        let point = session.triggers().point(0).unwrap();
        assert!((point - 0.25).abs() < 1e-6, "{point}");
        assert_eq!(session.triggers().cursor(), 1);
    }

    #[test]
    fn save_failure_surfaces_warning() {
        let mut session = Session::new(&settings(), Box::new(FailingStore)).unwrap();
        session.load(asset("dub", 1.0));
        assert!(session.warning().is_some());

        session.handle_event(UiEvent::StartAt(0.0));
        render(&session, 0.1);
        session.handle_event(UiEvent::Mark);

        // The in-memory bank still holds the point.
        assert!(session.triggers().point(0).is_some());
        let state = session.state();
        assert!(state.warning.unwrap().contains("quota exceeded"));
    }

    #[test]
    fn trigger_drag_moves_and_saves() {
        let mut session = Session::new(&settings(), Box::new(MemoryStore::new())).unwrap();
        session.load(asset("dub", 2.0));
        session.handle_event(UiEvent::Resize(200.0));
        session.handle_event(UiEvent::StartAt(0.0));
        render(&session, 0.1);
        session.handle_event(UiEvent::Mark);

        // Empty slots cannot be dragged.
        session.handle_event(UiEvent::TriggerDragStart(2));
        session.handle_event(UiEvent::TriggerDrag(50.0));
        assert_eq!(session.triggers().point(2), None);

        session.handle_event(UiEvent::TriggerDragStart(0));
        session.handle_event(UiEvent::TriggerDrag(150.0));
        session.handle_event(UiEvent::TriggerDrag(500.0));
        session.handle_event(UiEvent::TriggerDragEnd);
        assert_eq!(session.triggers().point(0), Some(2.0));
    }

    #[test]
    fn selection_gestures() {
        let mut session = Session::new(&settings(), Box::new(MemoryStore::new())).unwrap();
        session.handle_event(UiEvent::SelectionDragStart(10.0));
        assert!(!session.selection().is_dragging());

        session.load(asset("dub", 4.0));
        session.handle_event(UiEvent::Resize(400.0));
        session.handle_event(UiEvent::SelectionDragStart(300.0));
        session.handle_event(UiEvent::SelectionDrag(100.0));
        session.handle_event(UiEvent::SelectionDragEnd);
        let selection = session.selection().committed().unwrap();
        assert_eq!((selection.start, selection.end), (1.0, 3.0));

        session.handle_event(UiEvent::HandleDragStart(Handle::Left));
        session.handle_event(UiEvent::HandleDrag(350.0));
        session.handle_event(UiEvent::HandleDragEnd);
        let selection = session.selection().committed().unwrap();
        assert!((selection.start - 2.95).abs() < 1e-9);

        // A click without a drag clears the selection.
        session.handle_event(UiEvent::SelectionDragStart(200.0));
        session.handle_event(UiEvent::SelectionDragEnd);
        assert!(session.selection().committed().is_none());
    }

    #[test]
    fn clear_all_clears_selection_and_triggers() {
        let mut session = Session::new(&settings(), Box::new(MemoryStore::new())).unwrap();
        session.load(asset("dub", 2.0));
        session.handle_event(UiEvent::Select {
            start: 0.5,
            end: 1.0,
        });
        session.handle_event(UiEvent::ToggleLoopSelection);
        render(&session, 0.1);
        session.handle_event(UiEvent::Mark);

        session.handle_event(UiEvent::ClearAll);
        assert!(session.selection().committed().is_none());
        assert_eq!(session.triggers().points(), [None; 4]);
        assert!(!session.transport().is_looping());
        assert!(session.is_playing());
    }

    /// Records whether the graph lock was free each time a save ran.
    struct LockCheckingStore {
        graph: Arc<Mutex<Option<SharedGraph>>>,
        saves: Arc<Mutex<Vec<bool>>>,
    }

    impl TriggerStore for LockCheckingStore {
        fn load(&self, _sample_id: &str) -> Result<Option<TriggerRecord>, PersistError> {
            Ok(None)
        }

        fn save(&mut self, _sample_id: &str, _record: &TriggerRecord) -> Result<(), PersistError> {
            if let Some(graph) = self.graph.lock().as_ref() {
                self.saves.lock().push(graph.try_lock().is_some());
            }
            Ok(())
        }

        fn sample_ids(&self) -> Result<Vec<String>, PersistError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn saves_run_without_the_graph_lock() {
        let graph = Arc::new(Mutex::new(None));
        let saves = Arc::new(Mutex::new(Vec::new()));
        let store = LockCheckingStore {
            graph: Arc::clone(&graph),
            saves: Arc::clone(&saves),
        };
        let mut session = Session::new(&settings(), Box::new(store)).unwrap();
        *graph.lock() = Some(session.graph());

        session.load(asset("dub", 2.0));
        session.handle_event(UiEvent::StartAt(0.0));
        render(&session, 0.1);
        session.handle_event(UiEvent::Mark);
        session.handle_event(UiEvent::TriggerDragStart(0));
        session.handle_event(UiEvent::TriggerDrag(200.0));
        session.handle_event(UiEvent::TriggerDragEnd);
        session.handle_event(UiEvent::ClearAll);

        assert_eq!(*saves.lock(), vec![true; 4]);
    }

    #[test]
    fn selection_in_progress_does_not_play() {
        let mut session = Session::new(&settings(), Box::new(MemoryStore::new())).unwrap();
        session.load(asset("dub", 4.0));
        session.handle_event(UiEvent::Resize(400.0));

        session.handle_event(UiEvent::SelectionDragStart(100.0));
        let state = session.state();
        assert_eq!(state.selection, None);
        assert_eq!(state.drag_selection, Some(Selection { start: 1.0, end: 1.0 }));

        session.handle_event(UiEvent::PlaySelection);
        assert!(!session.is_playing());
        session.handle_event(UiEvent::ToggleLoopSelection);
        assert!(!session.is_playing());

        // Too short to commit, so it stays absent once released.
        session.handle_event(UiEvent::SelectionDrag(105.0));
        session.handle_event(UiEvent::SelectionDragEnd);
        assert_eq!(session.state().drag_selection, None);
        session.handle_event(UiEvent::PlaySelection);
        assert!(!session.is_playing());

        session.handle_event(UiEvent::SelectionDragStart(100.0));
        session.handle_event(UiEvent::SelectionDrag(200.0));
        session.handle_event(UiEvent::SelectionDragEnd);
        session.handle_event(UiEvent::PlaySelection);
        assert!(session.is_playing());
    }

    #[test]
    fn state_serializes_in_camel_case() {
        let mut session = Session::new(&settings(), Box::new(MemoryStore::new())).unwrap();
        session.load(asset("dub", 1.0));
        let json = serde_json::to_value(session.state()).unwrap();
        assert_eq!(json["isPlaying"], false);
        assert_eq!(json["sampleId"], "dub");
        assert_eq!(json["currentPadIndex"], 0);
        assert_eq!(json["meterPercent"]["left"], 0.0);
        assert!(json["selection"].is_null());
        assert!(json["dragSelection"].is_null());
        assert_eq!(json["triggerPoints"].as_array().map(Vec::len), Some(4));
    }
}
