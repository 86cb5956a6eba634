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

//! Selection region editing.
//!
//! A region is created by dragging across the waveform and then adjusted
//! with its two handles. Times are seconds; callers convert pointer
//! coordinates with [`crate::waveform::x_to_time`], which already clamps to
//! the visible range.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// A selected region, always with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Selection {
    pub start: f64,
    pub end: f64,
}

impl Selection {
    /// Creates a selection from two times in either order.
    pub fn new(a: f64, b: f64) -> Selection {
        Selection {
            start: a.min(b),
            end: a.max(b),
        }
    }

    pub fn length(&self) -> f64 {
        self.end - self.start
    }
}

/// One of the two selection handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handle {
    Left,
    Right,
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handle::Left => f.write_str("left"),
            Handle::Right => f.write_str("right"),
        }
    }
}

impl FromStr for Handle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "left" | "start" => Ok(Handle::Left),
            "right" | "end" => Ok(Handle::Right),
            _ => Err(format!("unknown handle: {}", s)),
        }
    }
}

/// Moves one handle of `selection` to `time`, keeping at least `gap` seconds
/// between the handles and both within `[0, duration]`.
pub fn clamp_handle(
    selection: Selection,
    handle: Handle,
    time: f64,
    duration: f64,
    gap: f64,
) -> Selection {
    let time = time.clamp(0.0, duration.max(0.0));
    match handle {
        Handle::Left => Selection {
            start: time.min(selection.end - gap).max(0.0),
            end: selection.end,
        },
        Handle::Right => Selection {
            start: selection.start,
            end: time.max(selection.start + gap).min(duration.max(0.0)),
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Drag {
    Region { anchor: f64, current: f64 },
    Handle(Handle),
}

/// Tracks the current selection through drag gestures.
#[derive(Debug, Clone)]
pub struct SelectionEditor {
    selection: Option<Selection>,
    drag: Option<Drag>,
    min_length: f64,
    handle_gap: f64,
}

impl SelectionEditor {
    pub fn new(min_length: f64, handle_gap: f64) -> SelectionEditor {
        SelectionEditor {
            selection: None,
            drag: None,
            min_length,
            handle_gap,
        }
    }

    /// The committed selection. None while a region drag is under way:
    /// the region only counts once [`SelectionEditor::end`] accepts it.
    pub fn committed(&self) -> Option<Selection> {
        self.selection
    }

    /// The normalized region being dragged, whatever its length.
    pub fn pending(&self) -> Option<Selection> {
        match self.drag {
            Some(Drag::Region { anchor, current }) => Some(Selection::new(anchor, current)),
            _ => None,
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Starts a new region at `time`, replacing any existing selection.
    pub fn begin(&mut self, time: f64) {
        self.selection = None;
        self.drag = Some(Drag::Region {
            anchor: time,
            current: time,
        });
    }

    pub fn drag(&mut self, time: f64) {
        if let Some(Drag::Region { current, .. }) = &mut self.drag {
            *current = time;
        }
    }

    /// Commits the region being dragged. Regions shorter than the minimum
    /// length are discarded.
    pub fn end(&mut self) -> Option<Selection> {
        if let Some(Drag::Region { anchor, current }) = self.drag {
            self.drag = None;
            let selection = Selection::new(anchor, current);
            self.selection = (selection.length() >= self.min_length).then_some(selection);
        }
        self.selection
    }

    /// Grabs a handle of the existing selection. Returns false when there is
    /// nothing to grab.
    pub fn begin_handle(&mut self, handle: Handle) -> bool {
        if self.selection.is_none() || self.drag.is_some() {
            return false;
        }
        self.drag = Some(Drag::Handle(handle));
        true
    }

    pub fn drag_handle(&mut self, time: f64, duration: f64) -> Option<Selection> {
        let (Some(Drag::Handle(handle)), Some(selection)) = (self.drag, self.selection) else {
            return None;
        };
        let moved = clamp_handle(selection, handle, time, duration, self.handle_gap);
        self.selection = Some(moved);
        Some(moved)
    }

    pub fn end_handle(&mut self) -> Option<Selection> {
        if let Some(Drag::Handle(_)) = self.drag {
            self.drag = None;
        }
        self.selection
    }

    pub fn clear(&mut self) {
        self.selection = None;
        self.drag = None;
    }
}
