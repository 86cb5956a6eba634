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

//! The four trigger pads.
//!
//! Marking while playing stores the playhead in the slot under the
//! round-robin cursor and advances the cursor, so the oldest point is the
//! next one overwritten.

use serde::{Deserialize, Serialize};

pub const TRIGGER_SLOTS: usize = 4;

/// The persisted form of a trigger bank.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerRecord {
    #[serde(default)]
    pub trigger_points: Vec<Option<f64>>,
    #[serde(default)]
    pub current_pad_index: usize,
}

/// Trigger points in seconds plus the slot the next mark lands in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriggerBank {
    points: [Option<f64>; TRIGGER_SLOTS],
    cursor: usize,
}

impl TriggerBank {
    pub fn new() -> TriggerBank {
        TriggerBank::default()
    }

    pub fn points(&self) -> [Option<f64>; TRIGGER_SLOTS] {
        self.points
    }

    pub fn point(&self, slot: usize) -> Option<f64> {
        self.points.get(slot).copied().flatten()
    }

    /// The slot the next mark will be written to.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Stores `position` in the cursor slot and advances the cursor. Returns
    /// the slot written.
    pub fn mark(&mut self, position: f64) -> usize {
        let slot = self.cursor;
        self.points[slot] = Some(position);
        self.cursor = (self.cursor + 1) % TRIGGER_SLOTS;
        slot
    }

    /// Moves an existing point, clamped to `[0, duration]`. Returns the time
    /// stored, or None when the slot is out of range.
    pub fn set_point(&mut self, slot: usize, time: f64, duration: f64) -> Option<f64> {
        let point = self.points.get_mut(slot)?;
        let time = time.clamp(0.0, duration.max(0.0));
        *point = Some(time);
        Some(time)
    }

    /// Empties every slot and rewinds the cursor.
    pub fn clear(&mut self) {
        *self = TriggerBank::default();
    }

    pub fn record(&self) -> TriggerRecord {
        TriggerRecord {
            trigger_points: self.points.to_vec(),
            current_pad_index: self.cursor,
        }
    }

    /// Replaces the bank with a stored record. Points that are not within
    /// `[0, duration]` are dropped. Returns how many were dropped.
    pub fn restore(&mut self, record: &TriggerRecord, duration: f64) -> usize {
        let mut dropped = 0;
        let mut points = [None; TRIGGER_SLOTS];
        for (slot, point) in record
            .trigger_points
            .iter()
            .take(TRIGGER_SLOTS)
            .enumerate()
        {
            match point {
                Some(time) if time.is_finite() && *time >= 0.0 && *time <= duration => {
                    points[slot] = Some(*time)
                }
                Some(_) => dropped += 1,
                None => {}
            }
        }
        self.points = points;
        self.cursor = record.current_pad_index % TRIGGER_SLOTS;
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::{TriggerBank, TriggerRecord};

    #[test]
    fn marks_round_robin() {
        let mut bank = TriggerBank::new();
        assert_eq!(bank.mark(1.0), 0);
        assert_eq!(bank.mark(2.0), 1);
        assert_eq!(bank.mark(3.0), 2);
        assert_eq!(bank.mark(4.0), 3);
        assert_eq!(bank.cursor(), 0);
        assert_eq!(bank.points(), [Some(1.0), Some(2.0), Some(3.0), Some(4.0)]);

        assert_eq!(bank.mark(5.0), 0);
        assert_eq!(bank.point(0), Some(5.0));
        assert_eq!(bank.cursor(), 1);
    }

    #[test]
    fn clear_resets_cursor() {
        let mut bank = TriggerBank::new();
        bank.mark(1.0);
        bank.mark(2.0);
        bank.clear();
        assert_eq!(bank.points(), [None; 4]);
        assert_eq!(bank.cursor(), 0);
    }

    #[test]
    fn set_point_clamps() {
        let mut bank = TriggerBank::new();
        assert_eq!(bank.set_point(2, 12.0, 10.0), Some(10.0));
        assert_eq!(bank.set_point(1, -1.0, 10.0), Some(0.0));
        assert_eq!(bank.set_point(7, 1.0, 10.0), None);
        assert_eq!(bank.cursor(), 0);
    }

    #[test]
    fn record_json_layout() {
        let mut bank = TriggerBank::new();
        bank.mark(1.5);
        let json = serde_json::to_string(&bank.record()).unwrap();
        assert_eq!(
            json,
            r#"{"triggerPoints":[1.5,null,null,null],"currentPadIndex":1}"#
        );
    }

    #[test]
    fn restore_discards_out_of_range_points() {
        let record = TriggerRecord {
            trigger_points: vec![Some(1.0), Some(12.0), None, Some(-0.5), Some(2.0)],
            current_pad_index: 6,
        };
        let mut bank = TriggerBank::new();
        assert_eq!(bank.restore(&record, 10.0), 2);
        assert_eq!(bank.points(), [Some(1.0), None, None, None]);
        assert_eq!(bank.cursor(), 2);
    }

    #[test]
    fn restore_tolerates_short_records() {
        let record: TriggerRecord = serde_json::from_str(r#"{"triggerPoints":[3.0]}"#).unwrap();
        let mut bank = TriggerBank::new();
        assert_eq!(bank.restore(&record, 10.0), 0);
        assert_eq!(bank.points(), [Some(3.0), None, None, None]);
        assert_eq!(bank.cursor(), 0);
    }
}
