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

//! Trigger point storage.
//!
//! Records live in a flat string key/value map under
//! `triggerPoints_<sample id>`, each value being the record's JSON text. The
//! file store keeps that map as one JSON object on disk.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::triggers::TriggerRecord;

const KEY_PREFIX: &str = "triggerPoints_";

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("Trigger storage IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Trigger storage JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Trigger storage unavailable: {0}")]
    Unavailable(String),
}

/// The storage key for a sample.
pub fn storage_key(sample_id: &str) -> String {
    format!("{}{}", KEY_PREFIX, sample_id)
}

/// A place trigger records are kept.
pub trait TriggerStore: Send {
    /// Loads the record for a sample, None when nothing was stored.
    fn load(&self, sample_id: &str) -> Result<Option<TriggerRecord>, PersistError>;

    /// Stores the record for a sample, replacing any previous one.
    fn save(&mut self, sample_id: &str, record: &TriggerRecord) -> Result<(), PersistError>;

    /// Lists the sample ids that have records.
    fn sample_ids(&self) -> Result<Vec<String>, PersistError>;
}

fn decode(value: Option<&String>) -> Result<Option<TriggerRecord>, PersistError> {
    match value {
        Some(value) => Ok(Some(serde_json::from_str(value)?)),
        None => Ok(None),
    }
}

fn ids(entries: &BTreeMap<String, String>) -> Vec<String> {
    entries
        .keys()
        .filter_map(|key| key.strip_prefix(KEY_PREFIX))
        .map(str::to_string)
        .collect()
}

/// Keeps records in memory only.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    /// The raw stored text for a key.
    pub fn raw(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Stores raw text under a key, bypassing serialization.
    pub fn insert_raw(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }
}

impl TriggerStore for MemoryStore {
    fn load(&self, sample_id: &str) -> Result<Option<TriggerRecord>, PersistError> {
        decode(self.entries.get(&storage_key(sample_id)))
    }

    fn save(&mut self, sample_id: &str, record: &TriggerRecord) -> Result<(), PersistError> {
        let value = serde_json::to_string(record)?;
        self.entries.insert(storage_key(sample_id), value);
        Ok(())
    }

    fn sample_ids(&self) -> Result<Vec<String>, PersistError> {
        Ok(ids(&self.entries))
    }
}

/// Keeps records in a JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: &Path) -> JsonFileStore {
        JsonFileStore {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the whole map. A missing file is an empty map.
    fn read_entries(&self) -> Result<BTreeMap<String, String>, PersistError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes the map to a sibling temporary file and renames it into place
    /// so a failed write never truncates existing records.
    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<(), PersistError> {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl TriggerStore for JsonFileStore {
    fn load(&self, sample_id: &str) -> Result<Option<TriggerRecord>, PersistError> {
        let entries = self.read_entries()?;
        decode(entries.get(&storage_key(sample_id)))
    }

    fn save(&mut self, sample_id: &str, record: &TriggerRecord) -> Result<(), PersistError> {
        let mut entries = self.read_entries()?;
        entries.insert(storage_key(sample_id), serde_json::to_string(record)?);
        self.write_entries(&entries)?;
        debug!(path = ?self.path, sample_id, "Saved trigger points");
        Ok(())
    }

    fn sample_ids(&self) -> Result<Vec<String>, PersistError> {
        Ok(ids(&self.read_entries()?))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn record(points: [Option<f64>; 4], cursor: usize) -> TriggerRecord {
        TriggerRecord {
            trigger_points: points.to_vec(),
            current_pad_index: cursor,
        }
    }

    #[test]
    fn memory_store_round_trip() {
        let mut store = MemoryStore::new();
        assert_eq!(store.load("kick.wav").unwrap(), None);

        let saved = record([Some(1.0), Some(2.0), Some(3.0), Some(4.0)], 0);
        store.save("kick.wav", &saved).unwrap();
        assert_eq!(store.load("kick.wav").unwrap(), Some(saved));
        assert!(store.raw("triggerPoints_kick.wav").is_some());
        assert_eq!(store.sample_ids().unwrap(), vec!["kick.wav".to_string()]);
    }

    #[test]
    fn corrupt_entry_is_an_error() {
        let mut store = MemoryStore::new();
        store.insert_raw(&storage_key("bad"), "{not json");
        assert!(matches!(store.load("bad"), Err(PersistError::Json(_))));
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("triggers.json");
        let mut store = JsonFileStore::new(&path);

        assert_eq!(store.load("a").unwrap(), None);
        store.save("a", &record([Some(1.0), None, None, None], 1)).unwrap();
        store.save("b", &record([None, Some(2.0), None, None], 2)).unwrap();

        let reopened = JsonFileStore::new(&path);
        assert_eq!(
            reopened.load("a").unwrap(),
            Some(record([Some(1.0), None, None, None], 1))
        );
        assert_eq!(
            reopened.load("b").unwrap(),
            Some(record([None, Some(2.0), None, None], 2))
        );
        assert_eq!(
            reopened.sample_ids().unwrap(),
            vec!["a".to_string(), "b".to_string()]
        );

        // Values are JSON text, like a browser's local storage.
        let raw: BTreeMap<String, String> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            raw.get("triggerPoints_a").map(String::as_str),
            Some(r#"{"triggerPoints":[1.0,null,null,null],"currentPadIndex":1}"#)
        );
    }

    #[test]
    fn file_store_unwritable_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("triggers.json");
        let mut store = JsonFileStore::new(&path);
        assert!(matches!(
            store.save("a", &TriggerRecord::default()),
            Err(PersistError::Io(_))
        ));
    }

    #[test]
    fn corrupt_file_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("triggers.json");
        fs::write(&path, "garbage").unwrap();

        let mut store = JsonFileStore::new(&path);
        assert!(store.save("a", &TriggerRecord::default()).is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "garbage");
    }
}
