use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use super::atomic_io::{remove_if_present, write_record_atomic};
use super::{Store, StoreError};

const RECORD_EXTENSION: &str = "json";

/// One JSON file per key inside a save directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{RECORD_EXTENSION}", escape_key(key)))
    }
}

impl Store for FileStore {
    fn load(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let path = self.record_path(key);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        let value = serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt {
            key: key.to_string(),
            source,
        })?;
        Ok(Some(value))
    }

    fn save(&mut self, key: &str, value: &Value) -> Result<(), StoreError> {
        let path = self.record_path(key);
        let text = serde_json::to_string_pretty(value).map_err(|source| StoreError::Encode {
            key: key.to_string(),
            source,
        })?;
        write_record_atomic(&path, &text).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(key, path = %path.display(), "store_record_written");
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        let path = self.record_path(key);
        remove_if_present(&path).map_err(|source| StoreError::Io { path, source })
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        let entries = fs::read_dir(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io {
                path: self.dir.clone(),
                source,
            })?;
            let path = entry.path();
            if !is_record_file(&path) {
                continue;
            }
            remove_if_present(&path).map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        let entries = fs::read_dir(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io {
                path: self.dir.clone(),
                source,
            })?;
            let path = entry.path();
            if !is_record_file(&path) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            if let Some(key) = unescape_key(stem) {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}

fn is_record_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(RECORD_EXTENSION))
}

/// Keys such as `dailyTasks:2026-10-18` are not portable file names.
fn escape_key(key: &str) -> String {
    let mut output = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.') {
            output.push(byte as char);
        } else {
            let _ = write!(&mut output, "%{byte:02X}");
        }
    }
    output
}

/// Inverse of [`escape_key`]; `None` for names this store did not write.
fn unescape_key(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let mut output = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] == b'%' {
            let hex = name.get(index + 1..index + 3)?;
            output.push(u8::from_str_radix(hex, 16).ok()?);
            index += 3;
        } else {
            output.push(bytes[index]);
            index += 1;
        }
    }
    String::from_utf8(output).ok()
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn escape_key_keeps_plain_keys_and_encodes_separators() {
        assert_eq!(escape_key("lastCheckIn"), "lastCheckIn");
        assert_eq!(escape_key("dailyTasks:2026-10-18"), "dailyTasks%3A2026-10-18");
        assert_eq!(escape_key("../x"), "..%2Fx");
    }

    #[test]
    fn records_survive_reopen() {
        let temp = TempDir::new().expect("temp");
        let mut store = FileStore::open(temp.path().join("saves")).expect("open");
        store
            .save("cosmetics", &json!({"activeColor": "#FF6B9D"}))
            .expect("save");
        store.save("dailyTasks:2026-10-18", &json!([])).expect("save");

        let reopened = FileStore::open(temp.path().join("saves")).expect("reopen");
        assert_eq!(
            reopened.load("cosmetics").expect("load"),
            Some(json!({"activeColor": "#FF6B9D"}))
        );
        assert_eq!(
            reopened.load("dailyTasks:2026-10-18").expect("load"),
            Some(json!([]))
        );
        assert!(reopened.load("xp").expect("load").is_none());
    }

    #[test]
    fn corrupt_file_reports_corrupt_error() {
        let temp = TempDir::new().expect("temp");
        let store = FileStore::open(temp.path()).expect("open");
        fs::write(temp.path().join("history.json"), "{not json").expect("write");

        let error = store.load("history").expect_err("corrupt");
        assert!(matches!(error, StoreError::Corrupt { ref key, .. } if key == "history"));
    }

    #[test]
    fn clear_removes_records_but_not_foreign_files() {
        let temp = TempDir::new().expect("temp");
        let mut store = FileStore::open(temp.path()).expect("open");
        store.save("xp", &json!(5)).expect("save");
        store.save("level", &json!(1)).expect("save");
        fs::write(temp.path().join("notes.txt"), "keep").expect("write");

        store.clear().expect("clear");

        assert!(store.load("xp").expect("load").is_none());
        assert!(store.load("level").expect("load").is_none());
        assert!(temp.path().join("notes.txt").exists());
    }

    #[test]
    fn keys_lists_records_under_their_original_names() {
        let temp = TempDir::new().expect("temp");
        let mut store = FileStore::open(temp.path()).expect("open");
        store.save("xp", &json!(5)).expect("save");
        store.save("dailyTasks:2026-10-18", &json!([])).expect("save");
        fs::write(temp.path().join("notes.txt"), "skip").expect("write");
        fs::write(temp.path().join("bad%G1.json"), "{}").expect("write");

        let mut keys = store.keys().expect("keys");
        keys.sort();
        assert_eq!(keys, vec!["dailyTasks:2026-10-18".to_string(), "xp".to_string()]);
        assert_eq!(unescape_key(&escape_key("../x")).as_deref(), Some("../x"));
    }

    #[test]
    fn remove_is_idempotent() {
        let temp = TempDir::new().expect("temp");
        let mut store = FileStore::open(temp.path()).expect("open");
        store.save("streak", &json!(2)).expect("save");
        store.remove("streak").expect("remove");
        store.remove("streak").expect("remove again");
        assert!(store.load("streak").expect("load").is_none());
    }
}
