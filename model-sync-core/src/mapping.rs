//! The configuration mapping: which local file is which remote data model.
//!
//! The mapping lives in a YAML file (conventionally `config.yml` at the
//! repository root). Entry paths are relative to the directory holding that
//! file.
//!
//! The document is kept as read: a rewrite only touches the known keys that
//! changed, in place. Unknown keys, key order, entry order and the spelling of
//! the path key (`file` or `local`) survive a load/save cycle unchanged. New
//! entries are appended at the end.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};

pub const DEFAULT_MODELS_DIR: &str = "data-models";

const DATA_MODELS_KEY: &str = "data_models";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelMapping {
    /// Target cloud for the vendor API (`aws`, `azure`, `gcp`).
    pub cloud: Option<String>,

    /// Folder new models are created in when neither the document nor the
    /// entry names one.
    pub default_folder_id: Option<String>,

    pub models_dir: Option<String>,

    pub data_models: Vec<MappingEntry>,

    /// Top-level document as read, `data_models` included.
    raw: Mapping,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingEntry {
    /// Local path of the JSON document, relative to the mapping root.
    pub file: String,
    pub remote_id: Option<String>,
    pub folder_id: Option<String>,
    pub name: Option<String>,
    pub last_synced: Option<String>,
    pub last_pulled: Option<String>,

    /// Entry as read. Empty for entries created by this tool.
    raw: Mapping,
}

#[derive(Deserialize)]
struct MappingFields {
    cloud: Option<String>,
    default_folder_id: Option<String>,
    models_dir: Option<String>,
    data_models: Option<Vec<EntryFields>>,
}

#[derive(Deserialize)]
struct EntryFields {
    #[serde(alias = "local")]
    file: String,
    remote_id: Option<String>,
    folder_id: Option<String>,
    name: Option<String>,
    last_synced: Option<String>,
    last_pulled: Option<String>,
}

impl MappingEntry {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            ..Default::default()
        }
    }

    pub fn with_remote_id(file: impl Into<String>, remote_id: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            remote_id: Some(remote_id.into()),
            ..Default::default()
        }
    }

    /// The entry's YAML, with known fields written over the mapping it was
    /// read from. Absent fields are left as they were.
    fn to_value(&self) -> Value {
        let mut out = self.raw.clone();
        let path_key = if out.contains_key("local") && !out.contains_key("file") {
            "local"
        } else {
            "file"
        };
        out.insert(Value::from(path_key), Value::from(self.file.as_str()));
        set_if_some(&mut out, "remote_id", &self.remote_id);
        set_if_some(&mut out, "folder_id", &self.folder_id);
        set_if_some(&mut out, "name", &self.name);
        set_if_some(&mut out, "last_synced", &self.last_synced);
        set_if_some(&mut out, "last_pulled", &self.last_pulled);
        Value::Mapping(out)
    }
}

/// Replace `key` in place (or append it) when `value` is set.
fn set_if_some(map: &mut Mapping, key: &str, value: &Option<String>) {
    if let Some(value) = value {
        let value = Value::from(value.as_str());
        if map.get(key) != Some(&value) {
            map.insert(Value::from(key), value);
        }
    }
}

/// Normalise a user-supplied relative path for comparison with entry paths.
pub fn normalize_file(file: &str) -> String {
    let unified = file.replace('\\', "/");
    let mut rest = unified.as_str();
    while let Some(stripped) = rest.strip_prefix("./") {
        rest = stripped;
    }
    rest.to_string()
}

pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl ModelMapping {
    /// Parse a mapping from YAML text and check its invariants.
    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let raw = match serde_yaml::from_str::<Value>(text)? {
            Value::Null => return Ok(Self::default()),
            Value::Mapping(raw) => raw,
            _ => {
                return Err(SyncError::Config(
                    "the mapping file must be a YAML mapping".to_string(),
                ))
            }
        };
        let fields: MappingFields = serde_yaml::from_value(Value::Mapping(raw.clone()))?;

        let raw_entries: Vec<Mapping> = match raw.get(DATA_MODELS_KEY) {
            Some(Value::Sequence(items)) => items
                .iter()
                .map(|item| item.as_mapping().cloned().unwrap_or_default())
                .collect(),
            _ => Vec::new(),
        };
        let data_models = fields
            .data_models
            .unwrap_or_default()
            .into_iter()
            .zip(raw_entries)
            .map(|(entry, raw)| MappingEntry {
                file: entry.file,
                remote_id: entry.remote_id,
                folder_id: entry.folder_id,
                name: entry.name,
                last_synced: entry.last_synced,
                last_pulled: entry.last_pulled,
                raw,
            })
            .collect();

        let mapping = ModelMapping {
            cloud: fields.cloud,
            default_folder_id: fields.default_folder_id,
            models_dir: fields.models_dir,
            data_models,
            raw,
        };
        mapping.validate()?;
        Ok(mapping)
    }

    /// Render the document, changing only what differs from what was read.
    pub fn to_yaml(&self) -> Result<String> {
        let mut out = self.raw.clone();
        set_if_some(&mut out, "cloud", &self.cloud);
        set_if_some(&mut out, "default_folder_id", &self.default_folder_id);
        set_if_some(&mut out, "models_dir", &self.models_dir);
        if out.contains_key(DATA_MODELS_KEY) || !self.data_models.is_empty() {
            let entries: Vec<Value> = self.data_models.iter().map(MappingEntry::to_value).collect();
            out.insert(Value::from(DATA_MODELS_KEY), Value::Sequence(entries));
        }
        Ok(serde_yaml::to_string(&Value::Mapping(out))?)
    }

    /// Load the mapping at `path`. A missing file is an empty mapping.
    pub fn load(path: &Path) -> Result<Self> {
        info!(config_path = ?path, "Loading model mapping");
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(config_path = ?path, "Mapping file not found, starting from an empty mapping");
                return Ok(Self::default());
            }
            Err(e) => return Err(SyncError::io(path, e)),
        };
        let mapping = Self::from_yaml(&text).map_err(|e| match e {
            SyncError::Yaml(e) => {
                SyncError::Config(format!("failed to parse {}: {e}", path.display()))
            }
            other => other,
        })?;
        info!(
            config_path = ?path,
            entries = mapping.data_models.len(),
            "Model mapping loaded"
        );
        Ok(mapping)
    }

    /// Atomically rewrite the mapping at `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let yaml = self.to_yaml()?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| SyncError::io(dir, e))?;
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| SyncError::io(dir, e))?;
        tmp.write_all(yaml.as_bytes())
            .map_err(|e| SyncError::io(tmp.path(), e))?;
        tmp.persist(path).map_err(|e| SyncError::io(path, e.error))?;
        info!(config_path = ?path, entries = self.data_models.len(), "Model mapping saved");
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let mut seen_files: Vec<String> = Vec::with_capacity(self.data_models.len());
        let mut seen_ids: Vec<&str> = Vec::new();
        for entry in &self.data_models {
            let file = normalize_file(&entry.file);
            if file.is_empty() {
                return Err(SyncError::Config(
                    "mapping entry with an empty file path".to_string(),
                ));
            }
            if seen_files.contains(&file) {
                return Err(SyncError::Config(format!(
                    "file {file} is mapped more than once"
                )));
            }
            seen_files.push(file);
            if let Some(id) = entry.remote_id.as_deref() {
                if seen_ids.contains(&id) {
                    warn!(remote_id = id, "Remote id is mapped to more than one file");
                }
                seen_ids.push(id);
            }
        }
        Ok(())
    }

    pub fn models_dir(&self) -> &str {
        self.models_dir.as_deref().unwrap_or(DEFAULT_MODELS_DIR)
    }

    pub fn entry_for_file(&self, file: &str) -> Option<&MappingEntry> {
        let wanted = normalize_file(file);
        self.data_models
            .iter()
            .find(|e| normalize_file(&e.file) == wanted)
    }

    pub fn entry_for_file_mut(&mut self, file: &str) -> Option<&mut MappingEntry> {
        let wanted = normalize_file(file);
        self.data_models
            .iter_mut()
            .find(|e| normalize_file(&e.file) == wanted)
    }

    pub fn entry_for_remote_id(&self, remote_id: &str) -> Option<&MappingEntry> {
        self.data_models
            .iter()
            .find(|e| e.remote_id.as_deref() == Some(remote_id))
    }

    pub fn contains_file(&self, file: &str) -> bool {
        self.entry_for_file(file).is_some()
    }

    /// Append an entry. Fails if its file is already mapped.
    pub fn add_entry(&mut self, entry: MappingEntry) -> Result<&mut MappingEntry> {
        if self.contains_file(&entry.file) {
            return Err(SyncError::Config(format!(
                "file {} is already mapped",
                entry.file
            )));
        }
        debug!(file = %entry.file, remote_id = ?entry.remote_id, "Adding mapping entry");
        self.data_models.push(entry);
        let last = self.data_models.len() - 1;
        Ok(&mut self.data_models[last])
    }

    /// Record a freshly assigned identifier. An identifier that is already set
    /// is never replaced.
    pub fn assign_remote_id(&mut self, file: &str, remote_id: &str) -> Result<()> {
        let entry = self
            .entry_for_file_mut(file)
            .ok_or_else(|| SyncError::Config(format!("file {file} is not mapped")))?;
        match entry.remote_id.as_deref() {
            None => {
                entry.remote_id = Some(remote_id.to_string());
                Ok(())
            }
            Some(existing) if existing == remote_id => Ok(()),
            Some(existing) => Err(SyncError::Config(format!(
                "file {file} is already mapped to {existing}, refusing to remap to {remote_id}"
            ))),
        }
    }

    /// Pick a path `<models_dir>/<stem>.json` that is neither mapped nor
    /// present under `root`, suffixing `-2`, `-3`, ... as needed.
    pub fn unique_file_for(&self, root: &Path, stem: &str) -> String {
        let dir = self.models_dir().trim_end_matches('/');
        let mut candidate = format!("{dir}/{stem}.json");
        let mut n = 2;
        while self.contains_file(&candidate) || resolve(root, &candidate).exists() {
            candidate = format!("{dir}/{stem}-{n}.json");
            n += 1;
        }
        candidate
    }
}

/// Resolve an entry path against the mapping root.
pub fn resolve(root: &Path, file: &str) -> PathBuf {
    root.join(normalize_file(file))
}
