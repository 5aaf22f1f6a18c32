//! Push: propagate local data model files to the vendor.
//!
//! For every targeted file the document is read and parsed, then either
//! created (no known identifier) or updated (identifier from the mapping, or
//! the document's own `dataModelId`). Freshly assigned identifiers are written
//! into the in-memory mapping; the caller persists it when
//! [`SyncReport::mapping_changed`] is set.
//!
//! # Error Handling
//! A failure on one file (unreadable, malformed JSON, API error) is logged and
//! recorded in the report; the remaining files are still processed.

use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::{error, info, warn};

use crate::contract::ModelApi;
use crate::document::{embedded_id, model_name, prepare_for_create, read_model, write_model};
use crate::error::{Result, SyncError};
use crate::mapping::{normalize_file, now_timestamp, resolve, MappingEntry, ModelMapping};
use crate::report::{EntryStatus, SyncReport};

#[derive(Debug, Clone)]
pub struct PushOptions {
    /// Files to push, relative to the mapping root. Empty means every mapped
    /// entry plus any unmapped `*.json` file in the models directory.
    pub files: Vec<String>,
    /// Lowest-precedence folder for creates (after the document's `folderId`,
    /// the entry's `folder_id` and the mapping's `default_folder_id`).
    pub folder_id: Option<String>,
    /// Re-fetch each pushed model and overwrite the local file with the
    /// vendor's version.
    pub write_back: bool,
}

impl Default for PushOptions {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            folder_id: None,
            write_back: true,
        }
    }
}

struct Target {
    file: String,
    explicit: bool,
}

pub async fn push<A>(
    api: &A,
    mapping: &mut ModelMapping,
    root: &Path,
    options: &PushOptions,
) -> Result<SyncReport>
where
    A: ModelApi + ?Sized,
{
    info!(root = %root.display(), "[PUSH] Starting push");
    let mut report = SyncReport::default();

    for target in push_targets(mapping, root, options)? {
        let path = resolve(root, &target.file);
        if !target.file.ends_with(".json") {
            report.record(
                &target.file,
                None,
                EntryStatus::Skipped("not a JSON file".to_string()),
            );
            continue;
        }
        if !path.exists() {
            let remote_id = mapping
                .entry_for_file(&target.file)
                .and_then(|e| e.remote_id.clone());
            if target.explicit {
                error!(file = %target.file, "[PUSH][ERROR] File not found");
                report.record(
                    &target.file,
                    remote_id.as_deref(),
                    EntryStatus::Failed(SyncError::FileNotFound(target.file.clone()).to_string()),
                );
            } else {
                warn!(file = %target.file, "[PUSH] Mapped file does not exist locally, skipping");
                report.record(
                    &target.file,
                    remote_id.as_deref(),
                    EntryStatus::Skipped("file not found".to_string()),
                );
            }
            continue;
        }

        match push_one(api, mapping, root, &target.file, options).await {
            Ok((status, remote_id)) => {
                info!(file = %target.file, remote_id = %remote_id, %status, "[PUSH] Entry pushed");
                report.mapping_changed = true;
                report.record(&target.file, Some(&remote_id), status);
            }
            Err(e) => {
                let remote_id = mapping
                    .entry_for_file(&target.file)
                    .and_then(|e| e.remote_id.clone());
                error!(file = %target.file, remote_id = ?remote_id, error = %e, "[PUSH][ERROR] Entry failed");
                report.record(
                    &target.file,
                    remote_id.as_deref(),
                    EntryStatus::Failed(e.to_string()),
                );
            }
        }
    }

    info!(
        succeeded = report.succeeded(),
        skipped = report.skipped(),
        failed = report.failed(),
        "[PUSH] Push finished"
    );
    Ok(report)
}

fn push_targets(mapping: &ModelMapping, root: &Path, options: &PushOptions) -> Result<Vec<Target>> {
    if !options.files.is_empty() {
        let mut targets: Vec<Target> = Vec::new();
        for file in &options.files {
            let file = normalize_file(file);
            if !targets.iter().any(|t| t.file == file) {
                targets.push(Target { file, explicit: true });
            }
        }
        return Ok(targets);
    }

    let mut targets: Vec<Target> = mapping
        .data_models
        .iter()
        .map(|e| Target {
            file: normalize_file(&e.file),
            explicit: false,
        })
        .collect();

    for file in unmapped_model_files(mapping, root)? {
        info!(file = %file, "[PUSH] Found unmapped data model file");
        targets.push(Target {
            file,
            explicit: false,
        });
    }
    Ok(targets)
}

/// `*.json` files in the models directory that have no mapping entry, sorted.
pub fn unmapped_model_files(mapping: &ModelMapping, root: &Path) -> Result<Vec<String>> {
    let dir_rel = mapping.models_dir().trim_end_matches('/');
    let dir = resolve(root, dir_rel);
    let read = match fs::read_dir(&dir) {
        Ok(read) => read,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(SyncError::io(&dir, e)),
    };

    let mut files = Vec::new();
    for dirent in read {
        let dirent = dirent.map_err(|e| SyncError::io(&dir, e))?;
        let path = dirent.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let file = format!("{dir_rel}/{name}");
        if !mapping.contains_file(&file) {
            files.push(file);
        }
    }
    files.sort();
    Ok(files)
}

async fn push_one<A>(
    api: &A,
    mapping: &mut ModelMapping,
    root: &Path,
    file: &str,
    options: &PushOptions,
) -> Result<(EntryStatus, String)>
where
    A: ModelApi + ?Sized,
{
    let path = resolve(root, file);
    let doc = read_model(&path)?;
    let entry = mapping.entry_for_file(file).cloned();

    let known_id = entry
        .as_ref()
        .and_then(|e| e.remote_id.clone())
        .or_else(|| embedded_id(&doc).map(str::to_string));

    let name = model_name(&doc)
        .map(str::to_string)
        .or_else(|| {
            Path::new(file)
                .file_stem()
                .and_then(|s| s.to_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| file.to_string());

    let (status, remote_id) = match known_id {
        Some(id) => {
            info!(file, remote_id = %id, "[PUSH] Updating data model");
            api.update_model(&id, &doc).await?;
            (EntryStatus::Updated, id)
        }
        None => {
            let folder = entry
                .as_ref()
                .and_then(|e| e.folder_id.clone())
                .or_else(|| mapping.default_folder_id.clone())
                .or_else(|| options.folder_id.clone());
            let prepared = prepare_for_create(&doc, folder.as_deref(), file)?;
            info!(file, name = %name, folder = ?folder, "[PUSH] Creating new data model");
            let created = api.create_model(&prepared).await?;
            if created.data_model_id.is_empty() {
                return Err(SyncError::Api(crate::error::ApiError::Decode(
                    "create returned an empty dataModelId".to_string(),
                )));
            }
            (EntryStatus::Created, created.data_model_id)
        }
    };

    if mapping.entry_for_file(file).is_none() {
        mapping.add_entry(MappingEntry::new(file))?;
    }
    mapping.assign_remote_id(file, &remote_id)?;
    if let Some(entry) = mapping.entry_for_file_mut(file) {
        entry.name = Some(name);
        entry.last_synced = Some(now_timestamp());
    }

    if options.write_back {
        write_back(api, &path, &doc, &remote_id).await;
    }

    Ok((status, remote_id))
}

/// Keep the repository copy in step with the vendor's version of the model.
async fn write_back<A>(api: &A, path: &Path, pushed: &Value, remote_id: &str)
where
    A: ModelApi + ?Sized,
{
    match api.get_model(remote_id).await {
        Ok(latest) => match write_model(path, &latest) {
            Ok(()) => info!(
                path = %path.display(),
                version = ?latest.get("documentVersion"),
                "[PUSH] Local file updated with the remote version"
            ),
            Err(e) => warn!(path = %path.display(), error = %e, "[PUSH] Could not write back remote version"),
        },
        Err(e) => {
            warn!(remote_id, error = %e, "[PUSH] Could not fetch remote version after push");
            if embedded_id(pushed) == Some(remote_id) {
                return;
            }
            let mut with_id = pushed.clone();
            if let Some(obj) = with_id.as_object_mut() {
                obj.insert("dataModelId".to_string(), Value::from(remote_id));
            }
            if let Err(e) = write_model(path, &with_id) {
                warn!(path = %path.display(), error = %e, "[PUSH] Could not record dataModelId in local file");
            }
        }
    }
}
