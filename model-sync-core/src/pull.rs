//! Pull: overwrite local data model files with the vendor's current state.
//!
//! Every mapped entry with a remote identifier is fetched and its file is
//! replaced wholesale. There is no field-level merge: local edits that were
//! not pushed are lost. With discovery enabled, remote models missing from
//! the mapping are appended under `<models_dir>/<sanitised-name>.json`.

use std::path::Path;

use tracing::{error, info, warn};

use crate::contract::{ApiError, ModelApi, RemoteModel};
use crate::document::{model_name, sanitize_filename, write_model};
use crate::error::{Result, SyncError};
use crate::mapping::{normalize_file, now_timestamp, resolve, MappingEntry, ModelMapping};
use crate::report::{EntryStatus, SyncReport};

/// Which remote models a pull touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullSelection {
    /// Every mapped entry (plus discovered models when enabled).
    All,
    /// One model by identifier.
    Id(String),
    /// Models whose name matches, case-insensitively.
    Name(String),
}

#[derive(Debug, Clone)]
pub struct PullOptions {
    pub selection: PullSelection,
    /// Append remote models that are not yet mapped. Only applies to
    /// [`PullSelection::All`].
    pub discover: bool,
}

impl Default for PullOptions {
    fn default() -> Self {
        Self {
            selection: PullSelection::All,
            discover: true,
        }
    }
}

/// Label used in the report for failures not tied to a mapped file.
pub const LISTING_LABEL: &str = "(remote listing)";

struct Target {
    remote_id: String,
    /// Mapped file, or `None` for a model that gets a new entry.
    file: Option<String>,
    listed_name: Option<String>,
}

pub async fn pull<A>(
    api: &A,
    mapping: &mut ModelMapping,
    root: &Path,
    options: &PullOptions,
) -> Result<SyncReport>
where
    A: ModelApi + ?Sized,
{
    info!(root = %root.display(), selection = ?options.selection, "[PULL] Starting pull");
    let mut report = SyncReport::default();
    let targets = pull_targets(api, mapping, options, &mut report).await?;

    for target in targets {
        let label = target
            .file
            .clone()
            .unwrap_or_else(|| format!("(new) {}", target.remote_id));

        let doc = match api.get_model(&target.remote_id).await {
            Ok(doc) => doc,
            Err(e) => {
                error!(remote_id = %target.remote_id, file = %label, error = %e, "[PULL][ERROR] Failed to fetch data model");
                report.record(&label, Some(&target.remote_id), EntryStatus::Failed(e.to_string()));
                continue;
            }
        };

        let name = model_name(&doc)
            .map(str::to_string)
            .or_else(|| target.listed_name.clone());

        let file = match &target.file {
            Some(file) => file.clone(),
            None => {
                let stem = sanitize_filename(name.as_deref().unwrap_or("unnamed"));
                mapping.unique_file_for(root, &stem)
            }
        };

        let path = resolve(root, &file);
        if let Err(e) = write_model(&path, &doc) {
            error!(remote_id = %target.remote_id, file = %file, error = %e, "[PULL][ERROR] Failed to write data model file");
            report.record(&file, Some(&target.remote_id), EntryStatus::Failed(e.to_string()));
            continue;
        }

        if target.file.is_none() {
            info!(remote_id = %target.remote_id, file = %file, "[PULL] Adding newly discovered data model to mapping");
            mapping.add_entry(MappingEntry::with_remote_id(file.clone(), target.remote_id.clone()))?;
        }
        if let Some(entry) = mapping.entry_for_file_mut(&file) {
            if name.is_some() {
                entry.name = name;
            }
            entry.last_pulled = Some(now_timestamp());
        }
        report.mapping_changed = true;

        info!(remote_id = %target.remote_id, file = %file, "[PULL] Saved data model");
        report.record(&file, Some(&target.remote_id), EntryStatus::Pulled);
    }

    info!(
        succeeded = report.succeeded(),
        skipped = report.skipped(),
        failed = report.failed(),
        "[PULL] Pull finished"
    );
    Ok(report)
}

async fn pull_targets<A>(
    api: &A,
    mapping: &ModelMapping,
    options: &PullOptions,
    report: &mut SyncReport,
) -> Result<Vec<Target>>
where
    A: ModelApi + ?Sized,
{
    match &options.selection {
        PullSelection::Id(id) => Ok(vec![target_for(mapping, id, None)]),
        PullSelection::Name(wanted) => {
            info!(name = %wanted, "[PULL] Searching for data model by name");
            let listed = api.list_models().await?;
            let targets: Vec<Target> = listed
                .iter()
                .filter(|m| m.name.to_lowercase() == wanted.to_lowercase())
                .map(|m| target_for(mapping, &m.data_model_id, Some(&m.name)))
                .collect();
            if targets.is_empty() {
                return Err(SyncError::Api(ApiError::NotFound(format!(
                    "no data model named {wanted}"
                ))));
            }
            Ok(targets)
        }
        PullSelection::All => {
            let mut targets = Vec::new();
            for entry in &mapping.data_models {
                match &entry.remote_id {
                    Some(id) => targets.push(Target {
                        remote_id: id.clone(),
                        file: Some(normalize_file(&entry.file)),
                        listed_name: entry.name.clone(),
                    }),
                    None => {
                        warn!(file = %entry.file, "[PULL] Entry has no remote id yet, skipping");
                        report.record(
                            &entry.file,
                            None,
                            EntryStatus::Skipped("no remote id".to_string()),
                        );
                    }
                }
            }

            if options.discover {
                match api.list_models().await {
                    Ok(listed) => {
                        let found = discover(mapping, &listed);
                        info!(listed = listed.len(), new = found.len(), "[PULL] Listed remote data models");
                        targets.extend(found);
                    }
                    Err(e) => {
                        error!(error = %e, "[PULL][ERROR] Failed to list remote data models");
                        report.record(LISTING_LABEL, None, EntryStatus::Failed(e.to_string()));
                    }
                }
            }
            Ok(targets)
        }
    }
}

fn target_for(mapping: &ModelMapping, remote_id: &str, listed_name: Option<&str>) -> Target {
    let entry = mapping.entry_for_remote_id(remote_id);
    Target {
        remote_id: remote_id.to_string(),
        file: entry.map(|e| normalize_file(&e.file)),
        listed_name: listed_name
            .map(str::to_string)
            .or_else(|| entry.and_then(|e| e.name.clone())),
    }
}

fn discover(mapping: &ModelMapping, listed: &[RemoteModel]) -> Vec<Target> {
    let mut seen: Vec<&str> = Vec::new();
    let mut found = Vec::new();
    for model in listed {
        let id = model.data_model_id.as_str();
        if id.is_empty() || mapping.entry_for_remote_id(id).is_some() || seen.contains(&id) {
            continue;
        }
        seen.push(id);
        found.push(Target {
            remote_id: id.to_string(),
            file: None,
            listed_name: Some(model.name.clone()).filter(|n| !n.is_empty()),
        });
    }
    found
}
