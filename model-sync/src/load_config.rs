/// `load_config` module: loads the YAML model mapping and the secrets/targets that come from the environment.
///
/// This module is the only place where the mapping file is opened on behalf of
/// the CLI and the only place that reads `SIGMA_*` variables.
///
/// # Responsibilities
/// - Load and validate the mapping file; any problem here is fatal for the run
/// - Read the client id/secret pair without ever logging it
/// - Resolve the API base URL from `SIGMA_BASE_URL`, `SIGMA_CLOUD` or the mapping's `cloud`
///
/// # Errors
/// All errors use `anyhow::Error` with context and surface at the CLI boundary.
use anyhow::{Context, Result};
use model_sync_core::mapping::ModelMapping;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub const DEFAULT_CLOUD: &str = "aws";

/// API base URLs by cloud.
pub const CLOUD_URLS: &[(&str, &str)] = &[
    ("aws", "https://aws-api.sigmacomputing.com"),
    ("azure", "https://api.us.azure.sigmacomputing.com"),
    ("gcp", "https://api.sigmacomputing.com"),
];

#[derive(Debug)]
pub struct CliConfig {
    /// Where the mapping was read from and will be written back to.
    pub config_path: PathBuf,
    /// Directory entry paths are relative to.
    pub root: PathBuf,
    pub mapping: ModelMapping,
}

impl CliConfig {
    pub fn save_mapping(&self) -> Result<()> {
        self.mapping
            .save(&self.config_path)
            .with_context(|| format!("Failed to save mapping to {}", self.config_path.display()))
    }
}

/// Loads the mapping file. A missing file yields an empty mapping rooted at
/// the file's directory.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let mapping = match ModelMapping::load(path_ref) {
        Ok(mapping) => mapping,
        Err(e) => {
            error!(error = %e, config_path = ?path_ref, "Failed to load mapping file");
            return Err(anyhow::Error::new(e).context(format!(
                "Failed to load config file {}",
                path_ref.display()
            )));
        }
    };

    let root = match path_ref.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    Ok(CliConfig {
        config_path: path_ref.to_path_buf(),
        root,
        mapping,
    })
}

/// Client credentials for the token exchange. `Debug` never prints them.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &"<redacted>")
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

pub fn credentials_from_env() -> Result<Credentials> {
    match (non_empty_var("SIGMA_CLIENT_ID"), non_empty_var("SIGMA_SECRET")) {
        (Some(client_id), Some(client_secret)) => {
            info!(
                client_id_len = client_id.len(),
                secret_len = client_secret.len(),
                "Sigma credentials found in env"
            );
            Ok(Credentials {
                client_id,
                client_secret,
            })
        }
        _ => {
            error!("SIGMA_CLIENT_ID and SIGMA_SECRET must both be set");
            anyhow::bail!("SIGMA_CLIENT_ID and SIGMA_SECRET environment variables required")
        }
    }
}

/// `SIGMA_BASE_URL` wins; otherwise the cloud from `SIGMA_CLOUD`, then the
/// mapping's `cloud`, then `aws`.
pub fn resolve_base_url(mapping: &ModelMapping) -> Result<String> {
    if let Some(url) = non_empty_var("SIGMA_BASE_URL") {
        info!(base_url = %url, "Using API base URL override");
        return Ok(url.trim_end_matches('/').to_string());
    }
    let cloud = non_empty_var("SIGMA_CLOUD")
        .or_else(|| mapping.cloud.clone())
        .unwrap_or_else(|| DEFAULT_CLOUD.to_string())
        .to_lowercase();
    match CLOUD_URLS.iter().find(|(name, _)| *name == cloud) {
        Some((_, url)) => {
            info!(cloud = %cloud, base_url = %url, "Resolved API base URL");
            Ok(url.to_string())
        }
        None => {
            error!(cloud = %cloud, "Unknown cloud");
            anyhow::bail!("Invalid SIGMA_CLOUD: {cloud}. Use: aws, azure, or gcp")
        }
    }
}

/// Folder used for creates when neither the document, the entry nor the
/// mapping names one.
pub fn folder_from_env() -> Option<String> {
    non_empty_var("SIGMA_FOLDER_ID")
}
