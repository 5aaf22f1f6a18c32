use model_sync::load_config::{
    credentials_from_env, folder_from_env, load_config, resolve_base_url,
};
use model_sync_core::mapping::ModelMapping;
use serial_test::serial;
use std::env;
use std::fs::write;
use std::path::PathBuf;
use tempfile::tempdir;

fn clear_sigma_env() {
    for var in [
        "SIGMA_CLIENT_ID",
        "SIGMA_SECRET",
        "SIGMA_CLOUD",
        "SIGMA_BASE_URL",
        "SIGMA_FOLDER_ID",
    ] {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_load_config_roots_entries_at_config_dir() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.yml");
    write(
        &path,
        "cloud: gcp\ndata_models:\n- file: data-models/orders.json\n  remote_id: abc\n",
    )
    .unwrap();

    let config = load_config(&path).expect("config should load");
    assert_eq!(config.root, dir.path().to_path_buf());
    assert_eq!(config.config_path, path);
    assert_eq!(config.mapping.data_models.len(), 1);
    assert_eq!(config.mapping.cloud.as_deref(), Some("gcp"));
}

#[test]
#[serial]
fn test_load_config_bare_file_name_is_rooted_at_cwd() {
    let config = load_config("does-not-exist-model-sync.yml").expect("missing file is empty");
    assert_eq!(config.root, PathBuf::from("."));
    assert!(config.mapping.data_models.is_empty());
}

#[test]
#[serial]
fn test_load_config_rejects_duplicate_files() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.yml");
    write(
        &path,
        "data_models:\n- file: a.json\n  remote_id: x\n- file: a.json\n  remote_id: y\n",
    )
    .unwrap();
    let err = load_config(&path).unwrap_err();
    assert!(format!("{err:#}").contains("mapped more than once"), "got {err:#}");
}

#[test]
#[serial]
fn test_credentials_required_and_redacted() {
    clear_sigma_env();
    let err = credentials_from_env().unwrap_err();
    assert!(err.to_string().contains("SIGMA_CLIENT_ID"));

    env::set_var("SIGMA_CLIENT_ID", "client-visible");
    env::set_var("SIGMA_SECRET", "   ");
    assert!(credentials_from_env().is_err(), "blank secret is missing");

    env::set_var("SIGMA_SECRET", "very-secret");
    let creds = credentials_from_env().unwrap();
    assert_eq!(creds.client_secret, "very-secret");
    let debug = format!("{creds:?}");
    assert!(!debug.contains("very-secret"));
    assert!(!debug.contains("client-visible"));
    clear_sigma_env();
}

#[test]
#[serial]
fn test_base_url_precedence() {
    clear_sigma_env();
    let mut mapping = ModelMapping::default();
    assert_eq!(
        resolve_base_url(&mapping).unwrap(),
        "https://aws-api.sigmacomputing.com"
    );

    mapping.cloud = Some("azure".to_string());
    assert_eq!(
        resolve_base_url(&mapping).unwrap(),
        "https://api.us.azure.sigmacomputing.com"
    );

    env::set_var("SIGMA_CLOUD", "GCP");
    assert_eq!(
        resolve_base_url(&mapping).unwrap(),
        "https://api.sigmacomputing.com"
    );

    env::set_var("SIGMA_BASE_URL", "http://127.0.0.1:9999/");
    assert_eq!(resolve_base_url(&mapping).unwrap(), "http://127.0.0.1:9999");
    clear_sigma_env();
}

#[test]
#[serial]
fn test_unknown_cloud_is_rejected() {
    clear_sigma_env();
    env::set_var("SIGMA_CLOUD", "oracle");
    let err = resolve_base_url(&ModelMapping::default()).unwrap_err();
    assert!(err.to_string().contains("Invalid SIGMA_CLOUD"));
    clear_sigma_env();
}

#[test]
#[serial]
fn test_folder_from_env() {
    clear_sigma_env();
    assert_eq!(folder_from_env(), None);
    env::set_var("SIGMA_FOLDER_ID", "folder-9");
    assert_eq!(folder_from_env().as_deref(), Some("folder-9"));
    clear_sigma_env();
}
