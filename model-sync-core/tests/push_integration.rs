use model_sync_core::contract::{ApiError, CreatedModel, MockModelApi};
use model_sync_core::mapping::ModelMapping;
use model_sync_core::push::{push, PushOptions};
use model_sync_core::report::EntryStatus;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write_file(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn read_json(root: &Path, rel: &str) -> Value {
    serde_json::from_str(&fs::read_to_string(root.join(rel)).unwrap()).unwrap()
}

fn no_write_back() -> PushOptions {
    PushOptions {
        write_back: false,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_push_creates_once_then_updates_with_recorded_id() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write_file(root, "data-models/orders.json", r#"{"name": "Orders"}"#);
    let config_path = root.join("config.yml");
    fs::write(
        &config_path,
        "default_folder_id: folder-1\ndata_models:\n- local: data-models/orders.json\n  remote_id: null\n",
    )
    .unwrap();
    let mut mapping = ModelMapping::load(&config_path).unwrap();

    let mut api = MockModelApi::new();
    api.expect_create_model()
        .times(1)
        .withf(|spec| {
            spec["name"] == "Orders" && spec["folderId"] == "folder-1" && spec["schemaVersion"] == 1
        })
        .returning(|_| {
            Ok(CreatedModel {
                data_model_id: "dm-orders".to_string(),
            })
        });
    api.expect_update_model().times(0);

    let report = push(&api, &mut mapping, root, &no_write_back())
        .await
        .expect("push should not abort");
    assert!(report.is_success(), "report: {report:?}");
    assert!(report.mapping_changed);
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].status, EntryStatus::Created);
    mapping.save(&config_path).unwrap();

    let reloaded = ModelMapping::load(&config_path).unwrap();
    assert_eq!(reloaded.data_models.len(), 1);
    assert_eq!(
        reloaded.data_models[0].remote_id.as_deref(),
        Some("dm-orders")
    );
    assert_eq!(reloaded.data_models[0].name.as_deref(), Some("Orders"));
    assert!(reloaded.data_models[0].last_synced.is_some());

    // Second push: the recorded id must be used for an update, never a second create.
    let mut api = MockModelApi::new();
    api.expect_create_model().times(0);
    api.expect_update_model()
        .times(1)
        .withf(|id, spec| id == "dm-orders" && spec["name"] == "Orders")
        .returning(|_, spec| Ok(spec.clone()));

    let mut mapping = reloaded;
    let report = push(&api, &mut mapping, root, &no_write_back())
        .await
        .unwrap();
    assert!(report.is_success());
    assert_eq!(report.outcomes[0].status, EntryStatus::Updated);
    assert_eq!(report.outcomes[0].remote_id.as_deref(), Some("dm-orders"));
    assert_eq!(mapping.data_models.len(), 1);
}

#[tokio::test]
async fn test_push_failure_on_one_entry_does_not_stop_the_rest() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write_file(root, "data-models/a.json", r#"{"name": "A"}"#);
    write_file(root, "data-models/b.json", r#"{"name": "B"}"#);
    write_file(root, "data-models/c.json", r#"{"name": "C"}"#);
    let mut mapping = ModelMapping::from_yaml(
        "data_models:\n- file: data-models/a.json\n  remote_id: id-a\n- file: data-models/b.json\n  remote_id: id-b\n- file: data-models/c.json\n  remote_id: id-c\n",
    )
    .unwrap();

    let mut api = MockModelApi::new();
    api.expect_update_model()
        .times(3)
        .returning(|id, spec| {
            if id == "id-b" {
                Err(ApiError::RateLimited("slow down".to_string()))
            } else {
                Ok(spec.clone())
            }
        });

    let report = push(&api, &mut mapping, root, &no_write_back())
        .await
        .unwrap();
    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.succeeded(), 2);
    assert!(!report.is_success());
    assert!(report
        .outcome_for("data-models/b.json")
        .unwrap()
        .status
        .is_failure());
    assert_eq!(
        report.outcome_for("data-models/c.json").unwrap().status,
        EntryStatus::Updated
    );
}

#[tokio::test]
async fn test_push_reports_malformed_json_and_continues() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write_file(root, "data-models/broken.json", "{ not json");
    write_file(root, "data-models/good.json", r#"{"name": "Good"}"#);
    let mut mapping = ModelMapping::from_yaml(
        "data_models:\n- file: data-models/broken.json\n  remote_id: id-broken\n- file: data-models/good.json\n  remote_id: id-good\n",
    )
    .unwrap();

    let mut api = MockModelApi::new();
    api.expect_update_model()
        .times(1)
        .withf(|id, _| id == "id-good")
        .returning(|_, spec| Ok(spec.clone()));

    let report = push(&api, &mut mapping, root, &no_write_back())
        .await
        .unwrap();
    let broken = report.outcome_for("data-models/broken.json").unwrap();
    match &broken.status {
        EntryStatus::Failed(msg) => assert!(msg.contains("invalid JSON"), "got: {msg}"),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(
        report.outcome_for("data-models/good.json").unwrap().status,
        EntryStatus::Updated
    );
}

#[tokio::test]
async fn test_push_skips_missing_mapped_file_but_fails_missing_explicit_file() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    let mut mapping =
        ModelMapping::from_yaml("data_models:\n- file: data-models/gone.json\n  remote_id: id-gone\n")
            .unwrap();
    let api = MockModelApi::new();

    let report = push(&api, &mut mapping, root, &no_write_back())
        .await
        .unwrap();
    assert!(report.is_success());
    assert!(matches!(report.outcomes[0].status, EntryStatus::Skipped(_)));
    assert!(!report.mapping_changed);

    let options = PushOptions {
        files: vec!["data-models/gone.json".to_string()],
        write_back: false,
        ..Default::default()
    };
    let report = push(&api, &mut mapping, root, &options).await.unwrap();
    assert!(!report.is_success());
    assert_eq!(report.failed(), 1);
}

#[tokio::test]
async fn test_push_adds_unmapped_files_from_models_dir() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write_file(root, "data-models/mapped.json", r#"{"name": "Mapped"}"#);
    write_file(
        root,
        "data-models/fresh.json",
        r#"{"name": "Fresh", "schemaVersion": "v1", "folderId": "f-doc"}"#,
    );
    write_file(root, "data-models/notes.txt", "ignored");
    let mut mapping = ModelMapping::from_yaml(
        "data_models:\n- file: data-models/mapped.json\n  remote_id: id-mapped\n",
    )
    .unwrap();

    let mut api = MockModelApi::new();
    api.expect_update_model()
        .times(1)
        .returning(|_, spec| Ok(spec.clone()));
    api.expect_create_model()
        .times(1)
        .withf(|spec| spec["folderId"] == "f-doc" && spec["schemaVersion"] == 1)
        .returning(|_| {
            Ok(CreatedModel {
                data_model_id: "id-fresh".to_string(),
            })
        });

    let report = push(&api, &mut mapping, root, &no_write_back())
        .await
        .unwrap();
    assert!(report.is_success());
    assert_eq!(mapping.data_models.len(), 2);
    assert_eq!(mapping.data_models[0].file, "data-models/mapped.json");
    assert_eq!(mapping.data_models[1].file, "data-models/fresh.json");
    assert_eq!(mapping.data_models[1].remote_id.as_deref(), Some("id-fresh"));
}

#[tokio::test]
async fn test_push_uses_embedded_data_model_id_for_unmapped_file() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write_file(
        root,
        "data-models/known.json",
        r#"{"name": "Known", "dataModelId": "id-embedded"}"#,
    );
    let mut mapping = ModelMapping::default();

    let mut api = MockModelApi::new();
    api.expect_create_model().times(0);
    api.expect_update_model()
        .times(1)
        .withf(|id, _| id == "id-embedded")
        .returning(|_, spec| Ok(spec.clone()));

    let options = PushOptions {
        files: vec!["./data-models/known.json".to_string()],
        write_back: false,
        ..Default::default()
    };
    let report = push(&api, &mut mapping, root, &options).await.unwrap();
    assert!(report.is_success());
    let entry = mapping.entry_for_file("data-models/known.json").unwrap();
    assert_eq!(entry.remote_id.as_deref(), Some("id-embedded"));
}

#[tokio::test]
async fn test_push_without_folder_fails_that_entry() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write_file(root, "data-models/orphan.json", r#"{"name": "Orphan"}"#);
    let mut mapping = ModelMapping::default();
    let mut api = MockModelApi::new();
    api.expect_create_model().times(0);

    let report = push(&api, &mut mapping, root, &no_write_back())
        .await
        .unwrap();
    assert_eq!(report.failed(), 1);
    match &report.outcomes[0].status {
        EntryStatus::Failed(msg) => assert!(msg.contains("folderId is required"), "got: {msg}"),
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(mapping.data_models.is_empty(), "no entry without an id");
}

#[tokio::test]
async fn test_push_folder_from_options_is_last_resort() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write_file(root, "data-models/a.json", r#"{"name": "A"}"#);
    let mut mapping = ModelMapping::from_yaml(
        "default_folder_id: from-config\ndata_models:\n- file: data-models/a.json\n  remote_id: null\n  folder_id: from-entry\n",
    )
    .unwrap();

    let mut api = MockModelApi::new();
    api.expect_create_model()
        .times(1)
        .withf(|spec| spec["folderId"] == "from-entry")
        .returning(|_| {
            Ok(CreatedModel {
                data_model_id: "id-a".to_string(),
            })
        });

    let options = PushOptions {
        folder_id: Some("from-env".to_string()),
        write_back: false,
        ..Default::default()
    };
    let report = push(&api, &mut mapping, root, &options).await.unwrap();
    assert!(report.is_success());
}

#[tokio::test]
async fn test_push_writes_back_remote_version() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write_file(root, "data-models/orders.json", r#"{"name": "Orders"}"#);
    let mut mapping = ModelMapping::from_yaml(
        "data_models:\n- file: data-models/orders.json\n  remote_id: id-orders\n",
    )
    .unwrap();

    let mut api = MockModelApi::new();
    api.expect_update_model()
        .times(1)
        .returning(|_, spec| Ok(spec.clone()));
    api.expect_get_model()
        .times(1)
        .withf(|id| id == "id-orders")
        .returning(|_| {
            Ok(json!({"name": "Orders", "dataModelId": "id-orders", "documentVersion": 4}))
        });

    let report = push(&api, &mut mapping, root, &PushOptions::default())
        .await
        .unwrap();
    assert!(report.is_success());
    assert_eq!(
        read_json(root, "data-models/orders.json"),
        json!({"name": "Orders", "dataModelId": "id-orders", "documentVersion": 4})
    );
}

#[tokio::test]
async fn test_push_write_back_falls_back_to_recording_id() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write_file(root, "data-models/orders.json", r#"{"name": "Orders"}"#);
    let mut mapping = ModelMapping::default();
    mapping.default_folder_id = Some("folder".to_string());

    let mut api = MockModelApi::new();
    api.expect_create_model().times(1).returning(|_| {
        Ok(CreatedModel {
            data_model_id: "id-new".to_string(),
        })
    });
    api.expect_get_model()
        .times(1)
        .returning(|id| Err(ApiError::NotFound(id.to_string())));

    let report = push(&api, &mut mapping, root, &PushOptions::default())
        .await
        .unwrap();
    assert!(report.is_success(), "write-back problems do not fail the entry");
    assert_eq!(
        read_json(root, "data-models/orders.json"),
        json!({"name": "Orders", "dataModelId": "id-new"})
    );
}
