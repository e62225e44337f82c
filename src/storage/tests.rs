use super::*;
use crate::identity::Identity;
use serde_json::json;

fn record(value: serde_json::Value) -> Record {
    match value {
        serde_json::Value::Object(map) => map,
        _ => panic!("test records must be objects"),
    }
}

#[tokio::test]
async fn test_fs_object_store_put_and_url() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsObjectStore::new(dir.path(), "https://cdn.example.com/avatars/");

    store
        .put("u1/1700000000000.jpg", Arc::new(vec![1, 2, 3]), "image/jpeg")
        .await
        .unwrap();

    let stored = std::fs::read(dir.path().join("u1/1700000000000.jpg")).unwrap();
    assert_eq!(stored, vec![1, 2, 3]);
    assert_eq!(
        store.public_url("u1/1700000000000.jpg").await.unwrap(),
        "https://cdn.example.com/avatars/u1/1700000000000.jpg"
    );
}

#[tokio::test]
async fn test_fs_object_store_unknown_key() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsObjectStore::new(dir.path(), "https://cdn.example.com");

    match store.public_url("u1/missing.jpg").await {
        Err(StorageError::NotFound { key }) => assert_eq!(key, "u1/missing.jpg"),
        other => panic!("Expected NotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn test_fs_object_store_refuses_traversal() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsObjectStore::new(dir.path(), "https://cdn.example.com");

    assert!(store
        .put("../escape.jpg", Arc::new(vec![0]), "image/jpeg")
        .await
        .is_err());
}

#[tokio::test]
async fn test_fs_record_store_merges_fields() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsRecordStore::new(dir.path());
    let user = Identity::parse("u1").unwrap();

    store
        .upsert("profiles", &user, record(json!({"height": 175.0, "weight": 70.0})))
        .await
        .unwrap();
    store
        .upsert("profiles", &user, record(json!({"photo_url": "https://cdn/u1/1.jpg"})))
        .await
        .unwrap();

    let stored = store.fetch("profiles", &user).await.unwrap().unwrap();
    assert_eq!(stored.get("height"), Some(&json!(175.0)));
    assert_eq!(stored.get("weight"), Some(&json!(70.0)));
    assert_eq!(stored.get("photo_url"), Some(&json!("https://cdn/u1/1.jpg")));
}

#[tokio::test]
async fn test_fs_record_store_replaces_file_whole() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsRecordStore::new(dir.path());
    let user = Identity::parse("u1").unwrap();

    store
        .upsert("profiles", &user, record(json!({"photo_url": "https://cdn/u1/1.jpg"})))
        .await
        .unwrap();

    let collection = dir.path().join("profiles");
    let mut names: Vec<String> = std::fs::read_dir(&collection)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["u1.json"]);

    let on_disk = std::fs::read_to_string(collection.join("u1.json")).unwrap();
    let parsed: Record = serde_json::from_str(&on_disk).unwrap();
    assert_eq!(parsed.get("photo_url"), Some(&json!("https://cdn/u1/1.jpg")));
}

#[tokio::test]
async fn test_record_stores_stamp_updated_at() {
    let dir = tempfile::tempdir().unwrap();
    let fs_store = FsRecordStore::new(dir.path());
    let memory_store = MemoryRecordStore::new();
    let user = Identity::parse("u1").unwrap();
    let stores: [&dyn RecordStore; 2] = [&fs_store, &memory_store];

    for store in stores {
        store
            .upsert("profiles", &user, record(json!({"height": 175.0})))
            .await
            .unwrap();

        let stored = store.fetch("profiles", &user).await.unwrap().unwrap();
        let stamped = stored.get("updated_at").and_then(|v| v.as_str()).unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(stamped).is_ok());
    }

    // the caller's partial is recorded as sent
    assert!(!memory_store.upserts()[0].partial.contains_key("updated_at"));
}

#[tokio::test]
async fn test_fs_record_store_missing_record() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsRecordStore::new(dir.path());
    let user = Identity::parse("nobody").unwrap();

    assert!(store.fetch("profiles", &user).await.unwrap().is_none());
}

#[tokio::test]
async fn test_memory_record_store_ignores_nulls() {
    let store = MemoryRecordStore::new();
    let user = Identity::parse("u2").unwrap();

    store
        .upsert("profiles", &user, record(json!({"chest": 96.0})))
        .await
        .unwrap();
    store
        .upsert("profiles", &user, record(json!({"chest": null, "hips": 100.0})))
        .await
        .unwrap();

    let stored = store.fetch("profiles", &user).await.unwrap().unwrap();
    assert_eq!(stored.get("chest"), Some(&json!(96.0)));
    assert_eq!(stored.get("hips"), Some(&json!(100.0)));
    assert_eq!(store.upserts().len(), 2);
}

#[tokio::test]
async fn test_memory_object_store_failure_switch() {
    let store = MemoryObjectStore::default();
    store.set_failing(true);

    assert!(store
        .put("u1/1.jpg", Arc::new(vec![9]), "image/jpeg")
        .await
        .is_err());
    assert!(store.public_url("u1/1.jpg").await.is_err());
    assert_eq!(store.puts().len(), 1);

    store.set_failing(false);
    store
        .put("u1/2.jpg", Arc::new(vec![9]), "image/jpeg")
        .await
        .unwrap();
    assert_eq!(
        store.public_url("u1/2.jpg").await.unwrap(),
        "memory://objects/u1/2.jpg"
    );
}
