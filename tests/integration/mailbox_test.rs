use crate::integration::common::{
    at, create_static_kms, create_store, message, seal_object, CountingObjectStore, LOCAL_KEY,
    OTHER_LOCAL_KEY, PREFIX,
};
use mailvault::{
    config::LocalCipherConfig,
    envelope::META_IV,
    hexdump,
    mailbox::{FetchStatus, LocalEmailStatus},
    CipherMode, Error,
};
use std::sync::Arc;

fn put_message(store: &CountingObjectStore, name: &str, from: &str, subject: &str, day: u32) {
    let kms = create_static_kms();
    let key = format!("{}/{}", PREFIX, name);
    let body = message(from, subject, "Hello there");
    store
        .inner
        .put(seal_object(&kms, &key, body.as_bytes(), at(day)))
        .expect("put failed");
}

#[tokio::test]
async fn test_fetch_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let objects = Arc::new(CountingObjectStore::new());
    put_message(&objects, "msg-1", "alice@example.com", "Lunch", 1);

    let store = create_store(dir.path(), objects.clone(), LocalCipherConfig::disabled());

    let first = store.fetch_and_persist("inbox/msg-1").await.unwrap();
    assert_eq!(first.status, FetchStatus::Persisted);
    let written = std::fs::read(&first.path).unwrap();

    let second = store.fetch_and_persist("inbox/msg-1").await.unwrap();
    assert_eq!(second.status, FetchStatus::AlreadyPresent);
    assert_eq!(second.path, first.path);

    assert_eq!(objects.gets(), 1, "second fetch must not download");
    assert_eq!(std::fs::read(&second.path).unwrap(), written);
}

#[tokio::test]
async fn test_round_trip_through_disk_for_every_mode() {
    let mut configs = vec![LocalCipherConfig::disabled()];
    configs.extend(
        CipherMode::ALL
            .iter()
            .map(|mode| LocalCipherConfig::enabled(*mode, LOCAL_KEY)),
    );

    for local_cipher in configs {
        let dir = tempfile::tempdir().unwrap();
        let objects = Arc::new(CountingObjectStore::new());
        put_message(&objects, "msg-1", "alice@example.com", "Quarterly report", 2);

        let store = create_store(dir.path(), objects.clone(), local_cipher.clone());
        let outcome = store.fetch_and_persist("inbox/msg-1").await.unwrap();

        let on_disk = std::fs::read_to_string(&outcome.path).unwrap();
        if local_cipher.enabled {
            assert!(!on_disk.contains("Quarterly report"), "{:?}", local_cipher);
            assert!(hexdump::decode(&on_disk).is_ok());
        } else {
            assert!(on_disk.starts_with("From: alice@example.com"));
        }

        let email = store.read_local("inbox/msg-1").await.unwrap();
        assert_eq!(
            email.content,
            message("alice@example.com", "Quarterly report", "Hello there")
        );
        assert_eq!(email.summary.subject.as_deref(), Some("Quarterly report"));
    }
}

#[tokio::test]
async fn test_stores_with_different_configs_coexist() {
    let gcm_dir = tempfile::tempdir().unwrap();
    let ctr_dir = tempfile::tempdir().unwrap();
    let objects = Arc::new(CountingObjectStore::new());
    put_message(&objects, "msg-1", "alice@example.com", "Shared", 3);

    let gcm = create_store(
        gcm_dir.path(),
        objects.clone(),
        LocalCipherConfig::enabled(CipherMode::Gcm, LOCAL_KEY),
    );
    let ctr = create_store(
        ctr_dir.path(),
        objects.clone(),
        LocalCipherConfig::enabled(CipherMode::Ctr, OTHER_LOCAL_KEY).with_delimiter("|"),
    );

    gcm.fetch_and_persist("inbox/msg-1").await.unwrap();
    ctr.fetch_and_persist("inbox/msg-1").await.unwrap();

    for store in [&gcm, &ctr] {
        let email = store.read_local("inbox/msg-1").await.unwrap();
        assert_eq!(email.summary.subject.as_deref(), Some("Shared"));
    }

    // each store reads only what it wrote
    let gcm_file = std::fs::read_to_string(gcm_dir.path().join("msg-1.eml")).unwrap();
    let ctr_file = std::fs::read_to_string(ctr_dir.path().join("msg-1.eml")).unwrap();
    assert_ne!(gcm_file, ctr_file);
    assert_eq!(ctr.config().local_cipher.delimiter, "|");
    assert_eq!(gcm.config().local_cipher.delimiter, "::");
}

#[tokio::test]
async fn test_wrong_local_key_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let objects = Arc::new(CountingObjectStore::new());
    put_message(&objects, "msg-1", "alice@example.com", "Secret", 3);

    let writer = create_store(
        dir.path(),
        objects.clone(),
        LocalCipherConfig::enabled(CipherMode::Ctr, LOCAL_KEY),
    );
    writer.fetch_and_persist("inbox/msg-1").await.unwrap();

    let reader = create_store(
        dir.path(),
        objects.clone(),
        LocalCipherConfig::enabled(CipherMode::Ctr, OTHER_LOCAL_KEY),
    );
    let err = reader.read_local("inbox/msg-1").await.unwrap_err();
    assert!(matches!(err, Error::InvalidCipherFormat(_)), "{:?}", err);
}

#[tokio::test]
async fn test_read_local_missing_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = create_store(
        dir.path(),
        Arc::new(CountingObjectStore::new()),
        LocalCipherConfig::disabled(),
    );

    let err = store.read_local("inbox/nothing").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_batch_isolates_failures() {
    let dir = tempfile::tempdir().unwrap();
    let kms = create_static_kms();
    let objects = Arc::new(CountingObjectStore::new());
    put_message(&objects, "a", "alice@example.com", "One", 1);
    put_message(&objects, "c", "carol@example.com", "Three", 3);

    let mut broken = seal_object(&kms, "inbox/b", b"From: bob\r\n\r\nhi", at(2));
    broken.metadata.remove(META_IV);
    objects.inner.put(broken).unwrap();

    let store = create_store(dir.path(), objects.clone(), LocalCipherConfig::disabled());
    let report = store.fetch_all().await.unwrap();

    let fetched: Vec<&str> = report.fetched.iter().map(|o| o.key.as_str()).collect();
    assert_eq!(fetched, vec!["inbox/c", "inbox/a"]);
    assert_eq!(report.persisted(), 2);

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].key, "inbox/b");
    assert!(matches!(report.failed[0].error, Error::MalformedMetadata(_)));
    assert!(!dir.path().join("b.eml").exists());
}

#[tokio::test]
async fn test_fetch_many_keeps_input_order() {
    let dir = tempfile::tempdir().unwrap();
    let objects = Arc::new(CountingObjectStore::new());
    for (i, name) in ["m1", "m2", "m3", "m4", "m5"].iter().enumerate() {
        put_message(&objects, name, "alice@example.com", name, i as u32 + 1);
    }

    let store = create_store(dir.path(), objects.clone(), LocalCipherConfig::disabled());
    let keys = vec!["inbox/m4", "inbox/missing", "inbox/m1", "inbox/m5"];
    let report = store.fetch_many(keys).await;

    let fetched: Vec<&str> = report.fetched.iter().map(|o| o.key.as_str()).collect();
    assert_eq!(fetched, vec!["inbox/m4", "inbox/m1", "inbox/m5"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].key, "inbox/missing");
}

#[tokio::test]
async fn test_check_new_excludes_local_copies() {
    let dir = tempfile::tempdir().unwrap();
    let objects = Arc::new(CountingObjectStore::new());
    put_message(&objects, "old", "alice@example.com", "Old", 1);
    put_message(&objects, "new", "bob@example.com", "New", 2);

    let store = create_store(dir.path(), objects.clone(), LocalCipherConfig::disabled());
    store.fetch_and_persist("inbox/old").await.unwrap();

    let pending = store.check_new().await.unwrap();
    let keys: Vec<&str> = pending.iter().map(|o| o.key.as_str()).collect();
    assert_eq!(keys, vec!["inbox/new"]);

    store.fetch_all().await.unwrap();
    assert!(store.check_new().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_local_reports_unreadable_files() {
    let dir = tempfile::tempdir().unwrap();
    let objects = Arc::new(CountingObjectStore::new());
    put_message(&objects, "msg-1", "alice@example.com", "Readable", 1);

    let store = create_store(
        dir.path(),
        objects.clone(),
        LocalCipherConfig::enabled(CipherMode::Gcm, LOCAL_KEY),
    );
    store.fetch_and_persist("inbox/msg-1").await.unwrap();
    std::fs::write(dir.path().join("garbage.eml"), "not a hex dump").unwrap();
    std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let entries = store.list_local().await.unwrap();
    assert_eq!(entries.len(), 2);

    let readable = entries.iter().find(|e| e.name == "msg-1").unwrap();
    assert_eq!(
        readable.summary().and_then(|s| s.subject.as_deref()),
        Some("Readable")
    );

    let garbage = entries.iter().find(|e| e.name == "garbage").unwrap();
    assert!(matches!(garbage.status, LocalEmailStatus::Unreadable(_)));

    assert_eq!(readable.object_key.as_deref(), Some("inbox/msg-1"));

    let email = store
        .read_local(readable.object_key.as_deref().unwrap())
        .await
        .unwrap();
    assert_eq!(email.summary.from.as_deref(), Some("alice@example.com"));
}

#[tokio::test]
async fn test_similar_keys_get_separate_files() {
    let dir = tempfile::tempdir().unwrap();
    let kms = create_static_kms();
    let objects = Arc::new(CountingObjectStore::new());
    let keys = ["inbox/a b", "inbox/a_b", "other/x", "inbox/other_x", "inbox/other/x"];
    for key in keys {
        let body = message("alice@example.com", key, "Hello there");
        objects
            .inner
            .put(seal_object(&kms, key, body.as_bytes(), at(1)))
            .unwrap();
    }

    let store = create_store(dir.path(), objects.clone(), LocalCipherConfig::disabled());
    let report = store.fetch_many(keys).await;
    assert!(report.failed.is_empty(), "{:?}", report.failed);
    assert_eq!(report.persisted(), keys.len());
    assert_eq!(objects.gets(), keys.len());

    for key in keys {
        let email = store.read_local(key).await.unwrap();
        assert_eq!(email.summary.subject.as_deref(), Some(key));
    }

    let mut listed: Vec<String> = store
        .list_local()
        .await
        .unwrap()
        .into_iter()
        .filter_map(|e| e.object_key)
        .collect();
    listed.sort();
    let mut expected: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
    expected.sort();
    assert_eq!(listed, expected);

    assert!(store.check_new().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_local_on_missing_dir_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = create_store(
        &dir.path().join("not-yet"),
        Arc::new(CountingObjectStore::new()),
        LocalCipherConfig::disabled(),
    );

    assert!(store.list_local().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_search_local() {
    let dir = tempfile::tempdir().unwrap();
    let objects = Arc::new(CountingObjectStore::new());
    put_message(&objects, "a", "Alice <alice@example.com>", "Invoice March", 1);
    put_message(&objects, "b", "Bob <bob@example.com>", "invoice April", 2);
    put_message(&objects, "c", "Alice <alice@example.com>", "Holiday", 3);

    let store = create_store(
        dir.path(),
        objects.clone(),
        LocalCipherConfig::enabled(CipherMode::Cbc, LOCAL_KEY),
    );
    store.fetch_all().await.unwrap();

    let names = |entries: Vec<mailvault::mailbox::LocalEmailEntry>| -> Vec<String> {
        let mut names: Vec<String> = entries.into_iter().map(|e| e.name).collect();
        names.sort();
        names
    };

    let invoices = store.search_local(None, Some("INVOICE")).await.unwrap();
    assert_eq!(names(invoices), vec!["a", "b"]);

    let alice = store.search_local(Some("alice"), None).await.unwrap();
    assert_eq!(names(alice), vec!["a", "c"]);

    let both = store.search_local(Some("alice"), Some("invoice")).await.unwrap();
    assert_eq!(names(both), vec!["a"]);

    assert_eq!(store.search_local(None, None).await.unwrap().len(), 3);
    assert!(store.search_local(Some("carol"), None).await.unwrap().is_empty());
}
