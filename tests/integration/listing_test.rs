use crate::integration::common::{
    at, create_static_kms, create_store, PagedObjectStore, PREFIX,
};
use mailvault::{
    config::LocalCipherConfig, mailbox::MailboxStoreBuilder, Error, MailboxConfig, ObjectListing,
    ObjectSummary,
};
use std::sync::Arc;

fn summary(key: &str, day: Option<u32>) -> ObjectSummary {
    ObjectSummary {
        key: key.to_string(),
        last_modified: day.and_then(at),
    }
}

fn page(items: Vec<ObjectSummary>, next: Option<&str>) -> ObjectListing {
    ObjectListing {
        items,
        next_token: next.map(str::to_string),
    }
}

#[tokio::test]
async fn test_pages_are_aggregated_newest_first() {
    let objects = Arc::new(PagedObjectStore::new(vec![
        (
            None,
            page(
                vec![summary("inbox/a", Some(3)), summary("inbox/", None)],
                Some("A"),
            ),
        ),
        (
            Some("A"),
            page(vec![summary("inbox/b", None), summary("inbox/c", Some(9))], Some("B")),
        ),
        (Some("B"), page(vec![summary("inbox/d", Some(1))], Some("C"))),
        (Some("C"), page(vec![summary("inbox/e", Some(5))], None)),
    ]));

    let dir = tempfile::tempdir().unwrap();
    let store = create_store(dir.path(), objects.clone(), LocalCipherConfig::disabled());
    let listed = store.list_remote_objects().await.unwrap();

    let keys: Vec<&str> = listed.iter().map(|o| o.key.as_str()).collect();
    assert_eq!(
        keys,
        vec!["inbox/c", "inbox/e", "inbox/a", "inbox/d", "inbox/b"]
    );

    let seen = objects.seen.lock().unwrap().clone();
    let expected_prefix = Some(format!("{}/", PREFIX));
    assert_eq!(
        seen,
        vec![
            (expected_prefix.clone(), None),
            (expected_prefix.clone(), Some("A".to_string())),
            (expected_prefix.clone(), Some("B".to_string())),
            (expected_prefix, Some("C".to_string())),
        ]
    );
}

#[tokio::test]
async fn test_repeated_token_is_an_error() {
    let objects = Arc::new(PagedObjectStore::new(vec![
        (None, page(vec![summary("inbox/a", Some(1))], Some("A"))),
        (Some("A"), page(vec![summary("inbox/b", Some(2))], Some("A"))),
    ]));

    let dir = tempfile::tempdir().unwrap();
    let store = create_store(dir.path(), objects, LocalCipherConfig::disabled());

    let err = store.list_remote_objects().await.unwrap_err();
    assert!(matches!(err, Error::ObjectStore(_)));
}

#[tokio::test]
async fn test_listing_error_fails_fetch_all() {
    let objects = Arc::new(PagedObjectStore::new(vec![(
        None,
        page(vec![summary("inbox/a", Some(1))], Some("missing")),
    )]));

    let dir = tempfile::tempdir().unwrap();
    let store = create_store(dir.path(), objects, LocalCipherConfig::disabled());

    assert!(store.fetch_all().await.is_err());
}

#[tokio::test]
async fn test_no_prefix_lists_whole_bucket() {
    let objects = Arc::new(PagedObjectStore::new(vec![(
        None,
        page(vec![summary("top-level", Some(1))], None),
    )]));

    let dir = tempfile::tempdir().unwrap();
    let store = MailboxStoreBuilder::new()
        .with_config(MailboxConfig::new("incoming-mail", dir.path()))
        .with_object_store(objects.clone())
        .with_kms(create_static_kms())
        .build()
        .unwrap();

    let listed = store.list_remote_objects().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(objects.seen.lock().unwrap()[0], (None, None));
}
