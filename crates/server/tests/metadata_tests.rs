//! Integration tests for usage tracking across metadata backends.

mod common;

use common::{TestMetadata, run_metadata_test_both};
use dbprov_metadata::{MetadataStore, UsageRepo};
use std::sync::Arc;
use time::{Duration, OffsetDateTime};

fn at(secs: i64) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(1_700_000_000 + secs).unwrap()
}

#[tokio::test]
async fn test_touch_inserts_then_updates_last_access() {
    run_metadata_test_both(|store: Arc<dyn MetadataStore>| async move {
        store
            .touch_instance("orders_ci-1", "orders", "ci-1", at(0))
            .await
            .unwrap();

        let row = store
            .get_instance_usage("orders_ci-1")
            .await
            .unwrap()
            .expect("record inserted");
        assert_eq!(row.full_instance_name, "orders_ci-1");
        assert_eq!(row.template_name, "orders");
        assert_eq!(row.caller_id, "ci-1");
        assert_eq!(row.first_provisioned_at, at(0));
        assert_eq!(row.last_accessed_at, at(0));

        store
            .touch_instance("orders_ci-1", "orders", "ci-1", at(60))
            .await
            .unwrap();

        let row = store
            .get_instance_usage("orders_ci-1")
            .await
            .unwrap()
            .expect("record kept");
        assert_eq!(row.first_provisioned_at, at(0));
        assert_eq!(row.last_accessed_at, at(60));
    })
    .await;
}

#[tokio::test]
async fn test_list_orders_by_last_access() {
    run_metadata_test_both(|store: Arc<dyn MetadataStore>| async move {
        store
            .touch_instance("orders_ci-1", "orders", "ci-1", at(0))
            .await
            .unwrap();
        store
            .touch_instance("orders_ci-2", "orders", "ci-2", at(10))
            .await
            .unwrap();
        store
            .touch_instance("billing_ci-1", "billing", "ci-1", at(5))
            .await
            .unwrap();
        store
            .touch_instance("orders_ci-1", "orders", "ci-1", at(20))
            .await
            .unwrap();

        let names: Vec<String> = store
            .list_instance_usage()
            .await
            .unwrap()
            .into_iter()
            .map(|row| row.full_instance_name)
            .collect();
        assert_eq!(names, vec!["orders_ci-1", "orders_ci-2", "billing_ci-1"]);
    })
    .await;
}

#[tokio::test]
async fn test_get_unknown_instance_is_none() {
    run_metadata_test_both(|store: Arc<dyn MetadataStore>| async move {
        assert!(store.get_instance_usage("nobody_here").await.unwrap().is_none());
        store.health_check().await.unwrap();
    })
    .await;
}

#[tokio::test]
async fn test_sqlite_file_store_survives_reopen() {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("usage.db");

    {
        let store = dbprov_metadata::SqliteStore::new(&db_path).await.unwrap();
        store
            .touch_instance("orders_ci-1", "orders", "ci-1", at(0))
            .await
            .unwrap();
        store.pool().close().await;
    }

    let store = dbprov_metadata::SqliteStore::new(&db_path).await.unwrap();
    let row = store.get_instance_usage("orders_ci-1").await.unwrap();
    assert!(row.is_some());
}

#[tokio::test]
async fn test_sub_second_timestamps_are_ordered() {
    let metadata = TestMetadata::in_memory().await.unwrap();
    let store = metadata.store();
    let t0 = at(0);
    let t1 = t0 + Duration::milliseconds(250);

    store
        .touch_instance("orders_ci-1", "orders", "ci-1", t0)
        .await
        .unwrap();
    store
        .touch_instance("orders_ci-1", "orders", "ci-1", t1)
        .await
        .unwrap();

    let row = store.get_instance_usage("orders_ci-1").await.unwrap().unwrap();
    assert!(row.last_accessed_at > row.first_provisioned_at);
}
