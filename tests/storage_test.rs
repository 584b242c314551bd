//! Integration tests for SQLite storage layer
//!
//! Tests feedback and invocation persistence against in-memory and
//! file-backed SQLite databases.

use serde_json::json;
use tempfile::tempdir;
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

use intent_drift_radar::analysis::{FeedbackItem, Verdict};
use intent_drift_radar::config::DatabaseConfig;
use intent_drift_radar::storage::{Invocation, SqliteStorage, Storage};

/// Create an in-memory storage instance for testing
async fn create_test_storage() -> SqliteStorage {
    SqliteStorage::new_in_memory()
        .await
        .expect("Failed to create in-memory storage")
}

#[cfg(test)]
mod feedback_tests {
    use super::*;

    #[tokio::test]
    async fn test_append_and_list_feedback() {
        let storage = create_test_storage().await;

        let item = FeedbackItem::new(Uuid::new_v4(), Verdict::Confirm).with_comment("Accurate");
        assert_ok!(storage.append_feedback(&item).await);

        let listed = storage.list_feedback(None).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].analysis_id, item.analysis_id);
        assert_eq!(listed[0].verdict, Verdict::Confirm);
        assert_eq!(listed[0].comment.as_deref(), Some("Accurate"));
        assert_eq!(
            listed[0].created_at.timestamp_millis(),
            item.created_at.timestamp_millis()
        );
    }

    #[tokio::test]
    async fn test_feedback_is_append_only() {
        let storage = create_test_storage().await;
        let analysis_id = Uuid::new_v4();

        storage
            .append_feedback(&FeedbackItem::new(analysis_id, Verdict::Confirm))
            .await
            .unwrap();
        storage
            .append_feedback(&FeedbackItem::new(analysis_id, Verdict::Reject))
            .await
            .unwrap();

        // A second verdict on the same analysis is kept, not merged.
        let listed = storage.list_feedback(Some(analysis_id)).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].verdict, Verdict::Confirm);
        assert_eq!(listed[1].verdict, Verdict::Reject);
    }

    #[tokio::test]
    async fn test_list_feedback_filters_by_analysis() {
        let storage = create_test_storage().await;
        let wanted = Uuid::new_v4();

        storage
            .append_feedback(&FeedbackItem::new(Uuid::new_v4(), Verdict::Reject))
            .await
            .unwrap();
        storage
            .append_feedback(&FeedbackItem::new(wanted, Verdict::Confirm))
            .await
            .unwrap();

        let filtered = storage.list_feedback(Some(wanted)).await.unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].analysis_id, wanted);

        let none = storage.list_feedback(Some(Uuid::new_v4())).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_feedback_survives_reopen() {
        let dir = tempdir().unwrap();
        let config = DatabaseConfig {
            path: dir.path().join("nested").join("drift.db"),
            max_connections: 1,
        };
        let item = FeedbackItem::new(Uuid::new_v4(), Verdict::Reject);

        {
            let storage = SqliteStorage::new(&config).await.unwrap();
            storage.append_feedback(&item).await.unwrap();
            storage.pool().close().await;
        }

        let reopened = SqliteStorage::new(&config).await.unwrap();
        let listed = reopened.list_feedback(None).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].analysis_id, item.analysis_id);
    }
}

#[tokio::test]
async fn test_unwritable_database_path_fails() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"file").unwrap();

    let config = DatabaseConfig {
        path: blocker.join("drift.db"),
        max_connections: 1,
    };
    assert_err!(SqliteStorage::new(&config).await);
}

#[cfg(test)]
mod invocation_tests {
    use super::*;

    #[tokio::test]
    async fn test_log_successful_invocation() {
        let storage = create_test_storage().await;
        let analysis_id = Uuid::new_v4();

        let invocation = Invocation::new("drift_analyze", json!({"signals": [{"day": "Day 1"}]}))
            .with_analysis(analysis_id)
            .with_model("gemini-3-pro-preview")
            .success(json!({"drift_detected": false}), 840);
        storage.log_invocation(&invocation).await.unwrap();

        let logged = storage.list_invocations(10).await.unwrap();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].id, invocation.id);
        assert_eq!(logged[0].analysis_id, Some(analysis_id.to_string()));
        assert_eq!(logged[0].input["signals"][0]["day"], "Day 1");
        assert_eq!(logged[0].latency_ms, Some(840));
        assert!(logged[0].success);
        assert!(logged[0].error_code.is_none());
    }

    #[tokio::test]
    async fn test_log_failed_invocation() {
        let storage = create_test_storage().await;

        let invocation =
            Invocation::new("drift_analyze_ensemble", json!({})).failure("MODEL_ENSEMBLE_FAILED", 90_000);
        assert_ok!(storage.log_invocation(&invocation).await);

        let logged = storage.list_invocations(10).await.unwrap();
        assert!(!logged[0].success);
        assert!(logged[0].output.is_none());
        assert_eq!(logged[0].error_code.as_deref(), Some("MODEL_ENSEMBLE_FAILED"));
    }

    #[tokio::test]
    async fn test_list_invocations_newest_first_with_limit() {
        let storage = create_test_storage().await;

        for i in 0..5 {
            let invocation = Invocation::new("drift_analyze", json!({ "n": i }));
            storage.log_invocation(&invocation).await.unwrap();
        }

        let logged = storage.list_invocations(3).await.unwrap();
        assert_eq!(logged.len(), 3);
        assert_eq!(logged[0].input["n"], 4);
        assert_eq!(logged[2].input["n"], 2);
    }
}
