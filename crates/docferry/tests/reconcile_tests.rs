//! Reconciliation sweeps and maintenance operations against an in-memory remote

mod common;

use common::{uploader, Corpus, FakeRemote, ID_COLUMN, PROJECT_ID};
use docferry::api::DocumentStatus;
use docferry::ledger::Ledger;
use docferry::reconcile::{self, DedupeResult};
use docferry::{Reconciler, Shutdown, UploadError};
use std::sync::Arc;

struct Fixture {
    corpus: Corpus,
    remote: Arc<FakeRemote>,
    ledger: Ledger,
    reconciler: Reconciler,
}

/// A corpus of `count` items whose ledger has `failed` recorded as failures
fn fixture(count: usize, failed: &[&str]) -> Fixture {
    let corpus = Corpus::new(count);
    let remote = FakeRemote::new();
    let config = corpus.config(1, 25);

    let ledger = Ledger::initialize(&corpus.ledger).unwrap();
    for identifier in failed {
        ledger.record_failure(identifier, "transfer failed: timeout").unwrap();
    }

    let reconciler = Reconciler::new(uploader(&remote, &config), corpus.source(), config.batch_size);

    Fixture {
        corpus,
        remote,
        ledger,
        reconciler,
    }
}

#[tokio::test]
async fn test_unrecorded_success_is_marked_completed_without_upload() {
    let mut f = fixture(3, &["DOC-0002"]);
    f.remote.insert(Some("DOC-0002"), DocumentStatus::Success);

    let report = f.reconciler.local_sweep(&mut f.ledger).await.unwrap();

    assert_eq!(report.examined, 1);
    assert_eq!(report.marked_completed, 1);
    assert_eq!(report.requeued, 0);
    assert_eq!(f.remote.create_calls(), 0);

    let entry = f.ledger.entry("DOC-0002").unwrap().unwrap();
    assert!(entry.completed);
    assert_eq!(entry.error_count, 1);
}

#[tokio::test]
async fn test_missing_remote_record_is_uploaded_again() {
    let mut f = fixture(3, &["DOC-0001", "DOC-0003"]);

    let report = f.reconciler.local_sweep(&mut f.ledger).await.unwrap();

    assert_eq!(report.requeued, 2);
    assert_eq!(report.uploaded, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(f.remote.create_calls(), 1);
    assert!(f.ledger.failed_identifiers().unwrap().is_empty());
    assert_eq!(f.remote.documents_for("DOC-0001")[0].status, DocumentStatus::Success);
}

#[tokio::test]
async fn test_single_broken_record_is_replaced() {
    let mut f = fixture(2, &["DOC-0001"]);
    let stale = f.remote.insert(Some("DOC-0001"), DocumentStatus::Nofile);

    let report = f.reconciler.local_sweep(&mut f.ledger).await.unwrap();

    assert_eq!(report.requeued, 1);
    assert_eq!(report.uploaded, 1);
    assert_eq!(f.remote.status_of(stale), None);

    let docs = f.remote.documents_for("DOC-0001");
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].status, DocumentStatus::Success);
    assert!(f.ledger.entry("DOC-0001").unwrap().unwrap().completed);
}

#[tokio::test]
async fn test_duplicates_keep_one_success() {
    let mut f = fixture(2, &["DOC-0001"]);
    f.remote.insert(Some("DOC-0001"), DocumentStatus::Error);
    let good = f.remote.insert(Some("DOC-0001"), DocumentStatus::Success);
    f.remote.insert(Some("DOC-0001"), DocumentStatus::Success);

    let report = f.reconciler.local_sweep(&mut f.ledger).await.unwrap();

    assert_eq!(report.marked_completed, 1);
    assert_eq!(report.requeued, 0);
    let docs = f.remote.documents_for("DOC-0001");
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].id, good);
    assert!(f.ledger.entry("DOC-0001").unwrap().unwrap().completed);
}

#[tokio::test]
async fn test_duplicates_without_success_are_replaced() {
    let mut f = fixture(2, &["DOC-0002"]);
    f.remote.insert(Some("DOC-0002"), DocumentStatus::Error);
    f.remote.insert(Some("DOC-0002"), DocumentStatus::Nofile);

    let report = f.reconciler.local_sweep(&mut f.ledger).await.unwrap();

    assert_eq!(report.requeued, 1);
    assert_eq!(report.uploaded, 1);
    let docs = f.remote.documents_for("DOC-0002");
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].status, DocumentStatus::Success);
}

#[tokio::test]
async fn test_undeletable_record_becomes_failure_not_retry() {
    let mut f = fixture(2, &["DOC-0001"]);
    f.remote.insert(Some("DOC-0001"), DocumentStatus::Error);
    f.remote.fail_delete();

    let report = f.reconciler.local_sweep(&mut f.ledger).await.unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.requeued, 0);
    assert_eq!(f.remote.create_calls(), 0);

    let entry = f.ledger.entry("DOC-0001").unwrap().unwrap();
    assert!(!entry.completed);
    assert_eq!(entry.error_count, 2);
    assert!(entry.last_error.contains("could not be deleted"));
}

#[tokio::test]
async fn test_failed_search_is_recorded_and_sweep_continues() {
    let mut f = fixture(2, &["DOC-0001", "DOC-0002"]);
    f.remote.fail_search();

    let report = f.reconciler.local_sweep(&mut f.ledger).await.unwrap();

    assert_eq!(report.examined, 2);
    assert_eq!(report.failed, 2);
    let entry = f.ledger.entry("DOC-0002").unwrap().unwrap();
    assert!(entry.last_error.contains("search failed"));
}

#[tokio::test]
async fn test_identifier_missing_from_metadata_is_recorded() {
    let mut f = fixture(2, &["GONE-1"]);

    let report = f.reconciler.local_sweep(&mut f.ledger).await.unwrap();

    assert_eq!(report.requeued, 1);
    assert_eq!(report.uploaded, 0);
    assert_eq!(report.failed, 1);
    let entry = f.ledger.entry("GONE-1").unwrap().unwrap();
    assert!(entry.last_error.contains("not found in metadata"));
}

#[tokio::test]
async fn test_remote_sweep_replaces_broken_documents() {
    let mut f = fixture(4, &[]);
    let broken = f.remote.insert(Some("DOC-0003"), DocumentStatus::Nofile);
    let errored = f.remote.insert(Some("DOC-0004"), DocumentStatus::Error);
    let fine = f.remote.insert(Some("DOC-0001"), DocumentStatus::Success);
    let anonymous = f.remote.insert(None, DocumentStatus::Error);

    let report = f.reconciler.remote_sweep(&mut f.ledger).await.unwrap();

    assert_eq!(report.examined, 3);
    assert_eq!(report.requeued, 2);
    assert_eq!(report.uploaded, 2);
    assert_eq!(f.remote.status_of(broken), None);
    assert_eq!(f.remote.status_of(errored), None);
    assert_eq!(f.remote.status_of(fine), Some(DocumentStatus::Success));
    assert_eq!(f.remote.status_of(anonymous), Some(DocumentStatus::Error));

    let completed = f.ledger.load_completed_ids().unwrap();
    assert!(completed.contains("DOC-0003"));
    assert!(completed.contains("DOC-0004"));
}

#[tokio::test]
async fn test_remote_sweep_reopens_completed_row_when_reupload_fails() {
    let mut f = fixture(2, &[]);
    f.ledger.record_success("DOC-0001").unwrap();
    let broken = f.remote.insert(Some("DOC-0001"), DocumentStatus::Error);
    f.remote.fail_put_for("DOC-0001");

    let report = f.reconciler.remote_sweep(&mut f.ledger).await.unwrap();

    assert_eq!(report.requeued, 1);
    assert_eq!(report.uploaded, 0);
    assert_eq!(report.failed, 1);
    assert_eq!(f.remote.status_of(broken), None);
    assert!(f.remote.documents_for("DOC-0001").is_empty());

    let entry = f.ledger.entry("DOC-0001").unwrap().unwrap();
    assert!(!entry.completed);
    assert_eq!(entry.error_count, 1);
    assert!(entry.last_error.contains("transfer failed"));
    assert_eq!(f.ledger.failed_identifiers().unwrap(), vec!["DOC-0001"]);
    assert!(!f.ledger.load_completed_ids().unwrap().contains("DOC-0001"));

    // A later local sweep against a healthy service finishes the job
    let healthy = FakeRemote::new();
    let config = f.corpus.config(1, 25);
    let retry = Reconciler::new(uploader(&healthy, &config), f.corpus.source(), 25);
    let report = retry.local_sweep(&mut f.ledger).await.unwrap();

    assert_eq!(report.uploaded, 1);
    assert_eq!(healthy.documents_for("DOC-0001")[0].status, DocumentStatus::Success);
    assert!(f.ledger.entry("DOC-0001").unwrap().unwrap().completed);
}

#[tokio::test]
async fn test_remote_sweep_delete_failure_reopens_completed_row() {
    let mut f = fixture(2, &[]);
    f.ledger.record_success("DOC-0002").unwrap();
    let broken = f.remote.insert(Some("DOC-0002"), DocumentStatus::Nofile);
    f.remote.fail_delete();

    let report = f.reconciler.remote_sweep(&mut f.ledger).await.unwrap();

    assert_eq!(report.examined, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.requeued, 0);
    assert_eq!(f.remote.create_calls(), 0);
    assert_eq!(f.remote.status_of(broken), Some(DocumentStatus::Nofile));

    let entry = f.ledger.entry("DOC-0002").unwrap().unwrap();
    assert!(!entry.completed);
    assert_eq!(entry.error_count, 1);
    assert!(entry.last_error.contains("could not be deleted"));
    assert_eq!(f.ledger.failed_identifiers().unwrap(), vec!["DOC-0002"]);
}

#[tokio::test]
async fn test_sweeps_stop_when_shutdown_already_triggered() {
    let mut f = fixture(3, &["DOC-0001", "DOC-0002"]);
    let shutdown = Shutdown::new();
    shutdown.trigger();
    let config = f.corpus.config(1, 25);
    let reconciler = Reconciler::new(uploader(&f.remote, &config), f.corpus.source(), 25)
        .with_shutdown(shutdown);

    let report = reconciler.local_sweep(&mut f.ledger).await.unwrap();

    assert_eq!(report.examined, 0);
    assert_eq!(f.remote.create_calls(), 0);
}

#[tokio::test]
async fn test_dedupe_keeps_first_success_only() {
    let remote = FakeRemote::new();
    let failed = remote.insert(Some("A"), DocumentStatus::Error);
    let first = remote.insert(Some("A"), DocumentStatus::Success);
    let second = remote.insert(Some("A"), DocumentStatus::Success);
    remote.insert(Some("B"), DocumentStatus::Error);

    let identifiers = vec!["A".to_string(), "B".to_string(), "C".to_string()];
    let results = reconcile::dedupe(&*remote, ID_COLUMN, &identifiers, &Shutdown::new()).await;

    assert_eq!(
        results[0],
        DedupeResult::Kept {
            identifier: "A".to_string(),
            kept: first,
            deleted: vec![failed, second],
        }
    );
    assert_eq!(
        results[1],
        DedupeResult::NoSuccess {
            identifier: "B".to_string(),
            matches: 1,
        }
    );
    assert_eq!(
        results[2],
        DedupeResult::NotFound {
            identifier: "C".to_string(),
        }
    );
    assert_eq!(remote.documents_for("A").len(), 1);
    assert_eq!(remote.documents_for("B").len(), 1);
}

#[tokio::test]
async fn test_purge_deletes_everything_in_groups() {
    let remote = FakeRemote::new();
    for i in 0..12 {
        remote.insert(Some(&format!("P-{}", i)), DocumentStatus::Success);
    }

    let deleted = reconcile::purge(&*remote, PROJECT_ID, 5, &Shutdown::new())
        .await
        .unwrap();

    assert_eq!(deleted, 12);
    assert_eq!(remote.document_count(), 0);
}

#[tokio::test]
async fn test_purge_rejects_group_size_outside_service_limit() {
    let remote = FakeRemote::new();
    remote.insert(Some("P-1"), DocumentStatus::Success);

    for group_size in [0, 26] {
        let err = reconcile::purge(&*remote, PROJECT_ID, group_size, &Shutdown::new())
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Config(_)));
        assert!(err.to_string().contains("batch size"));
    }

    assert_eq!(remote.delete_calls(), 0);
    assert_eq!(remote.document_count(), 1);
}
