use super::*;
use crate::types::TaskId;

#[tokio::test]
async fn test_get_status_unknown_is_none() {
    let (manager, _temp_dir) = create_test_manager(Arc::new(GatedRetrieval::new())).await;
    assert!(manager.get_status(&TaskId::new()).is_none());
}

#[tokio::test]
async fn test_list_downloads_newest_first_with_filter() {
    let retrieval = Arc::new(GatedRetrieval::new());
    let (manager, _temp_dir) = create_test_manager(retrieval.clone()).await;

    let first = manager
        .start_download(DownloadRequest::new("https://example.com/1"))
        .await
        .unwrap();
    let second = manager
        .start_download(DownloadRequest::new("https://example.com/2"))
        .await
        .unwrap();
    // Cancel the second before any worker runs
    manager.cancel(&second.id);
    let third = manager
        .start_download(DownloadRequest::new("https://example.com/3"))
        .await
        .unwrap();

    let all = manager.list_downloads(None);
    assert_eq!(all.total, 3);
    let ids: Vec<TaskId> = all.tasks.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![third.id, second.id, first.id]);

    let canceled = manager.list_downloads(Some("Canceled"));
    assert_eq!(canceled.total, 1);
    assert_eq!(canceled.tasks[0].id, second.id);

    assert_eq!(manager.list_downloads(Some("")).total, 3);
    assert_eq!(manager.list_downloads(Some("completed")).total, 0);
    assert_eq!(manager.list_downloads(Some("bogus")).total, 0);
}

#[tokio::test]
async fn test_check_downloads_splits_finished_and_pending() {
    let retrieval = Arc::new(GatedRetrieval::new());
    let (manager, _temp_dir) = create_test_manager(retrieval.clone()).await;

    let held = manager
        .start_download(DownloadRequest::new("https://example.com/held"))
        .await
        .unwrap();
    let dropped = manager
        .start_download(DownloadRequest::new("https://example.com/dropped"))
        .await
        .unwrap();
    manager.cancel(&dropped.id);
    let unknown = TaskId::new();

    let report = manager.check_downloads(&[held.id, dropped.id, unknown]);
    assert!(!report.all_done);
    assert_eq!(report.pending, vec![held.id]);
    assert_eq!(report.completed.len(), 2);
    assert_eq!(report.completed[0].id(), dropped.id);
    assert_eq!(report.completed[0].status(), Some(Status::Canceled));
    assert!(matches!(report.completed[1], CheckedTask::NotFound { id } if id == unknown));
    assert!(report.completed_paths().is_empty());

    let empty = manager.check_downloads(&[]);
    assert!(empty.all_done);
    assert!(empty.completed.is_empty());
}

#[tokio::test]
async fn test_wait_all_returns_when_every_task_finishes() {
    let out = tempfile::tempdir().unwrap();
    let retrieval = Arc::new(InstantRetrieval::new(out.path(), "clip.mp4"));
    let (manager, _temp_dir) = create_test_manager(retrieval).await;

    let mut ids = Vec::new();
    for n in 0..3 {
        let started = manager
            .start_download(DownloadRequest::new(format!("https://example.com/{}", n)))
            .await
            .unwrap();
        ids.push(started.id);
    }

    let report = manager
        .wait_for_downloads(&ids, WaitMode::All, Duration::from_secs(5))
        .await;
    assert!(!report.timed_out);
    assert!(report.pending.is_empty());
    assert_eq!(report.completed.len(), 3);
    assert!(
        report
            .completed
            .iter()
            .all(|t| t.status() == Some(Status::Completed))
    );
}

#[tokio::test]
async fn test_wait_any_returns_on_first_finished_task() {
    let retrieval = Arc::new(LoopingRetrieval::new());
    let (manager, _temp_dir) = create_test_manager(retrieval.clone()).await;

    let slow = manager
        .start_download(DownloadRequest::new("https://example.com/slow"))
        .await
        .unwrap();
    let quick = manager
        .start_download(DownloadRequest::new("https://example.com/quick"))
        .await
        .unwrap();
    tokio::time::timeout(Duration::from_secs(5), retrieval.started.notified())
        .await
        .unwrap();

    let waiter = {
        let manager = manager.clone();
        let ids = vec![slow.id, quick.id];
        tokio::spawn(async move {
            manager
                .wait_for_downloads(&ids, WaitMode::Any, Duration::from_secs(5))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    manager.cancel(&quick.id);

    let report = waiter.await.unwrap();
    assert!(!report.timed_out);
    assert_eq!(report.completed.len(), 1);
    assert_eq!(report.completed[0].id(), quick.id);
    assert_eq!(report.pending, vec![slow.id]);

    manager.cancel(&slow.id);
}

#[tokio::test]
async fn test_wait_times_out_with_partial_report() {
    let retrieval = Arc::new(GatedRetrieval::new());
    let (manager, _temp_dir) = create_test_manager(retrieval.clone()).await;

    let started = manager
        .start_download(DownloadRequest::new("https://example.com/v"))
        .await
        .unwrap();

    let report = manager
        .wait_for_downloads(&[started.id], WaitMode::All, Duration::from_millis(100))
        .await;
    assert!(report.timed_out);
    assert_eq!(report.pending, vec![started.id]);
    assert!(report.completed.is_empty());

    retrieval.release.notify_one();
}

#[tokio::test]
async fn test_wait_on_empty_or_unknown_ids_returns_immediately() {
    let (manager, _temp_dir) = create_test_manager(Arc::new(GatedRetrieval::new())).await;

    let report = manager
        .wait_for_downloads(&[], WaitMode::All, Duration::from_secs(30))
        .await;
    assert!(!report.timed_out);
    assert!(report.completed.is_empty());

    let unknown = TaskId::new();
    let report = tokio::time::timeout(
        Duration::from_secs(1),
        manager.wait_for_downloads(&[unknown], WaitMode::Any, Duration::from_secs(30)),
    )
    .await
    .expect("unknown ids count as finished");
    assert!(!report.timed_out);
    assert!(matches!(report.completed[0], CheckedTask::NotFound { .. }));
}

#[tokio::test]
async fn test_wait_with_unbounded_timeout_waits_for_completion() {
    let retrieval = Arc::new(GatedRetrieval::new());
    let (manager, _temp_dir) = create_test_manager(retrieval.clone()).await;

    let started = manager
        .start_download(DownloadRequest::new("https://example.com/v"))
        .await
        .unwrap();

    let waiter = {
        let manager = manager.clone();
        let id = started.id;
        tokio::spawn(async move {
            manager
                .wait_for_downloads(&[id], WaitMode::All, Duration::MAX)
                .await
        })
    };

    tokio::time::timeout(Duration::from_secs(5), retrieval.started.notified())
        .await
        .unwrap();
    retrieval.release.notify_one();

    let report = tokio::time::timeout(Duration::from_secs(5), waiter)
        .await
        .expect("wait did not return after the task finished")
        .unwrap();
    assert!(!report.timed_out);
    assert!(report.pending.is_empty());
    assert_eq!(report.completed[0].status(), Some(Status::Completed));
}
