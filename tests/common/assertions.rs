//! Custom test assertions for integration tests

use media_dl::{Event, Status, TaskId, TaskInfo, TaskManager, WaitMode};
use std::time::Duration;

/// Wait for a task to reach a terminal state and return its snapshot
pub async fn wait_for_terminal(manager: &TaskManager, id: TaskId, timeout: Duration) -> TaskInfo {
    let report = manager
        .wait_for_downloads(&[id], WaitMode::All, timeout)
        .await;
    assert!(!report.timed_out, "task {} did not finish within {:?}", id, timeout);
    manager.get_status(&id).unwrap()
}

/// Poll `get_status` like a remote client would until the task is done
///
/// Asserts on every observation that progress only reaches 100 together
/// with the `completed` status.
pub async fn poll_until_done(manager: &TaskManager, id: TaskId, timeout: Duration) -> TaskInfo {
    let poll = async {
        loop {
            let info = manager.get_status(&id).unwrap();
            if info.progress >= 100.0 {
                assert_eq!(info.status, Status::Completed, "100% before completion");
            }
            if info.is_done {
                return info;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    };
    tokio::time::timeout(timeout, poll)
        .await
        .expect("task did not finish in time")
}

/// Collect events until `predicate` matches one (inclusive) or `timeout` elapses
pub async fn collect_events_until(
    events: &mut tokio::sync::broadcast::Receiver<Event>,
    timeout: Duration,
    predicate: impl Fn(&Event) -> bool,
) -> Vec<Event> {
    let mut collected = Vec::new();
    let _ = tokio::time::timeout(timeout, async {
        while let Ok(event) = events.recv().await {
            let done = predicate(&event);
            collected.push(event);
            if done {
                break;
            }
        }
    })
    .await;
    collected
}
