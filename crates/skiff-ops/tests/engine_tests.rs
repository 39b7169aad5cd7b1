use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use skiff_core::{EngineConfig, JobId, JobRequest, JobState, OpsError, ProgressSnapshot};
use skiff_ops::{Clipboard, EngineEvent, JobQueue, UndoLog};
use tokio::time::sleep;

fn default_queue() -> (JobQueue, tokio::sync::mpsc::Receiver<EngineEvent>) {
    JobQueue::new(EngineConfig::default())
}

fn write_file(path: &Path, contents: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

/// Large sparse file: instant to create, slow enough to copy that a cancel
/// can land mid-stream.
fn write_sparse(path: &Path, len: u64) {
    let file = fs::File::create(path).unwrap();
    file.set_len(len).unwrap();
}

async fn wait_terminal(queue: &JobQueue, id: JobId) -> ProgressSnapshot {
    let deadline = Instant::now() + Duration::from_secs(30);
    loop {
        if let Some(snapshot) = queue.snapshot(id) {
            if snapshot.is_terminal() {
                return snapshot;
            }
        }
        assert!(Instant::now() < deadline, "job {id} did not finish in time");
        sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn copy_leaves_source_and_duplicates_content() {
    let root = tempfile::tempdir().unwrap();
    let dir1 = root.path().join("dir1");
    let dir2 = root.path().join("dir2");
    fs::create_dir_all(&dir2).unwrap();
    write_file(&dir1.join("file1.txt"), b"hello from dir1");

    let (queue, _events) = default_queue();
    let mut clipboard = Clipboard::new();
    clipboard.set_copy(vec![dir1.join("file1.txt")]);

    let id = queue.paste(&mut clipboard, &dir2).unwrap();
    let snapshot = wait_terminal(&queue, id).await;

    assert_eq!(snapshot.state, JobState::Completed);
    assert!((snapshot.percentage() - 100.0).abs() < f64::EPSILON);
    assert_eq!(
        fs::read(dir2.join("file1.txt")).unwrap(),
        b"hello from dir1"
    );
    assert_eq!(
        fs::read(dir1.join("file1.txt")).unwrap(),
        b"hello from dir1"
    );
    // copy mode keeps the clipboard for repeated pastes
    assert!(!clipboard.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn repeated_pastes_generate_numbered_names() {
    let root = tempfile::tempdir().unwrap();
    let dir1 = root.path().join("dir1");
    let dir2 = root.path().join("dir2");
    fs::create_dir_all(&dir2).unwrap();
    write_file(&dir1.join("file1.txt"), b"same content");

    let (queue, _events) = default_queue();
    let mut clipboard = Clipboard::new();
    clipboard.set_copy(vec![dir1.join("file1.txt")]);

    for _ in 0..3 {
        let id = queue.paste(&mut clipboard, &dir2).unwrap();
        let snapshot = wait_terminal(&queue, id).await;
        assert_eq!(snapshot.state, JobState::Completed);
    }

    for name in ["file1.txt", "file1(1).txt", "file1(2).txt"] {
        assert_eq!(fs::read(dir2.join(name)).unwrap(), b"same content", "{name}");
    }
    assert!(!dir2.join("file1(3).txt").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn paste_resolves_around_existing_numbered_names() {
    let root = tempfile::tempdir().unwrap();
    let dir1 = root.path().join("dir1");
    let dir2 = root.path().join("dir2");
    write_file(&dir1.join("file1.txt"), b"new");
    write_file(&dir2.join("file1.txt"), b"old");
    write_file(&dir2.join("file1(1).txt"), b"old");

    let (queue, _events) = default_queue();
    let mut clipboard = Clipboard::new();
    clipboard.set_copy(vec![dir1.join("file1.txt")]);

    let id = queue.paste(&mut clipboard, &dir2).unwrap();
    wait_terminal(&queue, id).await;

    assert_eq!(fs::read(dir2.join("file1(2).txt")).unwrap(), b"new");
    // pre-existing files are untouched
    assert_eq!(fs::read(dir2.join("file1.txt")).unwrap(), b"old");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn empty_clipboard_paste_is_rejected_synchronously() {
    let (queue, _events) = default_queue();
    let mut clipboard = Clipboard::new();

    assert!(matches!(
        queue.paste(&mut clipboard, "/nowhere"),
        Err(OpsError::EmptyClipboard)
    ));
    assert!(queue.list().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cut_paste_relocates_nested_tree() {
    let root = tempfile::tempdir().unwrap();
    let src = root.path().join("src");
    let dest = root.path().join("dest");
    fs::create_dir_all(&dest).unwrap();
    write_file(&src.join("dir1/file1.txt"), b"one");
    write_file(&src.join("dir1/sub/file2.txt"), b"two");
    write_file(&src.join("dir1/sub/deep/file3.txt"), b"three");

    let (queue, _events) = default_queue();
    let mut clipboard = Clipboard::new();
    clipboard.set_cut(vec![src.join("dir1")]);

    let id = queue.paste(&mut clipboard, &dest).unwrap();
    // cut mode clears the clipboard the moment the paste is issued
    assert!(clipboard.is_empty());

    let snapshot = wait_terminal(&queue, id).await;
    assert_eq!(snapshot.state, JobState::Completed);

    assert_eq!(fs::read(dest.join("dir1/file1.txt")).unwrap(), b"one");
    assert_eq!(fs::read(dest.join("dir1/sub/file2.txt")).unwrap(), b"two");
    assert_eq!(
        fs::read(dest.join("dir1/sub/deep/file3.txt")).unwrap(),
        b"three"
    );
    assert!(!src.join("dir1").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn delete_removes_tree_counting_items() {
    let root = tempfile::tempdir().unwrap();
    let target = root.path().join("doomed");
    write_file(&target.join("a.txt"), b"a");
    write_file(&target.join("sub/b.txt"), b"b");

    let (queue, _events) = default_queue();
    let id = queue.delete(vec![target.clone()]);
    let snapshot = wait_terminal(&queue, id).await;

    assert_eq!(snapshot.state, JobState::Completed);
    assert!(!target.exists());
    // two files plus two directories
    assert_eq!(snapshot.total_items, 4);
    assert_eq!(snapshot.processed_items, 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_mid_file_removes_partial_and_keeps_earlier_files() {
    let root = tempfile::tempdir().unwrap();
    let src = root.path().join("src");
    let dest = root.path().join("dest");
    fs::create_dir_all(&src).unwrap();
    fs::create_dir_all(&dest).unwrap();
    write_file(&src.join("small.txt"), b"finished early");
    let big_len = 64 * 1024 * 1024;
    write_sparse(&src.join("big.bin"), big_len);

    let (queue, _events) = default_queue();
    let id = queue.submit(JobRequest::copy(
        vec![src.join("small.txt"), src.join("big.bin")],
        &dest,
    ));

    // wait until the large file is actually streaming, then cancel
    let small_len = 14u64;
    let deadline = Instant::now() + Duration::from_secs(30);
    loop {
        let snapshot = queue.snapshot(id).expect("job must be tracked");
        if snapshot.processed_bytes > small_len {
            break;
        }
        assert!(
            Instant::now() < deadline && !snapshot.is_terminal(),
            "copy finished before it could be cancelled"
        );
        sleep(Duration::from_millis(1)).await;
    }
    assert!(queue.cancel(id));

    let snapshot = wait_terminal(&queue, id).await;
    assert_eq!(snapshot.state, JobState::Cancelled);

    // earlier file in the same job survives, the partial one does not
    assert_eq!(fs::read(dest.join("small.txt")).unwrap(), b"finished early");
    assert!(!dest.join("big.bin").exists());
    assert_eq!(fs::metadata(src.join("big.bin")).unwrap().len(), big_len);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelling_one_job_does_not_touch_siblings() {
    let root = tempfile::tempdir().unwrap();
    let src = root.path().join("src");
    let dest_a = root.path().join("dest_a");
    let dest_b = root.path().join("dest_b");
    fs::create_dir_all(&dest_a).unwrap();
    fs::create_dir_all(&dest_b).unwrap();
    write_sparse(&src.join("big_a.bin"), 64 * 1024 * 1024);
    write_file(&src.join("b.txt"), b"sibling payload");

    let (queue, _events) = default_queue();
    let id_a = queue.submit(JobRequest::copy(vec![src.join("big_a.bin")], &dest_a));
    let id_b = queue.submit(JobRequest::copy(vec![src.join("b.txt")], &dest_b));
    assert!(queue.cancel(id_a));

    let snapshot_a = wait_terminal(&queue, id_a).await;
    let snapshot_b = wait_terminal(&queue, id_b).await;

    assert_eq!(snapshot_a.state, JobState::Cancelled);
    assert!(!dest_a.join("big_a.bin").exists());
    assert_eq!(snapshot_b.state, JobState::Completed);
    assert_eq!(fs::read(dest_b.join("b.txt")).unwrap(), b"sibling payload");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn missing_source_is_a_partial_failure() {
    let root = tempfile::tempdir().unwrap();
    let src = root.path().join("src");
    let dest = root.path().join("dest");
    fs::create_dir_all(&dest).unwrap();
    write_file(&src.join("ok.txt"), b"fine");
    let missing = src.join("missing.txt");

    let (queue, _events) = default_queue();
    let id = queue.submit(JobRequest::copy(
        vec![missing.clone(), src.join("ok.txt")],
        &dest,
    ));
    let snapshot = wait_terminal(&queue, id).await;

    assert_eq!(snapshot.state, JobState::PartiallyFailed);
    assert_eq!(snapshot.errors.len(), 1);
    assert_eq!(snapshot.errors[0].path, missing);
    assert_eq!(fs::read(dest.join("ok.txt")).unwrap(), b"fine");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn all_entries_failing_fails_the_job() {
    let root = tempfile::tempdir().unwrap();
    let dest = root.path().join("dest");
    fs::create_dir_all(&dest).unwrap();

    let (queue, _events) = default_queue();
    let id = queue.submit(JobRequest::copy(
        vec![root.path().join("nope1"), root.path().join("nope2")],
        &dest,
    ));
    let snapshot = wait_terminal(&queue, id).await;

    assert_eq!(snapshot.state, JobState::Failed);
    assert_eq!(snapshot.errors.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn move_on_same_volume_keeps_content() {
    let root = tempfile::tempdir().unwrap();
    let src = root.path().join("src");
    let dest = root.path().join("dest");
    fs::create_dir_all(&dest).unwrap();
    write_file(&src.join("a.txt"), b"moved bytes");

    let (queue, _events) = default_queue();
    let id = queue.submit(JobRequest::move_to(vec![src.join("a.txt")], &dest));
    let snapshot = wait_terminal(&queue, id).await;

    assert_eq!(snapshot.state, JobState::Completed);
    assert!(!src.join("a.txt").exists());
    assert_eq!(fs::read(dest.join("a.txt")).unwrap(), b"moved bytes");
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn copy_preserves_permission_bits() {
    use std::os::unix::fs::PermissionsExt;

    let root = tempfile::tempdir().unwrap();
    let src = root.path().join("src");
    let dest = root.path().join("dest");
    fs::create_dir_all(&dest).unwrap();
    let script = src.join("run.sh");
    write_file(&script, b"#!/bin/sh\n");
    fs::set_permissions(&script, fs::Permissions::from_mode(0o754)).unwrap();

    let (queue, _events) = default_queue();
    let id = queue.submit(JobRequest::copy(vec![script], &dest));
    wait_terminal(&queue, id).await;

    let mode = fs::metadata(dest.join("run.sh")).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o754);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn copy_preserves_modification_time() {
    let root = tempfile::tempdir().unwrap();
    let src = root.path().join("src");
    let dest = root.path().join("dest");
    fs::create_dir_all(&dest).unwrap();
    let file = src.join("old.txt");
    write_file(&file, b"aged");
    let mtime = std::time::SystemTime::now() - Duration::from_secs(3600);
    fs::File::options()
        .write(true)
        .open(&file)
        .unwrap()
        .set_modified(mtime)
        .unwrap();

    let (queue, _events) = default_queue();
    let id = queue.submit(JobRequest::copy(vec![file.clone()], &dest));
    wait_terminal(&queue, id).await;

    let src_mtime = fs::metadata(&file).unwrap().modified().unwrap();
    let dest_mtime = fs::metadata(dest.join("old.txt")).unwrap().modified().unwrap();
    let drift = dest_mtime
        .duration_since(src_mtime)
        .unwrap_or_else(|e| e.duration());
    assert!(drift <= Duration::from_secs(1), "mtime drifted by {drift:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn events_report_creation_and_terminal_state() {
    let root = tempfile::tempdir().unwrap();
    let src = root.path().join("src");
    let dest = root.path().join("dest");
    fs::create_dir_all(&dest).unwrap();
    write_file(&src.join("a.txt"), b"payload");

    let (queue, mut events) = default_queue();
    let id = queue.submit(JobRequest::copy(vec![src.join("a.txt")], &dest));

    let created = tokio::time::timeout(Duration::from_secs(10), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(created, EngineEvent::JobCreated(created_id) if created_id == id));

    let terminal = tokio::time::timeout(Duration::from_secs(10), events.recv())
        .await
        .unwrap()
        .unwrap();
    match terminal {
        EngineEvent::JobTerminal {
            id: done,
            state,
            errors,
        } => {
            assert_eq!(done, id);
            assert_eq!(state, JobState::Completed);
            assert!(errors.is_empty());
        }
        other => panic!("expected terminal event, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn terminal_jobs_are_pruned_after_retention() {
    let root = tempfile::tempdir().unwrap();
    let src = root.path().join("src");
    let dest = root.path().join("dest");
    fs::create_dir_all(&dest).unwrap();
    write_file(&src.join("a.txt"), b"x");

    let config = EngineConfig::builder()
        .retention(Duration::ZERO)
        .build()
        .unwrap();
    let (queue, _events) = JobQueue::new(config);
    let id = queue.submit(JobRequest::copy(vec![src.join("a.txt")], &dest));
    wait_terminal(&queue, id).await;

    sleep(Duration::from_millis(20)).await;
    assert!(queue.list().is_empty());
    assert!(queue.snapshot(id).is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn acknowledge_drops_terminal_jobs_only_once() {
    let root = tempfile::tempdir().unwrap();
    let src = root.path().join("src");
    let dest = root.path().join("dest");
    fs::create_dir_all(&dest).unwrap();
    write_file(&src.join("a.txt"), b"x");

    let (queue, _events) = default_queue();
    let id = queue.submit(JobRequest::copy(vec![src.join("a.txt")], &dest));
    wait_terminal(&queue, id).await;

    assert!(queue.acknowledge(id));
    assert!(queue.snapshot(id).is_none());
    assert!(!queue.acknowledge(id));
    assert!(!queue.cancel(id));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_of_unknown_job_is_rejected() {
    let (queue, _events) = default_queue();
    assert!(!queue.cancel(JobId::new(999)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn undo_of_copy_deletes_the_created_files() {
    let root = tempfile::tempdir().unwrap();
    let src = root.path().join("src");
    let dest = root.path().join("dest");
    fs::create_dir_all(&dest).unwrap();
    write_file(&src.join("a.txt"), b"payload");

    let (queue, _events) = default_queue();
    let id = queue.submit(JobRequest::copy(vec![src.join("a.txt")], &dest));
    wait_terminal(&queue, id).await;

    let mut undo = UndoLog::new();
    undo.record(&queue.reporter().job(id).unwrap());

    let requests = undo.undo();
    assert_eq!(requests.len(), 1);
    let undo_id = queue.submit(requests.into_iter().next().unwrap());
    let snapshot = wait_terminal(&queue, undo_id).await;

    assert_eq!(snapshot.state, JobState::Completed);
    assert!(!dest.join("a.txt").exists());
    assert_eq!(fs::read(src.join("a.txt")).unwrap(), b"payload");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn undo_of_move_restores_the_source() {
    let root = tempfile::tempdir().unwrap();
    let src = root.path().join("src");
    let dest = root.path().join("dest");
    fs::create_dir_all(&dest).unwrap();
    write_file(&src.join("a.txt"), b"boomerang");

    let (queue, _events) = default_queue();
    let id = queue.submit(JobRequest::move_to(vec![src.join("a.txt")], &dest));
    wait_terminal(&queue, id).await;
    assert!(!src.join("a.txt").exists());

    let mut undo = UndoLog::new();
    undo.record(&queue.reporter().job(id).unwrap());

    for request in undo.undo() {
        let undo_id = queue.submit(request);
        wait_terminal(&queue, undo_id).await;
    }

    assert_eq!(fs::read(src.join("a.txt")).unwrap(), b"boomerang");
    assert!(!dest.join("a.txt").exists());
}
