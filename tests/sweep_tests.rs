use ssesweep::{LogFormat, MockStore, OutcomeLog, RunMode, SweepConfig, SweepError, SweepRunner};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const BUCKET: &str = "audit";

fn scenario_store() -> MockStore {
    MockStore::new()
        .with_page_size(2)
        .with_object(BUCKET, "a", 10, Some("AES256"))
        .with_object(BUCKET, "b", 20, Some("AES256"))
        .with_object(BUCKET, "c", 30, None)
        .with_object(BUCKET, "d", 40, None)
        .with_object(BUCKET, "e", 50, None)
        .failing_metadata("e")
}

fn jsonl_config(dir: &TempDir, workers: usize) -> SweepConfig {
    SweepConfig::new(BUCKET)
        .with_workers(workers)
        .with_log_file(dir.path().join("outcomes.log"))
        .with_log_format(LogFormat::Jsonl)
        .with_verify(1, 0)
}

fn read_log(path: &Path) -> Vec<serde_json::Value> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn by_key(lines: &[serde_json::Value]) -> HashMap<String, serde_json::Value> {
    lines
        .iter()
        .map(|v| (v["key"].as_str().unwrap().to_string(), v.clone()))
        .collect()
}

#[tokio::test]
async fn test_remediate_mixed_bucket() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(scenario_store());
    let config = jsonl_config(&dir, 2);
    let log_path = config.log_path(RunMode::Remediate);

    let report = SweepRunner::new(store.clone(), config).remediate().await.unwrap();

    assert_eq!(report.pages, 3);
    assert_eq!(report.discovered, 5);
    assert_eq!(report.counters.logged, 5);
    assert_eq!(report.counters.compliant, 2);
    assert_eq!(report.counters.remediated, 2);
    assert_eq!(report.counters.failed, 1);
    assert_eq!(report.counters.non_compliant, 0);
    assert_eq!(report.log_file.as_deref(), Some(log_path.as_path()));

    let lines = read_log(&log_path);
    assert_eq!(lines.len(), 5);
    let logged = by_key(&lines);

    for key in ["a", "b"] {
        assert_eq!(logged[key]["outcome"], "compliant");
        assert_eq!(logged[key]["remediation"], "not_attempted");
        assert_eq!(logged[key]["remediated"], false);
    }
    for key in ["c", "d"] {
        assert_eq!(logged[key]["outcome"], "remediated");
        assert_eq!(logged[key]["remediated"], true);
        assert_eq!(logged[key]["encryption"]["algorithm"], "AES256");
    }
    assert_eq!(logged["e"]["outcome"], "failed");
    assert_eq!(logged["e"]["remediated"], false);
    assert_eq!(logged["e"]["encryption"]["state"], "unknown");
    assert_eq!(logged["e"]["failure"]["stage"], "metadata");

    let mut copied = store.copied_keys();
    copied.sort();
    assert_eq!(copied, vec!["c", "d"]);
    assert_eq!(store.encryption_of(BUCKET, "c").as_deref(), Some("AES256"));
    assert_eq!(store.encryption_of(BUCKET, "e"), None);
}

#[tokio::test]
async fn test_report_mode_never_copies() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(scenario_store());
    let config = jsonl_config(&dir, 3);
    let log_path = config.log_path(RunMode::Report);

    let report = SweepRunner::new(store.clone(), config).report().await.unwrap();

    assert_eq!(report.counters.compliant, 2);
    assert_eq!(report.counters.non_compliant, 2);
    assert_eq!(report.counters.failed, 1);
    assert_eq!(report.counters.remediated, 0);
    assert_eq!(store.copy_calls(), 0);

    let logged = by_key(&read_log(&log_path));
    assert_eq!(logged["c"]["outcome"], "non_compliant");
    assert_eq!(logged["c"]["encryption"]["state"], "none");
    assert_eq!(logged["c"]["remediation"], "not_attempted");
}

#[tokio::test]
async fn test_dry_run_logs_would_remediate() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(scenario_store());
    let config = jsonl_config(&dir, 2).with_dry_run(true);
    let log_path = config.log_path(RunMode::Remediate);

    let report = SweepRunner::new(store.clone(), config).remediate().await.unwrap();

    assert!(report.dry_run);
    assert_eq!(report.counters.non_compliant, 2);
    assert_eq!(store.copy_calls(), 0);

    let logged = by_key(&read_log(&log_path));
    assert_eq!(logged["c"]["remediation"], "would_remediate");
    assert_eq!(logged["a"]["remediation"], "not_attempted");
    assert_eq!(logged["e"]["remediation"], "not_attempted");
}

#[tokio::test]
async fn test_second_run_is_a_no_op() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(
        MockStore::new()
            .with_page_size(3)
            .with_object(BUCKET, "x/1", 1, None)
            .with_object(BUCKET, "x/2", 1, Some("aws:kms"))
            .with_object(BUCKET, "x/3", 1, Some("AES256")),
    );

    let first = SweepRunner::new(store.clone(), jsonl_config(&dir, 2))
        .remediate()
        .await
        .unwrap();
    assert_eq!(first.counters.remediated, 2);
    assert_eq!(store.copy_calls(), 2);

    let second_dir = TempDir::new().unwrap();
    let second = SweepRunner::new(store.clone(), jsonl_config(&second_dir, 2))
        .remediate()
        .await
        .unwrap();
    assert_eq!(second.counters.compliant, 3);
    assert_eq!(second.counters.remediated, 0);
    assert_eq!(store.copy_calls(), 2);
}

#[tokio::test]
async fn test_listing_failure_aborts_the_run() {
    let dir = TempDir::new().unwrap();
    let mut store = MockStore::new().with_page_size(2).failing_list_call(2);
    for i in 0..10 {
        store = store.with_object(BUCKET, &format!("k{i:02}"), 1, None);
    }
    let store = Arc::new(store);
    let config = jsonl_config(&dir, 2);
    let log_path = config.log_path(RunMode::Remediate);

    let err = SweepRunner::new(store.clone(), config).remediate().await.unwrap_err();

    match err {
        SweepError::Scan { page, ref bucket, .. } => {
            assert_eq!(page, 2);
            assert_eq!(bucket, BUCKET);
        }
        other => panic!("expected scan error, got {other:?}"),
    }
    assert_eq!(store.list_calls(), 2);

    let first_page: HashSet<&str> = ["k00", "k01"].into_iter().collect();
    for line in read_log(&log_path) {
        let key = line["key"].as_str().unwrap();
        assert!(first_page.contains(key), "{key} logged after the listing failed");
    }
}

#[tokio::test]
async fn test_copy_and_verify_failures_are_isolated() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(
        MockStore::new()
            .with_object(BUCKET, "broken-copy", 1, None)
            .with_object(BUCKET, "lagging", 1, None)
            .with_object(BUCKET, "healthy", 1, None)
            .failing_copy("broken-copy")
            .stale_after_copy("lagging"),
    );
    let config = jsonl_config(&dir, 4).with_verify(3, 1);
    let log_path = config.log_path(RunMode::Remediate);

    let report = SweepRunner::new(store.clone(), config).remediate().await.unwrap();

    assert_eq!(report.counters.failed, 2);
    assert_eq!(report.counters.remediated, 1);

    let logged = by_key(&read_log(&log_path));
    assert_eq!(logged["broken-copy"]["failure"]["stage"], "copy");
    assert_eq!(logged["broken-copy"]["remediation"], "failed");
    assert_eq!(logged["lagging"]["failure"]["stage"], "verify");
    assert!(logged["lagging"]["failure"]["message"]
        .as_str()
        .unwrap()
        .contains("expected AES256 after copy, read NONE"));
    assert_eq!(logged["lagging"]["remediated"], false);
    assert_eq!(logged["healthy"]["outcome"], "remediated");

    // 3 enrichment reads, 3 verify reads for "lagging", 1 for "healthy"
    assert_eq!(store.metadata_calls(), 7);
}

#[tokio::test]
async fn test_empty_bucket_completes() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MockStore::new().with_bucket(BUCKET));
    let config = jsonl_config(&dir, 4);
    let log_path = config.log_path(RunMode::Report);

    let report = SweepRunner::new(store.clone(), config).report().await.unwrap();

    assert_eq!(report.pages, 1);
    assert_eq!(report.discovered, 0);
    assert_eq!(report.counters.logged, 0);
    assert_eq!(store.list_calls(), 1);
    assert!(read_log(&log_path).is_empty());
}

#[tokio::test]
async fn test_missing_bucket_is_a_scan_failure() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MockStore::new());

    let err = SweepRunner::new(store, jsonl_config(&dir, 1)).report().await.unwrap_err();

    assert!(matches!(err, SweepError::Scan { page: 1, .. }));
    assert_eq!(err.store_error().map(|e| e.error_code()), Some("NO_SUCH_BUCKET"));
}

#[tokio::test]
async fn test_invalid_config_fails_before_listing() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(scenario_store());
    let config = jsonl_config(&dir, 0);

    let err = SweepRunner::new(store.clone(), config).report().await.unwrap_err();

    assert!(matches!(err, SweepError::Config(_)));
    assert_eq!(store.list_calls(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_every_discovered_object_is_logged_once() {
    let keys: Vec<String> = (0..200).map(|i| format!("data/{i:04}.bin")).collect();

    for (workers, capacity) in [(1, 1), (4, 2), (64, 8)] {
        let dir = TempDir::new().unwrap();
        let mut store = MockStore::new()
            .with_page_size(17)
            .with_latency(Duration::from_millis(1))
            .failing_metadata("data/0042.bin");
        for (i, key) in keys.iter().enumerate() {
            let encryption = match i % 3 {
                0 => Some("AES256"),
                1 => None,
                _ => Some("aws:kms"),
            };
            store = store.with_object(BUCKET, key, i as u64, encryption);
        }
        let store = Arc::new(store);
        let config = jsonl_config(&dir, workers).with_queue_capacity(capacity);
        let log_path = config.log_path(RunMode::Remediate);

        let report = SweepRunner::new(store.clone(), config).remediate().await.unwrap();

        assert_eq!(report.discovered, 200, "workers={workers}");
        assert_eq!(report.counters.logged, 200, "workers={workers}");
        assert_eq!(report.counters.failed, 1, "workers={workers}");

        let lines = read_log(&log_path);
        let unique: HashSet<&str> = lines.iter().map(|v| v["key"].as_str().unwrap()).collect();
        assert_eq!(lines.len(), 200, "workers={workers}");
        assert_eq!(unique.len(), 200, "workers={workers}");
    }
}

#[tokio::test]
async fn test_run_with_in_memory_log() {
    let store = Arc::new(scenario_store());
    let (writer, _reader) = tokio::io::duplex(64 * 1024);
    let log = OutcomeLog::from_writer(writer, LogFormat::Text);

    let report = SweepRunner::new(store, SweepConfig::new(BUCKET).with_workers(2))
        .run_with_log(RunMode::Report, log)
        .await
        .unwrap();

    assert_eq!(report.counters.logged, 5);
    assert!(report.log_file.is_none());
}

#[tokio::test]
async fn test_text_log_lines() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(scenario_store());
    let config = SweepConfig::new(BUCKET)
        .with_workers(2)
        .with_log_file(dir.path().join("text.log"));
    let log_path = config.log_path(RunMode::Report);

    SweepRunner::new(store, config).report().await.unwrap();

    let content = std::fs::read_to_string(&log_path).unwrap();
    assert_eq!(content.lines().count(), 5);
    assert!(content.contains("s3://audit/a outcome=compliant encryption:AES256 size=10"));
    assert!(content.contains("s3://audit/c outcome=non_compliant encryption:NONE size=30"));
    assert!(content.contains("s3://audit/e outcome=failed encryption:????"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_log_write_failure_aborts_the_run() {
    let mut store = MockStore::new().with_page_size(100);
    for i in 0..3000 {
        store = store.with_object(BUCKET, &format!("k{i:05}"), 1, None);
    }
    let (writer, reader) = tokio::io::duplex(64);
    drop(reader);
    let log = OutcomeLog::from_writer(writer, LogFormat::Jsonl);
    let config = SweepConfig::new(BUCKET)
        .with_workers(4)
        .with_progress_interval(1)
        .with_verify(1, 0);

    let runner = SweepRunner::new(Arc::new(store), config);
    let result = tokio::time::timeout(Duration::from_secs(10), runner.run_with_log(RunMode::Remediate, log))
        .await
        .expect("run did not stop after the log write failed");

    assert!(matches!(result, Err(SweepError::Log(_))), "got {result:?}");
}

#[tokio::test]
async fn test_kms_objects_under_another_key_are_rewritten() {
    const WANTED: &str = "arn:aws:kms:eu-west-1:111122223333:key/wanted";
    const STALE: &str = "arn:aws:kms:eu-west-1:111122223333:key/stale";

    let dir = TempDir::new().unwrap();
    let store = Arc::new(
        MockStore::new()
            .with_kms_object(BUCKET, "right-key", 1, WANTED)
            .with_kms_object(BUCKET, "wrong-key", 1, STALE)
            .with_object(BUCKET, "plain", 1, None),
    );
    let mut config = jsonl_config(&dir, 2);
    config.target_algorithm = "aws:kms".into();
    config.kms_key_id = Some(WANTED.into());
    let log_path = config.log_path(RunMode::Remediate);

    let report = SweepRunner::new(store.clone(), config.clone()).remediate().await.unwrap();

    assert_eq!(report.counters.compliant, 1);
    assert_eq!(report.counters.remediated, 2);
    let mut copied = store.copied_keys();
    copied.sort();
    assert_eq!(copied, vec!["plain", "wrong-key"]);

    let logged = by_key(&read_log(&log_path));
    assert_eq!(logged["right-key"]["outcome"], "compliant");
    assert_eq!(logged["wrong-key"]["outcome"], "remediated");

    let rerun_dir = TempDir::new().unwrap();
    let rerun = SweepRunner::new(store.clone(), config.with_log_file(rerun_dir.path().join("again.log")))
        .remediate()
        .await
        .unwrap();
    assert_eq!(rerun.counters.compliant, 3);
    assert_eq!(store.copy_calls(), 2);
}
