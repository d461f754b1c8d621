use std::path::{Path, PathBuf};
use std::sync::Arc;

use jobcomp_domain::{
    ArchiveParams, ArchiveSummary, ConnectionType, ErrorCode, HistoryParams, JobCompStorage, JobState,
    JobStepSelector, PlatformProfile, TimeLimit, TopologyInfo,
};
use jobcomp_errors::JobCompError;
use jobcomp_infrastructure::{JobCompStore, StoreOptions, StoreStatus, DEFAULT_DATABASE_NAME};
use jobcomp_testing_utils::{JobRecordBuilder, MockIdentityService, TestEnv};

/// 测试存储设置辅助函数
fn memory_store(profile: PlatformProfile) -> JobCompStore {
    TestEnv::init_tracing();
    let identity = Arc::new(
        MockIdentityService::new()
            .with_user(1000, "alice")
            .with_user(1001, "bob")
            .with_group(100, "users"),
    );
    JobCompStore::new(StoreOptions::in_memory(profile), identity)
}

fn disk_store(data_dir: &Path) -> JobCompStore {
    TestEnv::init_tracing();
    let mut options = StoreOptions::in_memory(PlatformProfile::Base);
    options.in_memory = false;
    options.data_dir = data_dir.to_path_buf();
    JobCompStore::new(options, Arc::new(MockIdentityService::new()))
}

/// 旁路连接，直接改动存储背后的数据库文件
async fn side_channel(db_file: PathBuf) -> sqlx::SqlitePool {
    sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(
            sqlx::sqlite::SqliteConnectOptions::new()
                .filename(db_file)
                .create_if_missing(true),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn test_init_twice_is_rejected() {
    let store = memory_store(PlatformProfile::Base);

    store.init("cluster_a").await.unwrap();
    let err = store.init("cluster_a").await.unwrap_err();

    assert!(matches!(err, JobCompError::AlreadyInitialized));
    assert_eq!(store.last_error(), ErrorCode::ALREADY_INITIALIZED);
    // 第二次失败不影响已就绪的连接
    assert_eq!(store.status(), StoreStatus::Ready);
    assert_eq!(store.database_name().as_deref(), Some("cluster_a"));
}

#[tokio::test]
async fn test_location_falls_back_to_default_name() {
    let store = memory_store(PlatformProfile::Base);
    store.init("").await.unwrap();
    assert_eq!(store.database_name().as_deref(), Some(DEFAULT_DATABASE_NAME));
    store.close().await;

    store.init("../etc/passwd").await.unwrap();
    assert_eq!(store.database_name().as_deref(), Some(DEFAULT_DATABASE_NAME));
}

#[tokio::test]
async fn test_completed_job_end_to_end() {
    let store = memory_store(PlatformProfile::Base);
    store.init("").await.unwrap();

    let job = JobRecordBuilder::new()
        .with_job_id(42)
        .with_user(1000, 100)
        .with_state(JobState::FAILED.with_completing())
        .with_time_limit(TimeLimit::INFINITE)
        .with_nodes("node[1-4]", 4)
        .build();
    store.log_job(&job).await.unwrap();
    assert_eq!(store.last_error(), ErrorCode::SUCCESS);

    let records = store
        .query(&[JobStepSelector::job(42)], &[], &HistoryParams::default())
        .await;
    assert_eq!(records.len(), 1);

    let record = &records[0];
    assert_eq!(record.user_name, "alice");
    assert_eq!(record.group_name, "users");
    assert_eq!(record.final_state, JobState::FAILED);
    assert_eq!(record.final_state.name(), "FAILED");
    assert_eq!(record.time_limit, TimeLimit::Unlimited);
    assert_eq!(record.time_limit.to_string(), "UNLIMITED");
    assert_eq!(record.node_list, "node[1-4]");
    assert_eq!(record.node_count, 4);
}

#[tokio::test]
async fn test_quotes_in_values_are_stored_verbatim() {
    let store = memory_store(PlatformProfile::Base);
    store.init("").await.unwrap();

    let hostile = "x'); DROP TABLE jobcomp_table; --";
    let job = JobRecordBuilder::new()
        .with_job_id(7)
        .with_name(hostile)
        .with_partition("it's")
        .build();
    store.log_job(&job).await.unwrap();

    let records = store
        .query(&[], &["it's".to_string()], &HistoryParams::default())
        .await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, hostile);
    assert_eq!(store.last_error(), ErrorCode::SUCCESS);
}

#[tokio::test]
async fn test_concurrent_init_admits_single_winner() {
    let store = memory_store(PlatformProfile::Base);

    let (first, second) = tokio::join!(store.init("a"), store.init("b"));

    let successes = [first.is_ok(), second.is_ok()]
        .iter()
        .filter(|ok| **ok)
        .count();
    assert_eq!(successes, 1);
    assert!(matches!(
        first.err().or(second.err()),
        Some(JobCompError::AlreadyInitialized)
    ));
    assert_eq!(store.status(), StoreStatus::Ready);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_init_across_threads_admits_single_winner() {
    let store = Arc::new(memory_store(PlatformProfile::Base));

    for round in 0..8 {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.init(&format!("race_{i}")).await })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => successes += 1,
                Err(e) => assert!(matches!(e, JobCompError::AlreadyInitialized), "{e}"),
            }
        }
        assert_eq!(successes, 1, "round {round}");
        assert_eq!(store.status(), StoreStatus::Ready);

        store.close().await;
        assert_eq!(store.status(), StoreStatus::Uninitialized);
    }
}

#[tokio::test]
async fn test_incompatible_table_fails_init_and_resets_state() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("jobcomp");
    std::fs::create_dir_all(&data_dir).unwrap();

    let side = side_channel(data_dir.join("site.db")).await;
    sqlx::query("CREATE TABLE jobcomp_table (jobid INTEGER)")
        .execute(&side)
        .await
        .unwrap();
    side.close().await;

    let store = disk_store(&data_dir);
    let err = store.init("site").await.unwrap_err();
    assert!(matches!(err, JobCompError::Schema { .. }), "{err}");
    assert_eq!(store.status(), StoreStatus::Uninitialized);
    assert_eq!(store.last_error(), ErrorCode::SCHEMA_ERROR);
    assert_eq!(store.database_name(), None);

    // 状态已复位，换一个位置可以重新初始化
    store.init("other").await.unwrap();
    assert_eq!(store.status(), StoreStatus::Ready);
}

#[tokio::test]
async fn test_unopenable_backend_is_connection_failure() {
    let blocker = tempfile::NamedTempFile::new().unwrap();
    // 数据目录位于普通文件之下，无法创建
    let store = disk_store(&blocker.path().join("sub"));

    let err = store.init("site").await.unwrap_err();
    assert!(matches!(err, JobCompError::ConnectionFailure(_)), "{err}");
    assert_eq!(store.status(), StoreStatus::Uninitialized);
    assert_eq!(store.last_error(), ErrorCode::CONNECTION_FAILURE);

    // 隐式初始化同样失败，查询返回空结果
    assert!(store.query(&[], &[], &HistoryParams::default()).await.is_empty());
    assert_eq!(store.last_error(), ErrorCode::CONNECTION_FAILURE);
    assert_eq!(store.status(), StoreStatus::Uninitialized);
}

#[tokio::test]
async fn test_backend_failures_yield_empty_results_with_error_codes() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("jobcomp");
    let store = disk_store(&data_dir);
    store.init("site").await.unwrap();
    store
        .log_job(&JobRecordBuilder::new().with_job_id(1).with_times(10, 20).build())
        .await
        .unwrap();

    let side = side_channel(data_dir.join("site.db")).await;
    sqlx::query("DROP TABLE jobcomp_table")
        .execute(&side)
        .await
        .unwrap();
    side.close().await;

    let records = store.query(&[], &[], &HistoryParams::default()).await;
    assert!(records.is_empty());
    assert_eq!(store.last_error(), ErrorCode::QUERY_FAILURE);

    let summary = store.archive(&[], &ArchiveParams::before(1_000)).await;
    assert_eq!(summary, ArchiveSummary::default());
    assert_eq!(store.last_error(), ErrorCode::ARCHIVE_FAILURE);

    assert_eq!(store.status(), StoreStatus::Ready);
}

#[tokio::test]
async fn test_undecodable_row_is_query_failure() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("jobcomp");
    let store = disk_store(&data_dir);
    store.init("site").await.unwrap();
    store
        .log_job(&JobRecordBuilder::new().with_job_id(1).build())
        .await
        .unwrap();

    let side = side_channel(data_dir.join("site.db")).await;
    sqlx::query(
        "INSERT INTO jobcomp_table (jobid, uid, user_name, gid, group_name, name, state, partition, timelimit, nodecnt) \
         VALUES (2, -1, 'ghost', 0, 'root', 'x', 3, 'debug', '5', 1)",
    )
    .execute(&side)
    .await
    .unwrap();
    side.close().await;

    let records = store.query(&[], &[], &HistoryParams::default()).await;
    assert!(records.is_empty());
    assert_eq!(store.last_error(), ErrorCode::QUERY_FAILURE);

    // 过滤掉坏行后查询恢复正常
    let records = store
        .query(&[JobStepSelector::job(1)], &[], &HistoryParams::default())
        .await;
    assert_eq!(records.len(), 1);
    assert_eq!(store.last_error(), ErrorCode::SUCCESS);
}

#[tokio::test]
async fn test_in_memory_stores_do_not_share_data() {
    let first = memory_store(PlatformProfile::Base);
    let second = memory_store(PlatformProfile::Base);
    first.init("shared").await.unwrap();
    second.init("shared").await.unwrap();

    first
        .log_job(&JobRecordBuilder::new().with_job_id(5).build())
        .await
        .unwrap();
    assert_eq!(first.query(&[], &[], &HistoryParams::default()).await.len(), 1);
    assert!(second.query(&[], &[], &HistoryParams::default()).await.is_empty());

    // 关闭后内存库随连接释放
    first.close().await;
    first.init("shared").await.unwrap();
    assert!(first.query(&[], &[], &HistoryParams::default()).await.is_empty());
}

#[tokio::test]
async fn test_close_is_idempotent_and_allows_reinit() {
    let store = memory_store(PlatformProfile::Base);

    // 未初始化时关闭是空操作
    store.close().await;
    assert_eq!(store.status(), StoreStatus::Uninitialized);

    store.init("first").await.unwrap();
    store.close().await;
    store.close().await;
    assert_eq!(store.status(), StoreStatus::Uninitialized);
    assert!(store.database_name().is_none());

    store.init("second").await.unwrap();
    assert_eq!(store.database_name().as_deref(), Some("second"));
}

#[tokio::test]
async fn test_persist_initializes_implicitly() {
    let store = memory_store(PlatformProfile::Base);
    assert_eq!(store.status(), StoreStatus::Uninitialized);

    store
        .log_job(&JobRecordBuilder::new().with_job_id(5).build())
        .await
        .unwrap();

    assert_eq!(store.status(), StoreStatus::Ready);
    assert_eq!(store.database_name().as_deref(), Some(DEFAULT_DATABASE_NAME));
    let records = store.query(&[], &[], &HistoryParams::default()).await;
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn test_query_filters() {
    let store = memory_store(PlatformProfile::Base);
    store.init("").await.unwrap();

    let jobs = [
        (1, 1000, "debug", 100, 200),
        (2, 1000, "batch", 150, 300),
        (3, 1001, "batch", 250, 400),
        (4, 1001, "debug", 350, 500),
    ];
    for (id, uid, partition, start, end) in jobs {
        let job = JobRecordBuilder::new()
            .with_job_id(id)
            .with_user(uid, 100)
            .with_partition(partition)
            .with_times(start, end)
            .build();
        store.log_job(&job).await.unwrap();
    }

    let ids = |records: Vec<jobcomp_domain::JobCompletionRecord>| {
        records.iter().map(|r| r.job_id).collect::<Vec<_>>()
    };

    let all = store.query(&[], &[], &HistoryParams::default()).await;
    assert_eq!(ids(all), vec![1, 2, 3, 4]);

    let batch = store
        .query(&[], &["batch".to_string()], &HistoryParams::default())
        .await;
    assert_eq!(ids(batch), vec![2, 3]);

    let window = HistoryParams {
        since: Some(300),
        until: Some(300),
        ..Default::default()
    };
    assert_eq!(ids(store.query(&[], &[], &window).await), vec![2, 3]);

    let bob = HistoryParams {
        user_id: Some(1001),
        limit: Some(1),
        ..Default::default()
    };
    let records = store.query(&[], &[], &bob).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].user_name, "bob");

    let selected = store
        .query(
            &[
                "1".parse::<JobStepSelector>().unwrap(),
                "4.2".parse::<JobStepSelector>().unwrap(),
            ],
            &[],
            &HistoryParams::default(),
        )
        .await;
    assert_eq!(ids(selected), vec![1, 4]);
}

#[tokio::test]
async fn test_archive_exports_then_deletes() {
    let store = memory_store(PlatformProfile::Base);
    store.init("").await.unwrap();

    for (id, partition, end) in [(1, "debug", 100), (2, "batch", 200), (3, "debug", 5_000)] {
        let job = JobRecordBuilder::new()
            .with_job_id(id)
            .with_partition(partition)
            .with_times(50, end)
            .build();
        store.log_job(&job).await.unwrap();
    }
    // 未结束的作业不会被归档
    store
        .log_job(&JobRecordBuilder::new().with_job_id(4).with_times(0, 0).build())
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let export = dir.path().join("archive.jsonl");

    let summary = store
        .archive(&[], &ArchiveParams::before(1_000).export_to(&export))
        .await;
    assert_eq!(summary.exported, 2);
    assert_eq!(summary.deleted, 2);
    assert_eq!(store.last_error(), ErrorCode::SUCCESS);

    let contents = std::fs::read_to_string(&export).unwrap();
    let lines: Vec<_> = contents.lines().collect();
    assert_eq!(lines.len(), 2);
    let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(first["job_id"], 1);

    let remaining: Vec<_> = store
        .query(&[], &[], &HistoryParams::default())
        .await
        .iter()
        .map(|r| r.job_id)
        .collect();
    assert_eq!(remaining, vec![4, 3]);
    assert!(!dir.path().join("archive.jsonl.partial").exists());
}

#[tokio::test]
async fn test_failed_export_deletes_nothing() {
    let store = memory_store(PlatformProfile::Base);
    store.init("").await.unwrap();
    for id in [1, 2] {
        store
            .log_job(&JobRecordBuilder::new().with_job_id(id).with_times(10, 20).build())
            .await
            .unwrap();
    }

    let dir = tempfile::tempdir().unwrap();
    let export = dir.path().join("missing").join("archive.jsonl");

    let summary = store
        .archive(&[], &ArchiveParams::before(1_000).export_to(&export))
        .await;
    assert_eq!(summary, ArchiveSummary::default());
    assert_eq!(store.last_error(), ErrorCode::ARCHIVE_FAILURE);
    assert!(!export.exists());

    let remaining = store.query(&[], &[], &HistoryParams::default()).await;
    assert_eq!(remaining.len(), 2);
}

#[tokio::test]
async fn test_repeated_exports_append_once_per_run() {
    let store = memory_store(PlatformProfile::Base);
    store.init("").await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let export = dir.path().join("archive.jsonl");

    for id in [1, 2] {
        store
            .log_job(&JobRecordBuilder::new().with_job_id(id).with_times(10, 20).build())
            .await
            .unwrap();
        let summary = store
            .archive(&[], &ArchiveParams::before(1_000).export_to(&export))
            .await;
        assert_eq!(summary.exported, 1);
        assert_eq!(summary.deleted, 1);
    }

    let contents = std::fs::read_to_string(&export).unwrap();
    let ids: Vec<u64> = contents
        .lines()
        .map(|line| {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            value["job_id"].as_u64().unwrap()
        })
        .collect();
    assert_eq!(ids, vec![1, 2]);
    assert!(!dir.path().join("archive.jsonl.partial").exists());
}

#[tokio::test]
async fn test_archive_respects_partition_filter() {
    let store = memory_store(PlatformProfile::Base);
    store.init("").await.unwrap();

    for (id, partition) in [(1, "debug"), (2, "batch")] {
        let job = JobRecordBuilder::new()
            .with_job_id(id)
            .with_partition(partition)
            .with_times(10, 20)
            .build();
        store.log_job(&job).await.unwrap();
    }

    let summary = store
        .archive(&["batch".to_string()], &ArchiveParams::before(1_000))
        .await;
    assert_eq!(summary.exported, 0);
    assert_eq!(summary.deleted, 1);

    let remaining = store.query(&[], &[], &HistoryParams::default()).await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].partition, "debug");
}

#[tokio::test]
async fn test_topology_profile_round_trip() {
    let store = memory_store(PlatformProfile::Topology);
    store.init("").await.unwrap();

    let job = JobRecordBuilder::new()
        .with_job_id(9)
        .with_topology(TopologyInfo {
            connection_type: ConnectionType::Torus,
            reboot: true,
            rotate: false,
            max_procs: Some(512),
            geometry: Some([4, 4, 2]),
            start: None,
            block_id: Some("RMP42".to_string()),
        })
        .build();
    store.log_job(&job).await.unwrap();

    let records = store.query(&[], &[], &HistoryParams::default()).await;
    let topo = records[0].platform.topology().expect("topology fields");
    assert_eq!(topo.connection, "TORUS");
    assert_eq!(topo.reboot, "yes");
    assert_eq!(topo.max_procs, "512");
    assert_eq!(topo.geometry, "4x4x2");
    assert_eq!(topo.start, "None");
    assert_eq!(topo.block_id, "RMP42");
}

#[tokio::test]
async fn test_profile_mismatch_sets_last_error() {
    let base = memory_store(PlatformProfile::Base);
    let topology = memory_store(PlatformProfile::Topology);
    topology.init("").await.unwrap();
    base.init("").await.unwrap();

    let job = JobRecordBuilder::new().build();
    topology.log_job(&job).await.unwrap();
    let record = topology
        .query(&[], &[], &HistoryParams::default())
        .await
        .remove(0);

    let err = base.persist(&record).await.unwrap_err();
    assert!(matches!(err, JobCompError::PersistFailure(_)));
    assert_eq!(base.last_error(), ErrorCode::PERSIST_FAILURE);
    assert_eq!(
        base.describe(base.last_error()),
        jobcomp_domain::describe(ErrorCode::PERSIST_FAILURE)
    );
    assert!(!base.describe(base.last_error()).starts_with("未知错误"));
}

#[tokio::test]
async fn test_on_disk_database_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let location = TestEnv::unique_name("disk");

    let mut options = StoreOptions::in_memory(PlatformProfile::Base);
    options.in_memory = false;
    options.data_dir = dir.path().join("jobcomp");

    let store = JobCompStore::new(options, Arc::new(MockIdentityService::new()));
    store.init(&location).await.unwrap();
    store
        .log_job(&JobRecordBuilder::new().with_job_id(11).build())
        .await
        .unwrap();
    store.close().await;

    assert!(dir
        .path()
        .join("jobcomp")
        .join(format!("{location}.db"))
        .exists());

    store.init(&location).await.unwrap();
    let records = store.query(&[], &[], &HistoryParams::default()).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].user_name, "Unknown");
}

#[test]
fn test_describe_known_and_unknown_codes() {
    let store = memory_store(PlatformProfile::Base);
    assert_eq!(store.describe(ErrorCode::SUCCESS), jobcomp_domain::describe(ErrorCode::SUCCESS));
    assert!(store.describe(ErrorCode(123_456)).contains("123456"));
}
