//! 作业完成存储
//!
//! 状态机 `Uninitialized -> Initializing -> Ready`，`close` 回到 `Uninitialized`。
//! 连接池只保留一个连接，所有写入和查询都经由它串行执行。

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use jobcomp_core::{config::AppConfig, record_builder::RecordBuilder};
use jobcomp_domain::{
    jobcomp_fields, ArchiveParams, ArchiveSummary, ColumnValue, ErrorCode, IdentityService,
    JobCompStorage, JobCompletionRecord, JobRecord, JobStepSelector, HistoryParams,
    PlatformProfile, JOBCOMP_TABLE,
};
use jobcomp_errors::{JobCompError, JobCompResult};
use metrics::counter;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, error, info, instrument, warn};

use super::sqlite::{JobCompQueryBuilder, SchemaManager, SqliteArchiver, SqliteHistoryQuery};
use crate::{
    error_handling::{RepositoryErrorHelpers, RepositoryOperation},
    jobcomp_context,
};

pub const DEFAULT_DATABASE_NAME: &str = "jobcomp_db";

/// 由部署位置得到数据库名。空位置使用默认名；
/// 含路径分隔符或 `.` 的位置同样回退到默认名，只记录警告。
pub fn derive_database_name(location: &str) -> String {
    if location.is_empty() {
        return DEFAULT_DATABASE_NAME.to_string();
    }
    if location.contains(['/', '\\', '.']) {
        warn!(
            "位置 '{}' 包含路径字符，使用默认数据库名 {}",
            location, DEFAULT_DATABASE_NAME
        );
        return DEFAULT_DATABASE_NAME.to_string();
    }
    location.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreStatus {
    Uninitialized,
    Initializing,
    Ready,
}

struct ReadyState {
    pool: SqlitePool,
    database_name: String,
}

enum StoreState {
    Uninitialized,
    Initializing,
    Ready(ReadyState),
}

#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub profile: PlatformProfile,
    /// 隐式初始化时使用的位置
    pub default_location: String,
    pub data_dir: PathBuf,
    pub in_memory: bool,
    pub connection_timeout: Duration,
}

impl StoreOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            profile: config.jobcomp.platform,
            default_location: config.jobcomp.location.clone(),
            data_dir: config.database.data_dir.clone(),
            in_memory: config.database.in_memory,
            connection_timeout: Duration::from_secs(config.database.connection_timeout_seconds),
        }
    }

    pub fn in_memory(profile: PlatformProfile) -> Self {
        Self {
            profile,
            default_location: String::new(),
            data_dir: PathBuf::new(),
            in_memory: true,
            connection_timeout: Duration::from_secs(30),
        }
    }
}

pub struct JobCompStore {
    options: StoreOptions,
    builder: RecordBuilder,
    state: Mutex<StoreState>,
    last_error: AtomicI32,
}

/// 初始化中途返回（出错或被取消）时把状态退回 `Uninitialized`
struct InitGuard<'a> {
    store: &'a JobCompStore,
    armed: bool,
}

impl Drop for InitGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            *self.store.lock_state() = StoreState::Uninitialized;
        }
    }
}

impl JobCompStore {
    pub fn new(options: StoreOptions, identity: Arc<dyn IdentityService>) -> Self {
        let builder = RecordBuilder::new(options.profile, identity);
        Self {
            options,
            builder,
            state: Mutex::new(StoreState::Uninitialized),
            last_error: AtomicI32::new(ErrorCode::SUCCESS.value()),
        }
    }

    pub fn from_config(config: &AppConfig, identity: Arc<dyn IdentityService>) -> Self {
        Self::new(StoreOptions::from_config(config), identity)
    }

    pub fn profile(&self) -> PlatformProfile {
        self.options.profile
    }

    pub fn status(&self) -> StoreStatus {
        match &*self.lock_state() {
            StoreState::Uninitialized => StoreStatus::Uninitialized,
            StoreState::Initializing => StoreStatus::Initializing,
            StoreState::Ready(_) => StoreStatus::Ready,
        }
    }

    pub fn database_name(&self) -> Option<String> {
        match &*self.lock_state() {
            StoreState::Ready(ready) => Some(ready.database_name.clone()),
            _ => None,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_pool(&self) -> Option<SqlitePool> {
        match &*self.lock_state() {
            StoreState::Ready(ready) => Some(ready.pool.clone()),
            _ => None,
        }
    }

    fn record_outcome<T>(&self, result: &JobCompResult<T>) {
        let code = match result {
            Ok(_) => ErrorCode::SUCCESS,
            Err(e) => e.code(),
        };
        self.last_error.store(code.value(), Ordering::SeqCst);
    }

    async fn try_init(&self, location: &str) -> JobCompResult<()> {
        {
            let mut state = self.lock_state();
            if !matches!(*state, StoreState::Uninitialized) {
                return Err(JobCompError::AlreadyInitialized);
            }
            *state = StoreState::Initializing;
        }
        let mut guard = InitGuard {
            store: self,
            armed: true,
        };

        let database_name = derive_database_name(location);
        let pool = self.connect(&database_name).await?;

        let fields = jobcomp_fields(self.options.profile);
        if let Err(e) = SchemaManager::ensure_table(&pool, JOBCOMP_TABLE, &fields).await {
            pool.close().await;
            return Err(e);
        }

        *self.lock_state() = StoreState::Ready(ReadyState {
            pool,
            database_name: database_name.clone(),
        });
        guard.armed = false;

        info!(
            database = %database_name,
            profile = ?self.options.profile,
            "作业完成存储初始化完成"
        );
        Ok(())
    }

    async fn connect(&self, database_name: &str) -> JobCompResult<SqlitePool> {
        let context = jobcomp_context!(RepositoryOperation::Connect, database = database_name);

        let connect_options = if self.options.in_memory {
            SqliteConnectOptions::from_str("sqlite::memory:")?
        } else {
            tokio::fs::create_dir_all(&self.options.data_dir)
                .await
                .map_err(|e| {
                    JobCompError::connection_failure(format!(
                        "创建数据目录 {} 失败: {}",
                        self.options.data_dir.display(),
                        e
                    ))
                })?;
            SqliteConnectOptions::new()
                .filename(self.options.data_dir.join(format!("{database_name}.db")))
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
        };

        debug!(in_memory = self.options.in_memory, "打开数据库 {}", database_name);

        // 单连接：连接不回收，内存库的数据随连接存活
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .acquire_timeout(self.options.connection_timeout)
            .connect_with(connect_options)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(context, e))
    }

    /// 未就绪时以默认位置隐式初始化。其他调用方正在初始化时返回 `AlreadyInitialized`，由调用方重试。
    async fn ready_pool(&self) -> JobCompResult<SqlitePool> {
        if let Some(pool) = self.current_pool() {
            return Ok(pool);
        }
        match self.try_init(&self.options.default_location).await {
            Ok(()) | Err(JobCompError::AlreadyInitialized) => {}
            Err(e) => return Err(e),
        }
        self.current_pool().ok_or(JobCompError::AlreadyInitialized)
    }

    async fn insert_record(&self, record: &JobCompletionRecord) -> JobCompResult<()> {
        if record.profile() != self.options.profile {
            return Err(JobCompError::persist_failure(format!(
                "记录的平台类型 {:?} 与存储的平台类型 {:?} 不一致",
                record.profile(),
                self.options.profile
            )));
        }

        let pool = self.ready_pool().await?;
        let fields = jobcomp_fields(self.options.profile);
        let values = fields
            .iter()
            .map(|field| {
                record.column_value(field.name).ok_or_else(|| {
                    JobCompError::persist_failure(format!("列 {} 没有对应的取值", field.name))
                })
            })
            .collect::<JobCompResult<Vec<ColumnValue>>>()?;

        let context = jobcomp_context!(
            RepositoryOperation::Create,
            job_id = record.job_id,
            job_name = record.name
        );
        let sql = JobCompQueryBuilder::build_insert(JOBCOMP_TABLE, &fields);
        JobCompQueryBuilder::bind_values(sqlx::query(&sql), &values)
            .execute(&pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(context.clone(), e))?;

        RepositoryErrorHelpers::log_operation_success(&context, Some(&record.final_state.to_string()));
        Ok(())
    }
}

#[async_trait]
impl JobCompStorage for JobCompStore {
    #[instrument(skip(self))]
    async fn init(&self, location: &str) -> JobCompResult<()> {
        let result = self.try_init(location).await;
        if let Err(e) = &result {
            warn!(error = %e, "作业完成存储初始化失败");
        }
        self.record_outcome(&result);
        result
    }

    #[instrument(skip(self, record), fields(job_id = record.job_id))]
    async fn persist(&self, record: &JobCompletionRecord) -> JobCompResult<()> {
        let result = self.insert_record(record).await;
        match &result {
            Ok(()) => counter!("jobcomp_records_persisted_total").increment(1),
            Err(e) => {
                counter!("jobcomp_persist_errors_total").increment(1);
                error!(error = %e, "写入{}失败", record.entity_description());
            }
        }
        self.record_outcome(&result);
        result
    }

    async fn log_job(&self, job: &JobRecord) -> JobCompResult<()> {
        let record = self.builder.build(job);
        self.persist(&record).await
    }

    async fn query(
        &self,
        jobs: &[JobStepSelector],
        partitions: &[String],
        params: &HistoryParams,
    ) -> Vec<JobCompletionRecord> {
        let result = match self.ready_pool().await {
            Ok(pool) => {
                SqliteHistoryQuery::new(pool, self.options.profile)
                    .fetch(jobs, partitions, params)
                    .await
            }
            Err(e) => Err(e),
        };
        self.record_outcome(&result);
        result.unwrap_or_else(|e| {
            error!(error = %e, "查询作业完成记录失败");
            Vec::new()
        })
    }

    async fn archive(&self, partitions: &[String], params: &ArchiveParams) -> ArchiveSummary {
        let result = match self.ready_pool().await {
            Ok(pool) => {
                SqliteArchiver::new(pool, self.options.profile)
                    .archive(partitions, params)
                    .await
            }
            Err(e) => Err(e),
        };
        self.record_outcome(&result);
        match result {
            Ok(summary) => {
                counter!("jobcomp_records_archived_total").increment(summary.deleted);
                summary
            }
            Err(e) => {
                error!(error = %e, "归档作业完成记录失败");
                ArchiveSummary::default()
            }
        }
    }

    async fn close(&self) {
        let ready = {
            let mut state = self.lock_state();
            if matches!(*state, StoreState::Ready(_)) {
                match std::mem::replace(&mut *state, StoreState::Uninitialized) {
                    StoreState::Ready(ready) => Some(ready),
                    _ => None,
                }
            } else {
                None
            }
        };

        if let Some(ready) = ready {
            ready.pool.close().await;
            info!(database = %ready.database_name, "作业完成存储已关闭");
        }
        self.last_error
            .store(ErrorCode::SUCCESS.value(), Ordering::SeqCst);
    }

    fn last_error(&self) -> ErrorCode {
        ErrorCode(self.last_error.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_database_name() {
        assert_eq!(derive_database_name(""), DEFAULT_DATABASE_NAME);
        assert_eq!(derive_database_name("cluster_a"), "cluster_a");
        assert_eq!(derive_database_name("../etc/passwd"), DEFAULT_DATABASE_NAME);
        assert_eq!(derive_database_name("a\\b"), DEFAULT_DATABASE_NAME);
        assert_eq!(derive_database_name("db.sqlite"), DEFAULT_DATABASE_NAME);
    }

    #[test]
    fn test_options_from_config() {
        let mut config = AppConfig::default();
        config.jobcomp.location = "site".to_string();
        config.jobcomp.platform = PlatformProfile::Topology;
        config.database.connection_timeout_seconds = 5;

        let options = StoreOptions::from_config(&config);
        assert_eq!(options.default_location, "site");
        assert_eq!(options.profile, PlatformProfile::Topology);
        assert_eq!(options.connection_timeout, Duration::from_secs(5));
        assert!(!options.in_memory);
    }
}
