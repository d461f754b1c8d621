use jobcomp_domain::{
    jobcomp_fields, HistoryParams, JobCompletionRecord, JobStepSelector, PlatformProfile,
    JOBCOMP_TABLE,
};
use jobcomp_errors::JobCompResult;
use sqlx::SqlitePool;
use tracing::{debug, instrument};

use super::query_builder::JobCompQueryBuilder;
use crate::{
    database::mapping::MappingHelpers,
    error_handling::{RepositoryErrorHelpers, RepositoryOperation},
    jobcomp_context,
};

/// 按作业、分区和时间窗口读取已持久化的作业完成记录
pub struct SqliteHistoryQuery {
    pool: SqlitePool,
    profile: PlatformProfile,
}

impl SqliteHistoryQuery {
    pub fn new(pool: SqlitePool, profile: PlatformProfile) -> Self {
        Self { pool, profile }
    }

    /// 结果按结束时间升序；空的作业/分区列表表示不过滤
    #[instrument(skip_all, fields(
        jobs = jobs.len(),
        partitions = partitions.len(),
    ))]
    pub async fn fetch(
        &self,
        jobs: &[JobStepSelector],
        partitions: &[String],
        params: &HistoryParams,
    ) -> JobCompResult<Vec<JobCompletionRecord>> {
        let context = jobcomp_context!(RepositoryOperation::Query, table = JOBCOMP_TABLE);
        let fields = jobcomp_fields(self.profile);
        let (sql, values) =
            JobCompQueryBuilder::build_select(JOBCOMP_TABLE, &fields, jobs, partitions, params);

        let rows = JobCompQueryBuilder::bind_values(sqlx::query(&sql), &values)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(context.clone(), e))?;

        let records = rows
            .iter()
            .map(|row| MappingHelpers::row_to_record(row, self.profile))
            .collect::<JobCompResult<Vec<_>>>()
            .map_err(|e| RepositoryErrorHelpers::decode_error(context, e))?;

        debug!("查询到 {} 条作业完成记录", records.len());
        Ok(records)
    }
}
