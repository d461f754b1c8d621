use std::ffi::OsString;
use std::path::{Path, PathBuf};

use jobcomp_domain::{
    jobcomp_fields, ArchiveParams, ArchiveSummary, JobCompletionRecord, PlatformProfile,
    JOBCOMP_TABLE,
};
use jobcomp_errors::{JobCompError, JobCompResult};
use sqlx::SqlitePool;
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument, warn};

use super::query_builder::JobCompQueryBuilder;
use crate::{
    database::mapping::MappingHelpers,
    error_handling::{RepositoryErrorHelpers, RepositoryOperation},
    jobcomp_context,
};

/// 把过期的作业完成记录导出后从表中移除
pub struct SqliteArchiver {
    pool: SqlitePool,
    profile: PlatformProfile,
}

impl SqliteArchiver {
    pub fn new(pool: SqlitePool, profile: PlatformProfile) -> Self {
        Self { pool, profile }
    }

    /// 导出内容先写入同目录的 `.partial` 暂存文件，删除提交后才追加到导出文件。
    /// 暂存或删除失败时不会删除任何记录，导出文件也不会改变
    #[instrument(skip_all, fields(cutoff = params.cutoff, partitions = partitions.len()))]
    pub async fn archive(
        &self,
        partitions: &[String],
        params: &ArchiveParams,
    ) -> JobCompResult<ArchiveSummary> {
        let export_ctx = jobcomp_context!(RepositoryOperation::Export, table = JOBCOMP_TABLE);
        let delete_ctx = jobcomp_context!(RepositoryOperation::Delete, table = JOBCOMP_TABLE);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(export_ctx.clone(), e))?;

        let mut summary = ArchiveSummary::default();
        let mut staged = None;

        if let Some(path) = &params.export_path {
            let fields = jobcomp_fields(self.profile);
            let (sql, values) = JobCompQueryBuilder::build_archive_select(
                JOBCOMP_TABLE,
                &fields,
                partitions,
                params.cutoff,
            );
            let rows = JobCompQueryBuilder::bind_values(sqlx::query(&sql), &values)
                .fetch_all(&mut *tx)
                .await
                .map_err(|e| RepositoryErrorHelpers::database_error(export_ctx.clone(), e))?;

            let records = rows
                .iter()
                .map(|row| MappingHelpers::row_to_record(row, self.profile))
                .collect::<JobCompResult<Vec<_>>>()
                .map_err(|e| RepositoryErrorHelpers::decode_error(export_ctx.clone(), e))?;

            let staging = Self::staging_path(path);
            Self::stage_records(&staging, &records).await?;
            summary.exported = records.len() as u64;
            staged = Some((path.as_path(), staging));
        }

        let deleted = async {
            let (sql, values) =
                JobCompQueryBuilder::build_archive_delete(JOBCOMP_TABLE, partitions, params.cutoff);
            let result = JobCompQueryBuilder::bind_values(sqlx::query(&sql), &values)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            Ok::<_, sqlx::Error>(result.rows_affected())
        }
        .await;

        summary.deleted = match deleted {
            Ok(count) => count,
            Err(e) => {
                if let Some((_, staging)) = &staged {
                    if let Err(io) = tokio::fs::remove_file(staging).await {
                        warn!("清理暂存文件 {} 失败: {}", staging.display(), io);
                    }
                }
                return Err(RepositoryErrorHelpers::database_error(delete_ctx, e));
            }
        };

        if let Some((path, staging)) = &staged {
            Self::publish_staged(staging, path).await?;
        }

        info!(
            "归档完成: 导出 {} 条，删除 {} 条",
            summary.exported, summary.deleted
        );
        Ok(summary)
    }

    fn staging_path(path: &Path) -> PathBuf {
        let mut name = path.file_name().map(OsString::from).unwrap_or_default();
        name.push(".partial");
        path.with_file_name(name)
    }

    /// 以 JSON Lines 写入暂存文件，覆盖上次遗留的内容
    async fn stage_records(staging: &Path, records: &[JobCompletionRecord]) -> JobCompResult<()> {
        let mut buffer = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buffer, record)?;
            buffer.push(b'\n');
        }

        let mut file = tokio::fs::File::create(staging).await.map_err(|e| {
            JobCompError::archive_failure(format!(
                "创建暂存文件 {} 失败: {}",
                staging.display(),
                e
            ))
        })?;
        let written = async {
            file.write_all(&buffer).await?;
            file.sync_all().await
        }
        .await;
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(staging).await;
            return Err(JobCompError::archive_failure(format!(
                "写入暂存文件 {} 失败: {}",
                staging.display(),
                e
            )));
        }
        Ok(())
    }

    /// 追加到导出文件（不存在时创建）后删除暂存文件。
    /// 追加失败时暂存文件保留，其中是已删除记录的完整导出
    async fn publish_staged(staging: &Path, path: &Path) -> JobCompResult<()> {
        let appended = async {
            let buffer = tokio::fs::read(staging).await?;
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await?;
            file.write_all(&buffer).await?;
            file.flush().await
        }
        .await;

        if let Err(e) = appended {
            return Err(JobCompError::archive_failure(format!(
                "记录已删除，但追加到导出文件 {} 失败: {}，导出内容保留在 {}",
                path.display(),
                e,
                staging.display()
            )));
        }

        if let Err(e) = tokio::fs::remove_file(staging).await {
            warn!("清理暂存文件 {} 失败: {}", staging.display(), e);
        }
        Ok(())
    }
}
