use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use jobcomp_core::{config::AppConfig, identity::SystemIdentityService};
use jobcomp_domain::{
    describe, ArchiveParams, ArchiveSummary, HistoryParams, JobCompStorage, JobCompletionRecord,
    JobRecord, JobStepSelector,
};
use jobcomp_infrastructure::JobCompStore;
use serde::Deserialize;
use tracing::{info, warn};

/// `log` 命令的输入：单个作业对象或作业数组
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JobInput {
    Many(Vec<JobRecord>),
    One(Box<JobRecord>),
}

/// 历史查询条件
#[derive(Debug, Default)]
pub struct QueryRequest {
    pub jobs: Vec<JobStepSelector>,
    pub partitions: Vec<String>,
    pub params: HistoryParams,
}

/// 归档请求，未指定的项取配置中的值
#[derive(Debug, Default)]
pub struct ArchiveRequest {
    pub partitions: Vec<String>,
    pub retention_days: Option<u32>,
    pub export: Option<PathBuf>,
}

pub struct Application {
    config: AppConfig,
    store: JobCompStore,
}

impl Application {
    pub fn new(config: AppConfig) -> Self {
        let store = JobCompStore::from_config(&config, Arc::new(SystemIdentityService));
        Self { config, store }
    }

    pub async fn open(&self) -> Result<()> {
        self.store
            .init(&self.config.jobcomp.location)
            .await
            .context("初始化作业完成存储失败")?;
        info!(
            database = ?self.store.database_name(),
            profile = ?self.store.profile(),
            "作业完成存储已打开"
        );
        Ok(())
    }

    pub async fn shutdown(&self) {
        self.store.close().await;
    }

    /// 读取 JSON 文件中的作业并逐个写入，返回写入条数
    pub async fn log_jobs(&self, path: &Path) -> Result<usize> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("读取作业文件失败: {}", path.display()))?;
        let jobs = match serde_json::from_str::<JobInput>(&content)
            .with_context(|| format!("解析作业文件失败: {}", path.display()))?
        {
            JobInput::Many(jobs) => jobs,
            JobInput::One(job) => vec![*job],
        };

        for job in &jobs {
            self.store
                .log_job(job)
                .await
                .with_context(|| format!("写入作业 {} 失败", job.job_id))?;
        }
        info!("已写入 {} 条作业完成记录", jobs.len());
        Ok(jobs.len())
    }

    pub async fn query(&self, request: &QueryRequest) -> Result<Vec<JobCompletionRecord>> {
        let records = self
            .store
            .query(&request.jobs, &request.partitions, &request.params)
            .await;
        self.check_last_error("查询作业完成记录失败")?;
        Ok(records)
    }

    pub async fn archive(&self, request: ArchiveRequest) -> Result<ArchiveSummary> {
        let retention_days = request
            .retention_days
            .unwrap_or(self.config.archive.retention_days);
        let mut params = ArchiveParams::with_retention_days(retention_days);

        let export = request.export.or_else(|| {
            self.config.archive.export_dir().map(|dir| {
                dir.join(format!(
                    "jobcomp-archive-{}.jsonl",
                    Utc::now().format("%Y%m%d%H%M%S")
                ))
            })
        });
        if let Some(path) = export {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("创建归档目录失败: {}", parent.display()))?;
            }
            params = params.export_to(path);
        }

        info!(
            retention_days,
            cutoff = params.cutoff,
            export = ?params.export_path,
            "开始归档作业完成记录"
        );
        let summary = self.store.archive(&request.partitions, &params).await;
        self.check_last_error("归档作业完成记录失败")?;
        Ok(summary)
    }

    fn check_last_error(&self, message: &str) -> Result<()> {
        let code = self.store.last_error();
        if code.is_success() {
            return Ok(());
        }
        warn!(code = code.value(), "{}", message);
        Err(anyhow::anyhow!("{}: {}", message, describe(code)))
    }
}
