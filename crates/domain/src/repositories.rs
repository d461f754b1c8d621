//! 作业完成存储抽象
//!
//! 后端可替换，守护进程只依赖这里的接口。

use async_trait::async_trait;
use jobcomp_errors::{describe, ErrorCode, JobCompResult};

use crate::entities::{JobCompletionRecord, JobRecord};
use crate::query::{ArchiveParams, ArchiveSummary, HistoryParams, JobStepSelector};

#[async_trait]
pub trait JobCompStorage: Send + Sync {
    /// 初始化后端连接并确保表结构存在，重复初始化返回 `AlreadyInitialized`
    async fn init(&self, location: &str) -> JobCompResult<()>;
    async fn persist(&self, record: &JobCompletionRecord) -> JobCompResult<()>;
    /// 作业完成事件入口：构建记录并持久化
    async fn log_job(&self, job: &JobRecord) -> JobCompResult<()>;
    /// 查询失败时返回空结果，错误码通过 `last_error` 获取
    async fn query(
        &self,
        jobs: &[JobStepSelector],
        partitions: &[String],
        params: &HistoryParams,
    ) -> Vec<JobCompletionRecord>;
    async fn archive(&self, partitions: &[String], params: &ArchiveParams) -> ArchiveSummary;
    async fn close(&self);
    fn last_error(&self) -> ErrorCode;

    fn describe(&self, code: ErrorCode) -> String {
        describe(code)
    }
}
