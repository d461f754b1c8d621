use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

/// 作业/作业步选择器，形如 `42` 或 `42.3`
///
/// 完成记录按作业粒度存储，作业步编号只做解析，不参与过滤。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStepSelector {
    pub job_id: u32,
    pub step_id: Option<u32>,
}

impl JobStepSelector {
    pub fn job(job_id: u32) -> Self {
        Self {
            job_id,
            step_id: None,
        }
    }
}

impl fmt::Display for JobStepSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.step_id {
            Some(step) => write!(f, "{}.{}", self.job_id, step),
            None => write!(f, "{}", self.job_id),
        }
    }
}

impl FromStr for JobStepSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (job, step) = match s.split_once('.') {
            Some((job, step)) => (job, Some(step)),
            None => (s, None),
        };
        let job_id = job
            .trim()
            .parse::<u32>()
            .map_err(|e| format!("无效的作业ID '{s}': {e}"))?;
        let step_id = step
            .map(|step| step.trim().parse::<u32>())
            .transpose()
            .map_err(|e| format!("无效的作业步ID '{s}': {e}"))?;
        Ok(Self { job_id, step_id })
    }
}

/// 历史查询附加条件，时间均为 epoch 秒
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryParams {
    /// 结束时间不早于该值
    pub since: Option<i64>,
    /// 开始时间不晚于该值
    pub until: Option<i64>,
    pub user_id: Option<u32>,
    pub limit: Option<u32>,
}

/// 归档参数：结束时间早于 `cutoff` 的记录将被移出
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveParams {
    pub cutoff: i64,
    /// 删除前以 JSON Lines 追加导出到该文件
    pub export_path: Option<PathBuf>,
}

impl ArchiveParams {
    pub fn before(cutoff: i64) -> Self {
        Self {
            cutoff,
            export_path: None,
        }
    }

    /// 按保留天数计算截止时间
    pub fn with_retention_days(days: u32) -> Self {
        let cutoff = Utc::now() - Duration::days(i64::from(days));
        Self::before(cutoff.timestamp())
    }

    pub fn export_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.export_path = Some(path.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveSummary {
    pub exported: u64,
    pub deleted: u64,
}
