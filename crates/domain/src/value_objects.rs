use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 作业生命周期状态
///
/// 低位保存基础状态，高位为瞬态标志位。作业完成时通常仍带有
/// `COMPLETING` 标志，持久化前需要清除。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobState(u32);

impl JobState {
    pub const PENDING: JobState = JobState(0);
    pub const RUNNING: JobState = JobState(1);
    pub const SUSPENDED: JobState = JobState(2);
    pub const COMPLETE: JobState = JobState(3);
    pub const CANCELLED: JobState = JobState(4);
    pub const FAILED: JobState = JobState(5);
    pub const TIMEOUT: JobState = JobState(6);
    pub const NODE_FAIL: JobState = JobState(7);

    /// 作业正在收尾的瞬态标志
    pub const COMPLETING_FLAG: u32 = 0x8000;

    pub const fn from_raw(raw: u32) -> Self {
        JobState(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn is_completing(self) -> bool {
        self.0 & Self::COMPLETING_FLAG != 0
    }

    /// 去掉 COMPLETING 标志后的最终状态
    pub const fn without_completing(self) -> Self {
        JobState(self.0 & !Self::COMPLETING_FLAG)
    }

    pub const fn with_completing(self) -> Self {
        JobState(self.0 | Self::COMPLETING_FLAG)
    }

    pub fn name(self) -> &'static str {
        match self.without_completing() {
            JobState::PENDING => "PENDING",
            JobState::RUNNING => "RUNNING",
            JobState::SUSPENDED => "SUSPENDED",
            JobState::COMPLETE => "COMPLETED",
            JobState::CANCELLED => "CANCELLED",
            JobState::FAILED => "FAILED",
            JobState::TIMEOUT => "TIMEOUT",
            JobState::NODE_FAIL => "NODE_FAIL",
            _ => "UNKNOWN",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_completing() {
            write!(f, "{}|COMPLETING", self.name())
        } else {
            f.write_str(self.name())
        }
    }
}

/// 作业时间限制（分钟）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeLimit {
    Minutes(u32),
    Unlimited,
}

impl TimeLimit {
    /// 作业对象中表示“无限制”的哨兵值
    pub const INFINITE: u32 = u32::MAX;
    pub const UNLIMITED_TOKEN: &'static str = "UNLIMITED";

    pub fn from_raw(raw: u32) -> Self {
        if raw == Self::INFINITE {
            TimeLimit::Unlimited
        } else {
            TimeLimit::Minutes(raw)
        }
    }
}

impl fmt::Display for TimeLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeLimit::Minutes(minutes) => write!(f, "{minutes}"),
            TimeLimit::Unlimited => f.write_str(Self::UNLIMITED_TOKEN),
        }
    }
}

impl FromStr for TimeLimit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == Self::UNLIMITED_TOKEN {
            return Ok(TimeLimit::Unlimited);
        }
        s.parse::<u32>()
            .map(TimeLimit::Minutes)
            .map_err(|e| format!("无效的时间限制 '{s}': {e}"))
    }
}

impl Serialize for TimeLimit {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeLimit {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// 部署平台类型，决定记录结构和表结构
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformProfile {
    #[default]
    Base,
    /// 感知硬件拓扑的分区平台，额外记录拓扑扩展字段
    Topology,
}

impl PlatformProfile {
    pub fn has_topology_fields(self) -> bool {
        matches!(self, PlatformProfile::Topology)
    }
}

impl FromStr for PlatformProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "base" => Ok(PlatformProfile::Base),
            "topology" => Ok(PlatformProfile::Topology),
            _ => Err(format!("不支持的平台类型: {s}")),
        }
    }
}
