use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// 历史记录归档配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// 作业完成记录保留天数
    pub retention_days: u32,
    /// 归档导出目录，未设置时只删除不导出
    pub export_dir: Option<PathBuf>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            retention_days: 365,
            export_dir: None,
        }
    }
}

impl ArchiveConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.retention_days == 0 {
            return Err(anyhow::anyhow!("保留天数必须大于0"));
        }
        if let Some(dir) = &self.export_dir {
            if dir.as_os_str().is_empty() {
                return Err(anyhow::anyhow!("归档导出目录不能为空字符串"));
            }
        }
        Ok(())
    }

    pub fn export_dir(&self) -> Option<&Path> {
        self.export_dir.as_deref()
    }
}
