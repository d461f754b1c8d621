use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// 数据库文件所在目录，逻辑库名映射为 `<data_dir>/<name>.db`
    pub data_dir: PathBuf,
    /// 每个存储实例打开独立的内存库，不落盘，关闭后数据丢失
    pub in_memory: bool,
    pub connection_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/var/lib/jobcomp"),
            in_memory: false,
            connection_timeout_seconds: 30,
        }
    }
}

impl DatabaseConfig {
    /// Validate database configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.in_memory && self.data_dir.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("数据库目录不能为空"));
        }

        if self.connection_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("连接超时时间必须大于0"));
        }

        Ok(())
    }
}
