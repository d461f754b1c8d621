use jobcomp_domain::PlatformProfile;
use serde::{Deserialize, Serialize};

/// 作业完成记录配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JobCompConfig {
    /// 数据库位置，为空或不像库名时使用默认库名
    pub location: String,
    pub platform: PlatformProfile,
}

impl JobCompConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.location.chars().any(char::is_control) {
            return Err(anyhow::anyhow!("数据库位置包含控制字符"));
        }
        Ok(())
    }
}
