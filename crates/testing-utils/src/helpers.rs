//! Test helper utilities

use std::sync::Once;

use chrono::Utc;

/// Test environment setup utilities
pub struct TestEnv;

impl TestEnv {
    /// Generate unique test names based on timestamp
    ///
    /// 并发测试使用的数据库位置需要互不相同。
    pub fn unique_name(prefix: &str) -> String {
        let timestamp = Utc::now().timestamp_nanos_opt().unwrap_or(0);
        format!("{}_{}", prefix, timestamp)
    }

    /// 安装测试日志输出，多次调用只生效一次
    pub fn init_tracing() {
        static INIT: Once = Once::new();
        INIT.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
                )
                .with_test_writer()
                .try_init();
        });
    }
}
