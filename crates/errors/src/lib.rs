use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobCompError {
    #[error("作业完成存储已初始化")]
    AlreadyInitialized,
    #[error("数据库连接失败: {0}")]
    ConnectionFailure(String),
    #[error("表 {table} 的模式定义被拒绝: {message}")]
    Schema { table: String, message: String },
    #[error("历史记录查询失败: {0}")]
    QueryFailure(String),
    #[error("归档失败: {0}")]
    ArchiveFailure(String),
    #[error("身份 {id} 查询失败: {message}")]
    IdentityLookup { id: u32, message: String },
    #[error("作业完成记录写入失败: {0}")]
    PersistFailure(String),
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("I/O错误: {0}")]
    Io(#[from] std::io::Error),
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),
}

pub type JobCompResult<T> = Result<T, JobCompError>;

impl JobCompError {
    pub fn connection_failure<S: Into<String>>(msg: S) -> Self {
        Self::ConnectionFailure(msg.into())
    }
    pub fn schema_error<T: Into<String>, S: Into<String>>(table: T, msg: S) -> Self {
        Self::Schema {
            table: table.into(),
            message: msg.into(),
        }
    }
    pub fn query_failure<S: Into<String>>(msg: S) -> Self {
        Self::QueryFailure(msg.into())
    }
    pub fn archive_failure<S: Into<String>>(msg: S) -> Self {
        Self::ArchiveFailure(msg.into())
    }
    pub fn persist_failure<S: Into<String>>(msg: S) -> Self {
        Self::PersistFailure(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// 调用方可以重试的错误。存储内部从不自行重试。
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            JobCompError::AlreadyInitialized
                | JobCompError::ConnectionFailure(_)
                | JobCompError::PersistFailure(_)
        )
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            JobCompError::AlreadyInitialized => ErrorCode::ALREADY_INITIALIZED,
            JobCompError::ConnectionFailure(_) => ErrorCode::CONNECTION_FAILURE,
            JobCompError::Schema { .. } => ErrorCode::SCHEMA_ERROR,
            JobCompError::QueryFailure(_) => ErrorCode::QUERY_FAILURE,
            JobCompError::ArchiveFailure(_) => ErrorCode::ARCHIVE_FAILURE,
            JobCompError::IdentityLookup { .. } => ErrorCode::IDENTITY_LOOKUP_FAILURE,
            JobCompError::PersistFailure(_) => ErrorCode::PERSIST_FAILURE,
            JobCompError::Configuration(_) => ErrorCode::CONFIGURATION,
            JobCompError::Serialization(_) => ErrorCode::SERIALIZATION,
            JobCompError::Io(_) => ErrorCode::IO,
            JobCompError::Database(_) => ErrorCode::DATABASE,
        }
    }
}

impl From<serde_json::Error> for JobCompError {
    fn from(err: serde_json::Error) -> Self {
        JobCompError::Serialization(err.to_string())
    }
}

/// 整数错误码，供守护进程的错误接口使用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorCode(pub i32);

impl ErrorCode {
    pub const SUCCESS: ErrorCode = ErrorCode(0);
    pub const UNSPECIFIED: ErrorCode = ErrorCode(-1);
    pub const ALREADY_INITIALIZED: ErrorCode = ErrorCode(7001);
    pub const CONNECTION_FAILURE: ErrorCode = ErrorCode(7002);
    pub const SCHEMA_ERROR: ErrorCode = ErrorCode(7003);
    pub const QUERY_FAILURE: ErrorCode = ErrorCode(7004);
    pub const ARCHIVE_FAILURE: ErrorCode = ErrorCode(7005);
    pub const IDENTITY_LOOKUP_FAILURE: ErrorCode = ErrorCode(7006);
    pub const PERSIST_FAILURE: ErrorCode = ErrorCode(7007);
    pub const CONFIGURATION: ErrorCode = ErrorCode(7008);
    pub const SERIALIZATION: ErrorCode = ErrorCode(7009);
    pub const IO: ErrorCode = ErrorCode(7010);
    pub const DATABASE: ErrorCode = ErrorCode(7011);

    pub fn value(self) -> i32 {
        self.0
    }

    pub fn is_success(self) -> bool {
        self == ErrorCode::SUCCESS
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for ErrorCode {
    fn from(value: i32) -> Self {
        ErrorCode(value)
    }
}

const ERROR_TABLE: &[(ErrorCode, &str)] = &[
    (ErrorCode::SUCCESS, "无错误"),
    (ErrorCode::UNSPECIFIED, "未指定的错误"),
    (ErrorCode::ALREADY_INITIALIZED, "作业完成存储已初始化"),
    (ErrorCode::CONNECTION_FAILURE, "无法建立或保持数据库连接"),
    (ErrorCode::SCHEMA_ERROR, "数据库拒绝了表结构定义"),
    (ErrorCode::QUERY_FAILURE, "历史记录查询失败"),
    (ErrorCode::ARCHIVE_FAILURE, "过期记录归档失败"),
    (ErrorCode::IDENTITY_LOOKUP_FAILURE, "用户或组身份查询失败"),
    (ErrorCode::PERSIST_FAILURE, "作业完成记录写入失败"),
    (ErrorCode::CONFIGURATION, "配置错误"),
    (ErrorCode::SERIALIZATION, "序列化错误"),
    (ErrorCode::IO, "I/O错误"),
    (ErrorCode::DATABASE, "数据库错误"),
];

/// 错误码转换为可读描述，未登记的错误码统一返回“未知错误”
pub fn describe(code: ErrorCode) -> String {
    ERROR_TABLE
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, message)| (*message).to_string())
        .unwrap_or_else(|| format!("未知错误 ({code})"))
}
