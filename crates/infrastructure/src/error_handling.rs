//! Error handling for job completion store operations with rich context
//!
//! Maps backend (`sqlx`) failures onto the store's error kinds and logs them
//! together with the entity and operation that failed.

use chrono::{DateTime, Utc};
use jobcomp_errors::JobCompError;
use sqlx::Error as SqlxError;
use std::fmt;
use tracing::{debug, error, instrument};

/// Operation context for store operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryOperation {
    Connect,
    Schema,
    Create,
    Query,
    Export,
    Delete,
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepositoryOperation::Connect => write!(f, "连接"),
            RepositoryOperation::Schema => write!(f, "建表"),
            RepositoryOperation::Create => write!(f, "写入"),
            RepositoryOperation::Query => write!(f, "查询"),
            RepositoryOperation::Export => write!(f, "导出"),
            RepositoryOperation::Delete => write!(f, "删除"),
        }
    }
}

/// Context information for job completion operations
#[derive(Debug, Clone)]
pub struct JobCompOperationContext {
    pub operation: RepositoryOperation,
    pub table: Option<String>,
    pub database: Option<String>,
    pub job_id: Option<u32>,
    pub job_name: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl JobCompOperationContext {
    pub fn new(operation: RepositoryOperation) -> Self {
        Self {
            operation,
            table: None,
            database: None,
            job_id: None,
            job_name: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_table(mut self, table: String) -> Self {
        self.table = Some(table);
        self
    }

    pub fn with_database(mut self, database: String) -> Self {
        self.database = Some(database);
        self
    }

    pub fn with_job_id(mut self, job_id: u32) -> Self {
        self.job_id = Some(job_id);
        self
    }

    pub fn with_job_name(mut self, job_name: String) -> Self {
        self.job_name = Some(job_name);
        self
    }

    pub fn entity_description(&self) -> String {
        match (&self.job_id, &self.job_name, &self.table, &self.database) {
            (Some(id), Some(name), _, _) => format!("作业 '{}' (ID: {})", name, id),
            (Some(id), None, _, _) => format!("作业 (ID: {})", id),
            (None, _, Some(table), _) => format!("表 '{}'", table),
            (None, _, None, Some(db)) => format!("数据库 '{}'", db),
            _ => "作业完成记录".to_string(),
        }
    }
}

/// Error helpers for job completion store operations
pub struct RepositoryErrorHelpers;

impl RepositoryErrorHelpers {
    /// Convert a backend error into the store error kind matching the operation
    #[instrument(skip_all, fields(
        operation = %context.operation,
        table = ?context.table,
        job_id = ?context.job_id,
        timestamp = %context.timestamp,
    ))]
    pub fn database_error(context: JobCompOperationContext, error: SqlxError) -> JobCompError {
        let entity_desc = context.entity_description();
        let operation_desc = context.operation.to_string();

        let error_msg = match &error {
            SqlxError::Database(db_error) => {
                format!("{}{}时发生数据库错误: {}", operation_desc, entity_desc, db_error)
            }
            SqlxError::PoolClosed => {
                format!("{}{}时数据库连接已关闭", operation_desc, entity_desc)
            }
            SqlxError::PoolTimedOut => {
                format!("{}{}时获取数据库连接超时", operation_desc, entity_desc)
            }
            SqlxError::Io(io_error) => {
                format!("{}{}时发生I/O错误: {}", operation_desc, entity_desc, io_error)
            }
            _ => {
                format!("{}{}时发生未知数据库错误: {}", operation_desc, entity_desc, error)
            }
        };
        error!(error = %error, "{}", error_msg);

        let connection_lost = matches!(
            error,
            SqlxError::PoolClosed | SqlxError::PoolTimedOut | SqlxError::Io(_)
        );
        if connection_lost {
            return JobCompError::connection_failure(error_msg);
        }

        Self::operation_error(context, error_msg)
    }

    /// Wrap a row decoding failure into the error kind of the surrounding operation
    #[instrument(skip_all, fields(operation = %context.operation, table = ?context.table))]
    pub fn decode_error(context: JobCompOperationContext, error: JobCompError) -> JobCompError {
        let error_msg = format!(
            "{}{}时解码记录失败: {}",
            context.operation,
            context.entity_description(),
            error
        );
        error!("{}", error_msg);
        Self::operation_error(context, error_msg)
    }

    fn operation_error(context: JobCompOperationContext, error_msg: String) -> JobCompError {
        match context.operation {
            RepositoryOperation::Connect => JobCompError::connection_failure(error_msg),
            RepositoryOperation::Schema => JobCompError::schema_error(
                context.table.unwrap_or_default(),
                error_msg,
            ),
            RepositoryOperation::Create => JobCompError::persist_failure(error_msg),
            RepositoryOperation::Query => JobCompError::query_failure(error_msg),
            RepositoryOperation::Export | RepositoryOperation::Delete => {
                JobCompError::archive_failure(error_msg)
            }
        }
    }

    /// Log successful operation with context
    pub fn log_operation_success(
        context: &JobCompOperationContext,
        details: Option<&str>,
    ) {
        let entity_desc = context.entity_description();
        match details {
            Some(details) => debug!(
                operation = %context.operation,
                "{}{}成功: {}",
                context.operation,
                entity_desc,
                details
            ),
            None => debug!(operation = %context.operation, "{}{}成功", context.operation, entity_desc),
        }
    }
}

/// Macro for creating job completion operation context easily
#[macro_export]
macro_rules! jobcomp_context {
    ($operation:expr) => {
        $crate::error_handling::JobCompOperationContext::new($operation)
    };
    ($operation:expr, table = $table:expr) => {
        $crate::error_handling::JobCompOperationContext::new($operation)
            .with_table($table.to_string())
    };
    ($operation:expr, database = $database:expr) => {
        $crate::error_handling::JobCompOperationContext::new($operation)
            .with_database($database.to_string())
    };
    ($operation:expr, job_id = $job_id:expr, job_name = $job_name:expr) => {
        $crate::error_handling::JobCompOperationContext::new($operation)
            .with_job_id($job_id)
            .with_job_name($job_name.to_string())
    };
}
