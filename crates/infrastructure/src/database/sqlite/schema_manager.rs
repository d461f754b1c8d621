use jobcomp_domain::FieldDescriptor;
use jobcomp_errors::{JobCompError, JobCompResult};
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

use super::query_builder::JobCompQueryBuilder;
use crate::{
    error_handling::{RepositoryErrorHelpers, RepositoryOperation},
    jobcomp_context,
};

/// 根据字段描述列表建表，已存在时不做修改
pub struct SchemaManager;

impl SchemaManager {
    /// 幂等：重复调用不会报错也不会改变已有数据。
    /// 已存在的表缺少声明的列时返回 `Schema` 错误，不做迁移。
    #[instrument(skip_all, fields(table = %table, columns = fields.len()))]
    pub async fn ensure_table(
        pool: &SqlitePool,
        table: &str,
        fields: &[FieldDescriptor],
    ) -> JobCompResult<()> {
        let statement = JobCompQueryBuilder::build_create_table(table, fields)?;
        let context = jobcomp_context!(RepositoryOperation::Schema, table = table);

        sqlx::query(&statement)
            .execute(pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(context.clone(), e))?;

        let existing: Vec<String> = sqlx::query("SELECT name FROM pragma_table_info($1)")
            .bind(table)
            .fetch_all(pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(context.clone(), e))?
            .iter()
            .map(|row| row.try_get::<String, _>("name"))
            .collect::<Result<_, _>>()?;

        let missing: Vec<&str> = fields
            .iter()
            .map(|f| f.name)
            .filter(|name| !existing.iter().any(|col| col.eq_ignore_ascii_case(name)))
            .collect();
        if !missing.is_empty() {
            return Err(JobCompError::schema_error(
                table,
                format!("已存在的表结构不兼容，缺少列: {}", missing.join(", ")),
            ));
        }

        debug!("表 {} 已就绪 ({} 列)", table, fields.len());
        RepositoryErrorHelpers::log_operation_success(&context, None);
        Ok(())
    }
}
