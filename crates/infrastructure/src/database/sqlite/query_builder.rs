//! Job completion query builder - dynamic SQL construction for the completion table
//!
//! Identifiers come from the compiled-in field descriptors and are validated and
//! quoted here; every value is returned as a positional parameter, never spliced
//! into the statement text.

use jobcomp_domain::{ColumnValue, FieldDescriptor, HistoryParams, JobStepSelector};
use jobcomp_errors::{JobCompError, JobCompResult};
use sqlx::sqlite::{Sqlite, SqliteArguments};
use sqlx::query::Query;

pub struct JobCompQueryBuilder;

impl JobCompQueryBuilder {
    /// `[A-Za-z_][A-Za-z0-9_]*`
    pub fn is_valid_identifier(name: &str) -> bool {
        let mut chars = name.chars();
        match chars.next() {
            Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
            _ => return false,
        }
        chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    }

    /// 列类型声明可以带单引号字面量（`''` 转义）。
    /// 字面量之外不允许分号、双引号和注释，括号必须配对
    pub fn is_valid_type_declaration(sql_type: &str) -> bool {
        if sql_type.trim().is_empty() {
            return false;
        }
        let mut in_literal = false;
        let mut depth = 0usize;
        let mut prev = ' ';
        for c in sql_type.chars() {
            if in_literal {
                if c == '\'' {
                    in_literal = false;
                }
                prev = ' ';
                continue;
            }
            if matches!((prev, c), ('-', '-') | ('/', '*')) {
                return false;
            }
            prev = c;
            match c {
                '\'' => in_literal = true,
                ';' | '"' => return false,
                '(' => depth += 1,
                ')' => match depth.checked_sub(1) {
                    Some(d) => depth = d,
                    None => return false,
                },
                _ => {}
            }
        }
        !in_literal && depth == 0
    }

    pub fn quote_identifier(name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn column_list(fields: &[FieldDescriptor]) -> String {
        fields
            .iter()
            .map(|f| Self::quote_identifier(f.name))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Build `CREATE TABLE IF NOT EXISTS` from the descriptor list, in order
    pub fn build_create_table(table: &str, fields: &[FieldDescriptor]) -> JobCompResult<String> {
        if table.is_empty() || !Self::is_valid_identifier(table) {
            return Err(JobCompError::schema_error(table, "表名无效"));
        }
        if fields.is_empty() {
            return Err(JobCompError::schema_error(table, "字段列表不能为空"));
        }

        let mut columns = Vec::with_capacity(fields.len());
        for field in fields {
            if !Self::is_valid_identifier(field.name) {
                return Err(JobCompError::schema_error(
                    table,
                    format!("列名无效: '{}'", field.name),
                ));
            }
            let sql_type = field.sql_type.trim();
            if !Self::is_valid_type_declaration(sql_type) {
                return Err(JobCompError::schema_error(
                    table,
                    format!("列 {} 的类型无效: '{}'", field.name, field.sql_type),
                ));
            }
            columns.push(format!("{} {}", Self::quote_identifier(field.name), sql_type));
        }

        Ok(format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            Self::quote_identifier(table),
            columns.join(", ")
        ))
    }

    /// Build parameterized INSERT covering every declared column, in declaration order
    pub fn build_insert(table: &str, fields: &[FieldDescriptor]) -> String {
        let placeholders = (1..=fields.len())
            .map(|i| format!("${i}"))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            Self::quote_identifier(table),
            Self::column_list(fields),
            placeholders
        )
    }

    /// Build SELECT query based on filter criteria
    pub fn build_select(
        table: &str,
        fields: &[FieldDescriptor],
        jobs: &[JobStepSelector],
        partitions: &[String],
        params: &HistoryParams,
    ) -> (String, Vec<ColumnValue>) {
        let mut query = format!(
            "SELECT {} FROM {} WHERE 1=1",
            Self::column_list(fields),
            Self::quote_identifier(table)
        );
        let mut values = Vec::new();

        // Add job filter
        if !jobs.is_empty() {
            let ids = jobs
                .iter()
                .map(|job| ColumnValue::Integer(i64::from(job.job_id)))
                .collect::<Vec<_>>();
            Self::push_in_clause(&mut query, &mut values, "jobid", ids);
        }

        // Add partition filter
        if !partitions.is_empty() {
            let names = partitions
                .iter()
                .map(|p| ColumnValue::Text(p.clone()))
                .collect::<Vec<_>>();
            Self::push_in_clause(&mut query, &mut values, "partition", names);
        }

        if let Some(since) = params.since {
            values.push(ColumnValue::Integer(since));
            query.push_str(&format!(" AND \"endtime\" >= ${}", values.len()));
        }

        if let Some(until) = params.until {
            values.push(ColumnValue::Integer(until));
            query.push_str(&format!(" AND \"starttime\" <= ${}", values.len()));
        }

        if let Some(uid) = params.user_id {
            values.push(ColumnValue::Integer(i64::from(uid)));
            query.push_str(&format!(" AND \"uid\" = ${}", values.len()));
        }

        query.push_str(" ORDER BY \"endtime\" ASC, \"jobid\" ASC, rowid ASC");

        if let Some(limit) = params.limit {
            values.push(ColumnValue::Integer(i64::from(limit)));
            query.push_str(&format!(" LIMIT ${}", values.len()));
        }

        (query, values)
    }

    /// WHERE clause selecting records that ended before `cutoff`
    fn archive_filter(partitions: &[String], cutoff: i64) -> (String, Vec<ColumnValue>) {
        let mut clause = " WHERE \"endtime\" > 0".to_string();
        let mut values = vec![ColumnValue::Integer(cutoff)];
        clause.push_str(" AND \"endtime\" < $1");

        if !partitions.is_empty() {
            let names = partitions
                .iter()
                .map(|p| ColumnValue::Text(p.clone()))
                .collect::<Vec<_>>();
            Self::push_in_clause(&mut clause, &mut values, "partition", names);
        }

        (clause, values)
    }

    pub fn build_archive_select(
        table: &str,
        fields: &[FieldDescriptor],
        partitions: &[String],
        cutoff: i64,
    ) -> (String, Vec<ColumnValue>) {
        let (clause, values) = Self::archive_filter(partitions, cutoff);
        let query = format!(
            "SELECT {} FROM {}{} ORDER BY \"endtime\" ASC, rowid ASC",
            Self::column_list(fields),
            Self::quote_identifier(table),
            clause
        );
        (query, values)
    }

    pub fn build_archive_delete(
        table: &str,
        partitions: &[String],
        cutoff: i64,
    ) -> (String, Vec<ColumnValue>) {
        let (clause, values) = Self::archive_filter(partitions, cutoff);
        let query = format!("DELETE FROM {}{}", Self::quote_identifier(table), clause);
        (query, values)
    }

    fn push_in_clause(
        query: &mut String,
        values: &mut Vec<ColumnValue>,
        column: &str,
        items: Vec<ColumnValue>,
    ) {
        let start = values.len() + 1;
        let placeholders = (start..start + items.len())
            .map(|i| format!("${i}"))
            .collect::<Vec<_>>()
            .join(", ");
        query.push_str(&format!(
            " AND {} IN ({})",
            Self::quote_identifier(column),
            placeholders
        ));
        values.extend(items);
    }

    /// Bind positional parameters in order
    pub fn bind_values<'q>(
        mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
        values: &[ColumnValue],
    ) -> Query<'q, Sqlite, SqliteArguments<'q>> {
        for value in values {
            query = match value {
                ColumnValue::Integer(v) => query.bind(*v),
                ColumnValue::Text(s) => query.bind(s.clone()),
            };
        }
        query
    }
}
