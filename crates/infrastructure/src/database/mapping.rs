//! Row mapping for the job completion table
//!
//! SQLite stores every integer as i64, so columns are read wide and narrowed
//! back to the record's field types here.

use jobcomp_domain::{
    JobCompletionRecord, JobState, PlatformFields, PlatformProfile, TimeLimit, TopologyFields,
};
use jobcomp_errors::{JobCompError, JobCompResult};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

/// Helper functions for turning stored rows back into records
pub struct MappingHelpers;

impl MappingHelpers {
    pub fn row_to_record(row: &SqliteRow, profile: PlatformProfile) -> JobCompResult<JobCompletionRecord> {
        let time_limit_text: String = row.try_get("timelimit")?;
        let time_limit = time_limit_text
            .parse::<TimeLimit>()
            .map_err(JobCompError::Serialization)?;

        let platform = match profile {
            PlatformProfile::Base => PlatformFields::Base,
            PlatformProfile::Topology => PlatformFields::Topology(TopologyFields {
                connection: Self::optional_text(row, "connection")?,
                reboot: Self::optional_text(row, "reboot")?,
                rotate: Self::optional_text(row, "rotate")?,
                max_procs: Self::optional_text(row, "maxprocs")?,
                geometry: Self::optional_text(row, "geometry")?,
                start: Self::optional_text(row, "start")?,
                block_id: Self::optional_text(row, "blockid")?,
            }),
        };

        Ok(JobCompletionRecord {
            job_id: Self::narrow(row, "jobid")?,
            user_id: Self::narrow(row, "uid")?,
            user_name: row.try_get("user_name")?,
            group_id: Self::narrow(row, "gid")?,
            group_name: row.try_get("group_name")?,
            name: row.try_get("name")?,
            final_state: JobState::from_raw(Self::narrow(row, "state")?),
            partition: row.try_get("partition")?,
            time_limit,
            start_time: row.try_get::<Option<i64>, _>("starttime")?.unwrap_or_default(),
            end_time: row.try_get::<Option<i64>, _>("endtime")?.unwrap_or_default(),
            node_list: Self::optional_text(row, "nodelist")?,
            node_count: Self::narrow(row, "nodecnt")?,
            platform,
        })
    }

    fn narrow(row: &SqliteRow, column: &str) -> JobCompResult<u32> {
        let value: i64 = row.try_get(column)?;
        u32::try_from(value).map_err(|_| {
            JobCompError::Serialization(format!("列 {} 的值超出范围: {}", column, value))
        })
    }

    fn optional_text(row: &SqliteRow, column: &str) -> JobCompResult<String> {
        Ok(row
            .try_get::<Option<String>, _>(column)?
            .unwrap_or_default())
    }
}
