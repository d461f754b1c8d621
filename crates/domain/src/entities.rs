use serde::{Deserialize, Serialize};

use crate::topology::TopologyInfo;
use crate::value_objects::{JobState, PlatformProfile, TimeLimit};

fn infinite_time_limit() -> u32 {
    TimeLimit::INFINITE
}

/// 守护进程内存中的作业对象（只读视图）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: u32,
    pub user_id: u32,
    pub group_id: u32,
    pub name: String,
    /// 原始状态位，可能带有 COMPLETING 标志
    pub job_state: JobState,
    pub partition: String,
    /// 分钟数，`TimeLimit::INFINITE` 表示不限制
    #[serde(default = "infinite_time_limit")]
    pub time_limit: u32,
    #[serde(default)]
    pub start_time: i64,
    #[serde(default)]
    pub end_time: i64,
    #[serde(default)]
    pub nodes: String,
    #[serde(default)]
    pub node_cnt: u32,
    #[serde(default)]
    pub topology: Option<TopologyInfo>,
}

/// 拓扑平台的扩展字段，已格式化为有界字符串
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyFields {
    pub connection: String,
    pub reboot: String,
    pub rotate: String,
    pub max_procs: String,
    pub geometry: String,
    pub start: String,
    pub block_id: String,
}

/// 平台相关部分：要么没有扩展字段，要么全部存在
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PlatformFields {
    Base,
    Topology(TopologyFields),
}

impl PlatformFields {
    pub fn profile(&self) -> PlatformProfile {
        match self {
            PlatformFields::Base => PlatformProfile::Base,
            PlatformFields::Topology(_) => PlatformProfile::Topology,
        }
    }

    pub fn topology(&self) -> Option<&TopologyFields> {
        match self {
            PlatformFields::Base => None,
            PlatformFields::Topology(fields) => Some(fields),
        }
    }
}

/// 作业完成记录，每次完成事件生成一份，持久化后丢弃
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCompletionRecord {
    pub job_id: u32,
    pub user_id: u32,
    pub user_name: String,
    pub group_id: u32,
    pub group_name: String,
    pub name: String,
    pub final_state: JobState,
    pub partition: String,
    pub time_limit: TimeLimit,
    pub start_time: i64,
    pub end_time: i64,
    pub node_list: String,
    pub node_count: u32,
    pub platform: PlatformFields,
}

/// 绑定到插入语句的单列取值
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnValue {
    Integer(i64),
    Text(String),
}

impl JobCompletionRecord {
    pub fn profile(&self) -> PlatformProfile {
        self.platform.profile()
    }

    /// 按列名取值，列名与 `schema` 中的字段描述一一对应
    pub fn column_value(&self, column: &str) -> Option<ColumnValue> {
        use ColumnValue::{Integer, Text};

        let value = match column {
            "jobid" => Integer(i64::from(self.job_id)),
            "uid" => Integer(i64::from(self.user_id)),
            "user_name" => Text(self.user_name.clone()),
            "gid" => Integer(i64::from(self.group_id)),
            "group_name" => Text(self.group_name.clone()),
            "name" => Text(self.name.clone()),
            "state" => Integer(i64::from(self.final_state.raw())),
            "partition" => Text(self.partition.clone()),
            "timelimit" => Text(self.time_limit.to_string()),
            "starttime" => Integer(self.start_time),
            "endtime" => Integer(self.end_time),
            "nodelist" => Text(self.node_list.clone()),
            "nodecnt" => Integer(i64::from(self.node_count)),
            _ => {
                let topo = self.platform.topology()?;
                match column {
                    "connection" => Text(topo.connection.clone()),
                    "reboot" => Text(topo.reboot.clone()),
                    "rotate" => Text(topo.rotate.clone()),
                    "maxprocs" => Text(topo.max_procs.clone()),
                    "geometry" => Text(topo.geometry.clone()),
                    "start" => Text(topo.start.clone()),
                    "blockid" => Text(topo.block_id.clone()),
                    _ => return None,
                }
            }
        };
        Some(value)
    }

    pub fn entity_description(&self) -> String {
        format!("作业 '{}' (ID: {})", self.name, self.job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::jobcomp_fields;

    fn base_record() -> JobCompletionRecord {
        JobCompletionRecord {
            job_id: 7,
            user_id: 1000,
            user_name: "alice".to_string(),
            group_id: 100,
            group_name: "users".to_string(),
            name: "sim".to_string(),
            final_state: JobState::COMPLETE,
            partition: "batch".to_string(),
            time_limit: TimeLimit::Minutes(30),
            start_time: 10,
            end_time: 20,
            node_list: "node[1-2]".to_string(),
            node_count: 2,
            platform: PlatformFields::Base,
        }
    }

    #[test]
    fn test_every_base_column_has_a_value() {
        let record = base_record();
        for field in jobcomp_fields(PlatformProfile::Base) {
            assert!(record.column_value(field.name).is_some(), "{}", field.name);
        }
        assert_eq!(record.column_value("blockid"), None);
        assert_eq!(record.column_value("no_such_column"), None);
    }

    #[test]
    fn test_topology_columns_present_for_topology_record() {
        let mut record = base_record();
        record.platform = PlatformFields::Topology(TopologyFields {
            connection: "MESH".to_string(),
            reboot: "no".to_string(),
            rotate: "yes".to_string(),
            max_procs: "None".to_string(),
            geometry: "1x1x1".to_string(),
            start: "0x0x0".to_string(),
            block_id: "RMP1".to_string(),
        });

        assert_eq!(record.profile(), PlatformProfile::Topology);
        for field in jobcomp_fields(PlatformProfile::Topology) {
            assert!(record.column_value(field.name).is_some(), "{}", field.name);
        }
        assert_eq!(
            record.column_value("blockid"),
            Some(ColumnValue::Text("RMP1".to_string()))
        );
    }

    #[test]
    fn test_job_record_json_defaults() {
        let job: JobRecord = serde_json::from_str(
            r#"{"job_id":1,"user_id":0,"group_id":0,"name":"x","job_state":32773,"partition":"debug"}"#,
        )
        .unwrap();
        assert_eq!(job.time_limit, TimeLimit::INFINITE);
        assert!(job.job_state.is_completing());
        assert_eq!(job.topology, None);
    }
}
