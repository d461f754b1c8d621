//! 作业完成表结构声明
//!
//! 字段描述列表就是表结构本身，顺序决定生成语句中的列顺序。

use serde::Serialize;

use crate::value_objects::PlatformProfile;

/// 单列声明：列名和数据库能理解的类型表达式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub sql_type: &'static str,
}

impl FieldDescriptor {
    pub const fn new(name: &'static str, sql_type: &'static str) -> Self {
        Self { name, sql_type }
    }
}

pub const JOBCOMP_TABLE: &str = "jobcomp_table";

pub const BASE_FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor::new("jobid", "INTEGER NOT NULL"),
    FieldDescriptor::new("uid", "INTEGER NOT NULL"),
    FieldDescriptor::new("user_name", "TEXT NOT NULL"),
    FieldDescriptor::new("gid", "INTEGER NOT NULL"),
    FieldDescriptor::new("group_name", "TEXT NOT NULL"),
    FieldDescriptor::new("name", "TEXT NOT NULL"),
    FieldDescriptor::new("state", "INTEGER NOT NULL"),
    FieldDescriptor::new("partition", "TEXT NOT NULL"),
    FieldDescriptor::new("timelimit", "TEXT NOT NULL"),
    FieldDescriptor::new("starttime", "INTEGER DEFAULT 0"),
    FieldDescriptor::new("endtime", "INTEGER DEFAULT 0"),
    FieldDescriptor::new("nodelist", "TEXT"),
    FieldDescriptor::new("nodecnt", "INTEGER NOT NULL"),
];

pub const TOPOLOGY_FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor::new("connection", "TEXT"),
    FieldDescriptor::new("reboot", "TEXT"),
    FieldDescriptor::new("rotate", "TEXT"),
    FieldDescriptor::new("maxprocs", "TEXT"),
    FieldDescriptor::new("geometry", "TEXT"),
    FieldDescriptor::new("start", "TEXT"),
    FieldDescriptor::new("blockid", "TEXT"),
];

/// 指定平台下作业完成表的完整列声明
pub fn jobcomp_fields(profile: PlatformProfile) -> Vec<FieldDescriptor> {
    let mut fields = BASE_FIELDS.to_vec();
    if profile.has_topology_fields() {
        fields.extend_from_slice(TOPOLOGY_FIELDS);
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_profile_has_no_topology_columns() {
        let fields = jobcomp_fields(PlatformProfile::Base);
        assert_eq!(fields.len(), BASE_FIELDS.len());
        assert!(fields.iter().all(|f| f.name != "blockid"));
    }

    #[test]
    fn test_topology_profile_appends_in_order() {
        let fields = jobcomp_fields(PlatformProfile::Topology);
        assert_eq!(fields.len(), BASE_FIELDS.len() + TOPOLOGY_FIELDS.len());
        assert_eq!(fields[0].name, "jobid");
        assert_eq!(fields[BASE_FIELDS.len()].name, "connection");
        assert_eq!(fields.last().map(|f| f.name), Some("blockid"));
    }
}
