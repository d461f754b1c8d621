//! 硬件拓扑描述
//!
//! 只在拓扑平台上使用。每个字段通过固定的访问方法读取，再经由
//! 有界格式化写成字符串，长度上限与数据库列的缓冲区一致。

use std::fmt;

use serde::{Deserialize, Serialize};

/// 分区块的网络连接方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConnectionType {
    Mesh,
    Torus,
    #[default]
    Nav,
    Small,
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionType::Mesh => "MESH",
            ConnectionType::Torus => "TORUS",
            ConnectionType::Nav => "NAV",
            ConnectionType::Small => "SMALL",
        };
        f.write_str(s)
    }
}

/// 三维坐标或几何尺寸
pub type Coordinate = [u16; 3];

/// 作业对象上的拓扑描述访问接口
pub trait TopologyDescriptor {
    fn connection_type(&self) -> ConnectionType;
    fn reboot(&self) -> bool;
    fn rotate(&self) -> bool;
    fn max_procs(&self) -> Option<u32>;
    fn geometry(&self) -> Option<Coordinate>;
    fn start(&self) -> Option<Coordinate>;
    fn block_id(&self) -> Option<&str>;
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TopologyInfo {
    #[serde(default)]
    pub connection_type: ConnectionType,
    #[serde(default)]
    pub reboot: bool,
    #[serde(default)]
    pub rotate: bool,
    #[serde(default)]
    pub max_procs: Option<u32>,
    #[serde(default)]
    pub geometry: Option<Coordinate>,
    #[serde(default)]
    pub start: Option<Coordinate>,
    #[serde(default)]
    pub block_id: Option<String>,
}

impl TopologyDescriptor for TopologyInfo {
    fn connection_type(&self) -> ConnectionType {
        self.connection_type
    }
    fn reboot(&self) -> bool {
        self.reboot
    }
    fn rotate(&self) -> bool {
        self.rotate
    }
    fn max_procs(&self) -> Option<u32> {
        self.max_procs
    }
    fn geometry(&self) -> Option<Coordinate> {
        self.geometry
    }
    fn start(&self) -> Option<Coordinate> {
        self.start
    }
    fn block_id(&self) -> Option<&str> {
        self.block_id.as_deref()
    }
}

/// 可打印的拓扑字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopologyField {
    Connection,
    Reboot,
    Rotate,
    MaxProcs,
    Geometry,
    Start,
    BlockId,
}

impl TopologyField {
    /// 字段缓冲区大小（含结尾符），可见内容最多 `capacity() - 1` 字节
    pub fn capacity(self) -> usize {
        match self {
            TopologyField::Connection => 128,
            TopologyField::Reboot => 4,
            TopologyField::Rotate => 4,
            TopologyField::MaxProcs => 20,
            TopologyField::Geometry => 20,
            TopologyField::Start => 20,
            TopologyField::BlockId => 128,
        }
    }
}

const NONE_TOKEN: &str = "None";

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

fn format_coordinate(coord: Option<Coordinate>) -> String {
    match coord {
        Some([x, y, z]) => format!("{x}x{y}x{z}"),
        None => NONE_TOKEN.to_string(),
    }
}

/// 截断到 `capacity - 1` 字节，且不切断 UTF-8 字符
pub fn bounded(mut value: String, capacity: usize) -> String {
    let limit = capacity.saturating_sub(1);
    if value.len() > limit {
        let mut cut = limit;
        while !value.is_char_boundary(cut) {
            cut -= 1;
        }
        value.truncate(cut);
    }
    value
}

/// 按字段格式化拓扑描述，结果受字段缓冲区大小约束
pub fn sprint_topology<D: TopologyDescriptor + ?Sized>(descriptor: &D, field: TopologyField) -> String {
    let raw = match field {
        TopologyField::Connection => descriptor.connection_type().to_string(),
        TopologyField::Reboot => yes_no(descriptor.reboot()).to_string(),
        TopologyField::Rotate => yes_no(descriptor.rotate()).to_string(),
        TopologyField::MaxProcs => descriptor
            .max_procs()
            .map(|n| n.to_string())
            .unwrap_or_else(|| NONE_TOKEN.to_string()),
        TopologyField::Geometry => format_coordinate(descriptor.geometry()),
        TopologyField::Start => format_coordinate(descriptor.start()),
        TopologyField::BlockId => descriptor.block_id().unwrap_or(NONE_TOKEN).to_string(),
    };
    bounded(raw, field.capacity())
}
