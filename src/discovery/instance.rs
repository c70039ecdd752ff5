//! 服务实例与查询数据定义

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 服务实例
///
/// 只有 `node_name`、`address`、`port` 参与排序与输出，
/// `tags` 仅用于调试和自定义网关的过滤。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ServiceInstance {
    /// 实例所在节点（agent）名称
    pub node_name: String,

    /// 服务地址（域名或 IP 字面量）
    pub address: String,

    /// 服务端口
    pub port: u16,

    /// 服务标签
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ServiceInstance {
    /// 创建新的服务实例
    pub fn new(node_name: impl Into<String>, address: impl Into<String>, port: u16) -> Self {
        Self {
            node_name: node_name.into(),
            address: address.into(),
            port,
            tags: Vec::new(),
        }
    }

    /// 添加标签
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// 转换为 `address:port` 形式
    ///
    /// 不做解析或校验，域名和 IP 字面量原样透传
    pub fn to_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    /// 是否与给定节点位于同一节点
    pub fn is_on_node(&self, node_name: &str) -> bool {
        self.node_name == node_name
    }

    /// 检查是否包含全部标签（AND 语义）
    pub fn matches_tags(&self, tags: &[String]) -> bool {
        tags.iter().all(|tag| self.tags.contains(tag))
    }
}

/// 阻塞查询参数
///
/// 在一次 watch 会话内除 `wait_index` 外保持不变
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryOptions {
    /// 上次观察到的一致性索引，0 表示没有历史结果
    pub wait_index: u64,

    /// 注册中心最长阻塞时间，`None` 表示使用注册中心默认值
    pub wait_time: Option<Duration>,

    /// 就近提示（如 `_agent`）
    pub near: String,

    /// 数据中心
    pub datacenter: Option<String>,

    /// 允许读取陈旧数据
    pub allow_stale: bool,

    /// 要求强一致读取
    pub require_consistent: bool,
}

/// 查询元数据
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryMeta {
    /// 本次快照对应的一致性索引
    pub last_index: u64,

    /// 请求往返耗时（包含阻塞等待）
    pub request_time: Duration,
}

/// 单次查询结果
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryResult {
    /// 按网关返回顺序排列的实例
    pub entries: Vec<ServiceInstance>,

    pub meta: QueryMeta,
}

impl QueryResult {
    pub fn new(entries: Vec<ServiceInstance>, last_index: u64) -> Self {
        Self {
            entries,
            meta: QueryMeta {
                last_index,
                request_time: Duration::ZERO,
            },
        }
    }

    /// 一致性索引
    pub fn index(&self) -> u64 {
        self.meta.last_index
    }
}
