//! 结果排序与截断

use serde::{Deserialize, Serialize};

use crate::discovery::instance::ServiceInstance;

/// 排序策略
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum SortStrategy {
    /// 保持网关返回顺序
    None,
    /// 按地址字典序
    #[default]
    ByAddress,
    /// 与本地 agent 同节点的实例优先，其余保持原顺序
    LocalityFirst,
}

impl SortStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortStrategy::None => "none",
            SortStrategy::ByAddress => "byAddress",
            SortStrategy::LocalityFirst => "localityFirst",
        }
    }
}

impl std::str::FromStr for SortStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "byAddress" | "byName" => Ok(SortStrategy::ByAddress),
            "none" => Ok(SortStrategy::None),
            "localityFirst" | "sameNodeFirst" => Ok(SortStrategy::LocalityFirst),
            _ => Err(format!("Unknown sort strategy: {}", s)),
        }
    }
}

impl std::fmt::Display for SortStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 对实例排序并按 `limit` 截断
///
/// 先排序后截断，所以 `LocalityFirst + limit 1` 在存在本地实例时一定返回本地实例。
/// 两种排序都依赖 `sort_by` 的稳定性：比较相等的元素保持输入中的相对顺序。
/// `limit == 0` 表示不限制。
pub fn rank(
    mut entries: Vec<ServiceInstance>,
    strategy: SortStrategy,
    local_node: &str,
    limit: usize,
) -> Vec<ServiceInstance> {
    match strategy {
        SortStrategy::None => {}
        SortStrategy::ByAddress => entries.sort_by(|a, b| a.address.cmp(&b.address)),
        // false < true：本地实例排在前面，其他比较视为相等
        SortStrategy::LocalityFirst => entries.sort_by_key(|e| !e.is_on_node(local_node)),
    }

    if limit != 0 && entries.len() > limit {
        entries.truncate(limit);
    }

    entries
}
