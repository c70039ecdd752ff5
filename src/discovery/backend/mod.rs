//! 注册中心查询网关抽象和实现

pub mod consul;

use async_trait::async_trait;

use crate::discovery::instance::{QueryOptions, QueryResult};
use crate::error::Result;

/// 注册中心查询网关
///
/// 每次调用执行一次阻塞查询（long-poll）。实现必须把 `options.wait_time`
/// 当作阻塞时长上限：数据变化时可以提前返回，没有变化时也必须在截止时间前后返回。
/// 注意：watch 循环需要 `Arc<dyn QueryGateway>` 动态分发，所以使用 async-trait
#[async_trait]
pub trait QueryGateway: Send + Sync {
    /// 查询服务实例
    ///
    /// # 参数
    /// * `service` - 服务名
    /// * `tags` - 标签过滤（AND 语义）
    /// * `passing_only` - 只返回健康检查通过的实例
    /// * `options` - 阻塞查询参数
    async fn query(
        &self,
        service: &str,
        tags: &[String],
        passing_only: bool,
        options: &QueryOptions,
    ) -> Result<QueryResult>;
}
