//! 服务解析器
//!
//! 普通的工厂构造：目标配置、查询网关和本地节点名称都由调用方注入，
//! 不依赖任何全局注册表。

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::discovery::backend::QueryGateway;
use crate::discovery::backend::consul::ConsulGateway;
use crate::discovery::target::Target;
use crate::discovery::watch::{WatchHandle, WatchSession};
use crate::error::{ResolverError, Result};
use crate::retry::{DEFAULT_MIN_DELAY, ExponentialBackoff};

/// 服务解析器
///
/// 从注册中心获取服务地址，并持续监听变化
#[derive(Clone)]
pub struct Resolver {
    target: Arc<Target>,
    gateway: Arc<dyn QueryGateway>,
    agent_node_name: String,
    backoff: ExponentialBackoff,
}

impl Resolver {
    /// 使用注入的网关创建解析器
    ///
    /// # 参数
    /// * `target` - watch 目标
    /// * `gateway` - 查询网关
    /// * `agent_node_name` - 本地 agent 节点名称（用于同节点优先排序）
    pub fn new(
        target: Target,
        gateway: Arc<dyn QueryGateway>,
        agent_node_name: impl Into<String>,
    ) -> Result<Self> {
        if target.service.is_empty() {
            return Err(ResolverError::invalid_target(
                target.to_string(),
                "service name is required",
            ));
        }

        let backoff = ExponentialBackoff::new(DEFAULT_MIN_DELAY, target.max_backoff);
        Ok(Self {
            target: Arc::new(target),
            gateway,
            agent_node_name: agent_node_name.into(),
            backoff,
        })
    }

    /// 解析目标地址并连接 Consul
    ///
    /// 构造阶段会查询本地 agent 的节点名称，失败时直接返回错误
    pub async fn connect(dsn: &str) -> Result<Self> {
        let target = Target::parse(dsn)?;
        Self::from_target(target).await
    }

    /// 根据已解析的目标连接 Consul
    pub async fn from_target(target: Target) -> Result<Self> {
        let gateway = ConsulGateway::new(&target)?;
        let agent_node_name = gateway.agent_node_name().await?;

        info!(
            watch = %target,
            registry = %gateway.base_url(),
            agent = %agent_node_name,
            "[Consul resolver] connected"
        );

        Self::new(target, Arc::new(gateway), agent_node_name)
    }

    /// 替换退避策略
    pub fn with_backoff(mut self, backoff: ExponentialBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn agent_node_name(&self) -> &str {
        &self.agent_node_name
    }

    /// 启动后台 watch，持续推送地址快照直到取消
    ///
    /// 使用 `token` 的子 token：关闭返回的句柄不会取消调用方的 token，
    /// 而取消调用方的 token 会结束这个 watch。
    pub fn watch_service_changes(&self, token: &CancellationToken) -> WatchHandle {
        let session = WatchSession::new(
            self.gateway.clone(),
            self.target.clone(),
            self.agent_node_name.clone(),
            self.backoff.clone(),
        );
        session.spawn(token.child_token())
    }
}
