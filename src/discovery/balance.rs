//! tonic 负载均衡适配
//!
//! 把地址快照转换为 `tonic::transport::channel::Change` 事件，推送到
//! `tonic::transport::Channel::balance_channel` 返回的 sender。
//! 这一层位于核心 watch 之外，核心本身不依赖 tonic。

use std::collections::HashSet;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tonic::transport::channel::Change;
use tonic::transport::{Channel, Endpoint};
use tracing::{info, warn};

use crate::discovery::resolver::Resolver;
use crate::discovery::watch::{AddressSnapshot, WatchGuard};
use crate::error::Result;

/// balance channel 的变更缓冲区大小
const CHANGE_BUFFER: usize = 16;

/// 两个地址集合之间的差异
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointDiff {
    /// 新增地址（保持快照中的顺序）
    pub inserted: Vec<String>,
    /// 移除地址
    pub removed: Vec<String>,
}

impl EndpointDiff {
    /// 计算从 `current` 变为 `next` 需要的变更
    pub fn between(current: &HashSet<String>, next: &[String]) -> Self {
        let next_set: HashSet<&str> = next.iter().map(String::as_str).collect();

        let mut seen: HashSet<&str> = HashSet::new();
        let mut inserted = Vec::new();
        for addr in next {
            if !current.contains(addr) && seen.insert(addr.as_str()) {
                inserted.push(addr.clone());
            }
        }

        let mut removed: Vec<String> = current
            .iter()
            .filter(|addr| !next_set.contains(addr.as_str()))
            .cloned()
            .collect();
        removed.sort();

        Self { inserted, removed }
    }

    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.removed.is_empty()
    }
}

/// 为地址创建 tonic Endpoint
pub fn endpoint_for(addr: &str) -> std::result::Result<Endpoint, tonic::transport::Error> {
    Endpoint::from_shared(format!("http://{}", addr))
}

/// 消费地址快照并同步到 balance channel
///
/// 每个快照都作为完整的新地址集合：先插入新增地址，再移除消失的地址。
/// 输入关闭、sender 关闭或收到取消信号时退出。
pub async fn populate_endpoints(
    mut snapshots: mpsc::Receiver<AddressSnapshot>,
    sender: mpsc::Sender<Change<String, Endpoint>>,
    token: CancellationToken,
) {
    let mut current: HashSet<String> = HashSet::new();

    loop {
        let snapshot = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            snapshot = snapshots.recv() => match snapshot {
                Some(snapshot) => snapshot,
                None => break,
            },
        };

        let diff = EndpointDiff::between(&current, &snapshot.addresses);
        if !apply_diff(&diff, &mut current, &sender).await {
            warn!("Balance channel closed, stopping endpoint population");
            break;
        }
    }

    info!("[Consul resolver] Endpoint population has been finished");
}

/// 应用差异，返回 false 表示 sender 已关闭
async fn apply_diff(
    diff: &EndpointDiff,
    current: &mut HashSet<String>,
    sender: &mpsc::Sender<Change<String, Endpoint>>,
) -> bool {
    for addr in &diff.inserted {
        let endpoint = match endpoint_for(addr) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                warn!(address = %addr, error = %e, "Skipping invalid endpoint address");
                continue;
            }
        };
        if sender.send(Change::Insert(addr.clone(), endpoint)).await.is_err() {
            return false;
        }
        current.insert(addr.clone());
    }

    for addr in &diff.removed {
        if sender.send(Change::Remove(addr.clone())).await.is_err() {
            return false;
        }
        current.remove(addr);
    }

    true
}

/// 基于 Consul watch 的负载均衡 Channel
pub struct BalancedChannel;

impl BalancedChannel {
    /// 解析目标地址，启动 watch 与地址同步任务
    ///
    /// 返回的 `Channel` 可直接用于 tonic 客户端
    pub async fn connect(dsn: &str) -> Result<(Channel, BalancerHandle)> {
        let resolver = Resolver::connect(dsn).await?;
        Ok(Self::from_resolver(&resolver))
    }

    /// 使用已构造的解析器启动
    pub fn from_resolver(resolver: &Resolver) -> (Channel, BalancerHandle) {
        let token = CancellationToken::new();
        let (channel, sender) = Channel::balance_channel::<String>(CHANGE_BUFFER);

        let (snapshots, watch) = resolver.watch_service_changes(&token).into_parts();
        let populate = tokio::spawn(populate_endpoints(snapshots, sender, token.clone()));

        (
            channel,
            BalancerHandle {
                _drop_guard: token.clone().drop_guard(),
                token,
                watch,
                populate,
            },
        )
    }
}

/// 负载均衡后台任务句柄
///
/// 未调用 [`close`](Self::close) 直接丢弃时也会取消后台任务，只是不等待其退出
pub struct BalancerHandle {
    token: CancellationToken,
    _drop_guard: DropGuard,
    watch: WatchGuard,
    populate: JoinHandle<()>,
}

impl BalancerHandle {
    /// 停止 watch 和地址同步，并等待两个任务退出
    pub async fn close(self) {
        self.token.cancel();
        self.watch.close().await;
        if let Err(e) = self.populate.await {
            warn!(error = %e, "Endpoint population task terminated abnormally");
        }
    }
}
