//! 服务变化监听循环
//!
//! 每个 watch 会话对应一个后台任务：基于一致性索引的阻塞查询、
//! 失败退避、无变化去重、排序截断，最后通过单槽 channel 把完整地址快照交给消费方。

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, warn};

use crate::discovery::backend::QueryGateway;
use crate::discovery::instance::{QueryResult, ServiceInstance};
use crate::discovery::rank::rank;
use crate::discovery::target::Target;
use crate::retry::ExponentialBackoff;

/// 交付缓冲区容量：最多一个尚未被消费的快照
pub const DELIVERY_BUFFER: usize = 1;

/// 地址快照
///
/// 每个快照都是完整的地址集合，消费方应整体替换，而不是增量合并
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressSnapshot {
    /// 产生该快照的一致性索引
    pub index: u64,

    /// 有序的 `address:port` 列表
    pub addresses: Vec<String>,
}

impl AddressSnapshot {
    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

/// 将实例映射为 `address:port`
pub fn project_addresses(entries: &[ServiceInstance]) -> Vec<String> {
    entries.iter().map(ServiceInstance::to_addr).collect()
}

/// Watch 会话状态，只由 watch 任务持有
pub(crate) struct WatchSession {
    gateway: Arc<dyn QueryGateway>,
    target: Arc<Target>,
    agent_node_name: String,
    backoff: ExponentialBackoff,
    last_index: u64,
}

impl WatchSession {
    pub(crate) fn new(
        gateway: Arc<dyn QueryGateway>,
        target: Arc<Target>,
        agent_node_name: String,
        backoff: ExponentialBackoff,
    ) -> Self {
        Self {
            gateway,
            target,
            agent_node_name,
            backoff,
            last_index: 0,
        }
    }

    /// 启动后台 watch 任务
    pub(crate) fn spawn(self, token: CancellationToken) -> WatchHandle {
        let (tx, rx) = mpsc::channel(DELIVERY_BUFFER);
        let task = tokio::spawn(self.run(tx, token.clone()));

        WatchHandle {
            snapshots: rx,
            guard: WatchGuard {
                _drop_guard: token.clone().drop_guard(),
                token,
                task,
            },
        }
    }

    async fn run(mut self, out: mpsc::Sender<AddressSnapshot>, token: CancellationToken) {
        let target = self.target.clone();

        while !token.is_cancelled() {
            let options = target.query_options(self.last_index);
            let result = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = out.closed() => break,
                result = self.gateway.query(&target.service, &target.tags, target.healthy, &options) => result,
            };

            let result = match result {
                Ok(result) => result,
                Err(e) => {
                    let delay = self.backoff.next_delay();
                    error!(
                        watch = %target,
                        error = %e,
                        attempt = self.backoff.attempt(),
                        delay_ms = delay.as_millis() as u64,
                        "[Consul resolver] Couldn't fetch endpoints"
                    );
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => break,
                        _ = out.closed() => break,
                        _ = tokio::time::sleep(delay) => continue,
                    }
                }
            };

            self.backoff.reset();

            let Some(snapshot) = self.observe(result) else {
                continue;
            };

            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                sent = out.send(snapshot) => {
                    if sent.is_err() {
                        debug!(watch = %target, "Snapshot receiver dropped, stopping watch");
                        break;
                    }
                }
            }
        }

        info!(watch = %target, "[Consul resolver] Watch has been finished");
    }

    /// 处理一次成功的查询
    ///
    /// 返回 `None` 表示索引未变化，无需交付。
    /// 索引回退（注册中心重启或压缩）时水位线重置为 0，但本次结果代表当前真实状态，仍然交付。
    pub(crate) fn observe(&mut self, result: QueryResult) -> Option<AddressSnapshot> {
        let index = result.index();
        if index == self.last_index {
            return None;
        }

        if index < self.last_index {
            warn!(
                watch = %self.target,
                previous = self.last_index,
                index,
                "[Consul resolver] Index went backwards, resetting"
            );
            self.last_index = 0;
        } else {
            self.last_index = index;
        }

        info!(
            watch = %self.target,
            endpoints = result.entries.len(),
            request_time_ms = result.meta.request_time.as_millis() as u64,
            "[Consul resolver] endpoints fetched"
        );

        let ranked = rank(
            result.entries,
            self.target.sort,
            &self.agent_node_name,
            self.target.limit,
        );

        Some(AddressSnapshot {
            index,
            addresses: project_addresses(&ranked),
        })
    }
}

/// 后台 watch 任务的控制句柄
///
/// 丢弃时取消 watch；需要等待任务退出时使用 [`close`](Self::close)
pub struct WatchGuard {
    token: CancellationToken,
    _drop_guard: DropGuard,
    task: JoinHandle<()>,
}

impl WatchGuard {
    /// 发出取消信号（不等待任务退出）
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// 任务是否已经退出
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// 取消并等待后台任务退出
    pub async fn close(self) {
        self.token.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Watch task terminated abnormally");
        }
    }
}

/// Watch 句柄：快照接收端 + 控制句柄
pub struct WatchHandle {
    snapshots: mpsc::Receiver<AddressSnapshot>,
    guard: WatchGuard,
}

impl WatchHandle {
    /// 接收下一个快照，watch 结束后返回 `None`
    pub async fn recv(&mut self) -> Option<AddressSnapshot> {
        self.snapshots.recv().await
    }

    /// 发出取消信号
    pub fn cancel(&self) {
        self.guard.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.guard.is_finished()
    }

    /// 取消并等待后台任务退出
    pub async fn close(self) {
        self.guard.close().await;
    }

    /// 拆分为快照接收端和控制句柄，便于把接收端交给独立的消费任务
    pub fn into_parts(self) -> (mpsc::Receiver<AddressSnapshot>, WatchGuard) {
        (self.snapshots, self.guard)
    }
}
