//! 测试公共工具：可编排的内存查询网关

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

use flare_consul_resolver::discovery::{QueryGateway, QueryOptions, QueryResult, ServiceInstance};
use flare_consul_resolver::{ResolverError, Result};

/// 网关的一次响应
pub enum Step {
    /// 返回结果
    Reply(Vec<ServiceInstance>, u64),
    /// 返回错误
    Fail(&'static str),
}

/// 记录的一次调用
#[derive(Debug, Clone)]
pub struct Call {
    pub service: String,
    pub tags: Vec<String>,
    pub passing_only: bool,
    pub options: QueryOptions,
    /// 调用发生的时刻（暂停时钟下可精确比较）
    pub at: Instant,
}

/// 按脚本依次响应的网关，脚本耗尽后一直阻塞（模拟没有变化的长轮询）
pub struct ScriptedGateway {
    steps: Mutex<VecDeque<Step>>,
    calls: Mutex<Vec<Call>>,
    called: Notify,
}

impl ScriptedGateway {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            calls: Mutex::new(Vec::new()),
            called: Notify::new(),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn wait_indexes(&self) -> Vec<u64> {
        self.calls().iter().map(|c| c.options.wait_index).collect()
    }

    /// 相邻两次调用之间的间隔
    pub fn call_gaps(&self) -> Vec<Duration> {
        self.calls()
            .windows(2)
            .map(|pair| pair[1].at - pair[0].at)
            .collect()
    }

    /// 等待调用次数达到 `n`
    pub async fn wait_for_calls(&self, n: usize) {
        loop {
            let notified = self.called.notified();
            if self.calls.lock().unwrap().len() >= n {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl QueryGateway for ScriptedGateway {
    async fn query(
        &self,
        service: &str,
        tags: &[String],
        passing_only: bool,
        options: &QueryOptions,
    ) -> Result<QueryResult> {
        self.calls.lock().unwrap().push(Call {
            service: service.to_string(),
            tags: tags.to_vec(),
            passing_only,
            options: options.clone(),
            at: Instant::now(),
        });
        self.called.notify_waiters();

        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Reply(entries, index)) => Ok(QueryResult::new(entries, index)),
            Some(Step::Fail(msg)) => Err(ResolverError::gateway(msg)),
            None => std::future::pending().await,
        }
    }
}

/// 每次等待固定时间后返回相同索引的网关（模拟索引不变、等待超时返回的长轮询）
pub struct SteadyGateway {
    entries: Vec<ServiceInstance>,
    index: u64,
    delay: Duration,
    calls: AtomicUsize,
    called: Notify,
}

impl SteadyGateway {
    pub fn new(entries: Vec<ServiceInstance>, index: u64, delay: Duration) -> Self {
        Self {
            entries,
            index,
            delay,
            calls: AtomicUsize::new(0),
            called: Notify::new(),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 等待调用次数达到 `n`
    pub async fn wait_for_calls(&self, n: usize) {
        loop {
            let notified = self.called.notified();
            if self.call_count() >= n {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl QueryGateway for SteadyGateway {
    async fn query(
        &self,
        _service: &str,
        _tags: &[String],
        _passing_only: bool,
        _options: &QueryOptions,
    ) -> Result<QueryResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.called.notify_waiters();
        tokio::time::sleep(self.delay).await;
        Ok(QueryResult::new(self.entries.clone(), self.index))
    }
}

/// 五个实例，其中两个位于 `myNode`
pub fn five_entries() -> Vec<ServiceInstance> {
    vec![
        ServiceInstance::new("myNode2", "127.0.0.1", 1024),
        ServiceInstance::new("myNode", "127.0.0.1", 8080),
        ServiceInstance::new("myNode2", "127.0.0.1", 1025),
        ServiceInstance::new("myNode", "127.0.0.1", 8081),
        ServiceInstance::new("myNode2", "127.0.0.1", 1026),
    ]
}

/// 测试中接收快照的默认超时
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// 安装测试日志输出
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("flare_consul_resolver=debug")
        .try_init();
}
