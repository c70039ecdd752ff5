//! Consul 查询网关
//!
//! 通过 `/v1/health/service/:service` 执行阻塞查询

use async_trait::async_trait;
use reqwest::{Client as HttpClient, RequestBuilder, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;

use crate::discovery::backend::QueryGateway;
use crate::discovery::instance::{QueryMeta, QueryOptions, QueryResult, ServiceInstance};
use crate::discovery::target::Target;
use crate::error::{ResolverError, Result};

/// 一致性索引响应头
const INDEX_HEADER: &str = "X-Consul-Index";

/// ACL token 请求头
const TOKEN_HEADER: &str = "X-Consul-Token";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HealthEntry {
    node: NodeEntry,
    service: ServiceEntry,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NodeEntry {
    node: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceEntry {
    #[serde(default)]
    address: String,
    port: u16,
    #[serde(default)]
    tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AgentSelf {
    config: AgentConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AgentConfig {
    node_name: String,
}

impl From<HealthEntry> for ServiceInstance {
    fn from(entry: HealthEntry) -> Self {
        ServiceInstance {
            node_name: entry.node.node,
            address: entry.service.address,
            port: entry.service.port,
            tags: entry.service.tags.unwrap_or_default(),
        }
    }
}

/// Consul 查询网关
#[derive(Clone)]
pub struct ConsulGateway {
    http_client: Arc<HttpClient>,
    base_url: String,
    token: Option<String>,
    credentials: Option<(String, String)>,
}

impl ConsulGateway {
    /// 根据目标配置创建网关
    ///
    /// 客户端超时需要大于 `wait`，否则阻塞查询会被客户端提前中断
    pub fn new(target: &Target) -> Result<Self> {
        let mut builder = HttpClient::builder().danger_accept_invalid_certs(target.tls_insecure);
        if let Some(timeout) = target.timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build()?;

        let credentials = match (&target.user, &target.password) {
            (Some(user), Some(password)) if !user.is_empty() && !password.is_empty() => {
                Some((user.clone(), password.clone()))
            }
            _ => None,
        };

        Ok(Self {
            http_client: Arc::new(http_client),
            base_url: target.base_url(),
            token: target.token.clone(),
            credentials,
        })
    }

    /// 注册中心基础 URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 查询本地 agent 的节点名称
    pub async fn agent_node_name(&self) -> Result<String> {
        let url = format!("{}/v1/agent/self", self.base_url);
        let resp = self.authorize(self.http_client.get(&url)).send().await?;
        let body = Self::check_status(resp).await?;
        let agent: AgentSelf = serde_json::from_slice(&body)?;
        Ok(agent.config.node_name)
    }

    fn authorize(&self, mut request: RequestBuilder) -> RequestBuilder {
        if let Some(token) = &self.token {
            request = request.header(TOKEN_HEADER, token);
        }
        if let Some((user, password)) = &self.credentials {
            request = request.basic_auth(user, Some(password));
        }
        request
    }

    async fn check_status(resp: reqwest::Response) -> Result<Vec<u8>> {
        let status = resp.status();
        let body = resp.bytes().await?;
        if status != StatusCode::OK {
            return Err(ResolverError::UnexpectedStatus {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok(body.to_vec())
    }
}

/// 构造阻塞查询的 URL 参数
///
/// 与 Consul HTTP API 的约定一致：`index` 仅在非 0 时携带，`wait` 以毫秒表示
pub fn query_params(
    tags: &[String],
    passing_only: bool,
    options: &QueryOptions,
) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    for tag in tags {
        params.push(("tag", tag.clone()));
    }
    if passing_only {
        params.push(("passing", "1".to_string()));
    }
    if options.wait_index != 0 {
        params.push(("index", options.wait_index.to_string()));
    }
    if let Some(wait) = options.wait_time {
        params.push(("wait", format!("{}ms", wait.as_millis())));
    }
    if !options.near.is_empty() {
        params.push(("near", options.near.clone()));
    }
    if let Some(dc) = &options.datacenter {
        params.push(("dc", dc.clone()));
    }
    if options.allow_stale {
        params.push(("stale", String::new()));
    }
    if options.require_consistent {
        params.push(("consistent", String::new()));
    }
    params
}

#[async_trait]
impl QueryGateway for ConsulGateway {
    async fn query(
        &self,
        service: &str,
        tags: &[String],
        passing_only: bool,
        options: &QueryOptions,
    ) -> Result<QueryResult> {
        let url = format!("{}/v1/health/service/{}", self.base_url, service);
        let params = query_params(tags, passing_only, options);

        let started = Instant::now();
        let resp = self
            .authorize(self.http_client.get(&url).query(&params))
            .send()
            .await?;

        let last_index = resp
            .headers()
            .get(INDEX_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = Self::check_status(resp).await?;
        let request_time = started.elapsed();

        let last_index = last_index
            .as_deref()
            .ok_or_else(|| ResolverError::InvalidIndex("header is missing".to_string()))?
            .parse::<u64>()
            .map_err(|e| ResolverError::InvalidIndex(e.to_string()))?;

        let entries: Vec<HealthEntry> = serde_json::from_slice(&body)?;

        Ok(QueryResult {
            entries: entries.into_iter().map(ServiceInstance::from).collect(),
            meta: QueryMeta {
                last_index,
                request_time,
            },
        })
    }
}
