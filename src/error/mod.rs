//! Flare Consul Resolver 错误处理模块
//!
//! 错误分为两类：
//! - 构造期错误（目标解析、配置加载），在 watch 启动前同步返回给调用方
//! - 运行期错误（注册中心请求失败等），在 watch 循环内部吸收并以退避方式重试

use thiserror::Error;

/// 解析器统一错误类型
#[derive(Error, Debug)]
pub enum ResolverError {
    /// 目标地址格式错误
    #[error("malformed target '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },

    /// 目标参数取值错误
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// 配置文件读取或解析失败
    #[error("config error: {0}")]
    Config(String),

    /// HTTP 传输错误
    #[error("registry transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// 注册中心返回非 200 状态码
    #[error("unexpected response code: {status} ({body})")]
    UnexpectedStatus { status: u16, body: String },

    /// 缺失或无法解析的 X-Consul-Index
    #[error("failed to parse X-Consul-Index: {0}")]
    InvalidIndex(String),

    /// 响应体解码失败
    #[error("failed to decode registry response: {0}")]
    Decode(#[from] serde_json::Error),

    /// 自定义网关返回的错误
    #[error("gateway error: {0}")]
    Gateway(String),
}

impl ResolverError {
    /// 创建目标格式错误
    pub fn invalid_target(target: impl Into<String>, reason: impl Into<String>) -> Self {
        ResolverError::InvalidTarget {
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// 创建参数错误
    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        ResolverError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// 创建网关错误
    pub fn gateway(msg: impl Into<String>) -> Self {
        ResolverError::Gateway(msg.into())
    }

    /// 判断是否为构造期（配置类）错误
    ///
    /// 配置类错误是致命的，不会被重试
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            ResolverError::InvalidTarget { .. }
                | ResolverError::InvalidParameter { .. }
                | ResolverError::Config(_)
        )
    }
}

impl From<std::io::Error> for ResolverError {
    fn from(err: std::io::Error) -> Self {
        ResolverError::Config(err.to_string())
    }
}

impl From<toml::de::Error> for ResolverError {
    fn from(err: toml::de::Error) -> Self {
        ResolverError::Config(err.to_string())
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, ResolverError>;
