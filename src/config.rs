use serde::{Deserialize, Serialize};

use crate::discovery::Target;
use crate::error::Result;

/// 解析器配置文件
///
/// ```toml
/// [[watch]]
/// name = "user-service"
/// dsn = "consul://127.0.0.1:8500/user-service?healthy=true&wait=30s"
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ResolverConfig {
    #[serde(default, rename = "watch")]
    pub watches: Vec<WatchConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WatchConfig {
    pub name: String,
    pub dsn: String,
}

impl ResolverConfig {
    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ResolverConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// 解析全部 watch 目标，任意一个格式错误即整体失败
    pub fn targets(&self) -> Result<Vec<(String, Target)>> {
        self.watches
            .iter()
            .map(|w| Ok((w.name.clone(), Target::parse(&w.dsn)?)))
            .collect()
    }
}
