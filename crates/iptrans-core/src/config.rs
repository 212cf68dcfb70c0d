//! 配置文件加载（TOML）与解析器装配
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

use crate::options::{TranslateOptions, DEFAULT_POLL_INTERVAL};
use crate::resolver::{CachedResolver, ChainResolver, Resolver, StaticResolver, SystemResolver, TimeoutResolver};

/// 默认配置文件路径（存在时才读取）
pub const DEFAULT_CONFIG_PATH: &str = "./iptrans.toml";

/// 顶层配置文件结构；所有字段均有默认值，未知段忽略
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub translate: TranslateSection,
    pub resolver: ResolverConfig,
    /// 静态映射：地址 → 主机名（单个或列表）
    pub hosts: BTreeMap<String, HostNames>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranslateSection {
    pub prompt: Option<String>,
    pub poll_interval_ms: u64,
}

impl Default for TranslateSection {
    fn default() -> Self {
        Self { prompt: None, poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// 是否使用系统反查
    pub system: bool,
    /// 是否缓存结果：进程生命周期内不淘汰，长会话中条目数随不同地址增长
    pub cache: bool,
    /// 单次反查超时；None 表示一直等待
    pub timeout_ms: Option<u64>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self { system: true, cache: true, timeout_ms: None }
    }
}

/// `[hosts]` 的值：兼容单个字符串或字符串数组
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum HostNames {
    One(String),
    Many(Vec<String>),
}

impl HostNames {
    fn names(&self) -> &[String] {
        match self {
            HostNames::One(n) => std::slice::from_ref(n),
            HostNames::Many(v) => v,
        }
    }
}

impl Config {
    pub fn from_toml_str(txt: &str) -> Result<Self> {
        toml::from_str(txt).context("parse config")
    }

    /// 读取指定配置文件
    pub fn load(path: &Path) -> Result<Self> {
        let txt = std::fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
        Self::from_toml_str(&txt).with_context(|| format!("load config {}", path.display()))
    }

    /// 显式路径优先；否则默认路径存在时读取，不存在则使用内置默认值
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.is_file() { Self::load(default) } else { Ok(Self::default()) }
            }
        }
    }

    pub fn translate_options(&self) -> TranslateOptions {
        TranslateOptions {
            prompt: self.translate.prompt.clone(),
            poll_interval: Duration::from_millis(self.translate.poll_interval_ms),
        }
    }

    /// 把 [hosts] 归一化为静态解析器；键必须是合法 IPv4
    pub fn static_hosts(&self) -> Result<StaticResolver> {
        let mut out = StaticResolver::new();
        for (key, names) in &self.hosts {
            let addr: Ipv4Addr = match key.trim().parse() {
                Ok(a) => a,
                Err(_) => bail!("[hosts] key {key:?} is not an IPv4 address"),
            };
            for name in names.names() {
                out.insert(addr, name.clone());
            }
        }
        Ok(out)
    }

    /// 装配解析链：静态映射 → 系统反查（可带超时），外层可选缓存
    pub fn build_resolver(&self) -> Result<Box<dyn Resolver + Send + Sync>> {
        let mut chain = ChainResolver::new();
        let hosts = self.static_hosts()?;
        if !hosts.is_empty() {
            chain.push(hosts);
        }
        if self.resolver.system {
            match self.resolver.timeout_ms {
                Some(ms) => chain.push(TimeoutResolver::new(SystemResolver, Duration::from_millis(ms))),
                None => chain.push(SystemResolver),
            }
        }
        if self.resolver.cache {
            Ok(Box::new(CachedResolver::new(chain)))
        } else {
            Ok(Box::new(chain))
        }
    }
}
