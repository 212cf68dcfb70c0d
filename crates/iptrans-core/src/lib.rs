//! 核心库：把文本流中的 IPv4 点分地址改写为反向解析得到的主机名
//!
//! 设计要点：
//! - 行扫描器是单字节前瞻的有限状态机，不回溯；非地址文本逐字节原样透传。
//! - 只有通过结构校验（每段 0..=255）的字面量才交给解析器；解析失败/无结果即原样保留。
//! - 流翻译逐行输出并立即 flush，残行在流结束时输出一次；每行恰好以一个 `\n` 结尾。
//! - 解析能力通过 `Resolver` trait 注入，便于用假解析器测试。

mod config;
mod error;
mod framing;
mod options;
mod resolver;
mod scanner;
mod source;
mod translate;
mod types;

pub use config::{Config, HostNames, ResolverConfig, TranslateSection, DEFAULT_CONFIG_PATH};
pub use error::{ResolveError, TranslateError};
pub use framing::frame_line;
pub use options::{TranslateOptions, TranslateStats, DEFAULT_POLL_INTERVAL};
pub use resolver::{
    from_fn, CachedResolver, ChainResolver, FnResolver, Resolver, StaticResolver, SystemResolver, TimeoutResolver,
};
pub use scanner::Scanner;
pub use translate::Translator;
pub use types::{LineScan, MatchOutcome};
