//! 错误类型（对外暴露）
use std::io;
use std::time::Duration;

use thiserror::Error;

/// 反查失败：扫描器将其视为“无主机名”，原样保留地址
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("reverse lookup failed: {0}")]
    Lookup(#[from] io::Error),
    #[error("reverse lookup timed out after {0:?}")]
    TimedOut(Duration),
    #[error("resolver worker is gone")]
    WorkerGone,
}

/// 流翻译失败（读/写错误对翻译循环是致命的）
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("read input: {0}")]
    Read(#[source] io::Error),
    #[error("write output: {0}")]
    Write(#[source] io::Error),
}
