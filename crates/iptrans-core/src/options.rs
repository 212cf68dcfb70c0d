//! 翻译选项与统计信息（模块）
use std::time::Duration;

/// 默认轮询间隔：无完整行可读时等待多久再检查一次
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// 流翻译选项
#[derive(Debug, Clone)]
pub struct TranslateOptions {
    /// 交互模式提示符；None 表示批处理（不输出提示）
    pub prompt: Option<String>,
    /// 等待新输入时的轮询间隔
    pub poll_interval: Duration,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self { prompt: None, poll_interval: DEFAULT_POLL_INTERVAL }
    }
}

/// 翻译统计信息（便于 CLI 打印）
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TranslateStats {
    pub lines: usize,
    pub candidates: usize,
    pub resolved: usize,
    pub unresolved: usize,
    pub prompts: usize,
}
