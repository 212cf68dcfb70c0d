//! 公共类型（对外暴露）

/// 一次候选扫描（连续数字/点串）的结论
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// 不构成地址，原样输出
    PlainText,
    /// 语法合法但未解析出主机名，原样输出
    UnresolvedAddress,
    /// 已替换为主机名
    ResolvedAddress(String),
}

/// 单行扫描结果：改写后的内容 + 按出现顺序的候选结论
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineScan {
    pub output: Vec<u8>,
    pub outcomes: Vec<MatchOutcome>,
}

impl LineScan {
    pub fn resolved(&self) -> usize {
        self.outcomes.iter().filter(|o| matches!(o, MatchOutcome::ResolvedAddress(_))).count()
    }

    pub fn unresolved(&self) -> usize {
        self.outcomes.iter().filter(|o| matches!(o, MatchOutcome::UnresolvedAddress)).count()
    }
}
