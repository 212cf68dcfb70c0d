//! 行扫描器：单字节前瞻的有限状态机
//!
//! 设计要点：
//! - 每行新建一个游标（`Cursor`），行与行之间无任何状态；跨行地址不识别。
//! - `candidate` 与 `output` 划分全部已消费字节：不丢字节、不重复字节。
//! - 候选失败时“贪婪后冲刷”：导致放弃的那个字节也随候选原样输出（`12x` 输出三个字节）。
//! - 第四段至少一位数字后，除数字、'.'、换行外的任意字节（含行尾）都结束地址，
//!   该字节作为尾随分隔符原样保留（`10.0.0.1:` → `host:`）。
//! - 只有通过结构校验（每段 0..=255）的字面量才会交给解析器。
//! - 按字节扫描：可识别字符均为 ASCII，非 UTF-8 输入原样透传。
use std::net::Ipv4Addr;

use tracing::debug;

use crate::resolver::Resolver;
use crate::types::{LineScan, MatchOutcome};

/// 前三段最多读取的字节数（3 位数字 + '.'）
const MAX_OCTET_BYTES: usize = 4;
/// 第四段最多数字位数
const MAX_LAST_OCTET_DIGITS: usize = 3;

/// 前三段（结构相同，仅后继状态不同）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Octet {
    First,
    Second,
    Third,
}

impl Octet {
    /// 遇到 '.' 后的后继状态
    fn successor(self) -> State {
        match self {
            Octet::First => State::Octet(Octet::Second),
            Octet::Second => State::Octet(Octet::Third),
            Octet::Third => State::FourthOctet,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    Octet(Octet),
    FourthOctet,
    ValidateCandidate,
    Done,
}

/// 行扫描器；解析器在构造时注入
pub struct Scanner<R> {
    resolver: R,
}

impl<R: Resolver> Scanner<R> {
    pub fn new(resolver: R) -> Self {
        Self { resolver }
    }

    /// 改写一行，只返回内容
    pub fn scan(&self, line: &[u8]) -> Vec<u8> {
        self.scan_line(line).output
    }

    /// 改写一行，并返回每个候选的结论
    pub fn scan_line(&self, line: &[u8]) -> LineScan {
        Cursor::new(line, self).run()
    }
}

/// 单行游标（每行一个，用后即弃）
struct Cursor<'a, R> {
    input: &'a [u8],
    pos: usize,
    candidate: Vec<u8>,
    output: Vec<u8>,
    outcomes: Vec<MatchOutcome>,
    scanner: &'a Scanner<R>,
}

impl<'a, R: Resolver> Cursor<'a, R> {
    fn new(input: &'a [u8], scanner: &'a Scanner<R>) -> Self {
        Self {
            input,
            pos: 0,
            candidate: Vec::with_capacity(16),
            output: Vec::with_capacity(input.len()),
            outcomes: Vec::new(),
            scanner,
        }
    }

    fn run(mut self) -> LineScan {
        let mut state = State::Start;
        while state != State::Done {
            state = match state {
                State::Start => self.start(),
                State::Octet(octet) => self.octet(octet),
                State::FourthOctet => self.fourth_octet(),
                State::ValidateCandidate => self.validate(),
                State::Done => State::Done,
            };
        }
        debug_assert!(self.candidate.is_empty());
        LineScan { output: self.output, outcomes: self.outcomes }
    }

    /// 当前字节；None 即行尾标记
    #[inline]
    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    #[inline]
    fn peek_next(&self) -> Option<u8> {
        self.input.get(self.pos + 1).copied()
    }

    /// 消费当前字节并放入候选
    #[inline]
    fn take(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        self.candidate.push(b);
        Some(b)
    }

    /// 普通文本直通；遇到“数字 + (数字|'.')”时进入第一段（该数字不消费）
    fn start(&mut self) -> State {
        while let Some(b) = self.peek() {
            if b.is_ascii_digit() && matches!(self.peek_next(), Some(n) if n.is_ascii_digit() || n == b'.') {
                return State::Octet(Octet::First);
            }
            self.output.push(b);
            self.pos += 1;
        }
        State::Done
    }

    /// 前三段：最多读 4 个字节，以 '.' 结束
    fn octet(&mut self, octet: Octet) -> State {
        let mut consumed = 0;
        loop {
            let Some(b) = self.take() else {
                return self.abandon_line();
            };
            consumed += 1;
            if b == b'.' {
                return octet.successor();
            }
            if !b.is_ascii_digit() || consumed == MAX_OCTET_BYTES {
                return self.abandon();
            }
        }
    }

    /// 第四段：1..=3 位数字，后跟任意结束字节（见 `closes_address`）或行尾
    fn fourth_octet(&mut self) -> State {
        let mut digits = 0;
        loop {
            match self.peek() {
                None if digits > 0 => return State::ValidateCandidate,
                None => return self.abandon_line(),
                Some(b) if b.is_ascii_digit() => {
                    self.take();
                    digits += 1;
                    if digits == MAX_LAST_OCTET_DIGITS {
                        // 第 3 位：只看不吃；再跟数字即超长
                        return match self.peek() {
                            None => State::ValidateCandidate,
                            Some(b'\n') => self.abandon_at_newline(),
                            Some(n) if closes_address(n) => State::ValidateCandidate,
                            Some(_) => self.abandon(),
                        };
                    }
                }
                Some(b'\n') if digits > 0 => return self.abandon_at_newline(),
                Some(b) => {
                    self.take();
                    if digits > 0 && closes_address(b) {
                        return State::ValidateCandidate;
                    }
                    return self.abandon();
                }
            }
        }
    }

    /// 行内真实换行：候选连同换行与余下字节原样输出，结束本行
    fn abandon_at_newline(&mut self) -> State {
        self.take();
        self.flush_candidate(MatchOutcome::PlainText);
        self.output.extend_from_slice(&self.input[self.pos..]);
        self.pos = self.input.len();
        State::Done
    }

    /// 拆出尾随分隔符 → 结构校验 → 反查 → 替换或原样输出
    fn validate(&mut self) -> State {
        let delimiter = match self.candidate.last() {
            Some(&b) if !b.is_ascii_digit() => Some(b),
            _ => None,
        };
        let literal_len = self.candidate.len() - usize::from(delimiter.is_some());

        let addr = match parse_ipv4(&self.candidate[..literal_len]) {
            Some(addr) => addr,
            None => {
                self.flush_candidate(MatchOutcome::PlainText);
                return State::Start;
            }
        };

        match self.lookup(addr) {
            Some(name) => {
                self.output.extend_from_slice(name.as_bytes());
                if let Some(d) = delimiter {
                    self.output.push(d);
                }
                self.candidate.clear();
                self.outcomes.push(MatchOutcome::ResolvedAddress(name));
            }
            None => self.flush_candidate(MatchOutcome::UnresolvedAddress),
        }
        State::Start
    }

    /// 反查失败/空结果一律视为“无主机名”
    fn lookup(&self, addr: Ipv4Addr) -> Option<String> {
        match self.scanner.resolver.resolve(addr) {
            Ok(names) => names.into_iter().next().filter(|n| !n.is_empty()),
            Err(e) => {
                debug!(%addr, error = %e, "reverse lookup failed, keeping literal");
                None
            }
        }
    }

    fn flush_candidate(&mut self, outcome: MatchOutcome) {
        self.output.append(&mut self.candidate);
        self.outcomes.push(outcome);
    }

    /// 候选不成立：原样冲刷，回到 Start
    fn abandon(&mut self) -> State {
        self.flush_candidate(MatchOutcome::PlainText);
        State::Start
    }

    /// 行尾处放弃：冲刷后结束本行
    fn abandon_line(&mut self) -> State {
        self.flush_candidate(MatchOutcome::PlainText);
        State::Done
    }
}

/// 第四段之后可结束地址的字节：'.' 视为更长的点分串，换行单独处理
#[inline]
fn closes_address(b: u8) -> bool {
    !b.is_ascii_digit() && b != b'.' && b != b'\n'
}

/// 结构校验：四段十进制、每段 0..=255（与标准库解析规则一致，拒绝前导零）
fn parse_ipv4(literal: &[u8]) -> Option<Ipv4Addr> {
    std::str::from_utf8(literal).ok()?.parse().ok()
}
