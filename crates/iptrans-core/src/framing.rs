//! 行切分与输出分帧（`\n` 是唯一的行分隔符，`\r` 视为普通内容）

/// 输出分帧：保证每行恰好以一个 `\n` 结尾
pub fn frame_line(mut line: Vec<u8>) -> Vec<u8> {
    if line.last() != Some(&b'\n') {
        line.push(b'\n');
    }
    line
}

/// 增量行缓冲：累积字节，按 `\n` 切出完整行
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    buf: Vec<u8>,
    /// 下一行的起始偏移
    start: usize,
    /// 已确认不含 `\n` 的位置，避免重复搜索
    searched: usize,
}

impl LineBuffer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn extend(&mut self, bytes: &[u8]) {
        // 已消费部分过半时整体前移，控制内存
        if self.start > 0 && self.start * 2 >= self.buf.len() {
            self.buf.drain(..self.start);
            self.searched -= self.start;
            self.start = 0;
        }
        self.buf.extend_from_slice(bytes);
    }

    /// 取出下一完整行（不含 `\n`）
    pub(crate) fn next_line(&mut self) -> Option<&[u8]> {
        let from = self.searched.max(self.start);
        match self.buf[from..].iter().position(|&b| b == b'\n') {
            Some(i) => {
                let end = from + i;
                let line = &self.buf[self.start..end];
                self.start = end + 1;
                self.searched = self.start;
                Some(line)
            }
            None => {
                self.searched = self.buf.len();
                None
            }
        }
    }

    /// 是否有尚未收到 `\n` 的残行
    pub(crate) fn has_partial(&self) -> bool {
        self.start < self.buf.len()
    }

    /// 流结束时取出残行（为空则 None）
    pub(crate) fn take_partial(&mut self) -> Option<Vec<u8>> {
        if !self.has_partial() {
            return None;
        }
        let rest = self.buf.split_off(self.start);
        self.buf.clear();
        self.start = 0;
        self.searched = 0;
        Some(rest)
    }
}
