//! 流翻译主流程：按行读取 → 扫描改写 → 立即写出
//!
//! 输出保证：
//! - 每个完整行扫描后立即写出并 flush（不缓冲整个流，输入可能是无限的交互会话）
//! - 每行输出恰好以一个 `\n` 结尾
//! - 流结束时残行（无 `\n`）仍扫描并输出一次
use std::io::{Read, Write};

use tracing::debug;

use crate::error::TranslateError;
use crate::framing::{frame_line, LineBuffer};
use crate::options::{TranslateOptions, TranslateStats};
use crate::resolver::Resolver;
use crate::scanner::Scanner;
use crate::source::{Chunk, InputPump};

pub struct Translator<R> {
    scanner: Scanner<R>,
    prompt: Option<String>,
    options: TranslateOptions,
}

impl<R: Resolver> Translator<R> {
    pub fn new(resolver: R, options: TranslateOptions) -> Self {
        let scanner = Scanner::new(resolver);
        let prompt = options.prompt.clone().filter(|p| !p.is_empty());
        Self { scanner, prompt, options }
    }

    /// 翻译字节流直到输入结束；读/写错误是致命的
    ///
    /// 配置了提示符时，若超过轮询间隔仍无新数据，则向输出写一次提示符（每段空闲期一次）。
    pub fn translate<I, W>(&self, input: I, out: &mut W) -> Result<TranslateStats, TranslateError>
    where
        I: Read + Send + 'static,
        W: Write + ?Sized,
    {
        let pump = InputPump::spawn(input).map_err(TranslateError::Read)?;
        let wait = self.prompt.as_ref().map(|_| self.options.poll_interval);

        let mut stats = TranslateStats::default();
        let mut lines = LineBuffer::new();
        let mut prompted = false;

        loop {
            match pump.recv(wait) {
                None => {
                    if !prompted {
                        self.write_prompt(out, &mut stats)?;
                        prompted = true;
                    }
                }
                Some(Chunk::Data(bytes)) => {
                    prompted = false;
                    lines.extend(&bytes);
                    while let Some(line) = lines.next_line() {
                        self.emit(line, out, &mut stats)?;
                    }
                }
                Some(Chunk::Eof) => break,
                Some(Chunk::Failed(e)) => return Err(TranslateError::Read(e)),
            }
        }

        if let Some(rest) = lines.take_partial() {
            self.emit(&rest, out, &mut stats)?;
        }
        out.flush().map_err(TranslateError::Write)?;
        pump.join();

        debug!(
            lines = stats.lines,
            candidates = stats.candidates,
            resolved = stats.resolved,
            unresolved = stats.unresolved,
            "translation finished"
        );
        Ok(stats)
    }

    /// 内存中整段翻译（批处理；无提示符、无后台线程）
    pub fn translate_buffer(&self, input: &[u8]) -> (Vec<u8>, TranslateStats) {
        let mut out = Vec::with_capacity(input.len());
        let mut stats = TranslateStats::default();
        let mut lines = LineBuffer::new();
        lines.extend(input);
        while let Some(line) = lines.next_line() {
            out.extend(self.rewrite(line, &mut stats));
        }
        if let Some(rest) = lines.take_partial() {
            out.extend(self.rewrite(&rest, &mut stats));
        }
        (out, stats)
    }

    /// 扫描一行并分帧，同时累计统计
    fn rewrite(&self, line: &[u8], stats: &mut TranslateStats) -> Vec<u8> {
        let scan = self.scanner.scan_line(line);
        stats.lines += 1;
        stats.candidates += scan.outcomes.len();
        stats.resolved += scan.resolved();
        stats.unresolved += scan.unresolved();
        frame_line(scan.output)
    }

    fn emit<W>(&self, line: &[u8], out: &mut W, stats: &mut TranslateStats) -> Result<(), TranslateError>
    where
        W: Write + ?Sized,
    {
        let framed = self.rewrite(line, stats);
        out.write_all(&framed).map_err(TranslateError::Write)?;
        out.flush().map_err(TranslateError::Write)
    }

    fn write_prompt<W>(&self, out: &mut W, stats: &mut TranslateStats) -> Result<(), TranslateError>
    where
        W: Write + ?Sized,
    {
        if let Some(prompt) = &self.prompt {
            out.write_all(prompt.as_bytes()).map_err(TranslateError::Write)?;
            out.flush().map_err(TranslateError::Write)?;
            stats.prompts += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{from_fn, StaticResolver};
    use std::collections::VecDeque;
    use std::io::{self, Cursor};
    use std::net::Ipv4Addr;
    use std::thread;
    use std::time::Duration;

    fn hosts(pairs: &[(&str, &str)]) -> StaticResolver {
        pairs.iter().map(|(a, n)| (a.parse::<Ipv4Addr>().unwrap(), *n)).collect()
    }

    fn batch<R: Resolver>(resolver: R) -> Translator<R> {
        Translator::new(resolver, TranslateOptions::default())
    }

    /// 按预设延迟逐块返回数据，模拟交互会话
    struct SlowReader {
        chunks: VecDeque<(Duration, Vec<u8>)>,
    }

    impl Read for SlowReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.chunks.pop_front() {
                Some((delay, data)) => {
                    thread::sleep(delay);
                    buf[..data.len()].copy_from_slice(&data);
                    Ok(data.len())
                }
                None => Ok(0),
            }
        }
    }

    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_translate_stream() {
        let t = batch(hosts(&[("10.0.0.1", "host-a")]));
        let mut out = Vec::new();
        let input = Cursor::new(b"ping 10.0.0.1 ok\nplain\n\n10.0.0.2 x\n".to_vec());
        let stats = t.translate(input, &mut out).unwrap();
        assert_eq!(out, b"ping host-a ok\nplain\n\n10.0.0.2 x\n".to_vec());
        assert_eq!(stats.lines, 4);
        assert_eq!(stats.candidates, 2);
        assert_eq!(stats.resolved, 1);
        assert_eq!(stats.unresolved, 1);
        assert_eq!(stats.prompts, 0);
    }

    #[test]
    fn test_trailing_partial_line_flushed_once() {
        let t = batch(hosts(&[("1.2.3.4", "h")]));
        let mut out = Vec::new();
        let stats = t.translate(Cursor::new(b"partial 1.2.3.4".to_vec()), &mut out).unwrap();
        assert_eq!(out, b"partial h\n".to_vec());
        assert_eq!(stats.lines, 1);
    }

    #[test]
    fn test_empty_input_writes_nothing() {
        let t = batch(StaticResolver::new());
        let mut out = Vec::new();
        let stats = t.translate(Cursor::new(Vec::new()), &mut out).unwrap();
        assert!(out.is_empty());
        assert_eq!(stats, TranslateStats::default());
    }

    #[test]
    fn test_write_error_is_fatal() {
        let t = batch(StaticResolver::new());
        let err = t.translate(Cursor::new(b"a\n".to_vec()), &mut BrokenWriter).unwrap_err();
        assert!(matches!(err, TranslateError::Write(_)));
    }

    #[test]
    fn test_prompt_once_per_idle_period() {
        let opts = TranslateOptions {
            prompt: Some("> ".to_string()),
            poll_interval: Duration::from_millis(10),
        };
        let t = Translator::new(hosts(&[("10.0.0.1", "a")]), opts);
        let reader = SlowReader {
            chunks: VecDeque::from(vec![
                (Duration::from_millis(150), b"10.0.0.1 up\n".to_vec()),
                (Duration::from_millis(150), b"bye\n".to_vec()),
            ]),
        };
        let mut out = Vec::new();
        let stats = t.translate(reader, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        // 每段空闲期最多一次提示符，而不是每个轮询周期一次
        assert!(text.starts_with("> a up\n"), "got {text:?}");
        assert!(stats.prompts >= 2 && stats.prompts <= 3, "prompts = {}", stats.prompts);
        assert_eq!(text.matches("> ").count(), stats.prompts);
        assert_eq!(text.replace("> ", ""), "a up\nbye\n");
    }

    #[test]
    fn test_no_prompt_in_batch_mode() {
        let t = batch(StaticResolver::new());
        let reader = SlowReader {
            chunks: VecDeque::from(vec![(Duration::from_millis(50), b"x\n".to_vec())]),
        };
        let mut out = Vec::new();
        let stats = t.translate(reader, &mut out).unwrap();
        assert_eq!(out, b"x\n".to_vec());
        assert_eq!(stats.prompts, 0);
    }

    #[test]
    fn test_line_split_across_reads() {
        let t = batch(hosts(&[("192.168.1.10", "nas")]));
        let reader = SlowReader {
            chunks: VecDeque::from(vec![
                (Duration::ZERO, b"copy to 192.16".to_vec()),
                (Duration::from_millis(5), b"8.1.10 done\n".to_vec()),
            ]),
        };
        let mut out = Vec::new();
        t.translate(reader, &mut out).unwrap();
        assert_eq!(out, b"copy to nas done\n".to_vec());
    }

    #[test]
    fn test_translate_buffer_matches_stream() {
        let t = batch(from_fn(|a: Ipv4Addr| Ok(vec![format!("h{}", a.octets()[3])])));
        let input = b"a 1.1.1.1\r\nb 2.2.2.2 c\nd 3.3.3.3";
        let (out, stats) = t.translate_buffer(input);
        // 行尾 `\r` 在分帧前结束地址，原样保留在主机名之后
        assert_eq!(out, b"a h1\r\nb h2 c\nd h3\n".to_vec());
        assert_eq!(stats.lines, 3);
        assert_eq!(stats.resolved, 3);

        let mut streamed = Vec::new();
        t.translate(Cursor::new(input.to_vec()), &mut streamed).unwrap();
        assert_eq!(streamed, out);
    }
}
