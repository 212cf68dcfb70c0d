//! 输入泵：后台线程读取字节流，经有界通道交给翻译循环
//!
//! 读取可能无限期阻塞（交互会话），放到独立线程后主循环才能带超时等待，
//! 从而在“暂无完整行”时输出提示符。
use std::io::{self, Read};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel as channel;

/// 单次读取的最大字节数
const READ_CHUNK: usize = 8 * 1024;
/// 通道深度（读线程最多领先的块数）
const PUMP_DEPTH: usize = 64;

/// 读线程 → 翻译循环的消息
#[derive(Debug)]
pub(crate) enum Chunk {
    Data(Vec<u8>),
    Eof,
    Failed(io::Error),
}

pub(crate) struct InputPump {
    rx: channel::Receiver<Chunk>,
    handle: Option<JoinHandle<()>>,
}

impl InputPump {
    pub(crate) fn spawn<R>(mut input: R) -> io::Result<Self>
    where
        R: Read + Send + 'static,
    {
        let (tx, rx) = channel::bounded::<Chunk>(PUMP_DEPTH);
        let handle = thread::Builder::new()
            .name("iptrans-input".into())
            .spawn(move || {
                let mut buf = vec![0u8; READ_CHUNK];
                loop {
                    let msg = match input.read(&mut buf) {
                        Ok(0) => Chunk::Eof,
                        Ok(n) => Chunk::Data(buf[..n].to_vec()),
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(e) => Chunk::Failed(e),
                    };
                    let last = !matches!(msg, Chunk::Data(_));
                    // 接收端已丢弃（翻译循环出错退出）时直接结束
                    if tx.send(msg).is_err() || last {
                        break;
                    }
                }
            })?;
        Ok(Self { rx, handle: Some(handle) })
    }

    /// 等待下一块；`wait` 为 None 时一直阻塞，超时返回 None
    pub(crate) fn recv(&self, wait: Option<Duration>) -> Option<Chunk> {
        let res = match wait {
            Some(d) => match self.rx.recv_timeout(d) {
                Ok(chunk) => Ok(chunk),
                Err(channel::RecvTimeoutError::Timeout) => return None,
                Err(channel::RecvTimeoutError::Disconnected) => Err(()),
            },
            None => self.rx.recv().map_err(|_| ()),
        };
        // 读线程异常退出（未发送 Eof 即断开）
        Some(res.unwrap_or_else(|()| {
            Chunk::Failed(io::Error::new(io::ErrorKind::BrokenPipe, "input reader stopped"))
        }))
    }

    /// 正常结束后回收读线程（读线程已发送 Eof，不会阻塞）
    pub(crate) fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
