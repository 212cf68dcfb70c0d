//! 反向解析（PTR）能力：trait + 系统/静态/链式/缓存/超时实现
//!
//! 扫描器只依赖 `Resolver` trait，构造时注入：
//! - 生产环境：`SystemResolver`（dns-lookup，阻塞调用）
//! - 测试/配置：`StaticResolver`、`FnResolver`
//! - 组合：`ChainResolver` → `TimeoutResolver` → `CachedResolver`

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use crossbeam_channel as channel;
use tracing::debug;

use crate::error::ResolveError;

/// 反向解析：地址 → 有序主机名列表；扫描器只取第一个
pub trait Resolver {
    fn resolve(&self, addr: Ipv4Addr) -> Result<Vec<String>, ResolveError>;
}

impl<R: Resolver + ?Sized> Resolver for &R {
    fn resolve(&self, addr: Ipv4Addr) -> Result<Vec<String>, ResolveError> {
        (**self).resolve(addr)
    }
}

impl<R: Resolver + ?Sized> Resolver for Box<R> {
    fn resolve(&self, addr: Ipv4Addr) -> Result<Vec<String>, ResolveError> {
        (**self).resolve(addr)
    }
}

impl<R: Resolver + ?Sized> Resolver for Arc<R> {
    fn resolve(&self, addr: Ipv4Addr) -> Result<Vec<String>, ResolveError> {
        (**self).resolve(addr)
    }
}

/// 闭包适配器（便于测试注入假解析器）
pub struct FnResolver<F>(F);

/// 由闭包构建解析器
pub fn from_fn<F>(f: F) -> FnResolver<F>
where
    F: Fn(Ipv4Addr) -> Result<Vec<String>, ResolveError>,
{
    FnResolver(f)
}

impl<F> Resolver for FnResolver<F>
where
    F: Fn(Ipv4Addr) -> Result<Vec<String>, ResolveError>,
{
    fn resolve(&self, addr: Ipv4Addr) -> Result<Vec<String>, ResolveError> {
        (self.0)(addr)
    }
}

/// 系统反查（getnameinfo），会阻塞调用线程
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl Resolver for SystemResolver {
    fn resolve(&self, addr: Ipv4Addr) -> Result<Vec<String>, ResolveError> {
        let name = dns_lookup::lookup_addr(&IpAddr::V4(addr))?;
        let name = name.trim_end_matches('.');
        // 部分平台在无 PTR 记录时回显数字地址本身
        if name.is_empty() || name.parse::<Ipv4Addr>().is_ok() {
            return Ok(Vec::new());
        }
        Ok(vec![name.to_string()])
    }
}

/// 固定映射（来自配置 [hosts]）
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    hosts: HashMap<Ipv4Addr, Vec<String>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个主机名（保持插入顺序）
    pub fn insert(&mut self, addr: Ipv4Addr, name: impl Into<String>) {
        self.hosts.entry(addr).or_default().push(name.into());
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(Ipv4Addr, S)> for StaticResolver {
    fn from_iter<I: IntoIterator<Item = (Ipv4Addr, S)>>(iter: I) -> Self {
        let mut out = Self::new();
        for (addr, name) in iter {
            out.insert(addr, name);
        }
        out
    }
}

impl Resolver for StaticResolver {
    fn resolve(&self, addr: Ipv4Addr) -> Result<Vec<String>, ResolveError> {
        Ok(self.hosts.get(&addr).cloned().unwrap_or_default())
    }
}

/// 按顺序尝试，第一个非空成功结果胜出
#[derive(Default)]
pub struct ChainResolver {
    links: Vec<Box<dyn Resolver + Send + Sync>>,
}

impl ChainResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<R: Resolver + Send + Sync + 'static>(&mut self, resolver: R) {
        self.links.push(Box::new(resolver));
    }
}

impl Resolver for ChainResolver {
    fn resolve(&self, addr: Ipv4Addr) -> Result<Vec<String>, ResolveError> {
        let mut last_err = None;
        let mut answered = false;
        for link in &self.links {
            match link.resolve(addr) {
                Ok(names) if !names.is_empty() => return Ok(names),
                Ok(_) => answered = true,
                Err(e) => {
                    debug!(%addr, error = %e, "resolver link failed, trying next");
                    last_err = Some(e);
                }
            }
        }
        // 全部链路都出错才报告错误；任一链路给出“空”即视为无名
        match last_err {
            Some(e) if !answered => Err(e),
            _ => Ok(Vec::new()),
        }
    }
}

/// 进程内缓存：成功结果与空结果均缓存，错误不缓存
///
/// 不做淘汰：条目数随出现过的不同地址增长，直到进程退出。
pub struct CachedResolver<R> {
    inner: R,
    cache: Mutex<HashMap<Ipv4Addr, Vec<String>>>,
}

impl<R: Resolver> CachedResolver<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, cache: Mutex::new(HashMap::new()) }
    }

    pub fn cached_len(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl<R: Resolver> Resolver for CachedResolver<R> {
    fn resolve(&self, addr: Ipv4Addr) -> Result<Vec<String>, ResolveError> {
        // 快路径：先查缓存
        if let Some(names) = self.cache.lock().unwrap_or_else(PoisonError::into_inner).get(&addr).cloned() {
            return Ok(names);
        }
        // 查询期间不持锁，避免慢查询阻塞其他调用方
        let names = self.inner.resolve(addr)?;
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(addr, names.clone());
        Ok(names)
    }
}

/// 超时包装：在后台线程执行查询，超过期限即放弃（迟到的结果被丢弃）
pub struct TimeoutResolver<R> {
    inner: Arc<R>,
    timeout: Duration,
}

impl<R> TimeoutResolver<R>
where
    R: Resolver + Send + Sync + 'static,
{
    pub fn new(inner: R, timeout: Duration) -> Self {
        Self { inner: Arc::new(inner), timeout }
    }
}

impl<R> Resolver for TimeoutResolver<R>
where
    R: Resolver + Send + Sync + 'static,
{
    fn resolve(&self, addr: Ipv4Addr) -> Result<Vec<String>, ResolveError> {
        let (tx, rx) = channel::bounded(1);
        let inner = Arc::clone(&self.inner);
        thread::Builder::new()
            .name("iptrans-resolve".into())
            .spawn(move || {
                let _ = tx.send(inner.resolve(addr));
            })?;

        match rx.recv_timeout(self.timeout) {
            Ok(res) => res,
            Err(channel::RecvTimeoutError::Timeout) => {
                debug!(%addr, timeout = ?self.timeout, "reverse lookup timed out");
                Err(ResolveError::TimedOut(self.timeout))
            }
            Err(channel::RecvTimeoutError::Disconnected) => Err(ResolveError::WorkerGone),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::io;

    fn addr(s: &str) -> Ipv4Addr {
        s.parse().unwrap()
    }

    #[test]
    fn test_static_keeps_insert_order() {
        let mut r = StaticResolver::new();
        r.insert(addr("10.0.0.1"), "a");
        r.insert(addr("10.0.0.1"), "b");
        assert_eq!(r.resolve(addr("10.0.0.1")).unwrap(), vec!["a", "b"]);
        assert!(r.resolve(addr("10.0.0.2")).unwrap().is_empty());
    }

    #[test]
    fn test_chain_first_non_empty_wins() {
        let mut chain = ChainResolver::new();
        chain.push(StaticResolver::new());
        chain.push(from_fn(|_| Err(ResolveError::Lookup(io::Error::new(io::ErrorKind::Other, "boom")))));
        chain.push(StaticResolver::from_iter([(addr("1.2.3.4"), "found")]));
        chain.push(StaticResolver::from_iter([(addr("1.2.3.4"), "later")]));
        assert_eq!(chain.resolve(addr("1.2.3.4")).unwrap(), vec!["found"]);
        assert!(chain.resolve(addr("4.3.2.1")).unwrap().is_empty());
    }

    #[test]
    fn test_chain_all_errors_propagate() {
        let mut chain = ChainResolver::new();
        chain.push(from_fn(|_| Err(ResolveError::WorkerGone)));
        chain.push(from_fn(|_| Err(ResolveError::WorkerGone)));
        assert!(matches!(chain.resolve(addr("1.1.1.1")), Err(ResolveError::WorkerGone)));
    }

    #[test]
    fn test_cache_hits_skip_inner() {
        let calls = Cell::new(0);
        let inner = from_fn(|a: Ipv4Addr| {
            calls.set(calls.get() + 1);
            if a.octets()[3] == 1 { Ok(vec!["one".to_string()]) } else { Ok(Vec::new()) }
        });
        let cached = CachedResolver::new(inner);
        for _ in 0..3 {
            assert_eq!(cached.resolve(addr("10.0.0.1")).unwrap(), vec!["one"]);
            assert!(cached.resolve(addr("10.0.0.2")).unwrap().is_empty());
        }
        assert_eq!(calls.get(), 2);
        assert_eq!(cached.cached_len(), 2);
    }

    #[test]
    fn test_cache_grows_per_distinct_address() {
        let cached = CachedResolver::new(from_fn(|a: Ipv4Addr| Ok(vec![format!("h{}", a.octets()[3])])));
        for last in 1..=50u8 {
            cached.resolve(Ipv4Addr::new(10, 0, 0, last)).unwrap();
            cached.resolve(Ipv4Addr::new(10, 0, 0, last)).unwrap();
            assert_eq!(cached.cached_len(), usize::from(last));
        }
    }

    #[test]
    fn test_cache_does_not_store_errors() {
        let calls = Cell::new(0);
        let inner = from_fn(|_| {
            calls.set(calls.get() + 1);
            Err(ResolveError::WorkerGone)
        });
        let cached = CachedResolver::new(inner);
        assert!(cached.resolve(addr("10.0.0.1")).is_err());
        assert!(cached.resolve(addr("10.0.0.1")).is_err());
        assert_eq!(calls.get(), 2);
        assert_eq!(cached.cached_len(), 0);
    }

    #[test]
    fn test_timeout_gives_up() {
        let slow = from_fn(|_| {
            thread::sleep(Duration::from_millis(500));
            Ok(vec!["late".to_string()])
        });
        let r = TimeoutResolver::new(slow, Duration::from_millis(20));
        assert!(matches!(r.resolve(addr("10.0.0.1")), Err(ResolveError::TimedOut(_))));
    }

    #[test]
    fn test_timeout_passes_fast_answer() {
        let fast = StaticResolver::from_iter([(addr("10.0.0.1"), "quick")]);
        let r = TimeoutResolver::new(fast, Duration::from_secs(5));
        assert_eq!(r.resolve(addr("10.0.0.1")).unwrap(), vec!["quick"]);
    }
}
