use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use iptrans_core::{Config, ResolveError, Resolver, TranslateStats, Translator};
use std::fs::File;
use std::io::{self, Read, Write};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::{error, info};

/// 命令行入口（基于 clap）
#[derive(Parser, Debug)]
#[command(name = "iptrans", version, about = "Rewrite IPv4 addresses in a text stream into reverse-DNS hostnames")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// 解析器相关参数（覆盖配置文件）
#[derive(Args, Debug)]
struct ResolverArgs {
    /// 配置文件（TOML），默认读取 ./iptrans.toml（存在时）
    #[arg(long)]
    config: Option<PathBuf>,

    /// 不使用系统反查（只用 [hosts] 静态映射）
    #[arg(long)]
    no_system: bool,

    /// 不缓存反查结果
    #[arg(long)]
    no_cache: bool,

    /// 单次反查超时（毫秒）
    #[arg(long)]
    timeout_ms: Option<u64>,
}

/// 流翻译参数
#[derive(Args, Debug)]
struct TranslateArgs {
    #[command(flatten)]
    resolver: ResolverArgs,

    /// 交互提示符：等待输入超过轮询间隔时输出一次
    #[arg(long)]
    prompt: Option<String>,

    /// 等待输入时的轮询间隔（毫秒）
    #[arg(long)]
    poll_ms: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 翻译文件或标准输入，写到标准输出
    Pipe {
        #[command(flatten)]
        args: TranslateArgs,

        /// 输入文件；缺省为标准输入
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// 启动子进程（如 `ssh user@host`），翻译其标准输出
    Exec {
        #[command(flatten)]
        args: TranslateArgs,

        /// 要执行的程序及其参数
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// 对给定地址执行一次反查并打印结果
    Lookup {
        #[command(flatten)]
        args: ResolverArgs,

        addrs: Vec<String>,
    },
}

fn main() -> Result<()> {
    // 初始化日志（支持通过 RUST_LOG 控制等级，例如 info、debug）
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Pipe { args, input } => {
            let config = load_config(&args)?;
            let source: Box<dyn Read + Send> = match &input {
                Some(path) => Box::new(File::open(path).with_context(|| format!("open input {}", path.display()))?),
                None => Box::new(io::stdin()),
            };
            info!(?input, "starting translation");
            let stats = translate(&config, source)?;
            log_stats(&stats);
        }
        Commands::Exec { args, command } => {
            let config = load_config(&args)?;
            let code = exec(&config, &command)?;
            std::process::exit(code);
        }
        Commands::Lookup { args, addrs } => {
            let config = load_resolver_config(&args)?;
            lookup(&config, &addrs)?;
        }
    }

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    // 日志写到 stderr，stdout 只承载翻译后的文本
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// 加载配置文件，并用命令行参数覆盖解析器相关字段
fn load_resolver_config(args: &ResolverArgs) -> Result<Config> {
    let mut config = Config::load_or_default(args.config.as_deref())?;
    if args.no_system {
        config.resolver.system = false;
    }
    if args.no_cache {
        config.resolver.cache = false;
    }
    if let Some(ms) = args.timeout_ms {
        config.resolver.timeout_ms = Some(ms);
    }
    Ok(config)
}

fn load_config(args: &TranslateArgs) -> Result<Config> {
    let mut config = load_resolver_config(&args.resolver)?;
    if let Some(prompt) = &args.prompt {
        config.translate.prompt = Some(prompt.clone());
    }
    if let Some(ms) = args.poll_ms {
        config.translate.poll_interval_ms = ms;
    }
    Ok(config)
}

fn translate<I>(config: &Config, input: I) -> Result<TranslateStats>
where
    I: Read + Send + 'static,
{
    let translator = Translator::new(config.build_resolver()?, config.translate_options());
    let mut out = io::stdout().lock();
    let stats = translator.translate(input, &mut out).context("translate stream")?;
    out.flush().ok();
    Ok(stats)
}

/// 子进程继承 stdin/stderr，stdout 经翻译后输出；返回子进程退出码
fn exec(config: &Config, command: &[String]) -> Result<i32> {
    let (program, rest) = match command.split_first() {
        Some(split) => split,
        None => bail!("no program given"),
    };
    info!(%program, args = ?rest, "spawning child");

    let mut child = Command::new(program)
        .args(rest)
        .stdin(Stdio::inherit())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .with_context(|| format!("spawn {program}"))?;
    let stdout = child.stdout.take().context("child stdout not captured")?;

    let stats = match translate(config, stdout) {
        Ok(stats) => stats,
        Err(e) => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(e);
        }
    };
    log_stats(&stats);

    let status = child.wait().context("wait for child")?;
    info!(%status, "child exited");
    Ok(status.code().unwrap_or(1))
}

fn lookup(config: &Config, addrs: &[String]) -> Result<()> {
    let resolver = config.build_resolver()?;
    let mut out = io::stdout().lock();
    for raw in addrs {
        let addr: Ipv4Addr = match raw.parse() {
            Ok(a) => a,
            Err(_) => {
                error!(addr = %raw, "not an IPv4 address");
                writeln!(out, "{raw} -> (invalid)")?;
                continue;
            }
        };
        let answer = resolver.resolve(addr);
        if let Err(e) = &answer {
            error!(%addr, error = %e, "lookup failed");
        }
        writeln!(out, "{}", lookup_line(addr, &answer))?;
    }
    Ok(())
}

/// 与扫描器一致：只取第一个主机名，空名视为无结果
fn lookup_line(addr: Ipv4Addr, answer: &Result<Vec<String>, ResolveError>) -> String {
    match answer {
        Ok(names) => match names.first().filter(|n| !n.is_empty()) {
            Some(name) => format!("{addr} -> {name}"),
            None => format!("{addr} -> (none)"),
        },
        Err(_) => format!("{addr} -> (none)"),
    }
}

fn log_stats(stats: &TranslateStats) {
    info!(
        lines = stats.lines,
        candidates = stats.candidates,
        resolved = stats.resolved,
        unresolved = stats.unresolved,
        "translation finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_line_prints_first_name_only() {
        let addr: Ipv4Addr = "10.0.0.2".parse().unwrap();
        let answer = Ok(vec!["first".to_string(), "second".to_string()]);
        assert_eq!(lookup_line(addr, &answer), "10.0.0.2 -> first");
    }

    #[test]
    fn test_lookup_line_without_name() {
        let addr: Ipv4Addr = "10.0.0.3".parse().unwrap();
        assert_eq!(lookup_line(addr, &Ok(Vec::new())), "10.0.0.3 -> (none)");
        assert_eq!(lookup_line(addr, &Ok(vec![String::new()])), "10.0.0.3 -> (none)");
        assert_eq!(lookup_line(addr, &Err(ResolveError::WorkerGone)), "10.0.0.3 -> (none)");
    }
}
