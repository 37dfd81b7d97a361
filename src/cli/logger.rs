use indicatif::ProgressBar;
use log::{Level, LevelFilter, Metadata, Record};
use tokio::sync::{mpsc, oneshot};

/// 本 crate 的日志 target 前缀
const CRATE_TARGET: &str = env!("CARGO_CRATE_NAME");

/// 控制指令
#[derive(Debug)]
enum ControlCommand {
    Set(ProgressBar),
    Clear,
    /// 输出队列中已有的日志后回复
    Flush(oneshot::Sender<()>),
}

/// 日志控制器
///
/// 持有控制通道的发送端，在 main 中初始化后传递给 runner
#[derive(Clone)]
pub struct LogController {
    tx: mpsc::Sender<ControlCommand>,
}

impl LogController {
    /// 设置进度条，之后的日志通过进度条输出
    pub async fn set_progress_bar(&self, progress_bar: ProgressBar) {
        let _ = self.tx.send(ControlCommand::Set(progress_bar)).await;
    }

    /// 清除进度条
    pub async fn clear_progress_bar(&self) {
        let _ = self.tx.send(ControlCommand::Clear).await;
    }

    /// 等待此前记录的日志全部输出
    ///
    /// `std::process::exit` 不会等待后台 actor，退出前需要调用
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(ControlCommand::Flush(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
    }
}

/// 把日志记录转发给后台 actor 的 Logger
struct TokioLogger {
    tx: mpsc::UnboundedSender<String>,
}

impl TokioLogger {
    /// 第三方 crate（reqwest、hyper 等）只输出 INFO 及以上
    fn accepts(metadata: &Metadata) -> bool {
        if metadata.level() > log::max_level() {
            return false;
        }
        metadata.level() <= Level::Info || metadata.target().starts_with(CRATE_TARGET)
    }
}

fn format_record(level: Level, args: &std::fmt::Arguments) -> String {
    let level_str = match level {
        Level::Error => "\x1b[31m[ERROR]\x1b[0m",
        Level::Warn => "\x1b[33m[WARN]\x1b[0m",
        Level::Info => "\x1b[32m[INFO]\x1b[0m",
        Level::Debug => "\x1b[36m[DEBUG]\x1b[0m",
        Level::Trace => "\x1b[90m[TRACE]\x1b[0m",
    };
    format!("{} {}", level_str, args)
}

impl log::Log for TokioLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        Self::accepts(metadata)
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let _ = self.tx.send(format_record(record.level(), record.args()));
    }

    fn flush(&self) {}
}

fn print_line(pb: Option<&ProgressBar>, msg: String) {
    match pb {
        Some(pb) => pb.println(msg),
        None => eprintln!("{}", msg),
    }
}

/// 后台 actor：有进度条时经由进度条打印，否则写 stderr
async fn logger_actor<E>(
    mut log_rx: mpsc::UnboundedReceiver<String>,
    mut ctrl_rx: mpsc::Receiver<ControlCommand>,
    mut emit: E,
) where
    E: FnMut(Option<&ProgressBar>, String),
{
    let mut current_pb: Option<ProgressBar> = None;

    loop {
        tokio::select! {
            Some(msg) = log_rx.recv() => emit(current_pb.as_ref(), msg),
            Some(cmd) = ctrl_rx.recv() => {
                match cmd {
                    ControlCommand::Set(pb) => current_pb = Some(pb),
                    ControlCommand::Clear => current_pb = None,
                    ControlCommand::Flush(ack) => {
                        while let Ok(msg) = log_rx.try_recv() {
                            emit(current_pb.as_ref(), msg);
                        }
                        let _ = ack.send(());
                    }
                }
            }
            else => break,
        }
    }
}

/// 初始化日志系统
///
/// 必须在 tokio 运行时内调用。返回的 Controller 需要传递给控制进度条的模块
pub fn init_logger(level: LevelFilter) -> Result<LogController, log::SetLoggerError> {
    let (log_tx, log_rx) = mpsc::unbounded_channel();
    let (ctrl_tx, ctrl_rx) = mpsc::channel(32);

    tokio::spawn(logger_actor(log_rx, ctrl_rx, print_line));

    // logger 需要 'static 生命周期
    let logger: &'static TokioLogger = Box::leak(Box::new(TokioLogger { tx: log_tx }));

    log::set_logger(logger)?;
    log::set_max_level(level);

    Ok(LogController { tx: ctrl_tx })
}
