use bldb_dl::cli;
use clap::Parser;
use log::LevelFilter;

#[tokio::main]
async fn main() {
    #[cfg(not(target_env = "msvc"))]
    use mimalloc::MiMalloc;

    #[cfg(not(target_env = "msvc"))]
    #[global_allocator]
    static GLOBAL: MiMalloc = MiMalloc;

    // 解析命令行参数
    let cli = cli::Cli::parse();

    let log_level = if cli.quiet {
        LevelFilter::Warn // quiet 模式：只显示 WARN 和 ERROR
    } else if cli.verbose {
        LevelFilter::Debug // verbose 模式：显示每次尝试
    } else {
        LevelFilter::Info
    };

    let logger_ctrl = cli::init_logger(log_level)
        .map_err(|e| {
            eprintln!("警告: 无法初始化日志系统: {}", e);
        })
        .ok();

    let strict = cli.strict;
    let flush_ctrl = logger_ctrl.clone();
    let code = match cli::run(cli, logger_ctrl).await {
        Ok(report) => report.exit_code(strict),
        Err(e) => {
            eprintln!("错误: {}", e);
            1
        }
    };

    // exit 不会等待日志 actor
    if let Some(ctrl) = flush_ctrl {
        ctrl.flush().await;
    }
    std::process::exit(code);
}
