pub mod commands;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

/// 初始化日志：默认 info，`verbose` 时 debug，`RUST_LOG` 优先
pub fn init_logger(verbose: bool) {
    let level = if verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info };
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp_millis()
        .try_init();
}
