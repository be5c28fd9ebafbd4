// 工具函数
// 本地数据目录与日志初始化

use log::LevelFilter;
use std::path::PathBuf;

const APP_DIR_NAME: &str = "dsa-sheet-tracker";

/// 本地数据目录，取不到平台目录时退回临时目录
pub fn get_app_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR_NAME)
}

pub fn get_database_path() -> PathBuf {
    let mut path = get_app_data_dir();
    path.push("tracker.db");
    path
}

/// 解析日志级别，无法识别时使用 Info
pub fn log_level_from_str(level: &str) -> LevelFilter {
    match level.trim().to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" | "warning" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

/// 安装全局日志输出到标准输出，重复安装返回错误
pub fn init_logging(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        // 压低 HTTP 依赖的日志
        .level_for("hyper", LevelFilter::Warn)
        .level_for("reqwest", LevelFilter::Warn)
        .chain(std::io::stdout())
        .apply()
}
