//! 日志初始化

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::{Result, TrafficError};

/// 安装全局 tracing subscriber
///
/// `RUST_LOG` 优先于配置中的过滤指令。重复调用时保留已安装的 subscriber。
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .map_err(|err| TrafficError::Config(format!("invalid log filter: {err}")))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
    Ok(())
}
