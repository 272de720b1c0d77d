use canopy_config::LoggingConfig;
use log::SetLoggerError;
use simplelog::{ColorChoice, ConfigBuilder, LevelFilter, TermLogger, TerminalMode, ThreadLogMode};

fn logger_config(config: &LoggingConfig) -> simplelog::Config {
    let mut builder = ConfigBuilder::new();
    builder.set_target_level(LevelFilter::Off);
    if config.threads {
        builder
            .set_thread_level(LevelFilter::Info)
            .set_thread_mode(ThreadLogMode::Both);
    } else {
        builder.set_thread_level(LevelFilter::Off);
    }
    if !config.timestamp {
        builder.set_time_level(LevelFilter::Off);
    }
    builder.build()
}

/// Installs a terminal logger for hosts that don't bring their own.
///
/// Does nothing when logging is disabled. Fails if a logger was already installed.
pub fn init_logger(config: &LoggingConfig) -> Result<(), SetLoggerError> {
    if !config.enabled {
        return Ok(());
    }
    let color = if config.color {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    TermLogger::init(
        config.level,
        logger_config(config),
        TerminalMode::Mixed,
        color,
    )
}
