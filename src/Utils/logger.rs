use crate::numerical::optimization::errors::OptimizationError;
use chrono::Local;
use simplelog::{
    ColorChoice, CombinedLogger, Config, LevelFilter, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};
use std::fs::File;

/// Map a solver loglevel string onto a level filter.
/// "off" and "none" switch logging off and give `None`.
pub fn parse_loglevel(level: &str) -> Result<Option<LevelFilter>, OptimizationError> {
    let filter = match level.to_lowercase().as_str() {
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        "off" | "none" => return Ok(None),
        other => {
            return Err(OptimizationError::InvalidParameters(format!(
                "loglevel must be debug, info, warn, error, off or none, got {}",
                other
            )));
        }
    };
    Ok(Some(filter))
}

/// Install the terminal logger (and a timestamped log_<date>.txt file logger
/// when `log_to_file` is set). Returns Ok(true) if this call installed the
/// global logger, Ok(false) if logging is off or a logger was already there.
pub fn init_logger(loglevel: Option<&str>, log_to_file: bool) -> Result<bool, OptimizationError> {
    let log_option = match loglevel {
        Some(level) => match parse_loglevel(level)? {
            Some(filter) => filter,
            None => return Ok(false),
        },
        None => LevelFilter::Info,
    };

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        log_option,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];
    if log_to_file {
        let date_and_time = Local::now().format("%Y-%m-%d_%H-%M-%S");
        let name = format!("log_{}.txt", date_and_time);
        let file = File::create(&name)
            .map_err(|e| OptimizationError::Logger(format!("cannot create {}: {}", name, e)))?;
        loggers.push(WriteLogger::new(log_option, Config::default(), file));
    }

    // a second init in the same process is not an error for the solvers
    match CombinedLogger::init(loggers) {
        Ok(()) => Ok(true),
        Err(_) => Ok(false),
    }
}
