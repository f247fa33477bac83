//! Logger initialization (spec §6.5's `log{enabled, file, level, format}`).

use std::{
    fs::OpenOptions,
    io::{IsTerminal, Write},
    str::FromStr,
    sync::Mutex,
};

use config::{LogConfig, LogFormat};
use logforth::{append::Stderr, filter::EnvFilter, layout::Layout};

fn filter(level: &str) -> EnvFilter {
    EnvFilter::from_str(level).unwrap_or_else(|_| EnvFilter::from_str("info").expect("default filter is valid"))
}

/// Build and install the process-wide logger from the loaded configuration.
pub fn init(config: &LogConfig) {
    let mut builder = logforth::builder();

    let level = config.level.clone();
    let format = config.format;
    builder = builder.dispatch(move |d| {
        let layout = TextOrJson { format };
        d.filter(filter(&level)).append(Stderr::default().with_layout(layout))
    });

    if config.enabled {
        if let Some(path) = &config.file {
            match OpenOptions::new().create(true).append(true).open(path) {
                Ok(file) => {
                    let level = config.level.clone();
                    builder = builder.dispatch(move |d| d.filter(filter(&level)).append(FileAppender::new(file, format)));
                }
                Err(err) => eprintln!("failed to open log file '{path}': {err}"),
            }
        }
    }

    builder.apply();
}

/// Text or JSON layout for the stderr appender, matching `log.format`.
#[derive(Debug)]
struct TextOrJson {
    format: LogFormat,
}

impl Layout for TextOrJson {
    fn format(
        &self,
        record: &log::Record<'_>,
        _diagnostics: &[Box<dyn logforth::diagnostic::Diagnostic>],
    ) -> anyhow::Result<Vec<u8>> {
        Ok(render(record, self.format, std::io::stderr().is_terminal()))
    }
}

fn render(record: &log::Record<'_>, format: LogFormat, color: bool) -> Vec<u8> {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    match format {
        LogFormat::Json => {
            let line = serde_json::json!({
                "timestamp": timestamp,
                "level": record.level().to_string(),
                "target": record.target(),
                "message": record.args().to_string(),
            });
            format!("{line}\n").into_bytes()
        }
        LogFormat::Text => {
            let level = if color {
                match record.level() {
                    log::Level::Error => format!("\x1b[31m{:>5}\x1b[0m", record.level()),
                    log::Level::Warn => format!("\x1b[33m{:>5}\x1b[0m", record.level()),
                    log::Level::Info => format!("\x1b[32m{:>5}\x1b[0m", record.level()),
                    log::Level::Debug => format!("\x1b[34m{:>5}\x1b[0m", record.level()),
                    log::Level::Trace => format!("\x1b[35m{:>5}\x1b[0m", record.level()),
                }
            } else {
                format!("{:>5}", record.level())
            };
            format!("{timestamp} {level} {}: {}\n", record.target(), record.args()).into_bytes()
        }
    }
}

/// Appends rendered log lines to an already-open file, ignoring the terminal color question.
struct FileAppender {
    file: Mutex<std::fs::File>,
    format: LogFormat,
}

impl FileAppender {
    fn new(file: std::fs::File, format: LogFormat) -> Self {
        Self {
            file: Mutex::new(file),
            format,
        }
    }
}

impl std::fmt::Debug for FileAppender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileAppender").finish()
    }
}

impl logforth::append::Append for FileAppender {
    fn append(
        &self,
        record: &log::Record<'_>,
        _diagnostics: &[Box<dyn logforth::diagnostic::Diagnostic>],
    ) -> anyhow::Result<()> {
        let line = render(record, self.format, false);
        let mut file = self.file.lock().expect("log file lock poisoned");
        file.write_all(&line)?;
        Ok(())
    }
}
