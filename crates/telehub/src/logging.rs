use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, Registry};

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }

    /// Parse a level name from the configuration file, ignoring case.
    /// `warning` is accepted as an alias for `warn`.
    pub fn from_config(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.eq_ignore_ascii_case("warning") {
            return Some(LogLevel::Warn);
        }
        <LogLevel as ValueEnum>::from_str(name, true).ok()
    }
}

/// Changes the level of the installed subscriber.
pub struct LogHandle(reload::Handle<LevelFilter, Registry>);

impl LogHandle {
    pub fn set_level(&self, level: LogLevel) -> Result<(), reload::Error> {
        self.0.modify(|filter| *filter = level.as_filter())
    }
}

/// Install the stderr subscriber. Returns `None` if one was already set.
pub fn init_logging(format: LogFormat, level: LogLevel) -> Option<LogHandle> {
    let (filter, handle) = reload::Layer::new(level.as_filter());
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match format {
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false)
                    .with_target(false)
                    .with_thread_names(true),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_thread_names(true),
            )
            .try_init(),
    };

    installed.ok().map(|()| LogHandle(handle))
}
