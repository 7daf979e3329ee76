use std::panic;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const DEFAULT_FILTER: &str = "info";

/// Logging settings shared by every binary in the workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// `EnvFilter` directives; `RUST_LOG` wins when set.
    pub filter: String,
    /// Directory for daily-rotated log files (`AR_LOG_DIR`). Stdout when unset.
    pub dir: Option<PathBuf>,
    /// Also run the default panic hook, which prints a backtrace when enabled.
    pub include_backtrace: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.into(),
            dir: None,
            include_backtrace: false,
        }
    }
}

impl LogConfig {
    pub fn from_env() -> Self {
        Self {
            filter: std::env::var("RUST_LOG")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_FILTER.into()),
            dir: std::env::var_os("AR_LOG_DIR").map(PathBuf::from),
            include_backtrace: std::env::var("AR_LOG_INCLUDE_BACKTRACE")
                .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }
}

/// Routes panics through `tracing` with thread and location context.
/// The hook is installed once per process.
pub fn install_tracing_panic_hook(app_name: &'static str, include_backtrace: bool) {
    static INSTALLED: OnceLock<()> = OnceLock::new();

    INSTALLED.get_or_init(|| {
        let default_hook = panic::take_hook();

        panic::set_hook(Box::new(move |info| {
            let thread = std::thread::current();
            let thread_name = thread.name().unwrap_or("unknown");
            let location = info
                .location()
                .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()));
            let message = info
                .payload()
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| info.payload().downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic payload not string".into());

            tracing::error!(
                application = app_name,
                %thread_name,
                location = location.as_deref().unwrap_or("unknown"),
                panic_message = %message,
                "panic captured"
            );

            if include_backtrace {
                default_hook(info);
            }
        }));
    });
}

fn rotating_file_writer(app_name: &str, dir: &Path) -> Option<BoxMakeWriter> {
    if let Err(err) = std::fs::create_dir_all(dir) {
        eprintln!("failed to create log directory {}: {err}; logging to stdout", dir.display());
        return None;
    }

    let appender = tracing_appender::rolling::daily(dir, format!("{app_name}.log"));
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);
    let _ = LOG_GUARD.set(guard);
    Some(BoxMakeWriter::new(non_blocking))
}

/// Installs the global subscriber and panic hook for `app_name`.
///
/// Safe to call more than once; later calls leave the first subscriber active.
pub fn init(app_name: &'static str, config: &LogConfig) {
    let env_filter =
        EnvFilter::try_new(&config.filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter);

    let writer = config
        .dir
        .as_ref()
        .and_then(|dir| rotating_file_writer(app_name, dir));
    let _ = match writer {
        Some(writer) => builder.with_writer(writer).try_init(),
        None => builder.try_init(),
    };

    install_tracing_panic_hook(app_name, config.include_backtrace);
}
