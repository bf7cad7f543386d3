use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::time::{Duration, Instant};

use telehub::config::{ConfigWatcher, HubConfig};
use telehub::hub::Hub;
use telehub::reader::{frame_queue, LoopConfig};
use tracing::{info, warn};

use crate::cmd::RunArgs;
use crate::exit::{config_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::logging::{LogHandle, LogLevel};
use crate::output::{print_frame, OutputFormat};

/// How long the dispatcher waits on the queue before checking for reloads.
const QUEUE_WAIT: Duration = Duration::from_millis(100);

pub fn run(args: RunArgs, format: OutputFormat, logging: Option<&LogHandle>) -> CliResult<i32> {
    let mut watcher = ConfigWatcher::new(&args.config);
    let config = watcher
        .load()
        .map_err(|err| config_error("loading configuration", err))?;
    apply_log_level(&config, logging);

    let (queue, frames) = frame_queue();
    let mut hub = Hub::new(queue, LoopConfig::default());
    hub.apply(&config);
    if hub.is_empty() {
        warn!("no readers running");
    } else {
        info!(readers = ?hub.reader_names(), "hub started");
    }

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        match frames.recv_timeout(QUEUE_WAIT) {
            Ok(frame) => {
                print_frame(&frame, format);
                printed = printed.saturating_add(1);
                if args.count.is_some_and(|count| printed >= count) {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if let Some(config) = watcher.poll(Instant::now()) {
            info!(path = %watcher.path().display(), "reloading configuration");
            apply_log_level(&config, logging);
            hub.apply(&config);
        }
    }

    info!("shutting down");
    hub.shutdown();
    Ok(SUCCESS)
}

fn apply_log_level(config: &HubConfig, logging: Option<&LogHandle>) {
    let (Some(name), Some(handle)) = (config.hub.loglevel.as_deref(), logging) else {
        return;
    };
    match LogLevel::from_config(name) {
        Some(level) => {
            if let Err(err) = handle.set_level(level) {
                warn!(loglevel = %name, error = %err, "could not change log level");
            }
        }
        None => warn!(loglevel = %name, "unknown log level in configuration"),
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
