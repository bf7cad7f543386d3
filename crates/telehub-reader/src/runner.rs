//! One polling loop per reader.
//!
//! Each loop runs on its own named thread: apply any queued settings, read
//! and enqueue frames, sleep one tick, run the periodic action. The loop
//! only ends when its stop flag is raised.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use telehub_frame::DecodedFrame;
use tracing::{debug, info, warn};

use crate::reader::Reader;
use crate::settings::SettingsMap;

/// Producer side of the shared frame queue.
pub type FrameSender = Sender<DecodedFrame>;

/// Consumer side of the shared frame queue.
pub type FrameReceiver = Receiver<DecodedFrame>;

/// Create the queue all reader loops feed.
pub fn frame_queue() -> (FrameSender, FrameReceiver) {
    mpsc::channel()
}

/// Loop pacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopConfig {
    /// Sleep between iterations.
    pub tick: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(100),
        }
    }
}

/// Control handle for a running reader loop.
///
/// Dropping the handle stops the loop and waits for it.
pub struct ReaderHandle {
    name: String,
    stop: Arc<AtomicBool>,
    settings: Sender<SettingsMap>,
    thread: Option<JoinHandle<()>>,
}

impl ReaderHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue a settings map; the loop applies it before its next read.
    ///
    /// Returns `false` if the loop has already exited.
    pub fn update_settings(&self, settings: SettingsMap) -> bool {
        self.settings.send(settings).is_ok()
    }

    /// Ask the loop to exit after its current iteration.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Stop the loop and wait for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.request_stop();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!(reader = %self.name, "reader loop panicked");
            }
        }
    }
}

impl Drop for ReaderHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Start `reader` on its own thread, feeding `queue`.
pub fn spawn_reader(
    reader: Box<dyn Reader>,
    queue: FrameSender,
    config: LoopConfig,
) -> io::Result<ReaderHandle> {
    let name = reader.name().to_string();
    let stop = Arc::new(AtomicBool::new(false));
    let (settings_tx, settings_rx) = mpsc::channel();

    let thread = thread::Builder::new().name(format!("reader-{name}")).spawn({
        let stop = Arc::clone(&stop);
        move || run_loop(reader, &stop, &settings_rx, &queue, config)
    })?;

    Ok(ReaderHandle {
        name,
        stop,
        settings: settings_tx,
        thread: Some(thread),
    })
}

fn run_loop(
    mut reader: Box<dyn Reader>,
    stop: &AtomicBool,
    settings: &Receiver<SettingsMap>,
    queue: &FrameSender,
    config: LoopConfig,
) {
    info!(reader = %reader.name(), "reader loop started");
    let mut queue_closed = false;

    while !stop.load(Ordering::Acquire) {
        loop {
            match settings.try_recv() {
                Ok(candidate) => {
                    let report = reader.apply_settings(&candidate);
                    debug!(
                        reader = %reader.name(),
                        changed = ?report.changed,
                        rejected = report.rejected.len(),
                        "settings applied"
                    );
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }

        for frame in reader.read() {
            if queue.send(frame).is_err() && !queue_closed {
                warn!(reader = %reader.name(), "frame queue closed, dropping frames");
                queue_closed = true;
            }
        }

        thread::sleep(config.tick);
        reader.periodic_action();
    }

    info!(reader = %reader.name(), "reader loop stopped");
}
