//! Reader lifecycle driven by configuration.

use std::collections::BTreeMap;
use std::sync::Arc;

use telehub_frame::SharedNodeTable;
use telehub_reader::{spawn_reader, FrameSender, LoopConfig, ReaderHandle, ReaderInit};
use tracing::{debug, error, info, warn};

use crate::config::HubConfig;

struct RunningReader {
    init: ReaderInit,
    handle: ReaderHandle,
}

/// The set of running readers and the node table they share.
pub struct Hub {
    nodes: SharedNodeTable,
    queue: FrameSender,
    loop_config: LoopConfig,
    readers: BTreeMap<String, RunningReader>,
}

impl Hub {
    pub fn new(queue: FrameSender, loop_config: LoopConfig) -> Self {
        Self {
            nodes: SharedNodeTable::default(),
            queue,
            loop_config,
            readers: BTreeMap::new(),
        }
    }

    /// Bring the running readers in line with `config`.
    ///
    /// Readers missing from the configuration are stopped. Readers whose
    /// type or init settings changed are recreated. All others receive the
    /// new runtime settings. A reader that fails to start is logged and
    /// skipped.
    pub fn apply(&mut self, config: &HubConfig) {
        self.nodes.replace(config.nodes.clone());
        debug!(nodes = config.nodes.len(), "node table updated");

        let mut wanted = BTreeMap::new();
        for (name, section) in &config.readers {
            match section.reader_init() {
                Ok(Some(init)) => {
                    wanted.insert(name.as_str(), (init, section));
                }
                Ok(None) => debug!(reader = %name, "no type, ignoring reader"),
                Err(err) => error!(reader = %name, error = %err, "invalid reader configuration"),
            }
        }

        let stale: Vec<String> = self
            .readers
            .iter()
            .filter(|(name, running)| {
                wanted
                    .get(name.as_str())
                    .is_none_or(|(init, _)| *init != running.init)
            })
            .map(|(name, _)| name.clone())
            .collect();
        for name in stale {
            if let Some(running) = self.readers.remove(&name) {
                info!(reader = %name, "stopping reader");
                running.handle.stop();
            }
        }

        for (name, (init, section)) in wanted {
            if let Some(running) = self.readers.get(name) {
                if !running.handle.update_settings(section.runtime.clone()) {
                    warn!(reader = %name, "reader loop has exited");
                }
                continue;
            }

            let mut reader = match init.open(name, Arc::new(self.nodes.clone())) {
                Ok(reader) => reader,
                Err(err) => {
                    error!(reader = %name, kind = %init.kind(), error = %err, "failed to create reader");
                    continue;
                }
            };
            reader.apply_settings(&section.runtime);

            match spawn_reader(reader, self.queue.clone(), self.loop_config) {
                Ok(handle) => {
                    info!(reader = %name, kind = %init.kind(), "reader started");
                    self.readers
                        .insert(name.to_string(), RunningReader { init, handle });
                }
                Err(err) => error!(reader = %name, error = %err, "failed to start reader thread"),
            }
        }
    }

    pub fn reader_names(&self) -> Vec<&str> {
        self.readers.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.readers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }

    pub fn nodes(&self) -> &SharedNodeTable {
        &self.nodes
    }

    /// Stop every reader and wait for its loop to exit.
    pub fn shutdown(&mut self) {
        for (name, running) in std::mem::take(&mut self.readers) {
            debug!(reader = %name, "stopping reader");
            running.handle.stop();
        }
    }
}

impl Drop for Hub {
    fn drop(&mut self) {
        self.shutdown();
    }
}
