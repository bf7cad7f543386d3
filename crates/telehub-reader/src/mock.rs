//! Scripted transports shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex};

use telehub_transport::{I2cBus, SerialLink, TransportError};

#[derive(Default)]
pub struct LinkState {
    pub incoming: VecDeque<Vec<u8>>,
    pub written: Vec<String>,
    pub fail_writes: bool,
    pub discarded: usize,
}

/// Serial link whose state stays visible to the test after it is moved.
#[derive(Clone, Default)]
pub struct ScriptedLink {
    pub state: Arc<Mutex<LinkState>>,
}

impl ScriptedLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, bytes: &[u8]) {
        self.state.lock().unwrap().incoming.push_back(bytes.to_vec());
    }

    pub fn written(&self) -> Vec<String> {
        self.state.lock().unwrap().written.clone()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_writes = fail;
    }

    pub fn boxed(&self) -> Box<dyn SerialLink> {
        Box::new(self.clone())
    }
}

impl SerialLink for ScriptedLink {
    fn read_available(&mut self, buf: &mut [u8]) -> telehub_transport::Result<usize> {
        let mut state = self.state.lock().unwrap();
        let Some(mut chunk) = state.incoming.pop_front() else {
            return Ok(0);
        };
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            state.incoming.push_front(chunk.split_off(n));
        }
        Ok(n)
    }

    fn write_all(&mut self, data: &[u8]) -> telehub_transport::Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(TransportError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "scripted write failure",
            )));
        }
        state.written.push(String::from_utf8_lossy(data).into_owned());
        Ok(())
    }

    fn discard_input(&mut self) -> telehub_transport::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.incoming.clear();
        state.discarded += 1;
        Ok(())
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

#[derive(Default)]
pub struct BusState {
    pub triggers: Vec<(u16, u8)>,
    pub reads: Vec<u16>,
    pub blocks: HashMap<u16, Vec<u8>>,
    /// Remaining failing reads per address.
    pub failures: HashMap<u16, u32>,
}

#[derive(Clone, Default)]
pub struct MockBus {
    pub state: Arc<Mutex<BusState>>,
}

impl MockBus {
    pub fn with_block(self, address: u16, block: &[u8]) -> Self {
        self.state
            .lock()
            .unwrap()
            .blocks
            .insert(address, block.to_vec());
        self
    }

    pub fn failing(self, address: u16, times: u32) -> Self {
        self.state.lock().unwrap().failures.insert(address, times);
        self
    }
}

impl I2cBus for MockBus {
    fn write_byte(&mut self, address: u16, value: u8) -> telehub_transport::Result<()> {
        self.state.lock().unwrap().triggers.push((address, value));
        Ok(())
    }

    fn read_block(
        &mut self,
        address: u16,
        _register: u8,
        len: u8,
    ) -> telehub_transport::Result<Vec<u8>> {
        let mut state = self.state.lock().unwrap();
        state.reads.push(address);
        if let Some(left) = state.failures.get_mut(&address) {
            if *left > 0 {
                *left -= 1;
                return Err(TransportError::Bus {
                    address,
                    message: "remote I/O error".to_string(),
                });
            }
        }
        let block = state.blocks.get(&address).ok_or(TransportError::Bus {
            address,
            message: "no such device".to_string(),
        })?;
        Ok(block[..block.len().min(usize::from(len))].to_vec())
    }
}
