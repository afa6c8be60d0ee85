//! In-memory device for tests
//!
//! Registers, availability and response faults are scripted through a
//! [`MockDevice`] handle shared with every link the connector opens.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{Connector, Link, TransportError};
use crate::drivers::RegisterTable;

#[derive(Debug)]
struct DeviceState {
    registers: HashMap<u16, u16>,
    online: bool,
    truncate: bool,
    /// Addresses that answer with an exception
    rejected: Vec<u16>,
    connects: usize,
    closes: usize,
    reads: Vec<u16>,
    writes: Vec<(u16, Vec<u16>)>,
}

#[derive(Clone, Debug)]
pub struct MockDevice {
    state: Arc<Mutex<DeviceState>>,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDevice {
    pub fn new() -> Self {
        MockDevice {
            state: Arc::new(Mutex::new(DeviceState {
                registers: HashMap::new(),
                online: true,
                truncate: false,
                rejected: Vec::new(),
                connects: 0,
                closes: 0,
                reads: Vec::new(),
                writes: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap()
    }

    pub fn connector(&self) -> MockConnector {
        MockConnector {
            device: self.clone(),
        }
    }

    pub fn set_register(&self, address: u16, value: u16) {
        self.lock().registers.insert(address, value);
    }

    pub fn set_registers(&self, address: u16, values: &[u16]) {
        for (offset, value) in values.iter().enumerate() {
            self.set_register(address + offset as u16, *value);
        }
    }

    pub fn register(&self, address: u16) -> Option<u16> {
        self.lock().registers.get(&address).copied()
    }

    pub fn set_online(&self, online: bool) {
        self.lock().online = online;
    }

    pub fn truncate_responses(&self, truncate: bool) {
        self.lock().truncate = truncate;
    }

    pub fn reject(&self, address: u16) {
        self.lock().rejected.push(address);
    }

    pub fn connects(&self) -> usize {
        self.lock().connects
    }

    pub fn closes(&self) -> usize {
        self.lock().closes
    }

    /// Start addresses of every read that reached the device
    pub fn reads(&self) -> Vec<u16> {
        self.lock().reads.clone()
    }

    pub fn reset_reads(&self) {
        self.lock().reads.clear();
    }

    pub fn writes(&self) -> Vec<(u16, Vec<u16>)> {
        self.lock().writes.clone()
    }
}

pub struct MockConnector {
    device: MockDevice,
}

impl Connector for MockConnector {
    type Link = MockLink;

    async fn connect(&self) -> Result<MockLink, TransportError> {
        let mut state = self.device.lock();
        if !state.online {
            return Err(TransportError::Connection("connection refused".to_string()));
        }
        state.connects += 1;
        Ok(MockLink {
            device: self.device.clone(),
        })
    }

    fn describe(&self) -> String {
        "mock:502/1".to_string()
    }
}

pub struct MockLink {
    device: MockDevice,
}

impl Link for MockLink {
    async fn read(
        &mut self,
        _table: RegisterTable,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, TransportError> {
        let mut state = self.device.lock();
        if !state.online {
            return Err(TransportError::Connection("broken pipe".to_string()));
        }
        state.reads.push(address);
        if state.rejected.contains(&address) {
            return Err(TransportError::Exception("IllegalDataAddress".to_string()));
        }
        let mut words = (address..address + count)
            .map(|a| state.registers.get(&a).copied())
            .collect::<Option<Vec<u16>>>()
            .ok_or_else(|| TransportError::Exception("IllegalDataAddress".to_string()))?;
        if state.truncate {
            words.pop();
        }
        Ok(words)
    }

    async fn write(&mut self, address: u16, words: &[u16]) -> Result<(), TransportError> {
        let mut state = self.device.lock();
        if !state.online {
            return Err(TransportError::Connection("broken pipe".to_string()));
        }
        for (offset, word) in words.iter().enumerate() {
            state.registers.insert(address + offset as u16, *word);
        }
        state.writes.push((address, words.to_vec()));
        Ok(())
    }

    async fn close(&mut self) {
        self.device.lock().closes += 1;
    }
}
