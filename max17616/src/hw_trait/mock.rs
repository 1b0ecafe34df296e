//! Simulated PMBus register file for tests.
//!
//! Reads return the bytes stored for the last command written without STOP.
//! Writes with STOP either record a send-command (one byte) or store the
//! payload as the new register contents. Every transaction lands in a shared
//! log so tests can count what went over the bus after the session has been
//! moved into a driver.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use super::i2c::{I2c, I2cBus, I2cConfig, I2cError};
use super::{HwError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transaction {
    Write { data: Vec<u8>, stop: bool },
    Read { command: Option<u8>, len: usize },
}

#[derive(Debug, Default)]
pub struct MockState {
    pub registers: HashMap<u8, Vec<u8>>,
    pub log: Vec<Transaction>,
    pub failing_commands: HashSet<u8>,
    pub fail_open: bool,
    pub fail_close: bool,
    pub opened: usize,
    pub closed: usize,
    pending: Option<u8>,
}

impl MockState {
    /// Commands sent as reads, in order.
    pub fn reads(&self) -> Vec<u8> {
        self.log
            .iter()
            .filter_map(|t| match t {
                Transaction::Read { command, .. } => *command,
                _ => None,
            })
            .collect()
    }

    /// Payloads written with STOP, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.log
            .iter()
            .filter_map(|t| match t {
                Transaction::Write { data, stop: true } => Some(data.clone()),
                _ => None,
            })
            .collect()
    }
}

/// Handle shared between a test and the sessions it hands out.
#[derive(Debug, Clone, Default)]
pub struct MockBus {
    state: Rc<RefCell<MockState>>,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// A bus that answers the identification sequence for `device_id`.
    pub fn with_identity(device_id: &str) -> Self {
        let bus = Self::new();
        bus.set_block(0x99, b"MAXIM");
        bus.set_block(0xAD, device_id.as_bytes());
        bus.set_word(0x98, 0x0033);
        bus
    }

    pub fn set_byte(&self, command: u8, value: u8) {
        self.state.borrow_mut().registers.insert(command, vec![value]);
    }

    pub fn set_word(&self, command: u8, value: u16) {
        self.state
            .borrow_mut()
            .registers
            .insert(command, value.to_le_bytes().to_vec());
    }

    /// Store a length-prefixed block.
    pub fn set_block(&self, command: u8, payload: &[u8]) {
        let mut bytes = vec![payload.len() as u8];
        bytes.extend_from_slice(payload);
        self.state.borrow_mut().registers.insert(command, bytes);
    }

    pub fn set_raw(&self, command: u8, bytes: &[u8]) {
        self.state.borrow_mut().registers.insert(command, bytes.to_vec());
    }

    pub fn fail_command(&self, command: u8) {
        self.state.borrow_mut().failing_commands.insert(command);
    }

    pub fn state(&self) -> std::cell::Ref<'_, MockState> {
        self.state.borrow()
    }

    pub fn state_mut(&self) -> std::cell::RefMut<'_, MockState> {
        self.state.borrow_mut()
    }

    pub fn session(&self) -> MockI2c {
        MockI2c {
            state: self.state.clone(),
        }
    }
}

impl I2cBus for MockBus {
    type Device = MockI2c;

    fn open(&mut self, _config: &I2cConfig) -> Result<MockI2c> {
        let mut state = self.state.borrow_mut();
        if state.fail_open {
            return Err(HwError::Other("adapter missing".into()));
        }
        state.opened += 1;
        drop(state);
        Ok(self.session())
    }
}

#[derive(Debug)]
pub struct MockI2c {
    state: Rc<RefCell<MockState>>,
}

impl I2c for MockI2c {
    fn write(&mut self, data: &[u8], stop: bool) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.log.push(Transaction::Write {
            data: data.to_vec(),
            stop,
        });

        let command = *data.first().ok_or(I2cError::BusError)?;
        if state.failing_commands.contains(&command) {
            return Err(I2cError::NoAck(0x16).into());
        }

        if !stop {
            state.pending = Some(command);
        } else if data.len() > 1 {
            state.registers.insert(command, data[1..].to_vec());
        }
        Ok(())
    }

    fn read(&mut self, buffer: &mut [u8], _stop: bool) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let command = state.pending.take();
        state.log.push(Transaction::Read {
            command,
            len: buffer.len(),
        });

        let command = command.ok_or(I2cError::BusError)?;
        let contents = state
            .registers
            .get(&command)
            .ok_or(I2cError::NoAck(0x16))?;

        // Past the end of a register the bus floats high.
        for (i, byte) in buffer.iter_mut().enumerate() {
            *byte = contents.get(i).copied().unwrap_or(0xFF);
        }
        Ok(())
    }

    fn close(self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.closed += 1;
        if state.fail_close {
            return Err(HwError::Other("close failed".into()));
        }
        Ok(())
    }
}
