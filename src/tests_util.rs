use crate::buffer::EepromBuffer;
use crate::bus::{AddressWidth, Bus, Connector, Delay};
use crate::config::Config;
use crate::error::ErrorKind;
use crate::session::Session;
use alloc::rc::Rc;
use alloc::vec;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::time::Duration;

pub(crate) fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Transaction {
    Read { offset: u32, len: usize },
    Write { offset: u32, data: Vec<u8> },
}

struct RamState {
    device_address: u8,
    memory: Vec<u8>,
    log: Vec<Transaction>,
    unreachable: bool,
    writes_left: Option<usize>,
    fail_reads: bool,
}

/// In-memory EEPROM shared between every bus handle connected to it, so contents survive
/// reconnects.
#[derive(Clone)]
pub(crate) struct RamEeprom(Rc<RefCell<RamState>>);

impl RamEeprom {
    pub(crate) fn new(config: &Config) -> Self {
        RamEeprom(Rc::new(RefCell::new(RamState {
            device_address: config.device_address,
            memory: vec![0xFFu8; config.geometry.capacity()],
            log: Vec::new(),
            unreachable: false,
            writes_left: None,
            fail_reads: false,
        })))
    }

    pub(crate) fn memory(&self) -> Vec<u8> {
        self.0.borrow().memory.clone()
    }

    pub(crate) fn poke(&self, offset: usize, data: &[u8]) {
        self.0.borrow_mut().memory[offset..offset + data.len()].copy_from_slice(data);
    }

    pub(crate) fn transactions(&self) -> Vec<Transaction> {
        self.0.borrow().log.clone()
    }

    pub(crate) fn clear_transactions(&self) {
        self.0.borrow_mut().log.clear();
    }

    pub(crate) fn set_unreachable(&self, unreachable: bool) {
        self.0.borrow_mut().unreachable = unreachable;
    }

    /// Let `n` more page writes through, then fail every write.
    pub(crate) fn fail_writes_after(&self, n: usize) {
        self.0.borrow_mut().writes_left = Some(n);
    }

    pub(crate) fn heal(&self) {
        let mut state = self.0.borrow_mut();
        state.writes_left = None;
        state.fail_reads = false;
        state.unreachable = false;
    }

    pub(crate) fn set_fail_reads(&self, fail: bool) {
        self.0.borrow_mut().fail_reads = fail;
    }

    pub(crate) fn connector(&self) -> RamConnector {
        RamConnector(self.clone())
    }
}

pub(crate) struct RamBus(RamEeprom);

impl Bus for RamBus {
    fn read_memory(
        &mut self,
        device: u8,
        offset: u32,
        _width: AddressWidth,
        data: &mut [u8],
    ) -> Result<(), ErrorKind> {
        let mut state = (self.0).0.borrow_mut();
        if state.unreachable || state.fail_reads || device != state.device_address {
            return Err(ErrorKind::Transport);
        }
        let start = offset as usize;
        let end = start + data.len();
        if end > state.memory.len() {
            return Err(ErrorKind::Transport);
        }
        data.copy_from_slice(&state.memory[start..end]);
        state.log.push(Transaction::Read {
            offset,
            len: data.len(),
        });
        Ok(())
    }

    fn write_memory(
        &mut self,
        device: u8,
        offset: u32,
        _width: AddressWidth,
        data: &[u8],
    ) -> Result<(), ErrorKind> {
        let mut state = (self.0).0.borrow_mut();
        if state.unreachable || device != state.device_address {
            return Err(ErrorKind::Transport);
        }
        let writes_left = state.writes_left;
        match writes_left {
            Some(0) => return Err(ErrorKind::Transport),
            Some(n) => state.writes_left = Some(n - 1),
            None => {}
        }
        let start = offset as usize;
        let end = start + data.len();
        if end > state.memory.len() {
            return Err(ErrorKind::Transport);
        }
        state.memory[start..end].copy_from_slice(data);
        state.log.push(Transaction::Write {
            offset,
            data: data.to_vec(),
        });
        Ok(())
    }
}

pub(crate) struct RamConnector(RamEeprom);

impl Connector for RamConnector {
    type Bus = RamBus;

    fn connect(&mut self) -> Result<RamBus, ErrorKind> {
        if (self.0).0.borrow().unreachable {
            return Err(ErrorKind::Transport);
        }
        Ok(RamBus(self.0.clone()))
    }
}

/// Records settle delays instead of sleeping.
#[derive(Clone, Default)]
pub(crate) struct CountingDelay {
    count: Rc<Cell<usize>>,
    total: Rc<Cell<Duration>>,
}

impl CountingDelay {
    pub(crate) fn count(&self) -> usize {
        self.count.get()
    }

    pub(crate) fn total(&self) -> Duration {
        self.total.get()
    }
}

impl Delay for CountingDelay {
    fn delay(&mut self, duration: Duration) {
        self.count.set(self.count.get() + 1);
        self.total.set(self.total.get() + duration);
    }
}

pub(crate) type RamBuffer = EepromBuffer<RamBus, CountingDelay>;

pub(crate) fn make_buffer(eeprom: &RamEeprom, config: &Config) -> (RamBuffer, CountingDelay) {
    let delay = CountingDelay::default();
    let buffer = EepromBuffer::new(RamBus(eeprom.clone()), delay.clone(), config);
    (buffer, delay)
}

pub(crate) type RamSession = Session<RamConnector, CountingDelay>;

/// Session over a freshly formatted in-memory EEPROM.
pub(crate) fn make_session(config: &Config) -> (RamSession, RamEeprom, CountingDelay) {
    let eeprom = RamEeprom::new(config);
    let delay = CountingDelay::default();
    let mut session = Session::new(config.clone(), eeprom.connector(), delay.clone()).unwrap();
    session.connect().unwrap();
    session.format().unwrap();
    (session, eeprom, delay)
}
