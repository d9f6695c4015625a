//! Host fakes for the hardware seams.

use std::{cell::RefCell, collections::VecDeque, rc::Rc};

use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
use embedded_hal_async::{
    delay::DelayNs,
    i2c::{I2c, Operation},
};

use crate::{
    address::Address,
    battery::AnalogInput,
    sht4x::{crc, CMD_READ_SERIAL, CMD_SOFT_RESET},
    transport::{self, Frequency, PinPair, RegisterBlock, RegisterEvent, Transport},
};

/// An operation seen by [`FakeI2c`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum I2cCall {
    Write(u8, Vec<u8>),
    Read(u8, usize),
    WriteRead(u8, Vec<u8>, usize),
}

/// I2C driver acknowledging a fixed set of addresses.
#[derive(Debug, Default)]
pub struct FakeI2c {
    acking: Vec<u8>,
    response: Vec<u8>,
    hang: bool,
    calls: Vec<I2cCall>,
}

impl FakeI2c {
    pub fn new<const N: usize>(acking: [u8; N]) -> Self {
        Self {
            acking: acking.to_vec(),
            ..Self::default()
        }
    }

    /// Sets the bytes every read returns, repeated as needed.
    pub fn respond_with(&mut self, bytes: &[u8]) {
        self.response = bytes.to_vec();
    }

    /// Makes every operation wait forever.
    pub fn hang(&mut self) {
        self.hang = true;
    }

    pub fn calls(&self) -> &[I2cCall] {
        &self.calls
    }

    fn fill(&self, buf: &mut [u8]) {
        for (byte, value) in buf.iter_mut().zip(self.response.iter().cycle()) {
            *byte = *value;
        }
    }
}

impl embedded_hal_async::i2c::ErrorType for FakeI2c {
    type Error = ErrorKind;
}

impl I2c for FakeI2c {
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if self.hang {
            core::future::pending::<()>().await;
        }
        if !self.acking.contains(&address) {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }

        let call = match operations {
            [Operation::Write(bytes)] => I2cCall::Write(address, bytes.to_vec()),
            [Operation::Read(buf)] => {
                self.fill(buf);
                I2cCall::Read(address, buf.len())
            }
            [Operation::Write(bytes), Operation::Read(buf)] => {
                self.fill(buf);
                I2cCall::WriteRead(address, bytes.to_vec(), buf.len())
            }
            _ => unimplemented!("unexpected transaction shape"),
        };
        self.calls.push(call);

        Ok(())
    }
}

/// Delay provider recording the requested delays instead of waiting.
#[derive(Debug, Default)]
pub struct RecordingDelay {
    delays_ns: Vec<u64>,
}

impl RecordingDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.delays_ns.len()
    }

    pub fn total_us(&self) -> u64 {
        self.delays_ns.iter().sum::<u64>() / 1_000
    }
}

impl DelayNs for RecordingDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.delays_ns.push(u64::from(ns));
    }

    async fn delay_us(&mut self, us: u32) {
        self.delays_ns.push(u64::from(us) * 1_000);
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.delays_ns.push(u64::from(ms) * 1_000_000);
    }
}

/// Register block completing every transfer after a configurable number of polls.
///
/// Like the hardware, an empty write only completes once a STOP has been requested.
#[derive(Debug)]
pub struct FakeRegisters {
    pub enabled: bool,
    pub enabled_with: Option<(PinPair, Frequency)>,
    pub writes: Vec<(u8, Vec<u8>)>,
    pub reads: Vec<(u8, usize)>,
    pub rx: Vec<u8>,
    /// Event returned by the next poll, ahead of the scripted completion.
    pub next_event: Option<RegisterEvent>,
    pub stopped: bool,
    pub stop_requests: usize,
    /// Addresses acknowledging transfers; `None` acknowledges every address.
    acking: Option<Vec<u8>>,
    address: u8,
    awaiting_stop: bool,
    /// Polls without an event before completion; `None` never completes.
    polls_before_done: Option<u32>,
    remaining: u32,
}

impl FakeRegisters {
    pub fn new() -> Self {
        Self {
            enabled: false,
            enabled_with: None,
            writes: Vec::new(),
            reads: Vec::new(),
            rx: Vec::new(),
            next_event: None,
            stopped: false,
            stop_requests: 0,
            acking: None,
            address: 0,
            awaiting_stop: false,
            polls_before_done: Some(0),
            remaining: 0,
        }
    }

    pub fn complete_after(&mut self, polls: u32) {
        self.polls_before_done = Some(polls);
    }

    pub fn never_complete(&mut self) {
        self.polls_before_done = None;
    }

    /// Makes transfers to any other address fail with an address NACK.
    pub fn ack_only(&mut self, addresses: &[u8]) {
        self.acking = Some(addresses.to_vec());
    }

    fn start(&mut self, address: u8) {
        self.address = address;
        self.stopped = false;
        self.remaining = self.polls_before_done.unwrap_or(0);
    }
}

impl RegisterBlock for FakeRegisters {
    fn enable(&mut self, pins: PinPair, frequency: Frequency) {
        self.enabled = true;
        self.enabled_with = Some((pins, frequency));
    }

    fn disable(&mut self) {
        self.enabled = false;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn start_write(&mut self, address: u8, bytes: &[u8]) -> Result<(), transport::Error> {
        self.writes.push((address, bytes.to_vec()));
        self.start(address);
        self.awaiting_stop = bytes.is_empty();
        Ok(())
    }

    fn start_read(&mut self, address: u8, len: usize) -> Result<(), transport::Error> {
        self.reads.push((address, len));
        self.start(address);
        self.awaiting_stop = false;
        Ok(())
    }

    fn event(&mut self) -> Option<RegisterEvent> {
        if let Some(event) = self.next_event.take() {
            return Some(event);
        }
        if let Some(acking) = &self.acking {
            if !acking.contains(&self.address) {
                return Some(RegisterEvent::AddressNack);
            }
        }
        if self.awaiting_stop {
            return None;
        }
        self.polls_before_done?;
        if self.remaining == 0 {
            Some(RegisterEvent::Done)
        } else {
            self.remaining -= 1;
            None
        }
    }

    fn received(&self) -> &[u8] {
        &self.rx
    }

    fn request_stop(&mut self) {
        self.stop_requests += 1;
        self.awaiting_stop = false;
    }

    fn stop(&mut self) {
        self.stopped = true;
    }
}

/// Simulated SHT4x, speaking the protocol at the transport level.
#[derive(Debug)]
pub struct SensorSim {
    pub address: Address,
    /// Whether the device acknowledges anything at all.
    pub present: bool,
    /// Makes every exchange fail with [`transport::Error::BackendUnavailable`].
    pub unavailable: bool,
    /// Raw temperature and humidity words.
    pub raw: [u16; 2],
    pub serial: u32,
    /// Number of upcoming measurement commands that are not acknowledged.
    pub fail_next: usize,
    /// Number of upcoming responses sent with a corrupted checksum.
    pub corrupt_next: usize,
    /// Acknowledged measurement and identity opcodes, in order.
    pub commands: Vec<u8>,
    /// Measurement commands that were not acknowledged.
    pub failed: usize,
    /// Acknowledged soft resets.
    pub resets: usize,
    /// Addresses probed with a zero-length write.
    pub probes: Vec<u8>,
    pending: Option<[u8; 6]>,
}

impl SensorSim {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            present: true,
            unavailable: false,
            raw: [0x6666, 0x8000],
            serial: 0x0bad_cafe,
            fail_next: 0,
            corrupt_next: 0,
            commands: Vec::new(),
            failed: 0,
            resets: 0,
            probes: Vec::new(),
            pending: None,
        }
    }

    /// A bus on which nothing answers.
    pub fn absent() -> Self {
        Self {
            present: false,
            ..Self::new(Address::SHT4X_A)
        }
    }

    /// Number of measurement commands received, including failed ones.
    pub fn attempts(&self) -> usize {
        let measurements = self
            .commands
            .iter()
            .filter(|opcode| **opcode != CMD_READ_SERIAL)
            .count();
        measurements + self.failed
    }

    fn respond(&mut self, words: [u16; 2]) {
        let [[a0, a1], [b0, b1]] = words.map(u16::to_be_bytes);
        let corrupt = self.corrupt_next > 0;
        if corrupt {
            self.corrupt_next -= 1;
        }
        self.pending = Some([
            a0,
            a1,
            crc::checksum([a0, a1]),
            b0,
            b1,
            crc::checksum([b0, b1]) ^ u8::from(corrupt),
        ]);
    }
}

impl Transport for SensorSim {
    async fn exchange(
        &mut self,
        address: Address,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), transport::Error> {
        if self.unavailable {
            return Err(transport::Error::BackendUnavailable);
        }
        if write.is_empty() && read.is_empty() {
            self.probes.push(address.get());
        }
        if !self.present || address != self.address {
            return Err(transport::Error::AddressNotAcknowledged);
        }

        match write {
            [] => {}
            [CMD_SOFT_RESET] => {
                self.resets += 1;
                self.pending = None;
            }
            [CMD_READ_SERIAL] => {
                self.commands.push(CMD_READ_SERIAL);
                let serial = self.serial;
                self.respond([(serial >> 16) as u16, serial as u16]);
            }
            [opcode @ (0xfd | 0xf6 | 0xe0)] => {
                if self.fail_next > 0 {
                    self.fail_next -= 1;
                    self.failed += 1;
                    self.pending = None;
                    return Err(transport::Error::AddressNotAcknowledged);
                }
                self.commands.push(*opcode);
                self.respond(self.raw);
            }
            _ => return Err(transport::Error::DataNotAcknowledged),
        }

        if !read.is_empty() {
            // The device does not acknowledge reads while it has nothing to send.
            let response = self
                .pending
                .take()
                .ok_or(transport::Error::AddressNotAcknowledged)?;
            for (byte, value) in read.iter_mut().zip(response) {
                *byte = value;
            }
        }

        Ok(())
    }
}

/// Step recorded by the battery fakes, in the order they happened.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Step {
    DividerOn,
    DividerOff,
    Read,
}

pub type Journal = Rc<RefCell<Vec<Step>>>;

/// ADC returning scripted codes.
#[derive(Debug)]
pub struct FakeAdc {
    codes: VecDeque<u16>,
    /// Index of the read that fails, if any.
    pub fail_at: Option<usize>,
    reads: usize,
    journal: Journal,
}

impl FakeAdc {
    pub fn new(codes: &[u16], journal: Journal) -> Self {
        Self {
            codes: codes.iter().copied().collect(),
            fail_at: None,
            reads: 0,
            journal,
        }
    }
}

/// Error of [`FakeAdc`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AdcFault;

impl AnalogInput for FakeAdc {
    type Error = AdcFault;

    async fn read(&mut self) -> Result<u16, Self::Error> {
        self.journal.borrow_mut().push(Step::Read);
        let index = self.reads;
        self.reads += 1;
        if self.fail_at == Some(index) {
            return Err(AdcFault);
        }
        Ok(self.codes.pop_front().unwrap_or(0))
    }
}

/// Divider enable pin.
#[derive(Debug)]
pub struct FakePin {
    pub high: bool,
    journal: Journal,
}

impl FakePin {
    pub fn new(journal: Journal) -> Self {
        Self {
            high: false,
            journal,
        }
    }
}

impl embedded_hal::digital::ErrorType for FakePin {
    type Error = core::convert::Infallible;
}

impl embedded_hal::digital::OutputPin for FakePin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.high = false;
        self.journal.borrow_mut().push(Step::DividerOff);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.high = true;
        self.journal.borrow_mut().push(Step::DividerOn);
        Ok(())
    }
}
