// Licensed under the Apache-2.0 license

//! Target (slave) side interrupt handling.
//!
//! `dispatch` runs once per target interrupt. It decodes the status register,
//! moves at most one byte between the data register and the target buffers,
//! calls into user code at phase boundaries and finally tells the peripheral
//! how to continue. It never waits on the bus.
//!
//! User code reaches the target buffers only through the [`TargetContext`]
//! handed to its callbacks. The context cannot be built outside this crate,
//! so target buffers are touched from interrupt context alone.

use crate::common::Logger;
use crate::twi::common::{MasterControl, TargetCommand, TargetControl, TargetEvent, TargetStatus};
use crate::twi::ring_buffer::BufferPair;
use crate::twi::traits::{TwiHardware, TwiTargetRegs};

/// Stop condition, with or without the address/stop bits still reporting the
/// last direction.
const STOP: u8 = TargetStatus::ADDR_STOP_IF;
const STOP_AFTER_READ: u8 = TargetStatus::ADDR_STOP_IF | TargetStatus::DIR;
const STOP_CLOCK_HELD: u8 = TargetStatus::ADDR_STOP_IF | TargetStatus::CLKHOLD;

const ADDR_MASTER_WRITES: u8 =
    TargetStatus::ADDR_STOP_IF | TargetStatus::CLKHOLD | TargetStatus::AP;
const ADDR_MASTER_READS: u8 =
    TargetStatus::ADDR_STOP_IF | TargetStatus::CLKHOLD | TargetStatus::DIR | TargetStatus::AP;

const DATA_IN: u8 = TargetStatus::DATA_IF | TargetStatus::CLKHOLD;
const DATA_IN_AP: u8 = DATA_IN | TargetStatus::AP;
const DATA_OUT: u8 = TargetStatus::DATA_IF | TargetStatus::CLKHOLD | TargetStatus::DIR;
const DATA_OUT_AP: u8 = DATA_OUT | TargetStatus::AP;
const DATA_OUT_NACKED: u8 = DATA_OUT | TargetStatus::RXACK;
const DATA_OUT_NACKED_AP: u8 = DATA_OUT_AP | TargetStatus::RXACK;

/// Called with the number of bytes received when a write phase ends.
pub type ReceiveCallback<const N: usize> = fn(&mut TargetContext<'_, N>, usize);

/// Called when a master starts reading; stage the reply with `write`.
pub type RequestCallback<const N: usize> = fn(&mut TargetContext<'_, N>);

pub struct Callbacks<const N: usize> {
    pub on_receive: Option<ReceiveCallback<N>>,
    pub on_request: Option<RequestCallback<N>>,
}

impl<const N: usize> Callbacks<N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            on_receive: None,
            on_request: None,
        }
    }
}

impl<const N: usize> Default for Callbacks<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-instance target state kept between interrupts.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TargetState {
    /// We have sent at least one byte, so a NACK now ends the read.
    ack_matters: bool,
    incoming_address: u8,
}

impl TargetState {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ack_matters: false,
            incoming_address: 0,
        }
    }

    /// Raw address byte of the last address match: address in bits 7..1, R/W in bit 0.
    #[must_use]
    pub fn incoming_address(&self) -> u8 {
        self.incoming_address
    }
}

/// Access to the target buffers from inside a callback.
pub struct TargetContext<'a, const N: usize> {
    buffers: &'a mut BufferPair<N>,
    incoming_address: u8,
}

impl<'a, const N: usize> TargetContext<'a, N> {
    pub(crate) fn new(buffers: &'a mut BufferPair<N>, incoming_address: u8) -> Self {
        Self {
            buffers,
            incoming_address,
        }
    }

    /// Stage a reply byte. Returns false if the transmit buffer is full.
    pub fn write(&mut self, byte: u8) -> bool {
        self.buffers.tx.try_push(byte)
    }

    /// Stage bytes until one is rejected; returns how many were taken.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> usize {
        bytes.iter().take_while(|&&b| self.buffers.tx.try_push(b)).count()
    }

    #[must_use]
    pub fn available(&self) -> usize {
        self.buffers.rx.available()
    }

    pub fn read(&mut self) -> Option<u8> {
        self.buffers.rx.pop()
    }

    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        self.buffers.rx.peek()
    }

    #[must_use]
    pub fn incoming_address(&self) -> u8 {
        self.incoming_address
    }
}

/// Listen on `address` (7 bit) with interrupts enabled. `address_mask` is
/// written as-is, so it can carry either a mask or a second address.
///
/// Bus error detection needs the master logic running, so it is switched on
/// as well.
pub(crate) fn program<P: TwiHardware>(
    peripheral: &mut P,
    address: u8,
    accept_broadcast: bool,
    address_mask: u8,
) {
    peripheral.clear_pins();
    peripheral.set_target_address((address << 1) | u8::from(accept_broadcast));
    peripheral.set_target_address_mask(address_mask);
    peripheral.set_target_control(TargetControl::INTERRUPT_DRIVEN);
    peripheral.set_master_control(MasterControl::POLLED);
}

pub(crate) fn shut_down<P: TwiTargetRegs>(peripheral: &mut P) {
    peripheral.set_target_address(0);
    peripheral.set_target_control(TargetControl::DISABLED);
    peripheral.set_target_address_mask(0);
}

/// Hand everything received so far to `on_receive`, then drop what it left unread.
fn deliver_received<const N: usize>(
    buffers: &mut BufferPair<N>,
    callbacks: &Callbacks<N>,
    incoming_address: u8,
) {
    let count = buffers.rx.available();
    if count > 0 {
        if let Some(on_receive) = callbacks.on_receive {
            on_receive(&mut TargetContext::new(buffers, incoming_address), count);
        }
    }
    buffers.rx.reset();
}

/// Service one target interrupt.
pub fn dispatch<P: TwiTargetRegs, L: Logger, const N: usize>(
    peripheral: &mut P,
    state: &mut TargetState,
    buffers: &mut BufferPair<N>,
    callbacks: &Callbacks<N>,
    logger: &mut L,
) -> TargetEvent {
    let status = peripheral.target_status();

    if status.has_bus_fault() {
        // reading the data register clears the fault
        let _ = peripheral.read_target_data();
        buffers.reset();
        logger.error("target bus error or collision");
        return TargetEvent::BusFault;
    }

    let status = if state.ack_matters {
        status
    } else {
        status.without_rxack()
    };

    match status.bits() {
        STOP | STOP_AFTER_READ | STOP_CLOCK_HELD => {
            peripheral.clear_target_flags(TargetStatus::ADDR_STOP_IF);
            deliver_received(buffers, callbacks, state.incoming_address);
            TargetEvent::Stop
        }
        ADDR_MASTER_WRITES => {
            state.incoming_address = peripheral.read_target_data();
            peripheral.target_command(TargetCommand::AckContinue);
            TargetEvent::WriteRequest
        }
        ADDR_MASTER_READS => {
            state.incoming_address = peripheral.read_target_data();
            // repeated start after a write: the write phase never saw a stop
            deliver_received(buffers, callbacks, state.incoming_address);
            if let Some(on_request) = callbacks.on_request {
                on_request(&mut TargetContext::new(buffers, state.incoming_address));
            }
            peripheral.target_command(TargetCommand::AckContinue);
            TargetEvent::ReadRequest
        }
        DATA_IN | DATA_IN_AP => {
            if buffers.rx.is_full() {
                peripheral.target_command(TargetCommand::NackComplete);
                buffers.rx.reset();
                TargetEvent::Overflow
            } else {
                let byte = peripheral.read_target_data();
                buffers.rx.try_push(byte);
                peripheral.target_command(TargetCommand::AckContinue);
                TargetEvent::DataReceived
            }
        }
        DATA_OUT | DATA_OUT_AP => {
            state.ack_matters = true;
            match buffers.tx.pop() {
                Some(byte) => {
                    peripheral.write_target_data(byte);
                    peripheral.target_command(TargetCommand::AckContinue);
                }
                None => peripheral.target_command(TargetCommand::Complete),
            }
            TargetEvent::DataRequested
        }
        DATA_OUT_NACKED | DATA_OUT_NACKED_AP => {
            state.ack_matters = false;
            peripheral.target_command(TargetCommand::Complete);
            buffers.tx.reset();
            TargetEvent::ReadDone
        }
        _ => {
            peripheral.target_command(TargetCommand::NackComplete);
            logger.error("unexpected target status");
            TargetEvent::Illegal
        }
    }
}
