// Licensed under the Apache-2.0 license

//! Foreground half of a bus instance.
//!
//! `BusSession` owns the master buffers, the configuration and the master
//! role. Foreground code drives it through the byte-stream API
//! (`begin_transmission` / `write` / `end_transmission`, `request_from` /
//! `read`). Target traffic is handled by the matching
//! [`TargetPort`](crate::twi::target_port::TargetPort), which lives in the
//! interrupt registry; the two halves only meet at the peripheral registers,
//! which is also where the role guards read the other half's state.

use fugit::HertzU32;

use crate::common::{Logger, NoOpLogger};
use crate::twi::baud;
use crate::twi::common::{BusState, Error, MasterControl, RoleMode, TwiConfig};
use crate::twi::master;
use crate::twi::ring_buffer::BufferPair;
use crate::twi::target;
use crate::twi::traits::TwiHardware;

pub struct BusSession<P: TwiHardware, const N: usize, L: Logger = NoOpLogger> {
    peripheral: P,
    config: TwiConfig,
    buffers: BufferPair<N>,
    master_enabled: bool,
    /// 7-bit address for the next master transfer.
    master_address: u8,
    logger: L,
}

impl<P: TwiHardware, const N: usize, L: Logger> BusSession<P, N, L> {
    pub fn new(peripheral: P, config: TwiConfig, logger: L) -> Self {
        Self {
            peripheral,
            config,
            buffers: BufferPair::new(),
            master_enabled: false,
            master_address: 0,
            logger,
        }
    }

    pub fn peripheral(&self) -> &P {
        &self.peripheral
    }

    pub fn config(&self) -> &TwiConfig {
        &self.config
    }

    pub fn is_master_enabled(&self) -> bool {
        self.master_enabled
    }

    pub fn is_target_enabled(&self) -> bool {
        self.peripheral.target_control().is_enabled()
    }

    /// Take the pins and bring up the master, bus state forced to idle.
    pub fn enable_master(&mut self) -> Result<(), Error> {
        let target_on = self.is_target_enabled();
        if self.config.roles.conflicts(self.master_enabled, target_on) {
            self.logger.error("master enable refused, role active");
            return Err(Error::RoleAlreadyActive);
        }
        self.peripheral.clear_pins();
        self.master_enabled = true;
        self.peripheral.set_master_control(MasterControl::POLLED);
        self.peripheral.set_bus_state(BusState::Idle);
        self.logger.debug("master enabled");
        Ok(())
    }

    pub fn disable_master(&mut self) {
        self.peripheral.set_master_control(MasterControl::DISABLED);
        self.peripheral.set_baud(0);
        self.master_enabled = false;
        self.buffers.reset();
    }

    /// Master role at the configured bus frequency.
    pub fn begin(&mut self) -> Result<(), Error> {
        self.enable_master()?;
        self.set_clock(self.config.frequency);
        Ok(())
    }

    /// Shut down both roles.
    pub fn end(&mut self) {
        self.disable_master();
        self.end_target();
    }

    pub fn end_master(&mut self) {
        self.disable_master();
    }

    /// Stop the target role from foreground code. The target port drops its
    /// buffered data on its next enable.
    pub fn end_target(&mut self) {
        target::shut_down(&mut self.peripheral);
        if self.config.roles == RoleMode::Exclusive && !self.master_enabled {
            self.peripheral.set_master_control(MasterControl::DISABLED);
        }
    }

    /// Set the bus frequency. Returns false when the timing register already
    /// matched and was left alone.
    pub fn set_clock(&mut self, frequency: HertzU32) -> bool {
        self.config.frequency = frequency;
        let changed = baud::set_baud(&mut self.peripheral, self.config.cpu_clock, frequency);
        if changed {
            self.logger.debug("bus clock reprogrammed");
        }
        changed
    }

    /// Empty the master buffers and cycle the peripheral to clear latched errors.
    pub fn flush(&mut self) {
        self.buffers.reset();
        self.peripheral.flush();
    }

    /// Hand back the peripheral and take `other` in its place.
    ///
    /// Only allowed while the master logic is off, which also covers a
    /// running target role.
    pub fn swap_peripheral(&mut self, other: P) -> Result<P, Error> {
        if self.master_enabled || self.peripheral.master_control().is_enabled() {
            self.logger.error("peripheral swap refused, role active");
            return Err(Error::RoleAlreadyActive);
        }
        self.logger.debug("peripheral swapped");
        Ok(core::mem::replace(&mut self.peripheral, other))
    }

    /// Start staging a write to `address`; unsent bytes from before are dropped.
    pub fn begin_transmission(&mut self, address: u8) {
        self.master_address = address;
        self.buffers.tx.reset();
    }

    /// Stage one byte. Returns false if the transmit buffer is full.
    pub fn write(&mut self, byte: u8) -> bool {
        self.buffers.tx.try_push(byte)
    }

    /// Stage bytes until the buffer fills; returns how many were taken.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> usize {
        let tx = &mut self.buffers.tx;
        bytes.iter().take_while(|&&b| tx.try_push(b)).count()
    }

    /// Send the staged bytes. Without `send_stop` the bus is kept for a
    /// repeated start.
    ///
    /// A NACK on the last staged byte still counts as a complete write.
    pub fn end_transmission(&mut self, send_stop: bool) -> Result<usize, Error> {
        self.transmit(send_stop, true)
    }

    pub(crate) fn transmit(
        &mut self,
        send_stop: bool,
        accept_final_nack: bool,
    ) -> Result<usize, Error> {
        if !self.master_enabled {
            return Err(Error::RoleDisabled);
        }
        let staged = self.buffers.tx.available();
        let limits = self.config.limits();
        let result = match master::write(
            &mut self.peripheral,
            &mut self.buffers,
            self.master_address,
            send_stop,
            &limits,
        ) {
            Err(Error::DataNack { transferred }) if accept_final_nack && transferred == staged => {
                Ok(transferred)
            }
            other => other,
        };
        if result.is_err() {
            self.logger.error("master write failed");
        }
        result
    }

    /// Read `count` bytes from `address` into the receive buffer.
    ///
    /// `count` is capped at what the receive buffer can hold.
    pub fn request_from(
        &mut self,
        address: u8,
        count: usize,
        send_stop: bool,
    ) -> Result<usize, Error> {
        if !self.master_enabled {
            return Err(Error::RoleDisabled);
        }
        self.master_address = address;
        let count = count.min(self.buffers.rx.usable_capacity());
        let limits = self.config.limits();
        let result = master::read(
            &mut self.peripheral,
            &mut self.buffers,
            address,
            count,
            send_stop,
            &limits,
        );
        if result.is_err() {
            self.logger.error("master read failed");
        }
        result
    }

    pub fn available(&self) -> usize {
        self.buffers.rx.available()
    }

    pub fn read(&mut self) -> Option<u8> {
        self.buffers.rx.pop()
    }

    pub fn peek(&self) -> Option<u8> {
        self.buffers.rx.peek()
    }

    pub fn select_pins(&mut self, sda: u8, scl: u8) -> bool {
        self.peripheral.select_pins(sda, scl)
    }

    pub fn swap_pin_set(&mut self, state: u8) -> bool {
        self.peripheral.swap_pin_set(state)
    }

    pub fn enable_pullups(&mut self) {
        self.peripheral.enable_pullups();
    }

    pub fn enable_dual_mode(&mut self, fast_mode_plus: bool) {
        self.peripheral.enable_dual_mode(fast_mode_plus);
    }
}
