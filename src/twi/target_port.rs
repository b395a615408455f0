// Licensed under the Apache-2.0 license

//! Interrupt-owned half of a bus instance.
//!
//! `TargetPort` keeps everything the target interrupt touches: the target
//! buffers, the state carried between interrupts and the user callbacks. It
//! is moved into a [`SessionRegistry`](crate::twi::registry::SessionRegistry)
//! and serviced from the interrupt handler, while the matching `BusSession`
//! stays in foreground code. The two halves share nothing but the peripheral
//! registers, so a blocking master transfer never holds the registry lock and
//! target interrupts keep being served while it runs.

use crate::common::{Logger, NoOpLogger};
use crate::twi::common::{Error, MasterControl, RoleMode, TargetEvent};
use crate::twi::registry::BusEventTarget;
use crate::twi::ring_buffer::BufferPair;
use crate::twi::target::{self, Callbacks, ReceiveCallback, RequestCallback, TargetState};
use crate::twi::traits::TwiHardware;

pub struct TargetPort<P: TwiHardware, const N: usize, L: Logger = NoOpLogger> {
    peripheral: P,
    roles: RoleMode,
    state: TargetState,
    buffers: BufferPair<N>,
    callbacks: Callbacks<N>,
    logger: L,
}

impl<P: TwiHardware, const N: usize, L: Logger> TargetPort<P, N, L> {
    pub fn new(peripheral: P, roles: RoleMode, logger: L) -> Self {
        Self {
            peripheral,
            roles,
            state: TargetState::new(),
            buffers: BufferPair::new(),
            callbacks: Callbacks::new(),
            logger,
        }
    }

    pub fn peripheral(&self) -> &P {
        &self.peripheral
    }

    pub fn peripheral_mut(&mut self) -> &mut P {
        &mut self.peripheral
    }

    /// Read back from the control register, so a `BusSession::end` is seen too.
    pub fn is_enabled(&self) -> bool {
        self.peripheral.target_control().is_enabled()
    }

    pub fn enable_target(
        &mut self,
        address: u8,
        accept_broadcast: bool,
        address_mask: u8,
    ) -> Result<(), Error> {
        let master_on = self.peripheral.master_control().is_enabled();
        if self.roles.conflicts(self.is_enabled(), master_on) {
            self.logger.error("target enable refused, role active");
            return Err(Error::RoleAlreadyActive);
        }
        self.reset();
        target::program(&mut self.peripheral, address, accept_broadcast, address_mask);
        self.logger.debug("target enabled");
        Ok(())
    }

    pub fn begin_target(
        &mut self,
        address: u8,
        accept_broadcast: bool,
        address_mask: u8,
    ) -> Result<(), Error> {
        self.enable_target(address, accept_broadcast, address_mask)
    }

    /// Stop listening. With exclusive roles the master logic that `enable_target`
    /// switched on is turned off again.
    pub fn disable_target(&mut self) {
        target::shut_down(&mut self.peripheral);
        if self.roles == RoleMode::Exclusive {
            self.peripheral.set_master_control(MasterControl::DISABLED);
        }
        self.reset();
    }

    pub fn end_target(&mut self) {
        self.disable_target();
    }

    /// Drop buffered target data and the state kept between interrupts.
    pub fn reset(&mut self) {
        self.buffers.reset();
        self.state = TargetState::new();
    }

    /// Register the write-phase callback. Replaces any previous one.
    pub fn on_receive(&mut self, callback: ReceiveCallback<N>) {
        self.callbacks.on_receive = Some(callback);
    }

    /// Register the read-phase callback. Replaces any previous one.
    pub fn on_request(&mut self, callback: RequestCallback<N>) {
        self.callbacks.on_request = Some(callback);
    }

    pub fn incoming_address(&self) -> u8 {
        self.state.incoming_address()
    }

    /// Service one target interrupt. `None` if the target role is off.
    pub fn handle_event(&mut self) -> Option<TargetEvent> {
        if !self.is_enabled() {
            return None;
        }
        Some(target::dispatch(
            &mut self.peripheral,
            &mut self.state,
            &mut self.buffers,
            &self.callbacks,
            &mut self.logger,
        ))
    }
}

impl<P: TwiHardware, const N: usize, L: Logger> BusEventTarget for TargetPort<P, N, L> {
    fn peripheral_id(&self) -> u8 {
        self.peripheral.instance_id()
    }

    fn on_bus_event(&mut self) {
        let _ = self.handle_event();
    }
}
