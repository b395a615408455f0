// Licensed under the Apache-2.0 license

//! Scripted peripheral double shared by the unit tests.
//!
//! The master side simulates one addressed device on the bus and reacts to
//! address/data/command writes the way the status register of the real
//! peripheral does. The target side is driven directly by tests: they set
//! `target_status` and `target_data_in`, dispatch, and inspect what the
//! dispatcher sent back.
//!
//! [`SharedMock`] hands the same peripheral to a `BusSession` and a
//! `TargetPort`, the way both halves reach one register block on hardware.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::vec::Vec;

use crate::twi::common::{
    BusState, MasterCommand, MasterControl, MasterStatus, TargetCommand, TargetControl,
    TargetStatus,
};
use crate::twi::traits::{PinMux, TwiCore, TwiMasterRegs, TwiTargetRegs};

/// Device answering on the simulated bus.
#[derive(Default)]
pub struct SimDevice {
    pub address: u8,
    /// NACK the data byte arriving after this many accepted ones.
    pub nack_after: Option<usize>,
    /// Raise a bus error on the data byte arriving after this many accepted ones.
    pub bus_error_after: Option<usize>,
    /// Raise a bus error instead of sending a byte once this many went out.
    pub read_error_after: Option<usize>,
    /// Address phases lost to another master before one succeeds.
    pub arbitration_losses: u32,
    pub response: VecDeque<u8>,
    pub received: Vec<u8>,
    pub sent: usize,
}

impl SimDevice {
    pub fn new(address: u8) -> Self {
        Self {
            address,
            ..Self::default()
        }
    }

    pub fn responding(address: u8, bytes: &[u8]) -> Self {
        Self {
            address,
            response: bytes.iter().copied().collect(),
            ..Self::default()
        }
    }
}

pub struct MockTwi {
    pub id: u8,
    pub status: MasterStatus,
    pub master_control: MasterControl,
    pub baud: u8,
    pub baud_writes: u32,
    pub fast_mode_plus: bool,
    pub data_reg: u8,
    pub addresses: Vec<u8>,
    pub written: Vec<u8>,
    pub commands: Vec<MasterCommand>,
    /// Bus held by someone else forever.
    pub stuck_busy: bool,
    /// Transfers never signal completion.
    pub stalled: bool,
    /// Bus reads busy until the target side answers its pending event.
    pub busy_until_target_serviced: bool,
    /// Called by `SharedMock` on every status poll while the bus is held busy.
    pub poll_hook: Option<fn()>,
    pub device: Option<SimDevice>,

    pub target_status: TargetStatus,
    pub target_control: TargetControl,
    pub target_address: u8,
    pub target_mask: u8,
    pub target_data_in: u8,
    pub target_sent: Vec<u8>,
    pub target_commands: Vec<TargetCommand>,
    pub cleared_flags: Vec<u8>,

    pub flushes: u32,
    pub dual_mode: Option<bool>,
    pub pins: Option<(u8, u8)>,
    pub pin_set: Option<u8>,
    pub pullups: bool,
    pub pin_clears: u32,
}

impl MockTwi {
    pub fn new(id: u8) -> Self {
        Self {
            id,
            status: MasterStatus(BusState::Unknown as u8),
            master_control: MasterControl::DISABLED,
            baud: 0,
            baud_writes: 0,
            fast_mode_plus: false,
            data_reg: 0,
            addresses: Vec::new(),
            written: Vec::new(),
            commands: Vec::new(),
            stuck_busy: false,
            stalled: false,
            busy_until_target_serviced: false,
            poll_hook: None,
            device: None,
            target_status: TargetStatus(0),
            target_control: TargetControl::DISABLED,
            target_address: 0,
            target_mask: 0,
            target_data_in: 0,
            target_sent: Vec::new(),
            target_commands: Vec::new(),
            cleared_flags: Vec::new(),
            flushes: 0,
            dual_mode: None,
            pins: None,
            pin_set: None,
            pullups: false,
            pin_clears: 0,
        }
    }

    /// Bus already brought up, `device` listening on it.
    pub fn with_device(id: u8, device: SimDevice) -> Self {
        let mut twi = Self::new(id);
        twi.status = MasterStatus(BusState::Idle as u8);
        twi.device = Some(device);
        twi
    }

    pub fn received(&self) -> &[u8] {
        self.device.as_ref().map_or(&[], |d| d.received.as_slice())
    }

    fn owner(flags: u8) -> MasterStatus {
        MasterStatus(flags | BusState::Owner as u8)
    }

    fn next_response(&mut self) -> u8 {
        let Some(device) = self.device.as_mut() else {
            return 0xFF;
        };
        device.sent += 1;
        device.response.pop_front().unwrap_or(0xFF)
    }

    fn read_error_due(&self) -> bool {
        self.device
            .as_ref()
            .is_some_and(|d| d.read_error_after == Some(d.sent))
    }
}

impl TwiCore for MockTwi {
    fn instance_id(&self) -> u8 {
        self.id
    }

    fn flush(&mut self) {
        self.flushes += 1;
    }

    fn enable_dual_mode(&mut self, fast_mode_plus: bool) {
        self.dual_mode = Some(fast_mode_plus);
    }
}

impl TwiMasterRegs for MockTwi {
    fn master_status(&self) -> MasterStatus {
        if self.stuck_busy || self.busy_until_target_serviced {
            MasterStatus(BusState::Busy as u8)
        } else {
            self.status
        }
    }

    fn set_bus_state(&mut self, state: BusState) {
        self.status = MasterStatus(state as u8);
    }

    fn master_control(&self) -> MasterControl {
        self.master_control
    }

    fn set_master_control(&mut self, control: MasterControl) {
        self.master_control = control;
    }

    fn write_address(&mut self, address_byte: u8) {
        self.addresses.push(address_byte);
        if self.stalled {
            self.status = Self::owner(0);
            return;
        }
        let reading = address_byte & 0x01 != 0;
        let Some(device) = self.device.as_mut() else {
            self.status = Self::owner(MasterStatus::WRITE_IF | MasterStatus::RXACK);
            return;
        };
        if device.arbitration_losses > 0 {
            device.arbitration_losses -= 1;
            self.status = MasterStatus(
                MasterStatus::WRITE_IF | MasterStatus::ARBLOST | BusState::Idle as u8,
            );
            return;
        }
        if address_byte >> 1 != device.address {
            self.status = Self::owner(MasterStatus::WRITE_IF | MasterStatus::RXACK);
            return;
        }
        if reading {
            self.data_reg = self.next_response();
            self.status = Self::owner(MasterStatus::READ_IF);
        } else {
            self.status = Self::owner(MasterStatus::WRITE_IF);
        }
    }

    fn write_data(&mut self, byte: u8) {
        self.written.push(byte);
        if self.stalled {
            self.status = Self::owner(0);
            return;
        }
        let Some(device) = self.device.as_mut() else {
            self.status = Self::owner(MasterStatus::WRITE_IF | MasterStatus::RXACK);
            return;
        };
        let accepted = device.received.len();
        if device.bus_error_after == Some(accepted) {
            self.status = Self::owner(MasterStatus::WRITE_IF | MasterStatus::BUSERR);
        } else if device.nack_after == Some(accepted) {
            self.status = Self::owner(MasterStatus::WRITE_IF | MasterStatus::RXACK);
        } else {
            device.received.push(byte);
            self.status = Self::owner(MasterStatus::WRITE_IF);
        }
    }

    fn read_data(&mut self) -> u8 {
        self.status = Self::owner(0);
        self.data_reg
    }

    fn command(&mut self, command: MasterCommand) {
        self.commands.push(command);
        match command {
            MasterCommand::AckContinue => {
                if self.stalled {
                    return;
                }
                if self.read_error_due() {
                    self.status = Self::owner(MasterStatus::READ_IF | MasterStatus::BUSERR);
                } else {
                    self.data_reg = self.next_response();
                    self.status = Self::owner(MasterStatus::READ_IF);
                }
            }
            MasterCommand::Stop | MasterCommand::NackStop => {
                self.status = MasterStatus(BusState::Idle as u8);
            }
        }
    }

    fn baud(&self) -> u8 {
        self.baud
    }

    fn set_baud(&mut self, value: u8) {
        self.baud = value;
        self.baud_writes += 1;
    }

    fn set_fast_mode_plus(&mut self, enabled: bool) {
        self.fast_mode_plus = enabled;
    }
}

impl TwiTargetRegs for MockTwi {
    fn target_status(&self) -> TargetStatus {
        self.target_status
    }

    fn clear_target_flags(&mut self, flags: u8) {
        self.cleared_flags.push(flags);
        self.target_status = TargetStatus(self.target_status.0 & !flags);
    }

    fn target_control(&self) -> TargetControl {
        self.target_control
    }

    fn set_target_control(&mut self, control: TargetControl) {
        self.target_control = control;
    }

    fn set_target_address(&mut self, address: u8) {
        self.target_address = address;
    }

    fn set_target_address_mask(&mut self, mask: u8) {
        self.target_mask = mask;
    }

    fn read_target_data(&mut self) -> u8 {
        self.target_data_in
    }

    fn write_target_data(&mut self, byte: u8) {
        self.target_sent.push(byte);
    }

    fn target_command(&mut self, command: TargetCommand) {
        self.target_commands.push(command);
        self.busy_until_target_serviced = false;
    }
}

impl PinMux for MockTwi {
    fn select_pins(&mut self, sda: u8, scl: u8) -> bool {
        if sda == scl {
            return false;
        }
        self.pins = Some((sda, scl));
        true
    }

    fn swap_pin_set(&mut self, state: u8) -> bool {
        if state > 3 {
            return false;
        }
        self.pin_set = Some(state);
        true
    }

    fn enable_pullups(&mut self) {
        self.pullups = true;
    }

    fn clear_pins(&mut self) {
        self.pin_clears += 1;
    }
}

/// One `MockTwi` reachable from several owners.
#[derive(Clone)]
pub struct SharedMock(Arc<Mutex<MockTwi>>);

impl SharedMock {
    pub fn new(twi: MockTwi) -> Self {
        Self(Arc::new(Mutex::new(twi)))
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut MockTwi) -> R) -> R {
        f(&mut self.0.lock().unwrap())
    }
}

impl TwiCore for SharedMock {
    fn instance_id(&self) -> u8 {
        self.with(|t| t.instance_id())
    }

    fn flush(&mut self) {
        self.with(|t| t.flush());
    }

    fn enable_dual_mode(&mut self, fast_mode_plus: bool) {
        self.with(|t| t.enable_dual_mode(fast_mode_plus));
    }
}

impl TwiMasterRegs for SharedMock {
    /// Runs the poll hook with the lock released, standing in for an
    /// interrupt that fires while the master engine spins.
    fn master_status(&self) -> MasterStatus {
        let hook = self.with(|t| t.poll_hook.filter(|_| t.busy_until_target_serviced));
        if let Some(hook) = hook {
            hook();
        }
        self.with(|t| t.master_status())
    }

    fn set_bus_state(&mut self, state: BusState) {
        self.with(|t| t.set_bus_state(state));
    }

    fn master_control(&self) -> MasterControl {
        self.with(|t| t.master_control())
    }

    fn set_master_control(&mut self, control: MasterControl) {
        self.with(|t| t.set_master_control(control));
    }

    fn write_address(&mut self, address_byte: u8) {
        self.with(|t| t.write_address(address_byte));
    }

    fn write_data(&mut self, byte: u8) {
        self.with(|t| t.write_data(byte));
    }

    fn read_data(&mut self) -> u8 {
        self.with(|t| t.read_data())
    }

    fn command(&mut self, command: MasterCommand) {
        self.with(|t| t.command(command));
    }

    fn baud(&self) -> u8 {
        self.with(|t| t.baud())
    }

    fn set_baud(&mut self, value: u8) {
        self.with(|t| t.set_baud(value));
    }

    fn set_fast_mode_plus(&mut self, enabled: bool) {
        self.with(|t| t.set_fast_mode_plus(enabled));
    }
}

impl TwiTargetRegs for SharedMock {
    fn target_status(&self) -> TargetStatus {
        self.with(|t| t.target_status())
    }

    fn clear_target_flags(&mut self, flags: u8) {
        self.with(|t| t.clear_target_flags(flags));
    }

    fn target_control(&self) -> TargetControl {
        self.with(|t| t.target_control())
    }

    fn set_target_control(&mut self, control: TargetControl) {
        self.with(|t| t.set_target_control(control));
    }

    fn set_target_address(&mut self, address: u8) {
        self.with(|t| t.set_target_address(address));
    }

    fn set_target_address_mask(&mut self, mask: u8) {
        self.with(|t| t.set_target_address_mask(mask));
    }

    fn read_target_data(&mut self) -> u8 {
        self.with(|t| t.read_target_data())
    }

    fn write_target_data(&mut self, byte: u8) {
        self.with(|t| t.write_target_data(byte));
    }

    fn target_command(&mut self, command: TargetCommand) {
        self.with(|t| t.target_command(command));
    }
}

impl PinMux for SharedMock {
    fn select_pins(&mut self, sda: u8, scl: u8) -> bool {
        self.with(|t| t.select_pins(sda, scl))
    }

    fn swap_pin_set(&mut self, state: u8) -> bool {
        self.with(|t| t.swap_pin_set(state))
    }

    fn enable_pullups(&mut self) {
        self.with(|t| t.enable_pullups());
    }

    fn clear_pins(&mut self) {
        self.with(|t| t.clear_pins());
    }
}
