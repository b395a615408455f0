// Licensed under the Apache-2.0 license

//! # TWI Hardware Abstraction Traits
//!
//! Register-level view of one two-wire peripheral instance, split by
//! responsibility so that a test double or a new silicon variant only has to
//! provide plain register accessors. The protocol logic (master engine,
//! target dispatcher, baud calculation) lives above these traits and never
//! touches silicon-specific bit layouts.
//!
//! ## Trait Hierarchy
//!
//! ```text
//! TwiCore (instance identity, flush)
//!     ├── TwiMasterRegs (master status/control/data/baud)
//!     └── TwiTargetRegs (target status/control/data/address)
//! PinMux (pin routing collaborator)
//! TwiHardware = TwiMasterRegs + TwiTargetRegs + PinMux (blanket)
//! ```

use crate::twi::common::{
    BusState, MasterCommand, MasterControl, MasterStatus, TargetCommand, TargetControl,
    TargetStatus,
};

/// Identity and whole-peripheral operations.
pub trait TwiCore {
    /// Hardware identity used to route bus events to the owning session.
    fn instance_id(&self) -> u8;

    /// Cycle the peripheral off and on to clear a latched error condition.
    fn flush(&mut self);

    /// Route the target onto its own pin pair (dual-controller parts).
    fn enable_dual_mode(&mut self, fast_mode_plus: bool);
}

/// Master side registers.
///
/// All reads are side-effect free except `read_data`, which on real hardware
/// may trigger the next bus operation depending on the acknowledge setting.
pub trait TwiMasterRegs: TwiCore {
    fn master_status(&self) -> MasterStatus;

    /// Write the bus state field, e.g. to force the state machine to idle.
    fn set_bus_state(&mut self, state: BusState);

    fn master_control(&self) -> MasterControl;

    fn set_master_control(&mut self, control: MasterControl);

    /// Load the address register; issues a (repeated) start and the address byte.
    fn write_address(&mut self, address_byte: u8);

    fn write_data(&mut self, byte: u8);

    fn read_data(&mut self) -> u8;

    fn command(&mut self, command: MasterCommand);

    fn baud(&self) -> u8;

    fn set_baud(&mut self, value: u8);

    fn set_fast_mode_plus(&mut self, enabled: bool);
}

/// Target side registers.
pub trait TwiTargetRegs: TwiCore {
    fn target_status(&self) -> TargetStatus;

    /// Write-one-to-clear of the given status flags.
    fn clear_target_flags(&mut self, flags: u8);

    fn target_control(&self) -> TargetControl;

    fn set_target_control(&mut self, control: TargetControl);

    /// Address register: 7-bit address in bits 7..1, general call enable in bit 0.
    fn set_target_address(&mut self, address: u8);

    fn set_target_address_mask(&mut self, mask: u8);

    fn read_target_data(&mut self) -> u8;

    fn write_target_data(&mut self, byte: u8);

    fn target_command(&mut self, command: TargetCommand);
}

/// Pin multiplexing and pull-up control for SDA/SCL.
///
/// Implemented by the board layer; the driver only forwards to it.
pub trait PinMux {
    /// Select an alternate SDA/SCL pair. Returns false if the pair is not routable.
    fn select_pins(&mut self, sda: u8, scl: u8) -> bool;

    /// Select one of the numbered pin sets.
    fn swap_pin_set(&mut self, state: u8) -> bool;

    fn enable_pullups(&mut self);

    /// Return the selected pins to their idle state before the peripheral takes them.
    fn clear_pins(&mut self);
}

/// Everything a bus session needs from one peripheral instance.
pub trait TwiHardware: TwiMasterRegs + TwiTargetRegs + PinMux {}

/// Blanket implementation: any type providing both register sides and pin control
impl<T> TwiHardware for T where T: TwiMasterRegs + TwiTargetRegs + PinMux {}
