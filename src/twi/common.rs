// Licensed under the Apache-2.0 license

//! Common types and constants for the TWI driver modules.
//!
//! This module provides shared definitions for error handling, status and
//! command encodings, and configuration used across the master engine, the
//! target dispatcher and the session controller.

use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
use fugit::HertzU32;

pub const DEFAULT_FREQUENCY: HertzU32 = HertzU32::kHz(100);
pub const DEFAULT_CPU_CLOCK: HertzU32 = HertzU32::MHz(16);
/// Polls of a status register before a wait is declared stuck.
pub const DEFAULT_SPIN_LIMIT: u32 = 100_000;
pub const DEFAULT_ARBITRATION_RETRIES: u8 = 8;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum TwiSpeed {
    Standard = 100_000,
    Fast = 400_000,
    FastPlus = 1_000_000,
}

impl TwiSpeed {
    #[must_use]
    pub const fn frequency(self) -> HertzU32 {
        HertzU32::from_raw(self as u32)
    }
}

/// Failure classes reported by the master engine and the session controller.
///
/// `DataNack` and `BufferFull` are partial successes: the bus moved
/// `transferred` bytes before the transfer was cut short.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Bus state machine reports "unknown", the master was never brought up.
    BusNotReady,
    /// Nobody acknowledged the address byte.
    AddressNack,
    /// The target refused a data byte while more were staged.
    DataNack { transferred: usize },
    ArbitrationLost,
    BusError,
    /// The local ring buffer could not take (or stage) more bytes.
    BufferFull { transferred: usize },
    /// A status wait or the arbitration retry budget ran out.
    BusTimeout,
    /// The requested role, or a conflicting one, is already enabled.
    RoleAlreadyActive,
    /// The operation needs a role that is not enabled.
    RoleDisabled,
}

impl Error {
    /// Byte count in the legacy "zero or short count" convention.
    #[must_use]
    pub fn transferred(&self) -> usize {
        match *self {
            Error::DataNack { transferred } | Error::BufferFull { transferred } => transferred,
            _ => 0,
        }
    }
}

impl embedded_hal::i2c::Error for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Error::AddressNack => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address),
            Error::DataNack { .. } => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data),
            Error::ArbitrationLost => ErrorKind::ArbitrationLoss,
            Error::BusError => ErrorKind::Bus,
            Error::BufferFull { .. } => ErrorKind::Overrun,
            Error::BusNotReady
            | Error::BusTimeout
            | Error::RoleAlreadyActive
            | Error::RoleDisabled => ErrorKind::Other,
        }
    }
}

/// Bus state field of the master status register.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum BusState {
    Unknown = 0,
    Idle = 1,
    Owner = 2,
    Busy = 3,
}

/// Snapshot of the master status register.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct MasterStatus(pub u8);

impl MasterStatus {
    pub const READ_IF: u8 = 0x80;
    pub const WRITE_IF: u8 = 0x40;
    pub const CLKHOLD: u8 = 0x20;
    pub const RXACK: u8 = 0x10;
    pub const ARBLOST: u8 = 0x08;
    pub const BUSERR: u8 = 0x04;
    pub const BUSSTATE_MASK: u8 = 0x03;

    #[must_use]
    pub fn bus_state(self) -> BusState {
        match self.0 & Self::BUSSTATE_MASK {
            0 => BusState::Unknown,
            1 => BusState::Idle,
            2 => BusState::Owner,
            _ => BusState::Busy,
        }
    }

    #[must_use]
    pub fn read_complete(self) -> bool {
        self.0 & Self::READ_IF != 0
    }

    #[must_use]
    pub fn write_complete(self) -> bool {
        self.0 & Self::WRITE_IF != 0
    }

    /// The last address or data byte was not acknowledged.
    #[must_use]
    pub fn nacked(self) -> bool {
        self.0 & Self::RXACK != 0
    }

    #[must_use]
    pub fn arbitration_lost(self) -> bool {
        self.0 & Self::ARBLOST != 0
    }

    #[must_use]
    pub fn bus_error(self) -> bool {
        self.0 & Self::BUSERR != 0
    }
}

/// Snapshot of the target status register.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TargetStatus(pub u8);

impl TargetStatus {
    pub const DATA_IF: u8 = 0x80;
    pub const ADDR_STOP_IF: u8 = 0x40;
    pub const CLKHOLD: u8 = 0x20;
    pub const RXACK: u8 = 0x10;
    pub const COLLISION: u8 = 0x08;
    pub const BUSERR: u8 = 0x04;
    /// Master is reading from us.
    pub const DIR: u8 = 0x02;
    /// Set on an address interrupt, clear on a stop interrupt.
    pub const AP: u8 = 0x01;

    #[must_use]
    pub fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn has_bus_fault(self) -> bool {
        self.0 & (Self::BUSERR | Self::COLLISION) != 0
    }

    #[must_use]
    pub fn without_rxack(self) -> Self {
        Self(self.0 & !Self::RXACK)
    }
}

/// Master control register (enable and interrupt enables).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct MasterControl(pub u8);

impl MasterControl {
    pub const ENABLE: u8 = 0x01;

    pub const DISABLED: Self = Self(0);
    /// Enabled with interrupts off, the engine polls the status bits.
    pub const POLLED: Self = Self(Self::ENABLE);

    #[must_use]
    pub fn is_enabled(self) -> bool {
        self.0 & Self::ENABLE != 0
    }
}

/// Target control register.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TargetControl(pub u8);

impl TargetControl {
    pub const DATA_IE: u8 = 0x80;
    pub const ADDR_STOP_IE: u8 = 0x40;
    pub const STOP_IE: u8 = 0x20;
    pub const ENABLE: u8 = 0x01;

    pub const DISABLED: Self = Self(0);
    pub const INTERRUPT_DRIVEN: Self =
        Self(Self::DATA_IE | Self::ADDR_STOP_IE | Self::STOP_IE | Self::ENABLE);

    #[must_use]
    pub fn is_enabled(self) -> bool {
        self.0 & Self::ENABLE != 0
    }
}

/// Commands a master can issue through its control register.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MasterCommand {
    /// Acknowledge the byte just received and clock in the next one.
    AckContinue,
    Stop,
    /// Not-acknowledge the last byte, then stop.
    NackStop,
}

/// Commands a target can issue after servicing an interrupt.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TargetCommand {
    /// Acknowledge and continue with the next byte.
    AckContinue,
    /// Release the bus and wait for any start condition.
    Complete,
    /// Not-acknowledge, then wait for any start condition.
    NackComplete,
}

/// Events decoded by the target dispatcher.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TargetEvent {
    BusFault,
    Stop,
    WriteRequest,
    ReadRequest,
    DataReceived,
    /// Byte could not be buffered, transaction refused.
    Overflow,
    DataRequested,
    /// Master NACKed our byte, talker phase over.
    ReadDone,
    Illegal,
}

/// Address byte for a master write to `address`.
#[must_use]
pub const fn write_address(address: u8) -> u8 {
    (address << 1) & !0x01
}

/// Address byte for a master read from `address`.
#[must_use]
pub const fn read_address(address: u8) -> u8 {
    (address << 1) | 0x01
}

/// Whether master and target may be enabled at the same time.
///
/// Each role owns its own buffer pair; `Exclusive` only restricts the roles,
/// it does not share memory between them.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RoleMode {
    Exclusive,
    Simultaneous,
}

impl RoleMode {
    /// Mode selected by the `simultaneous` feature.
    #[must_use]
    pub const fn for_build() -> Self {
        if cfg!(feature = "simultaneous") {
            RoleMode::Simultaneous
        } else {
            RoleMode::Exclusive
        }
    }

    /// Would enabling a role conflict with the current role state?
    #[must_use]
    pub fn conflicts(self, same_role_enabled: bool, other_role_enabled: bool) -> bool {
        same_role_enabled || (other_role_enabled && self == RoleMode::Exclusive)
    }
}

/// Bounds on the master engine's busy-waits and retries.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Limits {
    /// Status polls per wait.
    pub spin_limit: u32,
    /// Address phases repeated after an arbitration loss.
    pub arbitration_retries: u8,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            spin_limit: DEFAULT_SPIN_LIMIT,
            arbitration_retries: DEFAULT_ARBITRATION_RETRIES,
        }
    }
}

pub struct TwiConfig {
    pub cpu_clock: HertzU32,
    pub frequency: HertzU32,
    pub spin_limit: u32,
    pub arbitration_retries: u8,
    pub roles: RoleMode,
}

impl TwiConfig {
    #[must_use]
    pub fn limits(&self) -> Limits {
        Limits {
            spin_limit: self.spin_limit,
            arbitration_retries: self.arbitration_retries,
        }
    }
}

impl Default for TwiConfig {
    fn default() -> Self {
        TwiConfigBuilder::new().build()
    }
}

pub struct TwiConfigBuilder {
    cpu_clock: HertzU32,
    frequency: HertzU32,
    spin_limit: u32,
    arbitration_retries: u8,
    roles: RoleMode,
}

impl Default for TwiConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TwiConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cpu_clock: DEFAULT_CPU_CLOCK,
            frequency: DEFAULT_FREQUENCY,
            spin_limit: DEFAULT_SPIN_LIMIT,
            arbitration_retries: DEFAULT_ARBITRATION_RETRIES,
            roles: RoleMode::for_build(),
        }
    }
    #[must_use]
    pub fn cpu_clock(mut self, clock: HertzU32) -> Self {
        self.cpu_clock = clock;
        self
    }
    #[must_use]
    pub fn speed(mut self, speed: TwiSpeed) -> Self {
        self.frequency = speed.frequency();
        self
    }
    #[must_use]
    pub fn frequency(mut self, frequency: HertzU32) -> Self {
        self.frequency = frequency;
        self
    }
    #[must_use]
    pub fn spin_limit(mut self, polls: u32) -> Self {
        self.spin_limit = polls.max(1);
        self
    }
    #[must_use]
    pub fn arbitration_retries(mut self, retries: u8) -> Self {
        self.arbitration_retries = retries;
        self
    }
    #[must_use]
    pub fn roles(mut self, roles: RoleMode) -> Self {
        self.roles = roles;
        self
    }
    #[must_use]
    pub fn build(self) -> TwiConfig {
        TwiConfig {
            cpu_clock: self.cpu_clock,
            frequency: self.frequency,
            spin_limit: self.spin_limit,
            arbitration_retries: self.arbitration_retries,
            roles: self.roles,
        }
    }
}
