// Licensed under the Apache-2.0 license

//! Two-wire (TWI/I2C) bus driver.
//!
//! Each peripheral instance is driven by two halves. `BusSession` runs
//! blocking master transfers from foreground code behind a byte-stream API;
//! `TargetPort` owns the target buffers and callbacks and is serviced from
//! the bus interrupt through a `SessionRegistry`. Register access goes
//! through the traits in [`traits`], so the protocol code is independent of
//! the silicon variant.

pub mod baud;
pub mod common;
pub mod master;
pub mod registry;
pub mod ring_buffer;
pub mod session;
pub mod target;
pub mod target_port;
pub mod traits;
pub mod twi_controller;

#[cfg(test)]
pub(crate) mod mock;

pub use common::{Error, RoleMode, TwiConfig, TwiConfigBuilder, TwiSpeed};
pub use registry::{BusEventTarget, SessionRegistry};
pub use ring_buffer::{BufferPair, RingBuffer};
pub use session::BusSession;
pub use target::TargetContext;
pub use target_port::TargetPort;
pub use twi_controller::TwiController;
