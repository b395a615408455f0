// Licensed under the Apache-2.0 license

//! Routing of bus interrupts to the target port that owns the peripheral.
//!
//! Target ports are moved into a fixed-size table at start-up. The interrupt
//! handler of each peripheral instance calls [`SessionRegistry::on_interrupt`]
//! with that instance's id; foreground code reaches a port through
//! [`SessionRegistry::with`] for short configuration calls. Both run inside a
//! critical section, so the table never needs unsafe access. Blocking master
//! transfers go through the `BusSession`, which stays outside the table.
//!
//! ```ignore
//! static BUSES: SessionRegistry<TargetPort<Twi0, 32>, 2> = SessionRegistry::new();
//!
//! #[interrupt]
//! fn TWI0_TWIS() {
//!     BUSES.on_interrupt(0);
//! }
//! ```

use core::cell::RefCell;

use critical_section::Mutex;
use heapless::Vec;

/// Something the interrupt handler can forward a bus event to.
pub trait BusEventTarget {
    /// Hardware instance this object serves.
    fn peripheral_id(&self) -> u8;

    /// Service one bus event. Must not block.
    fn on_bus_event(&mut self);
}

pub struct SessionRegistry<S, const M: usize> {
    sessions: Mutex<RefCell<Vec<S, M>>>,
}

impl<S: BusEventTarget, const M: usize> SessionRegistry<S, M> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sessions: Mutex::new(RefCell::new(Vec::new())),
        }
    }

    /// Add a session. It is handed back if the table is full or its
    /// peripheral already has a session.
    pub fn register(&self, session: S) -> Result<(), S> {
        critical_section::with(|cs| {
            let mut sessions = self.sessions.borrow_ref_mut(cs);
            let id = session.peripheral_id();
            if sessions.iter().any(|s| s.peripheral_id() == id) {
                return Err(session);
            }
            sessions.push(session)
        })
    }

    /// Take the session for `id` back out of the table.
    pub fn unregister(&self, id: u8) -> Option<S> {
        critical_section::with(|cs| {
            let mut sessions = self.sessions.borrow_ref_mut(cs);
            let index = sessions.iter().position(|s| s.peripheral_id() == id)?;
            Some(sessions.swap_remove(index))
        })
    }

    /// Run `f` on the session for `id` with interrupts masked.
    pub fn with<R>(&self, id: u8, f: impl FnOnce(&mut S) -> R) -> Option<R> {
        critical_section::with(|cs| {
            let mut sessions = self.sessions.borrow_ref_mut(cs);
            sessions.iter_mut().find(|s| s.peripheral_id() == id).map(f)
        })
    }

    /// Interrupt entry point. Returns false if no session owns `id`.
    pub fn on_interrupt(&self, id: u8) -> bool {
        self.with(id, BusEventTarget::on_bus_event).is_some()
    }

    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.sessions.borrow_ref(cs).len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S: BusEventTarget, const M: usize> Default for SessionRegistry<S, M> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::NoOpLogger;
    use crate::twi::common::{RoleMode, TargetStatus};
    use crate::twi::mock::MockTwi;
    use crate::twi::target_port::TargetPort;

    struct Counter {
        id: u8,
        events: u32,
    }

    impl BusEventTarget for Counter {
        fn peripheral_id(&self) -> u8 {
            self.id
        }

        fn on_bus_event(&mut self) {
            self.events += 1;
        }
    }

    fn counter(id: u8) -> Counter {
        Counter { id, events: 0 }
    }

    #[test]
    fn interrupts_reach_the_owning_session() {
        let registry: SessionRegistry<Counter, 2> = SessionRegistry::new();
        assert!(registry.register(counter(0)).is_ok());
        assert!(registry.register(counter(1)).is_ok());

        assert!(registry.on_interrupt(1));
        assert!(registry.on_interrupt(1));
        assert!(registry.on_interrupt(0));
        assert!(!registry.on_interrupt(7));

        assert_eq!(registry.with(0, |c| c.events), Some(1));
        assert_eq!(registry.with(1, |c| c.events), Some(2));
    }

    #[test]
    fn full_table_and_duplicates_are_refused() {
        let registry: SessionRegistry<Counter, 1> = SessionRegistry::new();
        assert!(registry.register(counter(0)).is_ok());

        let rejected = registry.register(counter(0)).err().map(|c| c.id);
        assert_eq!(rejected, Some(0));
        assert!(registry.register(counter(1)).is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unregister_returns_the_session() {
        let registry: SessionRegistry<Counter, 2> = SessionRegistry::new();
        registry.register(counter(3)).ok();
        registry.on_interrupt(3);

        let session = registry.unregister(3).map(|c| c.events);
        assert_eq!(session, Some(1));
        assert!(registry.is_empty());
        assert!(!registry.on_interrupt(3));
    }

    static BUSES: SessionRegistry<TargetPort<MockTwi, 16>, 2> = SessionRegistry::new();

    #[test]
    fn static_table_drives_a_target_port() {
        let mut port = TargetPort::new(MockTwi::new(5), RoleMode::Exclusive, NoOpLogger);
        port.begin_target(0x20, false, 0).unwrap();
        assert!(BUSES.register(port).is_ok());

        let staged = BUSES.with(5, |p| {
            let twi = p.peripheral_mut();
            twi.target_status = TargetStatus(0x61);
            twi.target_data_in = 0x40;
        });
        assert!(staged.is_some());
        assert!(BUSES.on_interrupt(5));
        assert_eq!(BUSES.with(5, |p| p.incoming_address()), Some(0x40));
    }
}
