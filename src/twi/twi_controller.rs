// Licensed under the Apache-2.0 license

//! embedded-hal `I2c` front end for a bus session.
//!
//! Lets device drivers written against embedded-hal 1.0 run on top of the
//! buffered master engine. Consecutive operations in the same direction are
//! merged into one bus transfer; a change of direction is a repeated start
//! and only the final transfer ends with a stop. Every merged transfer has to
//! fit in the session's ring buffer. A NACK of any data byte, the last one
//! included, fails the operation with `NoAcknowledge(Data)`.

use crate::common::{Logger, NoOpLogger};
use crate::twi::common::Error;
use crate::twi::session::BusSession;
use crate::twi::traits::TwiHardware;
use embedded_hal::i2c::{Operation, SevenBitAddress};

pub struct TwiController<P: TwiHardware, const N: usize, L: Logger = NoOpLogger> {
    session: BusSession<P, N, L>,
}

fn same_direction(a: &Operation<'_>, b: &Operation<'_>) -> bool {
    matches!(
        (a, b),
        (Operation::Read(_), Operation::Read(_)) | (Operation::Write(_), Operation::Write(_))
    )
}

fn op_len(op: &Operation<'_>) -> usize {
    match op {
        Operation::Read(buf) => buf.len(),
        Operation::Write(bytes) => bytes.len(),
    }
}

impl<P: TwiHardware, const N: usize, L: Logger> TwiController<P, N, L> {
    /// Wrap a session whose master role is already running.
    pub fn new(session: BusSession<P, N, L>) -> Self {
        Self { session }
    }

    pub fn session(&mut self) -> &mut BusSession<P, N, L> {
        &mut self.session
    }

    pub fn release(self) -> BusSession<P, N, L> {
        self.session
    }

    fn write_group(
        &mut self,
        addr: SevenBitAddress,
        group: &[Operation<'_>],
        send_stop: bool,
    ) -> Result<(), Error> {
        self.session.begin_transmission(addr);
        for op in group {
            if let Operation::Write(bytes) = op {
                if self.session.write_bytes(bytes) != bytes.len() {
                    return Err(Error::BufferFull { transferred: 0 });
                }
            }
        }
        self.session.transmit(send_stop, false).map(|_| ())
    }

    fn read_group(
        &mut self,
        addr: SevenBitAddress,
        group: &mut [Operation<'_>],
        send_stop: bool,
    ) -> Result<(), Error> {
        let total: usize = group.iter().map(op_len).sum();
        if total >= N {
            return Err(Error::BufferFull { transferred: 0 });
        }
        // leftovers from byte-stream use would be read back first
        while self.session.read().is_some() {}

        let received = self.session.request_from(addr, total, send_stop)?;
        for op in group.iter_mut() {
            if let Operation::Read(buf) = op {
                for slot in buf.iter_mut() {
                    *slot = self.session.read().ok_or(Error::BufferFull {
                        transferred: received,
                    })?;
                }
            }
        }
        Ok(())
    }
}

impl<P: TwiHardware, const N: usize, L: Logger> embedded_hal::i2c::ErrorType
    for TwiController<P, N, L>
{
    type Error = Error;
}

impl<P: TwiHardware, const N: usize, L: Logger> embedded_hal::i2c::I2c for TwiController<P, N, L> {
    fn transaction(
        &mut self,
        addr: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let groups = operations.chunk_by(same_direction).count();
        for (index, group) in operations.chunk_by_mut(same_direction).enumerate() {
            let send_stop = index + 1 == groups;
            if matches!(group.first(), Some(Operation::Write(_))) {
                self.write_group(addr, group, send_stop)?;
            } else {
                self.read_group(addr, group, send_stop)?;
            }
        }
        Ok(())
    }
}
