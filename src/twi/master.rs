// Licensed under the Apache-2.0 license

//! Blocking master transactions.
//!
//! Both directions walk the same phases: wait for the bus to be free, send
//! the address byte, then move data one byte at a time, polling the status
//! register between bytes. Every wait is bounded by `Limits::spin_limit` and
//! arbitration losses during the address phase are retried at most
//! `Limits::arbitration_retries` times.
//!
//! A transfer that ends without `send_stop` keeps the bus; the address phase
//! of the next transfer then goes out as a repeated start.

use crate::twi::common::{
    read_address, write_address, BusState, Error, Limits, MasterCommand, MasterStatus,
};
use crate::twi::ring_buffer::BufferPair;
use crate::twi::traits::TwiMasterRegs;

/// Poll `f` until it stops blocking, at most `limit` times.
fn spin<T>(limit: u32, mut f: impl FnMut() -> nb::Result<T, Error>) -> Result<T, Error> {
    for _ in 0..limit {
        match f() {
            Ok(value) => return Ok(value),
            Err(nb::Error::Other(e)) => return Err(e),
            Err(nb::Error::WouldBlock) => core::hint::spin_loop(),
        }
    }
    Err(Error::BusTimeout)
}

fn bus_free<P: TwiMasterRegs>(peripheral: &P) -> nb::Result<(), Error> {
    match peripheral.master_status().bus_state() {
        BusState::Unknown => Err(nb::Error::Other(Error::BusNotReady)),
        BusState::Busy => Err(nb::Error::WouldBlock),
        BusState::Idle | BusState::Owner => Ok(()),
    }
}

/// Address or data byte finished, in either direction.
fn byte_done<P: TwiMasterRegs>(peripheral: &P) -> nb::Result<MasterStatus, Error> {
    let status = peripheral.master_status();
    if status.write_complete() || status.read_complete() {
        Ok(status)
    } else {
        Err(nb::Error::WouldBlock)
    }
}

fn fault(status: MasterStatus) -> Option<Error> {
    if status.arbitration_lost() {
        Some(Error::ArbitrationLost)
    } else if status.bus_error() {
        Some(Error::BusError)
    } else {
        None
    }
}

fn ensure_ready<P: TwiMasterRegs>(peripheral: &P) -> Result<(), Error> {
    if peripheral.master_status().bus_state() == BusState::Unknown {
        Err(Error::BusNotReady)
    } else {
        Ok(())
    }
}

/// Win the bus and put `address_byte` on it.
///
/// Returns the status after the address phase. A stuck wait after the address
/// went out releases the bus with a stop before reporting the timeout.
fn address_phase<P: TwiMasterRegs>(
    peripheral: &mut P,
    address_byte: u8,
    limits: &Limits,
) -> Result<MasterStatus, Error> {
    let mut losses = 0u8;
    loop {
        spin(limits.spin_limit, || bus_free(peripheral))?;
        peripheral.write_address(address_byte);
        let status = spin(limits.spin_limit, || byte_done(peripheral))
            .inspect_err(|_| peripheral.command(MasterCommand::Stop))?;

        if !status.arbitration_lost() {
            return Ok(status);
        }
        if losses >= limits.arbitration_retries {
            return Err(Error::BusTimeout);
        }
        losses += 1;
    }
}

/// Send everything staged in `buffers.tx` to `address`.
///
/// A byte leaves the queue only once the target acknowledged it. On success
/// the count of bytes put on the bus is returned. Any NACK of a data byte,
/// the last one included, is `Error::DataNack` carrying the count with the
/// NACKed byte; callers that accept a NACK on the final byte decide that
/// themselves. Anything left in `tx` after a failure is discarded.
pub fn write<P: TwiMasterRegs, const N: usize>(
    peripheral: &mut P,
    buffers: &mut BufferPair<N>,
    address: u8,
    send_stop: bool,
    limits: &Limits,
) -> Result<usize, Error> {
    let result = write_staged(peripheral, buffers, address, send_stop, limits);
    if result.is_err() {
        buffers.tx.reset();
    }
    result
}

fn write_staged<P: TwiMasterRegs, const N: usize>(
    peripheral: &mut P,
    buffers: &mut BufferPair<N>,
    address: u8,
    mut send_stop: bool,
    limits: &Limits,
) -> Result<usize, Error> {
    ensure_ready(peripheral)?;
    address_phase(peripheral, write_address(address), limits)?;

    let mut written = 0usize;
    let mut nacked = false;
    loop {
        let status = peripheral.master_status();
        if let Some(e) = fault(status) {
            return Err(e);
        }
        if status.nacked() {
            send_stop = true;
            nacked = true;
            break;
        }
        if written > 0 {
            // previous byte was acknowledged
            buffers.tx.pop();
        }
        let Some(byte) = buffers.tx.peek() else {
            break;
        };
        peripheral.write_data(byte);
        written += 1;
        spin(limits.spin_limit, || byte_done(peripheral))
            .inspect_err(|_| peripheral.command(MasterCommand::Stop))?;
    }

    if send_stop {
        peripheral.command(MasterCommand::Stop);
    }

    if !nacked {
        return Ok(written);
    }
    if written == 0 {
        return Err(Error::AddressNack);
    }
    Err(Error::DataNack {
        transferred: written,
    })
}

/// Read up to `count` bytes from `address` into `buffers.rx`.
///
/// Every byte but the last is acknowledged. When `rx` fills up first the
/// transfer is cut short with a NACK and stop, and the bytes already received
/// are reported through `Error::BufferFull`. Any other failure leaves `rx` as
/// it was before the call.
pub fn read<P: TwiMasterRegs, const N: usize>(
    peripheral: &mut P,
    buffers: &mut BufferPair<N>,
    address: u8,
    count: usize,
    send_stop: bool,
    limits: &Limits,
) -> Result<usize, Error> {
    let before = buffers.rx.available();
    let result = read_into(peripheral, buffers, address, count, send_stop, limits);
    if matches!(&result, Err(e) if !matches!(e, Error::BufferFull { .. })) {
        buffers.rx.truncate(before);
    }
    result
}

fn read_into<P: TwiMasterRegs, const N: usize>(
    peripheral: &mut P,
    buffers: &mut BufferPair<N>,
    address: u8,
    count: usize,
    mut send_stop: bool,
    limits: &Limits,
) -> Result<usize, Error> {
    ensure_ready(peripheral)?;
    let status = address_phase(peripheral, read_address(address), limits)?;
    if let Some(e) = fault(status) {
        return Err(e);
    }
    if status.nacked() {
        peripheral.command(MasterCommand::NackStop);
        return Err(Error::AddressNack);
    }

    let mut received = 0usize;
    let mut overflow = false;
    while received < count {
        let status = peripheral.master_status();
        if let Some(e) = fault(status) {
            return Err(e);
        }
        if buffers.rx.is_full() {
            send_stop = true;
            overflow = true;
            break;
        }
        let byte = peripheral.read_data();
        buffers.rx.try_push(byte);
        received += 1;

        if received < count {
            peripheral.command(MasterCommand::AckContinue);
            spin(limits.spin_limit, || byte_done(peripheral))
                .inspect_err(|_| peripheral.command(MasterCommand::NackStop))?;
        }
    }

    if send_stop {
        peripheral.command(MasterCommand::NackStop);
    }

    if overflow {
        Err(Error::BufferFull {
            transferred: received,
        })
    } else {
        Ok(received)
    }
}
