// Licensed under the Apache-2.0 license

//! Logging hooks shared by the driver modules.
//!
//! Drivers take a `L: Logger` type parameter so that a build without a
//! console pays nothing for diagnostics. `UartLogger` forwards to any
//! `embedded_io::Write` sink, typically the debug UART.

use embedded_io::Write;

pub trait Logger {
    fn debug(&mut self, msg: &str);
    fn error(&mut self, msg: &str);
}

/// Discards every message.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    fn debug(&mut self, _msg: &str) {}
    fn error(&mut self, _msg: &str) {}
}

/// Line-oriented logger over a byte sink.
///
/// Write errors are dropped: a failing console must never take the bus
/// driver down with it.
pub struct UartLogger<W: Write> {
    writer: W,
}

impl<W: Write> UartLogger<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Gives the sink back, e.g. to reuse the UART for something else.
    pub fn release(self) -> W {
        self.writer
    }

    fn line(&mut self, level: &str, msg: &str) {
        let _ = self.writer.write_all(level.as_bytes());
        let _ = self.writer.write_all(msg.as_bytes());
        let _ = self.writer.write_all(b"\r\n");
    }
}

impl<W: Write> Logger for UartLogger<W> {
    fn debug(&mut self, msg: &str) {
        self.line("[twi] ", msg);
    }

    fn error(&mut self, msg: &str) {
        self.line("[twi] error: ", msg);
    }
}
