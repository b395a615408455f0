// Licensed under the Apache-2.0 license

//! Bus clock timing.
//!
//! The master baud register sets SCL high/low time in CPU clock cycles. The
//! datasheet formula ignores the rise time of the bus lines, so each speed band
//! carries an assumed rise time plus an offset measured on real boards. Offsets
//! differ between slow (<= 16 MHz) and fast CPU clocks.

use crate::twi::common::{BusState, MasterControl};
use crate::twi::traits::TwiMasterRegs;
use fugit::HertzU32;

pub const BAUD_MIN: u8 = 1;
pub const BAUD_MAX: u8 = 255;

/// CPU clocks above this use `ClockTable::FAST_CPU`.
pub const FAST_CPU_THRESHOLD: u32 = 16_000_000;

/// Above this bus frequency the fast-mode-plus drivers are switched on.
pub const FAST_MODE_PLUS_THRESHOLD: u32 = 800_000;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Band {
    /// <= 100 kHz
    Standard,
    /// <= 400 kHz
    Fast,
    /// <= 800 kHz
    FastExtended,
    /// > 800 kHz
    FastPlus,
}

impl Band {
    #[must_use]
    pub fn of(frequency_hz: u32) -> Self {
        match frequency_hz {
            0..=100_000 => Band::Standard,
            100_001..=400_000 => Band::Fast,
            400_001..=800_000 => Band::FastExtended,
            _ => Band::FastPlus,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BandTiming {
    /// Assumed bus rise time in nanoseconds.
    pub rise_time_ns: u32,
    /// Empirical correction in baud steps.
    pub offset: i32,
}

impl BandTiming {
    #[must_use]
    pub const fn new(rise_time_ns: u32, offset: i32) -> Self {
        Self {
            rise_time_ns,
            offset,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ClockTable {
    pub standard: BandTiming,
    pub fast: BandTiming,
    pub fast_extended: BandTiming,
    pub fast_plus: BandTiming,
}

impl ClockTable {
    pub const FAST_CPU: Self = Self {
        standard: BandTiming::new(1000, 6),
        fast: BandTiming::new(300, 1),
        fast_extended: BandTiming::new(120, 0),
        fast_plus: BandTiming::new(120, -1),
    };

    pub const SLOW_CPU: Self = Self {
        standard: BandTiming::new(1000, 8),
        fast: BandTiming::new(300, 1),
        fast_extended: BandTiming::new(120, 0),
        fast_plus: BandTiming::new(120, -1),
    };

    #[must_use]
    pub fn for_cpu(cpu_clock: HertzU32) -> Self {
        if cpu_clock.to_Hz() > FAST_CPU_THRESHOLD {
            Self::FAST_CPU
        } else {
            Self::SLOW_CPU
        }
    }

    #[must_use]
    pub fn timing(&self, band: Band) -> BandTiming {
        match band {
            Band::Standard => self.standard,
            Band::Fast => self.fast,
            Band::FastExtended => self.fast_extended,
            Band::FastPlus => self.fast_plus,
        }
    }
}

/// Baud register value for `frequency` at `cpu_clock`, clamped to `[1, 255]`.
///
/// `baud = cpu / (2 f) - (5 + cpu_MHz * t_rise / 2000) + offset`
#[must_use]
pub fn calc_baud(cpu_clock: HertzU32, frequency: HertzU32) -> u8 {
    let cpu = u64::from(cpu_clock.to_Hz());
    let freq = u64::from(frequency.to_Hz());
    if freq == 0 {
        return BAUD_MAX;
    }

    let timing = ClockTable::for_cpu(cpu_clock).timing(Band::of(frequency.to_Hz()));
    let cpu_mhz = cpu / 1_000_000;
    let rise_cycles = 5 + (cpu_mhz * u64::from(timing.rise_time_ns)) / 2000;

    let half_period = i64::try_from(cpu / (2 * freq)).unwrap_or(i64::MAX);
    let rise = i64::try_from(rise_cycles).unwrap_or(i64::MAX);
    let baud = half_period
        .saturating_sub(rise)
        .saturating_add(i64::from(timing.offset));

    let clamped = baud.clamp(i64::from(BAUD_MIN), i64::from(BAUD_MAX));
    u8::try_from(clamped).unwrap_or(BAUD_MAX)
}

/// Program the bus clock. Returns false if the register already held the value.
///
/// Leaving an unchanged register alone matters: some device drivers set the
/// clock before every transfer, and rewriting it would disturb the bus. The
/// master is disabled around the write and, if it was running, re-enabled and
/// forced to idle as the peripheral requires after a timing change.
pub fn set_baud<P: TwiMasterRegs>(
    peripheral: &mut P,
    cpu_clock: HertzU32,
    frequency: HertzU32,
) -> bool {
    let new_baud = calc_baud(cpu_clock, frequency);
    if new_baud == peripheral.baud() {
        return false;
    }

    let restore = peripheral.master_control();
    peripheral.set_master_control(MasterControl::DISABLED);
    peripheral.set_baud(new_baud);
    peripheral.set_fast_mode_plus(frequency.to_Hz() > FAST_MODE_PLUS_THRESHOLD);

    if restore.is_enabled() {
        peripheral.set_master_control(restore);
        peripheral.set_bus_state(BusState::Idle);
    }
    true
}
