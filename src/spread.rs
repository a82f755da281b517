/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
//! Spread spectrum on PLLA.
//!
//! ```text
//! SSUDP = Freq_PFD / (4 * 35100)
//! down:   SSDN = 64  * (a+b/c) * amp / ((1 + amp) * SSUDP)
//! center: SSDN = 128 * (a+b/c) * amp / ((1 + amp) * SSUDP)
//!         SSUP = 128 * (a+b/c) * amp / ((1 - amp) * SSUDP)
//! P1 = floor(SS), P2 = 32767 * (SS - P1), P3 = 32767
//! ```

use crate::Error;

const PERIOD_DIVISOR: f64 = 4.0 * 35_100.0;
const PERIOD_LIMIT: f64 = 65_536.0;
const PERIOD_MAX: u16 = 0x0FFF;

const LEG_P1_MAX: u16 = 0x0FFF;
/// `P3` of an active leg, also the scale of `P2`.
pub const LEG_DENOMINATOR: u16 = 32_767;

pub const DOWN_MIN_AMPLITUDE: f64 = -0.025;
pub const DOWN_MAX_AMPLITUDE: f64 = -0.001;
pub const CENTER_MAX_AMPLITUDE: f64 = 0.015;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SpreadMode {
    Down = 0,
    Center = 1,
}

/// One modulation leg, `P1 + P2/P3`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SpreadLeg {
    /// 12 bits.
    pub p1: u16,
    /// 15 bits.
    pub p2: u16,
    /// 15 bits.
    pub p3: u16,
}

impl SpreadLeg {
    /// The inactive up leg used in down-spread mode.
    pub const IDLE: SpreadLeg = SpreadLeg { p1: 0, p2: 0, p3: 1 };

    fn split(x: f64) -> Result<SpreadLeg, Error> {
        let x = libm::fabs(x);
        let p1 = libm::floor(x);
        if p1 > f64::from(LEG_P1_MAX) {
            return Err(Error::OutOfRange);
        }
        let p2 = libm::round(f64::from(LEG_DENOMINATOR) * (x - p1));

        Ok(SpreadLeg {
            p1: p1 as u16,
            p2: p2 as u16,
            p3: LEG_DENOMINATOR,
        })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SpreadSpectrum {
    pub mode: SpreadMode,
    /// `SSUDP`, 12 bits.
    pub up_down_period: u16,
    pub down: SpreadLeg,
    pub up: SpreadLeg,
}

fn up_down_period(pfd_freq: f64) -> Result<u16, Error> {
    if !pfd_freq.is_finite() || pfd_freq < 0.0 || pfd_freq / PERIOD_DIVISOR >= PERIOD_LIMIT {
        return Err(Error::InvalidInput);
    }

    let period = libm::round(pfd_freq / PERIOD_DIVISOR);
    if period < 1.0 {
        return Err(Error::InvalidInput);
    }
    if period > f64::from(PERIOD_MAX) {
        return Err(Error::OutOfRange);
    }
    Ok(period as u16)
}

/// Spread spectrum parameters for PLLA.
///
/// `amplitude` is a signed fraction: `-0.01` is a 1% down spread, `0.01` a
/// ±1% center spread. `pll_ratio` is the PLLA feedback ratio `a + b/c`.
pub fn solve(
    mode: SpreadMode,
    pfd_freq: f64,
    pll_ratio: f64,
    amplitude: f64,
) -> Result<SpreadSpectrum, Error> {
    let period = up_down_period(pfd_freq)?;
    if !(pll_ratio > 0.0 && pll_ratio.is_finite()) || !amplitude.is_finite() {
        return Err(Error::InvalidInput);
    }
    let period_f = f64::from(period);

    let (down, up) = match mode {
        SpreadMode::Down => {
            if amplitude < DOWN_MIN_AMPLITUDE || amplitude > DOWN_MAX_AMPLITUDE {
                return Err(Error::OutOfRange);
            }
            let down = 64.0 * pll_ratio * amplitude / ((1.0 + amplitude) * period_f);
            (SpreadLeg::split(down)?, SpreadLeg::IDLE)
        }
        SpreadMode::Center => {
            if amplitude < -CENTER_MAX_AMPLITUDE || amplitude > CENTER_MAX_AMPLITUDE {
                return Err(Error::OutOfRange);
            }
            let down = 128.0 * pll_ratio * amplitude / ((1.0 + amplitude) * period_f);
            let up = 128.0 * pll_ratio * amplitude / ((1.0 - amplitude) * period_f);
            (SpreadLeg::split(down)?, SpreadLeg::split(up)?)
        }
    };

    log::debug!(
        "spread {:?} amp={} period={} down={:?} up={:?}",
        mode,
        amplitude,
        period,
        down,
        up
    );

    Ok(SpreadSpectrum {
        mode,
        up_down_period: period,
        down,
        up,
    })
}
