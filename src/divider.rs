/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
//! The divider value shared by every fractional divider on the chip.

use crate::Error;

/// `P1` is 18 bits wide.
pub const P1_LIMIT: u32 = 1 << 18;
/// `P2` and `P3` are 20 bits wide.
pub const P2_LIMIT: u32 = 1 << 20;
pub const P3_LIMIT: u32 = 1 << 20;

/// R divider behind an output Multisynth, `1 << exponent`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OutputDivider {
    Div1 = 0,
    Div2,
    Div4,
    Div8,
    Div16,
    Div32,
    Div64,
    Div128,
}

impl OutputDivider {
    pub fn from_exponent(exponent: u8) -> Result<OutputDivider, Error> {
        match exponent {
            0 => Ok(OutputDivider::Div1),
            1 => Ok(OutputDivider::Div2),
            2 => Ok(OutputDivider::Div4),
            3 => Ok(OutputDivider::Div8),
            4 => Ok(OutputDivider::Div16),
            5 => Ok(OutputDivider::Div32),
            6 => Ok(OutputDivider::Div64),
            7 => Ok(OutputDivider::Div128),
            _ => Err(Error::OutOfRange),
        }
    }

    pub fn exponent(&self) -> u8 {
        *self as u8
    }

    pub fn denominator(&self) -> u32 {
        1 << self.exponent()
    }
}

impl Default for OutputDivider {
    fn default() -> Self {
        OutputDivider::Div1
    }
}

/// A fractional divider `a + b/c` in its register form.
///
/// Produced by [`crate::pll::solve`] and [`crate::multisynth::solve`], turned
/// back into a ratio by [`crate::fraction::decode`]. For PLL feedback dividers
/// `r_div` is always [`OutputDivider::Div1`] and `divide_by_4` is false.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RationalDivider {
    /// The fractional remainder is zero and the chip's `INT` bit may be set.
    pub integer_mode: bool,
    /// `128 * a + floor(128 * b / c) - 512`, 18 bits.
    pub p1: u32,
    /// `128 * b - c * floor(128 * b / c)`, 20 bits.
    pub p2: u32,
    /// `c`, 20 bits, never zero.
    pub p3: u32,
    /// Power-of-two pre-divider exponent (output dividers only).
    pub r_div: OutputDivider,
    /// `MSx_DIVBY4` escape for outputs above 150 MHz.
    pub divide_by_4: bool,
}

impl RationalDivider {
    /// The fixed divide-by-4 setting, `P1 = 0, P2 = 0, P3 = 1, INT = 1`.
    pub fn divide_by_4(r_div: OutputDivider) -> Self {
        RationalDivider {
            integer_mode: true,
            p1: 0,
            p2: 0,
            p3: 1,
            r_div,
            divide_by_4: true,
        }
    }

    pub fn with_r_div(self, r_div: OutputDivider) -> Self {
        RationalDivider { r_div, ..self }
    }

    /// Field widths the register map can hold.
    pub fn fits_registers(&self) -> bool {
        self.p1 < P1_LIMIT && self.p2 < P2_LIMIT && self.p3 > 0 && self.p3 < P3_LIMIT
    }

    pub(crate) fn is_divide_by_4_encoding(&self) -> bool {
        self.integer_mode && self.p1 == 0 && self.p2 == 0 && self.p3 == 1
    }
}
