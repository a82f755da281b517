/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
//! VCXO pull range (Si5351B, PLLB only).
//!
//! `VCXO_Param[21:0] = 1.03 * 128 * (a+b/c) * APR`, where 1.03 is the
//! datasheet's margin so the full pull range is reached.

use crate::Error;

const MARGIN: f64 = 1.03;
const PARAM_MAX: u32 = (1 << 22) - 1;

/// The 22-bit `VCXO_Param` register value.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct VcxoPull(u32);

impl VcxoPull {
    pub fn from_bits(bits: u32) -> Result<VcxoPull, Error> {
        if bits > PARAM_MAX {
            return Err(Error::InconsistentEncoding);
        }
        Ok(VcxoPull(bits))
    }

    pub(crate) fn truncate(bits: u32) -> VcxoPull {
        VcxoPull(bits & PARAM_MAX)
    }

    pub fn bits(&self) -> u32 {
        self.0
    }
}

/// Pull parameter for a PLLB feedback ratio and a ±`pull_range_ppm` range
/// (typically 30 or 60).
pub fn solve(pll_ratio: f64, pull_range_ppm: u16) -> Result<VcxoPull, Error> {
    if !pll_ratio.is_finite() || pll_ratio < 0.0 {
        return Err(Error::InvalidInput);
    }

    let param = libm::round(MARGIN * 128.0 * pll_ratio * f64::from(pull_range_ppm));
    if param > f64::from(PARAM_MAX) {
        return Err(Error::OutOfRange);
    }
    Ok(VcxoPull(param as u32))
}
