/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
//! Fractional divider encoding.
//!
//! ```text
//! P1[17:0] = 128 * a + floor(128 * b / c) - 512
//! P2[19:0] = 128 * b - c * floor(128 * b / c)
//! P3[19:0] = c
//! ```
//!
//! Ratios computed from frequencies are always encoded over the fixed
//! denominator `c = 2^19`.

use crate::divider::{OutputDivider, RationalDivider, P1_LIMIT, P2_LIMIT, P3_LIMIT};
use crate::Error;

/// Fixed denominator used when a ratio is encoded from a real number.
pub const FRAC_DENOMINATOR: u32 = 1 << 19;

/// Smallest integer part the P1 field can express.
const MIN_INTEGER_PART: u32 = 4;

/// Encodes `ratio` as `a + b/2^19`.
pub fn encode(ratio: f64) -> Result<RationalDivider, Error> {
    if !ratio.is_finite() {
        return Err(Error::InvalidInput);
    }
    if ratio < MIN_INTEGER_PART as f64 || ratio >= P1_LIMIT as f64 {
        return Err(Error::OutOfRange);
    }

    let a = libm::floor(ratio);
    let b = libm::floor((ratio - a) * FRAC_DENOMINATOR as f64);

    encode_rational(a as u32, b as u32, FRAC_DENOMINATOR)
}

/// Encodes an exact `a + b/c`.
pub fn encode_rational(a: u32, b: u32, c: u32) -> Result<RationalDivider, Error> {
    if c == 0 || c >= P3_LIMIT || b >= c {
        return Err(Error::InvalidInput);
    }
    if a < MIN_INTEGER_PART {
        return Err(Error::OutOfRange);
    }

    let (a, b, c) = (u64::from(a), u64::from(b), u64::from(c));

    let (integer_mode, p1, p2) = if b == 0 {
        (true, 128 * a - 512, 0)
    } else {
        let ratio = 128 * b / c;
        (false, 128 * a + ratio - 512, 128 * b - c * ratio)
    };

    if p1 >= u64::from(P1_LIMIT) {
        return Err(Error::OutOfRange);
    }

    Ok(RationalDivider {
        integer_mode,
        p1: p1 as u32,
        p2: p2 as u32,
        p3: c as u32,
        r_div: OutputDivider::Div1,
        divide_by_4: false,
    })
}

/// Recovers `a + b/c` from the register fields.
///
/// The R divider and divide-by-4 flags are not applied here.
pub fn decode(divider: &RationalDivider) -> Result<f64, Error> {
    if divider.p1 >= P1_LIMIT || divider.p2 >= P2_LIMIT || divider.p3 == 0 || divider.p3 >= P3_LIMIT
    {
        return Err(Error::InconsistentEncoding);
    }

    if divider.integer_mode {
        if divider.p2 != 0 {
            return Err(Error::InconsistentEncoding);
        }
        Ok(f64::from((divider.p1 + 512) >> 7))
    } else {
        Ok(f64::from(divider.p1) / 128.0
            + 4.0
            + f64::from(divider.p2) / (128.0 * f64::from(divider.p3)))
    }
}

/// True when the fractional part of `ratio` survives quantisation to
/// `1/2^19` without loss.
pub(crate) fn is_exactly_representable(ratio: f64) -> bool {
    let frac = ratio - libm::floor(ratio);
    let scaled = frac * FRAC_DENOMINATOR as f64;
    libm::floor(scaled) == scaled
}
