/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
//! PLL feedback Multisynth (MSNA / MSNB).
//!
//! `Freq_VCO = Freq_REF * (a + b/c)` with `15 <= a + b/c <= 90`.

use crate::divider::{OutputDivider, RationalDivider};
use crate::fraction;
use crate::Error;

pub const MIN_RATIO: f64 = 15.0;
pub const MAX_RATIO: f64 = 90.0;

/// Feedback denominator required while the VCXO is in use.
pub const VCXO_DENOMINATOR: u32 = 1_000_000;

fn checked_ratio(reference_freq: f64, vco_freq: f64) -> Result<f64, Error> {
    if !(reference_freq > 0.0 && reference_freq.is_finite())
        || !(vco_freq > 0.0 && vco_freq.is_finite())
    {
        return Err(Error::InvalidInput);
    }

    let ratio = vco_freq / reference_freq;
    if ratio < MIN_RATIO || ratio > MAX_RATIO {
        return Err(Error::OutOfRange);
    }
    Ok(ratio)
}

/// Feedback divider that takes `reference_freq` to `vco_freq`.
pub fn solve(reference_freq: f64, vco_freq: f64) -> Result<RationalDivider, Error> {
    let ratio = checked_ratio(reference_freq, vco_freq)?;
    let divider = fraction::encode(ratio)?;
    log::debug!(
        "feedback ratio {} -> p1={} p2={} p3={} int={}",
        ratio,
        divider.p1,
        divider.p2,
        divider.p3,
        divider.integer_mode
    );
    Ok(divider)
}

/// Same as [`solve`], with the fraction expressed over `c = 10^6`.
///
/// PLLB must be programmed this way for the VCXO pull to be linear.
pub fn solve_vcxo(reference_freq: f64, vco_freq: f64) -> Result<RationalDivider, Error> {
    let ratio = checked_ratio(reference_freq, vco_freq)?;

    let mut a = libm::floor(ratio) as u32;
    let mut b = libm::round((ratio - f64::from(a)) * f64::from(VCXO_DENOMINATOR)) as u32;
    if b == VCXO_DENOMINATOR {
        a += 1;
        b = 0;
    }
    fraction::encode_rational(a, b, VCXO_DENOMINATOR)
}

/// VCO frequency programmed by `divider`.
pub fn invert(reference_freq: f64, divider: &RationalDivider) -> Result<f64, Error> {
    if !(reference_freq > 0.0 && reference_freq.is_finite()) {
        return Err(Error::InvalidInput);
    }
    if divider.divide_by_4 || divider.r_div != OutputDivider::Div1 {
        return Err(Error::InconsistentEncoding);
    }

    let ratio = fraction::decode(divider)?;
    if ratio < MIN_RATIO || ratio > MAX_RATIO {
        return Err(Error::OutOfRange);
    }
    Ok(reference_freq * ratio)
}
