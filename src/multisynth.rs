/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
//! Output Multisynth (MS0-MS5) and its R divider.
//!
//! `Freq_OUT = Freq_VCO / ((a + b/c) * R)` with `6 <= (a + b/c) * R <= 1800`.

use crate::divider::{OutputDivider, RationalDivider};
use crate::fraction;
use crate::Error;

pub const MIN_RATIO: f64 = 6.0;
pub const MAX_RATIO: f64 = 1800.0;

/// Smallest ratio the fractional Multisynth may be left with after the R
/// divider takes its share.
const MIN_RESIDUAL: f64 = 4.0;

/// Outputs above this frequency need the divide-by-4 escape.
pub const DIVIDE_BY_4_MIN_FREQ: f64 = 150_000_000.0;

const R_DIVIDERS: [OutputDivider; 8] = [
    OutputDivider::Div1,
    OutputDivider::Div2,
    OutputDivider::Div4,
    OutputDivider::Div8,
    OutputDivider::Div16,
    OutputDivider::Div32,
    OutputDivider::Div64,
    OutputDivider::Div128,
];

/// Whether the R divider may take one more halving than `exponent` and still
/// leave a legal, exactly representable Multisynth ratio.
fn halving_is_exact(total: f64, exponent: u8) -> bool {
    let scale = f64::from(1u32 << (exponent + 1));
    let residual = total / scale;

    residual >= MIN_RESIDUAL
        && fraction::is_exactly_representable(residual)
        && residual * scale == total
}

/// Picks the R divider for a total division ratio.
///
/// The R divider keeps halving the ratio while the halved ratio stays legal
/// and loses nothing to quantisation. When every candidate passes, the
/// exponent saturates at divide-by-128.
fn select_r_div(total: f64) -> OutputDivider {
    let found = R_DIVIDERS
        .iter()
        .copied()
        .find(|r_div| !halving_is_exact(total, r_div.exponent()));
    match found {
        Some(r_div) => r_div,
        None => {
            log::warn!("R divider saturated at 128 for total ratio {}", total);
            OutputDivider::Div128
        }
    }
}

/// Output divider that takes `vco_freq` to `output_freq`.
pub fn solve(vco_freq: f64, output_freq: f64) -> Result<RationalDivider, Error> {
    if !(vco_freq > 0.0 && vco_freq.is_finite()) || !(output_freq > 0.0 && output_freq.is_finite())
    {
        return Err(Error::InvalidInput);
    }

    let total = vco_freq / output_freq;
    if total < MIN_RATIO || total > MAX_RATIO {
        return Err(Error::OutOfRange);
    }

    let r_div = select_r_div(total);
    let residual = total / f64::from(r_div.denominator());
    let divider = fraction::encode(residual)?.with_r_div(r_div);

    log::debug!(
        "output ratio {} -> {:?} x {} p1={} p2={} p3={} int={}",
        total,
        r_div,
        residual,
        divider.p1,
        divider.p2,
        divider.p3,
        divider.integer_mode
    );
    Ok(divider)
}

/// Output frequency produced by `divider` from `vco_freq`.
pub fn invert(vco_freq: f64, divider: &RationalDivider) -> Result<f64, Error> {
    if !(vco_freq > 0.0 && vco_freq.is_finite()) {
        return Err(Error::InvalidInput);
    }

    let r = f64::from(divider.r_div.denominator());

    if divider.divide_by_4 {
        if !divider.is_divide_by_4_encoding() {
            return Err(Error::InconsistentEncoding);
        }
        return Ok(vco_freq / (4.0 * r));
    }

    let total = fraction::decode(divider)? * r;
    if total < MIN_RATIO || total > MAX_RATIO {
        return Err(Error::OutOfRange);
    }
    Ok(vco_freq / total)
}
