/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
/*!
Fractional-N frequency synthesis for the [Si5351], plus a platform agnostic
driver based on the [`embedded-hal`] traits.

## The Device

The Silicon Labs [Si5351] is an any-frequency CMOS clock generator. Two PLLs
(A and B) multiply a crystal or CLKIN reference up to a VCO frequency, and up
to eight Multisynth dividers divide a VCO back down to the output clocks.

Every fractional divider on the chip is programmed as `a + b/c` through three
register fields:

```text
P1[17:0] = 128 * a + floor(128 * b / c) - 512
P2[19:0] = 128 * b - c * floor(128 * b / c)
P3[19:0] = c
```

## The math

The calculations are pure functions over `f64` hertz and never touch the bus:

* [`fraction`] encodes a ratio into `(P1, P2, P3)` and decodes it back,
* [`pll`] solves the PLL feedback divider (ratio 15..=90),
* [`multisynth`] solves an output divider and its R divider (ratio 6..=1800),
* [`spread`] computes spread spectrum parameters for PLLA,
* [`vcxo`] computes the VCXO pull-range parameter (Si5351B).

```
use si5351_fracn::{multisynth, pll};

let feedback = pll::solve(25_000_000.0, 800_000_000.0)?;
let vco = pll::invert(25_000_000.0, &feedback)?;
let output = multisynth::solve(vco, 10_000_000.0)?;
assert_eq!(multisynth::invert(vco, &output)?, 10_000_000.0);
# Ok::<(), si5351_fracn::Error>(())
```

## Usage

Instantiate the device with an `embedded_hal` I²C implementation:

```ignore
use si5351_fracn::{Config, Si5351, Si5351Device, ClockOutput, PLL};

let mut clock = Si5351Device::new(i2c, Config::adafruit_module())?;
clock.init()?;
clock.configure_output(PLL::A, ClockOutput::Clk0, 800_000_000.0, 14_175_000.0)?;
```

[Si5351]: https://www.silabs.com/documents/public/data-sheets/Si5351-B.pdf
[`embedded-hal`]: https://github.com/japaric/embedded-hal
*/
#![cfg_attr(not(test), no_std)]

#[macro_use]
extern crate bitflags;
use embedded_hal as hal;

use core::fmt;

pub mod config;
pub mod device;
pub mod divider;
pub mod fraction;
pub mod multisynth;
pub mod pll;
pub mod register;
pub mod spread;
pub mod vcxo;

pub use crate::config::{ClkIn, ClkInDivider, Config, CrystalLoad, PllSource, Variant};
pub use crate::device::{Si5351, Si5351Device};
pub use crate::divider::{OutputDivider, RationalDivider};
pub use crate::register::{ClockOutput, DeviceStatusBits, Multisynth, PLL};
pub use crate::spread::{SpreadLeg, SpreadMode, SpreadSpectrum};
pub use crate::vcxo::VcxoPull;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Error {
    /// The I²C transfer failed.
    CommunicationError,
    /// A frequency, amplitude or selector makes no sense for the chip.
    InvalidInput,
    /// A computed ratio or field falls outside the chip's legal window.
    OutOfRange,
    /// Register fields that cannot describe a divider.
    InconsistentEncoding,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::CommunicationError => write!(f, "Communication Error"),
            Error::InvalidInput => write!(f, "Invalid Input"),
            Error::OutOfRange => write!(f, "Out Of Range"),
            Error::InconsistentEncoding => write!(f, "Inconsistent Encoding"),
        }
    }
}
