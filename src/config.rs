/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
//! Chip variant and board configuration.

use crate::Error;

/// Members of the Si5351 family.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Variant {
    /// Si5351A, 10-MSOP, three outputs.
    A3,
    /// Si5351A, 20-QFN/24-QSOP, eight outputs.
    A8,
    /// Si5351B, crystal plus VCXO.
    B,
    /// Si5351C, crystal plus CLKIN.
    C,
}

impl Variant {
    pub fn clock_outputs(&self) -> u8 {
        match *self {
            Variant::A3 => 3,
            Variant::A8 | Variant::B | Variant::C => 8,
        }
    }

    pub fn has_vcxo(&self) -> bool {
        *self == Variant::B
    }

    pub fn has_clkin(&self) -> bool {
        *self == Variant::C
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CrystalLoad {
    _6,
    _8,
    _10,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ClkInDivider {
    Div1 = 0,
    Div2,
    Div4,
    Div8,
}

impl ClkInDivider {
    pub fn bits(&self) -> u8 {
        *self as u8
    }

    pub fn denominator(&self) -> u32 {
        1 << self.bits()
    }
}

/// CLKIN input of the Si5351C.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ClkIn {
    pub freq: u32,
    pub divider: ClkInDivider,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PllSource {
    Xtal,
    ClkIn,
}

const XTAL_FREQS: [u32; 2] = [25_000_000, 27_000_000];
const CLKIN_MIN_FREQ: u32 = 10_000_000;
const CLKIN_MAX_FREQ: u32 = 100_000_000;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Config {
    pub variant: Variant,
    /// State of the A0 address pin.
    pub address_bit: bool,
    pub xtal_freq: u32,
    pub crystal_load: CrystalLoad,
    pub clkin: Option<ClkIn>,
}

impl Config {
    pub fn new(variant: Variant, xtal_freq: u32) -> Self {
        Config {
            variant,
            address_bit: false,
            xtal_freq,
            crystal_load: CrystalLoad::_10,
            clkin: None,
        }
    }

    /// The Adafruit Si5351A breakout: three outputs, 25 MHz crystal.
    pub fn adafruit_module() -> Self {
        Config::new(Variant::A3, 25_000_000)
    }

    pub fn with_address_bit(self, address_bit: bool) -> Self {
        Config {
            address_bit,
            ..self
        }
    }

    pub fn with_crystal_load(self, crystal_load: CrystalLoad) -> Self {
        Config {
            crystal_load,
            ..self
        }
    }

    pub fn with_clkin(self, clkin: ClkIn) -> Self {
        Config {
            clkin: Some(clkin),
            ..self
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !XTAL_FREQS.contains(&self.xtal_freq) {
            return Err(Error::InvalidInput);
        }
        if let Some(clkin) = self.clkin {
            if !self.variant.has_clkin() || !(CLKIN_MIN_FREQ..=CLKIN_MAX_FREQ).contains(&clkin.freq)
            {
                return Err(Error::InvalidInput);
            }
        }
        Ok(())
    }

    /// Frequency seen by a PLL's phase detector for the given source.
    pub fn reference_freq(&self, source: PllSource) -> Result<f64, Error> {
        match source {
            PllSource::Xtal => Ok(f64::from(self.xtal_freq)),
            PllSource::ClkIn => match self.clkin {
                Some(clkin) => Ok(f64::from(clkin.freq) / f64::from(clkin.divider.denominator())),
                None => Err(Error::InvalidInput),
            },
        }
    }
}
