/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
//! The I²C driver.

use log::{debug, trace};

use crate::config::{Config, CrystalLoad, PllSource};
use crate::divider::{OutputDivider, RationalDivider};
use crate::hal::blocking::i2c::{Write, WriteRead};
use crate::multisynth::DIVIDE_BY_4_MIN_FREQ;
use crate::register::{
    self, ClockControlBits, ClockOutput, CrystalLoadBits, DeviceStatusBits, FractionalMultisynth,
    Multisynth, PLLResetBits, PllInputSourceBits, Register, SpreadSpectrumBits, ADDRESS,
    MULTISYNTH_BLOCK_LEN, PHASE_OFFSET_MASK, PLL, SPREAD_SPECTRUM_BLOCK_LEN, VCXO_BLOCK_LEN,
};
use crate::spread::{SpreadMode, SpreadSpectrum};
use crate::vcxo::VcxoPull;
use crate::{fraction, multisynth, pll, spread, vcxo, Error};

/// Longest block write: the spread spectrum registers plus the address byte.
const MAX_WRITE_LEN: usize = SPREAD_SPECTRUM_BLOCK_LEN + 1;

/// `FBA_INT` / `FBB_INT` in registers 22 and 23.
const FB_INT: u8 = 0b0100_0000;

const CLK_REGS: [Register; 8] = [
    Register::Clk0,
    Register::Clk1,
    Register::Clk2,
    Register::Clk3,
    Register::Clk4,
    Register::Clk5,
    Register::Clk6,
    Register::Clk7,
];

fn i2c_error<E>(_: E) -> Error {
    Error::CommunicationError
}

/// Si5351 driver
pub struct Si5351Device<I2C> {
    i2c: I2C,
    address: u8,
    config: Config,
    clk_enabled_mask: u8,
    ms_int_mode_mask: u8,
    ms_src_mask: u8,
}

pub trait Si5351 {
    /// Waits for the chip to leave system init, powers down and disables
    /// every output, and programs the crystal load and PLL sources.
    fn init(&mut self) -> Result<(), Error>;
    fn read_device_status(&mut self) -> Result<DeviceStatusBits, Error>;

    /// Programs a PLL feedback divider and its `FBx_INT` bit.
    fn write_pll(&mut self, pll: PLL, divider: &RationalDivider) -> Result<(), Error>;
    fn read_pll(&mut self, pll: PLL) -> Result<RationalDivider, Error>;

    /// Programs an output Multisynth and the `MSx_INT` bit of its clock.
    fn write_multisynth(&mut self, ms: Multisynth, divider: &RationalDivider) -> Result<(), Error>;
    fn read_multisynth(&mut self, ms: Multisynth) -> Result<RationalDivider, Error>;

    /// Tunes `pll` to `vco_freq` and drives `clk` from it at `output_freq`.
    ///
    /// Above 150 MHz the output uses the divide-by-4 setting and the PLL is
    /// tuned to `4 * output_freq` instead of `vco_freq`.
    fn configure_output(
        &mut self,
        pll: PLL,
        clk: ClockOutput,
        vco_freq: f64,
        output_freq: f64,
    ) -> Result<(), Error>;

    /// VCO frequency as programmed in the chip.
    fn vco_frequency(&mut self, pll: PLL) -> Result<f64, Error>;
    /// Output frequency as programmed in the chip.
    fn output_frequency(&mut self, clk: ClockOutput) -> Result<f64, Error>;

    /// Enables spread spectrum on PLLA, computed from its current feedback
    /// divider. `amplitude` is a signed fraction, see [`spread::solve`].
    fn set_spread_spectrum(
        &mut self,
        mode: SpreadMode,
        amplitude: f64,
    ) -> Result<SpreadSpectrum, Error>;
    fn disable_spread_spectrum(&mut self) -> Result<(), Error>;
    /// The programmed spread spectrum settings, `None` while disabled.
    fn read_spread_spectrum(&mut self) -> Result<Option<SpreadSpectrum>, Error>;

    /// Programs the VCXO pull range from PLLB's current feedback divider.
    fn set_vcxo_pull(&mut self, pull_range_ppm: u16) -> Result<VcxoPull, Error>;
    fn read_vcxo_pull(&mut self) -> Result<VcxoPull, Error>;

    fn set_pll_source(&mut self, pll: PLL, source: PllSource) -> Result<(), Error>;

    /// Writes the 7 bit phase offset of an output, in units of a quarter
    /// VCO period.
    fn set_phase(&mut self, clk: ClockOutput, phase: u8) -> Result<(), Error>;
    fn read_phase(&mut self, clk: ClockOutput) -> Result<u8, Error>;

    fn set_clock_enabled(&mut self, clk: ClockOutput, enabled: bool) -> Result<(), Error>;
    fn flush_output_enabled(&mut self) -> Result<(), Error>;

    fn reset_pll(&mut self, pll: PLL) -> Result<(), Error>;
}

impl<I2C, E> Si5351Device<I2C>
where
    I2C: WriteRead<Error = E> + Write<Error = E>,
{
    /// Creates a new driver from a I2C peripheral
    pub fn new(i2c: I2C, config: Config) -> Result<Self, Error> {
        config.validate()?;

        Ok(Si5351Device {
            i2c,
            address: ADDRESS | if config.address_bit { 1 } else { 0 },
            config,
            clk_enabled_mask: 0,
            ms_int_mode_mask: 0,
            ms_src_mask: 0,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Gives the I2C peripheral back.
    pub fn release(self) -> I2C {
        self.i2c
    }

    fn check_clock(&self, clk: ClockOutput) -> Result<(), Error> {
        if clk.ix() >= self.config.variant.clock_outputs() {
            return Err(Error::InvalidInput);
        }
        Ok(())
    }

    fn output_multisynth(&self, clk: ClockOutput) -> Result<Multisynth, Error> {
        self.check_clock(clk)?;
        clk.multisynth().ok_or(Error::InvalidInput)
    }

    fn read_register(&mut self, reg: Register) -> Result<u8, Error> {
        let mut buffer = [0u8; 1];
        self.i2c
            .write_read(self.address, &[reg.addr()], &mut buffer)
            .map_err(i2c_error)?;
        trace!("read  reg {} = {:#04x}", reg.addr(), buffer[0]);
        Ok(buffer[0])
    }

    fn write_register(&mut self, reg: Register, byte: u8) -> Result<(), Error> {
        trace!("write reg {} = {:#04x}", reg.addr(), byte);
        self.i2c
            .write(self.address, &[reg.addr(), byte])
            .map_err(i2c_error)
    }

    fn modify_register(&mut self, reg: Register, mask: u8, bits: u8) -> Result<(), Error> {
        let value = self.read_register(reg)?;
        self.write_register(reg, (value & !mask) | (bits & mask))
    }

    fn read_block(&mut self, base: u8, buffer: &mut [u8]) -> Result<(), Error> {
        self.i2c
            .write_read(self.address, &[base], buffer)
            .map_err(i2c_error)
    }

    fn write_block(&mut self, base: u8, params: &[u8]) -> Result<(), Error> {
        let len = params.len() + 1;
        if len > MAX_WRITE_LEN {
            return Err(Error::InvalidInput);
        }

        let mut buffer = [0u8; MAX_WRITE_LEN];
        buffer[0] = base;
        buffer[1..len].copy_from_slice(params);
        debug!("write block at {}: {:02x?}", base, params);
        self.i2c
            .write(self.address, &buffer[..len])
            .map_err(i2c_error)
    }

    fn write_synth_registers<MS: FractionalMultisynth>(
        &mut self,
        ms: MS,
        divider: &RationalDivider,
    ) -> Result<(), Error> {
        let params = register::pack_multisynth(divider)?;
        self.write_block(ms.base_addr(), &params)
    }

    fn read_synth_registers<MS: FractionalMultisynth>(
        &mut self,
        ms: MS,
    ) -> Result<[u8; MULTISYNTH_BLOCK_LEN], Error> {
        let mut params = [0u8; MULTISYNTH_BLOCK_LEN];
        self.read_block(ms.base_addr(), &mut params)?;
        Ok(params)
    }

    fn pll_source(&mut self, pll: PLL) -> Result<PllSource, Error> {
        let bits = PllInputSourceBits::from_bits_truncate(
            self.read_register(Register::PllInputSource)?,
        );
        let src = match pll {
            PLL::A => PllInputSourceBits::PLLA_SRC,
            PLL::B => PllInputSourceBits::PLLB_SRC,
        };
        Ok(if bits.contains(src) {
            PllSource::ClkIn
        } else {
            PllSource::Xtal
        })
    }

    fn reference_freq(&mut self, pll: PLL) -> Result<f64, Error> {
        let source = self.pll_source(pll)?;
        self.config.reference_freq(source)
    }

    fn pll_ratio(&mut self, pll: PLL) -> Result<f64, Error> {
        let feedback = self.read_pll(pll)?;
        fraction::decode(&feedback)
    }

    fn select_clock_pll(&mut self, clk: ClockOutput, pll: PLL) {
        let bit = 1u8 << clk.ix();
        match pll {
            PLL::A => self.ms_src_mask &= !bit,
            PLL::B => self.ms_src_mask |= bit,
        }
    }

    fn flush_clock_control(&mut self, clk: ClockOutput) -> Result<(), Error> {
        let bit = 1u8 << clk.ix();
        let clk_control_pdn = if self.clk_enabled_mask & bit != 0 {
            ClockControlBits::empty()
        } else {
            ClockControlBits::CLK_PDN
        };

        let ms_int_mode = if self.ms_int_mode_mask & bit == 0 {
            ClockControlBits::empty()
        } else {
            ClockControlBits::MS_INT
        };

        let ms_src = if self.ms_src_mask & bit == 0 {
            ClockControlBits::empty()
        } else {
            ClockControlBits::MS_SRC
        };

        let base = ClockControlBits::CLK_SRC_MS | ClockControlBits::CLK_DRV_8;

        self.write_register(
            clk.register(),
            (clk_control_pdn | ms_int_mode | ms_src | base).bits(),
        )
    }

    fn phase_register(&self, clk: ClockOutput) -> Result<Register, Error> {
        self.check_clock(clk)?;
        clk.phase_register().ok_or(Error::InvalidInput)
    }

    fn program_output(
        &mut self,
        pll: PLL,
        ms: Multisynth,
        feedback: &RationalDivider,
        output: &RationalDivider,
    ) -> Result<(), Error> {
        self.write_pll(pll, feedback)?;
        self.write_multisynth(ms, output)?;
        self.reset_pll(pll)
    }

    fn require_vcxo(&self) -> Result<(), Error> {
        if !self.config.variant.has_vcxo() {
            return Err(Error::InvalidInput);
        }
        Ok(())
    }
}

impl<I2C, E> Si5351 for Si5351Device<I2C>
where
    I2C: WriteRead<Error = E> + Write<Error = E>,
{
    fn init(&mut self) -> Result<(), Error> {
        loop {
            let device_status = self.read_device_status()?;
            if !device_status.contains(DeviceStatusBits::SYS_INIT) {
                break;
            }
        }

        self.clk_enabled_mask = 0;
        self.ms_int_mode_mask = 0;
        self.ms_src_mask = 0;
        self.flush_output_enabled()?;
        for &reg in CLK_REGS.iter() {
            self.write_register(reg, ClockControlBits::CLK_PDN.bits())?;
        }

        self.write_register(
            Register::CrystalLoad,
            (CrystalLoadBits::RESERVED
                | match self.config.crystal_load {
                    CrystalLoad::_6 => CrystalLoadBits::CL_6,
                    CrystalLoad::_8 => CrystalLoadBits::CL_8,
                    CrystalLoad::_10 => CrystalLoadBits::CL_10,
                })
            .bits(),
        )?;

        let clkin_div = self
            .config
            .clkin
            .map(|clkin| clkin.divider.bits() << 6)
            .unwrap_or(0);
        self.write_register(Register::PllInputSource, clkin_div)?;

        debug!("initialised {:?}", self.config);
        Ok(())
    }

    fn read_device_status(&mut self) -> Result<DeviceStatusBits, Error> {
        Ok(DeviceStatusBits::from_bits_truncate(
            self.read_register(Register::DeviceStatus)?,
        ))
    }

    fn write_pll(&mut self, pll: PLL, divider: &RationalDivider) -> Result<(), Error> {
        if divider.divide_by_4 || divider.r_div != OutputDivider::Div1 {
            return Err(Error::InvalidInput);
        }

        let ms = pll.multisynth();
        self.write_synth_registers(ms, divider)?;
        self.modify_register(
            ms.int_register(),
            FB_INT,
            if divider.integer_mode { FB_INT } else { 0 },
        )
    }

    fn read_pll(&mut self, pll: PLL) -> Result<RationalDivider, Error> {
        let ms = pll.multisynth();
        let params = self.read_synth_registers(ms)?;
        let integer_mode = self.read_register(ms.int_register())? & FB_INT != 0;
        register::unpack_multisynth(&params, integer_mode)
    }

    fn write_multisynth(&mut self, ms: Multisynth, divider: &RationalDivider) -> Result<(), Error> {
        let clk = ms.clock_output();
        self.check_clock(clk)?;
        if divider.divide_by_4 && !divider.is_divide_by_4_encoding() {
            return Err(Error::InconsistentEncoding);
        }

        self.write_synth_registers(ms, divider)?;

        let bit = 1u8 << clk.ix();
        if divider.integer_mode {
            self.ms_int_mode_mask |= bit;
        } else {
            self.ms_int_mode_mask &= !bit;
        }
        self.flush_clock_control(clk)
    }

    fn read_multisynth(&mut self, ms: Multisynth) -> Result<RationalDivider, Error> {
        let clk = ms.clock_output();
        self.check_clock(clk)?;

        let params = self.read_synth_registers(ms)?;
        let control = ClockControlBits::from_bits_truncate(self.read_register(clk.register())?);
        register::unpack_multisynth(&params, control.contains(ClockControlBits::MS_INT))
    }

    fn configure_output(
        &mut self,
        pll: PLL,
        clk: ClockOutput,
        vco_freq: f64,
        output_freq: f64,
    ) -> Result<(), Error> {
        let ms = self.output_multisynth(clk)?;
        if !(output_freq > 0.0 && output_freq.is_finite()) {
            return Err(Error::InvalidInput);
        }

        let divide_by_4 = output_freq > DIVIDE_BY_4_MIN_FREQ;
        let vco_freq = if divide_by_4 {
            4.0 * output_freq
        } else {
            vco_freq
        };

        let reference = self.reference_freq(pll)?;
        let feedback = if pll == PLL::B && self.config.variant.has_vcxo() {
            pll::solve_vcxo(reference, vco_freq)?
        } else {
            pll::solve(reference, vco_freq)?
        };
        let vco_freq = pll::invert(reference, &feedback)?;
        let output = if divide_by_4 {
            RationalDivider::divide_by_4(OutputDivider::Div1)
        } else {
            multisynth::solve(vco_freq, output_freq)?
        };

        debug!(
            "{:?} from PLL {:?}: vco={} out={} divby4={}",
            clk, pll, vco_freq, output_freq, divide_by_4
        );

        let (enabled_mask, src_mask) = (self.clk_enabled_mask, self.ms_src_mask);
        self.select_clock_pll(clk, pll);
        self.clk_enabled_mask |= 1u8 << clk.ix();
        if let Err(e) = self.program_output(pll, ms, &feedback, &output) {
            self.clk_enabled_mask = enabled_mask;
            self.ms_src_mask = src_mask;
            return Err(e);
        }
        self.flush_output_enabled()
    }

    fn vco_frequency(&mut self, pll: PLL) -> Result<f64, Error> {
        let reference = self.reference_freq(pll)?;
        let feedback = self.read_pll(pll)?;
        pll::invert(reference, &feedback)
    }

    fn output_frequency(&mut self, clk: ClockOutput) -> Result<f64, Error> {
        let ms = self.output_multisynth(clk)?;
        let control = ClockControlBits::from_bits_truncate(self.read_register(clk.register())?);
        let pll = if control.contains(ClockControlBits::MS_SRC) {
            PLL::B
        } else {
            PLL::A
        };

        let vco_freq = self.vco_frequency(pll)?;
        let divider = self.read_multisynth(ms)?;
        multisynth::invert(vco_freq, &divider)
    }

    fn set_spread_spectrum(
        &mut self,
        mode: SpreadMode,
        amplitude: f64,
    ) -> Result<SpreadSpectrum, Error> {
        let pfd_freq = self.reference_freq(PLL::A)?;
        let ratio = self.pll_ratio(PLL::A)?;
        let ssc = spread::solve(mode, pfd_freq, ratio, amplitude)?;

        let tail_addr = Register::SpreadSpectrum.addr() + SPREAD_SPECTRUM_BLOCK_LEN as u8 - 1;
        let mut tail = [0u8; 1];
        self.read_block(tail_addr, &mut tail)?;

        let params = register::pack_spread_spectrum(&ssc, true, tail[0])?;
        self.write_block(Register::SpreadSpectrum.addr(), &params)?;
        Ok(ssc)
    }

    fn disable_spread_spectrum(&mut self) -> Result<(), Error> {
        self.modify_register(
            Register::SpreadSpectrum,
            SpreadSpectrumBits::SSC_EN.bits(),
            0,
        )
    }

    fn read_spread_spectrum(&mut self) -> Result<Option<SpreadSpectrum>, Error> {
        let mut params = [0u8; SPREAD_SPECTRUM_BLOCK_LEN];
        self.read_block(Register::SpreadSpectrum.addr(), &mut params)?;
        let (ssc, enabled) = register::unpack_spread_spectrum(&params);
        Ok(if enabled { Some(ssc) } else { None })
    }

    fn set_vcxo_pull(&mut self, pull_range_ppm: u16) -> Result<VcxoPull, Error> {
        self.require_vcxo()?;
        let ratio = self.pll_ratio(PLL::B)?;
        let pull = vcxo::solve(ratio, pull_range_ppm)?;
        self.write_block(Register::VcxoParam.addr(), &register::pack_vcxo(pull))?;
        Ok(pull)
    }

    fn read_vcxo_pull(&mut self) -> Result<VcxoPull, Error> {
        self.require_vcxo()?;
        let mut params = [0u8; VCXO_BLOCK_LEN];
        self.read_block(Register::VcxoParam.addr(), &mut params)?;
        Ok(register::unpack_vcxo(&params))
    }

    fn set_pll_source(&mut self, pll: PLL, source: PllSource) -> Result<(), Error> {
        let src = match pll {
            PLL::A => PllInputSourceBits::PLLA_SRC,
            PLL::B => PllInputSourceBits::PLLB_SRC,
        };
        // the CLKIN divider is shared, only touch it when selecting CLKIN
        let (mask, bits) = match (source, self.config.clkin) {
            (PllSource::Xtal, _) => (src, PllInputSourceBits::empty()),
            (PllSource::ClkIn, Some(clkin)) if self.config.variant.has_clkin() => (
                src | PllInputSourceBits::CLKIN_DIV_MASK,
                src | PllInputSourceBits::from_bits_truncate(clkin.divider.bits() << 6),
            ),
            (PllSource::ClkIn, _) => return Err(Error::InvalidInput),
        };

        debug!("PLL {:?} source {:?}", pll, source);
        self.modify_register(Register::PllInputSource, mask.bits(), bits.bits())
    }

    fn set_phase(&mut self, clk: ClockOutput, phase: u8) -> Result<(), Error> {
        let reg = self.phase_register(clk)?;
        self.write_register(reg, phase & PHASE_OFFSET_MASK)
    }

    fn read_phase(&mut self, clk: ClockOutput) -> Result<u8, Error> {
        let reg = self.phase_register(clk)?;
        Ok(self.read_register(reg)? & PHASE_OFFSET_MASK)
    }

    fn set_clock_enabled(&mut self, clk: ClockOutput, enabled: bool) -> Result<(), Error> {
        self.check_clock(clk)?;
        let bit = 1u8 << clk.ix();
        if enabled {
            self.clk_enabled_mask |= bit;
        } else {
            self.clk_enabled_mask &= !bit;
        }
        if clk.multisynth().is_some() {
            self.flush_clock_control(clk)?;
        }
        Ok(())
    }

    fn flush_output_enabled(&mut self) -> Result<(), Error> {
        let mask = self.clk_enabled_mask;
        self.write_register(Register::OutputEnable, !mask)
    }

    fn reset_pll(&mut self, pll: PLL) -> Result<(), Error> {
        let bits = match pll {
            PLL::A => PLLResetBits::PLLA_RST,
            PLL::B => PLLResetBits::PLLB_RST,
        };
        self.modify_register(
            Register::PLLReset,
            (PLLResetBits::PLLA_RST | PLLResetBits::PLLB_RST).bits(),
            bits.bits(),
        )
    }
}
