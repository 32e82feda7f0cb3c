#![cfg_attr(not(test), no_std)]

//! # BME280 Environmental Sensor Driver
//!
//! A type-safe, `no_std` driver for the Bosch BME280 on an `embedded-hal` I2C bus.
//! The typestate pattern makes sure the identity check and calibration load
//! have happened before any measurement is taken.
//!
//! ## Features
//! - **Fixed-Point Arithmetic**: the datasheet integer formulas, bit for bit. No FPU required.
//! - **Forced and Normal Mode**: one-shot measurements with a back-off status poll,
//!   or continuous sampling with a timer-driven wake signal.
//! - **Structural `t_fine`**: pressure and humidity can only be computed from the
//!   temperature step of the same sample.
//!
//! ## Units
//! - **Temperature**: Centigrade (C * 100) -> 2508 = 25.08 °C
//! - **Pressure**: Pascal in Q24.8 -> 25767233 / 256 = 100653 Pa
//! - **Humidity**: %RH in Q22.10 -> 39969 / 1024 = 39.03 %

mod calc;
mod calib;
mod periodic;
mod regs;
mod settings;


use core::fmt;
use core::marker::PhantomData;
use embedded_hal::{delay::DelayNs, i2c};

pub use calc::{FineTemperature, Sample};
pub use calib::{CalibData, CALIB_SIZE};
pub use periodic::{Periodic, TimerError, WakeSignal, WakeTimer};
pub use settings::{Bme280Builder, Config, IIRFilter, Oversampling, OversamplingConfig, Standby};

use calib::calib_mem;

/// I2C address with SDO pulled high.
pub const ADDRESS_PRIMARY: u8 = 0x77;
/// I2C address with SDO tied to GND.
pub const ADDRESS_SECONDARY: u8 = 0x76;

/// Memory address and size for the measurement data registers.
mod raw_data_mem {
    pub const ADDR: u8 = super::regs::ADDR_PRESS_MSB;
    pub const SIZE: usize = 8;
}

/// Initial delay of the status poll.
const POLL_INITIAL_DELAY_MS: u32 = 2;
/// The poll delay doubles up to this value and then stays there.
const POLL_MAX_DELAY_MS: u32 = 32_768;

// --- Typestates ---

/// Driver created, identity not checked and calibration not loaded.
pub struct Uninitialized;
/// Identity verified and calibration decoded. Measurements are allowed.
pub struct Ready;

/// Error types for the BME280 driver.
pub mod error {
    /// Errors that can occur during communication or measurement.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub enum Bme280Error<E> {
        /// I2C bus error. Not retried.
        I2CError(E),
        /// The ID register did not read `0x60`. Carries the byte that was read.
        IdentityMismatch(u8),
        /// The status poll exceeded its budget. No data was read.
        Timeout,
        /// The platform timer refused to start; the sensor was put back to sleep.
        TimerUnavailable,
    }

    /// Result type alias for BME280 operations.
    pub type Result<T, E> = core::result::Result<T, Bme280Error<E>>;
}

/// Duration wrapper for type-safety. Stored in milliseconds.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Milliseconds(pub u32);

/// Power mode as last commanded by this driver.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceMode {
    #[default]
    Sleep,
    /// One measurement in flight; the chip drops back to sleep by itself.
    Forced,
    /// Continuous measurement with the given standby time.
    Normal(Standby),
}

/// Uncompensated ADC values from one burst read of 0xF7..0xFE.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawData {
    pub(crate) press_adc: u32,
    pub(crate) temp_adc: u32,
    pub(crate) hum_adc: u16,
}

impl RawData {
    pub const fn new(press_adc: u32, temp_adc: u32, hum_adc: u16) -> Self {
        Self {
            press_adc,
            temp_adc,
            hum_adc,
        }
    }

    /// Fans out the 8-byte measurement block.
    ///
    /// Pressure and temperature are the top 20 bits of a big-endian 24-bit
    /// field (`msb`, `lsb`, `xlsb[7:4]`); humidity is a plain big-endian u16.
    pub fn from_bytes(buffer: &[u8; raw_data_mem::SIZE]) -> Self {
        let press_adc =
            ((buffer[0] as u32) << 12) | ((buffer[1] as u32) << 4) | ((buffer[2] as u32) >> 4);
        let temp_adc =
            ((buffer[3] as u32) << 12) | ((buffer[4] as u32) << 4) | ((buffer[5] as u32) >> 4);
        let hum_adc = u16::from_be_bytes([buffer[6], buffer[7]]);

        Self {
            press_adc,
            temp_adc,
            hum_adc,
        }
    }

    pub fn pressure_adc(&self) -> u32 {
        self.press_adc
    }

    pub fn temperature_adc(&self) -> u32 {
        self.temp_adc
    }

    pub fn humidity_adc(&self) -> u16 {
        self.hum_adc
    }
}

/// Intermediate temperature values used for compensation.
///
/// `temp_fine` feeds the pressure and humidity formulas.
#[derive(Debug, Copy, Clone, Default)]
pub(crate) struct CalcTempData {
    pub(crate) temp_fine: i32,
    pub(crate) temp_comp: i32,
}

/// Decoded STATUS register (0xF3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status(u8);

impl Status {
    pub fn is_measuring(&self) -> bool {
        self.0 & (regs::STATUS_MEASURING | regs::STATUS_MEASURING_LEGACY) != 0
    }

    pub fn is_updating(&self) -> bool {
        self.0 & regs::STATUS_IM_UPDATE != 0
    }

    /// Data registers are stable once neither a conversion nor an NVM copy runs.
    pub fn is_ready(&self) -> bool {
        !self.is_measuring() && !self.is_updating()
    }
}

/// Represents temperature in Centigrade (degrees Celsius * 100).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Temperature(pub i32);

impl Temperature {
    /// Splits the fixed-point value into degrees and hundredths.
    ///
    /// ```rust
    /// use bme280_driver::Temperature;
    /// let temp = Temperature(2508);
    /// assert_eq!(temp.split(), (25, 8)); // 25.08 °C
    /// ```
    pub fn split(&self) -> (i32, i32) {
        (self.0 / 100, self.0 % 100)
    }
}

/// Atmospheric pressure in Pascal, Q24.8 fixed point.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Pressure(pub u32);

impl Pressure {
    /// Whole pascals.
    pub fn pascals(&self) -> u32 {
        self.0 >> 8
    }

    /// Converts to hectopascal and splits at the decimal point.
    ///
    /// ```rust
    /// use bme280_driver::Pressure;
    /// let press = Pressure(25_767_233);
    /// assert_eq!(press.pascals(), 100_653);
    /// assert_eq!(press.as_hpa(), (1006, 53)); // 1006.53 hPa
    /// ```
    pub fn as_hpa(&self) -> (u32, u32) {
        let pa = self.pascals();
        (pa / 100, pa % 100)
    }
}

/// Relative humidity in percent, Q22.10 fixed point.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Humidity(pub u32);

impl Humidity {
    /// Whole percent.
    pub fn percent(&self) -> u32 {
        self.0 >> 10
    }

    /// Splits into whole percent and thousandths.
    ///
    /// ```rust
    /// use bme280_driver::Humidity;
    /// let hum = Humidity(39_969);
    /// assert_eq!(hum.split(), (39, 32)); // 39.032 %
    /// ```
    pub fn split(&self) -> (u32, u32) {
        (self.percent(), ((self.0 & 0x3FF) * 1000) >> 10)
    }
}

/// Compensated measurement result in physical units.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Measurement {
    pub temp: Temperature,
    pub pres: Pressure,
    pub hum: Humidity,
}

/// The main BME280 driver structure.
///
/// This is the whole device context: bus, slave address, calibration,
/// last raw reading, configuration and mode. Several sensors just means
/// several values of this type.
pub struct Bme280<I2C, STATE> {
    i2c: I2C,
    address: u8,
    calib_data: CalibData,
    raw_data: RawData,
    config: Config,
    mode: DeviceMode,
    _state: PhantomData<STATE>,
}

impl<I2C, STATE> fmt::Debug for Bme280<I2C, STATE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bme280")
            .field("address", &self.address)
            .field("config", &self.config)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl<I2C> Bme280<I2C, Uninitialized> {
    /// Creates a new driver instance. Does not touch the bus.
    ///
    /// # Arguments
    /// * `i2c` - The I2C bus object.
    /// * `address` - [`ADDRESS_PRIMARY`] (0x77) or [`ADDRESS_SECONDARY`] (0x76).
    pub fn new(i2c: I2C, address: u8) -> Self {
        Bme280 {
            i2c,
            address,
            calib_data: CalibData::default(),
            raw_data: RawData::default(),
            config: Config::default(),
            mode: DeviceMode::Sleep,
            _state: PhantomData,
        }
    }
}

impl<I2C, STATE, E> Bme280<I2C, STATE>
where
    I2C: i2c::I2c<Error = E>,
{
    /// Performs a soft-reset. All registers return to their reset values.
    ///
    /// The chip needs 2 ms start-up time afterwards.
    pub fn soft_reset(&mut self, delay: &mut impl DelayNs) -> error::Result<(), E> {
        self.write_reg(&[regs::ADDR_RESET, regs::SOFT_RESET_CMD])?;
        delay.delay_ms(2);
        self.mode = DeviceMode::Sleep;
        Ok(())
    }

    /// Reads the Chip ID (expected value: 0x60).
    pub fn read_chip_id(&mut self) -> error::Result<u8, E> {
        self.read_reg_byte(regs::ADDR_CHIP_ID)
    }

    /// Gives the bus back.
    pub fn release(self) -> I2C {
        self.i2c
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Reads data from a starting register address into a provided buffer.
    fn read_into(&mut self, reg_address: u8, buffer: &mut [u8]) -> error::Result<(), E> {
        self.i2c
            .write_read(self.address, &[reg_address], buffer)
            .map_err(error::Bme280Error::I2CError)
    }

    /// Reads a single byte from a specific register address.
    fn read_reg_byte(&mut self, reg_address: u8) -> error::Result<u8, E> {
        let mut buffer = [0];
        self.read_into(reg_address, &mut buffer)?;
        Ok(buffer[0])
    }

    /// Writes a byte slice (typically `[Register, Value]`) to the sensor.
    fn write_reg(&mut self, data: &[u8]) -> error::Result<(), E> {
        self.i2c
            .write(self.address, data)
            .map_err(error::Bme280Error::I2CError)
    }
}

impl<I2C, E> Bme280<I2C, Uninitialized>
where
    I2C: i2c::I2c<Error = E>,
{
    /// Checks the chip identity and loads the factory calibration.
    ///
    /// This transitions the driver from `Uninitialized` to `Ready`. A failure
    /// at any step aborts without retry.
    ///
    /// # Errors
    /// [`IdentityMismatch`](error::Bme280Error::IdentityMismatch) if something
    /// other than a BME280 answers, `I2CError` if any transfer fails. The
    /// unopened driver comes back with the error, so the bus can still be
    /// [`release`](Bme280::release)d.
    pub fn open(
        mut self,
    ) -> core::result::Result<Bme280<I2C, Ready>, (Self, error::Bme280Error<E>)> {
        let calib_data = match self.identify_and_calibrate() {
            Ok(calib_data) => calib_data,
            Err(e) => return Err((self, e)),
        };

        Ok(Bme280 {
            i2c: self.i2c,
            address: self.address,
            calib_data,
            raw_data: RawData::default(),
            config: self.config,
            mode: DeviceMode::Sleep,
            _state: PhantomData,
        })
    }

    fn identify_and_calibrate(&mut self) -> error::Result<CalibData, E> {
        let chip_id = self.read_chip_id()?;
        if chip_id != regs::CHIP_ID {
            #[cfg(feature = "defmt")]
            defmt::warn!("bme280: unexpected chip id {=u8:#x}", chip_id);
            return Err(error::Bme280Error::IdentityMismatch(chip_id));
        }

        let calib_data = self.get_calib_data()?;

        #[cfg(feature = "defmt")]
        defmt::debug!("bme280: calibration loaded {}", calib_data);

        Ok(calib_data)
    }

    /// Reads both calibration blocks into one image and decodes it.
    fn get_calib_data(&mut self) -> error::Result<CalibData, E> {
        let mut buffer = [0u8; calib_mem::TOTAL_SIZE];

        // calib00..calib25 (0x88..0xA1), then calib26..calib32 (0xE1..0xE7)
        for block in 0..calib_mem::ADDR.len() {
            self.read_calib_block(block, &mut buffer)?;
        }

        Ok(CalibData::from_bytes(&buffer))
    }

    /// Reads calibration block `block` into its slot of `image`.
    fn read_calib_block(
        &mut self,
        block: usize,
        image: &mut [u8; calib_mem::TOTAL_SIZE],
    ) -> error::Result<(), E> {
        let start = calib_mem::OFFSETS[block];
        let end = start + calib_mem::SIZES[block];
        self.read_into(calib_mem::ADDR[block], &mut image[start..end])
    }
}

impl<I2C, E> Bme280<I2C, Ready>
where
    I2C: i2c::I2c<Error = E>,
{
    /// Applies a measurement configuration.
    ///
    /// Writes `ctrl_hum` and the IIR filter field of `config` right away (the
    /// chip should be asleep for `config` writes to stick). Temperature and
    /// pressure oversampling go out with the next mode change.
    pub fn configure(&mut self, config: Config) -> error::Result<(), E> {
        self.config = config;
        self.write_reg(&[regs::ADDR_CTRL_HUM, config.osrs_config.hum_osrs as u8])?;

        let register = self.read_reg_byte(regs::ADDR_CONFIG)?;
        // Keep t_sb [7:5] and spi3w_en [0], replace filter [4:2]
        let new_reg_val = (register & 0xE3) | ((config.iir_filter as u8) << 2);
        self.write_reg(&[regs::ADDR_CONFIG, new_reg_val])
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn calibration(&self) -> &CalibData {
        &self.calib_data
    }

    pub fn mode(&self) -> DeviceMode {
        self.mode
    }

    pub fn status(&mut self) -> error::Result<Status, E> {
        Ok(Status(self.read_reg_byte(regs::ADDR_STATUS)?))
    }

    /// Starts a single measurement cycle ('Forced Mode').
    ///
    /// The sensor returns to Sleep mode automatically after the measurement.
    pub fn trigger_forced(&mut self) -> error::Result<(), E> {
        self.write_reg(&[
            regs::ADDR_CTRL_HUM,
            self.config.osrs_config.hum_osrs as u8 & regs::CTRL_HUM_OSRS_MASK,
        ])?;
        self.write_mode(regs::MODE_FORCED)?;
        self.mode = DeviceMode::Forced;
        Ok(())
    }

    /// Polls STATUS until neither `measuring` nor `im_update` is set.
    ///
    /// The wait starts at 2 ms and doubles after every busy read, saturating at
    /// 32768 ms. With a non-zero `timeout`, the poll gives up with
    /// [`Timeout`](error::Bme280Error::Timeout) as soon as the accumulated wait
    /// exceeds it. `Milliseconds(0)` polls forever.
    ///
    /// Blocks through `delay`; never call this from an interrupt or timer callback.
    pub fn poll_until_ready(
        &mut self,
        delay: &mut impl DelayNs,
        timeout: Milliseconds,
    ) -> error::Result<(), E> {
        let mut wait_ms = POLL_INITIAL_DELAY_MS;
        let mut elapsed_ms: u32 = 0;

        while !self.status()?.is_ready() {
            delay.delay_ms(wait_ms);
            elapsed_ms = elapsed_ms.saturating_add(wait_ms);

            if timeout.0 != 0 && elapsed_ms > timeout.0 {
                #[cfg(feature = "defmt")]
                defmt::warn!("bme280: not ready after {=u32} ms", elapsed_ms);
                return Err(error::Bme280Error::Timeout);
            }

            wait_ms = (wait_ms * 2).min(POLL_MAX_DELAY_MS);
        }

        if self.mode == DeviceMode::Forced {
            self.mode = DeviceMode::Sleep;
        }
        Ok(())
    }

    /// Burst-reads 0xF7..0xFE, replacing the previous raw reading.
    pub fn read_raw(&mut self) -> error::Result<Sample<'_>, E> {
        let mut buffer = [0u8; raw_data_mem::SIZE];
        self.read_into(raw_data_mem::ADDR, &mut buffer)?;
        self.raw_data = RawData::from_bytes(&buffer);

        Ok(Sample::new(&self.raw_data, &self.calib_data))
    }

    /// Forced trigger, status poll, raw read.
    ///
    /// On [`Timeout`](error::Bme280Error::Timeout) the data registers are not read.
    pub fn read_forced(
        &mut self,
        delay: &mut impl DelayNs,
        timeout: Milliseconds,
    ) -> error::Result<Sample<'_>, E> {
        self.trigger_forced()?;
        self.poll_until_ready(delay, timeout)?;
        self.read_raw()
    }

    /// Triggers a measurement in 'Forced Mode', waits for completion, and returns compensated data.
    ///
    /// Channels set to `Skipped` report 0; with temperature skipped, pressure
    /// and humidity report 0 too.
    ///
    /// # Power Saving
    /// If all measurements are set to `Skipped`, this returns default values
    /// without touching the bus.
    pub fn measure(&mut self, delay: &mut impl DelayNs) -> error::Result<Measurement, E> {
        if self.config.osrs_config.is_all_skipped() {
            return Ok(Measurement::default());
        }

        let Config {
            osrs_config,
            poll_timeout,
            ..
        } = self.config;
        Ok(self
            .read_forced(delay, poll_timeout)?
            .compensate_enabled(&osrs_config))
    }

    /// Puts the sensor to sleep. Harmless when it already sleeps.
    pub fn stop(&mut self) -> error::Result<(), E> {
        self.write_mode(regs::MODE_SLEEP)?;
        self.mode = DeviceMode::Sleep;
        Ok(())
    }

    /// Puts the sensor to sleep and drops the calibration.
    ///
    /// The returned driver has to be opened again before use.
    ///
    /// # Errors
    /// If the sleep write fails, the still open driver comes back with the
    /// `I2CError`.
    pub fn close(
        mut self,
    ) -> core::result::Result<Bme280<I2C, Uninitialized>, (Self, error::Bme280Error<E>)> {
        if let Err(e) = self.stop() {
            return Err((self, e));
        }

        Ok(Bme280 {
            i2c: self.i2c,
            address: self.address,
            calib_data: CalibData::default(),
            raw_data: RawData::default(),
            config: self.config,
            mode: DeviceMode::Sleep,
            _state: PhantomData,
        })
    }

    /// Writes `ctrl_meas` with the configured `osrs_t`/`osrs_p` and the given mode.
    fn write_mode(&mut self, mode: u8) -> error::Result<(), E> {
        let ctrl_meas =
            self.config.osrs_config.ctrl_meas_bits() | (mode & regs::CTRL_MEAS_MODE_MASK);
        self.write_reg(&[regs::ADDR_CTRL_MEAS, ctrl_meas])
    }

    /// Programs `t_sb` and enters normal mode. Used by the periodic scheduler.
    fn enter_normal(&mut self, standby: Standby) -> error::Result<(), E> {
        let register = self.read_reg_byte(regs::ADDR_CONFIG)?;
        // Keep filter [4:2] and spi3w_en [0], replace t_sb [7:5]
        let new_reg_val = (register & 0x1F) | ((standby as u8) << 5);
        self.write_reg(&[regs::ADDR_CONFIG, new_reg_val])?;

        self.write_reg(&[
            regs::ADDR_CTRL_HUM,
            self.config.osrs_config.hum_osrs as u8 & regs::CTRL_HUM_OSRS_MASK,
        ])?;
        self.write_mode(regs::MODE_NORMAL)?;
        self.mode = DeviceMode::Normal(standby);
        Ok(())
    }
}
