//! Fixed-point compensation (BME280 datasheet, section 4.2.3).
//!
//! Intermediates wrap on overflow exactly like the reference C code; the bit
//! widths and shift amounts are part of the calibration model and must not be
//! "improved".

use crate::{
    CalcTempData, CalibData, Humidity, Measurement, Oversampling, OversamplingConfig, Pressure,
    RawData, Temperature,
};

/// Upper clamp of the humidity intermediate (100 %RH in Q22.10, shifted by 12).
const HUMIDITY_MAX: i32 = 419_430_400;

impl CalibData {
    /// Temperature in 0.01 °C plus the `t_fine` carried into pressure and humidity.
    pub(crate) fn calc_temp(&self, temp_adc: u32) -> CalcTempData {
        let adc_t = temp_adc as i32;
        let t1 = self.dig_t1 as i32;

        let var1 = ((adc_t >> 3) - (t1 << 1)).wrapping_mul(self.dig_t2 as i32) >> 11;
        let diff = (adc_t >> 4) - t1;
        let var2 = ((diff.wrapping_mul(diff) >> 12).wrapping_mul(self.dig_t3 as i32)) >> 14;
        let temp_fine = var1.wrapping_add(var2);

        CalcTempData {
            temp_fine,
            temp_comp: temp_fine.wrapping_mul(5).wrapping_add(128) >> 8,
        }
    }

    /// Pressure in Pa as Q24.8. Needs 64-bit intermediates.
    ///
    /// Returns 0 when the `var1` divisor collapses to zero (e.g. `dig_P1 == 0`).
    pub(crate) fn calc_pres(&self, t_fine: i32, press_adc: u32) -> u32 {
        let mut var1 = (t_fine as i64) - 128_000;
        let mut var2 = var1.wrapping_mul(var1).wrapping_mul(self.dig_p6 as i64);
        var2 = var2.wrapping_add(var1.wrapping_mul(self.dig_p5 as i64) << 17);
        var2 = var2.wrapping_add((self.dig_p4 as i64) << 35);
        var1 = (var1.wrapping_mul(var1).wrapping_mul(self.dig_p3 as i64) >> 8)
            .wrapping_add(var1.wrapping_mul(self.dig_p2 as i64) << 12);
        var1 = (1i64 << 47).wrapping_add(var1).wrapping_mul(self.dig_p1 as i64) >> 33;

        if var1 == 0 {
            return 0;
        }

        let mut p = 1_048_576 - press_adc as i64;
        p = (p << 31).wrapping_sub(var2).wrapping_mul(3125).wrapping_div(var1);
        let var1 = (self.dig_p9 as i64).wrapping_mul(p >> 13).wrapping_mul(p >> 13) >> 25;
        let var2 = (self.dig_p8 as i64).wrapping_mul(p) >> 19;
        p = (p.wrapping_add(var1).wrapping_add(var2) >> 8).wrapping_add((self.dig_p7 as i64) << 4);

        p as u32
    }

    /// Relative humidity as Q22.10.
    pub(crate) fn calc_hum(&self, t_fine: i32, hum_adc: u16) -> u32 {
        let adc_h = hum_adc as i32;
        let mut v = t_fine.wrapping_sub(76_800);

        let offset = ((adc_h << 14)
            .wrapping_sub((self.dig_h4 as i32) << 20)
            .wrapping_sub((self.dig_h5 as i32).wrapping_mul(v))
            .wrapping_add(16_384))
            >> 15;
        let scale = ((((v.wrapping_mul(self.dig_h6 as i32) >> 10)
            .wrapping_mul((v.wrapping_mul(self.dig_h3 as i32) >> 11).wrapping_add(32_768))
            >> 10)
            .wrapping_add(2_097_152))
        .wrapping_mul(self.dig_h2 as i32)
        .wrapping_add(8_192))
            >> 14;

        v = offset.wrapping_mul(scale);
        v = v.wrapping_sub(
            (((v >> 15).wrapping_mul(v >> 15) >> 7).wrapping_mul(self.dig_h1 as i32)) >> 4,
        );

        (v.clamp(0, HUMIDITY_MAX) >> 12) as u32
    }
}

/// One raw reading paired with the calibration it must be compensated with.
///
/// Obtained from [`Bme280::read_raw`](crate::Bme280::read_raw) (borrowing the
/// device, so the underlying raw data cannot be overwritten meanwhile) or
/// built directly with [`Sample::new`] for stored data.
#[derive(Debug, Clone, Copy)]
pub struct Sample<'a> {
    raw: &'a RawData,
    calib: &'a CalibData,
}

impl<'a> Sample<'a> {
    pub fn new(raw: &'a RawData, calib: &'a CalibData) -> Self {
        Self { raw, calib }
    }

    pub fn raw(&self) -> &'a RawData {
        self.raw
    }

    /// Compensates temperature. Pressure and humidity for this sample are
    /// only reachable through the returned [`FineTemperature`].
    pub fn temperature(&self) -> (Temperature, FineTemperature<'a>) {
        let temp = self.calib.calc_temp(self.raw.temp_adc);
        (
            Temperature(temp.temp_comp),
            FineTemperature {
                sample: *self,
                t_fine: temp.temp_fine,
            },
        )
    }

    /// Runs all three compensations in their required order.
    pub fn compensate(&self) -> Measurement {
        let (temp, fine) = self.temperature();
        Measurement {
            temp,
            pres: fine.pressure(),
            hum: fine.humidity(),
        }
    }

    /// Like [`compensate`](Sample::compensate), but channels that `osrs` skips
    /// report 0 instead of compensating the chip's placeholder value.
    ///
    /// Pressure and humidity depend on `t_fine`, so they stay 0 as well when
    /// temperature is skipped.
    pub fn compensate_enabled(&self, osrs: &OversamplingConfig) -> Measurement {
        let mut measurement = Measurement::default();

        if osrs.temp_osrs != Oversampling::Skipped {
            let (temp, fine) = self.temperature();
            measurement.temp = temp;

            if osrs.pres_osrs != Oversampling::Skipped {
                measurement.pres = fine.pressure();
            }
            if osrs.hum_osrs != Oversampling::Skipped {
                measurement.hum = fine.humidity();
            }
        }

        measurement
    }
}

/// `t_fine` of one specific [`Sample`].
///
/// Only [`Sample::temperature`] creates this value, so pressure or humidity
/// can never be computed from a missing or stale `t_fine`:
///
/// ```compile_fail
/// use bme280_driver::{FineTemperature, Sample};
///
/// fn pressure_without_temperature(sample: Sample<'_>) {
///     let fine = FineTemperature { sample, t_fine: 0 };
///     let _ = fine.pressure();
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct FineTemperature<'a> {
    sample: Sample<'a>,
    t_fine: i32,
}

impl FineTemperature<'_> {
    pub fn value(&self) -> i32 {
        self.t_fine
    }

    pub fn pressure(&self) -> Pressure {
        Pressure(self.sample.calib.calc_pres(self.t_fine, self.sample.raw.press_adc))
    }

    pub fn humidity(&self) -> Humidity {
        Humidity(self.sample.calib.calc_hum(self.t_fine, self.sample.raw.hum_adc))
    }
}
