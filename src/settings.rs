use core::time::Duration;

use crate::Milliseconds;

/// Oversampling settings for temperature, pressure and humidity.
///
/// Higher rates average more internal samples per reported value. Noise goes
/// down, measurement time and current per cycle go up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Oversampling {
    /// No measurement. The channel's output register reads `0x80000`.
    Skipped = 0,
    X1 = 1,
    X2 = 2,
    X4 = 3,
    X8 = 4,
    X16 = 5,
}

impl Oversampling {
    /// Decodes a 3-bit `osrs_x` field. Codes above 5 all mean 16x on the chip.
    pub fn from_u8(value: u8) -> Self {
        match value & 0x07 {
            0 => Oversampling::Skipped,
            1 => Oversampling::X1,
            2 => Oversampling::X2,
            3 => Oversampling::X4,
            4 => Oversampling::X8,
            _ => Oversampling::X16,
        }
    }
}

/// Oversampling for all three channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OversamplingConfig {
    pub temp_osrs: Oversampling,
    pub hum_osrs: Oversampling,
    pub pres_osrs: Oversampling,
}

impl Default for OversamplingConfig {
    fn default() -> Self {
        Self {
            temp_osrs: Oversampling::X4,
            hum_osrs: Oversampling::X4,
            pres_osrs: Oversampling::X4,
        }
    }
}

impl OversamplingConfig {
    /// Returns `true` if every channel is `Skipped`.
    pub fn is_all_skipped(&self) -> bool {
        self.temp_osrs == Oversampling::Skipped
            && self.hum_osrs == Oversampling::Skipped
            && self.pres_osrs == Oversampling::Skipped
    }

    /// `ctrl_meas` bits [7:2] (`osrs_t`, `osrs_p`), mode bits cleared.
    pub(crate) fn ctrl_meas_bits(&self) -> u8 {
        ((self.temp_osrs as u8) << 5) | ((self.pres_osrs as u8) << 2)
    }
}

/// IIR filter coefficient. Smooths pressure and temperature only.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum IIRFilter {
    #[default]
    Off = 0,
    X2 = 1,
    X4 = 2,
    X8 = 3,
    X16 = 4,
}

/// Inactive time between two measurements in normal mode (`t_sb`).
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Standby {
    #[default]
    Micros500 = 0,
    Micros62500 = 1,
    Millis125 = 2,
    Millis250 = 3,
    Millis500 = 4,
    Millis1000 = 5,
    Millis10 = 6,
    Millis20 = 7,
}

impl Standby {
    pub const fn duration(&self) -> Duration {
        match self {
            Standby::Micros500 => Duration::from_micros(500),
            Standby::Micros62500 => Duration::from_micros(62_500),
            Standby::Millis125 => Duration::from_millis(125),
            Standby::Millis250 => Duration::from_millis(250),
            Standby::Millis500 => Duration::from_millis(500),
            Standby::Millis1000 => Duration::from_millis(1000),
            Standby::Millis10 => Duration::from_millis(10),
            Standby::Millis20 => Duration::from_millis(20),
        }
    }
}

/// Complete measurement configuration held by the device context.
///
/// `ctrl_hum` and the filter field are written when the `Config` is applied;
/// `osrs_t`/`osrs_p` go out with the next mode change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    pub osrs_config: OversamplingConfig,
    pub iir_filter: IIRFilter,
    /// Budget for the status poll after a forced trigger. `0` polls forever.
    pub poll_timeout: Milliseconds,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            osrs_config: OversamplingConfig::default(),
            iir_filter: IIRFilter::Off,
            poll_timeout: Milliseconds(1000),
        }
    }
}

/// Builder for [`Config`].
#[derive(Default)]
pub struct Bme280Builder {
    config: Config,
}

impl Bme280Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn temp_oversampling(mut self, os: Oversampling) -> Self {
        self.config.osrs_config.temp_osrs = os;
        self
    }

    pub fn hum_oversampling(mut self, os: Oversampling) -> Self {
        self.config.osrs_config.hum_osrs = os;
        self
    }

    pub fn pres_oversampling(mut self, os: Oversampling) -> Self {
        self.config.osrs_config.pres_osrs = os;
        self
    }

    pub fn iir_filter(mut self, filter: IIRFilter) -> Self {
        self.config.iir_filter = filter;
        self
    }

    /// Sets the forced-mode poll budget. `Milliseconds(0)` disables the timeout.
    pub fn poll_timeout(mut self, timeout: Milliseconds) -> Self {
        self.config.poll_timeout = timeout;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_one_shot_read() {
        let config = Config::default();
        assert_eq!(config.osrs_config.temp_osrs, Oversampling::X4);
        assert_eq!(config.osrs_config.pres_osrs, Oversampling::X4);
        assert_eq!(config.osrs_config.hum_osrs, Oversampling::X4);
        assert_eq!(config.iir_filter, IIRFilter::Off);
        // 4x/4x: 0b011_011_00
        assert_eq!(config.osrs_config.ctrl_meas_bits(), 0x6C);
    }

    #[test]
    fn builder_overrides_defaults() {
        let config = Bme280Builder::new()
            .temp_oversampling(Oversampling::X1)
            .pres_oversampling(Oversampling::X16)
            .hum_oversampling(Oversampling::Skipped)
            .iir_filter(IIRFilter::X8)
            .poll_timeout(Milliseconds(0))
            .build();

        assert_eq!(config.osrs_config.ctrl_meas_bits(), (1 << 5) | (5 << 2));
        assert_eq!(config.osrs_config.hum_osrs, Oversampling::Skipped);
        assert_eq!(config.iir_filter, IIRFilter::X8);
        assert_eq!(config.poll_timeout, Milliseconds(0));
    }

    #[test]
    fn all_skipped() {
        let osrs = OversamplingConfig {
            temp_osrs: Oversampling::Skipped,
            hum_osrs: Oversampling::Skipped,
            pres_osrs: Oversampling::Skipped,
        };
        assert!(osrs.is_all_skipped());
        assert!(!OversamplingConfig::default().is_all_skipped());
    }

    #[test]
    fn oversampling_codes_above_five_saturate() {
        assert_eq!(Oversampling::from_u8(0), Oversampling::Skipped);
        assert_eq!(Oversampling::from_u8(3), Oversampling::X4);
        assert_eq!(Oversampling::from_u8(6), Oversampling::X16);
        assert_eq!(Oversampling::from_u8(7), Oversampling::X16);
    }

    #[test]
    fn standby_durations() {
        assert_eq!(Standby::Micros500.duration(), Duration::from_micros(500));
        assert_eq!(Standby::Micros62500.duration(), Duration::from_micros(62_500));
        assert_eq!(Standby::Millis1000.duration(), Duration::from_millis(1000));
        assert_eq!(Standby::Millis10.duration(), Duration::from_millis(10));
        assert_eq!(Standby::Millis20.duration(), Duration::from_millis(20));
    }
}
