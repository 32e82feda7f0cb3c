//! Normal-mode sampling driven by a platform timer.
//!
//! The timer callback only ever calls [`WakeSignal::notify`]. All bus traffic
//! happens in the task that owns the [`Periodic`] handle, after it was woken.

use core::time::Duration;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embedded_hal::i2c;

use crate::{error, Bme280, Measurement, Ready, Sample, Standby};

/// Wake notification between a timer callback and the consumer task.
///
/// Meant to live in a `static`:
///
/// ```rust
/// use bme280_driver::WakeSignal;
///
/// static BME280_WAKE: WakeSignal = WakeSignal::new();
/// ```
pub struct WakeSignal {
    signal: Signal<CriticalSectionRawMutex, ()>,
}

impl WakeSignal {
    pub const fn new() -> Self {
        Self {
            signal: Signal::new(),
        }
    }

    /// Marks one interval as elapsed. Never blocks; safe in interrupt context.
    ///
    /// Wakes that pile up before the consumer runs collapse into one.
    pub fn notify(&self) {
        self.signal.signal(());
    }

    fn reset(&self) {
        self.signal.reset();
    }

    async fn wait(&self) {
        self.signal.wait().await
    }

    fn try_take(&self) -> bool {
        self.signal.try_take().is_some()
    }
}

impl Default for WakeSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// The platform timer refused to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerError;

/// A periodic timer provided by the platform.
pub trait WakeTimer {
    /// Arms the timer to expire every `period`.
    ///
    /// Each expiry must call `signal.notify()` and nothing else. In particular
    /// it must not touch the bus.
    fn start(&mut self, period: Duration, signal: &'static WakeSignal) -> Result<(), TimerError>;

    /// Disarms the timer. No `notify()` may happen after this returns.
    fn cancel(&mut self);
}

/// A live normal-mode session.
///
/// Owns the timer and the right to wait on the wake signal, and borrows the
/// sensor exclusively for as long as the session runs. [`stop`](Periodic::stop)
/// releases both and puts the sensor to sleep. Dropping the handle releases
/// timer and signal as well but, lacking a bus transfer, leaves the sensor
/// measuring.
pub struct Periodic<'a, I2C, T: WakeTimer> {
    dev: &'a mut Bme280<I2C, Ready>,
    timer: T,
    signal: &'static WakeSignal,
    interval: Standby,
    active: bool,
}

impl<I2C, E> Bme280<I2C, Ready>
where
    I2C: i2c::I2c<Error = E>,
{
    /// Enters normal mode with standby time `standby` and arms `timer` to wake
    /// the returned session once per interval.
    ///
    /// # Errors
    /// `I2CError` if configuring the chip fails,
    /// [`TimerUnavailable`](error::Bme280Error::TimerUnavailable) if the timer
    /// does not start. The sensor is put back to sleep first; should that write
    /// fail too, the timer error still wins and [`Bme280::mode`] keeps
    /// reporting normal mode.
    pub fn start_normal<T: WakeTimer>(
        &mut self,
        standby: Standby,
        mut timer: T,
        signal: &'static WakeSignal,
    ) -> error::Result<Periodic<'_, I2C, T>, E> {
        self.enter_normal(standby)?;

        signal.reset();
        if timer.start(standby.duration(), signal).is_err() {
            #[cfg(feature = "defmt")]
            defmt::error!("bme280: wake timer did not start");
            // the timer error is what gets reported
            let _sleep = self.stop();
            #[cfg(feature = "defmt")]
            if _sleep.is_err() {
                defmt::warn!("bme280: sleep write failed, sensor left in normal mode");
            }
            return Err(error::Bme280Error::TimerUnavailable);
        }

        #[cfg(feature = "defmt")]
        defmt::info!("bme280: normal mode, standby {}", standby);

        Ok(Periodic {
            dev: self,
            timer,
            signal,
            interval: standby,
            active: true,
        })
    }
}

impl<I2C, T, E> Periodic<'_, I2C, T>
where
    I2C: i2c::I2c<Error = E>,
    T: WakeTimer,
{
    pub fn interval(&self) -> Standby {
        self.interval
    }

    /// Suspends until the timer reports the next interval.
    pub async fn wait(&mut self) {
        self.signal.wait().await
    }

    /// Consumes a pending wake, if any, without suspending.
    pub fn try_wait(&mut self) -> bool {
        self.signal.try_take()
    }

    /// Reads the latest raw sample. The chip keeps measuring in the background.
    pub fn read(&mut self) -> error::Result<Sample<'_>, E> {
        self.dev.read_raw()
    }

    /// Waits for the next interval, then reads and compensates.
    ///
    /// Skipped channels report 0, as with [`Bme280::measure`].
    pub async fn next_measurement(&mut self) -> error::Result<Measurement, E> {
        self.wait().await;
        let osrs = self.dev.config().osrs_config;
        Ok(self.read()?.compensate_enabled(&osrs))
    }

    /// Ends the session: timer cancelled, wake signal cleared, sensor asleep.
    pub fn stop(mut self) -> error::Result<(), E> {
        self.release();

        #[cfg(feature = "defmt")]
        defmt::info!("bme280: normal mode stopped");

        self.dev.stop()
    }
}

impl<I2C, T: WakeTimer> Periodic<'_, I2C, T> {
    fn release(&mut self) {
        if self.active {
            self.timer.cancel();
            self.signal.reset();
            self.active = false;
        }
    }
}

impl<I2C, T: WakeTimer> Drop for Periodic<'_, I2C, T> {
    fn drop(&mut self) {
        self.release();
    }
}
