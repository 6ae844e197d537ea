mod registers;

use byteorder::{ByteOrder, LittleEndian};
use i2cdev::core::I2CDevice;
use i2cdev::linux::LinuxI2CDevice;
use log::{debug, error, warn};
use std::fmt;
use std::sync::{mpsc, Arc, RwLock};
use std::thread;
use std::time::Duration;

use motion::{MotionError, RawSample, SampleSource};
pub use registers::{
    AccelRegisters, ControlRegisters, Ctrl3Flags, GyroRegisters, ACCEL_FILTER_CONFIG,
    ACCEL_ODR_CONFIG, CHIP_ID, GYRO_ODR_CONFIG, LSM6DSL_ADDR,
};

// Local error type
#[derive(Debug)]
pub enum Error {
    I2c(i2cdev::linux::LinuxI2CError),
    InvalidChipId,
    ReadError,
    WriteError,
}

impl From<i2cdev::linux::LinuxI2CError> for Error {
    fn from(err: i2cdev::linux::LinuxI2CError) -> Self {
        Error::I2c(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::I2c(e) => write!(f, "I2C error: {}", e),
            Error::InvalidChipId => write!(f, "Invalid chip ID"),
            Error::ReadError => write!(f, "LSM6DSL read error"),
            Error::WriteError => write!(f, "LSM6DSL write error"),
        }
    }
}

impl std::error::Error for Error {}

// Map local Error to the shared MotionError
impl From<Error> for MotionError {
    fn from(err: Error) -> Self {
        match err {
            Error::I2c(e) => MotionError::DeviceError(format!("I2C error: {}", e)),
            Error::InvalidChipId => MotionError::DeviceError("Invalid chip ID".to_string()),
            Error::ReadError => MotionError::ReadError("LSM6DSL read error".to_string()),
            Error::WriteError => MotionError::DeviceError("LSM6DSL write error".to_string()),
        }
    }
}

/// Assembles three little-endian low/high register byte pairs into signed
/// 16-bit axis values.
pub fn combine_axes(buf: &[u8; 6]) -> [i16; 3] {
    [
        LittleEndian::read_i16(&buf[0..2]),
        LittleEndian::read_i16(&buf[2..4]),
        LittleEndian::read_i16(&buf[4..6]),
    ]
}

/// Low-level LSM6DSL driver.
///
/// Owns the I2C device and performs one bus transaction per register byte,
/// so every read is fallible and a fault surfaces on the tick it happened.
pub struct Lsm6dsl {
    i2c: LinuxI2CDevice,
}

impl Lsm6dsl {
    /// Opens the sensor on the given I2C bus (e.g. "/dev/i2c-1"),
    /// verifies the chip identity and configures both sensor blocks.
    pub fn new(i2c_bus: &str) -> Result<Self, Error> {
        let i2c = LinuxI2CDevice::new(i2c_bus, LSM6DSL_ADDR)?;
        let mut imu = Lsm6dsl { i2c };

        imu.verify_chip_id()?;
        imu.configure()?;

        Ok(imu)
    }

    fn verify_chip_id(&mut self) -> Result<(), Error> {
        let chip_id = self.i2c.smbus_read_byte_data(ControlRegisters::WhoAmI as u8)?;
        if chip_id != CHIP_ID {
            error!("Invalid chip ID. Expected 0x6A, got {:#x}", chip_id);
            return Err(Error::InvalidChipId);
        }
        Ok(())
    }

    /// Writes the accelerometer and gyroscope configuration registers.
    pub fn configure(&mut self) -> Result<(), Error> {
        self.i2c
            .smbus_write_byte_data(ControlRegisters::Ctrl1Xl as u8, ACCEL_ODR_CONFIG)?;
        self.i2c
            .smbus_write_byte_data(ControlRegisters::Ctrl8Xl as u8, ACCEL_FILTER_CONFIG)?;

        // Block data update and register auto-increment for multi-byte reads.
        let ctrl3 = Ctrl3Flags::BDU | Ctrl3Flags::IF_INC;
        self.i2c
            .smbus_write_byte_data(ControlRegisters::Ctrl3C as u8, ctrl3.bits())?;

        self.i2c
            .smbus_write_byte_data(ControlRegisters::Ctrl2G as u8, GYRO_ODR_CONFIG)?;

        // Allow the new output data rates to take effect.
        thread::sleep(Duration::from_millis(20));
        Ok(())
    }

    fn read_axes(&mut self, base: u8) -> Result<[i16; 3], Error> {
        let mut buf = [0u8; 6];
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = self.i2c.smbus_read_byte_data(base + i as u8)?;
        }
        Ok(combine_axes(&buf))
    }

    /// Reads the raw accelerometer counts for all three axes.
    pub fn read_accel_raw(&mut self) -> Result<[i16; 3], Error> {
        self.read_axes(AccelRegisters::XLsb as u8)
    }

    /// Reads the raw gyroscope counts for all three axes.
    pub fn read_gyro_raw(&mut self) -> Result<[i16; 3], Error> {
        self.read_axes(GyroRegisters::XLsb as u8)
    }

    /// Reads all six axes for one acquisition tick.
    pub fn read_raw_sample(&mut self) -> Result<RawSample, Error> {
        let accel = self.read_accel_raw()?;
        let gyro = self.read_gyro_raw()?;
        Ok(RawSample::new(accel, gyro))
    }
}

impl SampleSource for Lsm6dsl {
    fn read_sample(&mut self) -> Result<RawSample, MotionError> {
        self.read_raw_sample().map_err(MotionError::from)
    }
}

/// Commands sent to the reading thread.
#[derive(Debug)]
pub enum ImuCommand {
    Reconfigure,
    Stop,
}

/// Lsm6dslReader runs a background thread that polls the sensor and
/// publishes the most recent sample.
///
/// A failed poll publishes nothing, so the consumer's next take either
/// returns the previous unread sample or reports that no data is
/// available. Zeroed placeholder samples are never fabricated.
pub struct Lsm6dslReader {
    sample: Arc<RwLock<Option<RawSample>>>,
    command_tx: mpsc::Sender<ImuCommand>,
    running: Arc<RwLock<bool>>,
}

impl Lsm6dslReader {
    pub fn new(i2c_bus: &str) -> Result<Self, Error> {
        let imu = Lsm6dsl::new(i2c_bus)?;
        let sample = Arc::new(RwLock::new(None));
        let running = Arc::new(RwLock::new(true));
        let (command_tx, command_rx) = mpsc::channel();

        let reader = Lsm6dslReader {
            sample: Arc::clone(&sample),
            command_tx,
            running: Arc::clone(&running),
        };

        Self::start_reading_thread(imu, sample, running, command_rx);

        Ok(reader)
    }

    fn start_reading_thread(
        mut imu: Lsm6dsl,
        sample: Arc<RwLock<Option<RawSample>>>,
        running: Arc<RwLock<bool>>,
        command_rx: mpsc::Receiver<ImuCommand>,
    ) {
        thread::spawn(move || {
            debug!("LSM6DSL reading thread started");
            loop {
                match running.read() {
                    Ok(guard) => {
                        if !*guard {
                            break;
                        }
                    }
                    Err(_) => {
                        error!("LSM6DSL reader: failed to read running flag");
                        break;
                    }
                }

                if let Ok(command) = command_rx.try_recv() {
                    match command {
                        ImuCommand::Reconfigure => {
                            if let Err(e) = imu.configure() {
                                error!("Failed to reconfigure LSM6DSL: {}", e);
                            }
                        }
                        ImuCommand::Stop => break,
                    }
                }

                match imu.read_raw_sample() {
                    Ok(raw) => {
                        if let Ok(mut slot) = sample.write() {
                            *slot = Some(raw);
                        }
                    }
                    Err(e) => warn!("Failed to read sample: {}", e),
                }

                // Sensor output rate is far above the game tick; 10 ms keeps
                // the published sample fresh without hammering the bus.
                thread::sleep(Duration::from_millis(10));
            }
            debug!("LSM6DSL reading thread exiting");
        });
    }

    /// Rewrites the sensor configuration registers.
    pub fn reconfigure(&self) -> Result<(), MotionError> {
        self.command_tx.send(ImuCommand::Reconfigure)?;
        Ok(())
    }

    /// Stops the background reading thread.
    pub fn stop(&self) -> Result<(), MotionError> {
        if let Ok(mut guard) = self.running.write() {
            *guard = false;
        }
        let _ = self.command_tx.send(ImuCommand::Stop);
        Ok(())
    }
}

impl SampleSource for Lsm6dslReader {
    /// Takes the most recent unread sample, or reports a read error when
    /// the thread has published nothing since the last take.
    fn read_sample(&mut self) -> Result<RawSample, MotionError> {
        let mut slot = self.sample.write()?;
        slot.take()
            .ok_or_else(|| MotionError::ReadError("no new sample available".to_string()))
    }
}

impl Drop for Lsm6dslReader {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine_axes_sign_extension() {
        assert_eq!(combine_axes(&[0x01, 0x00, 0xFF, 0xFF, 0x00, 0x80]), [1, -1, -32768]);
        assert_eq!(combine_axes(&[0xFF, 0x7F, 0x00, 0x00, 0x34, 0x12]), [32767, 0, 0x1234]);
    }

    #[test]
    fn test_driver_error_maps_to_motion_error() {
        let err: MotionError = Error::InvalidChipId.into();
        assert!(matches!(err, MotionError::DeviceError(_)));

        let err: MotionError = Error::ReadError.into();
        assert!(matches!(err, MotionError::ReadError(_)));
    }
}
