use bitflags::bitflags;
use num_derive::{FromPrimitive, ToPrimitive};

/// I2C address of the LSM6DSL on the BerryIMU board.
pub const LSM6DSL_ADDR: u16 = 0x6A;

/// Expected WHO_AM_I response for the LSM6DSL.
pub const CHIP_ID: u8 = 0x6A;

#[derive(Debug, Clone, Copy, FromPrimitive, ToPrimitive)]
pub enum ControlRegisters {
    WhoAmI = 0x0F,
    Ctrl1Xl = 0x10,
    Ctrl2G = 0x11,
    Ctrl3C = 0x12,
    Ctrl8Xl = 0x17,
}

#[derive(Debug, Clone, Copy, FromPrimitive, ToPrimitive)]
pub enum GyroRegisters {
    XLsb = 0x22,
    XMsb = 0x23,
    YLsb = 0x24,
    YMsb = 0x25,
    ZLsb = 0x26,
    ZMsb = 0x27,
}

#[derive(Debug, Clone, Copy, FromPrimitive, ToPrimitive)]
pub enum AccelRegisters {
    XLsb = 0x28,
    XMsb = 0x29,
    YLsb = 0x2A,
    YMsb = 0x2B,
    ZLsb = 0x2C,
    ZMsb = 0x2D,
}

bitflags! {
    /// CTRL3_C bit assignments.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Ctrl3Flags: u8 {
        const BOOT = 0b1000_0000;
        const BDU = 0b0100_0000;
        const IF_INC = 0b0000_0100;
        const SW_RESET = 0b0000_0001;
    }
}

/// Accelerometer ODR 3.33 kHz, +/- 8 g, 400 Hz bandwidth.
pub const ACCEL_ODR_CONFIG: u8 = 0b1001_1111;

/// Accelerometer low-pass filter enabled, composite filter.
pub const ACCEL_FILTER_CONFIG: u8 = 0b1100_1000;

/// Gyroscope ODR 3.33 kHz, 2000 dps full scale.
pub const GYRO_ODR_CONFIG: u8 = 0b1001_1100;

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::ToPrimitive;

    #[test]
    fn test_output_registers_are_contiguous() {
        // The axis read loop walks six consecutive registers from the low
        // X byte; the map must keep low byte first, gyro before accel.
        assert_eq!(GyroRegisters::XLsb.to_u8(), Some(0x22));
        assert_eq!(GyroRegisters::ZMsb.to_u8(), Some(0x27));
        assert_eq!(AccelRegisters::XLsb.to_u8(), Some(0x28));
        assert_eq!(AccelRegisters::ZMsb.to_u8(), Some(0x2D));
    }

    #[test]
    fn test_ctrl3_config_bits() {
        let ctrl3 = Ctrl3Flags::BDU | Ctrl3Flags::IF_INC;
        assert_eq!(ctrl3.bits(), 0b0100_0100);
        assert!(!ctrl3.contains(Ctrl3Flags::SW_RESET));
    }
}
