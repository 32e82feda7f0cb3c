//! BME280 memory map (datasheet table 18) and register bit fields.

pub const ADDR_CHIP_ID: u8 = 0xD0;
pub const ADDR_RESET: u8 = 0xE0;
pub const ADDR_CTRL_HUM: u8 = 0xF2;
pub const ADDR_STATUS: u8 = 0xF3;
pub const ADDR_CTRL_MEAS: u8 = 0xF4;
pub const ADDR_CONFIG: u8 = 0xF5;

/// First byte of the pressure/temperature/humidity burst block (0xF7..0xFE).
pub const ADDR_PRESS_MSB: u8 = 0xF7;

pub const CHIP_ID: u8 = 0x60;
pub const SOFT_RESET_CMD: u8 = 0xB6;

/// STATUS bit 3: conversion running.
pub const STATUS_MEASURING: u8 = 0x08;
/// STATUS bit 2. Reserved on current silicon, but older register maps place
/// `measuring` here, so it is treated as busy too.
pub const STATUS_MEASURING_LEGACY: u8 = 0x04;
/// STATUS bit 0: NVM data being copied to image registers.
pub const STATUS_IM_UPDATE: u8 = 0x01;

pub const CTRL_HUM_OSRS_MASK: u8 = 0x07;
pub const CTRL_MEAS_MODE_MASK: u8 = 0x03;

pub const MODE_SLEEP: u8 = 0b00;
pub const MODE_FORCED: u8 = 0b01;
pub const MODE_NORMAL: u8 = 0b11;
