#![no_std]

//! ESP32-2432S028 board glue: touch controller, socket bridge, screen
//! renderer and flash-backed configuration store.

pub mod input;
pub mod network;
pub mod render;
pub mod storage;
