#![cfg_attr(not(test), no_std)]

//! Board-independent scheduling, connection and navigation logic for the
//! HAM clock firmware.

extern crate alloc;

pub mod api;
pub mod app;
pub mod config;
pub mod dhcp;
pub mod error;
pub mod feeds;
pub mod link;
pub mod render;
pub mod schedule;
pub mod screen;
pub mod status;
pub mod touch;
