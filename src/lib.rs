//! Roland digital piano controller
//!
//! Sysex codec, paced command queue and the terminal front end around them.

pub mod app;
pub mod cli;
pub mod config;
pub mod connection;
pub mod midi;
pub mod monitor;
pub mod pacer;
pub mod panel;
pub mod roland;
