//! Kernel logging through the `log` facade

pub mod buffer;
pub mod logger;

pub use logger::init;
