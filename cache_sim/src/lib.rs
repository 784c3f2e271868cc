mod bits;
pub mod cache;
pub mod config;
pub mod geometry;
pub mod sim;
pub mod trace;

#[cfg(feature = "stat")]
pub mod stat;
