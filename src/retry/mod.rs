//! 重试退避模块

pub mod exponential;

pub use exponential::{DEFAULT_FACTOR, DEFAULT_MAX_DELAY, DEFAULT_MIN_DELAY, ExponentialBackoff};
