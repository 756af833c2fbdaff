//! Rate source implementations.

pub mod util;
pub mod yahoo_finance;
