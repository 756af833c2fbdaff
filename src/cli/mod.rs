//! Command line front end.

pub mod balance;
pub mod export;
pub mod import;
pub mod rates;
pub mod setup;
pub mod transactions;
pub mod ui;
