//! Calculation, storage and file services for BoviCheck.

pub mod backup;
pub mod calculator;
pub mod export;
pub mod import;
pub mod ingest;
pub mod persistence;

pub use calculator::{calculate, recalculate, CalcError};
pub use persistence::{JsonStore, PersistenceError, StateSaver};
