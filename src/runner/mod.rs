//! Runners move transactions between CSV files and the ledger.
//!
//! This module provides an asynchronous bulk importer and a synchronous exporter.
//!
mod export;
mod import;

pub use export::export;
pub use import::{import, ImportError, ImportFailure, ImportSummary};
