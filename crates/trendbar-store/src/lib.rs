//! Persistence for completed trend bars.
//!
//! This crate provides the storage side of trendbar:
//!
//! - [`BarStore`] - Save and range-query interface used by the pipeline
//! - [`InMemoryBarStore`] - Process-local store for tests and demos
//! - [`FileBarStore`] - One JSON document per bar on disk
//! - [`BarHistory`] - Read path for querying stored bars by time range

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/trendbar/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod file;
mod history;
mod memory;
mod store;

pub use error::{Result, StoreError};
pub use file::FileBarStore;
pub use history::BarHistory;
pub use memory::InMemoryBarStore;
pub use store::BarStore;
