//! client-side streaming data-plane library for the time-series data
//! platform: frame model, decomposers, stream multiplex, back-pressure
//! queue, correlator, assembler, configuration tree, and the public facade.

pub mod assemble;
pub mod config;
pub mod correlate;
pub mod decompose;
pub mod error;
pub mod facade;
pub mod frame;
mod ids;
pub mod multiplex;
mod queue;

pub use assemble::SamplingProcess;
pub use correlate::CorrelatedBlock;
pub use error::{Error, Result};
pub use frame::{Column, ColumnValues, IngestionFrame, SamplingClock, TimestampSpec};
pub use queue::Capacity;
