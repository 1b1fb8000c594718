//! policy-driven splitters: ingestion-frame binning and query decomposition.

pub mod ingestion;
pub mod query;

pub use ingestion::{bin_frame, FrameBinner};
pub use query::{decompose, QueryRequest, Strategy, TimeInterval};
