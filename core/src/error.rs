//! strongly typed library error.
//!
//! Mirrors the taxonomy in spec §7. One flat, `#[non_exhaustive]` enum rather
//! than an exception hierarchy: every caller-visible failure mode is a value,
//! never a panic or a silently swallowed `None`.

use std::{error, fmt};

use dp_wire::ClientRequestId;

#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// configuration parse/validation failure, surfaced at load.
    ConfigInvalid(String),
    /// facade operation attempted while session is `Closed` or `Draining`.
    NotOpen,
    /// a configuration mutator was called while the session is `Open`, or
    /// `open` was called against an already-`Open` session for a different
    /// provider.
    IllegalState(String),
    /// ingestion-frame consistency check failed.
    FrameInvalid(String),
    /// a single row's serialized size exceeds the binning budget.
    FrameTooLarge { row_index: usize, row_bytes: usize, budget: usize },
    /// bounded queue refused within its deadline.
    BackPressureFull,
    /// bounded queue submit exceeded its explicit timeout.
    TimedOut,
    /// cancellation observed while blocked at a suspension point.
    Interrupted,
    /// the RPC layer reported a failure.
    Transport { status_code: i32, message: String },
    /// remote service responded `Exceptional` to the initial request.
    RequestRejected { request_id: ClientRequestId, status_code: i32, message: String },
    /// a correlator key saw the same source twice.
    DuplicateSource { source_name: String },
    /// a bucket arrived with an empty data column.
    MissingData { source_name: String },
    /// a bucket's column length disagrees with its interval's sample count.
    InconsistentLength { source_name: String, expected: usize, actual: usize },
    /// a bucket reported the closed-enum `Unsupported` scalar type.
    UnsupportedType { source_name: String },
    /// two adjacent correlated blocks overlap in time.
    DomainOverlap { first_block: usize, second_block: usize },
    /// a requested source never appeared in any correlated block.
    SourceMissing { source_name: String },
    /// a source's declared type disagrees across blocks.
    TypeConflict { source_name: String, first: &'static str, second: &'static str },
    /// release of transport resources exceeded the shutdown timeout.
    ShutdownFailed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigInvalid(msg) => write!(f, "invalid configuration: {msg}"),
            Self::NotOpen => write!(f, "session is not open"),
            Self::IllegalState(msg) => write!(f, "illegal state: {msg}"),
            Self::FrameInvalid(msg) => write!(f, "invalid ingestion frame: {msg}"),
            Self::FrameTooLarge { row_index, row_bytes, budget } => write!(
                f,
                "row {row_index} is {row_bytes} bytes, exceeding binning budget {budget}"
            ),
            Self::BackPressureFull => write!(f, "bounded queue is full"),
            Self::TimedOut => write!(f, "operation timed out"),
            Self::Interrupted => write!(f, "operation was cancelled"),
            Self::Transport { status_code, message } => {
                write!(f, "transport error (status {status_code}): {message}")
            }
            Self::RequestRejected { request_id, status_code, message } => write!(
                f,
                "request {request_id} rejected (status {status_code}): {message}"
            ),
            Self::DuplicateSource { source_name } => {
                write!(f, "duplicate source `{source_name}` within one sampling interval")
            }
            Self::MissingData { source_name } => write!(f, "empty data column for source `{source_name}`"),
            Self::InconsistentLength { source_name, expected, actual } => write!(
                f,
                "source `{source_name}` column length {actual} does not match sample count {expected}"
            ),
            Self::UnsupportedType { source_name } => {
                write!(f, "source `{source_name}` reported an unsupported scalar type")
            }
            Self::DomainOverlap { first_block, second_block } => {
                write!(f, "sampling blocks {first_block} and {second_block} overlap in time")
            }
            Self::SourceMissing { source_name } => {
                write!(f, "source `{source_name}` was requested but never observed")
            }
            Self::TypeConflict { source_name, first, second } => write!(
                f,
                "source `{source_name}` reported conflicting types ({first} vs {second})"
            ),
            Self::ShutdownFailed => write!(f, "transport shutdown exceeded its timeout"),
        }
    }
}

impl error::Error for Error {}

impl From<dp_wire::Status> for Error {
    fn from(status: dp_wire::Status) -> Self {
        Self::Transport {
            status_code: status.code() as i32,
            message: status.message().to_owned(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
