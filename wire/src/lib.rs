//! Wire message shapes consumed from the Ingestion and Query services, and the
//! small capability traits a [`StreamMultiplex`](../dp_core/multiplex/struct.StreamMultiplex.html)
//! worker uses to drive one bidirectional or unidirectional stream.
//!
//! The actual RPC transport (TLS handshake, channel lifecycle, protobuf codec) is
//! out of scope here: these types are the opaque payloads the transport hands back
//! and forth. A concrete transport is expected to be a generated `tonic` client
//! bound to the platform's `.proto` schema; this crate only names the shapes.

use std::future::Future;

use bytes::Bytes;
pub use tonic::Status;

/// Stable per-submission identifier minted by the pipeline before an outbound
/// data message is handed to a worker. Unique within one open-stream session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientRequestId(pub u64);

impl std::fmt::Display for ClientRequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Opaque provider identity returned by `open`. Uniqueness across process
/// restarts is not guaranteed by this crate (see DESIGN.md, open question 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProviderUid(pub u64);

/// One outbound ingestion data message. `payload` is the already-serialized
/// frame (or frame slice) produced by the decomposer.
#[derive(Debug, Clone)]
pub struct IngestDataRequest {
    pub request_id: ClientRequestId,
    pub provider_id: ProviderUid,
    pub payload: Bytes,
}

/// Response outcome kind for a single ingestion request.
#[derive(Debug, Clone)]
pub enum IngestResponseKind {
    Ack,
    Exceptional { status_code: i32, message: String },
}

#[derive(Debug, Clone)]
pub struct IngestDataResponse {
    pub request_id: ClientRequestId,
    pub kind: IngestResponseKind,
}

/// One outbound query sub-request, already split by the query decomposer.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub request_id: ClientRequestId,
    pub sources: Vec<String>,
    pub start_nanos: i64,
    pub end_nanos: i64,
}

#[derive(Debug, Clone)]
pub enum QueryResponseKind {
    Data { buckets: Vec<DataBucket> },
    Exceptional { status_code: i32, message: String },
}

#[derive(Debug, Clone)]
pub struct QueryDataResponse {
    pub request_id: ClientRequestId,
    pub kind: QueryResponseKind,
}

/// Raw sampling interval carried on the wire: either a uniform clock or an
/// explicit, already-ordered vector of instants (nanoseconds since epoch).
#[derive(Debug, Clone, PartialEq)]
pub enum WireSamplingInterval {
    Clock { start_nanos: i64, period_nanos: i64, sample_count: u32 },
    Explicit(Vec<i64>),
}

/// One column of one source as reported by the query service for a single
/// sampling interval. `values` length must equal the interval's sample count.
#[derive(Debug, Clone)]
pub struct DataBucket {
    pub source_name: String,
    pub sampling_interval: WireSamplingInterval,
    pub data_column: WireColumn,
}

/// Closed scalar type surface. `Unsupported` is a sentinel: encountering it
/// during correlation is a hard failure rather than a value that propagates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Int32,
    Int64,
    Float32,
    Float64,
    Bool,
    Str,
    Bytes,
    Unsupported,
}

#[derive(Debug, Clone)]
pub enum WireColumn {
    Int32(Vec<Option<i32>>),
    Int64(Vec<Option<i64>>),
    Float32(Vec<Option<f32>>),
    Float64(Vec<Option<f64>>),
    Bool(Vec<Option<bool>>),
    Str(Vec<Option<String>>),
    Bytes(Vec<Option<Bytes>>),
    Unsupported,
}

impl WireColumn {
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            Self::Int32(_) => ScalarType::Int32,
            Self::Int64(_) => ScalarType::Int64,
            Self::Float32(_) => ScalarType::Float32,
            Self::Float64(_) => ScalarType::Float64,
            Self::Bool(_) => ScalarType::Bool,
            Self::Str(_) => ScalarType::Str,
            Self::Bytes(_) => ScalarType::Bytes,
            Self::Unsupported => ScalarType::Unsupported,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Int32(v) => v.len(),
            Self::Int64(v) => v.len(),
            Self::Float32(v) => v.len(),
            Self::Float64(v) => v.len(),
            Self::Bool(v) => v.len(),
            Self::Str(v) => v.len(),
            Self::Bytes(v) => v.len(),
            Self::Unsupported => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Capability a stream worker needs to push one outbound item and learn the
/// request id that was minted for it. Implemented per-service (ingestion,
/// query) rather than via an inheritance hierarchy: see DESIGN.md.
pub trait StreamSend<Out> {
    fn send(&mut self, item: Out) -> impl Future<Output = Result<ClientRequestId, Status>> + Send;
}

/// Capability a stream worker needs to pull the next inbound message
/// correlated to a prior send. Returns `Ok(None)` when the peer closes the
/// stream cleanly.
pub trait StreamRecv<In> {
    fn recv(&mut self) -> impl Future<Output = Result<Option<In>, Status>> + Send;
}

/// Whether a stream is full-duplex (sends and receives may interleave, every
/// request gets a matched response) or one-directional (a batch of sends
/// followed by at most one terminal response).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Bidirectional,
    Backward,
}
