//! the public open/ingest/query/shutdown surface (spec §4.7). generic over
//! the two stream transports (ingestion, query) the caller has already
//! established — connecting them is out of scope (§1).

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use bytes::Bytes;
use dp_wire::{
    ClientRequestId, IngestDataRequest, IngestDataResponse, IngestResponseKind, ProviderUid, QueryResponseKind,
    StreamRecv, StreamSend,
};
use tokio::sync::Mutex as AsyncMutex;

use crate::{
    assemble::Assembler,
    config::Config,
    correlate::Correlator,
    decompose::query::{self as query_decompose, Strategy},
    error::{Error, Result},
    frame::IngestionFrame,
    multiplex::{ResponseOutcome, StreamMultiplex},
    SamplingProcess,
};

/// turns an [`IngestionFrame`] into the opaque bytes the wire request
/// carries. the wire codec itself is out of scope (§1); this is the seam a
/// concrete transport plugs a real encoder into.
pub trait FrameEncoder: Send + Sync {
    fn encode(&self, frame: &IngestionFrame) -> Bytes;
}

/// opaque provider credential. its registration protocol is unspecified
/// (spec §9 open question 2); this crate only needs byte-equality to decide
/// whether a re-`open` targets the same provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRegistration(pub Vec<u8>);

/// one outcome of an ingestion request, surfaced by `close_stream*`.
#[derive(Debug, Clone)]
pub struct IngestionRecord {
    pub request_id: ClientRequestId,
    pub kind: IngestionOutcomeKind,
}

#[derive(Debug, Clone)]
pub enum IngestionOutcomeKind {
    Ack,
    Exceptional { status_code: i32, message: String },
    Interrupted,
}

impl From<ResponseOutcome<IngestDataResponse>> for IngestionOutcomeKind {
    fn from(outcome: ResponseOutcome<IngestDataResponse>) -> Self {
        match outcome {
            ResponseOutcome::Ok(resp) => match resp.kind {
                IngestResponseKind::Ack => Self::Ack,
                IngestResponseKind::Exceptional { status_code, message } => Self::Exceptional { status_code, message },
            },
            ResponseOutcome::Exceptional { status_code, message } => Self::Exceptional { status_code, message },
            ResponseOutcome::Interrupted => Self::Interrupted,
        }
    }
}

/// a query request at the facade boundary, before decomposition.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub source_names: Vec<String>,
    pub start_nanos: i64,
    pub end_nanos: i64,
}

enum SessionState {
    Closed,
    Open { uid: ProviderUid, registration: ProviderRegistration },
    Draining,
}

/// one open session: Closed → Open(provider) → Draining → Closed (spec §3).
///
/// the `state` flag and the two mux slots are separate locks rather than one
/// combined lock: `state` is read/written only under a synchronous critical
/// section, while the mux slots need `tokio::sync::Mutex` because `open`
/// replaces them across an `.await`. each slot holds an `Arc` of its
/// multiplex rather than the multiplex itself: `ingest`/`query` clone the
/// `Arc` and drop the lock immediately, so the lock only ever guards the
/// handful of instructions that read or replace the slot, never the
/// potentially-blocking `submit`/`await_response` calls that follow —
/// concurrent callers of `ingest`/`query` run against the multiplex
/// concurrently, same as concurrent producers against its intake queue.
pub struct DataPlaneSession<I, Q>
where
    I: StreamSend<IngestDataRequest> + StreamRecv<IngestDataResponse> + Send + 'static,
    Q: StreamSend<dp_wire::QueryRequest> + StreamRecv<dp_wire::QueryDataResponse> + Send + 'static,
{
    config: Config,
    encoder: Arc<dyn FrameEncoder>,
    state: Mutex<SessionState>,
    ingest_mux: AsyncMutex<Option<Arc<StreamMultiplex<I, IngestDataRequest, IngestDataResponse>>>>,
    query_mux: AsyncMutex<Option<Arc<StreamMultiplex<Q, dp_wire::QueryRequest, dp_wire::QueryDataResponse>>>>,
    next_provider_uid: AtomicU64,
}

impl<I, Q> DataPlaneSession<I, Q>
where
    I: StreamSend<IngestDataRequest> + StreamRecv<IngestDataResponse> + Send + 'static,
    Q: StreamSend<dp_wire::QueryRequest> + StreamRecv<dp_wire::QueryDataResponse> + Send + 'static,
{
    pub fn new(config: Config, encoder: Arc<dyn FrameEncoder>) -> Self {
        Self {
            config,
            encoder,
            state: Mutex::new(SessionState::Closed),
            ingest_mux: AsyncMutex::new(None),
            query_mux: AsyncMutex::new(None),
            next_provider_uid: AtomicU64::new(1),
        }
    }

    /// `Closed` → `Open`. Re-`open` against an already-`Open` session with
    /// the same registration is a no-op returning the existing UID; with a
    /// different registration it fails (idempotent re-open is forbidden for
    /// a different provider, spec §4.7).
    pub async fn open(&self, registration: ProviderRegistration, ingest_streams: Vec<I>, query_streams: Vec<Q>) -> Result<ProviderUid> {
        enum Action {
            Noop(ProviderUid),
            Reject(&'static str),
            Proceed(ProviderUid),
        }
        let action = {
            let mut state = self.state.lock().unwrap();
            match &*state {
                SessionState::Open { uid, registration: current } if *current == registration => Action::Noop(*uid),
                SessionState::Open { .. } => Action::Reject("session already open for a different provider"),
                SessionState::Draining => Action::Reject("session is draining"),
                SessionState::Closed => {
                    let uid = ProviderUid(self.next_provider_uid.fetch_add(1, Ordering::Relaxed));
                    *state = SessionState::Open { uid, registration };
                    Action::Proceed(uid)
                }
            }
        };

        match action {
            Action::Noop(uid) => Ok(uid),
            Action::Reject(msg) => Err(Error::IllegalState(msg.into())),
            Action::Proceed(uid) => {
                let ingest_kind = self.config.ingestion_stream.preferred_kind.into();
                let ingest_capacity = self.config.ingestion_stream.buffer.enabled.then_some(self.config.ingestion_stream.buffer.capacity);
                *self.ingest_mux.lock().await = Some(Arc::new(StreamMultiplex::spawn(ingest_streams, ingest_kind, ingest_capacity)));

                let query_kind = self.config.query_recovery_stream.preferred_kind.into();
                *self.query_mux.lock().await = Some(Arc::new(StreamMultiplex::spawn(query_streams, query_kind, None)));

                tracing::info!(?uid, "session opened");
                Ok(uid)
            }
        }
    }

    fn provider_uid(&self) -> Result<ProviderUid> {
        match &*self.state.lock().unwrap() {
            SessionState::Open { uid, .. } => Ok(*uid),
            _ => Err(Error::NotOpen),
        }
    }

    /// bin `frame` per `ingestion.stream.binning` and enqueue each resulting
    /// sub-frame; returns the minted ids in submission order. does not wait
    /// for acknowledgement (see `close_stream` for that).
    pub async fn ingest(&self, frame: &IngestionFrame) -> Result<Vec<ClientRequestId>> {
        let provider_id = self.provider_uid()?;
        let binning = self.config.ingestion_stream.binning;
        let frames = if binning.enabled {
            crate::decompose::ingestion::bin_frame(frame, binning.max_bytes)?
        } else {
            frame.validate()?;
            vec![frame.clone()]
        };

        let mux = self.ingest_mux.lock().await.as_ref().ok_or(Error::NotOpen)?.clone();

        let mut ids = Vec::with_capacity(frames.len());
        for sub_frame in &frames {
            let payload = self.encoder.encode(sub_frame);
            let id = mux
                .submit(|request_id| IngestDataRequest { request_id, provider_id, payload: payload.clone() })
                .await?;
            ids.push(id);
        }
        Ok(ids)
    }

    /// decompose, dispatch, correlate, and assemble one query end to end.
    /// every sub-request is submitted before any response is awaited, so the
    /// `N` query streams actually run the decomposition concurrently rather
    /// than one sub-request at a time.
    pub async fn query(&self, request: QueryRequest) -> Result<SamplingProcess> {
        self.provider_uid()?;
        let strategy = strategy_from_config(self.config.query_recovery_stream.decomposition);
        let time_interval = crate::decompose::query::TimeInterval::new(request.start_nanos, request.end_nanos)?;
        let sub_requests = query_decompose::decompose(
            &query_decompose::QueryRequest { source_names: request.source_names.clone(), time_interval },
            strategy,
        )?;

        let mux = self.query_mux.lock().await.as_ref().ok_or(Error::NotOpen)?.clone();

        let mut ids = Vec::with_capacity(sub_requests.len());
        for sub in &sub_requests {
            let id = mux
                .submit(|request_id| dp_wire::QueryRequest {
                    request_id,
                    sources: sub.source_names.clone(),
                    start_nanos: sub.time_interval.start_nanos,
                    end_nanos: sub.time_interval.end_nanos,
                })
                .await?;
            ids.push(id);
        }

        let mut correlator = Correlator::new();
        for id in ids {
            match mux.await_response(id).await {
                ResponseOutcome::Ok(resp) => match resp.kind {
                    QueryResponseKind::Data { buckets } => {
                        for bucket in buckets {
                            correlator.ingest(bucket)?;
                        }
                    }
                    QueryResponseKind::Exceptional { status_code, message } => {
                        return Err(Error::RequestRejected { request_id: id, status_code, message });
                    }
                },
                ResponseOutcome::Exceptional { status_code, message } => {
                    return Err(Error::RequestRejected { request_id: id, status_code, message });
                }
                ResponseOutcome::Interrupted => return Err(Error::Interrupted),
            }
        }

        let blocks = correlator.finish();
        Assembler::assemble(blocks, &request.source_names)
    }

    pub async fn outgoing_queue_size(&self) -> Result<usize> {
        let guard = self.ingest_mux.lock().await;
        Ok(guard.as_ref().ok_or(Error::NotOpen)?.outgoing_queue_size())
    }

    pub async fn await_outgoing_queue_empty(&self) -> Result<()> {
        let mux = self.ingest_mux.lock().await.as_ref().ok_or(Error::NotOpen)?.clone();
        mux.await_outgoing_queue_empty().await;
        Ok(())
    }

    /// `Open` → `Closed`: drain the ingestion stream gracefully and return
    /// every outcome.
    pub async fn close_stream(&self) -> Result<Vec<IngestionRecord>> {
        self.begin_draining()?;
        let mux = unwrap_mux(self.ingest_mux.lock().await.take().ok_or(Error::NotOpen)?)?;
        let timeout = self.config.timeout.duration().unwrap_or(Duration::from_secs(30));
        let results = mux.shutdown_soft(timeout).await?;
        *self.state.lock().unwrap() = SessionState::Closed;
        tracing::info!("ingestion stream closed");
        Ok(results.into_iter().map(|(request_id, outcome)| IngestionRecord { request_id, kind: outcome.into() }).collect())
    }

    /// `Open` → `Closed` immediately: discard in-flight and queued work.
    pub async fn close_stream_now(&self) -> Result<Vec<IngestionRecord>> {
        self.begin_draining()?;
        let mux = unwrap_mux(self.ingest_mux.lock().await.take().ok_or(Error::NotOpen)?)?;
        let results = mux.shutdown_hard().await;
        *self.state.lock().unwrap() = SessionState::Closed;
        tracing::info!("ingestion stream closed (hard)");
        Ok(results.into_iter().map(|(request_id, outcome)| IngestionRecord { request_id, kind: outcome.into() }).collect())
    }

    fn begin_draining(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        match &*state {
            SessionState::Open { .. } => {
                *state = SessionState::Draining;
                Ok(())
            }
            SessionState::Draining => Ok(()),
            SessionState::Closed => Err(Error::NotOpen),
        }
    }

    /// graceful release: `close_stream` first if `Open`, then release the
    /// query transport. legal from any state.
    pub async fn shutdown_soft(&self) -> Result<()> {
        if matches!(*self.state.lock().unwrap(), SessionState::Open { .. }) {
            self.close_stream().await?;
        }
        if let Some(mux) = self.query_mux.lock().await.take() {
            let mux = unwrap_mux(mux)?;
            let timeout = self.config.timeout.duration().unwrap_or(Duration::from_secs(30));
            mux.shutdown_soft(timeout).await?;
        }
        *self.state.lock().unwrap() = SessionState::Closed;
        Ok(())
    }

    /// hard release: `close_stream_now` first if `Open`, then cancel the
    /// query transport. legal from any state.
    pub async fn shutdown_now(&self) -> Result<()> {
        if matches!(*self.state.lock().unwrap(), SessionState::Open { .. }) {
            self.close_stream_now().await?;
        }
        if let Some(mux) = self.query_mux.lock().await.take() {
            unwrap_mux(mux)?.shutdown_hard().await;
        }
        *self.state.lock().unwrap() = SessionState::Closed;
        Ok(())
    }
}

/// a mux slot holds an `Arc` so `ingest`/`query` can clone a handle and drop
/// the lock before blocking on it; shutdown needs to actually consume the
/// multiplex, which only succeeds once every such clone has been dropped.
fn unwrap_mux<S, Out, In>(mux: Arc<StreamMultiplex<S, Out, In>>) -> Result<StreamMultiplex<S, Out, In>> {
    Arc::try_unwrap(mux).map_err(|_| Error::IllegalState("stream is still in use by a concurrent ingest or query call".into()))
}

fn strategy_from_config(decomposition: crate::config::Decomposition) -> Strategy {
    match decomposition {
        crate::config::Decomposition::None => Strategy::None,
        crate::config::Decomposition::Horizontal { n } => Strategy::Horizontal(n),
        crate::config::Decomposition::Vertical { n } => Strategy::Vertical(n),
        crate::config::Decomposition::Grid { h, v } => Strategy::Grid(h, v),
    }
}
