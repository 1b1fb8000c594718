//! end-to-end scenarios from spec §8 that need an actual (fake) transport
//! to exercise: binning through to acknowledgement, and cancellation mid
//! drain. the decomposer and assembler's own scenarios (S2, S4, S5) are
//! covered where they're implemented, since no transport is involved there.

use std::time::Duration;

use bytes::Bytes;
use dp_core::multiplex::{ResponseOutcome, StreamMultiplex};
use dp_wire::{ClientRequestId, IngestDataRequest, IngestDataResponse, IngestResponseKind, ProviderUid, StreamKind, StreamRecv, StreamSend, Status};

/// one in-flight request at a time per worker: `send` records the id, the
/// next `recv` acks it. Mirrors a real bidirectional stream closely enough
/// for per-worker FIFO send/ack (spec §4.3).
struct AutoAckStream {
    pending: Option<ClientRequestId>,
}

impl StreamSend<IngestDataRequest> for AutoAckStream {
    async fn send(&mut self, item: IngestDataRequest) -> Result<ClientRequestId, Status> {
        self.pending = Some(item.request_id);
        Ok(item.request_id)
    }
}

impl StreamRecv<IngestDataResponse> for AutoAckStream {
    async fn recv(&mut self) -> Result<Option<IngestDataResponse>, Status> {
        let request_id = self.pending.take().expect("recv called without a matching send");
        Ok(Some(IngestDataResponse { request_id, kind: IngestResponseKind::Ack }))
    }
}

/// a worker whose stream never produces a response, modeling a peer that's
/// gone silent: `send` succeeds, `recv` hangs forever.
struct StallStream;

impl StreamSend<IngestDataRequest> for StallStream {
    async fn send(&mut self, item: IngestDataRequest) -> Result<ClientRequestId, Status> {
        Ok(item.request_id)
    }
}

impl StreamRecv<IngestDataResponse> for StallStream {
    async fn recv(&mut self) -> Result<Option<IngestDataResponse>, Status> {
        std::future::pending::<()>().await;
        unreachable!("never resolves")
    }
}

/// S1 from spec §8: 1000 rows, 8 bytes/row, budget 2048 -> 4 request
/// messages of [256, 256, 256, 232] rows, four ids, four acks.
#[tokio::test]
async fn s1_bin_and_send() {
    let mut frame = dp_core::IngestionFrame::new();
    frame.set_clock(dp_core::SamplingClock::new(0, 1_000_000, 1000)).unwrap();
    frame.add_column("a", dp_core::ColumnValues::Int64((0..1000i64).map(Some).collect())).unwrap();

    let bins = dp_core::decompose::bin_frame(&frame, 2048).unwrap();
    assert_eq!(bins.iter().map(dp_core::IngestionFrame::row_count).collect::<Vec<_>>(), vec![256, 256, 256, 232]);

    let mux = StreamMultiplex::spawn(vec![AutoAckStream { pending: None }], StreamKind::Bidirectional, None);
    let provider_id = ProviderUid(1);

    let mut ids = Vec::new();
    for _bin in &bins {
        let id = mux.submit(|request_id| IngestDataRequest { request_id, provider_id, payload: Bytes::new() }).await.unwrap();
        ids.push(id);
    }

    mux.await_outgoing_queue_empty().await;
    let records = mux.shutdown_soft(Duration::from_secs(5)).await.unwrap();

    assert_eq!(records.len(), 4);
    for (id, outcome) in &records {
        assert!(ids.contains(id));
        assert!(matches!(outcome, ResponseOutcome::Ok(resp) if matches!(resp.kind, IngestResponseKind::Ack)));
    }
}

/// S6 from spec §8: 100 items in flight against workers that never respond,
/// then `shutdown_now` (modeled as `shutdown_hard`) completes immediately and
/// every one of the 100 ids is recorded exactly once, as `Interrupted`.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn s6_cancellation_during_drain() {
    let streams: Vec<StallStream> = (0..4).map(|_| StallStream).collect();
    let mux = StreamMultiplex::spawn(streams, StreamKind::Bidirectional, None);
    let provider_id = ProviderUid(1);

    let mut ids = Vec::with_capacity(100);
    for _ in 0..100 {
        let id = mux.submit(|request_id| IngestDataRequest { request_id, provider_id, payload: Bytes::new() }).await.unwrap();
        ids.push(id);
    }

    // give the four workers a chance to pull their first item into flight.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let records = mux.shutdown_hard().await;

    assert_eq!(records.len(), 100);
    let mut seen: Vec<ClientRequestId> = records.iter().map(|(id, _)| *id).collect();
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 100, "no id observed twice");
    for id in &ids {
        assert!(records.iter().any(|(rid, _)| rid == id), "every submitted id is accounted for");
    }
    for (_, outcome) in &records {
        assert!(matches!(outcome, ResponseOutcome::Interrupted), "nothing was ever acked");
    }
}
