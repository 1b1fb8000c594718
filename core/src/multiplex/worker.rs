//! one stream worker's dispatch loop: first-idle-worker-wins via the shared
//! intake queue, per-worker FIFO send/ack order, correlation of the response
//! (or lack of one) back to the request id that produced it (spec §4.3).

use std::sync::{atomic::Ordering, Arc};

use dp_wire::{StreamKind, StreamRecv, StreamSend};

use super::{ResponseOutcome, Shared, WorkItem};
use crate::queue::Queue;

pub(super) async fn run<S, Out, In>(stream: S, intake: Arc<Queue<WorkItem<Out>>>, shared: Arc<Shared<In>>, kind: StreamKind)
where
    S: StreamSend<Out> + StreamRecv<In> + Send,
    Out: Send,
    In: Clone + Send,
{
    match kind {
        StreamKind::Bidirectional => run_bidi(stream, intake, shared).await,
        StreamKind::Backward => run_backward(stream, intake, shared).await,
    }
}

/// one item in flight at a time, send then await the matched response
/// before pulling the next item: preserves per-worker FIFO (spec §8
/// invariant 7).
async fn run_bidi<S, Out, In>(mut stream: S, intake: Arc<Queue<WorkItem<Out>>>, shared: Arc<Shared<In>>)
where
    S: StreamSend<Out> + StreamRecv<In> + Send,
    Out: Send,
    In: Clone + Send,
{
    loop {
        if shared.hard_cancel.load(Ordering::SeqCst) {
            return;
        }
        let Some(item) = intake.dequeue().await else { return };
        shared.in_flight.lock().unwrap().insert(item.request_id);

        let outcome = match stream.send(item.payload).await {
            Ok(_echoed_id) => match stream.recv().await {
                Ok(Some(resp)) => ResponseOutcome::Ok(resp),
                Ok(None) => ResponseOutcome::Exceptional {
                    status_code: 0,
                    message: "stream closed before a response arrived".into(),
                },
                Err(status) => {
                    tracing::warn!(request_id = %item.request_id, %status, "worker recv failed");
                    status.into()
                }
            },
            Err(status) => {
                tracing::warn!(request_id = %item.request_id, %status, "worker send failed");
                status.into()
            }
        };

        shared.record(item.request_id, outcome);
        shared.finish_in_flight(item.request_id, intake.is_empty());
    }
}

/// sends every item without waiting per-item, then processes the single
/// terminal response the peer sends at stream end and fans it out to every
/// item this worker sent (spec §4.3, §9 open question 1).
async fn run_backward<S, Out, In>(mut stream: S, intake: Arc<Queue<WorkItem<Out>>>, shared: Arc<Shared<In>>)
where
    S: StreamSend<Out> + StreamRecv<In> + Send,
    Out: Send,
    In: Clone + Send,
{
    let mut batch = Vec::new();

    loop {
        if shared.hard_cancel.load(Ordering::SeqCst) {
            break;
        }
        let Some(item) = intake.dequeue().await else { break };
        shared.in_flight.lock().unwrap().insert(item.request_id);

        match stream.send(item.payload).await {
            Ok(_echoed_id) => batch.push(item.request_id),
            Err(status) => {
                tracing::warn!(request_id = %item.request_id, %status, "worker send failed");
                shared.record(item.request_id, status.into());
                shared.finish_in_flight(item.request_id, intake.is_empty());
            }
        }
    }

    if batch.is_empty() {
        return;
    }

    let terminal = match stream.recv().await {
        Ok(Some(resp)) => ResponseOutcome::Ok(resp),
        Ok(None) => ResponseOutcome::Exceptional {
            status_code: 0,
            message: "stream closed before the terminal response arrived".into(),
        },
        Err(status) => status.into(),
    };

    for id in batch {
        shared.record(id, terminal.clone());
        shared.finish_in_flight(id, intake.is_empty());
    }
}

impl<In> From<dp_wire::Status> for ResponseOutcome<In> {
    fn from(status: dp_wire::Status) -> Self {
        ResponseOutcome::Exceptional { status_code: status.code() as i32, message: status.message().to_owned() }
    }
}
