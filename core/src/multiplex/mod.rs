//! pool of `N` concurrent stream workers, each bound to one long-lived
//! stream; fair dispatch of work items and correlation of responses to
//! requests by client-assigned ids (spec §4.3).
//!
//! generic over the wire types, per Design Note §9: ingestion and query
//! facades each instantiate `StreamMultiplex<Service, Out, In>` with their
//! own request/response pair rather than extending a shared base type.

mod worker;

use std::{
    collections::{HashMap, HashSet},
    marker::PhantomData,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
    time::Duration,
};

use dp_wire::{ClientRequestId, StreamKind, StreamRecv, StreamSend};
use tokio::{sync::Notify, task::JoinHandle};

use crate::{
    error::{Error, Result},
    queue::{Capacity, Queue},
};

pub(crate) struct WorkItem<Out> {
    pub request_id: ClientRequestId,
    pub payload: Out,
}

/// outcome recorded against one `ClientRequestId`.
#[derive(Debug, Clone)]
pub enum ResponseOutcome<In> {
    Ok(In),
    Exceptional { status_code: i32, message: String },
    Interrupted,
}

struct Shared<In> {
    responses: Mutex<HashMap<ClientRequestId, ResponseOutcome<In>>>,
    arrival_order: Mutex<Vec<ClientRequestId>>,
    in_flight: Mutex<HashSet<ClientRequestId>>,
    idle: Notify,
    response_ready: Notify,
    hard_cancel: AtomicBool,
}

impl<In> Default for Shared<In> {
    fn default() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            arrival_order: Mutex::new(Vec::new()),
            in_flight: Mutex::new(HashSet::new()),
            idle: Notify::new(),
            response_ready: Notify::new(),
            hard_cancel: AtomicBool::new(false),
        }
    }
}

impl<In> Shared<In> {
    /// no id is ever recorded twice (spec §8 invariant 6): first writer wins.
    fn record(&self, id: ClientRequestId, outcome: ResponseOutcome<In>) {
        let mut responses = self.responses.lock().unwrap();
        if responses.contains_key(&id) {
            return;
        }
        responses.insert(id, outcome);
        drop(responses);
        self.arrival_order.lock().unwrap().push(id);
        self.response_ready.notify_waiters();
    }

    fn finish_in_flight(&self, id: ClientRequestId, outgoing_empty: bool) {
        self.in_flight.lock().unwrap().remove(&id);
        if outgoing_empty && self.in_flight.lock().unwrap().is_empty() {
            self.idle.notify_waiters();
        }
    }
}

/// owns `N` stream workers and the shared intake queue/correlation map that
/// front them.
pub struct StreamMultiplex<S, Out, In> {
    intake: std::sync::Arc<Queue<WorkItem<Out>>>,
    id_gen: std::sync::Arc<crate::ids::RequestIdGenerator>,
    shared: std::sync::Arc<Shared<In>>,
    workers: Vec<JoinHandle<()>>,
    _service: PhantomData<fn() -> S>,
}

impl<S, Out, In> StreamMultiplex<S, Out, In>
where
    S: StreamSend<Out> + StreamRecv<In> + Send + 'static,
    Out: Send + 'static,
    In: Clone + Send + 'static,
{
    /// spawn one worker task per stream in `streams`. `intake_capacity`
    /// configures the shared back-pressure queue (spec §4.4).
    pub fn spawn(streams: Vec<S>, kind: StreamKind, intake_capacity: Capacity) -> Self {
        let intake = std::sync::Arc::new(Queue::new(intake_capacity));
        let id_gen = std::sync::Arc::new(crate::ids::RequestIdGenerator::new());
        let shared = std::sync::Arc::new(Shared::default());

        let workers = streams
            .into_iter()
            .map(|stream| {
                let intake = intake.clone();
                let shared = shared.clone();
                tokio::spawn(worker::run(stream, intake, shared, kind))
            })
            .collect();

        Self { intake, id_gen, shared, workers, _service: PhantomData }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// mint a request id, let `build` stamp it onto the payload, and enqueue
    /// the result; blocks under back-pressure.
    pub async fn submit(&self, build: impl FnOnce(ClientRequestId) -> Out) -> Result<ClientRequestId> {
        let id = self.id_gen.next_id();
        self.intake.submit(WorkItem { request_id: id, payload: build(id) }).await?;
        Ok(id)
    }

    pub async fn submit_timeout(&self, build: impl FnOnce(ClientRequestId) -> Out, timeout: Duration) -> Result<ClientRequestId> {
        let id = self.id_gen.next_id();
        if self.intake.submit_timeout(WorkItem { request_id: id, payload: build(id) }, timeout).await? {
            Ok(id)
        } else {
            Err(Error::TimedOut)
        }
    }

    /// block until `id`'s outcome has been recorded, then return it.
    pub async fn await_response(&self, id: ClientRequestId) -> ResponseOutcome<In> {
        loop {
            if let Some(outcome) = self.response(id) {
                return outcome;
            }
            self.shared.response_ready.notified().await;
        }
    }

    pub fn outgoing_queue_size(&self) -> usize {
        self.intake.len()
    }

    /// completes when the intake queue is empty and every worker reports no
    /// in-flight request.
    pub async fn await_outgoing_queue_empty(&self) {
        loop {
            if self.intake.is_empty() && self.shared.in_flight.lock().unwrap().is_empty() {
                return;
            }
            self.shared.idle.notified().await;
        }
    }

    /// look up a previously-recorded outcome by id, without consuming it.
    pub fn response(&self, id: ClientRequestId) -> Option<ResponseOutcome<In>> {
        self.shared.responses.lock().unwrap().get(&id).cloned()
    }

    /// stop accepting submissions, let in-flight and already-queued work
    /// complete, then return every recorded outcome in arrival order.
    pub async fn shutdown_soft(mut self, timeout: Duration) -> Result<Vec<(ClientRequestId, ResponseOutcome<In>)>> {
        self.intake.shutdown();
        let drain = async {
            for handle in self.workers.drain(..) {
                let _ = handle.await;
            }
        };
        tokio::time::timeout(timeout, drain).await.map_err(|_| Error::ShutdownFailed)?;
        Ok(self.collected())
    }

    /// cancel every worker immediately; anything queued or mid-flight is
    /// discarded and recorded as `Interrupted`.
    pub async fn shutdown_hard(mut self) -> Vec<(ClientRequestId, ResponseOutcome<In>)> {
        self.shared.hard_cancel.store(true, Ordering::SeqCst);
        self.intake.shutdown();

        for item in self.intake.drain() {
            self.shared.record(item.request_id, ResponseOutcome::Interrupted);
        }
        for handle in self.workers.drain(..) {
            handle.abort();
        }
        let stuck: Vec<_> = self.shared.in_flight.lock().unwrap().drain().collect();
        for id in stuck {
            self.shared.record(id, ResponseOutcome::Interrupted);
        }
        self.shared.idle.notify_waiters();
        self.collected()
    }

    fn collected(&self) -> Vec<(ClientRequestId, ResponseOutcome<In>)> {
        let order = self.shared.arrival_order.lock().unwrap().clone();
        let mut responses = self.shared.responses.lock().unwrap();
        order.into_iter().filter_map(|id| responses.remove(&id).map(|r| (id, r))).collect()
    }
}
