use crate::codec::{Key, Value};
use crate::node::Host;
use crate::request::{KeyResult, LogicalResponse, SubRequest, SubResponse, Transport};
use crate::shard::PartitionId;
use crate::util::{Error, RequestError, Result};
use futures::future::{abortable, AbortHandle};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::channel;

/// One sub-request that did not produce a usable response.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchFailure<K: Key> {
    pub host: Host,
    pub partition: PartitionId,
    pub keys: BTreeSet<K>,
    pub error: Error,
}

/// Every failed sub-request of one execution, reported once all of them
/// have settled.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{} of {} sub-requests failed", .failures.len(), .total)]
pub struct AggregateDispatchFailure<K: Key> {
    failures: Vec<DispatchFailure<K>>,
    total: usize,
}

impl<K: Key> AggregateDispatchFailure<K> {
    pub fn failures(&self) -> &[DispatchFailure<K>] {
        &self.failures
    }

    pub fn into_failures(self) -> Vec<DispatchFailure<K>> {
        self.failures
    }

    /// Number of sub-requests that were dispatched.
    pub fn total(&self) -> usize {
        self.total
    }

    /// The keys to send again to recover from the failures.
    pub fn failed_keys(&self) -> BTreeSet<K> {
        self.failures
            .iter()
            .flat_map(|f| f.keys.iter().cloned())
            .collect()
    }
}

struct Dispatch<K: Key> {
    host: Host,
    partition: PartitionId,
    keys: BTreeSet<K>,
}

/// Aborts outstanding dispatches when the execution is dropped. Aborting a
/// finished dispatch does nothing.
struct DispatchGuard(Vec<AbortHandle>);

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

/// Single-writer merge state. Responses are held back until every
/// dispatch has settled so that overlapping answers blame every host
/// involved, whatever order they arrived in.
struct Gather<K: Key, V> {
    answered: Vec<(Dispatch<K>, BTreeMap<K, KeyResult<V>>)>,
    failures: Vec<DispatchFailure<K>>,
    total: usize,
}

impl<K: Key, V: Value> Gather<K, V> {
    fn new(total: usize) -> Self {
        Self {
            answered: Vec::with_capacity(total),
            failures: Vec::new(),
            total,
        }
    }

    fn fail(&mut self, dispatch: Dispatch<K>, error: Error) {
        log::warn!(
            "sub-request to {} (partition {}, {} keys) failed: {}",
            dispatch.host,
            dispatch.partition,
            dispatch.keys.len(),
            error
        );
        self.failures.push(DispatchFailure {
            host: dispatch.host,
            partition: dispatch.partition,
            keys: dispatch.keys,
            error,
        });
    }

    fn violation(&mut self, dispatch: Dispatch<K>, detail: String) {
        let error = RequestError::ProtocolViolation {
            host: dispatch.host.clone(),
            detail,
        };
        self.fail(dispatch, error.into());
    }

    fn merge(&mut self, dispatch: Dispatch<K>, res: Result<SubResponse<K, V>>) {
        let response = match res {
            Ok(response) => response.into_results(),
            Err(e) => return self.fail(dispatch, e),
        };

        let foreign: Vec<&K> = response
            .keys()
            .filter(|k| !dispatch.keys.contains(*k))
            .collect();
        if !foreign.is_empty() {
            let detail = format!("answered keys it was not sent: {:?}", foreign);
            return self.violation(dispatch, detail);
        }
        let left_out: Vec<&K> = dispatch
            .keys
            .iter()
            .filter(|k| !response.contains_key(*k))
            .collect();
        if !left_out.is_empty() {
            let detail = format!("left keys unanswered: {:?}", left_out);
            return self.violation(dispatch, detail);
        }
        self.answered.push((dispatch, response));
    }

    fn finish(mut self) -> std::result::Result<LogicalResponse<K, V>, AggregateDispatchFailure<K>> {
        let shared: BTreeSet<K> = {
            let mut seen = BTreeSet::new();
            let mut shared = BTreeSet::new();
            for k in self.answered.iter().flat_map(|(_, response)| response.keys()) {
                if !seen.insert(k) {
                    shared.insert(k.clone());
                }
            }
            shared
        };

        let mut results = BTreeMap::new();
        for (dispatch, response) in std::mem::take(&mut self.answered) {
            let overlap: Vec<&K> = response.keys().filter(|k| shared.contains(*k)).collect();
            if !overlap.is_empty() {
                let detail = format!("keys also answered by another host: {:?}", overlap);
                self.violation(dispatch, detail);
                continue;
            }
            results.extend(response);
        }

        if !self.failures.is_empty() {
            self.failures
                .sort_by(|a, b| (a.partition, &a.host).cmp(&(b.partition, &b.host)));
            return Err(AggregateDispatchFailure {
                failures: self.failures,
                total: self.total,
            });
        }
        Ok(LogicalResponse { results })
    }
}

/// Dispatches sub-requests concurrently and gathers one logical response.
pub struct ScatterGatherExecutor<T> {
    transport: Arc<T>,
}

impl<T> Clone for ScatterGatherExecutor<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
        }
    }
}

impl<T> ScatterGatherExecutor<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Sends every sub-request on its own task and waits for all of them to
    /// settle before answering. A failing host never cuts the wait short;
    /// all failures are reported together.
    ///
    /// Dropping the returned future aborts the dispatches still in flight.
    pub async fn execute<K, V>(
        &self,
        requests: Vec<SubRequest<K, V>>,
    ) -> std::result::Result<LogicalResponse<K, V>, AggregateDispatchFailure<K>>
    where
        K: Key,
        V: Value,
        T: Transport<K, V>,
    {
        let total = requests.len();
        let (res_tx, mut res_rx) = channel(total.max(1));
        let mut pending = Vec::with_capacity(total);
        let mut guard = DispatchGuard(Vec::with_capacity(total));

        for (index, sub) in requests.into_iter().enumerate() {
            let SubRequest {
                host,
                partition,
                request,
                context,
            } = sub;
            log::debug!(
                "dispatching {:?} of {} keys to {} (partition {})",
                request.operation(),
                request.op().len(),
                host,
                partition
            );
            pending.push(Some(Dispatch {
                keys: request.key_set(),
                host,
                partition,
            }));

            let transport = self.transport.clone();
            let res_tx = res_tx.clone();
            let (dispatch, handle) = abortable(async move {
                let res = transport.send(request, context).await;
                let _ = res_tx.send((index, res)).await;
            });
            guard.0.push(handle);
            tokio::spawn(dispatch);
        }
        drop(res_tx);

        let mut gather = Gather::new(total);
        let mut settled = 0;
        while settled < total {
            let (index, res) = match res_rx.recv().await {
                Some(settlement) => settlement,
                // Every task is gone; the ones that never reported are
                // failed below.
                None => break,
            };
            settled += 1;
            if let Some(dispatch) = pending.get_mut(index).and_then(Option::take) {
                gather.merge(dispatch, res);
            }
        }
        for dispatch in pending.into_iter().flatten() {
            let error = RequestError::SendError("dispatch ended without a response".to_owned());
            gather.fail(dispatch, error.into());
        }
        drop(guard);

        gather.finish()
    }
}
