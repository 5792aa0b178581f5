use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{channel, Receiver, Sender};
use tokio::sync::{oneshot, Semaphore};

use crate::codec::{Key, Value};
use crate::node::{Host, Node};
use crate::request::{BatchRequest, RequestContext, SubResponse, Transport};
use crate::util::{RequestError, Result};

type Envelope<K, V> = (
    u64,
    BatchRequest<K, V>,
    RequestContext,
    oneshot::Sender<Result<SubResponse<K, V>>>,
);

const ROUTE_CAPACITY: usize = 1024;

/// In-process transport. Each connected host is served by a task reading
/// its own request channel; calls are routed by the pinned target host.
pub struct ChannelTransport<K: Key, V: Value> {
    routes: HashMap<Host, Sender<Envelope<K, V>>>,
    serial: AtomicU64,
    limiter: Option<Arc<Semaphore>>,
}

impl<K: Key, V: Value> Default for ChannelTransport<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Key, V: Value> ChannelTransport<K, V> {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            serial: AtomicU64::new(0),
            limiter: None,
        }
    }

    /// Bounds the number of calls in flight across all hosts.
    pub fn with_concurrency_limit(mut self, permits: usize) -> Self {
        self.limiter = Some(Arc::new(Semaphore::new(permits)));
        self
    }

    /// Spawns the serving task for `host`. Must be called inside a tokio
    /// runtime. Reconnecting a host replaces its previous node.
    pub fn connect<N>(&mut self, host: Host, node: Arc<N>)
    where
        N: Node<K, V>,
    {
        let (req_tx, req_rx) = channel(ROUTE_CAPACITY);
        tokio::spawn(collect_req(host.clone(), req_rx, node));
        self.routes.insert(host, req_tx);
    }

    pub fn disconnect(&mut self, host: &Host) -> bool {
        self.routes.remove(host).is_some()
    }

    pub fn hosts(&self) -> impl Iterator<Item = &Host> {
        self.routes.keys()
    }

    /// Drops every route; serving tasks exit once their queues drain.
    pub fn close(&mut self) {
        self.routes.clear();
    }

    fn new_serial_id(&self) -> u64 {
        self.serial.fetch_add(1, Ordering::Relaxed)
    }
}

async fn collect_req<K, V, N>(host: Host, mut req_rx: Receiver<Envelope<K, V>>, node: Arc<N>)
where
    K: Key,
    V: Value,
    N: Node<K, V>,
{
    while let Some((serial_id, req, ctx, res_tx)) = req_rx.recv().await {
        let node = node.clone();
        tokio::spawn(async move {
            let res = node.process(req, ctx).await;
            // The caller may have been cancelled.
            let _ = res_tx.send(res);
        });
        log::trace!("{} accepted request #{}", host, serial_id);
    }
    log::debug!("{} stopped serving", host);
}

#[async_trait]
impl<K: Key, V: Value> Transport<K, V> for ChannelTransport<K, V> {
    async fn send(&self, req: BatchRequest<K, V>, ctx: RequestContext) -> Result<SubResponse<K, V>> {
        let host = ctx
            .target_host()
            .cloned()
            .ok_or_else(|| RequestError::SendError("request context has no target host".to_owned()))?;
        let route = self
            .routes
            .get(&host)
            .ok_or_else(|| RequestError::NoRoute(host.clone()))?;

        let _permit = match &self.limiter {
            Some(limiter) => Some(
                limiter
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|e| RequestError::SendError(e.to_string()))?,
            ),
            None => None,
        };

        let serial_id = self.new_serial_id();
        log::trace!("sending request #{} to {}", serial_id, host);
        let (res_tx, res_rx) = oneshot::channel();
        route
            .send((serial_id, req, ctx, res_tx))
            .await
            .map_err(|e| RequestError::SendError(e.to_string()))?;
        res_rx
            .await
            .map_err(|_| RequestError::SendError(format!("{} dropped request #{}", host, serial_id)))?
    }
}
