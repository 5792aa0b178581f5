use crate::codec::{Key, Value};
use crate::node::{Host, Node};
use crate::request::{BatchOp, BatchRequest, KeyResult, KeyStatus, RequestContext, SubResponse};
use crate::storage::Engine;
use crate::util::{RequestError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// A host that answers batch requests from a storage engine.
pub struct StoreNode<E: Engine> {
    host: Host,
    engine: Arc<E>,
}

impl<E: Engine> StoreNode<E> {
    pub fn new(host: Host, engine: Arc<E>) -> Self {
        Self { host, engine }
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }
}

#[async_trait]
impl<E> Node<E::K, E::V> for StoreNode<E>
where
    E: Engine,
{
    async fn process(
        &self,
        req: BatchRequest<E::K, E::V>,
        ctx: RequestContext,
    ) -> Result<SubResponse<E::K, E::V>> {
        if let Some(target) = ctx.target_host() {
            if target != &self.host {
                return Err(RequestError::Misrouted {
                    expected: target.clone(),
                    actual: self.host.clone(),
                }
                .into());
            }
        }

        let engine = self.engine.clone();
        let (op, _, _) = req.into_parts();
        let mut res = SubResponse::new();
        match op {
            BatchOp::Get(keys) => {
                for k in keys {
                    let result = match engine.get(&k)? {
                        Some(v) => KeyResult::Entity(v),
                        None => KeyResult::Status(KeyStatus::NotFound),
                    };
                    res.insert(k, result);
                }
            }
            BatchOp::Update(values) => {
                for (k, v) in values {
                    engine.put(k.clone(), v)?;
                    res.insert(k, KeyResult::Status(KeyStatus::Updated));
                }
            }
            BatchOp::Delete(keys) => {
                for k in keys {
                    let status = if engine.del(&k)? {
                        KeyStatus::Deleted
                    } else {
                        KeyStatus::NotFound
                    };
                    res.insert(k, KeyResult::Status(status));
                }
            }
        }
        Ok(res)
    }
}
