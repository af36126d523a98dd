//! Controllable indexing engine for coordinator and manager tests
//!
//! Unlike a mockall mock, [`ControlledEngine`] can hold reindex calls open until
//! the test releases them, which is what exercising overlapping requests needs.

use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Semaphore, watch};

use crate::index::engine::{IndexEngine, IndexEngineError, ReindexRequest};

fn failure(stderr: &str) -> IndexEngineError {
    IndexEngineError::Failed {
        status: Some(1),
        stderr: stderr.to_string(),
    }
}

/// Call observed by [`ControlledEngine`], in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Initialize,
    Vacuum,
    Reindex(ReindexRequest),
    SetDatabase(String),
}

pub struct ControlledEngine {
    calls: Mutex<Vec<EngineCall>>,
    call_count: watch::Sender<usize>,
    // Reindex calls wait for a permit when gated
    gate: Option<Semaphore>,
    fail_reindex: AtomicBool,
}

impl ControlledEngine {
    /// Engine whose calls settle as soon as they are made
    pub fn immediate() -> Self {
        Self::with_gate(None)
    }

    /// Engine whose reindex calls settle only after [`Self::release`]
    pub fn gated() -> Self {
        Self::with_gate(Some(Semaphore::new(0)))
    }

    fn with_gate(gate: Option<Semaphore>) -> Self {
        let (call_count, _) = watch::channel(0);
        Self {
            calls: Mutex::new(Vec::new()),
            call_count,
            gate,
            fail_reindex: AtomicBool::new(false),
        }
    }

    /// Let `count` pending or future reindex calls settle, in arrival order
    pub fn release(&self, count: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(count);
        }
    }

    /// Make subsequent reindex calls settle with a failure
    pub fn fail_reindex(&self, fail: bool) {
        self.fail_reindex.store(fail, Ordering::SeqCst);
    }

    /// Wait until at least `count` calls (of any kind) have been made
    pub async fn wait_for_calls(&self, count: usize) {
        let mut receiver = self.call_count.subscribe();
        receiver
            .wait_for(|made| *made >= count)
            .await
            .expect("call counter closed");
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn reindex_calls(&self) -> Vec<ReindexRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                EngineCall::Reindex(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().unwrap().push(call);
        self.call_count.send_modify(|made| *made += 1);
    }
}

#[async_trait]
impl IndexEngine for ControlledEngine {
    async fn initialize(&self) -> Result<(), IndexEngineError> {
        self.record(EngineCall::Initialize);
        Ok(())
    }

    async fn vacuum(&self) -> Result<(), IndexEngineError> {
        self.record(EngineCall::Vacuum);
        Ok(())
    }

    async fn reindex(&self, request: ReindexRequest) -> Result<(), IndexEngineError> {
        self.record(EngineCall::Reindex(request));

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|_| failure("gate closed"))?
                .forget();
        }

        if self.fail_reindex.load(Ordering::SeqCst) {
            Err(failure("reindex failed"))
        } else {
            Ok(())
        }
    }

    fn set_index_database_name(&self, name: &str) {
        self.record(EngineCall::SetDatabase(name.to_string()));
    }
}
