//! Per-call routing and lifecycle.
//!
//! One ingestion task per call owns that call's turn controller (and
//! with it the endpoint detector); the manager only routes events and
//! brackets the call with registry start/end.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;

use phone_agent_core::{AudioEncoding, CallSession};
use phone_agent_persistence::CallRegistry;
use phone_agent_pipeline::{
    EndpointDetector, Engines, PipelineError, ResourcePools, TurnConfig, TurnController,
};
use phone_agent_transport::{AudioSink, CallEvent};

use crate::ServerError;

/// Builds a per-call endpoint detector for the call's inbound rate.
pub type DetectorFactory =
    Arc<dyn Fn(u32) -> Result<EndpointDetector, PipelineError> + Send + Sync>;

enum Inbound {
    Audio(Vec<u8>),
    Hangup,
}

struct CallHandle {
    tx: mpsc::Sender<Inbound>,
}

/// Inbound chunks buffered per call before new audio is dropped.
const INBOUND_QUEUE: usize = 64;

/// Routes transport events to per-call ingestion tasks.
pub struct CallManager {
    engines: Arc<Engines>,
    pools: Arc<ResourcePools>,
    registry: Arc<dyn CallRegistry>,
    detector_factory: DetectorFactory,
    turn_config: TurnConfig,
    calls: Arc<RwLock<HashMap<String, CallHandle>>>,
}

impl CallManager {
    pub fn new(
        engines: Arc<Engines>,
        pools: Arc<ResourcePools>,
        registry: Arc<dyn CallRegistry>,
        detector_factory: DetectorFactory,
        turn_config: TurnConfig,
    ) -> Self {
        Self {
            engines,
            pools,
            registry,
            detector_factory,
            turn_config,
            calls: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Dispatch one transport event. `sink` is the outbound leg for
    /// the call the event belongs to.
    pub async fn dispatch(
        &self,
        event: CallEvent,
        sink: Arc<dyn AudioSink>,
    ) -> Result<(), ServerError> {
        match event {
            CallEvent::Started {
                call_uuid,
                phone,
                sample_rate,
                encoding,
            } => {
                self.start_call(&call_uuid, &phone, sample_rate, encoding, sink)
                    .await
            }
            CallEvent::Audio { call_uuid, chunk } => self.push_audio(&call_uuid, chunk),
            CallEvent::Ended { call_uuid } => {
                self.end_call(&call_uuid);
                Ok(())
            }
        }
    }

    /// A media stream attached: register the call and spawn its
    /// ingestion task.
    pub async fn start_call(
        &self,
        call_uuid: &str,
        phone: &str,
        sample_rate: u32,
        encoding: AudioEncoding,
        sink: Arc<dyn AudioSink>,
    ) -> Result<(), ServerError> {
        if self.calls.read().contains_key(call_uuid) {
            return Err(ServerError::Call(format!(
                "stream already attached: {call_uuid}"
            )));
        }

        let detector =
            (self.detector_factory)(sample_rate).map_err(|e| ServerError::Call(e.to_string()))?;
        let ids = self
            .registry
            .start_call(call_uuid, phone)
            .await
            .map_err(|e| ServerError::Call(e.to_string()))?;

        let call = CallSession {
            call_uuid: call_uuid.to_string(),
            phone: phone.to_string(),
            ids,
            sample_rate,
            encoding,
        };

        let (tx, rx) = mpsc::channel(INBOUND_QUEUE);
        self.calls
            .write()
            .insert(call_uuid.to_string(), CallHandle { tx });

        let controller = TurnController::new(
            call.clone(),
            detector,
            self.engines.clone(),
            self.pools.clone(),
            sink,
            self.turn_config.clone(),
        );
        tokio::spawn(ingest(
            controller,
            rx,
            call,
            self.registry.clone(),
            self.calls.clone(),
        ));

        tracing::info!(call = call_uuid, phone, sample_rate, "stream attached");
        Ok(())
    }

    /// Push one decoded audio chunk. A full queue drops the chunk
    /// (with a warning) rather than stalling the adapter.
    pub fn push_audio(&self, call_uuid: &str, chunk: Vec<u8>) -> Result<(), ServerError> {
        let calls = self.calls.read();
        let handle = calls
            .get(call_uuid)
            .ok_or_else(|| ServerError::UnknownCall(call_uuid.to_string()))?;
        if handle.tx.try_send(Inbound::Audio(chunk)).is_err() {
            tracing::warn!(call = call_uuid, "inbound queue full, dropping audio chunk");
        }
        Ok(())
    }

    /// The transport reported hangup (or the connection dropped).
    pub fn end_call(&self, call_uuid: &str) {
        let handle = self.calls.write().remove(call_uuid);
        if let Some(handle) = handle {
            let _ = handle.tx.try_send(Inbound::Hangup);
        }
    }

    pub fn active_calls(&self) -> usize {
        self.calls.read().len()
    }
}

/// The call's ingestion task: sole owner of the turn controller.
async fn ingest(
    mut controller: TurnController,
    mut rx: mpsc::Receiver<Inbound>,
    call: CallSession,
    registry: Arc<dyn CallRegistry>,
    calls: Arc<RwLock<HashMap<String, CallHandle>>>,
) {
    while let Some(msg) = rx.recv().await {
        match msg {
            Inbound::Audio(chunk) => controller.handle_audio(&chunk),
            Inbound::Hangup => break,
        }
    }

    // Hangup, or every sender dropped: tear the call down.
    controller.shutdown();
    calls.write().remove(&call.call_uuid);
    if let Err(e) = registry.end_call(&call.ids.call_id).await {
        tracing::warn!(call = %call.call_uuid, "failed to record call end: {e}");
    }
    tracing::info!(call = %call.call_uuid, "call ended");
}
