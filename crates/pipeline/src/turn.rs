//! Per-call turn lifecycle.
//!
//! One controller per call owns the endpoint detector and the
//! single-flight turn slot, drives the collaborator stages in order
//! (transcribe, reason, synthesize) and streams the reply out through
//! the transcoder/pacer. Barge-in cancels whatever is in flight.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use phone_agent_core::{audio, CallSession};
use phone_agent_transport::AudioSink;

use crate::brain::{Brain, Response};
use crate::endpoint::{EndpointDetector, EndpointEvent};
use crate::outbound::{OutboundConfig, OutboundStream, StreamOutcome};
use crate::reflex::ReflexStore;
use crate::scheduler::ResourcePools;
use crate::stt::Transcriber;
use crate::tts::Synthesizer;
use crate::PipelineError;

/// Shared collaborator backends, constructed once at process start and
/// passed to every call by reference.
pub struct Engines {
    pub stt: Arc<dyn Transcriber>,
    pub brain: Arc<dyn Brain>,
    pub tts: Arc<dyn Synthesizer>,
    pub reflexes: Arc<ReflexStore>,
}

/// Turn-level tuning.
#[derive(Debug, Clone)]
pub struct TurnConfig {
    /// Transcripts shorter than this abort the turn.
    pub min_transcript_chars: usize,
    /// Sample rate requested from the synthesizer (reflex assets are
    /// stored at the same rate).
    pub synthesis_rate: u32,
    /// Outbound framing and pacing.
    pub outbound: OutboundConfig,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            min_transcript_chars: 2,
            synthesis_rate: 16000,
            outbound: OutboundConfig::default(),
        }
    }
}

/// How a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed,
    /// Clean abort: empty transcript, empty reply or silent synthesis.
    Aborted,
    Cancelled,
}

struct ActiveTurn {
    id: u64,
    cancel: CancellationToken,
}

/// Per-call orchestrator.
///
/// `handle_audio` runs on the call's ingestion task; the turn itself
/// runs as a separate cancellable task. The slot is the mutual
/// exclusion token: at most one turn processes per call.
pub struct TurnController {
    call: CallSession,
    detector: EndpointDetector,
    engines: Arc<Engines>,
    pools: Arc<ResourcePools>,
    sink: Arc<dyn AudioSink>,
    config: TurnConfig,
    active: Arc<Mutex<Option<ActiveTurn>>>,
    next_turn_id: u64,
}

impl TurnController {
    pub fn new(
        call: CallSession,
        detector: EndpointDetector,
        engines: Arc<Engines>,
        pools: Arc<ResourcePools>,
        sink: Arc<dyn AudioSink>,
        config: TurnConfig,
    ) -> Self {
        Self {
            call,
            detector,
            engines,
            pools,
            sink,
            config,
            active: Arc::new(Mutex::new(None)),
            next_turn_id: 0,
        }
    }

    /// Whether a turn is currently processing.
    pub fn is_processing(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Feed one inbound audio chunk (decoded PCM16 at the call rate).
    pub fn handle_audio(&mut self, chunk: &[u8]) {
        match self.detector.process_chunk(chunk) {
            Some(EndpointEvent::BargeIn) => self.on_barge_in(),
            Some(EndpointEvent::Utterance(pcm)) => self.on_utterance(pcm),
            None => {}
        }
    }

    /// Cancel the in-flight turn, if any, and free the slot.
    pub fn cancel_active(&self) {
        if let Some(turn) = self.active.lock().take() {
            turn.cancel.cancel();
        }
    }

    /// Call teardown: stop the active turn and drop detector state.
    /// Registry notification is the call manager's job.
    pub fn shutdown(&mut self) {
        self.cancel_active();
        self.detector.reset();
    }

    fn on_barge_in(&self) {
        let turn = self.active.lock().take();
        if let Some(turn) = turn {
            tracing::info!(
                call = %self.call.call_uuid,
                turn = turn.id,
                "barge-in, cancelling active turn"
            );
            turn.cancel.cancel();
        }
    }

    fn on_utterance(&mut self, pcm: Vec<u8>) {
        let mut active = self.active.lock();
        if active.is_some() {
            // Single-flight: the caller finished another utterance
            // while a turn is still processing. Barge-in is the only
            // interrupt path; this one is dropped.
            tracing::debug!(
                call = %self.call.call_uuid,
                bytes = pcm.len(),
                "utterance dropped, turn already in flight"
            );
            return;
        }

        let id = self.next_turn_id;
        self.next_turn_id += 1;
        let cancel = CancellationToken::new();
        *active = Some(ActiveTurn {
            id,
            cancel: cancel.clone(),
        });
        drop(active);

        tracing::info!(
            call = %self.call.call_uuid,
            turn = id,
            bytes = pcm.len(),
            "starting turn"
        );

        let ctx = TurnContext {
            call: self.call.clone(),
            engines: self.engines.clone(),
            pools: self.pools.clone(),
            sink: self.sink.clone(),
            config: self.config.clone(),
        };
        let slot = self.active.clone();
        tokio::spawn(async move {
            match run_turn(&ctx, &pcm, &cancel).await {
                Ok(outcome) => {
                    tracing::info!(call = %ctx.call.call_uuid, turn = id, ?outcome, "turn finished");
                }
                Err(e) => {
                    tracing::warn!(call = %ctx.call.call_uuid, turn = id, "turn failed: {e}");
                }
            }
            // Free the slot only if it still belongs to this turn; a
            // barge-in may already have handed it to a newer one.
            let mut guard = slot.lock();
            if guard.as_ref().is_some_and(|t| t.id == id) {
                *guard = None;
            }
        });
    }
}

struct TurnContext {
    call: CallSession,
    engines: Arc<Engines>,
    pools: Arc<ResourcePools>,
    sink: Arc<dyn AudioSink>,
    config: TurnConfig,
}

/// One listen-process-speak cycle.
///
/// Cancellation is observed before each resource acquisition and
/// before each outbound chunk; an in-flight collaborator call runs to
/// completion.
async fn run_turn(
    ctx: &TurnContext,
    utterance: &[u8],
    cancel: &CancellationToken,
) -> Result<TurnOutcome, PipelineError> {
    if cancel.is_cancelled() {
        return Ok(TurnOutcome::Cancelled);
    }

    let transcript = match ctx
        .pools
        .cpu
        .run(cancel, ctx.engines.stt.transcribe(utterance, ctx.call.sample_rate))
        .await
    {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            tracing::warn!(call = %ctx.call.call_uuid, "transcription failed: {e}");
            return Ok(TurnOutcome::Aborted);
        }
        Err(PipelineError::Cancelled) => return Ok(TurnOutcome::Cancelled),
        Err(e) => return Err(e),
    };
    let transcript = transcript.trim().to_string();
    if transcript.chars().count() < ctx.config.min_transcript_chars {
        return Ok(TurnOutcome::Aborted);
    }
    tracing::info!(call = %ctx.call.call_uuid, "caller: {transcript}");

    if cancel.is_cancelled() {
        return Ok(TurnOutcome::Cancelled);
    }

    let reply = match ctx
        .engines
        .brain
        .respond(
            &ctx.call.ids.call_id,
            &ctx.call.ids.caller_id,
            &ctx.call.phone,
            &transcript,
        )
        .await
    {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!(call = %ctx.call.call_uuid, "reasoning failed: {e}");
            return Ok(TurnOutcome::Aborted);
        }
    };
    if let Some(line) = &reply.log {
        tracing::info!(call = %ctx.call.call_uuid, "{line}");
    }

    if cancel.is_cancelled() {
        return Ok(TurnOutcome::Cancelled);
    }

    match reply.response {
        Response::Spoken { text } => {
            if text.trim().is_empty() {
                return Ok(TurnOutcome::Aborted);
            }
            let wave = match ctx
                .pools
                .gpu
                .run(cancel, ctx.engines.tts.synthesize(&text, ctx.config.synthesis_rate))
                .await
            {
                Ok(Ok(Some(wave))) => wave,
                Ok(Ok(None)) => return Ok(TurnOutcome::Aborted),
                Ok(Err(e)) => {
                    tracing::warn!(call = %ctx.call.call_uuid, "synthesis failed: {e}");
                    return Ok(TurnOutcome::Aborted);
                }
                Err(PipelineError::Cancelled) => return Ok(TurnOutcome::Cancelled),
                Err(e) => return Err(e),
            };
            let Some(pcm) = audio::f32_to_pcm16(&wave) else {
                return Ok(TurnOutcome::Aborted);
            };
            stream_out(ctx, &pcm, cancel).await
        }
        Response::Reflex { asset } => {
            let Some(bytes) = ctx.engines.reflexes.get(&asset) else {
                tracing::warn!(call = %ctx.call.call_uuid, asset, "reflex asset missing, skipping");
                return Ok(TurnOutcome::Aborted);
            };
            stream_out(ctx, &bytes, cancel).await
        }
    }
}

async fn stream_out(
    ctx: &TurnContext,
    pcm: &[u8],
    cancel: &CancellationToken,
) -> Result<TurnOutcome, PipelineError> {
    let mut stream = OutboundStream::new(
        ctx.call.encoding,
        ctx.config.synthesis_rate,
        &ctx.config.outbound,
        ctx.sink.clone(),
    )?;

    if let StreamOutcome::Cancelled = stream.write(pcm, cancel).await? {
        return Ok(TurnOutcome::Cancelled);
    }
    match stream.finish(cancel).await? {
        StreamOutcome::Cancelled => Ok(TurnOutcome::Cancelled),
        StreamOutcome::Completed => Ok(TurnOutcome::Completed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    use phone_agent_core::{AudioEncoding, CallIds};
    use phone_agent_transport::TransportError;

    use crate::brain::BrainReply;
    use crate::endpoint::DetectorConfig;
    use crate::stt::SimulatedTranscriber;
    use crate::tts::SimulatedSynthesizer;

    struct CollectingSink {
        frames: Mutex<Vec<Vec<u8>>>,
    }

    impl CollectingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                frames: Mutex::new(Vec::new()),
            })
        }

        fn frame_count(&self) -> usize {
            self.frames.lock().len()
        }

        fn total_bytes(&self) -> usize {
            self.frames.lock().iter().map(|f| f.len()).sum()
        }
    }

    #[async_trait]
    impl AudioSink for CollectingSink {
        async fn send_audio(&self, frame: &[u8]) -> Result<(), TransportError> {
            self.frames.lock().push(frame.to_vec());
            Ok(())
        }
    }

    struct CountingBrain {
        calls: AtomicUsize,
        reply: Response,
        gate: Option<Arc<Notify>>,
    }

    impl CountingBrain {
        fn spoken(text: &str) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                reply: Response::Spoken {
                    text: text.to_string(),
                },
                gate: None,
            })
        }

        fn gated(text: &str, gate: Arc<Notify>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                reply: Response::Spoken {
                    text: text.to_string(),
                },
                gate: Some(gate),
            })
        }

        fn reflex(asset: &str) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                reply: Response::Reflex {
                    asset: asset.to_string(),
                },
                gate: None,
            })
        }
    }

    #[async_trait]
    impl Brain for CountingBrain {
        async fn respond(
            &self,
            _call_id: &str,
            _caller_id: &str,
            _phone: &str,
            _text: &str,
        ) -> Result<BrainReply, PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            Ok(BrainReply {
                response: self.reply.clone(),
                log: None,
            })
        }
    }

    struct CountingSynth {
        calls: AtomicUsize,
        inner: SimulatedSynthesizer,
    }

    impl CountingSynth {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                inner: SimulatedSynthesizer::new(),
            })
        }
    }

    #[async_trait]
    impl Synthesizer for CountingSynth {
        async fn synthesize(
            &self,
            text: &str,
            sample_rate: u32,
        ) -> Result<Option<Vec<f32>>, PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.synthesize(text, sample_rate).await
        }
    }

    fn test_call() -> CallSession {
        CallSession {
            call_uuid: "call-1".to_string(),
            phone: "5551234".to_string(),
            ids: CallIds {
                call_id: "c-1".to_string(),
                caller_id: "p-1".to_string(),
            },
            sample_rate: 16000,
            encoding: AudioEncoding::Pcm16,
        }
    }

    fn controller_with(
        brain: Arc<dyn Brain>,
        tts: Arc<dyn Synthesizer>,
        transcript: &str,
        reflexes: ReflexStore,
        sink: Arc<dyn AudioSink>,
    ) -> TurnController {
        let engines = Arc::new(Engines {
            stt: Arc::new(SimulatedTranscriber::new(transcript)),
            brain,
            tts,
            reflexes: Arc::new(reflexes),
        });
        let detector = EndpointDetector::simple(DetectorConfig::default()).unwrap();
        TurnController::new(
            test_call(),
            detector,
            engines,
            Arc::new(ResourcePools::default()),
            sink,
            TurnConfig::default(),
        )
    }

    async fn wait_idle(controller: &TurnController) {
        for _ in 0..200 {
            if !controller.is_processing() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("turn never finished");
    }

    #[tokio::test(start_paused = true)]
    async fn test_spoken_turn_streams_paced_frames() {
        let sink = CollectingSink::new();
        let brain = CountingBrain::spoken("We charge a two percent fee");
        let synth = CountingSynth::new();
        let mut controller = controller_with(
            brain.clone(),
            synth.clone(),
            "what are the fees",
            ReflexStore::empty(),
            sink.clone(),
        );

        controller.on_utterance(vec![0u8; 3200]);
        assert!(controller.is_processing());
        wait_idle(&controller).await;

        assert_eq!(brain.calls.load(Ordering::SeqCst), 1);
        assert_eq!(synth.calls.load(Ordering::SeqCst), 1);

        // 27 chars * 50 ms at 16 kHz PCM16, paced in 20 ms chunks.
        let audio_bytes: usize = 27 * 800 * 2;
        let chunk_bytes = 16000 / 1000 * 20 * 2;
        assert_eq!(sink.frame_count(), audio_bytes.div_ceil(chunk_bytes));
        assert_eq!(sink.total_bytes(), audio_bytes);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_transcript_aborts_before_brain() {
        let sink = CollectingSink::new();
        let brain = CountingBrain::spoken("never spoken");
        let synth = CountingSynth::new();
        let mut controller = controller_with(
            brain.clone(),
            synth.clone(),
            "",
            ReflexStore::empty(),
            sink.clone(),
        );

        controller.on_utterance(vec![0u8; 3200]);
        wait_idle(&controller).await;

        assert_eq!(brain.calls.load(Ordering::SeqCst), 0);
        assert_eq!(synth.calls.load(Ordering::SeqCst), 0);
        assert_eq!(sink.frame_count(), 0);

        // The call stays live and takes the next utterance.
        controller.on_utterance(vec![0u8; 3200]);
        wait_idle(&controller).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_barge_in_cancels_and_frees_slot_immediately() {
        let sink = CollectingSink::new();
        let gate = Arc::new(Notify::new());
        let brain = CountingBrain::gated("late reply", gate.clone());
        let synth = CountingSynth::new();
        let mut controller = controller_with(
            brain.clone(),
            synth.clone(),
            "tell me everything",
            ReflexStore::empty(),
            sink.clone(),
        );

        controller.on_utterance(vec![0u8; 3200]);
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(brain.calls.load(Ordering::SeqCst), 1);

        // Caller interrupts while the brain is still thinking.
        controller.on_barge_in();
        assert!(!controller.is_processing(), "slot must free immediately");

        // Let the abandoned reply arrive; no later stage may run.
        gate.notify_one();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(synth.calls.load(Ordering::SeqCst), 0);
        assert_eq!(sink.frame_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_utterance_is_dropped_single_flight() {
        let sink = CollectingSink::new();
        let gate = Arc::new(Notify::new());
        let brain = CountingBrain::gated("reply", gate.clone());
        let synth = CountingSynth::new();
        let mut controller = controller_with(
            brain.clone(),
            synth.clone(),
            "first thing",
            ReflexStore::empty(),
            sink.clone(),
        );

        controller.on_utterance(vec![0u8; 3200]);
        tokio::time::sleep(Duration::from_millis(5)).await;
        controller.on_utterance(vec![0u8; 3200]);

        gate.notify_one();
        wait_idle(&controller).await;
        assert_eq!(brain.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reflex_turn_plays_canned_audio() {
        let sink = CollectingSink::new();
        let brain = CountingBrain::reflex("greeting");
        let synth = CountingSynth::new();
        let mut reflexes = ReflexStore::empty();
        let canned = vec![7u8; 6400];
        reflexes.insert("greeting", canned.clone());
        let mut controller = controller_with(
            brain.clone(),
            synth.clone(),
            "hello",
            reflexes,
            sink.clone(),
        );

        controller.on_utterance(vec![0u8; 3200]);
        wait_idle(&controller).await;

        // Canned audio bypasses synthesis entirely.
        assert_eq!(synth.calls.load(Ordering::SeqCst), 0);
        assert_eq!(sink.total_bytes(), canned.len());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_reflex_asset_aborts_quietly() {
        let sink = CollectingSink::new();
        let brain = CountingBrain::reflex("nonexistent");
        let synth = CountingSynth::new();
        let mut controller = controller_with(
            brain.clone(),
            synth.clone(),
            "hello",
            ReflexStore::empty(),
            sink.clone(),
        );

        controller.on_utterance(vec![0u8; 3200]);
        wait_idle(&controller).await;
        assert_eq!(sink.frame_count(), 0);

        // Still idle and accepting turns.
        assert!(!controller.is_processing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_active_turn() {
        let sink = CollectingSink::new();
        let gate = Arc::new(Notify::new());
        let brain = CountingBrain::gated("reply", gate.clone());
        let synth = CountingSynth::new();
        let mut controller = controller_with(
            brain.clone(),
            synth.clone(),
            "talk to me",
            ReflexStore::empty(),
            sink.clone(),
        );

        controller.on_utterance(vec![0u8; 3200]);
        tokio::time::sleep(Duration::from_millis(5)).await;
        controller.shutdown();
        assert!(!controller.is_processing());

        gate.notify_one();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(synth.calls.load(Ordering::SeqCst), 0);
    }
}
