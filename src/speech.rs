//! Speech synthesis playback control: a three-state machine per message
//! (idle -> loading -> playing -> idle) over an injected audio sink, with at
//! most one live playback per controller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use base64::Engine as _;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::{MedimindError, Result};
use crate::gateway::GeminiGateway;
use crate::models::Voice;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeechState {
    Idle,
    Loading,
    Playing,
}

/// Decoded PCM audio, mono 16-bit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Decodes the base64 PCM payload returned by the TTS model. A trailing odd
/// byte is ignored.
pub fn decode_clip(base64_audio: &str, sample_rate: u32) -> Result<AudioClip> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(base64_audio)
        .map_err(|e| {
            MedimindError::SchemaMismatch(format!("audio payload was not valid base64: {e}"))
        })?;
    let samples = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    Ok(AudioClip {
        samples,
        sample_rate,
    })
}

/// Wraps a clip as a RIFF/WAV byte vector (16-bit mono PCM) for HTTP delivery.
pub fn wav_bytes(clip: &AudioClip) -> Vec<u8> {
    let data_len = (clip.samples.len() * 2) as u32;
    let byte_rate = clip.sample_rate * 2;
    let mut out = Vec::with_capacity(44 + data_len as usize);

    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&1u16.to_le_bytes()); // mono
    out.extend_from_slice(&clip.sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes()); // block align
    out.extend_from_slice(&16u16.to_le_bytes()); // bits per sample
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for sample in &clip.samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
    out
}

/// Plays one clip to completion. The future is dropped when playback is
/// stopped or replaced, which must release any held resources.
#[async_trait]
pub trait AudioSink: Send + Sync + 'static {
    async fn play(&self, clip: AudioClip) -> Result<()>;
}

/// Default sink: paces "playback" at the clip's real-time duration. Stands in
/// for an output device on headless deployments.
pub struct RealtimeSink;

#[async_trait]
impl AudioSink for RealtimeSink {
    async fn play(&self, clip: AudioClip) -> Result<()> {
        tokio::time::sleep(std::time::Duration::from_secs_f64(clip.duration_secs())).await;
        Ok(())
    }
}

struct Playback {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
    generation: u64,
}

struct ControllerInner {
    state: SpeechState,
    current: Option<Playback>,
}

pub struct SpeechController {
    gateway: Arc<GeminiGateway>,
    sink: Arc<dyn AudioSink>,
    sample_rate: u32,
    inner: Arc<Mutex<ControllerInner>>,
    generation: AtomicU64,
}

impl SpeechController {
    pub fn new(gateway: Arc<GeminiGateway>, sink: Arc<dyn AudioSink>, sample_rate: u32) -> Self {
        Self {
            gateway,
            sink,
            sample_rate,
            inner: Arc::new(Mutex::new(ControllerInner {
                state: SpeechState::Idle,
                current: None,
            })),
            generation: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> SpeechState {
        lock(&self.inner).state
    }

    /// Idle: synthesize and start playback. Loading: no-op. Playing: stop.
    /// Synthesis or decode failure resolves back to idle.
    pub async fn toggle(&self, text: &str, voice: Voice) -> SpeechState {
        {
            let mut inner = lock(&self.inner);
            match inner.state {
                SpeechState::Loading => return SpeechState::Loading,
                SpeechState::Playing => {
                    stop_locked(&mut inner);
                    return SpeechState::Idle;
                }
                SpeechState::Idle => {
                    inner.state = SpeechState::Loading;
                }
            }
        }

        let audio = match self.gateway.generate_speech(text, voice).await {
            Ok(audio) => audio,
            Err(e) => {
                tracing::warn!("Failed to generate speech audio: {e}");
                lock(&self.inner).state = SpeechState::Idle;
                return SpeechState::Idle;
            }
        };

        let clip = match decode_clip(&audio, self.sample_rate) {
            Ok(clip) => clip,
            Err(e) => {
                tracing::warn!("Failed to decode speech audio: {e}");
                lock(&self.inner).state = SpeechState::Idle;
                return SpeechState::Idle;
            }
        };

        self.start_playback(clip);
        SpeechState::Playing
    }

    /// Stops any live playback and returns to idle.
    pub fn stop(&self) {
        stop_locked(&mut lock(&self.inner));
    }

    fn start_playback(&self, clip: AudioClip) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (stop_tx, stop_rx) = oneshot::channel();
        let sink = self.sink.clone();
        let shared = self.inner.clone();

        let task = tokio::spawn(async move {
            tokio::select! {
                result = sink.play(clip) => {
                    if let Err(e) = result {
                        tracing::warn!("Audio playback failed: {e}");
                    }
                }
                _ = stop_rx => {}
            }
            let mut inner = lock(&shared);
            // A newer playback owns the state now; leave it alone.
            if inner.current.as_ref().is_some_and(|p| p.generation == generation) {
                inner.state = SpeechState::Idle;
                inner.current = None;
            }
        });

        let mut inner = lock(&self.inner);
        // If a prior buffer is somehow still live, stop it first.
        stop_locked(&mut inner);
        inner.current = Some(Playback {
            stop: Some(stop_tx),
            task,
            generation,
        });
        inner.state = SpeechState::Playing;
    }
}

impl Drop for SpeechController {
    fn drop(&mut self) {
        stop_locked(&mut lock(&self.inner));
    }
}

fn lock(inner: &Arc<Mutex<ControllerInner>>) -> MutexGuard<'_, ControllerInner> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn stop_locked(inner: &mut ControllerInner) {
    if let Some(mut playback) = inner.current.take() {
        if let Some(stop) = playback.stop.take() {
            let _ = stop.send(());
        }
        playback.task.abort();
    }
    inner.state = SpeechState::Idle;
}
