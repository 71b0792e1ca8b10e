//! Playback device abstraction
//!
//! The scheduler drives a single playback device through this trait:
//! load/play/pause/seek/position plus an awaitable end-of-media signal.
//! The production implementation wraps a `rodio` sink; tests substitute a
//! scripted device.

use crate::error::{Error, Result};
use async_trait::async_trait;
use rodio::cpal::traits::{DeviceTrait, HostTrait};
use rodio::{Decoder, OutputStreamBuilder, Sink, Source};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// A single playback device.
///
/// `load` leaves the media paused; `play` starts it. `wait_end` resolves when
/// the loaded media has played to completion (it does not resolve for pause).
#[async_trait]
pub trait PlaybackDevice: Send + Sync {
    /// Load media from a file, optionally starting part-way in.
    fn load(&self, path: &Path, start: Option<Duration>) -> Result<()>;

    fn play(&self);

    fn pause(&self);

    fn is_playing(&self) -> bool;

    /// Playback position within the loaded media, `None` when nothing is
    /// loaded.
    fn position(&self) -> Option<Duration>;

    fn seek(&self, position: Duration) -> Result<()>;

    /// Drop the loaded media and stop output.
    fn clear(&self);

    /// Wait until the loaded media reaches its end.
    async fn wait_end(&self);
}

/// Production device backed by a `rodio` sink.
///
/// The audio output stream is not `Send`, so a dedicated thread opens it and
/// parks for the lifetime of the process; only the (thread-safe) sink handle
/// leaves that thread.
pub struct RodioDevice {
    sink: Sink,
}

impl RodioDevice {
    /// Open the output stream, preferring a device whose name contains
    /// `preferred` when given, falling back to the default device.
    pub fn new(preferred: Option<&str>) -> Result<Self> {
        let preferred = preferred.map(str::to_owned);
        let (tx, rx) = std::sync::mpsc::channel();

        std::thread::Builder::new()
            .name("audio-output".into())
            .spawn(move || {
                let stream = match open_stream(preferred.as_deref()) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        return;
                    }
                };
                let sink = Sink::connect_new(stream.mixer());
                let _ = tx.send(Ok(sink));
                // The stream must stay alive for playback to continue.
                loop {
                    std::thread::park();
                }
            })
            .map_err(|e| Error::Device(format!("failed to spawn audio thread: {}", e)))?;

        let sink = rx
            .recv()
            .map_err(|_| Error::Device("audio thread exited before handshake".into()))??;
        Ok(RodioDevice { sink })
    }
}

fn open_stream(preferred: Option<&str>) -> Result<rodio::OutputStream> {
    if let Some(name) = preferred {
        match find_device(name) {
            Some(device) => {
                info!("Using audio output device matching \"{}\"", name);
                return OutputStreamBuilder::from_device(device)
                    .and_then(|b| b.open_stream_or_fallback())
                    .map_err(|e| Error::Device(e.to_string()));
            }
            None => warn!("No audio output device matching \"{}\", using default", name),
        }
    }
    OutputStreamBuilder::from_default_device()
        .and_then(|b| b.open_stream_or_fallback())
        .map_err(|e| Error::Device(e.to_string()))
}

fn find_device(name: &str) -> Option<rodio::cpal::Device> {
    let host = rodio::cpal::default_host();
    let devices = host.output_devices().ok()?;
    for device in devices {
        if let Ok(device_name) = device.name() {
            if device_name.contains(name) {
                return Some(device);
            }
        }
    }
    None
}

#[async_trait]
impl PlaybackDevice for RodioDevice {
    fn load(&self, path: &Path, start: Option<Duration>) -> Result<()> {
        let file = File::open(path)?;
        let mut source = Decoder::new(BufReader::new(file))
            .map_err(|e| Error::Device(format!("decode {}: {}", path.display(), e)))?;
        if let Some(start) = start {
            if let Err(e) = source.try_seek(start) {
                warn!("Start offset seek failed, playing from the top: {}", e);
            }
        }
        self.sink.clear();
        self.sink.append(source);
        Ok(())
    }

    fn play(&self) {
        self.sink.play();
    }

    fn pause(&self) {
        self.sink.pause();
    }

    fn is_playing(&self) -> bool {
        !self.sink.is_paused() && !self.sink.empty()
    }

    fn position(&self) -> Option<Duration> {
        if self.sink.empty() {
            None
        } else {
            Some(self.sink.get_pos())
        }
    }

    fn seek(&self, position: Duration) -> Result<()> {
        self.sink
            .try_seek(position)
            .map_err(|e| Error::Device(format!("seek: {}", e)))
    }

    fn clear(&self) {
        self.sink.clear();
    }

    async fn wait_end(&self) {
        // rodio has no async completion callback; poll the sink.
        loop {
            if self.sink.empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    }
}
