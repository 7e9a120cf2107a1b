//! Sound playback with rodio.
//!
//! The output stream is not `Send`, so it lives on a dedicated thread that
//! plays whatever paths arrive on a channel.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::thread;

use rodio::{Decoder, OutputStream, Sink};
use tracing::{debug, info, warn};

use crate::error::AudioError;
use crate::platform::AudioPlayer;

pub struct RodioPlayer {
    tx: Sender<PathBuf>,
}

impl RodioPlayer {
    /// Opens the default output device on a background thread.
    pub fn spawn() -> Result<Self, AudioError> {
        let (tx, rx) = mpsc::channel::<PathBuf>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();

        thread::Builder::new()
            .name("audio".to_string())
            .spawn(move || {
                let (_stream, handle) = match OutputStream::try_default() {
                    Ok(pair) => pair,
                    Err(e) => {
                        let _ = ready_tx.send(Err(format!("Failed to create audio output stream: {}", e)));
                        return;
                    }
                };
                let sink = match Sink::try_new(&handle) {
                    Ok(sink) => sink,
                    Err(e) => {
                        let _ = ready_tx.send(Err(format!("Failed to create audio sink: {}", e)));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                while let Ok(path) = rx.recv() {
                    let file = match File::open(&path) {
                        Ok(file) => file,
                        Err(e) => {
                            warn!("Failed to open sound {}: {}", path.display(), e);
                            continue;
                        }
                    };
                    match Decoder::new(BufReader::new(file)) {
                        Ok(source) => {
                            debug!("Playing {}", path.display());
                            sink.append(source);
                        }
                        Err(e) => warn!("Failed to decode sound {}: {}", path.display(), e),
                    }
                }
            })
            .map_err(|e| AudioError::Device(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!("Audio output ready");
                Ok(Self { tx })
            }
            Ok(Err(e)) => Err(AudioError::Device(e)),
            Err(_) => Err(AudioError::Device("audio thread exited".to_string())),
        }
    }
}

impl AudioPlayer for RodioPlayer {
    fn play(&self, path: &Path) -> Result<(), AudioError> {
        // Check here so a missing file reaches the caller; decoding happens
        // on the audio thread.
        File::open(path).map_err(|e| AudioError::Open(path.to_path_buf(), e))?;
        self.tx
            .send(path.to_path_buf())
            .map_err(|_| AudioError::Device("audio thread exited".to_string()))
    }
}
