use std::fmt;

use crossbeam_channel::Sender;

use crate::{
    backend::{Backend, BackendEvent, BackendMessage, Reporter, Session},
    error::Error,
    metadata::Metadata,
    player::PlayerEvent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Stopped,
    Connecting,
    Buffering,
    Playing,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stopped => "stopped",
            Self::Connecting => "connecting",
            Self::Buffering => "buffering",
            Self::Playing => "playing",
        })
    }
}

/// Outcomes of a backend message that the player has to act upon.
#[derive(Debug)]
pub enum EngineEvent {
    Failed(Error),
    EndOfStream,
}

/// Wraps the backend into a four-state machine.  State and metadata changes
/// are announced on the player channel as they happen.
pub struct Engine {
    backend: Box<dyn Backend>,
    sender: Sender<PlayerEvent>,
    state: EngineState,
    session: Session,
    uri: Option<String>,
    metadata: Option<Metadata>,
    volume: f64,
    mute: bool,
}

impl Engine {
    pub fn new(backend: Box<dyn Backend>, sender: Sender<PlayerEvent>) -> Self {
        Self {
            backend,
            sender,
            state: EngineState::Stopped,
            session: 0,
            uri: None,
            metadata: None,
            volume: 1.0,
            mute: false,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn mute(&self) -> bool {
        self.mute
    }

    pub fn play(&mut self, uri: &str) {
        if self.state != EngineState::Stopped {
            self.backend.stop();
        }
        self.session += 1;
        self.uri = Some(uri.to_owned());
        self.clear_metadata();
        self.set_state(EngineState::Connecting);
        log::info!("playing {} (session {})", uri, self.session);
        self.backend.set_volume(self.effective_volume());
        self.backend
            .play(uri, Reporter::new(self.session, self.sender.clone()));
    }

    pub fn stop(&mut self) {
        if self.state != EngineState::Stopped {
            log::info!("stopping");
            self.backend.stop();
        }
        // Invalidate anything the backend still has in flight.
        self.session += 1;
        self.clear_metadata();
        self.set_state(EngineState::Stopped);
    }

    /// Set the volume, clamped to 0.0..=1.0.  Returns true if it changed.
    pub fn set_volume(&mut self, volume: f64) -> bool {
        let volume = if volume.is_nan() {
            0.0
        } else {
            volume.clamp(0.0, 1.0)
        };
        if volume == self.volume {
            return false;
        }
        self.volume = volume;
        self.backend.set_volume(self.effective_volume());
        true
    }

    /// Returns true if the mute flag changed.
    pub fn set_mute(&mut self, mute: bool) -> bool {
        if mute == self.mute {
            return false;
        }
        self.mute = mute;
        self.backend.set_volume(self.effective_volume());
        true
    }

    pub fn handle_backend(&mut self, event: BackendEvent) -> Option<EngineEvent> {
        if event.session != self.session {
            log::trace!(
                "ignoring stale backend message from session {}",
                event.session
            );
            return None;
        }
        if self.state == EngineState::Stopped {
            return None;
        }
        match event.message {
            BackendMessage::Buffering(percent) if percent < 100 => {
                log::debug!("buffering: {}%", percent);
                self.set_state(EngineState::Buffering);
                None
            }
            BackendMessage::Buffering(_) | BackendMessage::Started => {
                self.set_state(EngineState::Playing);
                None
            }
            BackendMessage::Tags(metadata) => {
                if self.metadata.as_ref() != Some(&metadata) {
                    log::info!("now playing: {}", metadata);
                    self.metadata = Some(metadata.clone());
                    self.notify(PlayerEvent::MetadataChanged {
                        metadata: Some(metadata),
                    });
                }
                None
            }
            BackendMessage::Error(err) => {
                log::error!("playback failed: {}", err);
                self.backend.stop();
                self.session += 1;
                self.set_state(EngineState::Stopped);
                Some(EngineEvent::Failed(err))
            }
            BackendMessage::EndOfStream => {
                log::info!("end of stream");
                self.backend.stop();
                self.session += 1;
                self.set_state(EngineState::Stopped);
                Some(EngineEvent::EndOfStream)
            }
        }
    }

    fn effective_volume(&self) -> f32 {
        if self.mute {
            0.0
        } else {
            self.volume as f32
        }
    }

    fn clear_metadata(&mut self) {
        if self.metadata.take().is_some() {
            self.notify(PlayerEvent::MetadataChanged { metadata: None });
        }
    }

    fn set_state(&mut self, state: EngineState) {
        if self.state == state {
            return;
        }
        log::debug!("engine state: {} -> {}", self.state, state);
        self.state = state;
        self.notify(PlayerEvent::StateChanged { state });
    }

    fn notify(&self, event: PlayerEvent) {
        if self.sender.send(event).is_err() {
            log::warn!("player channel closed, dropping notification");
        }
    }
}
