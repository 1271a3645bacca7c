pub mod stream;

use crossbeam_channel::Sender;

use crate::{error::Error, metadata::Metadata, player::PlayerEvent};

/// Identifies one playback attempt.  Every `Engine::play` starts a new session,
/// and messages still in flight from an older one are recognized as stale.
pub type Session = u64;

#[derive(Debug)]
pub enum BackendMessage {
    /// Pre-buffering progress, in percent.  100 means playback can proceed.
    Buffering(u8),
    /// Audio is flowing to the output.
    Started,
    /// New stream tags.
    Tags(Metadata),
    /// Playback failed and the backend has given up on this session.
    Error(Error),
    /// The server closed the stream.
    EndOfStream,
}

#[derive(Debug)]
pub struct BackendEvent {
    pub session: Session,
    pub message: BackendMessage,
}

/// Handed to the backend on every `play`, used to report back to the player
/// loop from whatever thread the backend runs on.
#[derive(Clone)]
pub struct Reporter {
    session: Session,
    sender: Sender<PlayerEvent>,
}

impl Reporter {
    pub fn new(session: Session, sender: Sender<PlayerEvent>) -> Self {
        Self { session, sender }
    }

    pub fn session(&self) -> Session {
        self.session
    }

    /// Returns false once the player loop is gone.
    pub fn report(&self, message: BackendMessage) -> bool {
        self.sender
            .send(PlayerEvent::Backend(BackendEvent {
                session: self.session,
                message,
            }))
            .is_ok()
    }
}

/// The audio collaborator of the engine.  Implementations start playing `uri`
/// asynchronously and report progress through the `Reporter`.
pub trait Backend: Send {
    fn play(&mut self, uri: &str, reporter: Reporter);
    fn stop(&mut self);
    /// Set the output volume, in the 0.0..=1.0 range.
    fn set_volume(&mut self, volume: f32);
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        Play(String),
        Stop,
        SetVolume(f32),
    }

    /// Backend that does nothing but remember how it was driven.
    #[derive(Clone, Default)]
    pub struct RecordingBackend {
        pub calls: Arc<Mutex<Vec<Call>>>,
        pub reporter: Arc<Mutex<Option<Reporter>>>,
    }

    impl RecordingBackend {
        pub fn take_calls(&self) -> Vec<Call> {
            std::mem::take(&mut *self.calls.lock())
        }

        pub fn last_reporter(&self) -> Reporter {
            self.reporter.lock().clone().expect("backend was never played")
        }
    }

    impl Backend for RecordingBackend {
        fn play(&mut self, uri: &str, reporter: Reporter) {
            self.calls.lock().push(Call::Play(uri.to_owned()));
            *self.reporter.lock() = Some(reporter);
        }

        fn stop(&mut self) {
            self.calls.lock().push(Call::Stop);
        }

        fn set_volume(&mut self, volume: f32) {
            self.calls.lock().push(Call::SetVolume(volume));
        }
    }
}
