use std::{
    fmt::Display,
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, SendError, Sender};

/// What the actor loop should do after handling a message.
pub enum Act<T: Actor> {
    Continue,
    /// Wait for the next message, but at most `timeout`.  If nothing arrives in
    /// time, `timeout_msg` is handled instead.  Every message received while
    /// waiting restarts the wait from the beginning.
    WaitOr {
        timeout: Duration,
        timeout_msg: T::Message,
    },
    Shutdown,
}

pub trait Actor: Sized {
    type Message: Send + 'static;
    type Error: Display;

    fn handle(&mut self, msg: Self::Message) -> Result<Act<Self>, Self::Error>;

    /// Called once the loop ends, either by `Act::Shutdown`, an error, or all
    /// senders being dropped.
    fn finish(&mut self) {}

    fn process(mut self, recv: Receiver<Self::Message>) {
        let mut act = Act::Continue;
        loop {
            let msg = match act {
                Act::Continue => match recv.recv() {
                    Ok(msg) => msg,
                    Err(_) => {
                        break;
                    }
                },
                Act::WaitOr {
                    timeout,
                    timeout_msg,
                } => match recv.recv_timeout(timeout) {
                    Ok(msg) => msg,
                    Err(RecvTimeoutError::Timeout) => timeout_msg,
                    Err(RecvTimeoutError::Disconnected) => {
                        // Deliver the pending message before going away.
                        if let Err(err) = self.handle(timeout_msg) {
                            log::error!("error: {}", err);
                        }
                        break;
                    }
                },
                Act::Shutdown => {
                    break;
                }
            };
            act = match self.handle(msg) {
                Ok(act) => act,
                Err(err) => {
                    log::error!("error: {}", err);
                    break;
                }
            };
        }
        self.finish();
    }

    fn spawn<F>(cap: Capacity, name: &str, factory: F) -> ActorHandle<Self::Message>
    where
        F: FnOnce(Sender<Self::Message>) -> Self + Send + 'static,
    {
        let (send, recv) = cap.to_channel();
        let thread = thread::Builder::new()
            .name(name.to_string())
            .spawn({
                let send = send.clone();
                move || {
                    factory(send).process(recv);
                }
            })
            .expect("failed to spawn actor thread");
        ActorHandle {
            sender: send,
            thread,
        }
    }

    fn spawn_default<F>(name: &str, factory: F) -> ActorHandle<Self::Message>
    where
        F: FnOnce(Sender<Self::Message>) -> Self + Send + 'static,
    {
        Self::spawn(Capacity::Bounded(128), name, factory)
    }
}

pub struct ActorHandle<M> {
    thread: JoinHandle<()>,
    sender: Sender<M>,
}

impl<M> ActorHandle<M> {
    pub fn sender(&self) -> Sender<M> {
        self.sender.clone()
    }

    pub fn send(&self, msg: M) -> Result<(), SendError<M>> {
        self.sender.send(msg)
    }

    /// Drop our sender and wait for the actor thread to finish.
    pub fn join(self) {
        let Self { thread, sender } = self;
        drop(sender);
        let _ = thread.join();
    }
}

pub enum Capacity {
    Bounded(usize),
    Unbounded,
}

impl Capacity {
    pub fn to_channel<T>(&self) -> (Sender<T>, Receiver<T>) {
        match self {
            Capacity::Bounded(cap) => bounded(*cap),
            Capacity::Unbounded => unbounded(),
        }
    }
}
