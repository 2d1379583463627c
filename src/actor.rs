//! Unbounded channels between the reactor and whatever drives it. Every
//! message carries the span it was sent from, so handling it logs under the
//! sender's context.

use tokio::sync::mpsc::error::SendError;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::Span;

pub mod reactor;

pub struct Sender<T>(UnboundedSender<(Span, T)>);
pub type Receiver<T> = UnboundedReceiver<(Span, T)>;

pub fn channel<T>() -> (Sender<T>, Receiver<T>) {
    let (tx, rx) = unbounded_channel();
    (Sender(tx), rx)
}

impl<T> Sender<T> {
    pub fn send(&self, msg: T) {
        // Most of the time we can ignore send errors, they just indicate the
        // reactor is shutting down.
        _ = self.try_send(msg)
    }

    pub fn try_send(&self, msg: T) -> Result<(), SendError<(Span, T)>> {
        self.0.send((Span::current(), msg))
    }
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> std::fmt::Debug for Sender<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("actor::Sender(...)")
    }
}
