use async_channel::Receiver;
use tracing::trace;

/// Drains the copy workers' output channel. Completes only after every
/// worker has exited and dropped its sender, which is what makes
/// `Pipeline::run` wait for all in-flight copies.
#[derive(Debug)]
pub struct Terminator<T> {
    receiver: Receiver<T>,
}

impl<T> Terminator<T> {
    pub fn new(receiver: Receiver<T>) -> Self {
        Self { receiver }
    }

    pub async fn terminate(&self) {
        trace!("drain of copied objects has started.");

        while self.receiver.recv().await.is_ok() {}

        trace!("drain of copied objects has been completed.");
    }
}
