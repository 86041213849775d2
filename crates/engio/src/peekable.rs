use tokio::sync::mpsc::{error::TryRecvError, Receiver};

/// Peekable receiver for the polling transport.
///
/// A thin wrapper around an mpsc [`Receiver`] that can look at the next item
/// without consuming it. The polling encoder uses it to check whether the
/// next packet still fits under `max_payload` before taking it off the queue,
/// so packets that do not fit stay queued for the next poll.
#[derive(Debug)]
pub struct PeekableReceiver<T> {
    rx: Receiver<T>,
    next: Option<T>,
}

impl<T> PeekableReceiver<T> {
    pub fn new(rx: Receiver<T>) -> Self {
        Self { rx, next: None }
    }

    pub fn peek(&mut self) -> Option<&T> {
        if self.next.is_none() {
            self.next = self.rx.try_recv().ok();
        }
        self.next.as_ref()
    }

    pub async fn recv(&mut self) -> Option<T> {
        if self.next.is_none() {
            self.rx.recv().await
        } else {
            self.next.take()
        }
    }

    pub fn try_recv(&mut self) -> Result<T, TryRecvError> {
        match self.next.take() {
            Some(next) => Ok(next),
            None => self.rx.try_recv(),
        }
    }

    pub fn close(&mut self) {
        self.rx.close()
    }
}
