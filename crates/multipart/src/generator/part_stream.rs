use std::pin::Pin;
use std::task::{Context, Poll, ready};

use futures::channel::mpsc;
use futures::{Stream, StreamExt};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::protocol::body::BodyRequestSignal;
use crate::protocol::{MultipartError, Part};

/// The parts of a multipart body, in input order.
///
/// Yields `Err` at most once, as the last item. Dropping the stream stops the
/// part generator; parts already handed out stay usable unless they are
/// still streaming their body.
#[derive(Debug)]
pub struct PartStream {
    receiver: mpsc::Receiver<Result<Part, MultipartError>>,
    driver: JoinHandle<()>,
    /// cancels the body of the last streaming part when the next part is requested
    live_body: Option<mpsc::Sender<BodyRequestSignal>>,
}

impl PartStream {
    pub(crate) fn new(receiver: mpsc::Receiver<Result<Part, MultipartError>>, driver: JoinHandle<()>) -> Self {
        Self { receiver, driver, live_body: None }
    }
}

impl Stream for PartStream {
    type Item = Result<Part, MultipartError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if let Some(mut signal) = this.live_body.take()
            && signal.try_send(BodyRequestSignal::Enough).is_ok()
        {
            trace!("skipping the rest of the previous part body");
        }

        let item = ready!(this.receiver.poll_next_unpin(cx));
        if let Some(Ok(part)) = &item {
            this.live_body = part.body_signal();
        }
        Poll::Ready(item)
    }
}

impl Drop for PartStream {
    fn drop(&mut self) {
        // parts still queued were never delivered, so nobody else can remove their files
        self.receiver.close();
        while let Ok(Some(item)) = self.receiver.try_next() {
            if let Ok(mut part) = item
                && let Some(path) = part.take_file()
            {
                match std::fs::remove_file(&path) {
                    Ok(()) => debug!(path = %path.display(), "removed undelivered part file"),
                    Err(e) => warn!(path = %path.display(), "failed to remove undelivered part file, {}", e),
                }
            }
        }
        self.driver.abort();
    }
}
