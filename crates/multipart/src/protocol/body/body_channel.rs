use crate::protocol::{MultipartError, ParseError, PayloadItem, Token};
use bytes::Bytes;
use futures::{Sink, SinkExt, Stream, StreamExt, channel::mpsc};
use http::HeaderMap;
use http_body::{Body, Frame, SizeHint};
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::{debug, error};

pub(crate) fn create_body_sender_receiver<S>(token_stream: &mut S) -> (BodySender<'_, S>, PartBody)
where
    S: Stream<Item = Result<Token, ParseError>> + Unpin,
{
    let (signal_sender, signal_receiver) = mpsc::channel(8);
    let (data_sender, data_receiver) = mpsc::channel(8);

    (BodySender::new(token_stream, signal_receiver, data_sender), PartBody::new(signal_sender, data_receiver))
}

#[derive(Debug)]
pub(crate) enum BodyRequestSignal {
    RequestData,
    Enough,
}

/// Feeds one streaming part's body from the token stream.
///
/// The body ends at the next `Headers` token, which is kept for the caller,
/// or at the end of the token stream.
pub(crate) struct BodySender<'a, S> {
    token_stream: &'a mut S,
    signal_receiver: mpsc::Receiver<BodyRequestSignal>,
    data_sender: mpsc::Sender<Result<PayloadItem, MultipartError>>,
    next_headers: Option<HeaderMap>,
    eof: bool,
}

impl<'a, S> BodySender<'a, S>
where
    S: Stream<Item = Result<Token, ParseError>> + Unpin,
{
    pub fn new(
        token_stream: &'a mut S,
        signal_receiver: mpsc::Receiver<BodyRequestSignal>,
        data_sender: mpsc::Sender<Result<PayloadItem, MultipartError>>,
    ) -> Self {
        Self { token_stream, signal_receiver, data_sender, next_headers: None, eof: false }
    }

    /// Serves body requests until the body is read, dropped or no longer wanted,
    /// then skips whatever is left of it.
    pub(crate) async fn start(&mut self) -> Result<(), MultipartError> {
        if self.eof {
            return Ok(());
        }

        while let Some(signal) = self.signal_receiver.next().await {
            match signal {
                BodyRequestSignal::RequestData => match self.read_data().await {
                    Ok(payload_item) => {
                        self.eof = payload_item.is_eof();
                        if let Err(e) = self.data_sender.send(Ok(payload_item)).await {
                            debug!("part body receiver is gone, {}", e);
                            break;
                        }

                        if self.eof {
                            return Ok(());
                        }
                    }

                    Err(e) => {
                        error!("failed to read part body from token stream, {}", e);
                        let _ = self.data_sender.send(Err(MultipartError::aborted(&e))).await;
                        return Err(e);
                    }
                },

                BodyRequestSignal::Enough => {
                    break;
                }
            }
        }

        self.skip_data().await
    }

    pub(crate) async fn read_data(&mut self) -> Result<PayloadItem, MultipartError> {
        match self.token_stream.next().await {
            Some(Ok(Token::Body(bytes))) => Ok(PayloadItem::Chunk(bytes)),
            Some(Ok(Token::Headers(headers))) => {
                self.next_headers = Some(headers);
                Ok(PayloadItem::Eof)
            }
            Some(Err(e)) => Err(e.into()),
            None => Ok(PayloadItem::Eof),
        }
    }

    pub(crate) async fn skip_data(&mut self) -> Result<(), MultipartError> {
        if self.eof {
            return Ok(());
        }

        loop {
            match self.read_data().await {
                Ok(payload_item) if payload_item.is_eof() => {
                    self.eof = true;
                    return Ok(());
                }
                Ok(_payload_item) => {
                    // drop payload_item
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// The headers of the part that follows, if the body ended at one
    pub(crate) fn into_next_headers(self) -> Option<HeaderMap> {
        self.next_headers
    }
}

/// The live body of a streaming part.
///
/// Each poll asks the part generator for exactly one more chunk, so the
/// upstream source is only read as fast as this body is consumed. Dropping
/// the body tells the generator to skip the rest of the part.
#[derive(Debug)]
pub struct PartBody {
    signal_sender: mpsc::Sender<BodyRequestSignal>,
    data_receiver: mpsc::Receiver<Result<PayloadItem, MultipartError>>,
    in_flight: bool,
    finished: bool,
}

impl PartBody {
    pub(crate) fn new(
        signal_sender: mpsc::Sender<BodyRequestSignal>,
        data_receiver: mpsc::Receiver<Result<PayloadItem, MultipartError>>,
    ) -> Self {
        Self { signal_sender, data_receiver, in_flight: false, finished: false }
    }

    /// A handle that can cancel this body from outside
    pub(crate) fn signal_sender(&self) -> mpsc::Sender<BodyRequestSignal> {
        self.signal_sender.clone()
    }
}

impl Drop for PartBody {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.signal_sender.try_send(BodyRequestSignal::Enough);
        }
    }
}

impl Body for PartBody {
    type Data = Bytes;
    type Error = MultipartError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();

        if this.finished {
            return Poll::Ready(None);
        }

        if !this.in_flight {
            match Pin::new(&mut this.signal_sender).poll_ready(cx) {
                Poll::Ready(Ok(())) => {
                    if let Err(e) = Pin::new(&mut this.signal_sender).start_send(BodyRequestSignal::RequestData) {
                        error!("failed to send request_more through channel, {}", e);
                        this.finished = true;
                        return Poll::Ready(Some(Err(MultipartError::aborted("part body is no longer readable"))));
                    }
                    this.in_flight = true;
                }
                Poll::Ready(Err(e)) => {
                    error!("failed to prepare request_more through channel, {}", e);
                    this.finished = true;
                    return Poll::Ready(Some(Err(MultipartError::aborted("part body is no longer readable"))));
                }
                Poll::Pending => return Poll::Pending,
            }
        }

        match this.data_receiver.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(PayloadItem::Chunk(bytes)))) => {
                this.in_flight = false;
                Poll::Ready(Some(Ok(Frame::data(bytes))))
            }
            Poll::Ready(Some(Ok(PayloadItem::Eof))) => {
                this.in_flight = false;
                this.finished = true;
                Poll::Ready(None)
            }
            Poll::Ready(Some(Err(e))) => {
                this.in_flight = false;
                this.finished = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.in_flight = false;
                this.finished = true;
                Poll::Ready(Some(Err(MultipartError::aborted("part body was skipped before it was fully read"))))
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.finished
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::new()
    }
}
