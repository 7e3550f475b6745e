//! Streaming response support.
//!
//! The payment handshake is identical to the buffered path; only the
//! body differs, exposed as a lazy stream of UTF-8 chunks. Chunk and
//! end-of-stream events are emitted as the consumer polls.

use std::pin::Pin;
use std::task::{Context, Poll};

use alloy_primitives::B256;
use futures_util::stream::BoxStream;
use futures_util::{Stream, StreamExt};

use x402::events::{EventBus, EventKind, PaymentEvent};
use x402::TokenAmount;

use crate::error::ClientError;

use super::Exchange;

/// A paid response whose body is consumed incrementally.
pub struct StreamingResponse {
    /// Final HTTP status.
    pub status: u16,
    /// Whether a payment was made for this response.
    pub paid: bool,
    /// The amount paid, from the receipt or the signed value.
    pub amount_paid: Option<TokenAmount>,
    /// The settlement transaction hash, when the server settled.
    pub tx_hash: Option<B256>,
    inner: BoxStream<'static, Result<bytes::Bytes, reqwest::Error>>,
    events: EventBus,
    ended: bool,
}

impl std::fmt::Debug for StreamingResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("status", &self.status)
            .field("paid", &self.paid)
            .field("amount_paid", &self.amount_paid)
            .finish_non_exhaustive()
    }
}

impl StreamingResponse {
    pub(super) fn new(exchange: Exchange, events: EventBus) -> Self {
        Self {
            status: exchange.response.status().as_u16(),
            paid: exchange.paid,
            amount_paid: exchange.amount_paid,
            tx_hash: exchange.tx_hash,
            inner: exchange.response.bytes_stream().boxed(),
            events,
            ended: false,
        }
    }
}

impl Stream for StreamingResponse {
    type Item = Result<String, ClientError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match this.inner.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(bytes))) => {
                let chunk = String::from_utf8_lossy(&bytes).into_owned();
                this.events.emit(PaymentEvent::now(EventKind::StreamChunk));
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                // Bytes already delivered stay delivered; the failure is
                // reported without rolling back payment.
                Poll::Ready(Some(Err(ClientError::Stream(e.to_string()))))
            }
            Poll::Ready(None) => {
                if !this.ended {
                    this.ended = true;
                    this.events.emit(PaymentEvent::now(EventKind::StreamEnded));
                }
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
