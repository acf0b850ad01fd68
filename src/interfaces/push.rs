//! Push channel: a WebSocket per payment session that reports snapshots as
//! soon as the gateway sees them, instead of waiting for the next poll.

use crate::domain::payment::{Payment, PaymentToken, is_payment};
use crate::domain::ports::DiagnosticSinkRef;
use futures_util::StreamExt;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::{self, Message};

const NAMESPACE: &str = "websocket";

/// How long a requested close waits for the peer's close frame.
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// `{base_url}?token={token}`; the token is the only credential.
pub fn push_url(base_url: &str, token: &PaymentToken) -> String {
    format!("{base_url}?token={token}")
}

#[derive(Error, Debug)]
pub enum PushError {
    #[error("websocket transport failure: {0}")]
    Transport(#[from] tungstenite::Error),
    #[error("could not deserialize message payload: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug)]
pub enum PushSignal {
    Open,
    Close,
    Error(PushError),
    PaymentUpdated(Payment),
    PaymentVerified(Payment),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// Valid JSON, but not shaped like a payment.
    Ignored,
    Updated(Payment),
    Verified(Payment),
}

/// Decodes one inbound frame.
///
/// Anything that parses but fails the structural payment check is ignored.
/// A frame that passes the check but still cannot be read as a payment (an
/// unknown currency, a malformed amount) is reported as an error.
pub fn decode_frame(frame: &[u8]) -> Result<FrameOutcome, serde_json::Error> {
    let payload: Value = serde_json::from_slice(frame)?;
    if !is_payment(&payload) {
        return Ok(FrameOutcome::Ignored);
    }

    let payment: Payment = serde_json::from_value(payload)?;
    Ok(if payment.is_verified() {
        FrameOutcome::Verified(payment)
    } else {
        FrameOutcome::Updated(payment)
    })
}

/// Owns one push connection. Not meant to be shared between sessions.
///
/// Signals are delivered on the receiver returned by [`connect`](Self::connect);
/// [`PushSignal::Close`] is always the last one.
pub struct PushListener {
    shutdown: watch::Sender<bool>,
}

impl PushListener {
    /// Starts connecting in the background and returns immediately.
    /// A failed connection attempt is reported as `Error` followed by `Close`.
    pub fn connect(
        url: impl Into<String>,
        diagnostics: DiagnosticSinkRef,
    ) -> (Self, mpsc::UnboundedReceiver<PushSignal>) {
        let (signals_tx, signals_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let connection = Connection {
            url: url.into(),
            signals: signals_tx,
            shutdown: shutdown_rx,
            diagnostics,
        };
        tokio::spawn(connection.run());

        (
            Self {
                shutdown: shutdown_tx,
            },
            signals_rx,
        )
    }

    /// Requests the connection to close. Calling it again is a no-op.
    pub fn close(&self) {
        self.shutdown.send_replace(true);
    }
}

impl Drop for PushListener {
    fn drop(&mut self) {
        self.close();
    }
}

/// Resolves once a close was requested or the listener was dropped.
async fn close_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|closed| *closed).await;
}

struct Connection {
    url: String,
    signals: mpsc::UnboundedSender<PushSignal>,
    shutdown: watch::Receiver<bool>,
    diagnostics: DiagnosticSinkRef,
}

impl Connection {
    async fn run(mut self) {
        let connecting = tokio_tungstenite::connect_async(self.url.as_str());
        let mut stream = tokio::select! {
            result = connecting => match result {
                Ok((stream, _response)) => stream,
                Err(err) => {
                    self.raise_error(PushError::Transport(err));
                    self.finish();
                    return;
                }
            },
            _ = close_requested(&mut self.shutdown) => {
                self.finish();
                return;
            }
        };

        self.diagnostics.record(NAMESPACE, "open");
        self.emit(PushSignal::Open);

        loop {
            tokio::select! {
                frame = stream.next() => match frame {
                    Some(Ok(message)) => self.handle(message),
                    Some(Err(
                        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed,
                    ))
                    | None => break,
                    Some(Err(err)) => {
                        // The stream cannot be polled further after a transport error.
                        self.raise_error(PushError::Transport(err));
                        break;
                    }
                },
                _ = close_requested(&mut self.shutdown) => {
                    let handshake = async {
                        stream.close(None).await?;
                        while let Some(frame) = stream.next().await {
                            self.handle(frame?);
                        }
                        Ok::<_, tungstenite::Error>(())
                    };
                    match tokio::time::timeout(CLOSE_TIMEOUT, handshake).await {
                        Ok(Ok(()))
                        | Ok(Err(
                            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed,
                        )) => {}
                        Ok(Err(err)) => self.raise_error(PushError::Transport(err)),
                        Err(_) => self.diagnostics.record(NAMESPACE, "close handshake timed out"),
                    }
                    break;
                }
            }
        }

        self.finish();
    }

    fn handle(&self, message: Message) {
        let outcome = match &message {
            Message::Text(text) => decode_frame(text.as_bytes()),
            Message::Binary(bytes) => decode_frame(bytes),
            _ => return,
        };

        match outcome {
            Ok(FrameOutcome::Verified(payment)) => self.emit(PushSignal::PaymentVerified(payment)),
            Ok(FrameOutcome::Updated(payment)) => self.emit(PushSignal::PaymentUpdated(payment)),
            Ok(FrameOutcome::Ignored) => self.diagnostics.record(
                NAMESPACE,
                &format!("could not cast payload to payment object: {message}"),
            ),
            Err(err) => {
                self.diagnostics.record(
                    NAMESPACE,
                    &format!("could not deserialize message payload: {err}"),
                );
                self.emit(PushSignal::Error(PushError::Decode(err)));
            }
        }
    }

    fn raise_error(&self, err: PushError) {
        self.diagnostics.record(NAMESPACE, &format!("error: {err}"));
        self.emit(PushSignal::Error(err));
    }

    fn finish(&self) {
        self.diagnostics.record(NAMESPACE, "close");
        self.emit(PushSignal::Close);
    }

    fn emit(&self, signal: PushSignal) {
        let _ = self.signals.send(signal);
    }
}
