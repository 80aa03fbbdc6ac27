/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Reconnect state machine that owns the notification socket.
//!
//! The loop connects, runs the open handshake, pumps frames in both directions until
//! the socket closes, then backs off and tries again. Connection faults never leave
//! this module; callers only observe queued writes.

use crate::config::ReconnectConfig;
use crate::error::ClientError;
use crate::notifier::WeakNotifier;
use crate::observability::events;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc::unbounded_channel;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

const COMPONENT: &str = "connection_driver";

/// One open duplex connection carrying protocol lines.
#[async_trait]
pub trait NotificationSocket: Send {
    async fn send_line(&mut self, line: String) -> Result<(), ClientError>;

    /// Next inbound line; `None` once the peer closed the connection.
    async fn next_line(&mut self) -> Option<Result<String, ClientError>>;

    async fn close(&mut self);
}

/// Opens notification sockets.
#[async_trait]
pub trait SocketConnector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn NotificationSocket>, ClientError>;
}

/// Capped exponential backoff between connection attempts.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BackoffPolicy {
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub factor: u32,
    /// `None` retries forever.
    pub max_retries: Option<u32>,
}

impl BackoffPolicy {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let scale = self.factor.max(1).saturating_pow(attempt.min(32));
        self.min_delay
            .checked_mul(scale)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    pub fn allows(&self, attempt: u32) -> bool {
        self.max_retries.map_or(true, |max| attempt < max)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from(&ReconnectConfig::default())
    }
}

impl From<&ReconnectConfig> for BackoffPolicy {
    fn from(config: &ReconnectConfig) -> Self {
        Self {
            min_delay: Duration::from_millis(config.min_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            factor: config.factor,
            max_retries: config.max_retries,
        }
    }
}

/// Why one connected session of the pump ended.
enum PumpExit {
    Closed,
    Shutdown,
}

/// Drives the notification connection until shutdown.
pub(crate) async fn run_connection_loop(
    notifier: WeakNotifier,
    connector: std::sync::Arc<dyn SocketConnector>,
    url: String,
    backoff: BackoffPolicy,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut attempt: u32 = 0;

    loop {
        if *shutdown.borrow() {
            break;
        }
        let Some(strong) = notifier.upgrade() else {
            break;
        };
        strong.mark_connecting().await;
        drop(strong);

        debug!(
            event = events::CONNECTION_CONNECTING,
            component = COMPONENT,
            url = url.as_str(),
            attempt,
            "connecting notification socket"
        );

        let connected = tokio::select! {
            result = connector.connect(&url) => Some(result),
            _ = shutdown.changed() => None,
        };

        match connected {
            None => break,
            Some(Ok(socket)) => {
                attempt = 0;
                match pump(&notifier, socket, &mut shutdown).await {
                    PumpExit::Shutdown => break,
                    PumpExit::Closed => {}
                }
            }
            Some(Err(err)) => {
                warn!(
                    event = events::CONNECTION_ERROR,
                    component = COMPONENT,
                    url = url.as_str(),
                    err = %err,
                    "unable to open notification socket"
                );
                if let Some(strong) = notifier.upgrade() {
                    strong.on_close().await;
                }
            }
        }

        if !backoff.allows(attempt) {
            warn!(
                event = events::CONNECTION_GIVE_UP,
                component = COMPONENT,
                attempt,
                "retry bound reached; giving up"
            );
            break;
        }
        let delay = backoff.delay_for(attempt);
        attempt = attempt.saturating_add(1);
        debug!(
            event = events::CONNECTION_BACKOFF,
            component = COMPONENT,
            delay_ms = delay.as_millis() as u64,
            attempt,
            "waiting before reconnect"
        );

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => break,
        }
    }

    info!(
        event = events::CONNECTION_SHUTDOWN,
        component = COMPONENT,
        "connection driver stopped"
    );
}

async fn pump(
    notifier: &WeakNotifier,
    mut socket: Box<dyn NotificationSocket>,
    shutdown: &mut watch::Receiver<bool>,
) -> PumpExit {
    let (outbound_tx, mut outbound_rx) = unbounded_channel::<String>();

    match notifier.upgrade() {
        Some(strong) => strong.on_open(outbound_tx).await,
        None => {
            socket.close().await;
            return PumpExit::Shutdown;
        }
    }

    let exit = loop {
        tokio::select! {
            biased;

            _ = shutdown.changed() => {
                socket.close().await;
                break PumpExit::Shutdown;
            }

            line = outbound_rx.recv() => {
                // the wire state released the sender after a failed write
                let Some(line) = line else {
                    break PumpExit::Closed;
                };
                if let Err(err) = socket.send_line(line).await {
                    warn!(
                        event = events::CONNECTION_ERROR,
                        component = COMPONENT,
                        err = %err,
                        "write failed; dropping connection"
                    );
                    break PumpExit::Closed;
                }
            }

            inbound = socket.next_line() => {
                match inbound {
                    Some(Ok(line)) => {
                        let Some(strong) = notifier.upgrade() else {
                            socket.close().await;
                            break PumpExit::Shutdown;
                        };
                        strong.handle_message(&line).await;
                    }
                    Some(Err(err)) => {
                        warn!(
                            event = events::CONNECTION_ERROR,
                            component = COMPONENT,
                            err = %err,
                            "read failed; dropping connection"
                        );
                        break PumpExit::Closed;
                    }
                    None => break PumpExit::Closed,
                }
            }
        }
    };

    if let Some(strong) = notifier.upgrade() {
        strong.on_close().await;
    }
    exit
}

type TungsteniteStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// WebSocket transport; every text frame is one protocol line.
#[derive(Clone, Copy, Debug, Default)]
pub struct WebSocketConnector;

struct WebSocketLines {
    stream: TungsteniteStream,
}

#[async_trait]
impl SocketConnector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn NotificationSocket>, ClientError> {
        let (stream, _response) = connect_async(url)
            .await
            .map_err(|e| ClientError::Connection(e.to_string()))?;
        Ok(Box::new(WebSocketLines { stream }))
    }
}

#[async_trait]
impl NotificationSocket for WebSocketLines {
    async fn send_line(&mut self, line: String) -> Result<(), ClientError> {
        self.stream
            .send(Message::text(line))
            .await
            .map_err(|e| ClientError::Connection(e.to_string()))
    }

    async fn next_line(&mut self) -> Option<Result<String, ClientError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Binary(bytes)) => {
                    return Some(
                        String::from_utf8(bytes.to_vec())
                            .map_err(|e| ClientError::Protocol(e.to_string())),
                    )
                }
                Ok(Message::Close(_)) => return None,
                Ok(_) => continue,
                Err(e) => return Some(Err(ClientError::Connection(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }
}

#[cfg(test)]
mod tests {
    use super::BackoffPolicy;
    use std::time::Duration;

    fn policy() -> BackoffPolicy {
        BackoffPolicy {
            min_delay: Duration::from_millis(500),
            max_delay: Duration::from_millis(5000),
            factor: 2,
            max_retries: None,
        }
    }

    #[test]
    fn delay_grows_then_caps() {
        let policy = policy();

        assert_eq!(policy.delay_for(0), Duration::from_millis(500));
        assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(4000));
        assert_eq!(policy.delay_for(4), Duration::from_millis(5000));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_millis(5000));
    }

    #[test]
    fn unbounded_by_default() {
        assert!(policy().allows(u32::MAX - 1));
        assert!(BackoffPolicy::default().allows(1_000_000));
    }

    #[test]
    fn bounded_policy_stops() {
        let policy = BackoffPolicy {
            max_retries: Some(2),
            ..policy()
        };

        assert!(policy.allows(1));
        assert!(!policy.allows(2));
    }
}
