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

use ac_client::{ClientError, NotificationSocket, SocketConnector};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tracing::debug;

/// How long helpers wait for the client before failing the test.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Creates a connector for the client side and the matching in-memory server.
pub fn fake_notification_server() -> (Arc<FakeConnector>, FakeServer) {
    let (accept_tx, accept_rx) = unbounded_channel();
    let refusals = Arc::new(AtomicUsize::new(0));
    let connector = Arc::new(FakeConnector {
        accept_tx,
        refusals: refusals.clone(),
        attempts: Arc::new(Mutex::new(Vec::new())),
    });
    let server = FakeServer {
        accept_rx,
        refusals,
        attempts: connector.attempts.clone(),
    };
    (connector, server)
}

pub struct FakeConnector {
    accept_tx: UnboundedSender<FakeConnection>,
    refusals: Arc<AtomicUsize>,
    attempts: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl SocketConnector for FakeConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn NotificationSocket>, ClientError> {
        self.attempts.lock().await.push(url.to_string());

        let refused = self
            .refusals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            debug!("fake server refusing connection to {url}");
            return Err(ClientError::Connection("connection refused".to_string()));
        }

        let (to_client, from_server) = unbounded_channel();
        let (to_server, from_client) = unbounded_channel();
        self.accept_tx
            .send(FakeConnection {
                to_client: Some(to_client),
                from_client,
            })
            .map_err(|_| ClientError::Connection("fake server is gone".to_string()))?;

        Ok(Box::new(FakeSocket {
            from_server,
            to_server,
            closed: false,
        }))
    }
}

struct FakeSocket {
    from_server: UnboundedReceiver<String>,
    to_server: UnboundedSender<String>,
    closed: bool,
}

#[async_trait]
impl NotificationSocket for FakeSocket {
    async fn send_line(&mut self, line: String) -> Result<(), ClientError> {
        if self.closed {
            return Err(ClientError::Connection("socket closed".to_string()));
        }
        self.to_server
            .send(line)
            .map_err(|_| ClientError::Connection("server hung up".to_string()))
    }

    async fn next_line(&mut self) -> Option<Result<String, ClientError>> {
        if self.closed {
            return None;
        }
        self.from_server.recv().await.map(Ok)
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}

/// Server half of the fake notification endpoint.
pub struct FakeServer {
    accept_rx: UnboundedReceiver<FakeConnection>,
    refusals: Arc<AtomicUsize>,
    attempts: Arc<Mutex<Vec<String>>>,
}

impl FakeServer {
    /// Next accepted connection; panics after [`WAIT_TIMEOUT`].
    pub async fn accept(&mut self) -> FakeConnection {
        tokio::time::timeout(WAIT_TIMEOUT, self.accept_rx.recv())
            .await
            .expect("client never connected")
            .expect("connector dropped")
    }

    /// Fails the next `count` connection attempts.
    pub fn refuse_next(&self, count: usize) {
        self.refusals.store(count, Ordering::SeqCst);
    }

    /// Urls of every connection attempt so far, refused ones included.
    pub async fn attempts(&self) -> Vec<String> {
        self.attempts.lock().await.clone()
    }
}

/// One accepted client connection.
pub struct FakeConnection {
    to_client: Option<UnboundedSender<String>>,
    from_client: UnboundedReceiver<String>,
}

impl FakeConnection {
    pub fn push(&self, frame: &str) {
        if let Some(to_client) = &self.to_client {
            let _ = to_client.send(frame.to_string());
        }
    }

    /// Next line written by the client; panics after [`WAIT_TIMEOUT`].
    pub async fn next_line(&mut self) -> String {
        tokio::time::timeout(WAIT_TIMEOUT, self.from_client.recv())
            .await
            .expect("client wrote nothing")
            .expect("client hung up")
    }

    pub async fn expect_lines(&mut self, count: usize) -> Vec<String> {
        let mut lines = Vec::with_capacity(count);
        for _ in 0..count {
            lines.push(self.next_line().await);
        }
        lines
    }

    /// Lines already written by the client, without waiting.
    pub fn written(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(line) = self.from_client.try_recv() {
            lines.push(line);
        }
        lines
    }

    /// Hangs up from the server side.
    pub fn disconnect(mut self) {
        self.to_client.take();
    }
}
