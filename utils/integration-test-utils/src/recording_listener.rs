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

use ac_client::{ChannelListener, ClientError, Payload};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use tracing::debug;

use crate::fake_socket::WAIT_TIMEOUT;

/// Channel listener that keeps everything it receives.
#[derive(Clone, Default)]
pub struct RecordingListener {
    messages: Arc<Mutex<Vec<(Payload, u64)>>>,
    errors: Arc<Mutex<Vec<ClientError>>>,
    arrived: Arc<Notify>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn messages(&self) -> Vec<(Payload, u64)> {
        self.messages.lock().await.clone()
    }

    pub async fn versions(&self) -> Vec<u64> {
        self.messages
            .lock()
            .await
            .iter()
            .map(|(_, version)| *version)
            .collect()
    }

    pub async fn errors(&self) -> Vec<ClientError> {
        self.errors.lock().await.clone()
    }

    /// Waits until at least `count` messages arrived; panics after [`WAIT_TIMEOUT`].
    pub async fn wait_for(&self, count: usize) {
        tokio::time::timeout(WAIT_TIMEOUT, async {
            loop {
                let notified = self.arrived.notified();
                if self.messages.lock().await.len() >= count {
                    return;
                }
                notified.await;
            }
        })
        .await
        .expect("listener did not receive enough messages");
    }
}

#[async_trait]
impl ChannelListener for RecordingListener {
    async fn on_message(&self, payload: Payload, version: u64) {
        debug!("recording listener got version {version}: {payload:?}");
        self.messages.lock().await.push((payload, version));
        self.arrived.notify_waiters();
    }

    async fn on_error(&self, err: ClientError) {
        debug!("recording listener got error: {err}");
        self.errors.lock().await.push(err);
    }
}
