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

//! The notification service shared by every waiter in the process.
//!
//! A [`Notifier`] owns one channel connection and one subscription registry. It is
//! constructed explicitly at the application root and cloned into whatever needs it;
//! the reconnect driver runs as a background task holding only a weak handle.

use crate::codec::{decode_payload, default_inflate, Inflate};
use crate::config::NotificationConfig;
use crate::connection::{ConnectionStatus, WireState};
use crate::driver::{run_connection_loop, BackoffPolicy, SocketConnector, WebSocketConnector};
use crate::error::ClientError;
use crate::observability::events;
use crate::protocol::{Command, Inbound, SubscribeParams};
use crate::registry::{ChannelListener, ListenerId, SubscriptionRegistry};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const COMPONENT: &str = "notifier";

struct NotifierState {
    wire: WireState,
    registry: SubscriptionRegistry,
    shut_down: bool,
}

struct NotifierInner {
    config: NotificationConfig,
    connector: Arc<dyn SocketConnector>,
    inflate: Arc<dyn Inflate>,
    state: Mutex<NotifierState>,
    driver: Mutex<Option<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl Drop for NotifierInner {
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);
    }
}

/// Handle to the process-wide notification service.
#[derive(Clone)]
pub struct Notifier {
    inner: Arc<NotifierInner>,
}

/// Non-owning handle used by the driver and by listeners that need to call back.
#[derive(Clone)]
pub(crate) struct WeakNotifier {
    inner: Weak<NotifierInner>,
}

impl WeakNotifier {
    pub(crate) fn upgrade(&self) -> Option<Notifier> {
        self.inner.upgrade().map(|inner| Notifier { inner })
    }
}

impl Notifier {
    pub fn new(config: NotificationConfig, connector: Arc<dyn SocketConnector>) -> Self {
        Self::with_inflate(config, connector, default_inflate())
    }

    pub fn with_inflate(
        config: NotificationConfig,
        connector: Arc<dyn SocketConnector>,
        inflate: Arc<dyn Inflate>,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(NotifierInner {
                config,
                connector,
                inflate,
                state: Mutex::new(NotifierState {
                    wire: WireState::new(),
                    registry: SubscriptionRegistry::new(),
                    shut_down: false,
                }),
                driver: Mutex::new(None),
                shutdown_tx,
            }),
        }
    }

    /// Notifier speaking to `config.url` over WebSockets.
    pub fn from_config(config: NotificationConfig) -> Self {
        Self::new(config, Arc::new(WebSocketConnector))
    }

    pub(crate) fn downgrade(&self) -> WeakNotifier {
        WeakNotifier {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Authenticates as `session` and starts the connection driver unless one is running.
    ///
    /// Later calls only re-authenticate when the session changed.
    pub async fn connect(&self, session: &str) -> Result<(), ClientError> {
        {
            let mut state = self.inner.state.lock().await;
            if state.shut_down {
                return Err(ClientError::ShuttingDown);
            }
            state.wire.auth(session, false);
        }

        let mut driver = self.inner.driver.lock().await;
        // A driver that gave up after its retry bound is started again.
        if driver.as_ref().map_or(true, JoinHandle::is_finished) {
            let url = self.inner.config.socket_url()?;
            info!(
                event = events::CONNECTION_CONNECTING,
                component = COMPONENT,
                url = url.as_str(),
                "starting notification connection"
            );
            let handle = tokio::spawn(run_connection_loop(
                self.downgrade(),
                self.inner.connector.clone(),
                url,
                BackoffPolicy::from(&self.inner.config.reconnect),
                self.inner.shutdown_tx.subscribe(),
            ));
            *driver = Some(handle);
        }
        Ok(())
    }

    /// Sends `AUTH` when `session` differs from the current one, or always when `force`.
    pub async fn auth(&self, session: &str, force: bool) -> Result<(), ClientError> {
        let mut state = self.inner.state.lock().await;
        if state.shut_down {
            return Err(ClientError::ShuttingDown);
        }
        state.wire.auth(session, force);
        Ok(())
    }

    /// Registers interest in `channel`.
    ///
    /// The wire only hears about it for the first listener, or when `force` is set.
    pub async fn subscribe(
        &self,
        channel: &str,
        listener: Option<Arc<dyn ChannelListener>>,
        params: Option<SubscribeParams>,
        auth_token: Option<String>,
        force: bool,
    ) -> Result<ListenerId, ClientError> {
        let mut state = self.inner.state.lock().await;
        if state.shut_down {
            return Err(ClientError::ShuttingDown);
        }
        let (id, command) = state
            .registry
            .subscribe(channel, listener, params, auth_token, force);
        if let Some(command) = command {
            state.wire.write(command);
        }
        Ok(id)
    }

    pub async fn subscribe_last(
        &self,
        channel: &str,
        listener: Arc<dyn ChannelListener>,
    ) -> Result<ListenerId, ClientError> {
        self.subscribe(channel, Some(listener), Some(SubscribeParams::Last), None, false)
            .await
    }

    pub async fn subscribe_all(
        &self,
        channel: &str,
        listener: Arc<dyn ChannelListener>,
    ) -> Result<ListenerId, ClientError> {
        self.subscribe(channel, Some(listener), Some(SubscribeParams::All), None, false)
            .await
    }

    pub async fn subscribe_from(
        &self,
        channel: &str,
        listener: Arc<dyn ChannelListener>,
        version: u64,
    ) -> Result<ListenerId, ClientError> {
        self.subscribe(
            channel,
            Some(listener),
            Some(SubscribeParams::From(version)),
            None,
            false,
        )
        .await
    }

    pub async fn subscribe_auth_last(
        &self,
        channel: &str,
        listener: Arc<dyn ChannelListener>,
        token: &str,
    ) -> Result<ListenerId, ClientError> {
        self.subscribe(
            channel,
            Some(listener),
            Some(SubscribeParams::Last),
            Some(token.to_string()),
            false,
        )
        .await
    }

    /// Removes one listener, or the whole channel when `listener_id` is `None`.
    ///
    /// Idempotent: unknown channels and listeners are ignored.
    pub async fn unsubscribe(&self, channel: &str, listener_id: Option<&ListenerId>) {
        let mut state = self.inner.state.lock().await;
        if let Some(command) = state.registry.unsubscribe(channel, listener_id) {
            state.wire.write(command);
        }
    }

    /// Applies one inbound protocol frame.
    pub async fn handle_message(&self, raw: &str) {
        let inbound = match Inbound::parse(raw) {
            Ok(inbound) => inbound,
            Err(err) => {
                warn!(
                    event = events::FRAME_DECODE_FAILED,
                    component = COMPONENT,
                    err = %err,
                    "dropping undecodable frame"
                );
                return;
            }
        };

        match inbound {
            Inbound::Ack { channel, version } => {
                let known = self.inner.state.lock().await.registry.record_ack(&channel, version);
                if !known {
                    debug!(
                        event = events::FRAME_DROPPED_UNKNOWN_CHANNEL,
                        component = COMPONENT,
                        channel = channel.as_str(),
                        version,
                        "ack for untracked channel"
                    );
                }
            }
            Inbound::Data {
                channel,
                version,
                compressed,
                payload,
            } => {
                let listeners = self
                    .inner
                    .state
                    .lock()
                    .await
                    .registry
                    .record_data(&channel, version);
                let Some(listeners) = listeners else {
                    debug!(
                        event = events::FRAME_DROPPED_UNKNOWN_CHANNEL,
                        component = COMPONENT,
                        channel = channel.as_str(),
                        version,
                        "data for untracked channel"
                    );
                    return;
                };

                let decoded = decode_payload(compressed, &payload, self.inner.inflate.as_ref());
                for listener in listeners {
                    listener.on_message(decoded.clone(), version).await;
                }
            }
        }
    }

    pub(crate) async fn mark_connecting(&self) {
        let mut state = self.inner.state.lock().await;
        if !state.shut_down {
            state.wire.set_connecting();
        }
    }

    /// Open handshake: authenticate, flush the offline queue, and on reconnect replay
    /// every subscription not already covered by the flush.
    pub(crate) async fn on_open(&self, outbound: UnboundedSender<String>) {
        let mut state = self.inner.state.lock().await;
        let outcome = state.wire.on_open(outbound);
        if !outcome.is_reconnect {
            return;
        }
        for command in state.registry.resubscribe_all() {
            if let Command::Subscribe { channel, .. } = &command {
                if outcome.flushed_channels.contains(channel) {
                    continue;
                }
            }
            state.wire.write(command);
        }
    }

    pub(crate) async fn on_close(&self) {
        self.inner.state.lock().await.wire.on_close();
    }

    pub async fn status(&self) -> ConnectionStatus {
        self.inner.state.lock().await.wire.status()
    }

    /// Session sent with the most recent `AUTH`.
    pub async fn session(&self) -> Option<String> {
        self.inner
            .state
            .lock()
            .await
            .wire
            .last_session()
            .map(str::to_string)
    }

    /// Number of lines waiting for the socket to open.
    pub async fn pending_len(&self) -> usize {
        self.inner.state.lock().await.wire.pending_len()
    }

    pub async fn last_version(&self, channel: &str) -> Option<u64> {
        self.inner
            .state
            .lock()
            .await
            .registry
            .entry(channel)
            .and_then(|entry| entry.last_version())
    }

    pub async fn has_channel(&self, channel: &str) -> bool {
        self.inner.state.lock().await.registry.contains(channel)
    }

    /// Stops the driver, closes the socket and fails every registered listener with
    /// [`ClientError::ShuttingDown`].
    pub async fn shutdown(&self) {
        let listeners = {
            let mut state = self.inner.state.lock().await;
            if state.shut_down {
                return;
            }
            state.shut_down = true;
            state.registry.drain()
        };

        self.inner.shutdown_tx.send_replace(true);
        let driver = self.inner.driver.lock().await.take();
        if let Some(driver) = driver {
            if let Err(err) = driver.await {
                warn!(
                    event = events::CONNECTION_ERROR,
                    component = COMPONENT,
                    err = %err,
                    "connection driver ended abnormally"
                );
            }
        }

        info!(
            event = events::CONNECTION_SHUTDOWN,
            component = COMPONENT,
            listeners = listeners.len(),
            "notifier shut down"
        );
        for listener in listeners {
            listener.on_error(ClientError::ShuttingDown).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Notifier;
    use crate::codec::Payload;
    use crate::config::NotificationConfig;
    use crate::driver::{NotificationSocket, SocketConnector};
    use crate::error::ClientError;
    use crate::registry::{ChannelListener, ListenerId};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    struct Offline;

    #[async_trait]
    impl SocketConnector for Offline {
        async fn connect(&self, _url: &str) -> Result<Box<dyn NotificationSocket>, ClientError> {
            Err(ClientError::Connection("offline".to_string()))
        }
    }

    #[derive(Default)]
    struct Recorder {
        messages: Mutex<Vec<(Payload, u64)>>,
        errors: Mutex<Vec<ClientError>>,
    }

    #[async_trait]
    impl ChannelListener for Recorder {
        async fn on_message(&self, payload: Payload, version: u64) {
            self.messages.lock().unwrap().push((payload, version));
        }

        async fn on_error(&self, err: ClientError) {
            self.errors.lock().unwrap().push(err);
        }
    }

    fn notifier() -> Notifier {
        Notifier::new(
            NotificationConfig::new("http://localhost:9"),
            Arc::new(Offline),
        )
    }

    fn drain(rx: &mut UnboundedReceiver<String>) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(line) = rx.try_recv() {
            lines.push(line);
        }
        lines
    }

    #[tokio::test]
    async fn data_reaches_every_listener_in_order() {
        let notifier = notifier();
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());
        notifier.subscribe_all("c", first.clone()).await.unwrap();
        notifier.subscribe_all("c", second.clone()).await.unwrap();

        notifier.handle_message("c\n1\nhello").await;
        notifier.handle_message("c\n2\nnull").await;

        for recorder in [&first, &second] {
            let messages = recorder.messages.lock().unwrap();
            assert_eq!(
                *messages,
                vec![(Payload::Text("hello".to_string()), 1), (Payload::Null, 2)]
            );
        }
        assert_eq!(notifier.last_version("c").await, Some(2));
    }

    #[tokio::test]
    async fn frames_for_unknown_channels_and_garbage_are_dropped() {
        let notifier = notifier();

        notifier.handle_message("SUBSCRIBED nowhere 3").await;
        notifier.handle_message("nowhere\n4\n{}").await;
        notifier.handle_message("c\nnot-a-number\n{}").await;

        assert!(!notifier.has_channel("nowhere").await);
    }

    #[tokio::test]
    async fn offline_subscribe_is_queued() {
        let notifier = notifier();

        notifier
            .subscribe_auth_last("tasks/1", Arc::new(Recorder::default()), "s")
            .await
            .unwrap();

        assert_eq!(notifier.pending_len().await, 1);
    }

    #[tokio::test]
    async fn reconnect_replays_from_next_version_without_duplicates() {
        let notifier = notifier();
        notifier.auth("s", false).await.unwrap();
        notifier
            .subscribe_all("seen", Arc::new(Recorder::default()))
            .await
            .unwrap();

        let (tx, mut rx) = unbounded_channel();
        notifier.on_open(tx).await;
        assert_eq!(drain(&mut rx), vec!["AUTH s", "SUB seen ALL"]);
        for version in [3, 5, 7] {
            notifier.handle_message(&format!("seen\n{version}\nx")).await;
        }
        notifier.on_close().await;

        notifier
            .subscribe_last("fresh", Arc::new(Recorder::default()))
            .await
            .unwrap();
        let (tx, mut rx) = unbounded_channel();
        notifier.on_open(tx).await;

        assert_eq!(
            drain(&mut rx),
            vec!["AUTH s", "SUB fresh LAST", "SUB seen FROM 8"]
        );
    }

    struct SelfRemoving {
        notifier: Notifier,
        id: Mutex<Option<ListenerId>>,
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl ChannelListener for SelfRemoving {
        async fn on_message(&self, _payload: Payload, _version: u64) {
            *self.calls.lock().unwrap() += 1;
            let id = self.id.lock().unwrap().clone();
            self.notifier.unsubscribe("c", id.as_ref()).await;
        }
    }

    #[tokio::test]
    async fn listener_may_unsubscribe_itself_during_dispatch() {
        let notifier = notifier();
        let other = Arc::new(Recorder::default());
        let leaving = Arc::new(SelfRemoving {
            notifier: notifier.clone(),
            id: Mutex::new(None),
            calls: Mutex::new(0),
        });
        let id = notifier.subscribe_all("c", leaving.clone()).await.unwrap();
        *leaving.id.lock().unwrap() = Some(id);
        notifier.subscribe_all("c", other.clone()).await.unwrap();

        notifier.handle_message("c\n1\na").await;
        notifier.handle_message("c\n2\nb").await;

        assert_eq!(*leaving.calls.lock().unwrap(), 1);
        assert_eq!(other.messages.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn shutdown_fails_listeners_and_rejects_new_work() {
        let notifier = notifier();
        let recorder = Arc::new(Recorder::default());
        notifier.subscribe_last("c", recorder.clone()).await.unwrap();

        notifier.shutdown().await;
        notifier.shutdown().await;

        assert_eq!(
            *recorder.errors.lock().unwrap(),
            vec![ClientError::ShuttingDown]
        );
        assert_eq!(
            notifier.connect("s").await,
            Err(ClientError::ShuttingDown)
        );
        assert!(notifier
            .subscribe_last("c", recorder.clone())
            .await
            .is_err());
    }
}
