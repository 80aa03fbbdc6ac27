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

//! Write-side state of the notification connection: writability, the offline queue
//! and session authentication.

use crate::observability::events;
use crate::protocol::Command;
use std::collections::{HashSet, VecDeque};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

const COMPONENT: &str = "wire_state";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConnectionStatus {
    Unconnected,
    Connecting,
    Open,
    Closed,
}

/// Result of an `open` event.
pub(crate) struct OpenOutcome {
    pub(crate) is_reconnect: bool,
    /// Channels whose queued subscribe commands were flushed by this open.
    pub(crate) flushed_channels: HashSet<String>,
}

/// Outbound half of the connection as seen by callers.
///
/// Lines written while the socket is not open are queued and flushed, in order, by
/// the next [`WireState::on_open`].
pub(crate) struct WireState {
    status: ConnectionStatus,
    outbound: Option<UnboundedSender<String>>,
    pending: VecDeque<Command>,
    last_session: Option<String>,
    opens: u64,
}

impl WireState {
    pub(crate) fn new() -> Self {
        Self {
            status: ConnectionStatus::Unconnected,
            outbound: None,
            pending: VecDeque::new(),
            last_session: None,
            opens: 0,
        }
    }

    pub(crate) fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub(crate) fn writable(&self) -> bool {
        self.status == ConnectionStatus::Open && self.outbound.is_some()
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn last_session(&self) -> Option<&str> {
        self.last_session.as_deref()
    }

    pub(crate) fn set_connecting(&mut self) {
        self.status = ConnectionStatus::Connecting;
    }

    /// Sends `command` now if the socket is writable, otherwise queues it.
    pub(crate) fn write(&mut self, command: Command) {
        if self.writable() {
            if let Some(outbound) = self.outbound.as_ref() {
                if outbound.send(command.encode()).is_ok() {
                    return;
                }
                // the driver dropped the socket before reporting the close
                self.mark_closed();
            }
        }
        self.enqueue(command);
    }

    fn enqueue(&mut self, command: Command) {
        debug!(
            event = events::WIRE_WRITE_QUEUED,
            component = COMPONENT,
            queued = self.pending.len() + 1,
            "socket not writable; queueing line"
        );
        self.pending.push_back(command);
    }

    /// Authenticates `session` when it differs from the last one or when forced.
    ///
    /// While the socket is not open only the session is recorded; the open handshake
    /// sends it.
    pub(crate) fn auth(&mut self, session: &str, force: bool) {
        let changed = self.last_session.as_deref() != Some(session);
        if !changed && !force {
            return;
        }
        self.last_session = Some(session.to_string());
        if self.writable() {
            debug!(event = events::WIRE_AUTH, component = COMPONENT, "sending AUTH");
            self.write(Command::Auth {
                session: session.to_string(),
            });
        }
    }

    /// Handles an `open` event: sends `AUTH`, then flushes the offline queue in order.
    pub(crate) fn on_open(&mut self, outbound: UnboundedSender<String>) -> OpenOutcome {
        self.outbound = Some(outbound);
        self.status = ConnectionStatus::Open;
        self.opens += 1;
        let is_reconnect = self.opens > 1;

        if let Some(session) = self.last_session.clone() {
            debug!(event = events::WIRE_AUTH, component = COMPONENT, "sending AUTH on open");
            self.write(Command::Auth { session });
        }

        let flushed = self.pending.len();
        let mut flushed_channels = HashSet::new();
        let pending = std::mem::take(&mut self.pending);
        for command in pending {
            match &command {
                Command::Subscribe { channel, .. } => {
                    flushed_channels.insert(channel.clone());
                }
                Command::Unsubscribe { channel } => {
                    flushed_channels.remove(channel);
                }
                Command::Auth { .. } => {}
            }
            self.write(command);
        }
        if flushed > 0 {
            debug!(
                event = events::WIRE_QUEUE_FLUSHED,
                component = COMPONENT,
                flushed,
                "offline queue flushed"
            );
        }

        info!(
            event = events::CONNECTION_OPEN,
            component = COMPONENT,
            is_reconnect,
            "notification connection open"
        );
        OpenOutcome {
            is_reconnect,
            flushed_channels,
        }
    }

    /// Handles a definitive close.
    pub(crate) fn on_close(&mut self) {
        if self.status == ConnectionStatus::Open {
            info!(
                event = events::CONNECTION_CLOSED,
                component = COMPONENT,
                "notification connection closed"
            );
        }
        self.mark_closed();
    }

    fn mark_closed(&mut self) {
        self.outbound = None;
        self.status = ConnectionStatus::Closed;
    }
}
