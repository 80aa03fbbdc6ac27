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

//! Channel-level fan-out: which listeners care about which channel, and what the
//! wire needs to hear when that interest changes.

use crate::codec::Payload;
use crate::error::ClientError;
use crate::observability::events;
use crate::protocol::{Command, SubscribeParams};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

const COMPONENT: &str = "subscription_registry";

/// Receives messages pushed on a subscribed channel.
#[async_trait]
pub trait ChannelListener: Send + Sync {
    async fn on_message(&self, payload: Payload, version: u64);

    async fn on_error(&self, err: ClientError) {
        warn!(
            event = events::LISTENER_ERROR,
            component = COMPONENT,
            err = %err,
            "channel listener received an error"
        );
    }
}

/// Locally generated id of one listener registration.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ListenerId(String);

impl ListenerId {
    fn generate() -> Self {
        Self(Uuid::new_v4().hyphenated().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ListenerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Registry state for one channel.
pub struct SubscriptionEntry {
    listeners: HashMap<ListenerId, Arc<dyn ChannelListener>>,
    last_version: Option<u64>,
    params: Option<SubscribeParams>,
    auth_token: Option<String>,
    active: bool,
}

impl SubscriptionEntry {
    fn new(params: Option<SubscribeParams>, auth_token: Option<String>) -> Self {
        Self {
            listeners: HashMap::new(),
            last_version: None,
            params,
            auth_token,
            active: false,
        }
    }

    fn observe_version(&mut self, version: u64) {
        self.last_version = Some(self.last_version.map_or(version, |last| last.max(version)));
    }

    pub fn last_version(&self) -> Option<u64> {
        self.last_version
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Replay position to request after a reconnect.
    fn replay_params(&self) -> Option<SubscribeParams> {
        // Version 0 means nothing has been published yet.
        match self.last_version {
            Some(version) if version > 0 => Some(SubscribeParams::From(version + 1)),
            _ => self.params.clone(),
        }
    }
}

/// Maps channel ids to their listeners and replay state.
#[derive(Default)]
pub struct SubscriptionRegistry {
    entries: HashMap<String, SubscriptionEntry>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers interest in `channel`; returns the new listener id and the command to
    /// put on the wire, if any.
    pub fn subscribe(
        &mut self,
        channel: &str,
        listener: Option<Arc<dyn ChannelListener>>,
        params: Option<SubscribeParams>,
        auth_token: Option<String>,
        force: bool,
    ) -> (ListenerId, Option<Command>) {
        let mut need_sub = false;
        let entry = self.entries.entry(channel.to_string()).or_insert_with(|| {
            need_sub = true;
            SubscriptionEntry::new(params.clone(), auth_token.clone())
        });

        let mut id = ListenerId::generate();
        while entry.listeners.contains_key(&id) {
            id = ListenerId::generate();
        }
        if let Some(listener) = listener {
            entry.listeners.insert(id.clone(), listener);
        }

        let command = (need_sub || force).then(|| Command::Subscribe {
            channel: channel.to_string(),
            params,
            token: auth_token,
        });

        debug!(
            event = events::CHANNEL_SUBSCRIBE,
            component = COMPONENT,
            channel,
            listener_id = id.as_str(),
            listeners = entry.listeners.len(),
            on_wire = command.is_some(),
            "registered channel interest"
        );

        (id, command)
    }

    /// Drops one listener, or the whole channel when `listener_id` is `None`.
    ///
    /// Returns `UNSUB` when the channel entry was removed. Unknown channels and
    /// listeners are a no-op.
    pub fn unsubscribe(&mut self, channel: &str, listener_id: Option<&ListenerId>) -> Option<Command> {
        let entry = self.entries.get_mut(channel)?;

        if let Some(id) = listener_id {
            entry.listeners.remove(id);
        } else {
            entry.listeners.clear();
        }

        if listener_id.is_some() && !entry.listeners.is_empty() {
            return None;
        }

        self.entries.remove(channel);
        debug!(
            event = events::CHANNEL_UNSUBSCRIBE,
            component = COMPONENT,
            channel,
            "channel torn down"
        );
        Some(Command::Unsubscribe {
            channel: channel.to_string(),
        })
    }

    /// Applies a `SUBSCRIBED` acknowledgement.
    pub fn record_ack(&mut self, channel: &str, version: u64) -> bool {
        match self.entries.get_mut(channel) {
            Some(entry) => {
                entry.observe_version(version);
                entry.active = true;
                debug!(
                    event = events::CHANNEL_ACK,
                    component = COMPONENT,
                    channel,
                    version,
                    "subscription acknowledged"
                );
                true
            }
            None => false,
        }
    }

    /// Applies a data frame and returns a snapshot of the listeners to notify.
    pub fn record_data(
        &mut self,
        channel: &str,
        version: u64,
    ) -> Option<Vec<Arc<dyn ChannelListener>>> {
        let entry = self.entries.get_mut(channel)?;
        entry.observe_version(version);
        Some(entry.listeners.values().cloned().collect())
    }

    /// Forced re-subscription commands for every tracked channel.
    pub fn resubscribe_all(&self) -> Vec<Command> {
        self.entries
            .iter()
            .map(|(channel, entry)| {
                let params = entry.replay_params();
                debug!(
                    event = events::CHANNEL_RESUBSCRIBE,
                    component = COMPONENT,
                    channel = channel.as_str(),
                    params = ?params,
                    "replaying subscription"
                );
                Command::Subscribe {
                    channel: channel.clone(),
                    params,
                    token: entry.auth_token.clone(),
                }
            })
            .collect()
    }

    /// Removes every entry and hands back all listeners.
    pub fn drain(&mut self) -> Vec<Arc<dyn ChannelListener>> {
        self.entries
            .drain()
            .flat_map(|(_, entry)| entry.listeners.into_values())
            .collect()
    }

    pub fn entry(&self, channel: &str) -> Option<&SubscriptionEntry> {
        self.entries.get(channel)
    }

    pub fn contains(&self, channel: &str) -> bool {
        self.entries.contains_key(channel)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{ChannelListener, SubscriptionRegistry};
    use crate::codec::Payload;
    use crate::protocol::{Command, SubscribeParams};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Arc;

    struct NoopListener;

    #[async_trait]
    impl ChannelListener for NoopListener {
        async fn on_message(&self, _payload: Payload, _version: u64) {}
    }

    fn listener() -> Option<Arc<dyn ChannelListener>> {
        Some(Arc::new(NoopListener))
    }

    #[test]
    fn first_subscribe_emits_command_and_second_piggybacks() {
        let mut registry = SubscriptionRegistry::new();

        let (_, first) = registry.subscribe("c", listener(), Some(SubscribeParams::All), None, false);
        let (_, second) = registry.subscribe("c", listener(), Some(SubscribeParams::All), None, false);

        assert_eq!(first.unwrap().encode(), "SUB c ALL");
        assert!(second.is_none());
        assert_eq!(registry.entry("c").unwrap().listener_count(), 2);
    }

    #[test]
    fn force_resends_with_token() {
        let mut registry = SubscriptionRegistry::new();
        registry.subscribe("c", listener(), None, Some("tok".to_string()), false);

        let (_, forced) = registry.subscribe("c", None, None, Some("tok".to_string()), true);

        assert_eq!(forced.unwrap().encode(), "AUTHSUB tok c");
    }

    #[test]
    fn listener_ids_are_unique() {
        let mut registry = SubscriptionRegistry::new();
        let ids: HashSet<_> = (0..64)
            .map(|_| registry.subscribe("c", listener(), None, None, false).0)
            .collect();

        assert_eq!(ids.len(), 64);
    }

    #[test]
    fn unsubscribing_one_listener_keeps_the_other() {
        let mut registry = SubscriptionRegistry::new();
        let (first, _) = registry.subscribe("c", listener(), None, None, false);
        registry.subscribe("c", listener(), None, None, false);

        assert!(registry.unsubscribe("c", Some(&first)).is_none());
        assert_eq!(registry.record_data("c", 1).unwrap().len(), 1);
    }

    #[test]
    fn unsubscribing_without_id_tears_down_once() {
        let mut registry = SubscriptionRegistry::new();
        registry.subscribe("c", listener(), None, None, false);
        registry.subscribe("c", listener(), None, None, false);

        assert_eq!(
            registry.unsubscribe("c", None),
            Some(Command::Unsubscribe {
                channel: "c".to_string()
            })
        );
        assert!(registry.unsubscribe("c", None).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn last_listener_leaving_tears_down() {
        let mut registry = SubscriptionRegistry::new();
        let (id, _) = registry.subscribe("c", listener(), None, None, false);

        assert!(registry.unsubscribe("c", Some(&id)).is_some());
        assert!(!registry.contains("c"));
    }

    #[test]
    fn versions_never_decrease() {
        let mut registry = SubscriptionRegistry::new();
        registry.subscribe("c", listener(), None, None, false);

        registry.record_data("c", 7);
        registry.record_data("c", 5);
        registry.record_ack("c", 2);

        assert_eq!(registry.entry("c").unwrap().last_version(), Some(7));
        assert!(registry.entry("c").unwrap().is_active());
    }

    #[test]
    fn ack_and_data_for_unknown_channel_are_dropped() {
        let mut registry = SubscriptionRegistry::new();

        assert!(!registry.record_ack("gone", 3));
        assert!(registry.record_data("gone", 3).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn resubscribe_resumes_after_last_version() {
        let mut registry = SubscriptionRegistry::new();
        registry.subscribe("seen", listener(), Some(SubscribeParams::Last), Some("s".to_string()), false);
        registry.subscribe("fresh", listener(), Some(SubscribeParams::All), None, false);
        for version in [3, 5, 7] {
            registry.record_data("seen", version);
        }

        let mut lines: Vec<String> = registry
            .resubscribe_all()
            .iter()
            .map(Command::encode)
            .collect();
        lines.sort();

        assert_eq!(lines, vec!["AUTHSUB s seen FROM 8", "SUB fresh ALL"]);
    }

    #[test]
    fn version_zero_is_not_a_resume_point() {
        let mut registry = SubscriptionRegistry::new();
        registry.subscribe("tasks/t1", listener(), Some(SubscribeParams::Last), Some("s".to_string()), false);
        registry.record_ack("tasks/t1", 0);

        let lines: Vec<String> = registry
            .resubscribe_all()
            .iter()
            .map(Command::encode)
            .collect();

        assert_eq!(registry.entry("tasks/t1").unwrap().last_version(), Some(0));
        assert_eq!(lines, vec!["AUTHSUB s tasks/t1 LAST"]);
    }

    #[test]
    fn resubscribe_after_teardown_uses_new_params() {
        let mut registry = SubscriptionRegistry::new();
        registry.subscribe("c", listener(), Some(SubscribeParams::All), None, false);
        registry.record_data("c", 9);
        registry.unsubscribe("c", None);

        let (_, command) = registry.subscribe("c", listener(), Some(SubscribeParams::Last), None, false);

        assert_eq!(command.unwrap().encode(), "SUB c LAST");
        assert_eq!(registry.entry("c").unwrap().last_version(), None);
    }
}
