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

//! Push-based completion waiting for server tasks.
//!
//! Each awaited task gets its own listener on `tasks/<id>`. The listener settles a
//! oneshot exactly once: on the first message with a non-zero version, on explicit
//! cancellation, or when the notifier shuts down.

use crate::codec::Payload;
use crate::error::{ClientError, TaskError};
use crate::notifier::{Notifier, WeakNotifier};
use crate::observability::events;
use crate::registry::{ChannelListener, ListenerId};
use crate::task_status::TaskStatusReport;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info};

const COMPONENT: &str = "task_waiter";
const TASK_CHANNEL_PREFIX: &str = "tasks/";

/// Session used when the caller has none.
pub const ANONYMOUS_SESSION: &str = "anonymous";

pub type TaskOutcome = Result<Value, TaskError>;

pub fn task_channel(task_id: &str) -> String {
    format!("{TASK_CHANNEL_PREFIX}{task_id}")
}

/// Settlement state shared by the listener, the handle and its cancel tokens.
struct Slot {
    sender: Option<oneshot::Sender<TaskOutcome>>,
    listener_id: Option<ListenerId>,
}

type SharedSlot = Arc<Mutex<Slot>>;

/// Takes the sender out of `slot`; only the first caller gets it.
async fn claim(slot: &SharedSlot) -> Option<(oneshot::Sender<TaskOutcome>, Option<ListenerId>)> {
    let mut slot = slot.lock().await;
    let sender = slot.sender.take()?;
    Some((sender, slot.listener_id.clone()))
}

fn deliver(task_id: &str, sender: oneshot::Sender<TaskOutcome>, outcome: TaskOutcome) {
    info!(
        event = events::TASK_SETTLED,
        component = COMPONENT,
        task_id,
        ok = outcome.is_ok(),
        "task wait settled"
    );
    // the handle may already be gone
    let _ = sender.send(outcome);
}

struct TaskListener {
    task_id: String,
    channel: String,
    notifier: WeakNotifier,
    slot: SharedSlot,
}

#[async_trait]
impl ChannelListener for TaskListener {
    async fn on_message(&self, payload: Payload, version: u64) {
        if version == 0 {
            debug!(
                event = events::TASK_PRIMING_IGNORED,
                component = COMPONENT,
                task_id = self.task_id.as_str(),
                "ignoring priming message"
            );
            return;
        }
        let Some((sender, listener_id)) = claim(&self.slot).await else {
            return;
        };

        if let (Some(notifier), Some(id)) = (self.notifier.upgrade(), listener_id) {
            notifier.unsubscribe(&self.channel, Some(&id)).await;
        }
        let outcome = TaskStatusReport::from_payload(&payload).into_result();
        deliver(&self.task_id, sender, outcome);
    }

    async fn on_error(&self, err: ClientError) {
        let Some((sender, _)) = claim(&self.slot).await else {
            return;
        };
        let outcome = match err {
            ClientError::ShuttingDown => Err(TaskError::ShuttingDown),
            source => Err(TaskError::StatusCheckFailed {
                task_id: self.task_id.clone(),
                source,
            }),
        };
        deliver(&self.task_id, sender, outcome);
    }
}

/// Waits for server tasks over the shared [`Notifier`].
#[derive(Clone)]
pub struct TaskWaiter {
    notifier: Notifier,
}

impl TaskWaiter {
    pub fn new(notifier: Notifier) -> Self {
        Self { notifier }
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Subscribes to `tasks/<task_id>` and returns a handle that settles once the task
    /// reaches a terminal state.
    pub async fn await_task(
        &self,
        task_id: &str,
        session: Option<&str>,
    ) -> Result<TaskHandle, ClientError> {
        let session = session.unwrap_or(ANONYMOUS_SESSION);
        let channel = task_channel(task_id);
        self.notifier.connect(session).await?;

        let (sender, receiver) = oneshot::channel();
        let slot = Arc::new(Mutex::new(Slot {
            sender: Some(sender),
            listener_id: None,
        }));
        let listener = Arc::new(TaskListener {
            task_id: task_id.to_string(),
            channel: channel.clone(),
            notifier: self.notifier.downgrade(),
            slot: slot.clone(),
        });

        debug!(
            event = events::TASK_WAIT_START,
            component = COMPONENT,
            task_id,
            channel = channel.as_str(),
            "waiting for task"
        );
        let listener_id = self
            .notifier
            .subscribe_auth_last(&channel, listener, session)
            .await?;

        let settled_early = {
            let mut slot = slot.lock().await;
            slot.listener_id = Some(listener_id.clone());
            slot.sender.is_none()
        };
        if settled_early {
            self.notifier.unsubscribe(&channel, Some(&listener_id)).await;
        }

        Ok(TaskHandle {
            cancel: TaskCancel {
                task_id: task_id.to_string(),
                channel,
                notifier: self.notifier.clone(),
                slot,
            },
            receiver,
        })
    }
}

/// Cancels one task wait; cheap to clone and usable from any task.
#[derive(Clone)]
pub struct TaskCancel {
    task_id: String,
    channel: String,
    notifier: Notifier,
    slot: SharedSlot,
}

impl TaskCancel {
    /// Drops the subscription and settles the wait with [`TaskError::Cancelled`].
    /// No-op once the wait has settled.
    pub async fn cancel(&self) {
        self.settle(TaskError::Cancelled).await;
    }

    async fn settle(&self, err: TaskError) {
        let Some((sender, listener_id)) = claim(&self.slot).await else {
            return;
        };
        if let Some(id) = listener_id {
            self.notifier.unsubscribe(&self.channel, Some(&id)).await;
        }
        debug!(
            event = events::TASK_CANCELLED,
            component = COMPONENT,
            task_id = self.task_id.as_str(),
            reason = %err,
            "task wait cancelled"
        );
        deliver(&self.task_id, sender, Err(err));
    }
}

/// Pending completion of one task.
pub struct TaskHandle {
    cancel: TaskCancel,
    receiver: oneshot::Receiver<TaskOutcome>,
}

impl TaskHandle {
    pub fn task_id(&self) -> &str {
        &self.cancel.task_id
    }

    pub fn channel(&self) -> &str {
        &self.cancel.channel
    }

    pub fn cancel_token(&self) -> TaskCancel {
        self.cancel.clone()
    }

    /// Resolves with the task result or rejects with the task error.
    pub async fn wait(self) -> TaskOutcome {
        self.receiver.await.unwrap_or(Err(TaskError::ShuttingDown))
    }

    pub async fn cancel(self) -> TaskOutcome {
        self.cancel.cancel().await;
        self.wait().await
    }

    /// Like [`TaskHandle::wait`], cancelling the wait after `timeout`.
    pub async fn wait_timeout(self, timeout: Duration) -> TaskOutcome {
        let TaskHandle {
            cancel,
            mut receiver,
        } = self;
        match tokio::time::timeout(timeout, &mut receiver).await {
            Ok(outcome) => outcome.unwrap_or(Err(TaskError::ShuttingDown)),
            Err(_) => {
                cancel.settle(TaskError::TimedOut).await;
                receiver.await.unwrap_or(Err(TaskError::TimedOut))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{task_channel, TaskWaiter};
    use crate::config::NotificationConfig;
    use crate::driver::{NotificationSocket, SocketConnector};
    use crate::error::{ClientError, TaskError};
    use crate::notifier::Notifier;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    struct Offline;

    #[async_trait]
    impl SocketConnector for Offline {
        async fn connect(&self, _url: &str) -> Result<Box<dyn NotificationSocket>, ClientError> {
            Err(ClientError::Connection("offline".to_string()))
        }
    }

    fn waiter() -> TaskWaiter {
        TaskWaiter::new(Notifier::new(
            NotificationConfig::new("http://localhost:9"),
            Arc::new(Offline),
        ))
    }

    #[test]
    fn channel_names_follow_task_ids() {
        assert_eq!(task_channel("t1"), "tasks/t1");
    }

    fn frame(version: u64, body: &str) -> String {
        format!("tasks/t1\n{version}\n{body}")
    }

    #[tokio::test]
    async fn first_real_message_settles_and_unsubscribes() {
        let waiter = waiter();
        let handle = waiter.await_task("t1", Some("s")).await.unwrap();
        let notifier = waiter.notifier().clone();

        notifier
            .handle_message(&frame(0, r#"{"status":"ERROR","errorMessage":"stale"}"#))
            .await;
        assert!(notifier.has_channel("tasks/t1").await);

        notifier
            .handle_message(&frame(1, r#"{"status":"COMPLETED","result":"ok"}"#))
            .await;
        notifier
            .handle_message(&frame(2, r#"{"status":"ERROR","errorMessage":"late"}"#))
            .await;

        assert_eq!(handle.wait().await, Ok(json!("ok")));
        assert!(!notifier.has_channel("tasks/t1").await);
    }

    #[tokio::test]
    async fn anonymous_session_is_used_by_default() {
        let waiter = waiter();
        let _handle = waiter.await_task("t2", None).await.unwrap();

        // AUTH is recorded for the open handshake; only the AUTHSUB is queued
        assert_eq!(waiter.notifier().pending_len().await, 1);
    }

    #[tokio::test]
    async fn cancel_settles_and_tears_down() {
        let waiter = waiter();
        let handle = waiter.await_task("t3", Some("s")).await.unwrap();

        assert_eq!(handle.cancel().await, Err(TaskError::Cancelled));
        assert!(!waiter.notifier().has_channel("tasks/t3").await);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_timeout_gives_up() {
        let waiter = waiter();
        let handle = waiter.await_task("t4", Some("s")).await.unwrap();

        let outcome = handle.wait_timeout(Duration::from_secs(30)).await;

        assert_eq!(outcome, Err(TaskError::TimedOut));
        assert!(!waiter.notifier().has_channel("tasks/t4").await);
        waiter.notifier().shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_rejects_pending_waits() {
        let waiter = waiter();
        let handle = waiter.await_task("t5", Some("s")).await.unwrap();

        waiter.notifier().shutdown().await;

        assert_eq!(handle.wait().await, Err(TaskError::ShuttingDown));
    }
}
