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

//! # ac-client
//!
//! Client side of the server's long-running task protocol.
//!
//! Work submitted over RPC is acknowledged with a task id; its completion arrives later
//! either as a push on the notification channel `tasks/<id>` ([`TaskWaiter`]) or by
//! polling `TaskManager.getTaskStatus` ([`TaskPoller`]).
//!
//! One [`Notifier`] is shared by every push waiter in the process. It owns the socket,
//! queues writes while offline, reconnects with capped backoff and replays every
//! subscription from the last version it saw.
//!
//! ```no_run
//! use ac_client::{ClientConfig, Notifier, TaskWaiter};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::from_file("client.json5")?;
//! let notifier = Notifier::from_config(config.notification()?.clone());
//! let waiter = TaskWaiter::new(notifier.clone());
//!
//! let handle = waiter.await_task("42", Some("session-key")).await?;
//! let result = handle.wait().await?;
//! println!("{result}");
//!
//! notifier.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
mod connection;
pub mod driver;
mod error;
pub mod notifier;
pub mod observability;
pub mod poller;
pub mod protocol;
pub mod registry;
pub mod task_status;
pub mod task_waiter;
pub mod transport;

pub use codec::{default_inflate, GzipInflate, Inflate, Payload};
pub use config::{ClientConfig, NotificationConfig, PollingConfig, ReconnectConfig};
pub use connection::ConnectionStatus;
pub use driver::{BackoffPolicy, NotificationSocket, SocketConnector, WebSocketConnector};
pub use error::{ClientError, TaskError};
pub use notifier::Notifier;
pub use poller::TaskPoller;
pub use protocol::{Command, Inbound, SubscribeParams};
pub use registry::{ChannelListener, ListenerId};
pub use task_status::{get_task_status, TaskStatusReport};
pub use task_waiter::{TaskCancel, TaskHandle, TaskOutcome, TaskWaiter, ANONYMOUS_SESSION};
pub use transport::{HttpTransport, RpcRequest, RpcTransport};
