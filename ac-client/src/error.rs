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

//! Error taxonomy shared by the notification channel, the waiters and the RPC transport.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Connection, protocol and transport level failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The duplex notification socket failed or closed.
    Connection(String),
    /// An inbound frame could not be decoded.
    Protocol(String),
    /// A compressed payload could not be inflated.
    Decompress(String),
    /// The HTTP request could not be delivered.
    Transport(String),
    /// The server answered with a non-200 status.
    Server { status: u16, body: String },
    /// The server answered with an unparsable envelope.
    Decode(String),
    /// The server answered with `code != 1`.
    Request(String),
    /// Configuration was missing or invalid.
    Config(String),
    /// The notifier was shut down while the operation was pending.
    ShuttingDown,
}

impl Display for ClientError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Connection(msg) => write!(f, "connection error: {msg}"),
            ClientError::Protocol(msg) => write!(f, "protocol error: {msg}"),
            ClientError::Decompress(msg) => write!(f, "decompression failed: {msg}"),
            ClientError::Transport(msg) => write!(f, "request to server failed: {msg}"),
            ClientError::Server { status, body } => {
                write!(f, "server error (status {status}): {body}")
            }
            ClientError::Decode(msg) => write!(f, "parse error: {msg}"),
            ClientError::Request(msg) => write!(f, "{msg}"),
            ClientError::Config(msg) => write!(f, "invalid configuration: {msg}"),
            ClientError::ShuttingDown => write!(f, "notifier is shutting down"),
        }
    }
}

impl Error for ClientError {}

/// Task-level outcomes that are not a successful completion.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskError {
    /// The server reported `status: ERROR`; carries `errorMessage` verbatim.
    Failed(String),
    /// The server reported a status this client does not understand.
    UnknownStatus(String),
    /// A status-check RPC failed while polling.
    StatusCheckFailed { task_id: String, source: ClientError },
    /// The caller cancelled the wait.
    Cancelled,
    /// The caller-supplied deadline elapsed before a terminal state.
    TimedOut,
    /// Polling gave up after the configured attempt bound.
    AttemptsExhausted { task_id: String, attempts: u32 },
    /// The notifier shut down before the task finished.
    ShuttingDown,
}

impl Display for TaskError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskError::Failed(message) => {
                write!(f, "getTaskStatus returned an error: {message}")
            }
            TaskError::UnknownStatus(status) => write!(f, "Unknown response status: {status}"),
            TaskError::StatusCheckFailed { task_id, source } => {
                write!(f, "getTaskStatus failed for: {task_id}: {source}")
            }
            TaskError::Cancelled => write!(f, "task wait cancelled"),
            TaskError::TimedOut => write!(f, "task wait timed out"),
            TaskError::AttemptsExhausted { task_id, attempts } => {
                write!(f, "task {task_id} still processing after {attempts} status checks")
            }
            TaskError::ShuttingDown => write!(f, "notifier is shutting down"),
        }
    }
}

impl Error for TaskError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TaskError::StatusCheckFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}
