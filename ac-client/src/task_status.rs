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

use crate::codec::Payload;
use crate::error::{ClientError, TaskError};
use crate::transport::{RpcRequest, RpcTransport};
use serde::Deserialize;
use serde_json::{json, Value};

pub const STATUS_COMPLETED: &str = "COMPLETED";
pub const STATUS_ERROR: &str = "ERROR";
pub const STATUS_PROCESSING: &str = "PROCESSING";

const TASK_MANAGER: &str = "TaskManager";
const GET_TASK_STATUS: &str = "getTaskStatus";

/// Status record of a server-side task, as pushed on `tasks/<id>` or returned by
/// `TaskManager.getTaskStatus`.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusReport {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub error_message: Option<Value>,
}

impl TaskStatusReport {
    /// Reads a report out of a pushed payload. Anything that is not a JSON object
    /// with a status yields an empty status.
    pub fn from_payload(payload: &Payload) -> Self {
        payload
            .as_json()
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_default()
    }

    pub fn is_processing(&self) -> bool {
        self.status == STATUS_PROCESSING
    }

    /// Terminal outcome of this report; every status but `COMPLETED` is an error.
    pub fn into_result(self) -> Result<Value, TaskError> {
        match self.status.as_str() {
            STATUS_COMPLETED => Ok(self.result),
            STATUS_ERROR => Err(TaskError::Failed(render_message(self.error_message))),
            _ => Err(TaskError::UnknownStatus(self.status)),
        }
    }
}

// Strings are kept verbatim; any other JSON value is rendered as text.
fn render_message(message: Option<Value>) -> String {
    match message {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text,
        Some(other) => other.to_string(),
    }
}

/// `TaskManager.getTaskStatus {id}`.
pub async fn get_task_status(
    transport: &dyn RpcTransport,
    task_id: &str,
    session: Option<&str>,
) -> Result<TaskStatusReport, ClientError> {
    let mut request = RpcRequest::new(TASK_MANAGER, GET_TASK_STATUS).with_data(json!({ "id": task_id }));
    if let Some(session) = session {
        request = request.with_param("session_id", session);
    }
    let response = transport.request(request).await?;
    serde_json::from_value(response).map_err(|e| ClientError::Decode(e.to_string()))
}
