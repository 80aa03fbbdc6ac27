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

use ac_client::{ClientError, RpcRequest, RpcTransport};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// One call seen by [`ScriptedTransport`].
#[derive(Clone, Debug)]
pub struct RecordedCall {
    pub request: RpcRequest,
    pub signed: bool,
    pub at: Instant,
}

/// RPC transport that answers from a script and records every call.
///
/// Once the script runs out every call reports `PROCESSING`.
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<Value, ClientError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<Result<Value, ClientError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Script of `getTaskStatus` replies with the given statuses; the last one
    /// carries `result`.
    pub fn task_statuses(statuses: &[&str], result: Value) -> Self {
        let count = statuses.len();
        let replies = statuses
            .iter()
            .enumerate()
            .map(|(i, status)| {
                if i + 1 == count {
                    Ok(json!({ "status": status, "result": result }))
                } else {
                    Ok(json!({ "status": status }))
                }
            })
            .collect();
        Self::new(replies)
    }

    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().await.clone()
    }

    async fn answer(&self, request: RpcRequest, signed: bool) -> Result<Value, ClientError> {
        debug!("scripted transport: {}.{}", request.object, request.method);
        self.calls.lock().await.push(RecordedCall {
            request,
            signed,
            at: Instant::now(),
        });
        self.replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(json!({ "status": "PROCESSING" })))
    }
}

#[async_trait]
impl RpcTransport for ScriptedTransport {
    async fn request(&self, request: RpcRequest) -> Result<Value, ClientError> {
        self.answer(request, false).await
    }

    async fn signed(&self, request: RpcRequest) -> Result<Value, ClientError> {
        self.answer(request, true).await
    }
}
