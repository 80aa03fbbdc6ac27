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

//! Polling fallback for task completion, used where no notification channel exists.

use crate::config::PollingConfig;
use crate::error::TaskError;
use crate::observability::events;
use crate::task_status::get_task_status;
use crate::transport::RpcTransport;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

const COMPONENT: &str = "task_poller";

/// Polls `TaskManager.getTaskStatus` until a task leaves `PROCESSING`.
#[derive(Clone)]
pub struct TaskPoller {
    transport: Arc<dyn RpcTransport>,
    config: PollingConfig,
}

impl TaskPoller {
    pub fn new(transport: Arc<dyn RpcTransport>, config: PollingConfig) -> Self {
        Self { transport, config }
    }

    pub async fn poll_task(&self, task_id: &str, session: Option<&str>) -> Result<Value, TaskError> {
        let mut attempts: u32 = 0;

        loop {
            attempts = attempts.saturating_add(1);
            debug!(
                event = events::POLL_ATTEMPT,
                component = COMPONENT,
                task_id,
                attempt = attempts,
                "checking task status"
            );

            let report = match get_task_status(self.transport.as_ref(), task_id, session).await {
                Ok(report) => report,
                Err(source) => {
                    warn!(
                        event = events::POLL_FAILED,
                        component = COMPONENT,
                        task_id,
                        err = %source,
                        "status check failed"
                    );
                    return Err(TaskError::StatusCheckFailed {
                        task_id: task_id.to_string(),
                        source,
                    });
                }
            };

            if !report.is_processing() {
                let outcome = report.into_result();
                info!(
                    event = events::TASK_SETTLED,
                    component = COMPONENT,
                    task_id,
                    attempts,
                    ok = outcome.is_ok(),
                    "task finished"
                );
                return outcome;
            }

            if self.config.max_attempts.is_some_and(|max| attempts >= max) {
                return Err(TaskError::AttemptsExhausted {
                    task_id: task_id.to_string(),
                    attempts,
                });
            }

            debug!(
                event = events::POLL_PROCESSING,
                component = COMPONENT,
                task_id,
                delay_ms = self.config.interval_ms,
                "task still processing"
            );
            tokio::time::sleep(self.config.interval()).await;
        }
    }
}
