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

use ac_client::{
    ClientConfig, HttpTransport, Notifier, TaskError, TaskOutcome, TaskPoller, TaskWaiter,
};
use clap::Parser;
use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

const COMPONENT: &str = "ac_task_watch";

#[derive(Parser)]
#[command(about = "Wait for a server task to reach a terminal state")]
struct WatchArgs {
    #[arg(short, long, value_name = "FILE")]
    config: String,
    #[arg(short, long, value_name = "TASK_ID")]
    task: String,
    #[arg(short, long)]
    session: Option<String>,
    /// Poll getTaskStatus instead of listening on the notification channel.
    #[arg(long)]
    poll: bool,
    /// Give up after this many seconds (push mode only).
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = tracing_subscriber::fmt::try_init();

    let args = WatchArgs::parse();
    info!(component = COMPONENT, task_id = args.task.as_str(), poll = args.poll, "started");

    match run(&args).await {
        Ok(result) => match serde_json::to_string_pretty(&result) {
            Ok(text) => {
                println!("{text}");
                ExitCode::SUCCESS
            }
            Err(err) => {
                error!(component = COMPONENT, err = %err, "unable to print result");
                ExitCode::FAILURE
            }
        },
        Err(err) => {
            error!(component = COMPONENT, task_id = args.task.as_str(), err = %err, "task did not complete");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &WatchArgs) -> Result<serde_json::Value, Box<dyn Error>> {
    let config = ClientConfig::from_file(&args.config)?;

    if args.poll {
        let poller = TaskPoller::new(
            Arc::new(HttpTransport::new(config.clone())),
            config.polling.clone(),
        );
        let outcome = tokio::select! {
            outcome = poller.poll_task(&args.task, args.session.as_deref()) => outcome,
            _ = tokio::signal::ctrl_c() => Err(TaskError::Cancelled),
        };
        return Ok(outcome?);
    }

    let notifier = Notifier::from_config(config.notification()?.clone());
    let outcome = watch(&notifier, args).await;
    notifier.shutdown().await;
    Ok(outcome?)
}

async fn watch(notifier: &Notifier, args: &WatchArgs) -> Result<serde_json::Value, Box<dyn Error>> {
    let waiter = TaskWaiter::new(notifier.clone());
    let handle = waiter
        .await_task(&args.task, args.session.as_deref())
        .await?;
    let cancel = handle.cancel_token();

    let wait = async move {
        match args.timeout {
            Some(seconds) => handle.wait_timeout(Duration::from_secs(seconds)).await,
            None => handle.wait().await,
        }
    };
    let outcome: TaskOutcome = tokio::select! {
        outcome = wait => outcome,
        _ = tokio::signal::ctrl_c() => {
            cancel.cancel().await;
            Err(TaskError::Cancelled)
        }
    };
    Ok(outcome?)
}
