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

mod fake_socket;
pub use fake_socket::{
    fake_notification_server, FakeConnection, FakeConnector, FakeServer, WAIT_TIMEOUT,
};
mod recording_listener;
pub use recording_listener::RecordingListener;
mod scripted_transport;
pub use scripted_transport::{RecordedCall, ScriptedTransport};

use tracing_subscriber::EnvFilter;

/// Installs a test-friendly tracing subscriber; later calls are no-ops.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
