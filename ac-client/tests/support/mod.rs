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

use ac_client::{NotificationConfig, Notifier};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::write::GzEncoder;
use flate2::Compression;
use integration_test_utils::FakeConnector;
use std::io::Write;
use std::sync::Arc;

pub(crate) const NOTIFY_URL: &str = "http://notify.test/";

pub(crate) fn make_notifier(connector: Arc<FakeConnector>) -> Notifier {
    Notifier::new(NotificationConfig::new(NOTIFY_URL), connector)
}

pub(crate) fn data_frame(channel: &str, version: u64, body: &str) -> String {
    format!("{channel}\n{version}\n{body}")
}

#[allow(dead_code)]
pub(crate) fn gzip_frame(channel: &str, version: u64, body: &str) -> String {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(body.as_bytes()).unwrap();
    let encoded = STANDARD.encode(encoder.finish().unwrap());
    format!("{channel}\n{version}\nGZIP\n{encoded}")
}
