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

use crate::error::ClientError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use url::Url;

const DEFAULT_PORT: u16 = 80;
const DEFAULT_PATH: &str = "/api";
const DEFAULT_SOCKET_PATH: &str = "p/websocket";
const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
const DEFAULT_RECONNECT_MIN_DELAY_MS: u64 = 500;
const DEFAULT_RECONNECT_MAX_DELAY_MS: u64 = 5000;
const DEFAULT_RECONNECT_FACTOR: u32 = 2;

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Fallback server used when `use_origin` is set and the session names none.
    #[serde(default)]
    pub origin: Option<String>,
    pub hostname: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_path")]
    pub path: String,
    /// Route requests to the per-session server (or `origin`) instead of `hostname`.
    #[serde(default)]
    pub use_origin: bool,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default)]
    pub ns: Option<NotificationConfig>,
    #[serde(default)]
    pub polling: PollingConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct NotificationConfig {
    pub url: String,
    /// Path of the duplex endpoint relative to `url`.
    #[serde(default = "default_socket_path")]
    pub socket_path: String,
    /// Extra query parameters sent when opening the socket.
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ReconnectConfig {
    #[serde(default = "default_reconnect_min_delay_ms")]
    pub min_delay_ms: u64,
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_reconnect_factor")]
    pub factor: u32,
    /// Omitted means retry forever.
    #[serde(default)]
    pub max_retries: Option<u32>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PollingConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,
    /// Omitted means poll until a terminal state.
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_path() -> String {
    DEFAULT_PATH.to_string()
}

fn default_socket_path() -> String {
    DEFAULT_SOCKET_PATH.to_string()
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_reconnect_min_delay_ms() -> u64 {
    DEFAULT_RECONNECT_MIN_DELAY_MS
}

fn default_reconnect_max_delay_ms() -> u64 {
    DEFAULT_RECONNECT_MAX_DELAY_MS
}

fn default_reconnect_factor() -> u32 {
    DEFAULT_RECONNECT_FACTOR
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: DEFAULT_RECONNECT_MIN_DELAY_MS,
            max_delay_ms: DEFAULT_RECONNECT_MAX_DELAY_MS,
            factor: DEFAULT_RECONNECT_FACTOR,
            max_retries: None,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_attempts: None,
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl NotificationConfig {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            socket_path: default_socket_path(),
            params: BTreeMap::new(),
            reconnect: ReconnectConfig::default(),
        }
    }

    /// Full socket URL: `url` joined with `socket_path`, plus `params` as query.
    pub fn socket_url(&self) -> Result<String, ClientError> {
        let mut base = Url::parse(&self.url)
            .map_err(|e| ClientError::Config(format!("invalid ns.url {:?}: {e}", self.url)))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let mut socket = base.join(&self.socket_path).map_err(|e| {
            ClientError::Config(format!("invalid ns.socket_path {:?}: {e}", self.socket_path))
        })?;
        let scheme = match socket.scheme() {
            "http" => Some("ws"),
            "https" => Some("wss"),
            _ => None,
        };
        if let Some(scheme) = scheme {
            socket
                .set_scheme(scheme)
                .map_err(|_| ClientError::Config(format!("cannot use scheme {scheme}")))?;
        }
        if !self.params.is_empty() {
            socket.query_pairs_mut().extend_pairs(self.params.iter());
        }
        Ok(socket.to_string())
    }
}

impl ClientConfig {
    pub fn from_json5_str(contents: &str) -> Result<Self, ClientError> {
        json5::from_str(contents)
            .map_err(|e| ClientError::Config(format!("Unable to parse config file: {e:?}")))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ClientError::Config(format!(
                "Unable to read config file {:?}: {e:?}",
                path.as_ref()
            ))
        })?;
        Self::from_json5_str(&contents)
    }

    pub fn notification(&self) -> Result<&NotificationConfig, ClientError> {
        self.ns
            .as_ref()
            .ok_or_else(|| ClientError::Config("missing ns section".to_string()))
    }
}
