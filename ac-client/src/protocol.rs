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

//! Line-oriented wire protocol spoken over the notification channel.
//!
//! Outbound control lines are built from [`Command`] and inbound frames are parsed into
//! [`Inbound`]; no other module assembles or splits protocol text.

use crate::error::ClientError;
use std::fmt::{Display, Formatter};

const AUTH_VERB: &str = "AUTH";
const SUB_VERB: &str = "SUB";
const AUTHSUB_VERB: &str = "AUTHSUB";
const UNSUB_VERB: &str = "UNSUB";
const SUBSCRIBED_VERB: &str = "SUBSCRIBED";
const GZIP_MARKER: &str = "GZIP";

/// Replay position requested when subscribing to a channel.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SubscribeParams {
    /// Every retained message.
    All,
    /// Only the most recent message.
    Last,
    /// Every message starting at the given version.
    From(u64),
}

impl Display for SubscribeParams {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscribeParams::All => write!(f, "ALL"),
            SubscribeParams::Last => write!(f, "LAST"),
            SubscribeParams::From(version) => write!(f, "FROM {version}"),
        }
    }
}

/// Outbound control message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Command {
    Auth {
        session: String,
    },
    Subscribe {
        channel: String,
        params: Option<SubscribeParams>,
        token: Option<String>,
    },
    Unsubscribe {
        channel: String,
    },
}

impl Command {
    /// Serializes the command into its wire line.
    pub fn encode(&self) -> String {
        match self {
            Command::Auth { session } => format!("{AUTH_VERB} {session}"),
            Command::Subscribe {
                channel,
                params,
                token,
            } => {
                let params = params
                    .as_ref()
                    .map(|params| format!(" {params}"))
                    .unwrap_or_default();
                match token {
                    Some(token) => format!("{AUTHSUB_VERB} {token} {channel}{params}"),
                    None => format!("{SUB_VERB} {channel}{params}"),
                }
            }
            Command::Unsubscribe { channel } => format!("{UNSUB_VERB} {channel}"),
        }
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Inbound frame received from the notification channel.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Inbound {
    /// `SUBSCRIBED <channel> <version>` acknowledgement.
    Ack { channel: String, version: u64 },
    /// Data push for a channel; `payload` is still encoded when `compressed` is set.
    Data {
        channel: String,
        version: u64,
        compressed: bool,
        payload: String,
    },
}

impl Inbound {
    /// Parses one raw frame.
    pub fn parse(raw: &str) -> Result<Self, ClientError> {
        if raw.starts_with(SUBSCRIBED_VERB) {
            Self::parse_ack(raw)
        } else {
            Self::parse_data(raw)
        }
    }

    fn parse_ack(raw: &str) -> Result<Self, ClientError> {
        let mut parts: Vec<&str> = raw.split(' ').collect();
        let version = parts
            .pop()
            .ok_or_else(|| ClientError::Protocol(format!("empty acknowledgement: {raw:?}")))?;
        let version = parse_version(version)?;
        if parts.is_empty() {
            return Err(ClientError::Protocol(format!(
                "acknowledgement without channel: {raw:?}"
            )));
        }
        // channel ids may themselves contain spaces
        let channel = parts[1..].join(" ");

        Ok(Inbound::Ack { channel, version })
    }

    fn parse_data(raw: &str) -> Result<Self, ClientError> {
        let mut lines = raw.split('\n');
        let channel = lines.next().unwrap_or_default().to_string();
        let version = lines
            .next()
            .ok_or_else(|| ClientError::Protocol(format!("data frame without version: {raw:?}")))?;
        let version = parse_version(version)?;

        let mut rest: Vec<&str> = lines.collect();
        let compressed = rest.first() == Some(&GZIP_MARKER);
        if compressed {
            rest.remove(0);
        }

        Ok(Inbound::Data {
            channel,
            version,
            compressed,
            payload: rest.join("\n"),
        })
    }

    pub fn channel(&self) -> &str {
        match self {
            Inbound::Ack { channel, .. } | Inbound::Data { channel, .. } => channel,
        }
    }

    pub fn version(&self) -> u64 {
        match self {
            Inbound::Ack { version, .. } | Inbound::Data { version, .. } => *version,
        }
    }
}

fn parse_version(raw: &str) -> Result<u64, ClientError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|e| ClientError::Protocol(format!("invalid version {raw:?}: {e}")))
}
