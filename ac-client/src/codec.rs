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

//! Payload decoding for data frames: base64 + gzip inflate, then best-effort JSON.

use crate::error::ClientError;
use crate::observability::events;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::read::GzDecoder;
use serde_json::Value;
use std::io::Read;
use std::sync::Arc;
use tracing::warn;

const COMPONENT: &str = "codec";
const INFLATE_CHUNK_SIZE: usize = 16 * 1024;
const NULL_SENTINEL: &str = "null";

/// Decoded payload handed to channel listeners.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    /// No data: the `null` sentinel or a payload that failed to decompress.
    Null,
    Json(Value),
    /// Raw text, including text that looked like JSON but did not parse.
    Text(String),
}

impl Payload {
    pub fn is_null(&self) -> bool {
        matches!(self, Payload::Null)
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(value) => Some(value),
            _ => None,
        }
    }
}

/// Inflate capability, selected once at startup.
pub trait Inflate: Send + Sync {
    fn inflate(&self, compressed: &[u8]) -> Result<Vec<u8>, ClientError>;
}

/// Standard gzip inflater backed by `flate2`.
#[derive(Clone, Copy, Debug, Default)]
pub struct GzipInflate;

impl Inflate for GzipInflate {
    fn inflate(&self, compressed: &[u8]) -> Result<Vec<u8>, ClientError> {
        let mut decoder = GzDecoder::new(compressed);
        let mut inflated = Vec::new();
        let mut chunk = vec![0u8; INFLATE_CHUNK_SIZE];
        loop {
            let read = decoder
                .read(&mut chunk)
                .map_err(|e| ClientError::Decompress(e.to_string()))?;
            if read == 0 {
                break;
            }
            inflated.extend_from_slice(&chunk[..read]);
        }
        Ok(inflated)
    }
}

/// Returns the inflater for the current target.
pub fn default_inflate() -> Arc<dyn Inflate> {
    Arc::new(GzipInflate)
}

/// Decodes base64 text and inflates it; `None` when either step fails.
pub fn decompress_text(encoded: &str, inflate: &dyn Inflate) -> Option<String> {
    let compressed = match STANDARD.decode(encoded.trim()) {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(
                event = events::PAYLOAD_DECOMPRESS_FAILED,
                component = COMPONENT,
                err = %err,
                "compressed payload is not valid base64"
            );
            return None;
        }
    };

    match inflate.inflate(&compressed) {
        Ok(plain) => Some(bytes_to_text(plain)),
        Err(err) => {
            warn!(
                event = events::PAYLOAD_DECOMPRESS_FAILED,
                component = COMPONENT,
                err = %err,
                "unable to inflate payload"
            );
            None
        }
    }
}

// Non UTF-8 output is mapped one byte per char.
fn bytes_to_text(plain: Vec<u8>) -> String {
    match String::from_utf8(plain) {
        Ok(text) => text,
        Err(err) => {
            let bytes = err.into_bytes();
            let mut text = String::with_capacity(bytes.len());
            for byte in bytes {
                text.push(char::from(byte));
            }
            text
        }
    }
}

/// Turns the raw payload of a data frame into a [`Payload`].
pub fn decode_payload(compressed: bool, raw: &str, inflate: &dyn Inflate) -> Payload {
    let text = if compressed {
        match decompress_text(raw, inflate) {
            Some(text) => text,
            None => return Payload::Null,
        }
    } else {
        raw.to_string()
    };

    if text.starts_with('{') {
        match serde_json::from_str::<Value>(&text) {
            Ok(value) => Payload::Json(value),
            Err(_) => Payload::Text(text),
        }
    } else if text == NULL_SENTINEL {
        Payload::Null
    } else {
        Payload::Text(text)
    }
}
