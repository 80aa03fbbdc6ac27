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

//! Request/response RPC to the application server.
//!
//! Every call is a form POST whose single `acrequest` field carries the JSON envelope
//! `{object, method, data, params}`. Successful replies look like
//! `{"code": 1, "response": ...}`.

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::observability::events;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use reqwest::header::COOKIE;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha1::Sha1;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};
use url::Url;

const COMPONENT: &str = "rpc_transport";
const ENVELOPE_FIELD: &str = "acrequest";
const SESSION_PARAM: &str = "session_id";
const ANONYMOUS_COOKIE: &str = "crafted_anonymous";
const DEFAULT_REQUEST_ERROR: &str = "Request error";
const HTTPS_PORT: u16 = 443;
const HTTP_PORT: u16 = 80;

pub const PROVIDER_HEADER: &str = "X-AC-Provider";
pub const TIMESTAMP_HEADER: &str = "X-AC-Timestamp";
pub const SIGNATURE_HEADER: &str = "X-AC-Signature";

type HmacSha1 = Hmac<Sha1>;

/// One RPC call: `method` on server object `object`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RpcRequest {
    pub object: String,
    pub method: String,
    pub data: Value,
    pub params: Map<String, Value>,
}

impl RpcRequest {
    pub fn new(object: &str, method: &str) -> Self {
        Self {
            object: object.to_string(),
            method: method.to_string(),
            data: Value::Object(Map::new()),
            params: Map::new(),
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    /// Serialized `acrequest` envelope.
    pub fn envelope(&self) -> Result<String, ClientError> {
        serde_json::to_string(self).map_err(|e| ClientError::Decode(e.to_string()))
    }
}

/// Carries RPC calls to the server.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn request(&self, request: RpcRequest) -> Result<Value, ClientError>;

    /// Same call, additionally carrying a provider signature.
    async fn signed(&self, request: RpcRequest) -> Result<Value, ClientError>;
}

/// Session details that may be packed as JSON into the `session_id` param.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    #[serde(default)]
    pub session: Option<String>,
    #[serde(default)]
    pub anon: Option<String>,
    #[serde(default)]
    pub server_url: Option<String>,
}

/// Unpacks a JSON-encoded `session_id` in place.
///
/// Plain session strings are left untouched. A packed session replaces the param
/// with its `session` field, or removes it when there is none.
pub fn unpack_session(params: &mut Map<String, Value>) -> SessionInfo {
    let Some(Value::String(raw)) = params.get(SESSION_PARAM) else {
        return SessionInfo::default();
    };
    let Ok(info) = serde_json::from_str::<SessionInfo>(raw) else {
        return SessionInfo::default();
    };

    match info.session.as_deref() {
        Some(session) if !session.is_empty() => {
            params.insert(SESSION_PARAM.to_string(), Value::String(session.to_string()));
        }
        _ => {
            params.remove(SESSION_PARAM);
        }
    }
    info
}

/// Endpoint for a call, honoring `use_origin`.
pub fn resolve_endpoint(config: &ClientConfig, server_url: Option<&str>) -> Result<Url, ClientError> {
    let mut host = config.hostname.clone();
    let mut port = config.port;

    if config.use_origin {
        if let Some(origin) = server_url.or(config.origin.as_deref()) {
            let origin = Url::parse(origin)
                .map_err(|e| ClientError::Config(format!("invalid server url {origin:?}: {e}")))?;
            host = origin
                .host_str()
                .ok_or_else(|| ClientError::Config(format!("server url without host: {origin}")))?
                .to_string();
            port = origin.port().unwrap_or(if origin.scheme() == "https" {
                HTTPS_PORT
            } else {
                HTTP_PORT
            });
        }
    }

    let scheme = if port == HTTPS_PORT { "https" } else { "http" };
    let raw = format!("{scheme}://{host}:{port}{}", config.path);
    Url::parse(&raw).map_err(|e| ClientError::Config(format!("invalid endpoint {raw:?}: {e}")))
}

/// base64(HMAC-SHA1(secret, timestamp + body + provider)).
pub fn sign(secret: &str, timestamp: &str, body: &str, provider: &str) -> Result<String, ClientError> {
    let mut mac = HmacSha1::new_from_slice(secret.as_bytes())
        .map_err(|e| ClientError::Config(format!("unusable secret key: {e}")))?;
    mac.update(timestamp.as_bytes());
    mac.update(body.as_bytes());
    mac.update(provider.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

#[derive(Deserialize)]
struct ResponseEnvelope {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    response: Option<Value>,
}

/// Maps an HTTP status and body to the call result.
pub fn interpret_response(status: u16, body: &str) -> Result<Value, ClientError> {
    if status != 200 {
        return Err(ClientError::Server {
            status,
            body: body.to_string(),
        });
    }

    let envelope: ResponseEnvelope =
        serde_json::from_str(body).map_err(|e| ClientError::Decode(e.to_string()))?;
    match (envelope.code, envelope.response) {
        (Some(1), Some(response)) if !response.is_null() => Ok(response),
        (_, response) => {
            let message = response
                .as_ref()
                .and_then(|r| r.get("message"))
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_REQUEST_ERROR);
            Err(ClientError::Request(message.to_string()))
        }
    }
}

struct Signature {
    provider: String,
    timestamp: String,
    value: String,
}

/// [`RpcTransport`] over HTTP(S).
#[derive(Clone)]
pub struct HttpTransport {
    config: ClientConfig,
    client: Client,
}

impl HttpTransport {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn signature_for(&self, envelope: &str) -> Result<Signature, ClientError> {
        let (Some(provider), Some(secret)) =
            (self.config.provider.as_deref(), self.config.secret_key.as_deref())
        else {
            return Err(ClientError::Config(
                "signed requests need provider and secret_key".to_string(),
            ));
        };
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| ClientError::Config(e.to_string()))?
            .as_millis()
            .to_string();
        let value = sign(secret, &timestamp, envelope, provider)?;
        Ok(Signature {
            provider: provider.to_string(),
            timestamp,
            value,
        })
    }

    async fn send(&self, mut request: RpcRequest, signed: bool) -> Result<Value, ClientError> {
        let session = unpack_session(&mut request.params);
        let endpoint = resolve_endpoint(&self.config, session.server_url.as_deref())?;
        let envelope = request.envelope()?;

        debug!(
            event = events::RPC_REQUEST,
            component = COMPONENT,
            object = request.object.as_str(),
            method = request.method.as_str(),
            endpoint = %endpoint,
            signed,
            "sending rpc request"
        );

        let mut builder = self
            .client
            .post(endpoint)
            .form(&[(ENVELOPE_FIELD, envelope.as_str())]);
        if let Some(anon) = session.anon.as_deref() {
            builder = builder.header(COOKIE, format!("{ANONYMOUS_COOKIE}={anon}"));
        }
        if signed {
            let signature = self.signature_for(&envelope)?;
            builder = builder
                .header(PROVIDER_HEADER, signature.provider)
                .header(TIMESTAMP_HEADER, signature.timestamp)
                .header(SIGNATURE_HEADER, signature.value);
        }

        let result = async {
            let response = builder
                .send()
                .await
                .map_err(|e| ClientError::Transport(e.to_string()))?;
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| ClientError::Transport(e.to_string()))?;
            interpret_response(status, &body)
        }
        .await;

        if let Err(err) = &result {
            warn!(
                event = events::RPC_FAILED,
                component = COMPONENT,
                object = request.object.as_str(),
                method = request.method.as_str(),
                err = %err,
                "rpc request failed"
            );
        }
        result
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn request(&self, request: RpcRequest) -> Result<Value, ClientError> {
        self.send(request, false).await
    }

    async fn signed(&self, request: RpcRequest) -> Result<Value, ClientError> {
        self.send(request, true).await
    }
}
