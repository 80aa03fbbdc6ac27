//! Canonical structured event names used across `ac-client`.

// Wire state and connection driver events.
pub const CONNECTION_CONNECTING: &str = "connection_connecting";
pub const CONNECTION_OPEN: &str = "connection_open";
pub const CONNECTION_CLOSED: &str = "connection_closed";
pub const CONNECTION_ERROR: &str = "connection_error";
pub const CONNECTION_BACKOFF: &str = "connection_backoff";
pub const CONNECTION_GIVE_UP: &str = "connection_give_up";
pub const CONNECTION_SHUTDOWN: &str = "connection_shutdown";
pub const WIRE_AUTH: &str = "wire_auth";
pub const WIRE_WRITE_QUEUED: &str = "wire_write_queued";
pub const WIRE_QUEUE_FLUSHED: &str = "wire_queue_flushed";

// Inbound frame handling and registry events.
pub const FRAME_DECODE_FAILED: &str = "frame_decode_failed";
pub const FRAME_DROPPED_UNKNOWN_CHANNEL: &str = "frame_dropped_unknown_channel";
pub const PAYLOAD_DECOMPRESS_FAILED: &str = "payload_decompress_failed";
pub const CHANNEL_ACK: &str = "channel_ack";
pub const CHANNEL_SUBSCRIBE: &str = "channel_subscribe";
pub const CHANNEL_UNSUBSCRIBE: &str = "channel_unsubscribe";
pub const CHANNEL_RESUBSCRIBE: &str = "channel_resubscribe";
pub const LISTENER_ERROR: &str = "listener_error";

// Task waiter events.
pub const TASK_WAIT_START: &str = "task_wait_start";
pub const TASK_PRIMING_IGNORED: &str = "task_priming_ignored";
pub const TASK_SETTLED: &str = "task_settled";
pub const TASK_CANCELLED: &str = "task_cancelled";

// Polling and RPC events.
pub const POLL_ATTEMPT: &str = "poll_attempt";
pub const POLL_PROCESSING: &str = "poll_processing";
pub const POLL_FAILED: &str = "poll_failed";
pub const RPC_REQUEST: &str = "rpc_request";
pub const RPC_FAILED: &str = "rpc_failed";
