//! Ambient connection configuration (`spec.md` §6's "deployment-fixed"
//! concerns: scheme, and the decoder-behavior choice `spec.md` §4.1 asks
//! implementations to pick explicitly).

use std::time::Duration;

/// The reference scheme used by stream pointers when no override is given.
pub const DEFAULT_SCHEME: &str = "mascara";

/// How the deframer reacts to a complete frame that fails JSON-RPC parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeMode {
    /// Hold the buffer position and keep waiting (the spec's reference
    /// behavior, §4.1).
    #[default]
    Lenient,
    /// Treat the failure as a protocol error and close the connection.
    Strict,
}

/// Shared configuration for a connection, used by both [`crate::server::Server`]
/// and [`crate::client::Client`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Scheme stream pointers are minted/recognized under.
    pub scheme: String,
    /// Behavior on a parse failure inside a complete frame.
    pub decode_mode: DecodeMode,
    /// Upper bound on bytes the deframer will buffer without seeing a
    /// `\r\n`; exceeding it is treated as a frame-decode error regardless of
    /// `decode_mode` (supplement: the spec is silent on resource limits for
    /// a peer that never terminates a frame).
    pub max_frame_buffer: usize,
    /// Size hint for reads off the transport; purely a performance knob, not
    /// wire-visible.
    pub read_buffer_hint: usize,
    /// How long `Client::invoke` waits for a terminal response before giving
    /// up locally. The core protocol has no wire-level timeout (§5); this is
    /// the "invoker layer" timeout the spec explicitly allows (§5).
    pub call_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scheme: DEFAULT_SCHEME.to_string(),
            decode_mode: DecodeMode::default(),
            max_frame_buffer: 8 * 1024 * 1024,
            read_buffer_hint: 8 * 1024,
            call_timeout: Duration::from_secs(30),
        }
    }
}
