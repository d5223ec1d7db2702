//! Streaming endpoint derivation

use cody_types::{CodyError, CodyResult};

/// Path of the streaming endpoint, also the path that is signed
pub const WS_PATH: &str = "/ws";

/// Derive the WebSocket URL from the REST base URL
///
/// `https` maps to `wss`, `http` to `ws`; a trailing `/` is dropped and
/// `/ws` appended. URLs that are already `ws(s)` keep their scheme.
pub fn ws_url(base_url: &str) -> CodyResult<String> {
    let base = base_url.trim().trim_end_matches('/');

    let (scheme, rest) = base
        .split_once("://")
        .ok_or_else(|| CodyError::Configuration(format!("URL has no scheme: {base_url}")))?;

    let ws_scheme = match scheme.to_ascii_lowercase().as_str() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(CodyError::Configuration(format!(
                "unsupported URL scheme: {other}"
            )))
        }
    };

    if rest.is_empty() {
        return Err(CodyError::Configuration(format!("URL has no host: {base_url}")));
    }

    Ok(format!("{ws_scheme}://{rest}{WS_PATH}"))
}
