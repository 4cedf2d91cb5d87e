//! Feed endpoint derivation
//!
//! The feed lives on the same host as the page that shows the map. Its scheme
//! follows the page: a page served over `https` gets `wss`, anything else `ws`.

use url::Url;

use crate::streaming::{StreamError, StreamResult};

/// Path of the live fleet feed on the hosting server
pub const FEED_PATH: &str = "/ws/fleet/live/";

/// Derive the feed URL from the hosting page's origin
///
/// Only scheme, host and port of `origin` are used; any path or query is
/// ignored.
pub fn feed_url(origin: &Url) -> StreamResult<Url> {
    let scheme = match origin.scheme() {
        "https" | "wss" => "wss",
        _ => "ws",
    };
    let host = origin
        .host_str()
        .ok_or_else(|| StreamError::InvalidEndpoint(format!("origin has no host: {}", origin)))?;
    let authority = match origin.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };

    Url::parse(&format!("{}://{}{}", scheme, authority, FEED_PATH))
        .map_err(|e| StreamError::InvalidEndpoint(e.to_string()))
}

/// Parse an origin string and derive the feed URL from it
pub fn feed_url_from_origin(origin: &str) -> StreamResult<Url> {
    let origin = Url::parse(origin)
        .map_err(|e| StreamError::InvalidEndpoint(format!("{}: {}", origin, e)))?;
    feed_url(&origin)
}
