//! Feed HTTP listener
//!
//! Every `GET` path is an author slug; see [`handler`] for the request flow.

pub mod handler;
pub mod routes;

pub use handler::{author_from_path, FeedHandler, FeedOrigin, FeedResponse};
pub use routes::feed_routes;

use crate::error::{FeedError, FeedResult};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// Bind the feed listener on `addr`
///
/// Returns the bound address and the serving future, which completes once
/// `shutdown` resolves and in-flight requests have finished.
pub fn bind_feed_server(
    handler: Arc<FeedHandler>,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> FeedResult<(SocketAddr, impl Future<Output = ()>)> {
    let (bound, server) = warp::serve(feed_routes(handler))
        .try_bind_with_graceful_shutdown(addr, shutdown)
        .map_err(|e| FeedError::internal_error(format!("failed to bind {addr}: {e}")))?;

    info!(addr = %bound, "Feed server listening");
    Ok((bound, server))
}
