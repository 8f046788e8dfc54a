//! Warp filters for the feed listener

use crate::server::handler::FeedHandler;
use std::convert::Infallible;
use std::sync::Arc;
use warp::path::FullPath;
use warp::{Filter, Rejection, Reply};

/// `GET /<author>` for any path, including `/` itself
pub fn feed_routes(
    handler: Arc<FeedHandler>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::get()
        .and(warp::path::full())
        .and_then(move |path: FullPath| {
            let handler = handler.clone();
            async move { Ok::<_, Infallible>(handler.handle(path.as_str()).await) }
        })
}
