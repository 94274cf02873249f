//! Response caching for cacheable GET routes.

use std::sync::Arc;

use axum::{
    body::{Body, HttpBody},
    extract::State,
    http::{HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use bytes::{Bytes, BytesMut};
use futures::{StreamExt, stream};
use tracing::{debug, error, instrument};

use super::store::{CachedResponse, ResponseCache, ResponseKey};

/// Upper bound on bodies copied into the cache.
const MAX_CACHED_BODY_BYTES: usize = 1024 * 1024;

/// Serve GET requests from the cache, storing successful responses on a miss.
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn response_cache_layer(
    State(cache): State<Arc<ResponseCache>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !cache.is_enabled() || request.method() != Method::GET {
        return next.run(request).await;
    }

    let key = ResponseKey::new(request.uri().path(), request.uri().query());

    if let Some(cached) = cache.get(&key) {
        debug!(cache = "response", outcome = "hit", "serving cached response");
        return build_response(cached);
    }

    debug!(cache = "response", outcome = "miss", "rendering response");
    let response = next.run(request).await;
    if response.status() != StatusCode::OK {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match collect_bounded(body, MAX_CACHED_BODY_BYTES).await {
        Ok(Collected::Complete(bytes)) => bytes,
        Ok(Collected::Oversized(body)) => {
            debug!(
                cache = "response",
                outcome = "skip",
                "response body exceeds cache limit"
            );
            return Response::from_parts(parts, body);
        }
        Err(err) => {
            error!(
                target = "cache::middleware",
                error = %err,
                "failed to read response body"
            );
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    cache.set(
        key,
        CachedResponse {
            status: parts.status.as_u16(),
            headers: parts
                .headers
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|value| (name.to_string(), value.to_string()))
                })
                .collect(),
            body: bytes.clone(),
        },
    );

    Response::from_parts(parts, Body::from(bytes))
}

enum Collected {
    Complete(Bytes),
    /// Body past the limit, rebuilt from the bytes already read and the rest
    /// of the stream.
    Oversized(Body),
}

async fn collect_bounded(body: Body, limit: usize) -> Result<Collected, axum::Error> {
    if body.size_hint().lower() > limit as u64 {
        return Ok(Collected::Oversized(body));
    }

    let mut chunks = body.into_data_stream();
    let mut buffer = BytesMut::new();
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        if buffer.len() + chunk.len() > limit {
            let head = stream::iter([Ok(buffer.freeze()), Ok(chunk)]);
            return Ok(Collected::Oversized(Body::from_stream(head.chain(chunks))));
        }
        buffer.extend_from_slice(&chunk);
    }

    Ok(Collected::Complete(buffer.freeze()))
}

fn build_response(cached: CachedResponse) -> Response {
    let mut builder = Response::builder().status(cached.status);

    for (name, value) in cached.headers {
        if let Ok(header_value) = HeaderValue::from_str(&value) {
            builder = builder.header(name, header_value);
        }
    }

    builder
        .body(Body::from(cached.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use axum::{Router, middleware::from_fn_with_state, routing::get};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use crate::cache::CacheConfig;

    fn counting_router(cache: Arc<ResponseCache>, hits: Arc<AtomicUsize>) -> Router {
        Router::new()
            .route(
                "/",
                get(move || {
                    let hits = hits.clone();
                    async move { format!("render {}", hits.fetch_add(1, Ordering::SeqCst) + 1) }
                }),
            )
            .layer(from_fn_with_state(cache, response_cache_layer))
    }

    async fn body_of(router: &Router, uri: &str) -> String {
        let response = router
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).expect("request"))
            .await
            .expect("response");
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        String::from_utf8(bytes.to_vec()).expect("utf8")
    }

    #[tokio::test]
    async fn second_request_is_served_from_cache_until_cleared() {
        let cache = Arc::new(ResponseCache::new(CacheConfig {
            enabled: true,
            ttl: Duration::from_secs(20),
            capacity: 10,
        }));
        let hits = Arc::new(AtomicUsize::new(0));
        let router = counting_router(cache.clone(), hits.clone());

        assert_eq!(body_of(&router, "/").await, "render 1");
        assert_eq!(body_of(&router, "/").await, "render 1");
        assert_eq!(body_of(&router, "/?page=2").await, "render 2");

        cache.clear();
        assert_eq!(body_of(&router, "/").await, "render 3");
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    fn cache_with_capacity(capacity: usize) -> Arc<ResponseCache> {
        Arc::new(ResponseCache::new(CacheConfig {
            enabled: true,
            ttl: Duration::from_secs(20),
            capacity,
        }))
    }

    async fn fetch(router: Router, uri: &str) -> (StatusCode, usize) {
        let response = router
            .oneshot(Request::get(uri).body(Body::empty()).expect("request"))
            .await
            .expect("response");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        (status, bytes.len())
    }

    #[tokio::test]
    async fn oversized_body_is_returned_uncached() {
        let cache = cache_with_capacity(10);
        let size = MAX_CACHED_BODY_BYTES + 1;
        let router = Router::new()
            .route("/", get(move || async move { "x".repeat(size) }))
            .layer(from_fn_with_state(cache.clone(), response_cache_layer));

        assert_eq!(fetch(router.clone(), "/").await, (StatusCode::OK, size));
        assert_eq!(fetch(router, "/").await, (StatusCode::OK, size));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn oversized_streamed_body_keeps_every_chunk() {
        let cache = cache_with_capacity(10);
        let chunk = MAX_CACHED_BODY_BYTES / 2;
        let router = Router::new()
            .route(
                "/",
                get(move || async move {
                    let chunks = (0..3)
                        .map(move |_| Ok::<_, std::io::Error>(Bytes::from(vec![b'x'; chunk])));
                    Body::from_stream(stream::iter(chunks))
                }),
            )
            .layer(from_fn_with_state(cache.clone(), response_cache_layer));

        assert_eq!(fetch(router, "/").await, (StatusCode::OK, chunk * 3));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn disabled_cache_always_renders() {
        let cache = Arc::new(ResponseCache::new(CacheConfig {
            enabled: false,
            ..Default::default()
        }));
        let hits = Arc::new(AtomicUsize::new(0));
        let router = counting_router(cache.clone(), hits);

        assert_eq!(body_of(&router, "/").await, "render 1");
        assert_eq!(body_of(&router, "/").await, "render 2");
        assert!(cache.is_empty());
    }
}
