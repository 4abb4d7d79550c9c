//! Layer disabling client caching of GET responses.

use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use http::header::{CACHE_CONTROL, EXPIRES, PRAGMA};
use http::{HeaderValue, Method, Request, Response};
use tower::{Layer, Service};

/// Marks GET responses as not cacheable unless the request URI contains one
/// of the allow-listed fragments.
#[derive(Debug, Clone, Default)]
pub struct CacheControlLayer {
    allow_cache: Arc<[String]>,
}

impl CacheControlLayer {
    /// Allow caching for URIs containing any of `allow_cache`.
    #[must_use]
    pub fn new<I, T>(allow_cache: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            allow_cache: allow_cache.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether a response for `request_uri` must not be cached.
    #[must_use]
    pub fn should_not_allow_cache(&self, request_uri: &str) -> bool {
        !self.allow_cache.iter().any(|fragment| request_uri.contains(fragment.as_str()))
    }
}

impl<S> Layer<S> for CacheControlLayer {
    type Service = CacheControlService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CacheControlService {
            inner,
            layer: self.clone(),
        }
    }
}

/// Service produced by [`CacheControlLayer`].
#[derive(Debug, Clone)]
pub struct CacheControlService<S> {
    inner: S,
    layer: CacheControlLayer,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for CacheControlService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let request_uri = req.uri().path_and_query().map_or("/", |pq| pq.as_str());
        let no_cache = req.method() == Method::GET && self.layer.should_not_allow_cache(request_uri);

        let fut = self.inner.call(req);
        Box::pin(async move {
            let mut response = fut.await?;
            if no_cache {
                let headers = response.headers_mut();
                headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache, no-store, must-revalidate"));
                headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
                headers.insert(EXPIRES, HeaderValue::from_static("0"));
            }
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use tower::{ServiceExt, service_fn};

    async fn call(method: Method, uri: &str) -> Response<()> {
        let svc = CacheControlLayer::new(["/static"])
            .layer(service_fn(|_req: Request<()>| async { Ok::<_, Infallible>(Response::new(())) }));
        let req = Request::builder().method(method).uri(uri).body(()).unwrap();
        svc.oneshot(req).await.unwrap()
    }

    #[tokio::test]
    async fn test_get_gets_no_cache_headers() {
        let response = call(Method::GET, "/api/users").await;
        assert_eq!(response.headers()[CACHE_CONTROL], "no-cache, no-store, must-revalidate");
        assert_eq!(response.headers()[PRAGMA], "no-cache");
        assert_eq!(response.headers()[EXPIRES], "0");
    }

    #[tokio::test]
    async fn test_allow_listed_and_non_get_untouched() {
        assert!(call(Method::GET, "/static/app.js?v=2").await.headers().get(CACHE_CONTROL).is_none());
        assert!(call(Method::POST, "/api/users").await.headers().get(CACHE_CONTROL).is_none());
    }

    #[test]
    fn test_should_not_allow_cache() {
        let layer = CacheControlLayer::new(vec!["/public".to_string()]);
        assert!(layer.should_not_allow_cache("/private"));
        assert!(!layer.should_not_allow_cache("/v1/public/logo"));
    }
}
