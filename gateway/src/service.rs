use crate::config::Config;
use crate::errors::{GatewayError, Result};
use crate::handlers::{HandlerBody, Handlers};
use crate::metrics_defs::{REQUEST_DURATION, REQUESTS_INFLIGHT};
use crate::perimeter::{Perimeter, apply_security_headers, is_https};
use crate::resolver::Resolver;
use crate::router::{Route, route};
use catalog::HttpCatalog;
use hyper::body::Incoming;
use hyper::header::ORIGIN;
use hyper::service::Service;
use hyper::{Request, Response, StatusCode};
use shared::http::make_error_response;
use shared::{gauge, histogram};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

/// Main listener service: perimeter checks, routing and the API handlers.
#[derive(Clone)]
pub struct GatewayService {
    perimeter: Arc<Perimeter>,
    handlers: Handlers,
}

impl GatewayService {
    pub fn new(config: &Config, catalog: HttpCatalog) -> Result<Self> {
        let perimeter = Perimeter::new(&config.perimeter)?;

        let mut resolver = Resolver::new(Arc::new(catalog.clone()));
        if let Some(deadline) = config.fanout_deadline() {
            resolver = resolver.with_fanout_deadline(deadline);
        }

        Ok(Self {
            perimeter: Arc::new(perimeter),
            handlers: Handlers::new(catalog, resolver),
        })
    }

    /// Serves one request. Never fails: handler errors become `500`.
    pub async fn handle<B>(&self, req: Request<B>) -> Response<HandlerBody> {
        let started = Instant::now();
        let _inflight = InflightGuard::enter();

        let https = is_https(&req);
        let route = route(&req);
        let endpoint_tag = route.name();

        let mut response = match self.perimeter.check_rate_limit(&req) {
            Some(rejected) => rejected,
            None => self.dispatch(req, route).await,
        };
        apply_security_headers(response.headers_mut(), https);

        histogram!(
            REQUEST_DURATION,
            "status" => response.status().as_str().to_owned(),
            "endpoint" => endpoint_tag
        )
        .record(started.elapsed().as_secs_f64());

        response
    }

    async fn dispatch<B>(&self, req: Request<B>, route: Route) -> Response<HandlerBody> {
        if let Some(preflight) = self.perimeter.preflight(&req) {
            return preflight;
        }

        let origin = req.headers().get(ORIGIN).cloned();
        let mut response = match route {
            Route::Matched(endpoint) => {
                match self.handlers.handle(endpoint, req.uri()).await {
                    Ok(response) => response,
                    Err(e) => {
                        tracing::error!(endpoint = endpoint.name(), error = %e, "Handler failed");
                        make_error_response(StatusCode::INTERNAL_SERVER_ERROR)
                    }
                }
            }
            Route::MethodNotAllowed => make_error_response(StatusCode::METHOD_NOT_ALLOWED),
            Route::NotFound => {
                tracing::debug!(method = %req.method(), path = %req.uri().path(), "No route matched");
                make_error_response(StatusCode::NOT_FOUND)
            }
        };

        self.perimeter
            .apply_cors(origin.as_ref(), response.headers_mut());
        response
    }
}

/// Holds one slot of the in-flight gauge until dropped, which also covers
/// request futures dropped mid-flight by a disconnecting client.
struct InflightGuard(metrics::Gauge);

impl InflightGuard {
    fn enter() -> Self {
        let gauge = gauge!(REQUESTS_INFLIGHT);
        gauge.increment(1.0);
        Self(gauge)
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.0.decrement(1.0);
    }
}

impl Service<Request<Incoming>> for GatewayService {
    type Response = Response<HandlerBody>;
    type Error = GatewayError;
    type Future =
        Pin<Box<dyn Future<Output = std::result::Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move { Ok(service.handle(req).await) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics::{
        Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
    };
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Backs every gauge with one shared value.
    struct GaugeRecorder(Arc<AtomicU64>);

    impl GaugeRecorder {
        fn value(&self) -> f64 {
            f64::from_bits(self.0.load(Ordering::Acquire))
        }
    }

    impl Recorder for GaugeRecorder {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, _: &Key, _: &Metadata<'_>) -> Counter {
            Counter::noop()
        }

        fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
            Gauge::from_arc(self.0.clone())
        }

        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }

    #[test]
    fn test_inflight_released_on_drop() {
        let recorder = GaugeRecorder(Arc::new(AtomicU64::new(0f64.to_bits())));

        let guard = metrics::with_local_recorder(&recorder, InflightGuard::enter);
        assert_eq!(recorder.value(), 1.0);
        drop(guard);
        assert_eq!(recorder.value(), 0.0);
    }

    #[test]
    fn test_inflight_released_when_request_is_abandoned() {
        let recorder = GaugeRecorder(Arc::new(AtomicU64::new(0f64.to_bits())));

        let guard = metrics::with_local_recorder(&recorder, InflightGuard::enter);
        let request = async move {
            let _guard = guard;
            std::future::pending::<()>().await;
        };
        assert_eq!(recorder.value(), 1.0);

        // A client disconnect drops the future before it completes
        drop(request);
        assert_eq!(recorder.value(), 0.0);
    }
}
