//! Checks and headers applied around every request on the main listener.
//!
//! Order of application: the per-client rate limit runs first, then CORS
//! preflight handling, then routing. Security headers go on every response,
//! CORS headers on every response to an allowed cross-origin request that
//! made it past the rate limit.

use crate::config::{PerimeterConfig, ValidationError};
use crate::metrics_defs::REQUESTS_RATE_LIMITED;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS, ACCESS_CONTROL_MAX_AGE,
    ACCESS_CONTROL_REQUEST_METHOD, CONTENT_SECURITY_POLICY, HeaderMap, HeaderName, HeaderValue,
    ORIGIN, REFERRER_POLICY, STRICT_TRANSPORT_SECURITY, VARY, X_CONTENT_TYPE_OPTIONS,
    X_FRAME_OPTIONS, X_XSS_PROTECTION,
};
use http::{Method, Request, Response, StatusCode};
use http_body_util::combinators::BoxBody;
use hyper::body::Bytes;
use shared::counter;
use shared::http::{PeerAddr, full_body, make_error_response};
use std::net::{IpAddr, Ipv4Addr};
use std::num::NonZeroU32;
use std::str::FromStr;
use std::time::Duration;

const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const X_DOWNLOAD_OPTIONS: HeaderName = HeaderName::from_static("x-download-options");
const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");
const X_REAL_IP: HeaderName = HeaderName::from_static("x-real-ip");

const CORS_ALLOW_METHODS: &str = "GET, POST, OPTIONS";
const CORS_ALLOW_HEADERS: &str = "Origin, Content-Type, Authorization";
const CORS_EXPOSE_HEADERS: &str = "Content-Length";
const CORS_MAX_AGE_SECS: u64 = 12 * 60 * 60;

/// Keyed limiter state is pruned once it tracks this many clients.
const PRUNE_THRESHOLD: usize = 10_000;

/// A request rate in `<count>-<S|M|H|D>` notation, e.g. `20-S` or `1000-H`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateSpec {
    pub count: NonZeroU32,
    pub period: Duration,
}

#[derive(Debug, PartialEq, Eq)]
pub struct InvalidRateSpec;

impl FromStr for RateSpec {
    type Err = InvalidRateSpec;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (count, unit) = s.trim().split_once('-').ok_or(InvalidRateSpec)?;
        let count = count
            .parse::<u32>()
            .ok()
            .and_then(NonZeroU32::new)
            .ok_or(InvalidRateSpec)?;
        let secs = match unit.to_ascii_uppercase().as_str() {
            "S" => 1,
            "M" => 60,
            "H" => 60 * 60,
            "D" => 24 * 60 * 60,
            _ => return Err(InvalidRateSpec),
        };
        let spec = Self {
            count,
            period: Duration::from_secs(secs),
        };
        spec.quota().ok_or(InvalidRateSpec)?;
        Ok(spec)
    }
}

impl RateSpec {
    /// `count` requests may be made at once, refilling evenly over `period`.
    pub fn quota(&self) -> Option<Quota> {
        Quota::with_period(self.period / self.count.get()).map(|q| q.allow_burst(self.count))
    }
}

/// Everything the perimeter needs, built once from [`PerimeterConfig`].
pub struct Perimeter {
    limiter: DefaultKeyedRateLimiter<IpAddr>,
    limit: NonZeroU32,
    cors: Cors,
    trust_forwarded_for: bool,
}

impl Perimeter {
    pub fn new(config: &PerimeterConfig) -> Result<Self, ValidationError> {
        let spec = config.rate_spec()?;
        let quota = spec
            .quota()
            .ok_or_else(|| ValidationError::InvalidRateLimit(config.rate_limit.clone()))?;

        Ok(Self {
            limiter: RateLimiter::keyed(quota),
            limit: spec.count,
            cors: Cors::new(&config.allowed_origins),
            trust_forwarded_for: config.trust_forwarded_for,
        })
    }

    /// Returns the rejection response when the client is over its rate.
    pub fn check_rate_limit<B, E: 'static>(
        &self,
        req: &Request<B>,
    ) -> Option<Response<BoxBody<Bytes, E>>> {
        let ip = client_ip(req, self.trust_forwarded_for);

        if self.limiter.len() > PRUNE_THRESHOLD {
            self.limiter.retain_recent();
        }

        if self.limiter.check_key(&ip).is_ok() {
            return None;
        }

        tracing::debug!(client = %ip, "Rate limit exceeded");
        counter!(REQUESTS_RATE_LIMITED).increment(1);

        let mut response = Response::new(full_body("Limit exceeded"));
        *response.status_mut() = StatusCode::TOO_MANY_REQUESTS;
        response
            .headers_mut()
            .insert(X_RATELIMIT_LIMIT, HeaderValue::from(self.limit.get()));
        Some(response)
    }

    /// Answers CORS preflight requests. Anything else passes through.
    pub fn preflight<B, E: 'static>(&self, req: &Request<B>) -> Option<Response<BoxBody<Bytes, E>>> {
        if req.method() != Method::OPTIONS
            || !req.headers().contains_key(ACCESS_CONTROL_REQUEST_METHOD)
        {
            return None;
        }
        let origin = req.headers().get(ORIGIN)?;

        if !self.cors.allows(origin) {
            tracing::debug!(origin = ?origin, "Preflight from disallowed origin");
            return Some(make_error_response(StatusCode::FORBIDDEN));
        }

        let mut response = Response::new(full_body(Bytes::new()));
        *response.status_mut() = StatusCode::NO_CONTENT;
        let headers = response.headers_mut();
        self.cors.apply(origin, headers);
        headers.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(CORS_ALLOW_METHODS),
        );
        headers.insert(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(CORS_ALLOW_HEADERS),
        );
        headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from(CORS_MAX_AGE_SECS));
        Some(response)
    }

    /// Adds CORS headers for an allowed cross-origin request.
    pub fn apply_cors(&self, origin: Option<&HeaderValue>, headers: &mut HeaderMap) {
        let Some(origin) = origin.filter(|origin| self.cors.allows(origin)) else {
            return;
        };

        self.cors.apply(origin, headers);
        headers.insert(
            ACCESS_CONTROL_EXPOSE_HEADERS,
            HeaderValue::from_static(CORS_EXPOSE_HEADERS),
        );
    }
}

/// Allowed-origin list. `*` matches any origin; since credentials are
/// allowed the request origin is echoed back rather than `*`.
struct Cors {
    any_origin: bool,
    origins: Vec<String>,
}

impl Cors {
    fn new(allowed_origins: &[String]) -> Self {
        Self {
            any_origin: allowed_origins.iter().any(|o| o.trim() == "*"),
            origins: allowed_origins
                .iter()
                .map(|o| o.trim().trim_end_matches('/').to_string())
                .collect(),
        }
    }

    fn allows(&self, origin: &HeaderValue) -> bool {
        if self.any_origin {
            return true;
        }
        origin
            .to_str()
            .map(|origin| self.origins.iter().any(|allowed| allowed == origin))
            .unwrap_or(false)
    }

    fn apply(&self, origin: &HeaderValue, headers: &mut HeaderMap) {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
        headers.insert(
            ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
        headers.append(VARY, HeaderValue::from_static("Origin"));
    }
}

/// Adds the fixed browser-hardening headers. HSTS is only sent when the
/// request reached the proxy in front of us over HTTPS.
pub fn apply_security_headers(headers: &mut HeaderMap, https: bool) {
    if https {
        headers.insert(
            STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=315360000; includeSubdomains"),
        );
    }
    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(X_XSS_PROTECTION, HeaderValue::from_static("1; mode=block"));
    headers.insert(
        CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'self'"),
    );
    headers.insert(X_DOWNLOAD_OPTIONS, HeaderValue::from_static("noopen"));
    headers.insert(
        REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
}

pub fn is_https<B>(req: &Request<B>) -> bool {
    req.headers()
        .get(X_FORWARDED_PROTO)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"))
}

/// Rate-limit key for a request: the first `X-Forwarded-For` entry, then
/// `X-Real-IP` (when trusted), then the socket peer address.
pub fn client_ip<B>(req: &Request<B>, trust_forwarded_for: bool) -> IpAddr {
    if trust_forwarded_for {
        let forwarded = req
            .headers()
            .get(X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|ip| ip.trim().parse().ok());
        let real_ip = || {
            req.headers()
                .get(X_REAL_IP)
                .and_then(|v| v.to_str().ok())
                .and_then(|ip| ip.trim().parse().ok())
        };
        if let Some(ip) = forwarded.or_else(real_ip) {
            return ip;
        }
    }

    req.extensions()
        .get::<PeerAddr>()
        .map(|peer| peer.0.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}
