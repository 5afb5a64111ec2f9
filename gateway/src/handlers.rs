use crate::errors::{GatewayError, Result};
use crate::resolver::{Resolution, Resolver};
use crate::router::{Endpoint, query_param};
use catalog::{Feed, HttpCatalog};
use http_body_util::combinators::BoxBody;
use hyper::body::Bytes;
use hyper::{Response, StatusCode, Uri};
use serde_json::json;
use shared::http::{make_json_response, serialize_json_response};

pub type HandlerBody = BoxBody<Bytes, GatewayError>;

const UPSTREAM_FAILURE: &str = "Failed to fetch data from upstream";
const DETAIL_NOT_FOUND: &str = "Drama not found in lists";

/// Turns a routed request into a response. Upstream failures become error
/// responses here and never escape as errors.
#[derive(Clone)]
pub struct Handlers {
    catalog: HttpCatalog,
    resolver: Resolver,
}

impl Handlers {
    pub fn new(catalog: HttpCatalog, resolver: Resolver) -> Self {
        Self { catalog, resolver }
    }

    pub async fn handle(&self, endpoint: Endpoint, uri: &Uri) -> Result<Response<HandlerBody>> {
        let param = match endpoint.required_param() {
            Some(name) => match query_param(uri, name) {
                Some(value) => value,
                None => {
                    return error_response(
                        StatusCode::BAD_REQUEST,
                        &format!("{name} parameter is required"),
                    );
                }
            },
            None => String::new(),
        };

        match endpoint.feed(&param) {
            Some(feed) => self.passthrough(feed).await,
            None => self.detail(&param).await,
        }
    }

    /// Relays an upstream feed body unchanged.
    async fn passthrough(&self, feed: Feed) -> Result<Response<HandlerBody>> {
        match self.catalog.fetch_raw(&feed).await {
            Ok(body) => Ok(make_json_response(StatusCode::OK, body)),
            Err(e) => {
                tracing::error!(feed = feed.name(), error = %e, "Upstream fetch failed");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, UPSTREAM_FAILURE)
            }
        }
    }

    async fn detail(&self, book_id: &str) -> Result<Response<HandlerBody>> {
        match self.resolver.resolve_by_id(book_id).await {
            Resolution::Found(record) => Ok(serialize_json_response(StatusCode::OK, &record)?),
            Resolution::NotFound => error_response(StatusCode::NOT_FOUND, DETAIL_NOT_FOUND),
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Result<Response<HandlerBody>> {
    Ok(serialize_json_response(status, &json!({ "error": message }))?)
}
