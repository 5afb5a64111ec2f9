use catalog::Feed;
use hyper::{Method, Request, Uri};

/// Public API endpoints, all `GET` under `/api`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endpoint {
    Trending,
    ForYou,
    New,
    PopularSearch,
    Search,
    Episodes,
    Detail,
}

impl Endpoint {
    pub fn from_path(path: &str) -> Option<Self> {
        let endpoint = match path.strip_prefix("/api")? {
            "/home/trending" => Endpoint::Trending,
            "/home/foryou" => Endpoint::ForYou,
            "/home/new" => Endpoint::New,
            "/search/popular" => Endpoint::PopularSearch,
            "/search" => Endpoint::Search,
            "/drama/episodes" => Endpoint::Episodes,
            "/drama/detail" => Endpoint::Detail,
            _ => return None,
        };
        Some(endpoint)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Endpoint::Trending => "home_trending",
            Endpoint::ForYou => "home_foryou",
            Endpoint::New => "home_new",
            Endpoint::PopularSearch => "search_popular",
            Endpoint::Search => "search",
            Endpoint::Episodes => "drama_episodes",
            Endpoint::Detail => "drama_detail",
        }
    }

    /// Query parameter the endpoint cannot do without.
    pub fn required_param(&self) -> Option<&'static str> {
        match self {
            Endpoint::Search => Some("query"),
            Endpoint::Episodes | Endpoint::Detail => Some("bookId"),
            _ => None,
        }
    }

    /// Upstream feed served verbatim by this endpoint. `param` is the value
    /// of [`Endpoint::required_param`]. Detail has no single feed.
    pub fn feed(&self, param: &str) -> Option<Feed> {
        let feed = match self {
            Endpoint::Trending => Feed::Trending,
            Endpoint::ForYou => Feed::ForYou,
            Endpoint::New => Feed::Latest,
            Endpoint::PopularSearch => Feed::PopularSearch,
            Endpoint::Search => Feed::Search(param.to_string()),
            Endpoint::Episodes => Feed::Episodes(param.to_string()),
            Endpoint::Detail => return None,
        };
        Some(feed)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Route {
    Matched(Endpoint),
    MethodNotAllowed,
    NotFound,
}

impl Route {
    pub fn name(&self) -> &'static str {
        match self {
            Route::Matched(endpoint) => endpoint.name(),
            Route::MethodNotAllowed => "method_not_allowed",
            Route::NotFound => "not_found",
        }
    }
}

pub fn route<B>(req: &Request<B>) -> Route {
    match Endpoint::from_path(req.uri().path()) {
        Some(endpoint) if req.method() == Method::GET => Route::Matched(endpoint),
        Some(_) => Route::MethodNotAllowed,
        None => Route::NotFound,
    }
}

/// First value of a query parameter, URL-decoded. Empty values count as
/// missing.
pub fn query_param(uri: &Uri, key: &str) -> Option<String> {
    let query = uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}
