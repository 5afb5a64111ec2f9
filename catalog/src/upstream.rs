use crate::client::FetchClient;
use crate::config::{CatalogConfig, Endpoints};
use crate::error::{FetchError, SourceError};
use crate::record::{Group, PartialRecord};
use crate::sources::{decode_flat_list, decode_grouped_feed};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use std::sync::Arc;
use url::Url;

/// Typed view of the upstream catalog.
///
/// Each method is one independent fetch-and-decode of a single endpoint.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn trending(&self) -> Result<Vec<PartialRecord>, SourceError>;

    async fn latest(&self) -> Result<Vec<PartialRecord>, SourceError>;

    async fn for_you(&self) -> Result<Vec<Group>, SourceError>;

    /// Name search. The only endpoint that populates summary and lead character.
    async fn search(&self, query: &str) -> Result<Vec<PartialRecord>, SourceError>;
}

/// An upstream endpoint together with its request parameter, if any.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Feed {
    Trending,
    Latest,
    ForYou,
    PopularSearch,
    Search(String),
    Episodes(String),
}

impl Feed {
    pub fn name(&self) -> &'static str {
        match self {
            Feed::Trending => "trending",
            Feed::Latest => "latest",
            Feed::ForYou => "for_you",
            Feed::PopularSearch => "popular_search",
            Feed::Search(_) => "search",
            Feed::Episodes(_) => "episodes",
        }
    }
}

/// [`Catalog`] backed by the upstream HTTP API.
#[derive(Clone)]
pub struct HttpCatalog {
    client: FetchClient,
    endpoints: Arc<Endpoints>,
    headers: HeaderMap,
}

impl HttpCatalog {
    pub fn new(config: &CatalogConfig) -> Result<Self, FetchError> {
        let client = FetchClient::new(config.client_options())?;
        Self::with_client(client, config)
    }

    pub fn with_client(client: FetchClient, config: &CatalogConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        let user_agent = HeaderValue::from_str(&config.user_agent)
            .map_err(|e| FetchError::InvalidHeader(format!("user agent: {e}")))?;
        headers.insert(USER_AGENT, user_agent);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        Ok(Self {
            client,
            endpoints: Arc::new(config.endpoints.clone()),
            headers,
        })
    }

    /// Full URL for a feed, with its parameter URL-escaped into the query.
    pub fn feed_url(&self, feed: &Feed) -> Url {
        let endpoints = &self.endpoints;
        match feed {
            Feed::Trending => endpoints.trending.clone(),
            Feed::Latest => endpoints.latest.clone(),
            Feed::ForYou => endpoints.for_you.clone(),
            Feed::PopularSearch => endpoints.popular_search.clone(),
            Feed::Search(query) => with_query_param(&endpoints.search, "query", query),
            Feed::Episodes(book_id) => with_query_param(&endpoints.episodes, "bookId", book_id),
        }
    }

    /// Raw response body of a feed, undecoded.
    pub async fn fetch_raw(&self, feed: &Feed) -> Result<Bytes, FetchError> {
        let url = self.feed_url(feed);
        self.client.fetch(&url, &self.headers).await
    }
}

fn with_query_param(base: &Url, key: &str, value: &str) -> Url {
    let mut url = base.clone();
    url.query_pairs_mut().append_pair(key, value);
    url
}

#[async_trait]
impl Catalog for HttpCatalog {
    async fn trending(&self) -> Result<Vec<PartialRecord>, SourceError> {
        let body = self.fetch_raw(&Feed::Trending).await?;
        Ok(decode_flat_list(&body)?)
    }

    async fn latest(&self) -> Result<Vec<PartialRecord>, SourceError> {
        let body = self.fetch_raw(&Feed::Latest).await?;
        Ok(decode_flat_list(&body)?)
    }

    async fn for_you(&self) -> Result<Vec<Group>, SourceError> {
        let body = self.fetch_raw(&Feed::ForYou).await?;
        Ok(decode_grouped_feed(&body)?)
    }

    async fn search(&self, query: &str) -> Result<Vec<PartialRecord>, SourceError> {
        let body = self.fetch_raw(&Feed::Search(query.to_string())).await?;
        Ok(decode_flat_list(&body)?)
    }
}
