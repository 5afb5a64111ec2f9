//! Decoders for the upstream response shapes.
//!
//! Trending, new releases and search all answer with a flat JSON array of
//! records. The personalized feed answers with an array of tag cards, each
//! nesting its records under `tagCardVo.tagBooks`.
//!
//! Missing or `null` fields never fail a decode; only a body whose top-level
//! container is not the expected array does.

use crate::error::DecodeError;
use crate::record::{Group, PartialRecord};

pub fn decode_flat_list(bytes: &[u8]) -> Result<Vec<PartialRecord>, DecodeError> {
    serde_json::from_slice(bytes).map_err(DecodeError::FlatList)
}

pub fn decode_grouped_feed(bytes: &[u8]) -> Result<Vec<Group>, DecodeError> {
    serde_json::from_slice(bytes).map_err(DecodeError::GroupedFeed)
}
