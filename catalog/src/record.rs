use serde::{Deserialize, Deserializer, Serialize};

/// One drama title as seen by a single upstream endpoint.
///
/// No endpoint returns every field. List feeds carry the cover images but
/// leave `summary` and `lead_character` empty, while the search endpoint
/// fills those in. `id` is the only field that is stable across endpoints.
///
/// Serializes with the upstream's field names so clients can treat list items
/// and resolved records the same way.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireRecord")]
pub struct PartialRecord {
    #[serde(rename = "bookId")]
    pub id: String,
    #[serde(rename = "bookName")]
    pub title: String,
    #[serde(rename = "cover")]
    pub cover_image: String,
    #[serde(rename = "coverWap")]
    pub cover_image_wide: String,
    #[serde(rename = "introduction")]
    pub summary: String,
    pub tags: Vec<String>,
    #[serde(rename = "protagonist")]
    pub lead_character: String,
}

impl PartialRecord {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        PartialRecord {
            id: id.into(),
            title: title.into(),
            ..Default::default()
        }
    }
}

/// A tag card of the personalized feed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "WireGroup")]
pub struct Group {
    pub records: Vec<PartialRecord>,
}

/// All records of a grouped feed, in group order and then record order.
pub fn flatten_groups(groups: &[Group]) -> impl Iterator<Item = &PartialRecord> {
    groups.iter().flat_map(|group| group.records.iter())
}

/// Picks the tag list to keep. Search responses name the field `tagNames`,
/// list responses name it `tags`; `tags` wins when both are populated.
pub fn normalize_tags(tags: Vec<String>, tag_names: Vec<String>) -> Vec<String> {
    if tags.is_empty() { tag_names } else { tags }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct WireRecord {
    #[serde(deserialize_with = "null_as_default")]
    book_id: String,
    #[serde(deserialize_with = "null_as_default")]
    book_name: String,
    #[serde(deserialize_with = "null_as_default")]
    cover: String,
    #[serde(deserialize_with = "null_as_default")]
    cover_wap: String,
    #[serde(deserialize_with = "null_as_default")]
    introduction: String,
    #[serde(deserialize_with = "null_as_default")]
    tags: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    tag_names: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    protagonist: String,
}

impl From<WireRecord> for PartialRecord {
    fn from(wire: WireRecord) -> Self {
        PartialRecord {
            id: wire.book_id,
            title: wire.book_name,
            cover_image: wire.cover,
            cover_image_wide: wire.cover_wap,
            summary: wire.introduction,
            tags: normalize_tags(wire.tags, wire.tag_names),
            lead_character: wire.protagonist,
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct WireGroup {
    #[serde(deserialize_with = "null_as_default")]
    tag_card_vo: WireTagCard,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct WireTagCard {
    #[serde(deserialize_with = "null_as_default")]
    tag_books: Vec<PartialRecord>,
}

impl From<WireGroup> for Group {
    fn from(wire: WireGroup) -> Self {
        Group {
            records: wire.tag_card_vo.tag_books,
        }
    }
}

// The upstream sends `null` for fields it has no value for.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
