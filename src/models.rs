use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type Id = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "postgres-store", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres-store",
    sqlx(type_name = "text", rename_all = "lowercase")
)]
pub enum PostKind {
    Text,
    Photo,
    Video,
    Poll,
    Link,
}

impl PostKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostKind::Text => "text",
            PostKind::Photo => "photo",
            PostKind::Video => "video",
            PostKind::Poll => "poll",
            PostKind::Link => "link",
        }
    }

    /// The media kind a post of this kind attaches, if any.
    pub fn media_kind(&self) -> Option<MediaKind> {
        match self {
            PostKind::Photo => Some(MediaKind::Photo),
            PostKind::Video => Some(MediaKind::Video),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "postgres-store", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres-store",
    sqlx(type_name = "text", rename_all = "lowercase")
)]
pub enum MediaKind {
    Photo,
    Video,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres-store", derive(sqlx::FromRow))]
pub struct Post {
    pub id: Id,
    pub title: String,
    pub description: Option<String>,
    /// Legacy single-image reference kept for backward compatibility with
    /// posts created before multi-attachment support.
    pub image: Option<String>,
    pub kind: PostKind,
    pub link_url: Option<String>,
    pub group_id: Id,
    pub author_id: Id,
    pub nsfw: bool,
    pub spoiler: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres-store", derive(sqlx::FromRow))]
pub struct MediaAttachment {
    pub id: Id,
    pub post_id: Id,
    pub kind: MediaKind,
    pub media_url: String,
    pub media_order: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres-store", derive(sqlx::FromRow))]
pub struct Poll {
    pub id: Id,
    pub post_id: Id,
    pub allows_multiple: bool,
    /// Absolute voting deadline; votes past this instant are closed.
    pub ends_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres-store", derive(sqlx::FromRow))]
pub struct PollOption {
    pub id: Id,
    pub poll_id: Id,
    pub text: String,
    pub option_order: i32,
    pub created_at: DateTime<Utc>,
}

/// Poll specification carried inside a creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPoll {
    pub options: Vec<String>,
    pub duration_hours: i64,
    #[serde(default)]
    pub allows_multiple: bool,
}

/// A post creation request. Omitted fields take their documented defaults;
/// `id` and `created_at` are generated when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPost {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub link_url: Option<String>,
    #[serde(default)]
    pub kind: Option<PostKind>,
    #[serde(default)]
    pub nsfw: bool,
    #[serde(default)]
    pub spoiler: bool,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub poll: Option<NewPoll>,
    pub group_id: Id,
    pub author_id: Id,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub id: Option<Id>,
}

/// Deletion read projection: the post row plus the `media_url` of every
/// attachment, fetched in one owner-filtered read.
#[derive(Debug, Clone)]
pub struct PostWithMedia {
    pub post: Post,
    pub media_urls: Vec<String>,
}
