//! The indexed data model.
//!
//! A [`Record`] is one post: message, location, optional media and score.
//! Everything written to the document store is wrapped in a
//! [`StoredDocument`], whose `kind` tag is checked before any field is read
//! back. Documents with a missing or foreign tag never decode as a `Record`.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;

/// Collection holding posts.
pub const POST_COLLECTION: &str = "post";

/// Collection holding user accounts.
pub const USER_COLLECTION: &str = "user";

/// Kind of media attached to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    #[default]
    Unknown,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable mapping from file extension to [`MediaKind`].
///
/// Built once at startup and shared by reference. Keys are stored lowercase
/// without the leading dot, and lookups are case-insensitive.
///
/// ```
/// use nearby::record::{MediaKind, MediaKindTable};
///
/// let table = MediaKindTable::default();
/// assert_eq!(table.kind_for_filename("cat.JPG"), MediaKind::Image);
/// assert_eq!(table.kind_for_filename("clip.mp4"), MediaKind::Video);
/// assert_eq!(table.kind_for_filename("notes.txt"), MediaKind::Unknown);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "HashMap<String, MediaKind>", into = "HashMap<String, MediaKind>")]
pub struct MediaKindTable {
    kinds: HashMap<String, MediaKind>,
}

impl MediaKindTable {
    /// Build a table from `(extension, kind)` pairs. Extensions may carry a
    /// leading dot and any case.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, MediaKind)>,
        S: AsRef<str>,
    {
        let kinds = entries
            .into_iter()
            .map(|(ext, kind)| (normalize_extension(ext.as_ref()), kind))
            .collect();
        MediaKindTable { kinds }
    }

    /// Kind for a bare extension such as `"png"` or `".png"`.
    pub fn kind_for_extension(&self, extension: &str) -> MediaKind {
        self.kinds
            .get(&normalize_extension(extension))
            .copied()
            .unwrap_or(MediaKind::Unknown)
    }

    /// Kind for an uploaded filename, derived from its extension only.
    pub fn kind_for_filename(&self, filename: &str) -> MediaKind {
        match Path::new(filename).extension().and_then(|e| e.to_str()) {
            Some(ext) => self.kind_for_extension(ext),
            None => MediaKind::Unknown,
        }
    }

    /// Number of known extensions.
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Whether the table knows no extension at all.
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

impl Default for MediaKindTable {
    fn default() -> Self {
        MediaKindTable::new([
            ("jpeg", MediaKind::Image),
            ("jpg", MediaKind::Image),
            ("gif", MediaKind::Image),
            ("png", MediaKind::Image),
            ("mov", MediaKind::Video),
            ("mp4", MediaKind::Video),
            ("avi", MediaKind::Video),
            ("flv", MediaKind::Video),
            ("wmv", MediaKind::Video),
        ])
    }
}

impl From<HashMap<String, MediaKind>> for MediaKindTable {
    fn from(value: HashMap<String, MediaKind>) -> Self {
        MediaKindTable::new(value)
    }
}

impl From<MediaKindTable> for HashMap<String, MediaKind> {
    fn from(value: MediaKindTable) -> Self {
        value.kinds
    }
}

fn normalize_extension(extension: &str) -> String {
    extension.trim_start_matches('.').to_ascii_lowercase()
}

/// One indexed post.
///
/// Field names on the wire follow the `post` collection schema: the author
/// is `user`, the media URL is `url`, the media kind is `type` and the score
/// is `face`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Object-store key and document-store primary key.
    #[serde(default)]
    pub id: String,
    /// Verified identity of the poster.
    #[serde(rename = "user")]
    pub author: String,
    /// Free text, not searchable.
    #[serde(default)]
    pub message: String,
    pub location: GeoPoint,
    /// Public URL of the stored media, empty when none was attached.
    #[serde(rename = "url", default)]
    pub media_url: String,
    #[serde(rename = "type", default)]
    pub media_kind: MediaKind,
    /// Confidence in [0,1] from the scorer; 0 when not scored.
    #[serde(rename = "face", default)]
    pub score: f32,
}

/// A stored user account, owned by the auth collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    pub username: String,
    pub password_hash: String,
    pub salt: String,
    #[serde(default)]
    pub age: i64,
    #[serde(default)]
    pub gender: String,
}

/// Everything this service writes to the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoredDocument {
    Post(Record),
    User(UserAccount),
}

impl StoredDocument {
    /// The collection this document belongs to.
    pub fn collection(&self) -> &'static str {
        match self {
            StoredDocument::Post(_) => POST_COLLECTION,
            StoredDocument::User(_) => USER_COLLECTION,
        }
    }

    /// Serialize to the JSON body handed to the document store.
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }

    /// Decode a stored JSON body, checking the `kind` tag first.
    pub fn from_json(value: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    pub fn into_record(self) -> Option<Record> {
        match self {
            StoredDocument::Post(record) => Some(record),
            StoredDocument::User(_) => None,
        }
    }

    pub fn into_user(self) -> Option<UserAccount> {
        match self {
            StoredDocument::User(user) => Some(user),
            StoredDocument::Post(_) => None,
        }
    }
}
