use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// --- Identifiers ---

// The gallery schema keys every table with BIGINT ids.
pub type PhotoId = i64;
pub type AlbumId = i64;
pub type UserId = i64;

// --- Core Schemas (Mapped to Database) ---

/// Album
///
/// A record of the `albums` table. Whether an album is accessible to the
/// current actor is decided by the album policy, never by this struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, Default)]
pub struct Album {
    pub id: AlbumId,
    // FK to users.id. NULL for albums created by the system.
    pub owner_id: Option<UserId>,
    pub title: String,
    pub is_public: bool,
}

/// Photo
///
/// A record of the `photos` table, optionally carrying its owning album when
/// the caller already loaded it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, Default)]
pub struct Photo {
    pub id: PhotoId,
    // FK to users.id. NULL for imports without an owner.
    pub owner_id: Option<UserId>,
    pub title: String,
    // Exposes the photo to everyone unless public photos are hidden globally.
    pub is_public: bool,
    // NULL marks an unsorted photo.
    pub album_id: Option<AlbumId>,
    pub created_at: DateTime<Utc>,

    /// The owning album, if someone already fetched it. Never read from or
    /// written to a row.
    #[sqlx(skip)]
    #[serde(skip)]
    pub album: Relation<Album>,
}

impl Photo {
    /// Attaches an already loaded album (or the knowledge that there is none).
    pub fn with_album(mut self, album: Option<Album>) -> Self {
        self.album = album.into();
        self
    }

    /// The album reference the authorization rules should look at.
    ///
    /// A resolved relation wins, including an explicit absence. Otherwise we
    /// fall back to the raw `album_id` so the album policy can do a cheap
    /// lookup by id instead of us loading the album here.
    pub fn album_ref(&self) -> Option<AlbumRef<'_>> {
        match &self.album {
            Relation::Present(album) => Some(AlbumRef::Entity(album)),
            Relation::Absent => None,
            Relation::Unresolved => self.album_id.map(AlbumRef::Id),
        }
    }
}

// --- Lazy relations ---

/// Relation
///
/// A related record that may or may not have been fetched yet.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Relation<T> {
    #[default]
    Unresolved,
    Present(T),
    Absent,
}

impl<T> Relation<T> {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Relation::Unresolved)
    }
}

impl<T> From<Option<T>> for Relation<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(inner) => Relation::Present(inner),
            None => Relation::Absent,
        }
    }
}

// --- References ---

/// PhotoRef
///
/// What callers hand to `is_visible`: either just the key, or a photo they
/// already hold.
#[derive(Debug, Clone, Copy)]
pub enum PhotoRef<'a> {
    ById(PhotoId),
    ByEntity(&'a Photo),
}

impl From<PhotoId> for PhotoRef<'_> {
    fn from(id: PhotoId) -> Self {
        PhotoRef::ById(id)
    }
}

impl<'a> From<&'a Photo> for PhotoRef<'a> {
    fn from(photo: &'a Photo) -> Self {
        PhotoRef::ByEntity(photo)
    }
}

/// AlbumRef
///
/// What the album policy is asked about.
#[derive(Debug, Clone, Copy)]
pub enum AlbumRef<'a> {
    Id(AlbumId),
    Entity(&'a Album),
}

impl AlbumRef<'_> {
    pub fn id(&self) -> AlbumId {
        match self {
            AlbumRef::Id(id) => *id,
            AlbumRef::Entity(album) => album.id,
        }
    }
}

impl<'a> From<&'a Album> for AlbumRef<'a> {
    fn from(album: &'a Album) -> Self {
        AlbumRef::Entity(album)
    }
}
