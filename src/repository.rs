use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, postgres::PgPoolOptions};

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::models::{Album, AlbumId, Photo, PhotoId, Relation};
use crate::query::{Column, Conditions, Entity, Query, Related, Row};

/// PhotoRepository
///
/// The terminal operations the authorization layer runs queries through.
/// Every method rejects queries that are not scoped to photos.
///
/// **Send + Sync + async_trait** so the store can be shared as
/// `Arc<dyn PhotoRepository>` across request tasks.
#[async_trait]
pub trait PhotoRepository: Send + Sync {
    /// Whether at least one photo matches. Never materializes a photo.
    async fn exists(&self, query: &Query) -> Result<bool>;
    async fn count(&self, query: &Query) -> Result<i64>;
    async fn fetch(&self, query: &Query) -> Result<Vec<Photo>>;
    async fn find_photo(&self, id: PhotoId) -> Result<Option<Photo>>;
}

/// RepositoryState
///
/// The shared handle to whichever store the process runs with.
pub type RepositoryState = Arc<dyn PhotoRepository>;

fn check(query: &Query) -> Result<()> {
    query.ensure_entity(Entity::Photo)?;
    query.validate()
}

const PHOTO_COLUMNS: &str =
    "SELECT photos.id, photos.owner_id, photos.title, photos.is_public, photos.album_id, photos.created_at FROM photos";

/// PostgresRepository
///
/// The store backed by the `photos` and `albums` tables.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// connect
    ///
    /// Opens a small connection pool against `DATABASE_URL`.
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let url = config
            .db_url
            .as_deref()
            .ok_or_else(|| Error::invalid_input("DATABASE_URL is not set"))?;

        let pool = PgPoolOptions::new().max_connections(5).connect(url).await?;
        tracing::info!("connected to Postgres");
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl PhotoRepository for PostgresRepository {
    async fn exists(&self, query: &Query) -> Result<bool> {
        check(query)?;
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT EXISTS (SELECT 1 FROM photos");
        query.push_where(&mut builder);
        builder.push(")");

        tracing::debug!(sql = builder.sql(), "photo existence probe");
        let found = builder
            .build_query_scalar::<bool>()
            .fetch_one(&self.pool)
            .await?;
        Ok(found)
    }

    async fn count(&self, query: &Query) -> Result<i64> {
        check(query)?;
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM photos");
        query.push_where(&mut builder);

        tracing::debug!(sql = builder.sql(), "photo count");
        let count = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn fetch(&self, query: &Query) -> Result<Vec<Photo>> {
        check(query)?;
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(PHOTO_COLUMNS);
        query.push_where(&mut builder);
        query.push_tail(&mut builder);

        tracing::debug!(sql = builder.sql(), "photo fetch");
        let photos = builder
            .build_query_as::<Photo>()
            .fetch_all(&self.pool)
            .await?;
        Ok(photos)
    }

    async fn find_photo(&self, id: PhotoId) -> Result<Option<Photo>> {
        let query = Query::photos().where_eq(Column::PhotoId, id);
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(PHOTO_COLUMNS);
        query.push_where(&mut builder);

        let photo = builder
            .build_query_as::<Photo>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(photo)
    }
}

/// MemoryRepository
///
/// An in-memory store used by tests and embedders without a database. It
/// evaluates queries with the same semantics Postgres applies to the
/// rendered SQL, and counts what it was asked to do.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    photos: Vec<Photo>,
    albums: HashMap<AlbumId, Album>,
    probes: AtomicUsize,
    materialized: AtomicUsize,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a photo. Like a database row, the stored copy forgets any
    /// loaded album.
    pub fn with_photo(mut self, mut photo: Photo) -> Self {
        photo.album = Relation::Unresolved;
        self.photos.push(photo);
        self
    }

    pub fn with_album(mut self, album: Album) -> Self {
        self.albums.insert(album.id, album);
        self
    }

    /// How many `exists`/`count` calls were made.
    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    /// How many photos were handed out by `fetch`/`find_photo`.
    pub fn materialized(&self) -> usize {
        self.materialized.load(Ordering::SeqCst)
    }

    fn matching<'a>(&'a self, query: &'a Query) -> impl Iterator<Item = &'a Photo> + 'a {
        self.photos
            .iter()
            .filter(move |photo| query.matches(Row::Photo(*photo), self))
    }

    fn hand_out(&self, photos: Vec<Photo>) -> Vec<Photo> {
        self.materialized.fetch_add(photos.len(), Ordering::SeqCst);
        photos
    }
}

impl Related for MemoryRepository {
    fn album(&self, id: AlbumId) -> Option<&Album> {
        self.albums.get(&id)
    }
}

#[async_trait]
impl PhotoRepository for MemoryRepository {
    async fn exists(&self, query: &Query) -> Result<bool> {
        check(query)?;
        self.probes.fetch_add(1, Ordering::SeqCst);
        Ok(self.matching(query).next().is_some())
    }

    async fn count(&self, query: &Query) -> Result<i64> {
        check(query)?;
        self.probes.fetch_add(1, Ordering::SeqCst);
        Ok(self.matching(query).count() as i64)
    }

    async fn fetch(&self, query: &Query) -> Result<Vec<Photo>> {
        check(query)?;
        let mut photos: Vec<Photo> = self.matching(query).cloned().collect();
        photos.sort_by(|a, b| query.compare(Row::Photo(a), Row::Photo(b)));
        if let Some(limit) = query.limit_value() {
            photos.truncate(usize::try_from(limit).unwrap_or(0));
        }
        Ok(self.hand_out(photos))
    }

    async fn find_photo(&self, id: PhotoId) -> Result<Option<Photo>> {
        let photo = self.photos.iter().find(|photo| photo.id == id).cloned();
        Ok(self.hand_out(photo.into_iter().collect()).pop())
    }
}
