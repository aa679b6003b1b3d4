use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::models::{AlbumId, AlbumRef};
use crate::query::{Column, Conditions, Entity, Query};

/// AlbumAccessibility
///
/// The album-level policy photo visibility delegates to. How an album decides
/// that it is accessible (ownership, sharing, passwords...) is entirely the
/// implementation's business; both methods must agree with each other for
/// the same actor.
#[async_trait]
pub trait AlbumAccessibility: Send + Sync {
    /// Whether the current actor may access `album`. Given only an id, the
    /// implementation should do the cheapest lookup it can.
    async fn is_accessible(&self, album: AlbumRef<'_>) -> Result<bool>;

    /// Restricts an album query to the albums `is_accessible` would accept.
    fn apply_accessibility_filter(&self, query: Query) -> Result<Query>;
}

/// MockAlbumPolicy
///
/// Grants access to a fixed set of album ids. Counts how it was asked, so
/// tests can check whether callers passed entities or bare ids.
#[derive(Debug, Default)]
pub struct MockAlbumPolicy {
    accessible: BTreeSet<AlbumId>,
    /// When true, every call fails with a collaborator error.
    pub should_fail: bool,
    lookups_by_id: AtomicUsize,
    lookups_by_entity: AtomicUsize,
}

impl MockAlbumPolicy {
    pub fn new(accessible: impl IntoIterator<Item = AlbumId>) -> Self {
        Self {
            accessible: accessible.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Default::default()
        }
    }

    pub fn lookups_by_id(&self) -> usize {
        self.lookups_by_id.load(Ordering::SeqCst)
    }

    pub fn lookups_by_entity(&self) -> usize {
        self.lookups_by_entity.load(Ordering::SeqCst)
    }

    fn fail_if_requested(&self) -> Result<()> {
        if self.should_fail {
            return Err(Error::collaborator("mock album policy: failure requested"));
        }
        Ok(())
    }
}

#[async_trait]
impl AlbumAccessibility for MockAlbumPolicy {
    async fn is_accessible(&self, album: AlbumRef<'_>) -> Result<bool> {
        self.fail_if_requested()?;
        match album {
            AlbumRef::Id(_) => self.lookups_by_id.fetch_add(1, Ordering::SeqCst),
            AlbumRef::Entity(_) => self.lookups_by_entity.fetch_add(1, Ordering::SeqCst),
        };
        Ok(self.accessible.contains(&album.id()))
    }

    fn apply_accessibility_filter(&self, query: Query) -> Result<Query> {
        self.fail_if_requested()?;
        query.ensure_entity(Entity::Album)?;
        Ok(query.where_in(Column::AlbumId, self.accessible.iter().copied()))
    }
}
