//! Photo visibility.
//!
//! One rule set, two ways to run it:
//!
//! * [`PhotoAuthorizer::apply_visibility_filter`] narrows a photo query so the
//!   database only returns what the actor may see.
//! * [`PhotoAuthorizer::is_visible`] answers for a single photo. With a loaded
//!   photo the rules run in memory without touching storage; with only an id
//!   the filter above is reused for an existence probe, so the two paths
//!   cannot drift apart.
//!
//! A photo is visible to
//!
//! * an administrator, always;
//! * anyone, if it sits in an album the album policy marks accessible, or if
//!   it is public and public photos are not hidden globally;
//! * an authenticated user, additionally, if they own it, or if it is
//!   unsorted and they may upload.

use crate::actor::ActorContext;
use crate::album::AlbumAccessibility;
use crate::config::{PUBLIC_PHOTOS_HIDDEN, Settings};
use crate::error::{Error, Result};
use crate::models::{Photo, PhotoId, PhotoRef, UserId};
use crate::query::{Column, Conditions, Entity, Link, Query};
use crate::repository::PhotoRepository;

/// PhotoAuthorizer
///
/// Decides photo visibility for one actor. Holds no state of its own; build
/// one per request from that request's actor.
pub struct PhotoAuthorizer<'a> {
    actor: &'a dyn ActorContext,
    settings: &'a dyn Settings,
    albums: &'a dyn AlbumAccessibility,
    photos: &'a dyn PhotoRepository,
}

impl<'a> PhotoAuthorizer<'a> {
    pub fn new(
        actor: &'a dyn ActorContext,
        settings: &'a dyn Settings,
        albums: &'a dyn AlbumAccessibility,
        photos: &'a dyn PhotoRepository,
    ) -> Self {
        Self {
            actor,
            settings,
            albums,
            photos,
        }
    }

    /// apply_visibility_filter
    ///
    /// Restricts `query` to the photos the actor may see. Administrators get
    /// the query back untouched.
    ///
    /// The rules are attached as a single parenthesised group ANDed onto the
    /// caller's filter as a whole (see [`Query::restrict`]), so whatever the
    /// caller already put there, top-level `OR`s included, keeps its meaning.
    ///
    /// # Errors
    /// [`Error::InvalidInput`] if `query` does not select photos. Nothing is
    /// attached in that case.
    pub fn apply_visibility_filter(&self, query: Query) -> Result<Query> {
        query.ensure_entity(Entity::Photo)?;

        if self.actor.is_admin() {
            return Ok(query);
        }

        let user_id = self.authenticated_user()?;
        let can_upload = user_id.is_some() && self.actor.can_upload();
        let public_exposed = self.public_photos_exposed();
        let accessible_albums = self.albums.apply_accessibility_filter(Query::albums())?;

        Ok(query.restrict(|visible| {
            let mut visible = visible.where_has(Link::Album, accessible_albums);
            if let Some(user_id) = user_id {
                visible = visible.or_where_eq(Column::PhotoOwnerId, user_id);
            }
            if can_upload {
                visible = visible.or_where_null(Column::PhotoAlbumId);
            }
            if public_exposed {
                visible = visible.or_where_eq(Column::PhotoIsPublic, true);
            }
            visible
        }))
    }

    /// is_visible
    ///
    /// Whether the actor may see one photo.
    ///
    /// * Administrators: `true` without any lookup.
    /// * A loaded [`Photo`]: evaluated in memory. The photo itself is never
    ///   queried; only the album policy may do a lookup, and it is given the
    ///   loaded album if there is one, the bare `album_id` otherwise.
    /// * A bare id: one existence probe through the visibility filter. The
    ///   photo is never loaded.
    pub async fn is_visible<'p>(&self, photo: impl Into<PhotoRef<'p>>) -> Result<bool> {
        if self.actor.is_admin() {
            return Ok(true);
        }

        let (id, photo) = disassemble(photo.into());
        let visible = match photo {
            Some(photo) => self.is_visible_in_memory(photo).await?,
            None => {
                let query =
                    self.apply_visibility_filter(Query::photos().where_eq(Column::PhotoId, id))?;
                self.photos.exists(&query).await?
            }
        };

        tracing::debug!(photo_id = id, loaded = photo.is_some(), visible, "photo visibility");
        Ok(visible)
    }

    /// Fetches the photos of `query` the actor may see.
    pub async fn visible_photos(&self, query: Query) -> Result<Vec<Photo>> {
        let query = self.apply_visibility_filter(query)?;
        self.photos.fetch(&query).await
    }

    /// Counts the photos of `query` the actor may see.
    pub async fn count_visible(&self, query: Query) -> Result<i64> {
        let query = self.apply_visibility_filter(query)?;
        self.photos.count(&query).await
    }

    async fn is_visible_in_memory(&self, photo: &Photo) -> Result<bool> {
        let album = photo.album_ref();

        if let Some(user_id) = self.authenticated_user()? {
            if photo.owner_id == Some(user_id) {
                return Ok(true);
            }
            if album.is_none() && self.actor.can_upload() {
                return Ok(true);
            }
        }

        if photo.is_public && self.public_photos_exposed() {
            return Ok(true);
        }

        // An unsorted photo has no album to be accessible through.
        match album {
            Some(album) => self.albums.is_accessible(album).await,
            None => Ok(false),
        }
    }

    fn authenticated_user(&self) -> Result<Option<UserId>> {
        if !self.actor.is_authenticated() {
            return Ok(None);
        }
        self.actor
            .current_user_id()
            .map(Some)
            .ok_or_else(|| Error::collaborator("authenticated actor without a user id"))
    }

    fn public_photos_exposed(&self) -> bool {
        !self.settings.get_bool(PUBLIC_PHOTOS_HIDDEN, true)
    }
}

/// Splits a [`PhotoRef`] into its id and, if present, the loaded photo.
/// Never loads anything.
pub fn disassemble(photo: PhotoRef<'_>) -> (PhotoId, Option<&Photo>) {
    match photo {
        PhotoRef::ById(id) => (id, None),
        PhotoRef::ByEntity(photo) => (photo.id, Some(photo)),
    }
}
