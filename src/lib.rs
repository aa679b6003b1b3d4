//! Photo visibility for a gallery backend.
//!
//! [`PhotoAuthorizer`] decides which photos an actor (anonymous, a signed-in
//! user or an administrator) may see, both as a filter on photo queries and
//! as a yes/no answer for a single photo. Everything it depends on is passed
//! in explicitly:
//!
//! * [`ActorContext`]: who is asking, resolved per request.
//! * [`Settings`]: gallery settings, notably `public_photos_hidden`.
//! * [`AlbumAccessibility`]: the album policy photo visibility delegates to.
//! * [`PhotoRepository`]: where filtered queries are run.

// --- Module Structure ---

pub mod actor;
pub mod album;
pub mod config;
pub mod error;
pub mod models;
pub mod photo_authorization;
pub mod query;
pub mod repository;
pub mod telemetry;

// --- Public Re-exports ---

pub use actor::{Actor, ActorContext};
pub use album::{AlbumAccessibility, MockAlbumPolicy};
pub use config::{AppConfig, Env, PUBLIC_PHOTOS_HIDDEN, Settings};
pub use error::{Error, Result};
pub use models::{Album, AlbumRef, Photo, PhotoRef, Relation};
pub use photo_authorization::{PhotoAuthorizer, disassemble};
pub use query::{Column, Conditions, Entity, Link, Order, Query};
pub use repository::{MemoryRepository, PhotoRepository, PostgresRepository, RepositoryState};
