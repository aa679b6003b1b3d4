use serde::{Deserialize, Serialize};

use crate::models::UserId;

/// ActorContext
///
/// Answers the questions the authorization rules ask about whoever is making
/// the request. Implementations are resolved per request by the session
/// layer and must never be shared between requests.
pub trait ActorContext: Send + Sync {
    fn is_admin(&self) -> bool;
    fn is_authenticated(&self) -> bool;
    /// `None` for anonymous actors.
    fn current_user_id(&self) -> Option<UserId>;
    /// Whether the actor may upload photos, which also lets them see
    /// unsorted photos.
    fn can_upload(&self) -> bool;
}

/// Actor
///
/// The resolved identity of a request, as handed over by the session layer.
/// Administrators are always authenticated and may always upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Actor {
    #[default]
    Anonymous,
    User {
        id: UserId,
        may_upload: bool,
    },
    Admin {
        id: UserId,
    },
}

impl Actor {
    pub fn user(id: UserId) -> Self {
        Actor::User {
            id,
            may_upload: false,
        }
    }

    pub fn uploader(id: UserId) -> Self {
        Actor::User {
            id,
            may_upload: true,
        }
    }

    pub fn admin(id: UserId) -> Self {
        Actor::Admin { id }
    }
}

impl ActorContext for Actor {
    fn is_admin(&self) -> bool {
        matches!(self, Actor::Admin { .. })
    }

    fn is_authenticated(&self) -> bool {
        !matches!(self, Actor::Anonymous)
    }

    fn current_user_id(&self) -> Option<UserId> {
        match self {
            Actor::Anonymous => None,
            Actor::User { id, .. } | Actor::Admin { id } => Some(*id),
        }
    }

    fn can_upload(&self) -> bool {
        match self {
            Actor::Anonymous => false,
            Actor::User { may_upload, .. } => *may_upload,
            Actor::Admin { .. } => true,
        }
    }
}
