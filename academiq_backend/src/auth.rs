//! Server-side half of authentication: opaque bearer tokens mapped to users,
//! and the capability guard every mutating operation goes through.

use crate::database::models::Role;
use crate::database::repositories::{SessionRepository, UserRepository};
use crate::database::Database;
use crate::error::{ForumError, ForumResult};
use crate::utils::now_utc_iso;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// The caller of a request. The role is loaded from the store on every
/// resolution, never taken from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub role: Role,
}

impl Session {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require(&self, capability: &impl Capability) -> ForumResult<()> {
        if capability.permits(self) {
            Ok(())
        } else {
            Err(ForumError::forbidden(capability.describe()))
        }
    }
}

pub trait Capability {
    fn permits(&self, session: &Session) -> bool;
    fn describe(&self) -> String;
}

/// Caller must hold exactly this role.
pub struct RequireRole(pub Role);

impl Capability for RequireRole {
    fn permits(&self, session: &Session) -> bool {
        session.role == self.0
    }

    fn describe(&self) -> String {
        format!("requires role {}", self.0)
    }
}

/// Caller owns the resource (its user id is given) or is an admin.
pub struct OwnerOrAdmin<'a>(pub &'a str);

impl Capability for OwnerOrAdmin<'_> {
    fn permits(&self, session: &Session) -> bool {
        session.is_admin() || session.user_id == self.0
    }

    fn describe(&self) -> String {
        "only the owner or an admin may do this".into()
    }
}

/// Caller owns the resource. Admins get no bypass.
pub struct OwnerOnly<'a>(pub &'a str);

impl Capability for OwnerOnly<'_> {
    fn permits(&self, session: &Session) -> bool {
        session.user_id == self.0
    }

    fn describe(&self) -> String {
        "only the owner may do this".into()
    }
}

/// Caller acts on its own account, or is an admin.
pub struct SelfOrAdmin<'a>(pub &'a str);

impl Capability for SelfOrAdmin<'_> {
    fn permits(&self, session: &Session) -> bool {
        session.is_admin() || session.user_id == self.0
    }

    fn describe(&self) -> String {
        "only the account holder or an admin may do this".into()
    }
}

#[derive(Clone)]
pub struct SessionService {
    database: Database,
}

impl SessionService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Mints a new bearer token for an existing user. Only the token's hash is
    /// stored; the plain token is returned once.
    pub fn issue_token(&self, user_id: &str) -> ForumResult<String> {
        let mut raw = [0u8; 32];
        rand::rng().fill_bytes(&mut raw);
        let token = URL_SAFE_NO_PAD.encode(raw);
        let token_hash = hash_token(&token);

        self.database.with_repositories(|repos| -> ForumResult<()> {
            if repos.users().get(user_id)?.is_none() {
                return Err(ForumError::not_found(format!("user {user_id} not found")));
            }
            repos
                .sessions()
                .create(&token_hash, user_id, &now_utc_iso())?;
            Ok(())
        })?;

        tracing::info!(user_id = %user_id, "issued session token");
        Ok(token)
    }

    /// Maps a bearer token to its session. Unknown tokens, and tokens whose
    /// user no longer exists, are `Unauthorized`.
    pub fn resolve(&self, token: &str) -> ForumResult<Session> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ForumError::Unauthorized);
        }
        let token_hash = hash_token(token);
        self.database.with_repositories(|repos| {
            let Some(user_id) = repos.sessions().user_id_for(&token_hash)? else {
                return Err(ForumError::Unauthorized);
            };
            let Some(user) = repos.users().get(&user_id)? else {
                return Err(ForumError::Unauthorized);
            };
            Ok(Session::new(user.id, user.role))
        })
    }

    /// Resolves the value of an `Authorization` header.
    pub fn resolve_header(&self, header: Option<&str>) -> ForumResult<Session> {
        let token = header
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(ForumError::Unauthorized)?;
        self.resolve(token)
    }
}

fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}
