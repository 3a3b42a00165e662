use chrono::{Duration, Utc};
use std::sync::Arc;

use crate::{
    util::random_string, Database, DatabaseError, DatabaseResult, NewSession, SessionData,
    UserData,
};

/// Resolves bearer tokens to caller identities
pub struct Auth {
    db: Arc<dyn Database>,
}

impl Auth {
    const SESSION_DURATION_IN_DAYS: i64 = 7;
    const TOKEN_LENGTH: usize = 32;
    const TOKEN_CHARSET: &'static [u8] =
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

    pub fn new(db: &Arc<dyn Database>) -> Self {
        Self { db: db.clone() }
    }

    /// Returns the identity behind a token.
    ///
    /// Unknown and expired tokens are not an error, they just have no identity.
    pub async fn identify(&self, token: &str) -> Result<Option<UserData>, DatabaseError> {
        let session = self.session(token).await.optional()?;

        Ok(session.map(|s| s.user))
    }

    /// Returns a session if it exists and hasn't expired
    pub async fn session(&self, token: &str) -> Result<SessionData, DatabaseError> {
        self.db.session_by_token(token).await
    }

    /// Registers a new session for an identity issued elsewhere
    pub async fn start_session(&self, user: UserData) -> Result<SessionData, DatabaseError> {
        let expires_at = Utc::now() + Duration::days(Self::SESSION_DURATION_IN_DAYS);

        let new_session = NewSession {
            token: random_string(Self::TOKEN_LENGTH, Self::TOKEN_CHARSET),
            user,
            expires_at,
        };

        self.db.create_session(new_session).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryDatabase;

    fn auth() -> (Auth, Arc<dyn Database>) {
        let db: Arc<dyn Database> = Arc::new(MemoryDatabase::new());

        (Auth::new(&db), db)
    }

    fn user() -> UserData {
        UserData {
            id: "A".to_string(),
            display_name: "Alice".to_string(),
        }
    }

    #[tokio::test]
    async fn test_started_session_identifies_user() {
        let (auth, _) = auth();

        let session = auth.start_session(user()).await.unwrap();
        let identity = auth.identify(&session.token).await.unwrap();

        assert_eq!(session.token.len(), Auth::TOKEN_LENGTH);
        assert_eq!(identity, Some(user()));
    }

    #[tokio::test]
    async fn test_unknown_and_expired_tokens_have_no_identity() {
        let (auth, db) = auth();
        db.create_session(NewSession {
            token: "expired".to_string(),
            user: user(),
            expires_at: Utc::now() - Duration::minutes(1),
        })
        .await
        .unwrap();

        assert_eq!(auth.identify("unknown").await.unwrap(), None);
        assert_eq!(auth.identify("expired").await.unwrap(), None);
    }
}
