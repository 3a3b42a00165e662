use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use quickdraw_collab::UserData;

use crate::{errors::ServerError, ServerContext};

/// The identity behind the request, if any.
///
/// A missing, malformed, unknown or expired token is not rejected here.
/// Each room operation decides whether it needs an identity.
pub struct Caller(Option<UserData>);

impl Caller {
    pub fn user(&self) -> Option<&UserData> {
        self.0.as_ref()
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|x| x.to_str().ok())?;

    let mut words = value.split_ascii_whitespace();

    match (words.next(), words.next(), words.next()) {
        (Some("Bearer"), Some(token), None) => Some(token),
        _ => None,
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
    ServerContext: FromRef<S>,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let context = ServerContext::from_ref(state);

        let Some(token) = bearer_token(parts) else {
            return Ok(Self(None));
        };

        let user = context.collab.auth.identify(token).await?;

        Ok(Self(user))
    }
}
