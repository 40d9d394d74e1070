//! Request extractors.

use std::sync::Arc;

use axum::async_trait;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;

use super::error::ApiError;
use crate::app::App;
use crate::core::Actor;

/// Header carrying the id of the user authenticated by the upstream proxy.
pub const USER_HEADER: &str = "x-user-id";

/// The authenticated, active user making the request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Actor);

#[async_trait]
impl FromRequestParts<Arc<App>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, app: &Arc<App>) -> Result<Self, ApiError> {
        let user_id = parts.headers.get(USER_HEADER).and_then(|v| v.to_str().ok());
        Ok(Self(app.authenticate(user_id)?))
    }
}

/// A JSON body whose rejections use the error envelope.
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, ApiError> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}
