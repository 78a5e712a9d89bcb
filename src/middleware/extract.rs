// src/middleware/extract.rs

use axum::{
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::common::error::AppError;

// ---
// Path id: anything that is not a UUID is a 400 in the envelope
// ---
#[derive(Debug, Clone, Copy)]
pub struct EntityId(pub Uuid);

impl<S> FromRequestParts<S> for EntityId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<Uuid>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::InvalidInput(rejection.body_text()))?;
        Ok(EntityId(id))
    }
}

// ---
// Query string
// ---
#[derive(Debug)]
pub struct QueryParams<T>(pub T);

impl<S, T> FromRequestParts<S> for QueryParams<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::InvalidInput(rejection.body_text()))?;
        Ok(QueryParams(value))
    }
}

// ---
// JSON body: malformed or mistyped bodies are a 422 in the envelope
// ---
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::UnprocessableEntity(rejection.body_text()))?;
        Ok(JsonBody(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, response::IntoResponse, routing::post, Router};
    use serde::Deserialize;
    use tower::ServiceExt;

    #[derive(Deserialize)]
    struct Echo {
        name: String,
    }

    async fn echo(EntityId(id): EntityId, JsonBody(body): JsonBody<Echo>) -> String {
        format!("{id}:{}", body.name)
    }

    fn app() -> Router {
        Router::new().route("/things/{id}", post(echo))
    }

    fn post_json(uri: &str, body: &str) -> axum::http::Request<Body> {
        axum::http::Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn bad_uuid_is_bad_request() {
        let res = app().oneshot(post_json("/things/not-a-uuid", r#"{"name":"x"}"#)).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_json_is_unprocessable() {
        let uri = format!("/things/{}", Uuid::new_v4());
        let res = app().oneshot(post_json(&uri, "{\"name\":")).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let res = app().oneshot(post_json(&uri, r#"{"name":42}"#)).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn well_formed_request_passes_through() {
        let id = Uuid::new_v4();
        let res = app()
            .oneshot(post_json(&format!("/things/{id}"), r#"{"name":"x"}"#))
            .await
            .unwrap()
            .into_response();
        assert_eq!(res.status(), StatusCode::OK);
    }
}
