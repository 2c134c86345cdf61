use std::{convert::Infallible, sync::Arc};

use serde_json::json;
use warp::{
    http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode},
    reject::{self, Rejection},
    reply::{self, Reply, Response},
    Filter,
};

use crate::{
    error::{Error, ErrorKind},
    form::FormData,
    store::Store,
    BODY_SIZE_LIMIT,
};

mod recipe;
mod user;

/// Every endpoint, with rejections rendered as JSON and requests logged
/// under `recipe_api::http`
pub fn routes<S: Store>(
    store: Arc<S>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    user::routes(store.clone())
        .or(recipe::routes(store))
        .unify()
        .recover(handle_rejection)
        .with(warp::log("recipe_api::http"))
}

fn with_store<S: Store>(
    store: Arc<S>,
) -> impl Filter<Extract = (Arc<S>,), Error = Infallible> + Clone {
    warp::any().map(move || store.clone())
}

/// A JSON object body of bounded size
fn json_body() -> impl Filter<Extract = (FormData,), Error = Rejection> + Clone {
    warp::body::content_length_limit(BODY_SIZE_LIMIT).and(warp::body::json())
}

fn json_reply<T: serde::Serialize>(value: &T, status: StatusCode) -> Response {
    reply::with_status(reply::json(value), status).into_response()
}

fn error_reply(error: &Error) -> Response {
    let mut response = json_reply(&error.body(), error.status());
    if error.kind == ErrorKind::Authorization {
        response
            .headers_mut()
            .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Token"));
    }
    response
}

fn detail(status: StatusCode, message: &str) -> Response {
    json_reply(&json!({ "detail": message }), status)
}

async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    if let Some(error) = err.find::<Error>() {
        if error.kind == ErrorKind::Internal {
            log::error!("Request failed: {error}");
        }
        return Ok(error_reply(error));
    }

    let response = if err.is_not_found() {
        detail(StatusCode::NOT_FOUND, "Not found.")
    } else if err.find::<warp::body::BodyDeserializeError>().is_some() {
        detail(StatusCode::BAD_REQUEST, "JSON parse error")
    } else if err.find::<reject::InvalidQuery>().is_some() {
        detail(StatusCode::BAD_REQUEST, "Invalid query string")
    } else if err.find::<reject::PayloadTooLarge>().is_some() {
        detail(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large")
    } else if err.find::<reject::LengthRequired>().is_some() {
        detail(StatusCode::LENGTH_REQUIRED, "Content-Length required")
    } else if err.find::<reject::UnsupportedMediaType>().is_some() {
        detail(StatusCode::UNSUPPORTED_MEDIA_TYPE, "Unsupported media type")
    } else if err.find::<reject::MethodNotAllowed>().is_some() {
        detail(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed.")
    } else {
        log::error!("Unhandled rejection: {err:?}");
        detail(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    };

    Ok(response)
}
