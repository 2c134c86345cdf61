use std::sync::Arc;

use warp::{http::StatusCode, reject::Rejection, reply::Response, Filter};

use super::{json_body, json_reply, with_store};
use crate::{
    actions::users,
    form::FormData,
    middleware::with_session,
    schema::{TokenResponse, UserProfile},
    session::SessionData,
    store::Store,
    token::obtain_token,
};

pub fn routes<S: Store>(
    store: Arc<S>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let create = warp::path!("user" / "create")
        .and(warp::post())
        .and(with_store(store.clone()))
        .and(json_body())
        .and_then(create_user::<S>);

    let token = warp::path!("user" / "token")
        .and(warp::post())
        .and(with_store(store.clone()))
        .and(json_body())
        .and_then(create_token::<S>);

    let me = warp::path!("user" / "me")
        .and(warp::get())
        .and(with_session(store.clone()))
        .and(with_store(store.clone()))
        .and_then(get_me::<S>);

    let update_me = warp::path!("user" / "me")
        .and(warp::patch())
        .and(with_session(store.clone()))
        .and(with_store(store))
        .and(json_body())
        .and_then(update_me::<S>);

    create.or(token).unify().or(me).unify().or(update_me).unify()
}

async fn create_user<S: Store>(store: Arc<S>, data: FormData) -> Result<Response, Rejection> {
    let user = users::register_user(&*store, data)
        .await
        .map_err(warp::reject::custom)?;

    Ok(json_reply(&UserProfile::from(&user), StatusCode::CREATED))
}

async fn create_token<S: Store>(store: Arc<S>, data: FormData) -> Result<Response, Rejection> {
    let token = obtain_token(&*store, data)
        .await
        .map_err(warp::reject::custom)?;

    Ok(json_reply(&TokenResponse { token }, StatusCode::OK))
}

async fn get_me<S: Store>(session: SessionData, store: Arc<S>) -> Result<Response, Rejection> {
    let user = users::get_profile(&*store, &session)
        .await
        .map_err(warp::reject::custom)?;

    Ok(json_reply(&UserProfile::from(&user), StatusCode::OK))
}

async fn update_me<S: Store>(
    session: SessionData,
    store: Arc<S>,
    data: FormData,
) -> Result<Response, Rejection> {
    let user = users::update_profile(&*store, &session, data)
        .await
        .map_err(warp::reject::custom)?;

    Ok(json_reply(&UserProfile::from(&user), StatusCode::OK))
}
