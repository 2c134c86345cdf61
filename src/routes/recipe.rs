use std::sync::Arc;

use warp::{
    http::StatusCode,
    reject::Rejection,
    reply::{self, Reply, Response},
    Filter,
};

use super::{json_body, json_reply, with_store};
use crate::{
    actions::{
        attributes,
        recipes::{self, UpdateMode},
    },
    error::Error,
    form::FormData,
    middleware::with_session,
    query::{AttributeFilter, QueryParams, RecipeFilter},
    schema::{AttributeKind, Id},
    session::SessionData,
    store::Store,
};

pub fn routes<S: Store>(
    store: Arc<S>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    attribute_routes(store.clone(), AttributeKind::Tag)
        .or(attribute_routes(store.clone(), AttributeKind::Ingredient))
        .unify()
        .or(recipe_routes(store))
        .unify()
}

/// `/recipe/tags` and `/recipe/ingredients`
fn attribute_routes<S: Store>(
    store: Arc<S>,
    kind: AttributeKind,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let path = warp::path("recipe")
        .and(warp::path(kind.table()))
        .and(warp::path::end());
    let kind = warp::any().map(move || kind);

    let list = path
        .clone()
        .and(warp::get())
        .and(with_session(store.clone()))
        .and(with_store(store.clone()))
        .and(kind.clone())
        .and(warp::query::<QueryParams>())
        .and_then(list_attributes::<S>);

    let create = path
        .and(warp::post())
        .and(with_session(store.clone()))
        .and(with_store(store))
        .and(kind)
        .and(json_body())
        .and_then(create_attribute::<S>);

    list.or(create).unify()
}

fn recipe_routes<S: Store>(
    store: Arc<S>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let collection = warp::path!("recipe" / "recipes");
    let member = warp::path!("recipe" / "recipes" / Id);

    let list = collection
        .clone()
        .and(warp::get())
        .and(with_session(store.clone()))
        .and(with_store(store.clone()))
        .and(warp::query::<QueryParams>())
        .and_then(list_recipes::<S>);

    let create = collection
        .and(warp::post())
        .and(with_session(store.clone()))
        .and(with_store(store.clone()))
        .and(json_body())
        .and_then(create_recipe::<S>);

    let detail = member
        .clone()
        .and(warp::get())
        .and(with_session(store.clone()))
        .and(with_store(store.clone()))
        .and_then(get_recipe::<S>);

    let full_update = member
        .clone()
        .and(warp::put())
        .and(with_session(store.clone()))
        .and(with_store(store.clone()))
        .and(json_body())
        .and(warp::any().map(|| UpdateMode::Full))
        .and_then(update_recipe::<S>);

    let partial_update = member
        .clone()
        .and(warp::patch())
        .and(with_session(store.clone()))
        .and(with_store(store.clone()))
        .and(json_body())
        .and(warp::any().map(|| UpdateMode::Partial))
        .and_then(update_recipe::<S>);

    let delete = member
        .and(warp::delete())
        .and(with_session(store.clone()))
        .and(with_store(store))
        .and_then(delete_recipe::<S>);

    list.or(create)
        .unify()
        .or(detail)
        .unify()
        .or(full_update)
        .unify()
        .or(partial_update)
        .unify()
        .or(delete)
        .unify()
}

fn invalid_params(error: impl Into<Error>) -> Rejection {
    warp::reject::custom(error.into())
}

async fn list_attributes<S: Store>(
    session: SessionData,
    store: Arc<S>,
    kind: AttributeKind,
    params: QueryParams,
) -> Result<Response, Rejection> {
    let filter = AttributeFilter::from_params(&params).map_err(invalid_params)?;
    let rows = attributes::list_attributes(&*store, &session, kind, filter)
        .await
        .map_err(warp::reject::custom)?;

    Ok(json_reply(&rows, StatusCode::OK))
}

async fn create_attribute<S: Store>(
    session: SessionData,
    store: Arc<S>,
    kind: AttributeKind,
    data: FormData,
) -> Result<Response, Rejection> {
    let row = attributes::create_attribute(&*store, &session, kind, data)
        .await
        .map_err(warp::reject::custom)?;

    Ok(json_reply(&row, StatusCode::CREATED))
}

async fn list_recipes<S: Store>(
    session: SessionData,
    store: Arc<S>,
    params: QueryParams,
) -> Result<Response, Rejection> {
    let filter = RecipeFilter::from_params(&params).map_err(invalid_params)?;
    let rows = recipes::list_recipes(&*store, &session, &filter)
        .await
        .map_err(warp::reject::custom)?;

    Ok(json_reply(&rows, StatusCode::OK))
}

async fn create_recipe<S: Store>(
    session: SessionData,
    store: Arc<S>,
    data: FormData,
) -> Result<Response, Rejection> {
    let recipe = recipes::create_recipe(&*store, &session, data)
        .await
        .map_err(warp::reject::custom)?;

    Ok(json_reply(&recipe, StatusCode::CREATED))
}

async fn get_recipe<S: Store>(
    id: Id,
    session: SessionData,
    store: Arc<S>,
) -> Result<Response, Rejection> {
    let recipe = recipes::get_recipe(&*store, &session, id)
        .await
        .map_err(warp::reject::custom)?;

    Ok(json_reply(&recipe, StatusCode::OK))
}

async fn update_recipe<S: Store>(
    id: Id,
    session: SessionData,
    store: Arc<S>,
    data: FormData,
    mode: UpdateMode,
) -> Result<Response, Rejection> {
    let recipe = recipes::update_recipe(&*store, &session, id, data, mode)
        .await
        .map_err(warp::reject::custom)?;

    Ok(json_reply(&recipe, StatusCode::OK))
}

async fn delete_recipe<S: Store>(
    id: Id,
    session: SessionData,
    store: Arc<S>,
) -> Result<Response, Rejection> {
    recipes::delete_recipe(&*store, &session, id)
        .await
        .map_err(warp::reject::custom)?;

    Ok(reply::with_status(reply::reply(), StatusCode::NO_CONTENT).into_response())
}
