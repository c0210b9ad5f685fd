use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use bytes::Bytes;
use serde_json::json;

use tiddly_codec::segment::encode as encode_segment;
use tiddly_codec::CodecError;
use tiddly_core::{CoreError, Location, Precondition, Rendered, Target, TiddlerPut};
use tiddly_model::Revision;

use crate::error::{ServerError, ServerResult};
use crate::state::{AppState, Caller};

/// Health check handler.
pub async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// --- Bags ---

pub async fn list_bags(
    State(state): State<AppState>,
    Caller(who): Caller,
    headers: HeaderMap,
) -> ServerResult<Response> {
    let accept = accept(&headers);
    state.core.negotiate(accept)?;
    let names = state.core.list_bags(&who).await?;
    Ok(respond(state.core.encode_names(accept, &names)?))
}

pub async fn get_bag(
    State(state): State<AppState>,
    Caller(who): Caller,
    Path(bag): Path<String>,
    headers: HeaderMap,
) -> ServerResult<Response> {
    let accept = accept(&headers);
    state.core.negotiate(accept)?;
    let bag = state.core.get_bag(&bag, &who).await?;
    Ok(respond(state.core.encode_bag(accept, &bag)?))
}

pub async fn put_bag(
    State(state): State<AppState>,
    Caller(who): Caller,
    Path(bag): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ServerResult<Response> {
    let body = utf8(&body)?;
    let bag = state
        .core
        .put_bag(&bag, body, content_type(&headers)?, &who)
        .await?;
    created(format!("/bags/{}", encode_segment(&bag.name)), None)
}

pub async fn delete_bag(
    State(state): State<AppState>,
    Caller(who): Caller,
    Path(bag): Path<String>,
) -> ServerResult<Response> {
    state.core.delete_bag(&bag, &who).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn list_bag_tiddlers(
    State(state): State<AppState>,
    caller: Caller,
    Path(bag): Path<String>,
    headers: HeaderMap,
) -> ServerResult<Response> {
    list_tiddlers(&state, caller, Target::Bag(bag), &headers).await
}

pub async fn get_bag_tiddler(
    State(state): State<AppState>,
    caller: Caller,
    Path((bag, title)): Path<(String, String)>,
    headers: HeaderMap,
) -> ServerResult<Response> {
    let (title, accept) = by_extension(&state, &title, &headers);
    get_tiddler(&state, caller, Target::Bag(bag), title, None, accept).await
}

pub async fn put_bag_tiddler(
    State(state): State<AppState>,
    caller: Caller,
    Path((bag, title)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> ServerResult<Response> {
    put_tiddler(&state, caller, Target::Bag(bag), &title, &headers, &body).await
}

pub async fn delete_bag_tiddler(
    State(state): State<AppState>,
    caller: Caller,
    Path((bag, title)): Path<(String, String)>,
) -> ServerResult<Response> {
    delete_tiddler(&state, caller, Target::Bag(bag), &title).await
}

pub async fn list_bag_revisions(
    State(state): State<AppState>,
    caller: Caller,
    Path((bag, title)): Path<(String, String)>,
    headers: HeaderMap,
) -> ServerResult<Response> {
    let (title, accept) = by_extension(&state, &title, &headers);
    list_revisions(&state, caller, Target::Bag(bag), title, accept).await
}

pub async fn get_bag_revision(
    State(state): State<AppState>,
    caller: Caller,
    Path((bag, title, revision)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> ServerResult<Response> {
    let (revision, accept) = by_extension(&state, &revision, &headers);
    let target = Target::Bag(bag);
    let revision = revision_segment(&target, &title, revision)?;
    get_tiddler(&state, caller, target, &title, Some(revision), accept).await
}

// --- Recipes ---

pub async fn list_recipes(
    State(state): State<AppState>,
    Caller(who): Caller,
    headers: HeaderMap,
) -> ServerResult<Response> {
    let accept = accept(&headers);
    state.core.negotiate(accept)?;
    let names = state.core.list_recipes(&who).await?;
    Ok(respond(state.core.encode_names(accept, &names)?))
}

pub async fn get_recipe(
    State(state): State<AppState>,
    Caller(who): Caller,
    Path(recipe): Path<String>,
    headers: HeaderMap,
) -> ServerResult<Response> {
    let accept = accept(&headers);
    state.core.negotiate(accept)?;
    let recipe = state.core.get_recipe(&recipe, &who).await?;
    Ok(respond(state.core.encode_recipe(accept, &recipe)?))
}

pub async fn put_recipe(
    State(state): State<AppState>,
    Caller(who): Caller,
    Path(recipe): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ServerResult<Response> {
    let body = utf8(&body)?;
    let recipe = state
        .core
        .put_recipe(&recipe, body, content_type(&headers)?, &who)
        .await?;
    created(format!("/recipes/{}", encode_segment(&recipe.name)), None)
}

pub async fn list_recipe_tiddlers(
    State(state): State<AppState>,
    caller: Caller,
    Path(recipe): Path<String>,
    headers: HeaderMap,
) -> ServerResult<Response> {
    list_tiddlers(&state, caller, Target::Recipe(recipe), &headers).await
}

pub async fn get_recipe_tiddler(
    State(state): State<AppState>,
    caller: Caller,
    Path((recipe, title)): Path<(String, String)>,
    headers: HeaderMap,
) -> ServerResult<Response> {
    let (title, accept) = by_extension(&state, &title, &headers);
    get_tiddler(&state, caller, Target::Recipe(recipe), title, None, accept).await
}

pub async fn put_recipe_tiddler(
    State(state): State<AppState>,
    caller: Caller,
    Path((recipe, title)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> ServerResult<Response> {
    put_tiddler(&state, caller, Target::Recipe(recipe), &title, &headers, &body).await
}

pub async fn delete_recipe_tiddler(
    State(state): State<AppState>,
    caller: Caller,
    Path((recipe, title)): Path<(String, String)>,
) -> ServerResult<Response> {
    delete_tiddler(&state, caller, Target::Recipe(recipe), &title).await
}

pub async fn list_recipe_revisions(
    State(state): State<AppState>,
    caller: Caller,
    Path((recipe, title)): Path<(String, String)>,
    headers: HeaderMap,
) -> ServerResult<Response> {
    let (title, accept) = by_extension(&state, &title, &headers);
    list_revisions(&state, caller, Target::Recipe(recipe), title, accept).await
}

pub async fn get_recipe_revision(
    State(state): State<AppState>,
    caller: Caller,
    Path((recipe, title, revision)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> ServerResult<Response> {
    let (revision, accept) = by_extension(&state, &revision, &headers);
    let target = Target::Recipe(recipe);
    let revision = revision_segment(&target, &title, revision)?;
    get_tiddler(&state, caller, target, &title, Some(revision), accept).await
}

// --- Shared tiddler handling ---

async fn list_tiddlers(
    state: &AppState,
    Caller(who): Caller,
    target: Target,
    headers: &HeaderMap,
) -> ServerResult<Response> {
    let accept = accept(headers);
    state.core.negotiate(accept)?;
    let tiddlers = state.core.list_tiddlers(&target, &who).await?;
    Ok(respond(state.core.encode_tiddlers(accept, &tiddlers)?))
}

async fn get_tiddler(
    state: &AppState,
    Caller(who): Caller,
    target: Target,
    title: &str,
    revision: Option<Revision>,
    accept: Option<&str>,
) -> ServerResult<Response> {
    state.core.negotiate(accept)?;
    let tiddler = state.core.get_tiddler(&target, title, revision, &who).await?;
    let mut response = respond(state.core.encode_tiddler(accept, &tiddler)?);
    if let Some(etag) = tiddler.revision.and_then(etag) {
        response.headers_mut().insert(header::ETAG, etag);
    }
    Ok(response)
}

async fn put_tiddler(
    state: &AppState,
    Caller(who): Caller,
    target: Target,
    title: &str,
    headers: &HeaderMap,
    body: &Bytes,
) -> ServerResult<Response> {
    let put = TiddlerPut {
        body: utf8(body)?,
        content_type: content_type(headers)?,
        precondition: if_match(headers)?,
    };
    let written = state.core.put_tiddler(&target, title, put, &who).await?;
    let location = format!(
        "/bags/{}/tiddlers/{}",
        encode_segment(&written.bag),
        encode_segment(&written.title)
    );
    created(location, Some(written.revision))
}

async fn delete_tiddler(
    state: &AppState,
    Caller(who): Caller,
    target: Target,
    title: &str,
) -> ServerResult<Response> {
    state.core.delete_tiddler(&target, title, &who).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn list_revisions(
    state: &AppState,
    Caller(who): Caller,
    target: Target,
    title: &str,
    accept: Option<&str>,
) -> ServerResult<Response> {
    state.core.negotiate(accept)?;
    let history = state.core.list_revisions(&target, title, &who).await?;
    Ok(respond(state.core.encode_tiddlers(accept, &history)?))
}

// --- Helpers ---

fn accept(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::ACCEPT).and_then(|v| v.to_str().ok())
}

/// A registered extension on a read path's last segment, as in `soup.txt`,
/// selects the response format in place of `Accept`.
fn by_extension<'a>(
    state: &AppState,
    segment: &'a str,
    headers: &'a HeaderMap,
) -> (&'a str, Option<&'a str>) {
    match state.core.codecs().split_extension(segment) {
        Some((stem, media_type)) => (stem, Some(media_type)),
        None => (segment, accept(headers)),
    }
}

fn content_type(headers: &HeaderMap) -> ServerResult<&str> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            CoreError::from(CodecError::UnsupportedMediaType("missing content type".into())).into()
        })
}

/// `If-Match: "3"` pins the revision a write expects to replace;
/// `If-Match: *` only requires that the tiddler exists.
fn if_match(headers: &HeaderMap) -> ServerResult<Precondition> {
    let Some(value) = headers.get(header::IF_MATCH) else {
        return Ok(Precondition::None);
    };
    let raw = value
        .to_str()
        .map_err(|_| ServerError::BadRequest("If-Match is not ASCII".into()))?
        .trim()
        .trim_start_matches("W/")
        .trim_matches('"');
    if raw == "*" {
        return Ok(Precondition::Exists);
    }
    let number: i64 = raw
        .parse()
        .map_err(|_| ServerError::BadRequest(format!("If-Match {raw:?} is not a revision")))?;
    Ok(Precondition::Latest(
        Revision::new(number).map_err(CoreError::from)?,
    ))
}

/// A segment that is not a number names no revision of the tiddler; a
/// number below 1 is invalid.
fn revision_segment(target: &Target, title: &str, raw: &str) -> ServerResult<Revision> {
    let number: i64 = raw.parse().map_err(|_| CoreError::NotFound {
        location: Location::tiddler(target, title),
        detail: format!("{raw} is not a revision of {title}"),
    })?;
    Ok(Revision::new(number).map_err(CoreError::from)?)
}

fn utf8(body: &Bytes) -> ServerResult<&str> {
    std::str::from_utf8(body).map_err(|_| ServerError::BadRequest("body is not UTF-8".into()))
}

fn etag(revision: Revision) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!("\"{revision}\"")).ok()
}

fn respond(rendered: Rendered) -> Response {
    ([(header::CONTENT_TYPE, rendered.media_type)], rendered.body).into_response()
}

fn created(location: String, revision: Option<Revision>) -> ServerResult<Response> {
    let location = HeaderValue::from_str(&location)
        .map_err(|e| ServerError::Internal(format!("bad location header: {e}")))?;
    let mut response = StatusCode::NO_CONTENT.into_response();
    response.headers_mut().insert(header::LOCATION, location);
    if let Some(etag) = revision.and_then(etag) {
        response.headers_mut().insert(header::ETAG, etag);
    }
    Ok(response)
}
