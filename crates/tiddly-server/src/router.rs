use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::handler;
use crate::state::AppState;

/// Build the axum router with every Tiddly Store endpoint.
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    let router = Router::new()
        .route("/v1/health", get(handler::health_handler))
        .route("/bags", get(handler::list_bags))
        .route(
            "/bags/:bag",
            get(handler::get_bag)
                .put(handler::put_bag)
                .delete(handler::delete_bag),
        )
        .route("/bags/:bag/tiddlers", get(handler::list_bag_tiddlers))
        .route(
            "/bags/:bag/tiddlers/:title",
            get(handler::get_bag_tiddler)
                .put(handler::put_bag_tiddler)
                .delete(handler::delete_bag_tiddler),
        )
        .route(
            "/bags/:bag/tiddlers/:title/revisions",
            get(handler::list_bag_revisions),
        )
        .route(
            "/bags/:bag/tiddlers/:title/revisions/:revision",
            get(handler::get_bag_revision),
        )
        .route("/recipes", get(handler::list_recipes))
        .route(
            "/recipes/:recipe",
            get(handler::get_recipe).put(handler::put_recipe),
        )
        .route("/recipes/:recipe/tiddlers", get(handler::list_recipe_tiddlers))
        .route(
            "/recipes/:recipe/tiddlers/:title",
            get(handler::get_recipe_tiddler)
                .put(handler::put_recipe_tiddler)
                .delete(handler::delete_recipe_tiddler),
        )
        .route(
            "/recipes/:recipe/tiddlers/:title/revisions",
            get(handler::list_recipe_revisions),
        )
        .route(
            "/recipes/:recipe/tiddlers/:title/revisions/:revision",
            get(handler::get_recipe_revision),
        )
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if config.permissive_cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}
