use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use api_types::{
    HealthResponse, LocationsQuery, LocationsResponse, UpdateLocationRequest,
    UpdateLocationResponse,
};
use axum::{
    Json, Router,
    extract::{
        ConnectInfo, FromRef, FromRequestParts, Query, Request, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::request::Parts,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::{
    AppState,
    cors::{CorsPolicy, rewrite_origin},
    error::RelayError,
    validation::validate_update,
};

pub fn create_router(state: AppState, cors: CorsPolicy) -> Router {
    let cors_layer = cors.layer();

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/updateLocation", post(update_location))
        .route("/locations", get(locations))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            enforce_rate_limit,
        ))
        // preflights are answered here and never reach the rate limiter
        .layer(cors_layer)
        .layer(middleware::from_fn_with_state(
            Arc::new(cors),
            rewrite_origin,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Whether forwarding headers name the real client. Off unless the relay
/// sits behind a proxy that sets them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProxyTrust(pub bool);

impl FromRef<AppState> for ProxyTrust {
    fn from_ref(state: &AppState) -> Self {
        state.proxy
    }
}

/// Who a request is charged to for rate limiting. The socket peer, unless
/// proxy headers are trusted and carry an edge-provided client address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientSource(pub String);

impl<S> FromRequestParts<S> for ClientSource
where
    S: Send + Sync,
    ProxyTrust: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let ProxyTrust(trusted) = ProxyTrust::from_ref(state);
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.split(',').next())
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        let forwarded = if trusted {
            header("cf-connecting-ip").or_else(|| header("x-forwarded-for"))
        } else {
            None
        };

        let source = forwarded
            .or_else(|| {
                parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip().to_string())
            })
            .unwrap_or_else(|| "unknown".to_string());

        Ok(Self(source))
    }
}

async fn enforce_rate_limit(
    State(state): State<AppState>,
    ClientSource(source): ClientSource,
    request: Request,
    next: Next,
) -> Result<Response, RelayError> {
    let now = state.clock.now_ms();
    if let Err(error) = state.limiter.check(&source, now).await {
        tracing::warn!(%source, "rate limit exceeded");
        return Err(error);
    }

    Ok(next.run(request).await)
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        active_games: state.store.active_games().await,
    })
}

async fn update_location(
    State(state): State<AppState>,
    payload: Result<Json<UpdateLocationRequest>, JsonRejection>,
) -> Result<Json<UpdateLocationResponse>, RelayError> {
    let Json(request) = payload.map_err(|rejection| {
        RelayError::validation(format!("Invalid request body: {}", rejection.body_text()))
    })?;

    let now = state.clock.now_ms();
    state.sweep(now).await;

    let position = validate_update(request, now).inspect_err(|error| {
        tracing::debug!(%error, "rejected location update");
    })?;

    tracing::debug!(
        game_code = %position.game_code,
        player_id = %position.player_id,
        role = %position.role,
        "location updated"
    );
    let player_count = state.store.upsert(position, now).await;

    Ok(Json(UpdateLocationResponse {
        success: true,
        player_count,
    }))
}

async fn locations(
    State(state): State<AppState>,
    query: Result<Query<LocationsQuery>, QueryRejection>,
) -> Result<Json<LocationsResponse>, RelayError> {
    let Query(query) = query.map_err(|rejection| RelayError::validation(rejection.body_text()))?;
    let game_code = query
        .game_code
        .filter(|code| !code.trim().is_empty())
        .ok_or_else(|| RelayError::validation("Missing required parameter: gameCode"))?;

    let now = state.clock.now_ms();
    state.sweep(now).await;

    let locations = state.store.list(&game_code, now).await;
    Ok(Json(LocationsResponse {
        count: locations.len(),
        locations,
    }))
}
