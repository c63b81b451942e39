// HTTP surface of the gateway client

use axum::{
    Router,
    extract::{Path, State},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use http::StatusCode;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::auth::claims::TokenClaims;
use crate::auth::extractor::bind_bearer_token;
use crate::auth::user::{LoginRequest, RegisterRequest, UserAuthenticator};
use crate::client::RequestDispatcher;
use crate::envelope::ResponseEnvelope;
use crate::services::{CreateOrganisationRequest, OrganisationClient};

pub struct AppState {
    pub dispatcher: RequestDispatcher,
    pub users: UserAuthenticator,
    pub organisations: OrganisationClient,
}

pub type SharedState = Arc<AppState>;

pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/me", get(me))
        .route(
            "/organisations",
            get(list_organisations).post(create_organisation),
        )
        .route("/organisations/{id}/agencies", get(list_agencies))
        .route(
            "/organisations/{id}/practical-infos/{info_id}",
            get(organisation_info),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(bind_bearer_token)),
        )
        .with_state(state)
}

impl IntoResponse for ResponseEnvelope {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

async fn health_check() -> Result<Json<Value>, StatusCode> {
    Ok(Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

async fn login(
    State(state): State<SharedState>,
    Json(credentials): Json<LoginRequest>,
) -> Response {
    match state.users.login(&credentials).await {
        Ok(session) => Json(session).into_response(),
        Err(err) => err.to_envelope().into_response(),
    }
}

async fn register(
    State(state): State<SharedState>,
    Json(registration): Json<RegisterRequest>,
) -> ResponseEnvelope {
    state.users.register(&registration).await
}

async fn me() -> Response {
    match TokenClaims::current().and_then(|claims| claims.summary()) {
        Ok(identity) => Json(identity).into_response(),
        Err(err) => {
            debug!(error = %err, "Identity lookup failed");
            ResponseEnvelope::new(401, err.to_string(), None).into_response()
        }
    }
}

async fn list_organisations(State(state): State<SharedState>) -> ResponseEnvelope {
    state.organisations.list_organisations().await
}

async fn create_organisation(
    State(state): State<SharedState>,
    Json(request): Json<CreateOrganisationRequest>,
) -> ResponseEnvelope {
    state.organisations.create_organisation(&request).await
}

async fn list_agencies(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ResponseEnvelope {
    state.organisations.list_agencies(&id).await
}

async fn organisation_info(
    State(state): State<SharedState>,
    Path((id, info_id)): Path<(String, String)>,
) -> ResponseEnvelope {
    state.organisations.organisation_info(&id, &info_id).await
}
