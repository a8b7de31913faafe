use anyhow::Result;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tracing::{debug, error};

use crate::auth::{AccessKey, AuthTokenValue, SessionStore};
use crate::chat::{ChatService, MessageBody};
use crate::config::MatchingConfig;
use crate::match_store::FullMatchStore;
use crate::matching::{MatchStatus, MatchingError, MatchmakingService};
use crate::realtime::RealtimeNotifier;
use crate::taste::{AudioStats, TasteProfile, TasteProfileStore, TopArtist};
use axum_extra::extract::cookie::{Cookie, SameSite};

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{response, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

#[cfg(feature = "slowdown")]
use super::slowdown_request;
use super::{log_requests, session::Session, state::*, RequestsLoggingLevel, ServerConfig};

const DEFAULT_MESSAGES_LIMIT: usize = 100;

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub user_id: Option<String>,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Deserialize, Debug)]
struct LoginBody {
    pub user_id: String,
    pub access_key: String,
}

#[derive(Serialize)]
struct LoginSuccessResponse {
    token: String,
}

#[derive(Deserialize, Debug)]
struct ProfileBody {
    #[serde(default)]
    pub top_artists: Vec<TopArtist>,
    #[serde(default)]
    pub top_genres: Vec<String>,
    #[serde(default)]
    pub audio_stats: AudioStats,
}

#[derive(Deserialize, Debug)]
struct DiscoverParams {
    pub limit: Option<usize>,
    pub min_score: Option<u8>,
}

#[derive(Deserialize, Debug)]
struct CreateMatchBody {
    pub target_user_id: String,
}

#[derive(Deserialize, Debug)]
struct UpdateStatusBody {
    pub status: MatchStatus,
}

#[derive(Deserialize, Debug)]
struct MessagesParams {
    pub limit: Option<usize>,
}

#[derive(Serialize)]
struct MarkReadResponse {
    updated: usize,
}

/// Single place where domain errors become HTTP statuses.
fn error_response(err: MatchingError) -> Response {
    match err {
        MatchingError::InvalidProfile { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()).into_response()
        }
        MatchingError::SelfMatch(_) | MatchingError::InvalidMessage(_) => {
            (StatusCode::BAD_REQUEST, err.to_string()).into_response()
        }
        // The conflict body carries the existing match so clients can
        // recover without a second round trip
        MatchingError::DuplicateMatch { existing } => {
            (StatusCode::CONFLICT, Json(existing)).into_response()
        }
        MatchingError::InvalidTransition { .. } | MatchingError::MatchNotAccepted(_) => {
            (StatusCode::CONFLICT, err.to_string()).into_response()
        }
        MatchingError::NotFound(_) => StatusCode::NOT_FOUND.into_response(),
        MatchingError::Forbidden { .. } => StatusCode::FORBIDDEN.into_response(),
        MatchingError::Store(e) => {
            error!("Storage error: {:#}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn home(session: Option<Session>, State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        user_id: session.map(|s| s.user_id),
    };
    Json(stats)
}

async fn login(
    State(sessions): State<GuardedSessionStore>,
    Json(body): Json<LoginBody>,
) -> Response {
    debug!("login() called for user {}", body.user_id);
    let key = AccessKey(body.access_key);
    match sessions.verify_access(&body.user_id, &key) {
        Ok(true) => {}
        Ok(false) => return StatusCode::FORBIDDEN.into_response(),
        Err(err) => {
            error!("Error verifying access: {}", err);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    match sessions.create_token(&body.user_id) {
        Ok(auth_token) => {
            let response_body = LoginSuccessResponse {
                token: auth_token.value.0.clone(),
            };
            let response_body = serde_json::to_string(&response_body).unwrap();

            let cookie_value = HeaderValue::from_str(&format!(
                "session_token={}; Path=/; HttpOnly",
                auth_token.value.0
            ))
            .unwrap();
            response::Builder::new()
                .status(StatusCode::CREATED)
                .header(axum::http::header::SET_COOKIE, cookie_value)
                .body(Body::from(response_body))
                .unwrap()
        }
        Err(err) => {
            error!("Error with auth token generation: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn logout(State(sessions): State<GuardedSessionStore>, session: Session) -> Response {
    match sessions.delete_token(&AuthTokenValue(session.token)) {
        Ok(_) => {
            let cookie_value = Cookie::build(Cookie::new("session_token", ""))
                .path("/")
                .expires(time::OffsetDateTime::now_utc() - time::Duration::days(1)) // Expire it in the past
                .same_site(SameSite::Lax)
                .build();

            response::Builder::new()
                .status(StatusCode::OK)
                .header(axum::http::header::SET_COOKIE, cookie_value.to_string())
                .body(Body::empty())
                .unwrap()
        }
        Err(_) => StatusCode::BAD_REQUEST.into_response(),
    }
}

async fn put_profile(
    session: Session,
    State(taste_store): State<GuardedTasteStore>,
    Json(body): Json<ProfileBody>,
) -> Response {
    let profile = TasteProfile {
        user_id: session.user_id,
        top_artists: body.top_artists,
        top_genres: body.top_genres,
        audio_stats: body.audio_stats,
    };
    if let Err(reason) = profile.validate() {
        return error_response(MatchingError::InvalidProfile {
            user_id: profile.user_id,
            reason,
        });
    }
    match taste_store.upsert_profile(&profile) {
        Ok(()) => Json(profile).into_response(),
        Err(err) => error_response(MatchingError::Store(err)),
    }
}

async fn get_profile(session: Session, State(taste_store): State<GuardedTasteStore>) -> Response {
    match taste_store.get_profile(&session.user_id) {
        Ok(Some(profile)) => Json(profile).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => error_response(MatchingError::Store(err)),
    }
}

async fn discover(
    session: Session,
    State(matchmaking): State<GuardedMatchmaking>,
    Query(params): Query<DiscoverParams>,
) -> Response {
    match matchmaking.discover(&session.user_id, params.limit, params.min_score) {
        Ok(feed) => Json(feed).into_response(),
        Err(err) => error_response(err),
    }
}

async fn get_matches(session: Session, State(matchmaking): State<GuardedMatchmaking>) -> Response {
    match matchmaking.list_matches(&session.user_id) {
        Ok(matches) => Json(matches).into_response(),
        Err(err) => error_response(err),
    }
}

async fn create_match(
    session: Session,
    State(matchmaking): State<GuardedMatchmaking>,
    Json(body): Json<CreateMatchBody>,
) -> Response {
    match matchmaking.create_match(&session.user_id, &body.target_user_id) {
        Ok(m) => (StatusCode::CREATED, Json(m)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn get_match(
    session: Session,
    State(matchmaking): State<GuardedMatchmaking>,
    Path(id): Path<String>,
) -> Response {
    match matchmaking.get_match(&id, &session.user_id) {
        Ok(details) => Json(details).into_response(),
        Err(err) => error_response(err),
    }
}

async fn put_match_status(
    session: Session,
    State(matchmaking): State<GuardedMatchmaking>,
    Path(id): Path<String>,
    Json(body): Json<UpdateStatusBody>,
) -> Response {
    match matchmaking.update_status(&id, body.status, &session.user_id) {
        Ok(m) => Json(m).into_response(),
        Err(err) => error_response(err),
    }
}

async fn delete_match(
    session: Session,
    State(matchmaking): State<GuardedMatchmaking>,
    Path(id): Path<String>,
) -> Response {
    match matchmaking.delete_match(&id, &session.user_id) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => error_response(err),
    }
}

async fn post_message(
    session: Session,
    State(chat): State<GuardedChatService>,
    Path(id): Path<String>,
    Json(body): Json<MessageBody>,
) -> Response {
    match chat.send_message(&id, &session.user_id, body).await {
        Ok(message) => (StatusCode::CREATED, Json(message)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn get_messages(
    session: Session,
    State(chat): State<GuardedChatService>,
    Path(id): Path<String>,
    Query(params): Query<MessagesParams>,
) -> Response {
    let limit = params.limit.unwrap_or(DEFAULT_MESSAGES_LIMIT);
    match chat.get_messages(&id, &session.user_id, limit) {
        Ok(messages) => Json(messages).into_response(),
        Err(err) => error_response(err),
    }
}

async fn mark_read(
    session: Session,
    State(chat): State<GuardedChatService>,
    Path(id): Path<String>,
) -> Response {
    match chat.mark_read(&id, &session.user_id) {
        Ok(updated) => Json(MarkReadResponse { updated }).into_response(),
        Err(err) => error_response(err),
    }
}

async fn delete_message(
    session: Session,
    State(chat): State<GuardedChatService>,
    Path(id): Path<String>,
) -> Response {
    match chat.delete_message(&id, &session.user_id) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => error_response(err),
    }
}

async fn get_conversations(session: Session, State(chat): State<GuardedChatService>) -> Response {
    match chat.conversations(&session.user_id) {
        Ok(conversations) => Json(conversations).into_response(),
        Err(err) => error_response(err),
    }
}

fn make_app<S: FullMatchStore + 'static>(
    config: ServerConfig,
    matching_config: &MatchingConfig,
    taste_store: Arc<dyn TasteProfileStore>,
    match_store: Arc<S>,
    session_store: Arc<dyn SessionStore>,
    notifier: Arc<dyn RealtimeNotifier>,
) -> Result<Router> {
    let strategy = matching_config.build_strategy()?;
    let matchmaking = Arc::new(MatchmakingService::new(
        taste_store.clone(),
        match_store.clone(),
        strategy,
        matching_config.rank_options(),
    ));
    let chat = Arc::new(ChatService::new(match_store, notifier));
    let state = ServerState {
        config: config.clone(),
        start_time: Instant::now(),
        taste_store,
        sessions: session_store,
        matchmaking,
        chat,
    };

    let auth_routes: Router = Router::new()
        .route("/login", post(login))
        .route("/logout", get(logout))
        .with_state(state.clone());

    let api_routes: Router = Router::new()
        .route("/profile", put(put_profile))
        .route("/profile", get(get_profile))
        .route("/discover", get(discover))
        .route("/matches", get(get_matches))
        .route("/match", post(create_match))
        .route("/match/{id}", get(get_match))
        .route("/match/{id}", delete(delete_match))
        .route("/match/{id}/status", put(put_match_status))
        .route("/match/{id}/messages", post(post_message))
        .route("/match/{id}/messages", get(get_messages))
        .route("/match/{id}/read", post(mark_read))
        .route("/message/{id}", delete(delete_message))
        .route("/conversations", get(get_conversations))
        .with_state(state.clone());

    let home_router: Router = Router::new()
        .route("/", get(home))
        .with_state(state.clone());

    let mut app: Router = home_router
        .nest("/v1/auth", auth_routes)
        .nest("/v1", api_routes);

    #[cfg(feature = "slowdown")]
    {
        app = app.layer(middleware::from_fn(slowdown_request));
    }
    app = app.layer(middleware::from_fn_with_state(state.clone(), log_requests));

    Ok(app)
}

pub async fn run_server<S: FullMatchStore + 'static>(
    taste_store: Arc<dyn TasteProfileStore>,
    match_store: Arc<S>,
    session_store: Arc<dyn SessionStore>,
    notifier: Arc<dyn RealtimeNotifier>,
    matching_config: &MatchingConfig,
    requests_logging_level: RequestsLoggingLevel,
    port: u16,
) -> Result<()> {
    let config = ServerConfig {
        port,
        requests_logging_level,
    };
    let app = make_app(
        config,
        matching_config,
        taste_store,
        match_store,
        session_store,
        notifier,
    )?;

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port))
        .await
        .unwrap();

    Ok(axum::serve(listener, app).await?)
}
