//! Main Gateway implementation
//!
//! Routes, shared state and the server loop.

use axum::{
    body::Bytes,
    extract::{Form, Query, State},
    http::header::SET_COOKIE,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use assist_core::integrations::{resolve_document_source, DocumentSource};
use assist_core::{
    AskPipeline, AssistConfig, ExchangeRecord, HistoryRecorder, Identity, IdentityService,
    LlamaInvoker, ModelInvoker, NewIdentity, Role, SqliteStore,
};

use crate::extract::{Authenticated, CurrentSession, Privileged};
use crate::session::{clear_cookie, session_cookie, CookieSigner, SessionManager};
use crate::views;
use crate::{GatewayError, Result};

/// Login failure message; never says which field was wrong
pub const INVALID_CREDENTIALS: &str = "Usuário ou senha inválidos";

const INVALID_JSON: &str = "JSON inválido";

const DEFAULT_DOCUMENT_LIMIT: usize = 10;
const MAX_DOCUMENT_LIMIT: usize = 50;
const DEFAULT_COLLECTION: &str = "Documents";

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Gateway state shared across handlers
#[derive(Clone)]
pub struct GatewayState {
    pub config: AssistConfig,
    pub sessions: Arc<SessionManager>,
    pub signer: CookieSigner,
    pub identities: IdentityService,
    pub pipeline: AskPipeline,
    pub documents: Arc<dyn DocumentSource>,
}

impl GatewayState {
    pub fn new(
        config: AssistConfig,
        store: Arc<SqliteStore>,
        invoker: Arc<dyn ModelInvoker>,
        documents: Arc<dyn DocumentSource>,
    ) -> Self {
        let recorder = HistoryRecorder::new(store.clone());

        Self {
            sessions: Arc::new(SessionManager::new(config.session.lifetime_secs)),
            signer: CookieSigner::new(config.secret_key.expose()),
            identities: IdentityService::new(store),
            pipeline: AskPipeline::new(invoker, recorder),
            documents,
            config,
        }
    }
}

/// Main Gateway
pub struct Gateway {
    state: Arc<GatewayState>,
}

impl Gateway {
    /// Create a gateway over an already opened store
    pub fn new(
        config: AssistConfig,
        store: Arc<SqliteStore>,
        invoker: Arc<dyn ModelInvoker>,
        documents: Arc<dyn DocumentSource>,
    ) -> Self {
        let state = Arc::new(GatewayState::new(config, store, invoker, documents));
        Self { state }
    }

    /// Open the store, seed the default accounts and wire the llama.cpp
    /// invoker and the configured document source.
    pub fn from_config(config: AssistConfig) -> Result<Self> {
        let location = config.store_location()?;
        let store = Arc::new(SqliteStore::open(&location)?);

        IdentityService::new(store.clone()).seed_defaults()?;

        let invoker: Arc<dyn ModelInvoker> = Arc::new(LlamaInvoker::new(config.model.clone()));
        let documents = resolve_document_source(&config.integrations);

        Ok(Self::new(config, store, invoker, documents))
    }

    /// Get gateway state
    pub fn state(&self) -> Arc<GatewayState> {
        self.state.clone()
    }

    /// Build the Axum router
    pub fn build_router(&self) -> Router {
        Router::new()
            .route("/", get(Self::handle_index))
            .route("/login", get(Self::handle_login_page).post(Self::handle_login))
            .route("/logout", get(Self::handle_logout))
            .route("/ask", post(Self::handle_ask))
            .route("/history", get(Self::handle_history))
            .route("/admin", get(Self::handle_admin))
            .route("/admin/users", get(Self::handle_list_users))
            .route("/admin/add_user", post(Self::handle_add_user))
            .route("/documents/search", get(Self::handle_document_search))
            .route("/documents/content", get(Self::handle_document_content))
            .route("/documents/recent", get(Self::handle_document_recent))
            .route("/documents/list", get(Self::handle_document_list))
            .route("/health", get(Self::handle_health))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Start the gateway server; returns after Ctrl-C
    pub async fn start(&self) -> Result<()> {
        let addr = self.state.config.socket_addr()?;
        let router = self.build_router();

        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Assistant gateway listening on http://{}", addr);

        let sessions = self.state.sessions.clone();
        let sweeper = tokio::spawn(async move {
            let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                let removed = sessions.cleanup_expired();
                if removed > 0 {
                    tracing::debug!(removed, "Expired sessions removed");
                }
            }
        });

        let served = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await;
        sweeper.abort();

        served.map_err(|e| GatewayError::Internal(e.to_string()))?;
        info!("Gateway stopped");
        Ok(())
    }

    // HTTP handlers

    async fn handle_index(session: CurrentSession) -> Html<&'static str> {
        if session.principal().is_some() {
            Html(views::INDEX)
        } else {
            Html(views::LOGIN)
        }
    }

    async fn handle_login_page() -> Html<&'static str> {
        Html(views::LOGIN)
    }

    async fn handle_login(
        State(state): State<Arc<GatewayState>>,
        previous: CurrentSession,
        Form(form): Form<LoginForm>,
    ) -> Result<Response> {
        let username = form.username.unwrap_or_default().trim().to_string();
        let password = form.password.unwrap_or_default();

        let identities = state.identities.clone();
        let identity =
            tokio::task::spawn_blocking(move || identities.authenticate(&username, &password)).await??;

        let Some(identity) = identity else {
            return Ok(Json(json!({ "success": false, "message": INVALID_CREDENTIALS })).into_response());
        };

        if let Some(old) = previous.0 {
            state.sessions.end_session(&old.id);
        }
        let session = state.sessions.create_session(identity.principal());
        let cookie = session_cookie(
            &state.signer.sign(&session.id),
            state.sessions.lifetime_secs(),
            state.config.session.cookie_secure,
        );
        tracing::debug!(username = %identity.username, "Session created");

        Ok((
            [(SET_COOKIE, cookie)],
            Json(json!({ "success": true, "redirect": "/" })),
        )
            .into_response())
    }

    async fn handle_logout(
        State(state): State<Arc<GatewayState>>,
        session: CurrentSession,
    ) -> Response {
        if let Some(session) = session.0 {
            state.sessions.end_session(&session.id);
            info!(username = %session.principal.username, "Logged out");
        }
        (
            [(SET_COOKIE, clear_cookie(state.config.session.cookie_secure))],
            Html(views::LOGIN),
        )
            .into_response()
    }

    async fn handle_ask(
        State(state): State<Arc<GatewayState>>,
        Authenticated(principal): Authenticated,
        body: Bytes,
    ) -> Result<Json<AskResponse>> {
        let request: AskRequest = parse_json(&body)?;
        let question = request.question.unwrap_or_default();

        // Detached so a client disconnect cannot drop a half-recorded exchange
        let pipeline = state.pipeline.clone();
        let username = principal.username;
        let exchange =
            tokio::spawn(async move { pipeline.ask(&username, &question).await }).await??;

        Ok(Json(AskResponse {
            response: exchange.answer().to_string(),
            timestamp: exchange.timestamp(),
        }))
    }

    async fn handle_history(
        State(state): State<Arc<GatewayState>>,
        Privileged(_): Privileged,
        Query(query): Query<HistoryQuery>,
    ) -> Result<Json<Vec<HistoryEntry>>> {
        let pipeline = state.pipeline.clone();
        let records =
            tokio::task::spawn_blocking(move || pipeline.recorder().recent(query.limit)).await??;

        Ok(Json(records.into_iter().map(HistoryEntry::from).collect()))
    }

    async fn handle_admin(Privileged(_): Privileged) -> Html<&'static str> {
        Html(views::ADMIN)
    }

    async fn handle_list_users(
        State(state): State<Arc<GatewayState>>,
        Privileged(_): Privileged,
    ) -> Result<Json<Vec<Identity>>> {
        let identities = state.identities.clone();
        let users = tokio::task::spawn_blocking(move || identities.list()).await??;
        Ok(Json(users))
    }

    async fn handle_add_user(
        State(state): State<Arc<GatewayState>>,
        Privileged(admin): Privileged,
        body: Bytes,
    ) -> Result<Json<serde_json::Value>> {
        let request: AddUserRequest = parse_json(&body)?;
        let new = NewIdentity {
            username: request.username.unwrap_or_default(),
            password: request.password.unwrap_or_default(),
            role: Role::parse(request.role.as_deref())?,
            email: request.email,
            full_name: request.full_name,
            department: request.department,
        };

        let identities = state.identities.clone();
        let created = tokio::task::spawn_blocking(move || identities.create(new)).await??;
        info!(admin = %admin.username, username = %created.username, role = %created.role, "User added");

        Ok(Json(json!({ "success": true })))
    }

    async fn handle_document_search(
        State(state): State<Arc<GatewayState>>,
        Authenticated(principal): Authenticated,
        Query(query): Query<SearchQuery>,
    ) -> Json<serde_json::Value> {
        let limit = document_limit(query.limit);
        let results = state.documents.search(query.q.trim(), limit).await;
        tracing::debug!(user = %principal.username, hits = results.len(), "Document search");

        Json(json!({
            "source": state.documents.kind().as_str(),
            "results": results,
        }))
    }

    async fn handle_document_content(
        State(state): State<Arc<GatewayState>>,
        Authenticated(_): Authenticated,
        Query(query): Query<ContentQuery>,
    ) -> Result<Json<serde_json::Value>> {
        if query.location.trim().is_empty() {
            return Err(GatewayError::BadRequest("Documento não informado".to_string()));
        }
        let content = state.documents.read(&query.location).await;

        Ok(Json(json!({
            "source": state.documents.kind().as_str(),
            "content": content,
        })))
    }

    async fn handle_document_recent(
        State(state): State<Arc<GatewayState>>,
        Authenticated(_): Authenticated,
        Query(query): Query<RecentQuery>,
    ) -> Json<serde_json::Value> {
        let collection = query
            .collection
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_COLLECTION.to_string());
        let results = state
            .documents
            .recent(&collection, document_limit(query.limit))
            .await;

        Json(json!({
            "source": state.documents.kind().as_str(),
            "results": results,
        }))
    }

    async fn handle_document_list(
        State(state): State<Arc<GatewayState>>,
        Authenticated(_): Authenticated,
        Query(query): Query<ListQuery>,
    ) -> Json<serde_json::Value> {
        let pattern = query.pattern.as_deref().filter(|p| !p.trim().is_empty()).unwrap_or("*");
        let results = state.documents.list(&query.path, pattern).await;

        Json(json!({
            "source": state.documents.kind().as_str(),
            "results": results,
        }))
    }

    async fn handle_health() -> impl IntoResponse {
        Json(json!({
            "status": "healthy",
            "version": crate::VERSION
        }))
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!("Rejected request body: {}", e);
        GatewayError::BadRequest(INVALID_JSON.to_string())
    })
}

fn document_limit(requested: Option<usize>) -> usize {
    requested
        .unwrap_or(DEFAULT_DOCUMENT_LIMIT)
        .clamp(1, MAX_DOCUMENT_LIMIT)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Could not listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

// Request and response bodies

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AskResponse {
    pub response: String,
    pub timestamp: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// One row of `/history`
#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub user: String,
    pub question: String,
    pub response: String,
    pub directive: String,
    pub timestamp: String,
}

impl From<ExchangeRecord> for HistoryEntry {
    fn from(record: ExchangeRecord) -> Self {
        Self {
            timestamp: record.timestamp(),
            id: record.id,
            directive: record.directive.as_str().to_string(),
            user: record.username,
            question: record.question,
            response: record.response,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AddUserRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub department: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ContentQuery {
    #[serde(default)]
    pub location: String,
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub collection: Option<String>,
    pub limit: Option<usize>,
}

/// Folder listing; an empty path is the share root
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub path: String,
    pub pattern: Option<String>,
}
