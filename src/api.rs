// 🌐 REST client - the backend's /api/v1 endpoints
//
// Every request carries the session's bearer token when there is one.
// A 401/403 on a non-auth endpoint flags the session as expired and records
// where the user was; redirecting is left to the gate on next navigation.

use crate::client::{ClientPayload, ClientRecord, ClientSummary};
use crate::config::Config;
use crate::error::ApiError;
use crate::normalizer::{normalize_many, normalize_one, normalize_summaries};
use crate::session::{Session, SessionStore, UserInfo};
use reqwest::{Client, Method, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

const CLIENTS_PATH: &str = "/api/v1/clients";
const LOGIN_PATH: &str = "/api/v1/auth/login";

/// Auth endpoints never flag the session as expired.
fn is_auth_route(path: &str) -> bool {
    path.contains("/login") || path.contains("/refresh-token")
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    user: Option<UserInfo>,
    #[serde(default)]
    message: Option<String>,
}

// ============================================================================
// USER-FACING MESSAGES
// ============================================================================

/// The user action a request was made for; decides the message shown on
/// failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientAction {
    List,
    Load,
    Create,
    Update,
    Delete,
}

impl ClientAction {
    pub fn user_message(&self, error: &ApiError) -> String {
        match (self, error) {
            (ClientAction::Delete, ApiError::Auth { status: 403, .. }) => {
                "no permission to delete clients".to_string()
            }
            (ClientAction::Create | ClientAction::Update, ApiError::Auth { .. }) => {
                "session expired or no permission, please log in again".to_string()
            }
            (_, ApiError::Auth { .. }) => "session expired, please log in again".to_string(),
            (ClientAction::Create | ClientAction::Update, ApiError::Status { message: Some(message), .. }) => {
                message.clone()
            }
            _ => self.generic_message().to_string(),
        }
    }

    fn generic_message(&self) -> &'static str {
        match self {
            ClientAction::List => "could not load the client list",
            ClientAction::Load => "could not load client data, please try again",
            ClientAction::Create => "failed to create client",
            ClientAction::Update => "failed to update client",
            ClientAction::Delete => "failed to delete client",
        }
    }
}

// ============================================================================
// API CLIENT
// ============================================================================

pub struct ApiClient<S: SessionStore> {
    http: Client,
    base_url: Url,
    session: Arc<Session<S>>,
    location: Option<String>,
}

impl<S: SessionStore> Clone for ApiClient<S> {
    fn clone(&self) -> Self {
        ApiClient {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            session: Arc::clone(&self.session),
            location: self.location.clone(),
        }
    }
}

impl<S: SessionStore> ApiClient<S> {
    pub fn new(config: &Config, session: Arc<Session<S>>) -> Result<Self, ApiError> {
        let base_url = Url::parse(&config.api_url).map_err(|e| ApiError::Url(e.to_string()))?;
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(ApiClient {
            http,
            base_url,
            session,
            location: None,
        })
    }

    /// Same client, remembering `location` as the place to come back to if
    /// the session turns out to be expired.
    pub fn at(&self, location: &str) -> Self {
        let mut client = self.clone();
        client.location = Some(location.to_string());
        client
    }

    pub fn session(&self) -> &Session<S> {
        &self.session
    }

    /// Endpoint URL under the configured base, keeping any path prefix it
    /// has. `id` is pushed as a single encoded segment.
    fn url(&self, path: &str, id: Option<&str>) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ApiError::Url(format!("{} cannot be a base URL", self.base_url)))?;
            segments.pop_if_empty();
            segments.extend(path.split('/').filter(|s| !s.is_empty()));
            if let Some(id) = id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        id: Option<&str>,
        body: Option<&B>,
    ) -> Result<Value, ApiError> {
        let url = self.url(path, id)?;
        tracing::debug!(%method, %url, "api request");

        let mut request = self.http.request(method.clone(), url);
        if let Some(token) = self.session.token() {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            tracing::warn!(%method, path, error = %e, "api request failed");
            ApiError::Network(e)
        })?;
        let status = response.status();
        let bytes = response.bytes().await?;
        let payload = parse_body(&bytes);

        if status.is_success() {
            return Ok(payload.unwrap_or_else(|e| {
                tracing::warn!(%method, path, error = %e, "success response is not JSON, keeping it as text");
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            }));
        }

        let message = payload
            .ok()
            .and_then(|value| value.get("message").and_then(Value::as_str).map(str::to_string));
        Err(self.map_status_error(status, path, message))
    }

    fn map_status_error(&self, status: StatusCode, path: &str, message: Option<String>) -> ApiError {
        let code = status.as_u16();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            if !is_auth_route(path) {
                tracing::warn!(status = code, path, "session expired or forbidden");
                self.session.mark_expired(self.location.as_deref());
            }
            return ApiError::Auth {
                status: code,
                message,
            };
        }

        tracing::warn!(status = code, path, "api returned an error status");
        ApiError::Status {
            status: code,
            message,
        }
    }

    // ------------------------------------------------------------------------
    // Auth
    // ------------------------------------------------------------------------

    /// Authenticate and establish the session.
    pub async fn login(&self, username: &str, password: &str) -> Result<UserInfo, ApiError> {
        let value = self
            .send(Method::POST, LOGIN_PATH, None, Some(&LoginRequest { username, password }))
            .await?;
        let response: LoginResponse =
            serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))?;

        match response.token {
            Some(token) if !token.is_empty() => {
                let user = response.user.unwrap_or_default();
                self.session.establish(&token, &user)?;
                Ok(user)
            }
            _ => Err(ApiError::LoginRejected(
                response.message.unwrap_or_else(|| "no token in login response".to_string()),
            )),
        }
    }

    pub fn logout(&self) {
        self.session.logout();
    }

    // ------------------------------------------------------------------------
    // Clients
    // ------------------------------------------------------------------------

    pub async fn list_clients(&self) -> Result<Vec<ClientRecord>, ApiError> {
        let payload = self.send::<()>(Method::GET, CLIENTS_PATH, None, None).await?;
        Ok(normalize_many(payload))
    }

    pub async fn list_summaries(&self) -> Result<Vec<ClientSummary>, ApiError> {
        let payload = self.send::<()>(Method::GET, CLIENTS_PATH, None, None).await?;
        Ok(normalize_summaries(payload))
    }

    pub async fn get_client(&self, id: &str) -> Result<ClientRecord, ApiError> {
        let payload = self.send::<()>(Method::GET, CLIENTS_PATH, Some(id), None).await?;
        Ok(normalize_one(payload))
    }

    pub async fn create_client(&self, payload: &ClientPayload) -> Result<ClientRecord, ApiError> {
        let created = self.send(Method::POST, CLIENTS_PATH, None, Some(payload)).await?;
        Ok(normalize_one(created))
    }

    pub async fn update_client(&self, id: &str, payload: &ClientPayload) -> Result<ClientRecord, ApiError> {
        let updated = self.send(Method::PUT, CLIENTS_PATH, Some(id), Some(payload)).await?;
        Ok(normalize_one(updated))
    }

    /// A success body is ignored, whatever its shape.
    pub async fn delete_client(&self, id: &str) -> Result<(), ApiError> {
        self.send::<()>(Method::DELETE, CLIENTS_PATH, Some(id), None).await?;
        Ok(())
    }
}

/// Empty bodies read as null; anything else must be JSON.
fn parse_body(bytes: &[u8]) -> Result<Value, String> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes).map_err(|e| e.to_string())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemoryStore;
    use axum::{
        extract::Path,
        http::{HeaderMap, StatusCode as AxumStatus},
        response::IntoResponse,
        routing::{get, post},
        Json, Router,
    };
    use serde_json::json;
    use std::time::Duration;

    const ADMIN_TOKEN: &str = "tok-admin";

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(|v| v == format!("Bearer {}", ADMIN_TOKEN))
            .unwrap_or(false)
    }

    fn stored_client(id: &str) -> Value {
        json!({
            "id": id,
            "name": "Maria Silva",
            "cpf": "12345678901",
            "address": {"cep": "01310930", "logradouro": "Avenida Paulista",
                        "bairro": "Bela Vista", "cidade": "São Paulo", "uf": "SP"},
            "phones": [{"type": "celular", "number": "11987654321"}],
            "emails": ["maria@example.com"]
        })
    }

    async fn login(Json(body): Json<Value>) -> impl IntoResponse {
        if body["username"] == "admin" && body["password"] == "secret" {
            (
                AxumStatus::OK,
                Json(json!({"token": ADMIN_TOKEN, "user": {"sub": "admin", "roles": ["ROLE_ADMIN"]}})),
            )
        } else {
            (AxumStatus::UNAUTHORIZED, Json(json!({"message": "Bad credentials"})))
        }
    }

    async fn list(headers: HeaderMap) -> impl IntoResponse {
        if !authorized(&headers) {
            return (AxumStatus::UNAUTHORIZED, Json(json!({}))).into_response();
        }
        Json(json!({"content": [stored_client("1"), stored_client("2")], "totalElements": 2})).into_response()
    }

    async fn create(headers: HeaderMap, Json(mut body): Json<Value>) -> impl IntoResponse {
        if !authorized(&headers) {
            return AxumStatus::FORBIDDEN.into_response();
        }
        if body["cpf"] == "00000000000" {
            return (AxumStatus::CONFLICT, Json(json!({"message": "CPF already registered"}))).into_response();
        }
        body["id"] = json!(42);
        (AxumStatus::CREATED, Json(body)).into_response()
    }

    async fn read(Path(id): Path<String>) -> impl IntoResponse {
        Json(json!({"client": stored_client(&id)}))
    }

    async fn update(Path(id): Path<String>, Json(mut body): Json<Value>) -> impl IntoResponse {
        body["id"] = json!(id);
        Json(body)
    }

    async fn delete(Path(id): Path<String>) -> impl IntoResponse {
        match id.as_str() {
            "5" => (AxumStatus::FORBIDDEN, Json(json!({"message": "Access denied"}))).into_response(),
            "7" => (AxumStatus::OK, "Client deleted").into_response(),
            _ => AxumStatus::NO_CONTENT.into_response(),
        }
    }

    fn routes() -> Router {
        Router::new()
            .route("/api/v1/auth/login", post(login))
            .route("/api/v1/clients", get(list).post(create))
            .route("/api/v1/clients/:id", get(read).put(update).delete(delete))
    }

    async fn spawn_backend() -> String {
        spawn(routes()).await
    }

    async fn spawn(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn client() -> ApiClient<MemoryStore> {
        let base = spawn_backend().await;
        let config = Config::default()
            .with_api_url(&base)
            .with_timeout(Duration::from_secs(5));
        ApiClient::new(&config, Arc::new(Session::new(MemoryStore::new()))).unwrap()
    }

    fn payload() -> ClientPayload {
        serde_json::from_value(json!({
            "name": "Maria Silva",
            "cpf": "12345678901",
            "address": {"cep": "01310930", "logradouro": "Avenida Paulista", "bairro": "Bela Vista",
                        "cidade": "São Paulo", "uf": "SP", "complemento": ""},
            "phones": [{"type": "celular", "number": "11987654321"}],
            "emails": ["maria@example.com"]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_login_establishes_session() {
        let api = client().await;
        let user = api.login("admin", "secret").await.unwrap();

        assert_eq!(user.display_name(), "admin");
        let ctx = api.session().context();
        assert!(ctx.is_authenticated());
        assert!(ctx.is_admin());
    }

    #[tokio::test]
    async fn test_bad_login_does_not_flag_expiry() {
        let api = client().await;
        let err = api.login("admin", "wrong").await.unwrap_err();

        assert!(err.is_auth());
        assert_eq!(err.backend_message(), Some("Bad credentials"));
        assert!(!api.session().is_expired());
        assert!(!api.session().is_authenticated());
    }

    #[tokio::test]
    async fn test_list_sends_bearer_and_normalizes() {
        let api = client().await;
        api.login("admin", "secret").await.unwrap();

        let clients = api.list_clients().await.unwrap();
        assert_eq!(clients.len(), 2);
        assert_eq!(clients[0].document_id, "123.456.789-01");

        let rows = api.list_summaries().await.unwrap();
        assert_eq!(rows[1].id.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_unauthorized_list_marks_session_expired() {
        let api = client().await;
        let err = api.at("/").list_clients().await.unwrap_err();

        assert_eq!(err.status(), Some(401));
        assert!(api.session().is_expired());
        assert_eq!(api.session().take_redirect().as_deref(), Some("/"));
        assert_eq!(
            ClientAction::List.user_message(&err),
            "session expired, please log in again"
        );
    }

    #[tokio::test]
    async fn test_get_client_unwraps_envelope() {
        let api = client().await;
        let record = api.get_client("7").await.unwrap();

        assert_eq!(record.id.as_deref(), Some("7"));
        assert_eq!(record.address.postal_code, "01310-930");
    }

    #[tokio::test]
    async fn test_create_and_update() {
        let api = client().await;
        api.login("admin", "secret").await.unwrap();

        let created = api.create_client(&payload()).await.unwrap();
        assert_eq!(created.id.as_deref(), Some("42"));
        assert_eq!(created.phones[0].number, "(11) 98765-4321");

        let updated = api.update_client("42", &payload()).await.unwrap();
        assert_eq!(updated.id.as_deref(), Some("42"));
    }

    #[tokio::test]
    async fn test_create_surfaces_backend_message() {
        let api = client().await;
        api.login("admin", "secret").await.unwrap();

        let mut duplicate = payload();
        duplicate.document_id = "00000000000".to_string();
        let err = api.create_client(&duplicate).await.unwrap_err();

        assert_eq!(err.status(), Some(409));
        assert_eq!(ClientAction::Create.user_message(&err), "CPF already registered");
    }

    #[tokio::test]
    async fn test_delete_forbidden_keeps_session() {
        let api = client().await;
        api.login("admin", "secret").await.unwrap();

        let err = api.at("/clients/5").delete_client("5").await.unwrap_err();
        assert_eq!(ClientAction::Delete.user_message(&err), "no permission to delete clients");

        // Flagged for the gate, but the credentials are still there
        assert!(api.session().is_expired());
        assert_eq!(api.session().token().as_deref(), Some(ADMIN_TOKEN));
        assert!(api.session().current_user().is_some());

        api.delete_client("6").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_accepts_text_body() {
        let api = client().await;
        api.login("admin", "secret").await.unwrap();

        api.delete_client("7").await.unwrap();
        assert!(!api.session().is_expired());
    }

    #[tokio::test]
    async fn test_base_url_path_prefix_is_kept() {
        let base = spawn(Router::new().nest("/backend", routes())).await;
        let config = Config::default()
            .with_api_url(&format!("{}/backend/", base))
            .with_timeout(Duration::from_secs(5));
        let api = ApiClient::new(&config, Arc::new(Session::new(MemoryStore::new()))).unwrap();

        api.login("admin", "secret").await.unwrap();
        assert_eq!(api.list_clients().await.unwrap().len(), 2);
        assert_eq!(api.get_client("3").await.unwrap().id.as_deref(), Some("3"));
    }

    #[test]
    fn test_id_is_a_single_path_segment() {
        let config = Config::default().with_api_url("http://api.local/backend");
        let api = ApiClient::new(&config, Arc::new(Session::new(MemoryStore::new()))).unwrap();

        let url = api.url(CLIENTS_PATH, Some("42")).unwrap();
        assert_eq!(url.as_str(), "http://api.local/backend/api/v1/clients/42");

        let url = api.url(CLIENTS_PATH, Some("../auth/login")).unwrap();
        assert!(url.path().starts_with("/backend/api/v1/clients/"));
        assert_eq!(url.path_segments().map(|s| s.count()), Some(5));
        assert!(!url.path().contains("/auth/"));
    }

    #[tokio::test]
    async fn test_network_error_message() {
        let config = Config::default()
            .with_api_url("http://127.0.0.1:9")
            .with_timeout(Duration::from_secs(1));
        let api = ApiClient::new(&config, Arc::new(Session::new(MemoryStore::new()))).unwrap();

        let err = api.list_clients().await.unwrap_err();
        assert!(matches!(err, ApiError::Network(_)));
        assert_eq!(ClientAction::List.user_message(&err), "could not load the client list");
        assert!(!api.session().is_expired());
    }

    #[test]
    fn test_invalid_base_url() {
        let config = Config::default().with_api_url("not a url");
        let result = ApiClient::new(&config, Arc::new(Session::new(MemoryStore::new())));
        assert!(matches!(result, Err(ApiError::Url(_))));
    }

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body(b"").unwrap(), Value::Null);
        assert_eq!(parse_body(b"  \n").unwrap(), Value::Null);
        assert!(parse_body(b"<html>").is_err());
    }
}
