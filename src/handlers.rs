use crate::config::Config;
use crate::constants::{MAX_PAYLOAD_SIZE, PASTE_TTL_HOURS};
use crate::error::{AppError, HttpError};
use crate::models::*;
use crate::ratelimit::{http_client_key, Admission, RatePolicy};
use crate::services::PasteService;
use axum::{
    body::Body,
    extract::{ConnectInfo, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::StreamExt;
use std::net::SocketAddr;
use std::sync::Arc;
use utoipa::OpenApi;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

#[derive(OpenApi)]
#[openapi(
    paths(index, get_paste, create_paste, health),
    components(schemas(HealthResponse)),
    tags(
        (name = "pastebin", description = "Ephemeral command-line pastebin")
    ),
    info(
        title = "pastebin API",
        version = "0.1.0",
        description = "Pastes are immutable and expire 72 hours after creation.\n\n\
                      The same pipeline is reachable over a raw TCP socket: \
                      write the paste, close (or pause), read back one line."
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PasteService>,
    pub config: Arc<Config>,
    pub create_admission: Admission,
    pub read_admission: Admission,
}

impl AppState {
    pub fn new(service: Arc<PasteService>, config: Config) -> Self {
        let enabled = config.rate_limit_enabled;
        Self {
            service,
            config: Arc::new(config),
            create_admission: Admission::for_policy(enabled, RatePolicy::HTTP_CREATE),
            read_admission: Admission::for_policy(enabled, RatePolicy::HTTP_READ),
        }
    }

    fn client_key(&self, headers: &HeaderMap, peer: Option<ConnectInfo<SocketAddr>>) -> String {
        http_client_key(
            headers,
            peer.map(|ConnectInfo(addr)| addr),
            self.config.trust_proxy_headers,
        )
    }

    fn reject(&self, client: &str, error: AppError) -> HttpError {
        error.log(client);
        HttpError {
            error,
            abuse_contact: self.config.abuse_contact.clone(),
        }
    }
}

/// Usage page
#[utoipa::path(
    get,
    path = "/",
    tag = "pastebin",
    responses(
        (status = 200, description = "Plain-text usage instructions", body = String, content_type = "text/plain")
    )
)]
pub async fn index(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, TEXT_PLAIN)],
        usage_text(state.service.base_url(), state.config.tcp_port),
    )
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "pastebin",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        max_payload_size: MAX_PAYLOAD_SIZE,
        retention_hours: PASTE_TTL_HOURS,
    })
}

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Fetch a paste
///
/// Returns the raw bytes exactly as submitted.
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "pastebin",
    params(
        ("id" = String, Path, description = "Paste identifier (7 or 32 characters)")
    ),
    responses(
        (status = 200, description = "Paste content", body = String, content_type = "text/plain"),
        (status = 404, description = "Not found or expired"),
        (status = 429, description = "Rate limited")
    )
)]
pub async fn get_paste(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
) -> Result<Response, HttpError> {
    let client = state.client_key(&headers, peer);

    state
        .read_admission
        .check(&client)
        .map_err(|e| state.reject(&client, e))?;

    let content = state
        .service
        .retrieve(&id)
        .await
        .map_err(|e| state.reject(&client, e))?;

    Ok(([(header::CONTENT_TYPE, TEXT_PLAIN)], content).into_response())
}

/// Create a paste
///
/// The request body is the paste. Responds with the retrieval URL.
#[utoipa::path(
    post,
    path = "/create",
    tag = "pastebin",
    params(CreateQuery),
    request_body(content = String, description = "Paste content (1 to 5,000,000 bytes)", content_type = "text/plain"),
    responses(
        (status = 201, description = "Paste created; body is `<base-url>/<id>`", body = String, content_type = "text/plain"),
        (status = 400, description = "Empty body or unreadable request"),
        (status = 403, description = "Content matched the deny-list"),
        (status = 413, description = "Payload too large"),
        (status = 429, description = "Rate limited"),
        (status = 500, description = "Storage failure")
    )
)]
pub async fn create_paste(
    State(state): State<AppState>,
    Query(query): Query<CreateQuery>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    body: Body,
) -> Result<Response, HttpError> {
    let client = state.client_key(&headers, peer);

    // Admission runs before a single body byte is pulled off the wire.
    state
        .create_admission
        .check(&client)
        .map_err(|e| state.reject(&client, e))?;

    // One byte past the limit is enough to tell "at the limit" from "over it".
    let content = read_capped(body, MAX_PAYLOAD_SIZE + 1)
        .await
        .map_err(|e| state.reject(&client, e))?;

    let kind = query.id_kind();
    let created = state
        .service
        .create(&content, kind)
        .await
        .map_err(|e| state.reject(&client, e))?;

    tracing::info!(
        id = %created.id,
        client = %client,
        bytes = content.len(),
        kind = %kind,
        "Created paste via HTTP"
    );

    Ok((
        StatusCode::CREATED,
        [(header::CONTENT_TYPE, TEXT_PLAIN)],
        format!("{}\n", created.url),
    )
        .into_response())
}

/// Buffers at most `cap` bytes of `body`, then stops reading.
async fn read_capped(body: Body, cap: usize) -> Result<Vec<u8>, AppError> {
    let mut stream = body.into_data_stream();
    let mut content = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            tracing::debug!("Body read failed: {}", e);
            AppError::BadRequest("error reading body".to_string())
        })?;

        let room = cap - content.len();
        content.extend_from_slice(&chunk[..chunk.len().min(room)]);
        if content.len() >= cap {
            break;
        }
    }

    Ok(content)
}

fn usage_text(base_url: &str, tcp_port: u16) -> String {
    let host = base_url
        .split("://")
        .nth(1)
        .unwrap_or(base_url)
        .split(['/', ':'])
        .next()
        .unwrap_or(base_url);

    format!(
        "{host} - commandline pastebin\n\
         \n\
         pipe to 'nc {host} {port}'\n\
         or POST to {base}/create (add ?secure=true for a longer, unguessable id)\n\
         \n\
         - pastes are stored for {ttl} hours, after which they are automatically deleted\n\
         - maximum paste size is {max} bytes\n\
         \n\
         example\n\
         =======\n\
         \n\
         ~> echo \"hello\" | nc {host} {port}\n\
         {base}/yourpaste\n\
         \n\
         ~> cat /etc/nginx/nginx.conf | curl --data-binary @- {base}/create\n\
         {base}/yourpaste\n\
         \n\
         ~> cat 100mb.bin | nc {host} {port}\n\
         payload too big\n",
        host = host,
        port = tcp_port,
        base = base_url,
        ttl = PASTE_TTL_HOURS,
        max = MAX_PAYLOAD_SIZE,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_mentions_host_and_port() {
        let text = usage_text("https://ig.lc", 9999);
        assert!(text.starts_with("ig.lc - commandline pastebin"));
        assert!(text.contains("nc ig.lc 9999"));
        assert!(text.contains("72 hours"));

        let text = usage_text("http://localhost:3334", 9999);
        assert!(text.contains("nc localhost 9999"));
    }

    #[tokio::test]
    async fn read_capped_stops_at_cap() {
        let body = Body::from(vec![b'x'; 100]);
        assert_eq!(read_capped(body, 10).await.unwrap().len(), 10);

        let body = Body::from("short");
        assert_eq!(read_capped(body, 10).await.unwrap(), b"short");
    }

    #[test]
    fn openapi_lists_routes() {
        let doc = ApiDoc::openapi();
        for path in ["/", "/{id}", "/create", "/api/health"] {
            assert!(doc.paths.paths.contains_key(path), "{path}");
        }
    }
}
