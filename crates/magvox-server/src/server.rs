//! HTTP server implementation.

use std::io::{Cursor, Read};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use magvox_edit::{EditError, ErrorKind, Workspace};
use magvox_store::ProjectCatalog;
use serde_json::json;
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};

use crate::routes::{self, Reply};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind to {addr}: {error}")]
    BindError { addr: String, error: String },
    #[error("server thread panicked")]
    ThreadPanic,
}

/// State shared by every request.
///
/// Edits and history steps go through the workspace lock. Read-only routes
/// use the catalogue directly and never wait on it.
#[derive(Debug)]
pub struct AppState {
    workspace: Mutex<Workspace>,
    catalog: ProjectCatalog,
    cors_origin: String,
}

impl AppState {
    pub fn new(workspace: Workspace, cors_origin: impl Into<String>) -> Self {
        let catalog = workspace.catalog().clone();
        Self {
            workspace: Mutex::new(workspace),
            catalog,
            cors_origin: cors_origin.into(),
        }
    }

    pub fn catalog(&self) -> &ProjectCatalog {
        &self.catalog
    }

    /// Locks the workspace. A panic in an earlier request does not poison it
    /// for later ones, since every edit is transactional on disk.
    pub fn workspace(&self) -> MutexGuard<'_, Workspace> {
        self.workspace.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// HTTP server for the Magvox API.
/// Runs on a background thread.
pub struct MagvoxServer {
    server: Arc<Server>,
    port: u16,
    handle: Option<JoinHandle<()>>,
}

impl MagvoxServer {
    /// Binds to `bind_address:port` and starts serving. Port 0 lets the OS
    /// pick one; see [`port`](Self::port).
    pub fn start(bind_address: &str, port: u16, state: Arc<AppState>) -> Result<Self, ServerError> {
        let addr = format!("{bind_address}:{port}");
        let server = Server::http(&addr).map_err(|e| ServerError::BindError {
            addr: addr.clone(),
            error: e.to_string(),
        })?;
        let server = Arc::new(server);

        let actual_port = server
            .server_addr()
            .to_ip()
            .map(|addr| addr.port())
            .unwrap_or(port);
        tracing::info!("listening on {bind_address}:{actual_port}");

        let worker = server.clone();
        let handle = thread::Builder::new()
            .name("magvox-http".to_string())
            .spawn(move || Self::run_server(&worker, &state))
            .map_err(|e| ServerError::BindError {
                addr,
                error: e.to_string(),
            })?;

        Ok(Self {
            server,
            port: actual_port,
            handle: Some(handle),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Blocks until the server thread exits.
    pub fn join(mut self) -> Result<(), ServerError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| ServerError::ThreadPanic),
            None => Ok(()),
        }
    }

    /// Stops accepting requests and waits for the server thread.
    pub fn stop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::error!("server thread panicked");
        }
    }

    fn run_server(server: &Server, state: &AppState) {
        for request in server.incoming_requests() {
            if let Err(e) = Self::handle_request(request, state) {
                tracing::warn!("failed to send response: {e}");
            }
        }
        tracing::debug!("server loop exited");
    }

    fn handle_request(mut request: Request, state: &AppState) -> std::io::Result<()> {
        let method = request.method().clone();
        let url = request.url().to_string();
        let (path, query) = url.split_once('?').unwrap_or((url.as_str(), ""));

        if method == Method::Options {
            let mut response = Response::empty(204);
            add_cors_headers(&mut response, &state.cors_origin);
            return request.respond(response);
        }

        let mut body = String::new();
        let result = match request.as_reader().read_to_string(&mut body) {
            Ok(_) => routes::route(&method, path, query, &body, state),
            Err(e) => Err(EditError::invalid(format!("could not read request body: {e}"))),
        };

        let mut response = match result {
            Ok(Reply::Json(value)) => json_response(200, &value),
            Ok(Reply::Csv { file_name, body }) => {
                let mut response = Response::from_data(body);
                add_header(&mut response, "Content-Type", "text/csv");
                add_header(
                    &mut response,
                    "Content-Disposition",
                    &format!("attachment; filename=\"{file_name}\""),
                );
                response
            }
            Err(err) => {
                let status = status_for(err.kind());
                if status >= 500 {
                    tracing::warn!("{method} {path} failed: {err}");
                }
                let mut body = json!({
                    "error": err.kind().as_str(),
                    "message": err.to_string(),
                });
                if !err.available().is_empty() {
                    body["available"] = json!(err.available());
                }
                json_response(status, &body)
            }
        };
        add_cors_headers(&mut response, &state.cors_origin);
        tracing::debug!("{method} {path} -> {}", response.status_code().0);
        request.respond(response)
    }
}

impl Drop for MagvoxServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// HTTP status for an error category.
pub fn status_for(kind: ErrorKind) -> u16 {
    match kind {
        ErrorKind::NotFound => 404,
        ErrorKind::InvalidRequest => 400,
        ErrorKind::EmptyHistory => 409,
        ErrorKind::StorageIntegrity => 422,
        ErrorKind::Storage => 500,
    }
}

fn json_response(status: u16, value: &serde_json::Value) -> Response<Cursor<Vec<u8>>> {
    let mut response =
        Response::from_string(value.to_string()).with_status_code(StatusCode(status));
    add_header(&mut response, "Content-Type", "application/json");
    response
}

fn add_header<R: Read>(response: &mut Response<R>, name: &str, value: &str) {
    match Header::from_bytes(name.as_bytes(), value.as_bytes()) {
        Ok(header) => response.add_header(header),
        Err(()) => tracing::warn!("dropping invalid header {name}"),
    }
}

fn add_cors_headers<R: Read>(response: &mut Response<R>, origin: &str) {
    add_header(response, "Access-Control-Allow-Origin", origin);
    add_header(response, "Access-Control-Allow-Methods", "GET, POST, OPTIONS");
    add_header(response, "Access-Control-Allow-Headers", "Content-Type");
}
