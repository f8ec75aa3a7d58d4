//!
//! fileview HTTP server
//! --------------------
//! This module defines the Axum-based JSON API over an allowlisted slice of
//! the local filesystem.
//!
//! Every handler runs the same fixed pipeline and short-circuits on the
//! first failure:
//! - Extract the path parameter(s) from query or body.
//! - For mutation endpoints, verify the `file_operations` feature gate.
//! - Resolve each path parameter (rewrite rule, then lexical normalization).
//! - Run the allowlist check on every resolved path, destinations and
//!   rename targets included.
//! - Endpoint-specific validation (extension, bare-name, existence).
//! - A single filesystem gateway call, mapped into the JSON envelope.
//!
//! No state survives a request; the only shared data is the immutable
//! configuration loaded at startup.

use std::fs;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::Context;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::fsops;
use crate::imageinfo;
use crate::listing;
use crate::paths::PathResolver;
use crate::render;
use crate::security::Allowlist;

/// Shared server state injected into all handlers. Built once at startup;
/// immutable afterwards.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub resolver: Arc<PathResolver>,
    pub allow: Arc<Allowlist>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let resolver = PathResolver::new(config.features.path_conversion.clone());
        let allow = Allowlist::new(config.allowed_paths.iter().map(String::as_str));
        Self {
            config: Arc::new(config),
            resolver: Arc::new(resolver),
            allow: Arc::new(allow),
        }
    }
}

/// Start the HTTP server with the given configuration.
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let host = config.host.clone();
    let port = config.port;
    let state = AppState::new(config);
    log_startup(&state);

    let app = router(state);
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", host, port))?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Mount all routes. Split out from `run` so tests can drive the router
/// without binding a socket.
pub fn router(state: AppState) -> Router {
    // The frontend is served from another origin on the LAN.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(serve_index))
        .route("/api/config", get(get_config))
        .route("/api/view", get(view_file))
        .route("/api/raw", get(get_raw))
        .route("/api/browse", get(browse_directory))
        .route("/api/check-path", get(check_path))
        .route("/api/image", get(serve_image))
        .route("/api/image/info", get(image_info))
        .route("/api/files/copy", post(file_copy))
        .route("/api/files/move", post(file_move))
        .route("/api/files/rename", post(file_rename))
        .route("/api/files/delete", delete(file_delete))
        .route("/api/files/new-file", post(file_new_file))
        .route("/api/files/new-folder", post(file_new_folder))
        .layer(cors)
        .with_state(state)
}

fn log_startup(state: &AppState) {
    info!(target: "startup", "Allowed roots: {:?}", state.allow.roots());
    if state.config.allowed_paths.is_empty() {
        warn!("allowed_paths is empty; every request will be denied");
    }
    info!(
        target: "startup",
        "file_operations={}, path_conversion={:?}",
        state.config.features.file_operations,
        state.config.features.path_conversion
    );
}

// ── Envelopes ────────────────────────────────────────────────────────────────

fn error_response(e: &AppError) -> Response {
    let status =
        StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({ "error": e.message() }))).into_response()
}

fn respond(result: AppResult<Value>) -> Response {
    match result {
        Ok(v) => (StatusCode::OK, Json(v)).into_response(),
        Err(e) => error_response(&e),
    }
}

// ── Params ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct FileQuery {
    pub file: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DirQuery {
    pub dir: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PathQuery {
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransferPayload {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub destination: String,
}

#[derive(Debug, Deserialize)]
pub struct RenamePayload {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub new_name: String,
}

#[derive(Debug, Deserialize)]
pub struct DeletePayload {
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct CreatePayload {
    #[serde(default)]
    pub directory: String,
    #[serde(default)]
    pub name: String,
}

// ── Frontend & config ────────────────────────────────────────────────────────

async fn serve_index() -> Response {
    match fs::read_to_string("index.html") {
        Ok(page) => Html(page).into_response(),
        Err(_) => Html(
            "<!doctype html><title>FileView</title><h1>FileView</h1>\
             <p>Frontend not installed; the JSON API lives under /api/.</p>"
                .to_string(),
        )
        .into_response(),
    }
}

async fn get_config(State(state): State<AppState>) -> impl IntoResponse {
    Json(config_payload(&state))
}

/// Public-safe configuration subset.
pub fn config_payload(state: &AppState) -> Value {
    let cfg = &state.config;
    json!({
        "title": cfg.title,
        "default_directory": cfg.default_directory,
        "allowed_paths": cfg.allowed_paths,
        "features": cfg.features,
        "favorite_paths": cfg.favorite_paths,
    })
}

// ── Viewing ──────────────────────────────────────────────────────────────────

async fn view_file(State(state): State<AppState>, Query(q): Query<FileQuery>) -> Response {
    respond(view_impl(&state, q.file.as_deref().unwrap_or("")))
}

/// Read and render a file: Markdown to HTML with TOC and metadata, everything
/// else as an escaped, labeled code block.
pub fn view_impl(state: &AppState, raw: &str) -> AppResult<Value> {
    if raw.is_empty() {
        return Err(AppError::bad_request("No file path provided"));
    }
    let path = state.resolver.resolve(raw);
    if !state.allow.is_allowed(&path) {
        return Err(AppError::not_allowed("Path not allowed"));
    }
    let filename = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = listing::extension_of(&filename);
    if !ext.is_empty() && !listing::is_text_viewable(&ext) {
        return Err(AppError::bad_request("File type not supported"));
    }
    if fs::metadata(&path).is_err() {
        return Err(AppError::not_found("File not found"));
    }

    let content = fsops::read_text(&path)?;
    let directory = path
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();

    let (html, toc, meta) = if ext == ".md" {
        let r = render::render_markdown(&content, &path);
        (r.html, r.toc, serde_json::to_value(r.meta).unwrap_or_else(|_| json!({})))
    } else {
        (render::render_code(&content, &ext), String::new(), json!({}))
    };

    Ok(json!({
        "success": true,
        "file": path.to_string_lossy(),
        "filename": filename,
        "directory": directory,
        "html": html,
        "toc": toc,
        "meta": meta,
        "raw_length": content.chars().count(),
    }))
}

async fn get_raw(State(state): State<AppState>, Query(q): Query<FileQuery>) -> Response {
    match raw_impl(&state, q.file.as_deref().unwrap_or("")) {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

/// Raw file content as plain text.
pub fn raw_impl(state: &AppState, raw: &str) -> AppResult<String> {
    if raw.is_empty() {
        return Err(AppError::not_allowed("Not allowed"));
    }
    let path = state.resolver.resolve(raw);
    if !state.allow.is_allowed(&path) {
        return Err(AppError::not_allowed("Not allowed"));
    }
    if fs::metadata(&path).is_err() {
        return Err(AppError::not_found("Not found"));
    }
    Ok(fsops::read_text(&path)?)
}

// ── Browsing ─────────────────────────────────────────────────────────────────

async fn browse_directory(State(state): State<AppState>, Query(q): Query<DirQuery>) -> Response {
    respond(browse_impl(&state, q.dir.as_deref()))
}

/// List an authorized directory, parent entry first, sorted by name.
pub fn browse_impl(state: &AppState, raw: Option<&str>) -> AppResult<Value> {
    let raw = match raw {
        Some(r) if !r.is_empty() => r,
        _ => state.config.default_directory.as_str(),
    };
    let dir = state.resolver.resolve(raw);
    if !state.allow.is_allowed(&dir) {
        return Err(AppError::not_allowed("Path not allowed"));
    }
    match fs::metadata(&dir) {
        Ok(md) if md.is_dir() => {}
        _ => return Err(AppError::not_found("Directory not found")),
    }

    let listing = listing::browse(&dir, &state.allow)?;
    let parent = listing
        .parent
        .as_ref()
        .map(|p| Value::from(p.to_string_lossy().into_owned()))
        .unwrap_or(Value::Null);

    Ok(json!({
        "success": true,
        "directory": dir.to_string_lossy(),
        "parent": parent,
        "items": listing.items,
        "stats": listing.stats,
    }))
}

async fn check_path(State(state): State<AppState>, Query(q): Query<PathQuery>) -> impl IntoResponse {
    Json(check_path_impl(&state, q.path.as_deref().unwrap_or("")))
}

/// Report what a path points at and whether it would be authorized. This
/// endpoint's contract is to report existence alongside `allowed: false`,
/// the one deliberate exception to the authorize-before-stat rule.
pub fn check_path_impl(state: &AppState, raw: &str) -> Value {
    let path = state.resolver.resolve(raw);
    let md = fs::metadata(&path).ok();
    json!({
        "success": true,
        "converted": path.to_string_lossy(),
        "exists": md.is_some(),
        "is_file": md.as_ref().map(|m| m.is_file()).unwrap_or(false),
        "is_dir": md.as_ref().map(|m| m.is_dir()).unwrap_or(false),
        "allowed": state.allow.is_allowed(&path),
    })
}

// ── Images ───────────────────────────────────────────────────────────────────

async fn serve_image(State(state): State<AppState>, Query(q): Query<FileQuery>) -> Response {
    match image_impl(&state, q.file.as_deref().unwrap_or("")) {
        Ok((mime, bytes)) => ([(header::CONTENT_TYPE, mime)], bytes).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Serve an image file body with a guessed content type.
pub fn image_impl(state: &AppState, raw: &str) -> AppResult<(String, Vec<u8>)> {
    let path = authorize_image(state, raw)?;
    let bytes = fsops::read_bytes(&path)?;
    let mime = mime_guess::from_path(&path).first_or_octet_stream().to_string();
    Ok((mime, bytes))
}

async fn image_info(State(state): State<AppState>, Query(q): Query<FileQuery>) -> Response {
    respond(image_info_impl(&state, q.file.as_deref().unwrap_or("")))
}

/// Image metadata: dimensions, container format and color mode, plus the
/// usual stat fields. Codec failures degrade to extension-derived values.
pub fn image_info_impl(state: &AppState, raw: &str) -> AppResult<Value> {
    let path = authorize_image(state, raw)?;
    let filename = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = listing::extension_of(&filename);
    let st = fsops::stat(&path)?;
    let info = imageinfo::inspect(&path);
    let format = info
        .format
        .unwrap_or_else(|| ext.trim_start_matches('.').to_string());

    Ok(json!({
        "success": true,
        "file": path.to_string_lossy(),
        "filename": filename,
        "directory": path.parent().map(|p| p.to_string_lossy().into_owned()).unwrap_or_default(),
        "extension": ext,
        "size": st.size,
        "size_human": listing::format_size(st.size),
        "modified": format_timestamp(st.modified),
        "created": format_timestamp(st.created),
        "width": info.width,
        "height": info.height,
        "format": format,
        "mode": info.mode,
    }))
}

/// Shared guard chain for both image endpoints.
fn authorize_image(state: &AppState, raw: &str) -> AppResult<std::path::PathBuf> {
    if raw.is_empty() {
        return Err(AppError::not_allowed("Not allowed"));
    }
    let path = state.resolver.resolve(raw);
    if !state.allow.is_allowed(&path) {
        return Err(AppError::not_allowed("Not allowed"));
    }
    match fs::metadata(&path) {
        Ok(md) if md.is_file() => {}
        _ => return Err(AppError::not_found("Not found")),
    }
    let ext = listing::extension_of(
        &path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
    );
    if !listing::is_image_extension(&ext) {
        return Err(AppError::bad_request("Not an image"));
    }
    Ok(path)
}

fn format_timestamp(t: SystemTime) -> String {
    chrono::DateTime::<chrono::Local>::from(t)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

// ── File operations (config-gated) ───────────────────────────────────────────

fn ensure_file_ops(state: &AppState) -> AppResult<()> {
    if state.config.features.file_operations {
        Ok(())
    } else {
        Err(AppError::feature_disabled("File operations are disabled"))
    }
}

async fn file_copy(State(state): State<AppState>, Json(p): Json<TransferPayload>) -> Response {
    respond(copy_impl(&state, &p.source, &p.destination))
}

/// Copy a file or directory; never overwrites.
pub fn copy_impl(state: &AppState, source: &str, destination: &str) -> AppResult<Value> {
    let (src, dst) = authorize_transfer(state, source, destination)?;
    fsops::copy(&src, &dst)?;
    Ok(json!({ "success": true, "destination": dst.to_string_lossy() }))
}

async fn file_move(State(state): State<AppState>, Json(p): Json<TransferPayload>) -> Response {
    respond(move_impl(&state, &p.source, &p.destination))
}

/// Move a file or directory; destination parent is created on demand.
pub fn move_impl(state: &AppState, source: &str, destination: &str) -> AppResult<Value> {
    let (src, dst) = authorize_transfer(state, source, destination)?;
    fsops::move_path(&src, &dst)?;
    Ok(json!({ "success": true, "destination": dst.to_string_lossy() }))
}

/// Common pipeline for copy and move: gate, resolve both paths, authorize
/// both, require the source and forbid the destination.
fn authorize_transfer(
    state: &AppState,
    source: &str,
    destination: &str,
) -> AppResult<(std::path::PathBuf, std::path::PathBuf)> {
    ensure_file_ops(state)?;
    if source.is_empty() || destination.is_empty() {
        return Err(AppError::bad_request("source and destination required"));
    }
    let src = state.resolver.resolve(source);
    let dst = state.resolver.resolve(destination);
    if !state.allow.is_allowed(&src) || !state.allow.is_allowed(&dst) {
        return Err(AppError::not_allowed("Path not allowed"));
    }
    if fs::metadata(&src).is_err() {
        return Err(AppError::not_found("Source not found"));
    }
    if dst.exists() {
        return Err(AppError::conflict("Destination already exists"));
    }
    Ok((src, dst))
}

async fn file_rename(State(state): State<AppState>, Json(p): Json<RenamePayload>) -> Response {
    respond(rename_impl(&state, &p.path, &p.new_name))
}

/// Rename within the parent directory. The bare-name separator check runs
/// before any filesystem access; the renamed target is authorized too.
pub fn rename_impl(state: &AppState, path: &str, new_name: &str) -> AppResult<Value> {
    ensure_file_ops(state)?;
    if path.is_empty() || new_name.is_empty() {
        return Err(AppError::bad_request("path and new_name required"));
    }
    if new_name.contains('/') || new_name.contains('\\') {
        return Err(AppError::bad_request("new_name must not contain path separators"));
    }
    let p = state.resolver.resolve(path);
    if !state.allow.is_allowed(&p) {
        return Err(AppError::not_allowed("Path not allowed"));
    }
    if fs::symlink_metadata(&p).is_err() {
        return Err(AppError::not_found("Not found"));
    }
    let dst = fsops::sibling_path(&p, new_name)?;
    if !state.allow.is_allowed(&dst) {
        return Err(AppError::not_allowed("Destination path not allowed"));
    }
    if dst.exists() {
        return Err(AppError::conflict("Name already taken"));
    }
    let new_path = fsops::rename(&p, new_name)?;
    Ok(json!({ "success": true, "new_path": new_path.to_string_lossy() }))
}

async fn file_delete(State(state): State<AppState>, Json(p): Json<DeletePayload>) -> Response {
    respond(delete_impl(&state, &p.path))
}

/// Delete a single file. Directories are refused by design.
pub fn delete_impl(state: &AppState, path: &str) -> AppResult<Value> {
    ensure_file_ops(state)?;
    if path.is_empty() {
        return Err(AppError::bad_request("path required"));
    }
    let p = state.resolver.resolve(path);
    if !state.allow.is_allowed(&p) {
        return Err(AppError::not_allowed("Path not allowed"));
    }
    let md = match fs::metadata(&p) {
        Ok(md) => md,
        Err(_) => return Err(AppError::not_found("Not found")),
    };
    if md.is_dir() {
        return Err(AppError::bad_request(
            "Cannot delete directories (safety). Use rmdir for empty directories.",
        ));
    }
    fsops::remove(&p)?;
    Ok(json!({ "success": true, "deleted": p.to_string_lossy() }))
}

async fn file_new_file(State(state): State<AppState>, Json(p): Json<CreatePayload>) -> Response {
    respond(new_file_impl(&state, &p.directory, &p.name))
}

/// Create a new empty file inside an authorized directory.
pub fn new_file_impl(state: &AppState, directory: &str, name: &str) -> AppResult<Value> {
    let target = authorize_create(state, directory, name)?;
    if target.exists() {
        return Err(AppError::conflict("File already exists"));
    }
    fsops::create_empty_file(&target)?;
    Ok(json!({ "success": true, "path": target.to_string_lossy() }))
}

async fn file_new_folder(State(state): State<AppState>, Json(p): Json<CreatePayload>) -> Response {
    respond(new_folder_impl(&state, &p.directory, &p.name))
}

/// Create a new directory inside an authorized directory.
pub fn new_folder_impl(state: &AppState, directory: &str, name: &str) -> AppResult<Value> {
    let target = authorize_create(state, directory, name)?;
    if target.exists() {
        return Err(AppError::conflict("Already exists"));
    }
    fsops::mkdir(&target)?;
    Ok(json!({ "success": true, "path": target.to_string_lossy() }))
}

/// Common pipeline for new-file and new-folder: gate, bare-name check before
/// any syscall, resolve, authorize the directory and the joined target.
fn authorize_create(
    state: &AppState,
    directory: &str,
    name: &str,
) -> AppResult<std::path::PathBuf> {
    ensure_file_ops(state)?;
    if directory.is_empty() || name.is_empty() {
        return Err(AppError::bad_request("directory and name required"));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(AppError::bad_request("name must not contain path separators"));
    }
    let dir = state.resolver.resolve(directory);
    if !state.allow.is_allowed(&dir) {
        return Err(AppError::not_allowed("Path not allowed"));
    }
    let target = dir.join(name);
    if !state.allow.is_allowed(&target) {
        return Err(AppError::not_allowed("Path not allowed"));
    }
    Ok(target)
}
