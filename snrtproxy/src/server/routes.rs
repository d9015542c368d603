use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use reqwest::Url;

use crate::channel::ResolvedUpstream;

use super::rewrite::{RewriteMode, rewrite_manifest};
use super::{AppState, m3u, upstream};

const MANIFEST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

fn get_base_url(headers: &HeaderMap) -> String {
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost:9000");
    format!("{scheme}://{host}")
}

fn manifest_response(body: String) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, MANIFEST_CONTENT_TYPE)
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from(body))
        .unwrap()
}

/// Root endpoint: aggregate playlist of every known channel.
pub async fn index(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let snapshot = state.registry.current();
    let base_url = get_base_url(&headers);
    let playlist = m3u::generate_playlist(&snapshot, &base_url);

    ([(header::CONTENT_TYPE, MANIFEST_CONTENT_TYPE)], playlist)
}

/// Force a registry rebuild from the current token store contents.
pub async fn reload(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.registry.rebuild(&state.store);
    println!(
        "[server] Reloaded {} channels (generation {})",
        snapshot.len(),
        snapshot.generation
    );

    "Tokens reloaded"
}

/// Channel manifest endpoint (`/{channel}.m3u8`).
pub async fn channel_playlist(
    State(state): State<AppState>,
    Path(channel): Path<String>,
) -> Result<Response, StatusCode> {
    let channel_id = channel.strip_suffix(".m3u8").unwrap_or(channel.as_str());

    // One snapshot per request: the upstream URL and the token query
    // rewritten into the manifest always come from the same generation.
    let snapshot = state.registry.current();
    let entry = snapshot.get(channel_id).ok_or(StatusCode::NOT_FOUND)?;

    match &entry.upstream {
        ResolvedUpstream::Token { url, headers, .. } => {
            let body =
                upstream::fetch_manifest(&state.client, url, headers, upstream::MANIFEST_TIMEOUT)
                    .await
                    .map_err(|e| {
                        eprintln!("[server] {}: {}", entry.id, e);
                        StatusCode::SERVICE_UNAVAILABLE
                    })?;

            let base = Url::parse(url).map_err(|e| {
                eprintln!("[server] {}: invalid upstream URL: {}", entry.id, e);
                StatusCode::SERVICE_UNAVAILABLE
            })?;

            let rewritten = rewrite_manifest(&body, &RewriteMode::TokenBacked { base: &base });
            println!(
                "[server] Served {} ({} bytes, rewritten)",
                entry.id,
                rewritten.len()
            );
            Ok(manifest_response(rewritten))
        }
        ResolvedUpstream::Static {
            master_url,
            base_url,
            headers,
        } => {
            let body = upstream::fetch_manifest(
                &state.client,
                master_url,
                headers,
                upstream::PROXY_TIMEOUT,
            )
            .await
            .map_err(|e| {
                eprintln!("[server] {}: {}", entry.id, e);
                StatusCode::SERVICE_UNAVAILABLE
            })?;

            let proxy_dir = format!("/{}/", entry.id);
            let rewritten = rewrite_manifest(
                &body,
                &RewriteMode::StaticProxied {
                    upstream_base: base_url,
                    channel_id: &entry.id,
                    proxy_dir: &proxy_dir,
                },
            );
            println!(
                "[server] Served {} master ({} bytes, rewritten)",
                entry.id,
                rewritten.len()
            );
            Ok(manifest_response(rewritten))
        }
    }
}

/// Nested manifest / media segment endpoint for fully-proxied channels.
pub async fn channel_subresource(
    State(state): State<AppState>,
    Path((channel, subpath)): Path<(String, String)>,
) -> Result<Response, StatusCode> {
    let snapshot = state.registry.current();
    let entry = snapshot.get(&channel).ok_or(StatusCode::NOT_FOUND)?;

    let ResolvedUpstream::Static {
        base_url, headers, ..
    } = &entry.upstream
    else {
        // Token-backed clients talk to the CDN directly; nothing to proxy.
        return Err(StatusCode::NOT_FOUND);
    };

    let upstream_url = format!("{base_url}{subpath}");
    let response = upstream::get(&state.client, &upstream_url, headers, upstream::PROXY_TIMEOUT)
        .await
        .map_err(|e| {
            eprintln!("[server] {}/{}: {}", channel, subpath, e);
            StatusCode::SERVICE_UNAVAILABLE
        })?;

    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    let is_manifest = subpath.ends_with(".m3u8") || content_type.contains("mpegurl");

    if is_manifest {
        let body = response.text().await.map_err(|e| {
            eprintln!("[server] {}/{}: {}", channel, subpath, e);
            StatusCode::SERVICE_UNAVAILABLE
        })?;

        // Keep the subdirectory context so nested relative references
        // resolve back through this relay.
        let proxy_dir = match subpath.rsplit_once('/') {
            Some((dir, _)) => format!("/{channel}/{dir}/"),
            None => format!("/{channel}/"),
        };

        let rewritten = rewrite_manifest(
            &body,
            &RewriteMode::StaticProxied {
                upstream_base: base_url,
                channel_id: &channel,
                proxy_dir: &proxy_dir,
            },
        );
        println!(
            "[server] Served {}/{} ({} bytes, rewritten)",
            channel,
            subpath,
            rewritten.len()
        );
        Ok(manifest_response(rewritten))
    } else {
        println!("[server] Served {}/{} (passthrough)", channel, subpath);
        Ok(Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from_stream(response.bytes_stream()))
            .unwrap())
    }
}
