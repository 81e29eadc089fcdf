use std::path::PathBuf;

use axum::extract::Query;
use axum::http::{HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tokio::fs::File;

use axum_byterange::{KnownSize, RangeHeader, Ranged};

#[derive(Debug, Deserialize)]
struct FileRequest {
    path: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let router = Router::new()
        .route("/", get(|| async { "Hello, World!" }))
        .route("/file", get(get_file));

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
    tracing::info!("listening on {}", listener.local_addr().unwrap());
    axum::serve(listener, router).await.unwrap();
}

async fn get_file(range: RangeHeader, Query(query): Query<FileRequest>) -> impl IntoResponse {
    let path = PathBuf::from(&query.path);

    let file = match File::open(&path).await {
        Ok(file) => file,
        Err(err) => {
            return (StatusCode::NOT_FOUND, format!("cannot open {}: {err}", path.display()))
                .into_response();
        }
    };

    let body = match KnownSize::file(file).await {
        Ok(body) => body,
        Err(err) => {
            return (StatusCode::INTERNAL_SERVER_ERROR, format!("metadata failed: {err}"))
                .into_response();
        }
    };

    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    let content_type = HeaderValue::from_str(mime.as_ref())
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    Ranged::new(range, body).content_type(content_type).into_response()
}
