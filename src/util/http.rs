use http_body_util::BodyExt;
use hyper::body::Body;
use std::fmt::Display;
use tower::BoxError;

/// Reads a whole response body as text. Invalid UTF-8 is replaced rather
/// than rejected, error bodies are only ever reported.
pub async fn response_string<B>(body: B) -> Result<String, BoxError>
where
    B: Body,
    B::Error: Display,
{
    let bytes = body
        .collect()
        .await
        .map_err(|e| format!("Failed to read response {}", e))?
        .to_bytes();

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
