//! HTTP helpers for the HTTP-fronted function.

use lambda_http::{Body, Response};
use serde::Serialize;

use crate::models::UpdateResult;

/// Create a JSON response with the given status code and data.
pub fn json_response<T: Serialize>(
    status: u16,
    data: &T,
) -> Result<Response<Body>, lambda_http::Error> {
    let response = Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(data)?))
        .map_err(Box::new)?;

    Ok(response)
}

/// Status code and body for an update outcome.
///
/// The body is always a well-formed result object; the status only mirrors it.
pub fn outcome_response(
    outcome: crate::Result<UpdateResult>,
) -> Result<Response<Body>, lambda_http::Error> {
    let status = match &outcome {
        Ok(_) => 200,
        Err(e) => e.status_code(),
    };
    json_response(status, &UpdateResult::from(outcome))
}

/// Request body as text.
pub fn body_text(body: &Body) -> String {
    String::from_utf8_lossy(body.as_ref()).into_owned()
}
