//! The JSON wrapper around every proxied response.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use tracing::error;

use crate::http::X_CACHE;
use crate::{Response, StatusCode};

/// Message carried by every success envelope, hit or miss.
pub const SUCCESS_MESSAGE: &str = "success fetch from origin server";

/// Whether a response was served from the store or fetched from the origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    /// Value of the `X-Cache` header.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "HIT",
            Self::Miss => "MISS",
        }
    }
}

/// Response body sent for every non-blocked request.
///
/// A success envelope carries `data`; an error envelope carries `errors`.
/// Fields serialize in declaration order: `success`, `statusCode`,
/// `message`, then `data` or `errors`. `data` is embedded exactly as the
/// origin sent it, key order and number text included.
///
/// # Examples
///
/// ```
/// use cache_proxy::proxy::Envelope;
/// use serde_json::value::RawValue;
///
/// let data = RawValue::from_string(r#"{"zeta":1,"alpha":2}"#.to_owned()).unwrap();
/// let body = Envelope::success(data).to_json().unwrap();
/// assert_eq!(
///     body,
///     r#"{"success":true,"statusCode":200,"message":"success fetch from origin server","data":{"zeta":1,"alpha":2}}"#
/// );
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub success: bool,
    pub status_code: u16,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Box<RawValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<serde_json::Value>>,
}

impl Envelope {
    /// Wraps an origin body in a `200` success envelope.
    pub fn success(data: Box<RawValue>) -> Self {
        Self {
            success: true,
            status_code: StatusCode::Ok.as_u16(),
            message: SUCCESS_MESSAGE.to_owned(),
            data: Some(data),
            errors: None,
        }
    }

    /// Builds a `400` error envelope with an empty `errors` list.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            status_code: StatusCode::BadRequest.as_u16(),
            message: message.into(),
            data: None,
            errors: Some(Vec::new()),
        }
    }

    /// Serializes the envelope to compact JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Turns the envelope into an HTTP response with `Content-Type` and
    /// `X-Cache` set.
    pub fn into_response(self, cache: CacheStatus) -> Response {
        let status = if self.success {
            StatusCode::Ok
        } else {
            StatusCode::BadRequest
        };

        match self.to_json() {
            Ok(body) => Response::new(status)
                .header("Content-Type", "application/json")
                .header(X_CACHE, cache.as_str())
                .body(body),
            Err(e) => {
                error!(error = %e, "failed to encode response envelope");
                Response::new(StatusCode::InternalServerError)
                    .header(X_CACHE, cache.as_str())
                    .body("failed to encode response")
            }
        }
    }
}
