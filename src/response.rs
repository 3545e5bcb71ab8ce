use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Wire envelope every endpoint returns: `{status, data, message}`.
///
/// `status` always mirrors the HTTP status code, so clients can rely on a
/// single status field.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub status: u16,
    pub data: T,
    pub message: String,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(status: StatusCode, data: T, message: impl Into<String>) -> Self {
        Self {
            status: status.as_u16(),
            data,
            message: message.into(),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_status_matches_http_status() {
        let res = ApiResponse::new(StatusCode::CREATED, serde_json::json!({"id": 1}), "created");
        assert_eq!(res.status, 201);
        let json = serde_json::to_value(&res).unwrap();
        assert_eq!(json["status"], 201);
        assert_eq!(json["message"], "created");
        assert_eq!(json["data"]["id"], 1);
    }

    #[test]
    fn envelope_serializes_null_data() {
        let res = ApiResponse::new(StatusCode::OK, serde_json::Value::Null, "ok");
        let json = serde_json::to_value(&res).unwrap();
        assert!(json["data"].is_null());
    }
}
