use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use aquadash_core::DashError;

/// JSON error body `{success: false, error, message}` with a status code.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    /// Short user-facing label.
    pub error: String,
    /// Technical detail.
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
            message: message.into(),
        }
    }

    /// Same status and detail, different label.
    pub fn labelled(mut self, error: impl Into<String>) -> Self {
        self.error = error.into();
        self
    }
}

impl From<DashError> for ApiError {
    fn from(err: DashError) -> Self {
        let (status, label) = match &err {
            DashError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "缺少必要参数"),
            DashError::Upstream { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "生成结论失败"),
            DashError::WeWork { .. } => (StatusCode::BAD_GATEWAY, "企业微信接口调用失败"),
            DashError::NotFound(_) => (StatusCode::NOT_FOUND, "资源不存在"),
            DashError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "未登录"),
            DashError::Config(_) | DashError::Storage(_) | DashError::Other(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "服务器内部错误")
            }
        };
        Self::new(status, label, err.to_string())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        DashError::Other(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, error = %self.error, message = %self.message, "Request failed");
        }
        (
            self.status,
            Json(json!({
                "success": false,
                "error": self.error,
                "message": self.message,
            })),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_variants_to_status() {
        let e: ApiError = DashError::InvalidRequest("chartType".into()).into();
        assert_eq!(e.status, StatusCode::BAD_REQUEST);
        let e: ApiError = DashError::upstream("openai", "401 Unauthorized").into();
        assert_eq!(e.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(e.error, "生成结论失败");
        assert!(e.message.contains("401 Unauthorized"));
        let e: ApiError = anyhow::anyhow!("disk").into();
        assert_eq!(e.status, StatusCode::INTERNAL_SERVER_ERROR);
        let e: ApiError = DashError::NotFound("项目".into()).into();
        assert_eq!(e.labelled("项目不存在").error, "项目不存在");
    }
}
