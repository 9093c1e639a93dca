use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use log::error;
use thiserror::Error;

/// リクエスト処理中に発生するエラー。
///
/// どのエラーもリクエストを中断し、部分的な出力は行わない。
#[derive(Debug, Error)]
pub enum Error {
    /// 日付やgroupingがパースできない。
    #[error("bad request: {0}")]
    BadRequest(String),

    /// データソースが設定されていない、または期間が不正。
    #[error("invalid configuration: {0}")]
    Config(String),

    /// ファイルが存在しない、通信に失敗した等。
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// CSVの列数や時刻が不正、APIのレスポンスが解釈できない。
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Toggl APIがトークンを拒否した。
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("failed to render time sheet")]
    Render(#[from] std::fmt::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// HTTPレスポンスのステータスコードを返す。
    pub fn status(&self) -> StatusCode {
        match self {
            Error::BadRequest(_) | Error::Config(_) => StatusCode::BAD_REQUEST,
            Error::SourceUnavailable(_) | Error::MalformedInput(_) | Error::AuthFailed(_) => {
                StatusCode::BAD_GATEWAY
            }
            Error::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        error!("request failed: {}", self);
        (self.status(), self.to_string()).into_response()
    }
}
