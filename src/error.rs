use std::io;

use axum::{http::StatusCode, response::IntoResponse};

pub type Result<T> = core::result::Result<T, Error>;

/// 列表版本仓储的统一错误类型
///
/// - [`Error::InvalidReference`]：版本不属于给定列表，操作在修改数据前中止
/// - [`Error::NotFound`]：列表或文章不存在
/// - [`Error::PreconditionNotMet`]：前置条件不满足，例如列表没有预览版本
/// - [`Error::Sqlx`] / [`Error::InvalidResult`]：存储层失败，不做重试
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("version {version_id} does not belong to list {list_id}")]
    InvalidReference { list_id: i64, version_id: i64 },

    #[error("Not Found")]
    NotFound,

    #[error("{0}")]
    PreconditionNotMet(&'static str),

    #[error("unknown article field `{0}`")]
    UnknownField(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    /// 存储层返回了不可能出现的结果
    #[error("invalid storage result: {0}")]
    InvalidResult(&'static str),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),

    #[error("config: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        match self {
            Error::NotFound => (StatusCode::NOT_FOUND, "NOT FOUND").into_response(),
            Error::InvalidReference { .. } => {
                (StatusCode::NOT_FOUND, self.to_string()).into_response()
            }
            Error::PreconditionNotMet(s) => (StatusCode::CONFLICT, s).into_response(),
            Error::UnknownField(_) | Error::Serde(_) => {
                (StatusCode::BAD_REQUEST, self.to_string()).into_response()
            }
            Error::Sqlx(e) => {
                tracing::error!(%e, "sqlx error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
            .into_response(),
            Error::InvalidResult(s) => {
                tracing::error!(reason = s, "storage returned invalid result");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
            .into_response(),
            Error::Config(_) | Error::Io(_) => {
                tracing::error!(e = %self, "server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
            .into_response(),
        }
    }
}
