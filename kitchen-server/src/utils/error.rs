//! 统一错误处理
//!
//! HTTP 层使用 `shared::error` 的 [`AppError`] / [`ApiResponse`]，
//! 这里补充领域错误到 `AppError` 的转换。

pub use shared::error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};

use crate::orders::StoreError;

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::database(err.to_string())
    }
}
