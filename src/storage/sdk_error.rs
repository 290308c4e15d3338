//! Mapping from SDK errors onto `StorageError`

use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};

use crate::error::StorageError;

pub(super) fn storage_error<E>(err: SdkError<E, HttpResponse>) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let status = err.raw_response().map(|response| response.status().as_u16());
    let code = match &err {
        SdkError::ServiceError(_) => err.code().unwrap_or("Unknown").to_string(),
        SdkError::DispatchFailure(_) => "NetworkingError".to_string(),
        SdkError::TimeoutError(_) => "TimeoutError".to_string(),
        SdkError::ResponseError(_) => "ResponseError".to_string(),
        SdkError::ConstructionFailure(_) => "ConstructionFailure".to_string(),
        _ => "Unknown".to_string(),
    };
    let message = err
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| DisplayErrorContext(&err).to_string());

    let mapped = StorageError::new(code, message);
    match status {
        Some(status) => mapped.with_status(status),
        None => mapped,
    }
}

/// Errors that happen before a request is sent (builder validation, body reads).
pub(super) fn local_error(code: &str, err: impl std::fmt::Display) -> StorageError {
    StorageError::new(code, err.to_string())
}
