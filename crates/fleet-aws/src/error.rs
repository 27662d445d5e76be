//! Mapping from AWS SDK errors onto [`ApiError`] kinds.

use aws_sdk_ecs::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};

use fleet_orchestrator::ApiError;

/// Error codes AWS uses for faults on its side rather than the caller's.
const SERVER_CODES: &[&str] = &[
    "ServerException",
    "InternalFailure",
    "InternalServerError",
    "ServiceUnavailable",
    "ServiceUnavailableException",
];

/// Classify an SDK error. `is_not_found` picks out the operation's
/// not-found variants (service, cluster, pipeline...).
pub(crate) fn classify<E, R>(err: SdkError<E, R>, is_not_found: fn(&E) -> bool) -> ApiError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    match err.as_service_error() {
        Some(service_err) => classify_code(
            service_err.code(),
            service_err.message(),
            is_not_found(service_err),
        ),
        // Construction, dispatch, timeout and response failures never
        // reached a modeled service error.
        None => ApiError::Unexpected(DisplayErrorContext(&err).to_string()),
    }
}

/// Classify a modeled service error by its code.
pub fn classify_code(code: Option<&str>, message: Option<&str>, not_found: bool) -> ApiError {
    let message = message.unwrap_or_default().to_string();
    if not_found {
        return ApiError::NotFound(message);
    }
    match code {
        Some(code) if SERVER_CODES.contains(&code) => {
            ApiError::Unexpected(format!("{code}: {message}"))
        }
        Some(code) => ApiError::client(code, message),
        None => ApiError::Unexpected(message),
    }
}
