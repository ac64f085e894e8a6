//! Maps AWS SDK error codes onto the shared domain error taxonomy, the
//! same `ThrottlingException` / `AccessDeniedException` /
//! `ResourceNotFoundException` / `InvalidParameterException` switch the
//! reference implementation's `ClientError` handler used.

use aws_sdk_cloudwatchlogs::error::{ProvideErrorMetadata, SdkError};
use cwa_domain::error::Error;

/// `not_found_is_log_group` controls whether `ResourceNotFoundException`
/// maps to `Error::NotFound` (as it does for `fetch_logs`, where a
/// missing log group is expected and recoverable) or `Error::Other` (as
/// it does for operations where a missing resource is unexpected).
pub fn map_aws_error<E, R>(context: &str, err: SdkError<E, R>, not_found_is_log_group: bool) -> Error
where
    E: ProvideErrorMetadata + std::fmt::Display,
{
    let code = err.code().map(str::to_string);
    let message = format!("{context}: {err}");

    match code.as_deref() {
        Some("ThrottlingException") => Error::RateLimit(message),
        Some("AccessDeniedException") => Error::Authentication(message),
        Some("ResourceNotFoundException") if not_found_is_log_group => Error::NotFound(message),
        Some("InvalidParameterException") => Error::InvalidRequest(message),
        _ => Error::Other(message),
    }
}
