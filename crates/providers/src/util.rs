//! Shared utility functions for provider adapters.

use cwa_domain::error::Error;

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
///
/// Timeout errors map to [`Error::Timeout`]; everything else maps to
/// [`Error::Network`].
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Network(e.to_string())
    }
}

/// Resolve the API key from the configured environment variable.
pub fn resolve_api_key(env_var: &str) -> cwa_domain::error::Result<String> {
    std::env::var(env_var).map_err(|_| {
        Error::Authentication(format!(
            "environment variable '{}' not set or not valid UTF-8",
            env_var
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_api_key_env_var() {
        let var_name = "CWA_TEST_RESOLVE_ENV_KEY_1234";
        std::env::set_var(var_name, "env-secret-value");
        let result = resolve_api_key(var_name).unwrap();
        assert_eq!(result, "env-secret-value");
        std::env::remove_var(var_name);
    }

    #[test]
    fn resolve_api_key_missing_var_is_an_error() {
        let err = resolve_api_key("CWA_TEST_NONEXISTENT_VAR_8888").unwrap_err();
        assert!(err.to_string().contains("CWA_TEST_NONEXISTENT_VAR_8888"));
    }
}
