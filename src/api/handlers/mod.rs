pub mod checkout;
pub mod health;
pub mod payment;
pub mod shipment;

use axum::http::HeaderMap;

use super::types::ApiError;
use crate::core_types::UserId;

/// Extract the authenticated user id injected by the upstream auth proxy.
pub(crate) fn extract_user_id(headers: &HeaderMap) -> Result<UserId, ApiError> {
    let raw = headers
        .get("X-User-ID")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Missing X-User-ID header"))?;

    raw.parse::<UserId>()
        .map_err(|_| ApiError::bad_request("Invalid X-User-ID format"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_user_id() {
        let mut headers = HeaderMap::new();
        assert!(extract_user_id(&headers).is_err());

        headers.insert("X-User-ID", HeaderValue::from_static("42"));
        assert_eq!(extract_user_id(&headers).unwrap(), 42);

        headers.insert("X-User-ID", HeaderValue::from_static("not-a-number"));
        assert!(extract_user_id(&headers).is_err());
    }
}
