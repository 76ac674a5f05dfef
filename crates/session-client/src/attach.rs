//! Bearer credential attachment for outbound calls

use transport::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use tracing::warn;

/// Set `Authorization: Bearer <token>` when a token is present, replacing any
/// existing value. Without a token the headers are left untouched and the call
/// goes out anonymously.
///
/// A token that cannot be encoded as a header value is skipped with a warning
/// rather than failing the call.
pub fn attach_bearer(headers: &mut HeaderMap, access_token: Option<&str>) {
    let Some(token) = access_token else {
        return;
    };

    match HeaderValue::from_str(&format!("Bearer {token}")) {
        Ok(mut value) => {
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        Err(e) => {
            warn!(error = %e, "access token is not a valid header value, sending without it");
        }
    }
}
