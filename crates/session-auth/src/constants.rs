//! Auth endpoint paths, relative to the API base URL

/// Exchange a refresh token for a new token pair
pub const REFRESH_PATH: &str = "/auth/refresh";

/// Email/password sign-in
pub const LOGIN_PATH: &str = "/auth/login";

/// Account creation; responds like login
pub const REGISTER_PATH: &str = "/auth/register";

/// Revoke a refresh token server-side
pub const LOGOUT_PATH: &str = "/auth/logout";
