//! Google OAuth endpoints, scopes, and the fixed mock token set
//!
//! Endpoints are defaults only; the gateway config may point them elsewhere
//! (a local mock server in tests, for instance).

/// Token endpoint for code exchange and token refresh
pub const GOOGLE_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// Authorization endpoint the browser is redirected to
pub const GOOGLE_AUTHORIZE_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Scopes for "Sign in with Google"
pub const LOGIN_SCOPES: &str = "openid email profile";

/// Scopes for the Google Calendar integration
pub const CALENDAR_SCOPES: &str = "openid email https://www.googleapis.com/auth/calendar";

/// Default bound on a token endpoint round trip
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Mock mode access token
pub const MOCK_ACCESS_TOKEN: &str = "FAKE_ACCESS_TOKEN";

/// Mock mode refresh token
pub const MOCK_REFRESH_TOKEN: &str = "FAKE_REFRESH_TOKEN";

/// Mock mode token lifetime in seconds
pub const MOCK_EXPIRES_IN: u64 = 3600;

pub const MOCK_EMAIL: &str = "you@example.com";

pub const MOCK_NAME: &str = "Local Dev User";
