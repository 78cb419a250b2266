//! Google OAuth endpoints and scope for Nest Device Access
//!
//! These are defaults; the service config can point them elsewhere (tests
//! point them at local mock servers).

/// Token endpoint for code exchange and token refresh
pub const TOKEN_ENDPOINT: &str = "https://www.googleapis.com/oauth2/v4/token";

/// Partner connections manager. The project id and `/auth` are appended.
pub const AUTHORIZE_BASE_URL: &str = "https://nestservices.google.com/partnerconnections";

/// Scope granting access to Smart Device Management
pub const SDM_SCOPE: &str = "https://www.googleapis.com/auth/sdm.service";
