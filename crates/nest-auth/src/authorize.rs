//! Authorization URL for the Nest partner connections manager
//!
//! Google requires `access_type=offline` and `prompt=consent` for the
//! callback to include a refresh token.

use reqwest::Url;

use crate::constants::SDM_SCOPE;
use crate::error::{Error, Result};

/// Build the URL the browser is sent to for granting device access.
pub fn build_authorization_url(
    authorize_base_url: &str,
    project_id: &str,
    client_id: &str,
    redirect_uri: &str,
) -> Result<String> {
    let base = format!(
        "{}/{}/auth",
        authorize_base_url.trim_end_matches('/'),
        project_id
    );
    let url = Url::parse_with_params(
        &base,
        &[
            ("redirect_uri", redirect_uri),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("client_id", client_id),
            ("response_type", "code"),
            ("scope", SDM_SCOPE),
        ],
    )
    .map_err(|e| Error::InvalidUrl(format!("{base}: {e}")))?;
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::AUTHORIZE_BASE_URL;
    use std::collections::HashMap;

    fn query_of(url: &str) -> HashMap<String, String> {
        Url::parse(url).unwrap().query_pairs().into_owned().collect()
    }

    #[test]
    fn url_targets_project_auth_path() {
        let url = build_authorization_url(
            AUTHORIZE_BASE_URL,
            "project-123",
            "client.apps.googleusercontent.com",
            "http://example.com/code",
        )
        .unwrap();
        assert!(
            url.starts_with("https://nestservices.google.com/partnerconnections/project-123/auth?"),
            "got: {url}"
        );
    }

    #[test]
    fn url_contains_required_params() {
        let url = build_authorization_url(
            AUTHORIZE_BASE_URL,
            "project-123",
            "client-id",
            "http://example.com/code",
        )
        .unwrap();
        let query = query_of(&url);
        assert_eq!(query["redirect_uri"], "http://example.com/code");
        assert_eq!(query["access_type"], "offline");
        assert_eq!(query["prompt"], "consent");
        assert_eq!(query["client_id"], "client-id");
        assert_eq!(query["response_type"], "code");
        assert_eq!(query["scope"], SDM_SCOPE);
    }

    #[test]
    fn redirect_uri_is_percent_encoded() {
        let url = build_authorization_url(
            AUTHORIZE_BASE_URL,
            "p",
            "c",
            "https://boost.example.com/code?x=1&y=2",
        )
        .unwrap();
        assert!(!url.contains("code?x=1&y=2"), "got: {url}");
        assert_eq!(
            query_of(&url)["redirect_uri"],
            "https://boost.example.com/code?x=1&y=2"
        );
    }

    #[test]
    fn trailing_slash_in_base_is_ignored() {
        let url = build_authorization_url("https://auth.example.com/pc/", "p", "c", "r").unwrap();
        assert!(url.starts_with("https://auth.example.com/pc/p/auth?"), "got: {url}");
    }

    #[test]
    fn invalid_base_is_error() {
        let result = build_authorization_url("not a url", "p", "c", "r");
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }
}
