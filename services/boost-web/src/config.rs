//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The client secret and cookie keys come from CLIENT_SECRET / HASH_KEY /
//! BLOCK_KEY or from files named in the config, never from the TOML itself.

use common::Secret;
use cookie_state::codec::MIN_HASH_KEY_LEN;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub nest: NestConfig,
    #[serde(default)]
    pub cookies: CookieConfig,
}

/// HTTP listener and browser-facing settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Drop the `Secure` cookie attribute, for plain-HTTP local runs.
    #[serde(default)]
    pub insecure_cookie: bool,
    /// Fixed OAuth callback URL; derived from the request Host when unset.
    #[serde(default)]
    pub redirect_url: Option<String>,
}

/// Device Access project and Google endpoints
#[derive(Debug, Deserialize)]
pub struct NestConfig {
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_token_endpoint")]
    pub token_endpoint: String,
    #[serde(default = "default_authorize_base_url")]
    pub authorize_base_url: String,
    #[serde(skip)]
    pub client_secret: Option<Secret<String>>,
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
}

/// Cookie signing and encryption keys
#[derive(Debug, Default, Deserialize)]
pub struct CookieConfig {
    #[serde(skip)]
    pub hash_key: Option<Secret<String>>,
    #[serde(default)]
    pub hash_key_file: Option<PathBuf>,
    /// Optional; cookies are signed but not encrypted without it.
    #[serde(skip)]
    pub block_key: Option<Secret<String>>,
    #[serde(default)]
    pub block_key_file: Option<PathBuf>,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_max_connections() -> usize {
    256
}

fn default_api_base_url() -> String {
    nest_device::DEFAULT_API_BASE_URL.to_string()
}

fn default_token_endpoint() -> String {
    nest_auth::TOKEN_ENDPOINT.to_string()
}

fn default_authorize_base_url() -> String {
    nest_auth::AUTHORIZE_BASE_URL.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            max_connections: default_max_connections(),
            insecure_cookie: false,
            redirect_url: None,
        }
    }
}

impl Default for NestConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            client_id: String::new(),
            api_base_url: default_api_base_url(),
            token_endpoint: default_token_endpoint(),
            authorize_base_url: default_authorize_base_url(),
            client_secret: None,
            client_secret_file: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables
    /// and resolve secrets.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        config.apply_env();
        config.resolve_secrets()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Some(project_id) = non_empty_env("PROJECT_ID") {
            self.nest.project_id = project_id;
        }
        if let Some(client_id) = non_empty_env("CLIENT_ID") {
            self.nest.client_id = client_id;
        }
        if let Some(url) = non_empty_env("OVERRIDE_REDIRECT_URL") {
            self.server.redirect_url = Some(url);
        }
        if let Some(insecure) = non_empty_env("INSECURE_COOKIE") {
            self.server.insecure_cookie = insecure.eq_ignore_ascii_case("true");
        }
    }

    fn resolve_secrets(&mut self) -> common::Result<()> {
        self.nest.client_secret =
            Secret::resolve("CLIENT_SECRET", self.nest.client_secret_file.as_deref())?;
        self.cookies.hash_key =
            Secret::resolve("HASH_KEY", self.cookies.hash_key_file.as_deref())?;
        self.cookies.block_key =
            Secret::resolve("BLOCK_KEY", self.cookies.block_key_file.as_deref())?;

        if self.nest.client_secret.is_none() {
            return Err(common::Error::MissingSecret {
                env_var: "CLIENT_SECRET",
                file_key: "nest.client_secret_file",
            });
        }
        match &self.cookies.hash_key {
            None => Err(common::Error::MissingSecret {
                env_var: "HASH_KEY",
                file_key: "cookies.hash_key_file",
            }),
            Some(key) if key.expose().len() < MIN_HASH_KEY_LEN => {
                Err(common::Error::Config(format!(
                    "hash key must be at least {MIN_HASH_KEY_LEN} bytes, got {}",
                    key.expose().len()
                )))
            }
            Some(_) => Ok(()),
        }
    }

    fn validate(&self) -> common::Result<()> {
        if self.nest.project_id.is_empty() {
            return Err(common::Error::Config(
                "nest.project_id is required (or set PROJECT_ID)".into(),
            ));
        }
        if self.nest.client_id.is_empty() {
            return Err(common::Error::Config(
                "nest.client_id is required (or set CLIENT_ID)".into(),
            ));
        }
        for (field, url) in [
            ("nest.api_base_url", &self.nest.api_base_url),
            ("nest.token_endpoint", &self.nest.token_endpoint),
            ("nest.authorize_base_url", &self.nest.authorize_base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(common::Error::Config(format!(
                    "{field} must start with http:// or https://, got: {url}"
                )));
            }
        }
        if self.server.max_connections == 0 {
            return Err(common::Error::Config(
                "server.max_connections must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Whether cookies carry the `Secure` attribute.
    pub fn secure_cookies(&self) -> bool {
        !self.server.insecure_cookie
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("nest-heating-boost.toml")
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}
