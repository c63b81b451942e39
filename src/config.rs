use serde::Deserialize;
use std::{collections::BTreeMap, env, fs, path::Path, path::PathBuf, time::Duration};
use url::Url;

use crate::client::retry::{
    DEFAULT_BASE_DELAY, DEFAULT_MAX_RETRIES, DEFAULT_REGISTER_MAX_RETRIES, RetryPolicy,
};

pub const DEFAULT_BASE_URL: &str = "https://gateway.yowyob.com";
pub const TOKEN_ENDPOINT_PATH: &str = "/auth-service/oauth/token";
pub const LOGIN_PATH: &str = "/auth-service/api/login";
pub const REGISTER_PATH: &str = "/auth-service/api/register";
pub const DEFAULT_SCOPE: &str = "read write";

// Development credentials of the reference gateway. Loading a configuration
// that still uses either one logs a warning.
const DEFAULT_CLIENT_ID: &str = "test-client";
const DEFAULT_CLIENT_SECRET: &str = "secret";

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_READ_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RESPONSE_TIMEOUT_SECS: u64 = 45;

/// On-disk `gateway.json`. Every field is optional.
#[derive(Debug, Default, Deserialize)]
pub struct GatewayFileConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub token_endpoint: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub static_headers: BTreeMap<String, String>,
    #[serde(default)]
    pub timeouts: TimeoutSettings,
    #[serde(default)]
    pub retry: RetrySettings,
}

#[derive(Debug, Default, Deserialize)]
pub struct TimeoutSettings {
    #[serde(default)]
    pub connect_secs: Option<u64>,
    #[serde(default)]
    pub read_secs: Option<u64>,
    #[serde(default)]
    pub response_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RetrySettings {
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub register_max_retries: Option<u32>,
    #[serde(default)]
    pub base_delay_ms: Option<u64>,
}

/// Runtime configuration of the gateway client.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: Url,
    pub token_endpoint: Url,
    pub client_id: String,
    pub client_secret: String,
    pub scope: String,
    /// Sent on every dispatcher call (e.g. `application_id`, `Public-Key`).
    pub static_headers: BTreeMap<String, String>,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub response_timeout: Duration,
    pub dispatcher_retry: RetryPolicy,
    pub register_retry: RetryPolicy,
    pub login_path: String,
    pub register_path: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        let base_url = Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid");
        let token_endpoint =
            token_endpoint_for(&base_url).expect("default token endpoint is valid");
        Self {
            base_url,
            token_endpoint,
            client_id: DEFAULT_CLIENT_ID.to_string(),
            client_secret: DEFAULT_CLIENT_SECRET.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            static_headers: BTreeMap::new(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
            response_timeout: Duration::from_secs(DEFAULT_RESPONSE_TIMEOUT_SECS),
            dispatcher_retry: RetryPolicy::new(DEFAULT_MAX_RETRIES, DEFAULT_BASE_DELAY),
            register_retry: RetryPolicy::new(DEFAULT_REGISTER_MAX_RETRIES, DEFAULT_BASE_DELAY),
            login_path: LOGIN_PATH.to_string(),
            register_path: REGISTER_PATH.to_string(),
        }
    }
}

impl GatewayConfig {
    /// Defaults pointed at another gateway; the token endpoint follows.
    pub fn with_base_url(base_url: &str) -> anyhow::Result<Self> {
        let base_url = parse_url("base_url", base_url)?;
        Ok(Self {
            token_endpoint: token_endpoint_for(&base_url)?,
            base_url,
            ..Default::default()
        })
    }

    pub fn from_file_config(cfg: GatewayFileConfig) -> anyhow::Result<Self> {
        let mut config = match cfg.base_url {
            Some(base) => Self::with_base_url(&expand_env_vars(&base))?,
            None => Self::default(),
        };

        if let Some(endpoint) = cfg.token_endpoint {
            config.token_endpoint = parse_url("token_endpoint", &expand_env_vars(&endpoint))?;
        }
        if let Some(id) = cfg.client_id {
            config.client_id = expand_env_vars(&id);
        }
        if let Some(secret) = cfg.client_secret {
            config.client_secret = expand_env_vars(&secret);
        }
        if let Some(scope) = cfg.scope {
            config.scope = scope;
        }
        config.static_headers = cfg
            .static_headers
            .into_iter()
            .map(|(name, value)| (name, expand_env_vars(&value)))
            .collect();

        let t = cfg.timeouts;
        if let Some(secs) = t.connect_secs {
            config.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = t.read_secs {
            config.read_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = t.response_secs {
            config.response_timeout = Duration::from_secs(secs);
        }

        let r = cfg.retry;
        let base_delay = r
            .base_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_BASE_DELAY);
        config.dispatcher_retry = RetryPolicy::new(
            r.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            base_delay,
        );
        config.register_retry = RetryPolicy::new(
            r.register_max_retries.unwrap_or(DEFAULT_REGISTER_MAX_RETRIES),
            base_delay,
        );

        Ok(config)
    }

    /// Whether the client id or secret is still the built-in development value.
    pub fn uses_default_credentials(&self) -> bool {
        self.client_id == DEFAULT_CLIENT_ID || self.client_secret == DEFAULT_CLIENT_SECRET
    }
}

fn parse_url(field: &str, raw: &str) -> anyhow::Result<Url> {
    Url::parse(raw).map_err(|e| anyhow::anyhow!("Invalid `{}` URL `{}`: {}", field, raw, e))
}

fn token_endpoint_for(base_url: &Url) -> anyhow::Result<Url> {
    let joined = crate::client::join_url(base_url.as_str(), TOKEN_ENDPOINT_PATH);
    parse_url("token_endpoint", &joined)
}

/// Locate `gateway.json`: explicit path, then `GATEWAY_CONFIG`, then
/// `./gateway.json`. `None` means run on defaults.
pub fn resolve_config_path(explicit: Option<&Path>) -> anyhow::Result<Option<PathBuf>> {
    if let Some(p) = explicit {
        if !p.exists() {
            return Err(anyhow::anyhow!(
                "Config file `{}` does not exist",
                p.display()
            ));
        }
        return Ok(Some(p.to_path_buf()));
    }

    if let Ok(p) = env::var("GATEWAY_CONFIG") {
        return Ok(Some(PathBuf::from(p)));
    }

    let candidate = PathBuf::from("gateway.json");
    if candidate.exists() {
        return Ok(Some(candidate));
    }

    Ok(None)
}

pub fn load_gateway_config(explicit: Option<&Path>) -> anyhow::Result<GatewayConfig> {
    let config = match resolve_config_path(explicit)? {
        None => {
            tracing::info!("No gateway.json found, using built-in defaults");
            GatewayConfig::default()
        }
        Some(path) => {
            let raw = fs::read_to_string(&path)
                .map_err(|e| anyhow::anyhow!("Failed to read `{}`: {}", path.display(), e))?;
            let cfg: GatewayFileConfig = serde_json::from_str(&raw)
                .map_err(|e| anyhow::anyhow!("Failed to parse `{}`: {}", path.display(), e))?;

            tracing::info!(path = %path.display(), "Loaded gateway configuration");
            GatewayConfig::from_file_config(cfg)?
        }
    };

    if config.uses_default_credentials() {
        tracing::warn!(
            client_id = %config.client_id,
            "Using built-in development client credentials; set client_id and client_secret in gateway.json"
        );
    }

    Ok(config)
}

/// Replace `${VAR}` with the environment value. Unknown variables and an
/// unterminated `${` are left as written.
pub fn expand_env_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut name = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                name.push(c);
            }
            match env::var(&name) {
                Ok(val) if closed => out.push_str(&val),
                _ => {
                    out.push_str("${");
                    out.push_str(&name);
                    if closed {
                        out.push('}');
                    }
                }
            }
        } else {
            out.push(ch);
        }
    }

    out
}
