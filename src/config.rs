use std::time::Duration;

use serde::Serialize;

use crate::error::Error;

/// Static admin credentials posted to the login endpoint.
#[derive(Clone, Serialize)]
pub struct AdminCredentials {
    email: String,
    password: String,
}

impl AdminCredentials {
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }
}

impl std::fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Storage keys the overlay reads and writes.
#[derive(Debug, Clone)]
pub struct StorageKeys {
    pub user_key: String,
    pub auth_key: String,
    pub position_key: String,
    pub collapsed_key: String,
    pub admin_token_cache_key: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            user_key: "persist:user".into(),
            auth_key: "persist:auth".into(),
            position_key: "userInfoPanelPosition".into(),
            collapsed_key: "userInfoPanelCollapsed".into(),
            admin_token_cache_key: "adminAuthTokenCache".into(),
        }
    }
}

/// Endpoint paths, appended verbatim to the resolved API base.
#[derive(Debug, Clone)]
pub struct ApiPaths {
    pub login: String,
    pub features: String,
    pub tokens: String,
    pub subscription: String,
    pub delete_user: String,
}

impl Default for ApiPaths {
    fn default() -> Self {
        Self {
            login: String::new(),
            features: String::new(),
            tokens: String::new(),
            subscription: String::new(),
            delete_user: "/User".into(),
        }
    }
}

/// One environment group: its hosts and the API it talks to.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentGroup {
    pub api_base: String,
    pub product_id: String,
    pub hosts: Vec<String>,
}

/// Overlay configuration.
///
/// Admin credentials are the only required part and are a constructor
/// parameter. Everything else has a default and can be overridden with the
/// `with_*` methods, or loaded with [`from_env()`](OverlayConfig::from_env).
#[derive(Debug, Clone)]
pub struct OverlayConfig {
    pub(crate) credentials: AdminCredentials,
    pub(crate) storage: StorageKeys,
    pub(crate) paths: ApiPaths,
    pub(crate) production: EnvironmentGroup,
    pub(crate) staging: EnvironmentGroup,
    pub(crate) read_only_hosts: Vec<String>,
    pub(crate) non_interactive_features: Vec<String>,
    pub(crate) chat_experiment_options: Vec<String>,
    pub(crate) check_interval: Duration,
    pub(crate) startup_delay: Duration,
    pub(crate) token_ttl: Duration,
}

impl OverlayConfig {
    #[must_use]
    pub fn new(credentials: AdminCredentials) -> Self {
        Self {
            credentials,
            storage: StorageKeys::default(),
            paths: ApiPaths::default(),
            production: EnvironmentGroup {
                api_base: "https://api.get-honey.ai/api".into(),
                product_id: String::new(),
                hosts: vec!["get-honey.ai".into()],
            },
            staging: EnvironmentGroup::default(),
            read_only_hosts: Vec::new(),
            non_interactive_features: ["hasConfirmedAge", "isRomanceModeActive", "isTUser", "nEnabled"]
                .into_iter()
                .map(String::from)
                .collect(),
            chat_experiment_options: Vec::new(),
            check_interval: Duration::from_millis(1000),
            startup_delay: Duration::from_millis(1500),
            token_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `PANEL_ADMIN_EMAIL`, `PANEL_ADMIN_PASSWORD`: admin login credentials
    ///
    /// # Optional env vars
    /// - `PANEL_PROD_API_BASE`, `PANEL_STAGE_API_BASE`: API base URLs
    /// - `PANEL_PROD_PRODUCT_ID`, `PANEL_STAGE_PRODUCT_ID`: subscription product ids
    /// - `PANEL_PROD_HOSTS`, `PANEL_STAGE_HOSTS`, `PANEL_READ_ONLY_HOSTS`: comma-separated hosts
    /// - `PANEL_LOGIN_PATH`, `PANEL_FEATURES_PATH`, `PANEL_TOKENS_PATH`,
    ///   `PANEL_SUBSCRIPTION_PATH`, `PANEL_DELETE_USER_PATH`: endpoint paths
    /// - `PANEL_CHECK_INTERVAL_MS`: poll interval in milliseconds
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if a required variable is missing or a
    /// numeric value does not parse.
    pub fn from_env() -> Result<Self, Error> {
        let email = std::env::var("PANEL_ADMIN_EMAIL")
            .map_err(|_| Error::Validation("PANEL_ADMIN_EMAIL is required".into()))?;
        let password = std::env::var("PANEL_ADMIN_PASSWORD")
            .map_err(|_| Error::Validation("PANEL_ADMIN_PASSWORD is required".into()))?;

        let mut config = Self::new(AdminCredentials::new(email, password));

        if let Ok(base) = std::env::var("PANEL_PROD_API_BASE") {
            config = config.with_production_api_base(base);
        }
        if let Ok(base) = std::env::var("PANEL_STAGE_API_BASE") {
            config = config.with_staging_api_base(base);
        }
        if let Ok(id) = std::env::var("PANEL_PROD_PRODUCT_ID") {
            config = config.with_production_product_id(id);
        }
        if let Ok(id) = std::env::var("PANEL_STAGE_PRODUCT_ID") {
            config = config.with_staging_product_id(id);
        }
        if let Ok(hosts) = std::env::var("PANEL_PROD_HOSTS") {
            config = config.with_production_hosts(split_list(&hosts));
        }
        if let Ok(hosts) = std::env::var("PANEL_STAGE_HOSTS") {
            config = config.with_staging_hosts(split_list(&hosts));
        }
        if let Ok(hosts) = std::env::var("PANEL_READ_ONLY_HOSTS") {
            config = config.with_read_only_hosts(split_list(&hosts));
        }

        let mut paths = config.paths.clone();
        for (var, slot) in [
            ("PANEL_LOGIN_PATH", &mut paths.login),
            ("PANEL_FEATURES_PATH", &mut paths.features),
            ("PANEL_TOKENS_PATH", &mut paths.tokens),
            ("PANEL_SUBSCRIPTION_PATH", &mut paths.subscription),
            ("PANEL_DELETE_USER_PATH", &mut paths.delete_user),
        ] {
            if let Ok(path) = std::env::var(var) {
                *slot = path;
            }
        }
        config = config.with_paths(paths);

        if let Ok(ms) = std::env::var("PANEL_CHECK_INTERVAL_MS") {
            let ms: u64 = ms
                .parse()
                .map_err(|e| Error::Validation(format!("PANEL_CHECK_INTERVAL_MS: {e}")))?;
            config = config.with_check_interval(Duration::from_millis(ms));
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_storage_keys(mut self, keys: StorageKeys) -> Self {
        self.storage = keys;
        self
    }

    #[must_use]
    pub fn with_paths(mut self, paths: ApiPaths) -> Self {
        self.paths = paths;
        self
    }

    #[must_use]
    pub fn with_production_api_base(mut self, base: impl Into<String>) -> Self {
        self.production.api_base = base.into();
        self
    }

    #[must_use]
    pub fn with_staging_api_base(mut self, base: impl Into<String>) -> Self {
        self.staging.api_base = base.into();
        self
    }

    #[must_use]
    pub fn with_production_product_id(mut self, id: impl Into<String>) -> Self {
        self.production.product_id = id.into();
        self
    }

    #[must_use]
    pub fn with_staging_product_id(mut self, id: impl Into<String>) -> Self {
        self.staging.product_id = id.into();
        self
    }

    #[must_use]
    pub fn with_production_hosts(mut self, hosts: Vec<String>) -> Self {
        self.production.hosts = hosts;
        self
    }

    #[must_use]
    pub fn with_staging_hosts(mut self, hosts: Vec<String>) -> Self {
        self.staging.hosts = hosts;
        self
    }

    /// Hosts where the panel only displays data (mutating controls hidden).
    #[must_use]
    pub fn with_read_only_hosts(mut self, hosts: Vec<String>) -> Self {
        self.read_only_hosts = hosts;
        self
    }

    /// Feature keys shown as status rows instead of editable controls.
    #[must_use]
    pub fn with_non_interactive_features(mut self, keys: Vec<String>) -> Self {
        self.non_interactive_features = keys;
        self
    }

    /// Preset values offered for the `featureChatExperiment` feature.
    #[must_use]
    pub fn with_chat_experiment_options(mut self, options: Vec<String>) -> Self {
        self.chat_experiment_options = options;
        self
    }

    #[must_use]
    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    #[must_use]
    pub fn with_startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = delay;
        self
    }

    #[must_use]
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    #[must_use]
    pub fn storage(&self) -> &StorageKeys {
        &self.storage
    }

    #[must_use]
    pub fn paths(&self) -> &ApiPaths {
        &self.paths
    }

    #[must_use]
    pub fn check_interval(&self) -> Duration {
        self.check_interval
    }

    pub(crate) fn is_non_interactive(&self, key: &str) -> bool {
        self.non_interactive_features.iter().any(|k| k == key)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
