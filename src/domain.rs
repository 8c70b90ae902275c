use crate::config::{EnvironmentGroup, OverlayConfig};

/// Which configured environment a host belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomainGroup {
    Production,
    Staging,
    Unsupported,
}

/// API base and subscription product for the current host.
///
/// Derived on every privileged call, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainProfile {
    pub group: DomainGroup,
    pub api_base: String,
    pub product_id: String,
}

/// Strip a single leading `www.`.
#[must_use]
pub fn normalize_host(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// Maps hosts onto the configured production / staging groups.
#[derive(Debug, Clone)]
pub struct DomainResolver {
    production: EnvironmentGroup,
    staging: EnvironmentGroup,
    read_only: Vec<String>,
}

impl DomainResolver {
    #[must_use]
    pub fn new(config: &OverlayConfig) -> Self {
        Self {
            production: config.production.clone(),
            staging: config.staging.clone(),
            read_only: config.read_only_hosts.clone(),
        }
    }

    /// Resolve the profile for `hostname`. Total: every host gets a profile.
    ///
    /// Unsupported hosts are logged and fall back to the staging base and
    /// product id, which may be empty depending on configuration.
    #[must_use]
    pub fn resolve(&self, hostname: &str) -> DomainProfile {
        let host = normalize_host(hostname);
        let group = self.group_of(host);
        let env = match group {
            DomainGroup::Production => &self.production,
            DomainGroup::Staging => &self.staging,
            DomainGroup::Unsupported => {
                tracing::error!(host = %host, "Unsupported domain");
                &self.staging
            }
        };
        DomainProfile {
            group,
            api_base: env.api_base.clone(),
            product_id: env.product_id.clone(),
        }
    }

    /// Whether the host belongs to a configured group.
    #[must_use]
    pub fn is_supported(&self, hostname: &str) -> bool {
        self.group_of(normalize_host(hostname)) != DomainGroup::Unsupported
    }

    /// Whether mutating controls are disabled on this host.
    #[must_use]
    pub fn is_read_only(&self, hostname: &str) -> bool {
        let host = normalize_host(hostname);
        self.read_only.iter().any(|h| h == host)
    }

    fn group_of(&self, host: &str) -> DomainGroup {
        if self.production.hosts.iter().any(|h| h == host) {
            DomainGroup::Production
        } else if self.staging.hosts.iter().any(|h| h == host) {
            DomainGroup::Staging
        } else {
            DomainGroup::Unsupported
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AdminCredentials;

    fn resolver() -> DomainResolver {
        let config = OverlayConfig::new(AdminCredentials::new("a", "b"))
            .with_production_api_base("https://api.prod.test/api")
            .with_production_product_id("prod-1")
            .with_production_hosts(vec!["prod.test".into()])
            .with_staging_api_base("https://api.stage.test/api")
            .with_staging_product_id("stage-1")
            .with_staging_hosts(vec!["stage.test".into()])
            .with_read_only_hosts(vec!["mirror.test".into()]);
        DomainResolver::new(&config)
    }

    #[test]
    fn production_host() {
        let profile = resolver().resolve("prod.test");
        assert_eq!(profile.group, DomainGroup::Production);
        assert_eq!(profile.api_base, "https://api.prod.test/api");
        assert_eq!(profile.product_id, "prod-1");
    }

    #[test]
    fn www_prefix_resolves_like_bare_host() {
        let r = resolver();
        assert_eq!(r.resolve("www.prod.test"), r.resolve("prod.test"));
        assert_eq!(r.resolve("www.stage.test"), r.resolve("stage.test"));
    }

    #[test]
    fn only_one_www_is_stripped() {
        assert_eq!(normalize_host("www.www.prod.test"), "www.prod.test");
        assert_eq!(
            resolver().resolve("www.www.prod.test").group,
            DomainGroup::Unsupported
        );
    }

    #[test]
    fn unsupported_falls_back_to_staging_values() {
        let profile = resolver().resolve("elsewhere.test");
        assert_eq!(profile.group, DomainGroup::Unsupported);
        assert_eq!(profile.api_base, "https://api.stage.test/api");
        assert_eq!(profile.product_id, "stage-1");
    }

    #[test]
    fn unsupported_with_empty_staging_is_empty() {
        let r = DomainResolver::new(&OverlayConfig::new(AdminCredentials::new("a", "b")));
        let profile = r.resolve("elsewhere.test");
        assert!(profile.api_base.is_empty());
        assert!(profile.product_id.is_empty());
    }

    #[test]
    fn resolve_is_deterministic() {
        let r = resolver();
        for host in ["prod.test", "stage.test", "x.test", ""] {
            assert_eq!(r.resolve(host), r.resolve(host));
        }
    }

    #[test]
    fn support_and_read_only() {
        let r = resolver();
        assert!(r.is_supported("www.stage.test"));
        assert!(!r.is_supported("mirror.test"));
        assert!(r.is_read_only("www.mirror.test"));
        assert!(!r.is_read_only("prod.test"));
    }
}
