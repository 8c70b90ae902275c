use std::sync::Arc;

use serde_json::{Map, Value, json};
use url::Url;

use crate::config::{ApiPaths, OverlayConfig};
use crate::credential::AdminCredentialCache;
use crate::domain::{DomainProfile, DomainResolver};
use crate::error::Error;
use crate::host::{Clock, HostPage};
use crate::session::read_user_access_token;
use crate::store::KeyValueStore;
use crate::transport::{ApiRequest, HttpTransport, Method};
use crate::types::{FeatureValue, UserId};

/// Uppercase the first character, leaving the rest untouched.
///
/// The backend expects `IsActive` where the session stores `isActive`.
#[must_use]
pub fn capitalize_key(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Parse the token balance typed by the operator.
///
/// # Errors
///
/// Returns [`Error::Validation`] unless the trimmed input is a non-negative
/// integer.
pub fn parse_token_amount(input: &str) -> Result<u64, Error> {
    input
        .trim()
        .parse::<u64>()
        .map_err(|_| Error::Validation(format!("invalid token amount: {input:?}")))
}

pub(crate) fn endpoint(api_base: &str, path: &str) -> Result<Url, Error> {
    let raw = format!("{api_base}{path}");
    Url::parse(&raw).map_err(|e| Error::Validation(format!("invalid endpoint URL {raw:?}: {e}")))
}

/// Single funnel for every privileged write.
///
/// Each call resolves the domain profile for the current host, acquires a
/// bearer token, sends one request, and maps a non-2xx answer to
/// [`Error::Api`].
pub struct MutationGateway<T> {
    transport: T,
    resolver: DomainResolver,
    credentials: AdminCredentialCache,
    paths: ApiPaths,
    auth_key: String,
    session_store: Arc<dyn KeyValueStore>,
    page: Arc<dyn HostPage>,
}

impl<T: HttpTransport> MutationGateway<T> {
    #[must_use]
    pub fn new(
        config: &OverlayConfig,
        transport: T,
        session_store: Arc<dyn KeyValueStore>,
        operator_store: Arc<dyn KeyValueStore>,
        page: Arc<dyn HostPage>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let credentials = AdminCredentialCache::new(
            operator_store,
            clock,
            config.storage.admin_token_cache_key.clone(),
            config.paths.login.clone(),
            config.credentials.clone(),
            config.token_ttl,
        );
        Self {
            transport,
            resolver: DomainResolver::new(config),
            credentials,
            paths: config.paths.clone(),
            auth_key: config.storage.auth_key.clone(),
            session_store,
            page,
        }
    }

    /// Profile for the page's current host.
    #[must_use]
    pub fn profile(&self) -> DomainProfile {
        self.resolver.resolve(&self.page.hostname())
    }

    #[must_use]
    pub fn resolver(&self) -> &DomainResolver {
        &self.resolver
    }

    #[must_use]
    pub fn credentials(&self) -> &AdminCredentialCache {
        &self.credentials
    }

    /// PUT `{ userId, features: { <Key>: value } }`.
    ///
    /// # Errors
    ///
    /// Token acquisition errors, transport errors, or [`Error::Api`].
    pub async fn update_feature(
        &self,
        user_id: &UserId,
        key: &str,
        value: FeatureValue,
    ) -> Result<(), Error> {
        let profile = self.profile();
        let token = self.credentials.get_token(&self.transport, &profile).await?;

        let mut features = Map::new();
        features.insert(
            capitalize_key(key),
            serde_json::to_value(value).map_err(|e| Error::Validation(e.to_string()))?,
        );
        let body = json!({ "userId": user_id, "features": Value::Object(features) });

        self.send(&profile, Method::Put, &self.paths.features, body, token, "feature update")
            .await
    }

    /// PUT `{ userId, amount }`. Invalid input never reaches the network.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] for a bad amount, otherwise as
    /// [`update_feature`](Self::update_feature).
    pub async fn update_token_balance(&self, user_id: &UserId, input: &str) -> Result<u64, Error> {
        let amount = parse_token_amount(input)?;
        let profile = self.profile();
        let token = self.credentials.get_token(&self.transport, &profile).await?;
        let body = json!({ "userId": user_id, "amount": amount });

        self.send(&profile, Method::Put, &self.paths.tokens, body, token, "token update")
            .await?;
        Ok(amount)
    }

    /// POST `{ userId, productId }`. Requires a product id for the host.
    ///
    /// # Errors
    ///
    /// `Validation("Unsupported domain")` when the resolved profile has no
    /// product id, before any request is sent.
    pub async fn activate_subscription(&self, user_id: &UserId) -> Result<(), Error> {
        let profile = self.profile();
        if profile.product_id.is_empty() {
            return Err(Error::Validation("Unsupported domain".into()));
        }
        let token = self.credentials.get_token(&self.transport, &profile).await?;
        let body = json!({ "userId": user_id, "productId": profile.product_id });

        self.send(
            &profile,
            Method::Post,
            &self.paths.subscription,
            body,
            token,
            "subscription activation",
        )
        .await
    }

    /// DELETE `{ userId }`, authenticated as the user being deleted.
    ///
    /// The caller must wipe local site data on success; the session it
    /// belongs to no longer exists.
    ///
    /// # Errors
    ///
    /// Errors reading the user's own token, transport errors, or
    /// [`Error::Api`].
    pub async fn delete_user(&self, user_id: &UserId) -> Result<(), Error> {
        let profile = self.profile();
        let token = read_user_access_token(self.session_store.as_ref(), &self.auth_key)?;
        let body = json!({ "userId": user_id });

        self.send(&profile, Method::Delete, &self.paths.delete_user, body, token, "user deletion")
            .await
    }

    async fn send(
        &self,
        profile: &DomainProfile,
        method: Method,
        path: &str,
        body: Value,
        token: String,
        operation: &'static str,
    ) -> Result<(), Error> {
        let url = endpoint(&profile.api_base, path)?;
        let request = ApiRequest::new(method, url, body).bearer_auth(token);
        self.transport
            .send(request)
            .await?
            .ensure_success(operation)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::AdminCredentials;
    use crate::store::MemoryStore;
    use crate::testing::{ManualClock, RecordingPage, RecordingTransport};
    use crate::transport::ApiResponse;
    use crate::types::AdminToken;

    struct Fixture {
        gateway: MutationGateway<Arc<RecordingTransport>>,
        transport: Arc<RecordingTransport>,
    }

    fn config() -> OverlayConfig {
        OverlayConfig::new(AdminCredentials::new("ops@example.com", "pw"))
            .with_production_api_base("https://api.prod.test/api")
            .with_production_product_id("price_prod")
            .with_production_hosts(vec!["prod.test".into()])
            .with_paths(ApiPaths {
                login: "/Auth/login".into(),
                features: "/Admin/features".into(),
                tokens: "/Admin/tokens".into(),
                subscription: "/Admin/subscription".into(),
                delete_user: "/User".into(),
            })
    }

    fn fixture(host: &str) -> Fixture {
        let clock = ManualClock::new();
        let cached = AdminToken::issued_at("admin-tok", clock.now(), Duration::from_secs(3600));
        let operator_store = Arc::new(
            MemoryStore::new().with_entry("adminAuthTokenCache", serde_json::to_string(&cached).unwrap()),
        );
        let session_store = Arc::new(
            MemoryStore::new().with_entry("persist:auth", r#"{"accessToken":"\"user-tok\""}"#),
        );
        let transport = RecordingTransport::new();
        let gateway = MutationGateway::new(
            &config(),
            transport.clone(),
            session_store,
            operator_store,
            RecordingPage::new(host),
            clock,
        );
        Fixture { gateway, transport }
    }

    #[test]
    fn capitalization() {
        assert_eq!(capitalize_key("isActive"), "IsActive");
        assert_eq!(capitalize_key("betaFlag"), "BetaFlag");
        assert_eq!(capitalize_key("Already"), "Already");
        assert_eq!(capitalize_key("x"), "X");
        assert_eq!(capitalize_key(""), "");
    }

    #[test]
    fn token_amount_validation() {
        assert!(parse_token_amount("-1").is_err());
        assert!(parse_token_amount("abc").is_err());
        assert!(parse_token_amount("").is_err());
        assert!(parse_token_amount("1.5").is_err());
        assert_eq!(parse_token_amount("0").unwrap(), 0);
        assert_eq!(parse_token_amount(" 1000000 ").unwrap(), 1_000_000);
    }

    #[tokio::test]
    async fn update_feature_body() {
        let f = fixture("prod.test");
        f.gateway
            .update_feature(&UserId::from("u1"), "isActive", FeatureValue::Bool(true))
            .await
            .unwrap();

        let requests = f.transport.requests();
        assert_eq!(requests.len(), 1);
        let req = &requests[0];
        assert_eq!(req.method, Method::Put);
        assert_eq!(req.url.as_str(), "https://api.prod.test/api/Admin/features");
        assert_eq!(req.bearer.as_deref(), Some("admin-tok"));
        assert_eq!(
            req.body,
            json!({ "userId": "u1", "features": { "IsActive": true } })
        );
    }

    #[tokio::test]
    async fn bad_token_amounts_never_hit_network() {
        let f = fixture("prod.test");
        for input in ["-1", "abc", ""] {
            let err = f
                .gateway
                .update_token_balance(&UserId::from("u1"), input)
                .await
                .unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "{input:?}");
        }
        assert!(f.transport.requests().is_empty());
    }

    #[tokio::test]
    async fn token_amounts_sent_exactly() {
        let f = fixture("prod.test");
        for (input, amount) in [("0", 0u64), ("1000000", 1_000_000)] {
            f.gateway
                .update_token_balance(&UserId::from("u1"), input)
                .await
                .unwrap();
            let last = f.transport.requests().pop().unwrap();
            assert_eq!(last.method, Method::Put);
            assert_eq!(last.body, json!({ "userId": "u1", "amount": amount }));
        }
    }

    #[tokio::test]
    async fn subscription_uses_profile_product() {
        let f = fixture("www.prod.test");
        f.gateway
            .activate_subscription(&UserId::from("u1"))
            .await
            .unwrap();
        let req = f.transport.requests().pop().unwrap();
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.url.path(), "/api/Admin/subscription");
        assert_eq!(req.body, json!({ "userId": "u1", "productId": "price_prod" }));
    }

    #[tokio::test]
    async fn subscription_on_unsupported_domain_fails_locally() {
        let f = fixture("unknown.test");
        let err = f
            .gateway
            .activate_subscription(&UserId::from("u1"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Unsupported domain");
        assert!(f.transport.requests().is_empty());
    }

    #[tokio::test]
    async fn delete_uses_users_own_token() {
        let f = fixture("prod.test");
        f.gateway.delete_user(&UserId::from("u1")).await.unwrap();
        let req = f.transport.requests().pop().unwrap();
        assert_eq!(req.method, Method::Delete);
        assert_eq!(req.url.as_str(), "https://api.prod.test/api/User");
        assert_eq!(req.bearer.as_deref(), Some("user-tok"));
        assert_eq!(req.body, json!({ "userId": "u1" }));
    }

    #[tokio::test]
    async fn non_success_surfaces_status_and_body() {
        let f = fixture("prod.test");
        f.transport
            .respond(ApiResponse::new(422, r#"{"error":"unknown feature"}"#));
        let err = f
            .gateway
            .update_feature(&UserId::from("u1"), "nope", FeatureValue::from("x"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), r#"422: {"error":"unknown feature"}"#);
    }

    #[tokio::test]
    async fn empty_api_base_is_validation_error() {
        let f = fixture("unknown.test");
        let err = f.gateway.delete_user(&UserId::from("u1")).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(f.transport.requests().is_empty());
    }
}
