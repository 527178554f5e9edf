//! REST client for the managed backend.
//!
//! Tables are reached through `/rest/v1/<table>` with `column=eq.value`
//! filters, procedures through `/rest/v1/rpc/<name>`, and email OTP through
//! `/auth/v1`. User-scoped calls carry the caller's access token so the
//! backend's row-level security applies; subscription storage uses the
//! service key.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::instrument;
use url::Url;

use campus_market_core::{AccessToken, AdminId, Email, OtpCode, ProductId, UserId};

use super::rows::{
    AuthUser, CART_COLUMNS, CartRow, PRODUCT_COLUMNS, ProductRow, VerifyResponse,
};
use super::{AdminDirectory, AuthProvider, Backend, CartStore, RemoteError, SubscriptionStore};
use crate::config::BackendConfig;
use crate::models::{
    AdminRecord, AdminUpdate, CartItem, Identity, NewAdmin, NewCartItem, ProductSummary,
    PushSubscription,
};

const CART_TABLE: &str = "cart_items";
const PRODUCTS_TABLE: &str = "products";
const ADMINS_TABLE: &str = "admins";
const SUBSCRIPTIONS_TABLE: &str = "push_subscriptions";

/// Client for the managed backend's REST and auth APIs.
#[derive(Clone)]
pub struct RemoteClient {
    client: reqwest::Client,
    base_url: Url,
    anon_key: SecretString,
    service_key: SecretString,
}

impl RemoteClient {
    /// Create a new backend client.
    ///
    /// # Errors
    ///
    /// Returns error if the base URL is invalid or the HTTP client fails to build.
    pub fn new(config: &BackendConfig) -> Result<Self, RemoteError> {
        let mut base_url = Url::parse(&config.url)?;
        // `Url::join` replaces the last segment unless the path ends in '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let mut headers = HeaderMap::new();
        headers.insert("Accept", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url,
            anon_key: config.anon_key.clone(),
            service_key: config.service_key.clone(),
        })
    }

    /// URL of a table with `column=eq.value` filters and extra query pairs.
    fn table_url(
        &self,
        table: &str,
        filters: &[(&str, String)],
        extra: &[(&str, &str)],
    ) -> Result<Url, RemoteError> {
        let mut url = self.base_url.join(&format!("rest/v1/{table}"))?;
        {
            let mut query = url.query_pairs_mut();
            for (column, value) in filters {
                query.append_pair(column, &format!("eq.{value}"));
            }
            for (key, value) in extra {
                query.append_pair(key, value);
            }
        }
        Ok(url)
    }

    fn rpc_url(&self, function: &str) -> Result<Url, RemoteError> {
        Ok(self.base_url.join(&format!("rest/v1/rpc/{function}"))?)
    }

    fn auth_url(&self, path: &str) -> Result<Url, RemoteError> {
        Ok(self.base_url.join(&format!("auth/v1/{path}"))?)
    }

    /// Request made on behalf of a signed-in user.
    fn as_user(&self, method: Method, url: Url, who: &Identity) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", self.anon_key.expose_secret())
            .bearer_auth(who.access_token.expose())
    }

    /// Request made with the public key only (auth endpoints).
    fn as_anon(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", self.anon_key.expose_secret())
    }

    /// Request made with the service key.
    fn as_service(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", self.service_key.expose_secret())
            .bearer_auth(self.service_key.expose_secret())
    }

    /// Turn a non-success status into [`RemoteError::Api`].
    async fn check(response: Response) -> Result<Response, RemoteError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        Err(RemoteError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, RemoteError> {
        let response = Self::check(request.send().await?).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| RemoteError::Parse(e.to_string()))
    }

    async fn send_empty(request: RequestBuilder) -> Result<(), RemoteError> {
        Self::check(request.send().await?).await?;
        Ok(())
    }

    async fn first_admin(
        &self,
        who: &Identity,
        column: &str,
        value: String,
    ) -> Result<Option<AdminRecord>, RemoteError> {
        let url = self.table_url(ADMINS_TABLE, &[(column, value)], &[("limit", "1")])?;
        let rows: Vec<AdminRecord> = Self::send_json(self.as_user(Method::GET, url, who)).await?;
        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl CartStore for RemoteClient {
    #[instrument(skip(self, who), fields(user_id = %who.user_id))]
    async fn fetch_cart(&self, who: &Identity) -> Result<Vec<CartItem>, RemoteError> {
        let url = self.table_url(
            CART_TABLE,
            &[("user_id", who.user_id.to_string())],
            &[("select", CART_COLUMNS), ("order", "added_at.asc")],
        )?;
        let rows: Vec<CartRow> = Self::send_json(self.as_user(Method::GET, url, who)).await?;
        rows.into_iter().map(CartItem::try_from).collect()
    }

    #[instrument(skip(self, who, item), fields(user_id = %who.user_id, product_id = %item.product_id))]
    async fn insert_cart_item(
        &self,
        who: &Identity,
        item: &NewCartItem,
    ) -> Result<(), RemoteError> {
        let url = self.table_url(CART_TABLE, &[], &[])?;
        let request = self
            .as_user(Method::POST, url, who)
            .header("Prefer", "return=minimal")
            .json(item);
        Self::send_empty(request).await
    }

    #[instrument(skip(self, who), fields(user_id = %who.user_id))]
    async fn delete_cart_item(
        &self,
        who: &Identity,
        product_id: ProductId,
    ) -> Result<(), RemoteError> {
        let url = self.table_url(
            CART_TABLE,
            &[
                ("user_id", who.user_id.to_string()),
                ("product_id", product_id.to_string()),
            ],
            &[],
        )?;
        Self::send_empty(self.as_user(Method::DELETE, url, who)).await
    }

    #[instrument(skip(self, who), fields(user_id = %who.user_id))]
    async fn update_cart_quantity(
        &self,
        who: &Identity,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<(), RemoteError> {
        #[derive(Serialize)]
        struct QuantityPatch {
            quantity: u32,
        }

        let url = self.table_url(
            CART_TABLE,
            &[
                ("user_id", who.user_id.to_string()),
                ("product_id", product_id.to_string()),
            ],
            &[],
        )?;
        let request = self
            .as_user(Method::PATCH, url, who)
            .header("Prefer", "return=minimal")
            .json(&QuantityPatch { quantity });
        Self::send_empty(request).await
    }

    #[instrument(skip(self, who), fields(user_id = %who.user_id))]
    async fn clear_cart(&self, who: &Identity) -> Result<(), RemoteError> {
        let url = self.table_url(CART_TABLE, &[("user_id", who.user_id.to_string())], &[])?;
        Self::send_empty(self.as_user(Method::DELETE, url, who)).await
    }

    #[instrument(skip(self))]
    async fn fetch_product(
        &self,
        product_id: ProductId,
    ) -> Result<Option<ProductSummary>, RemoteError> {
        let url = self.table_url(
            PRODUCTS_TABLE,
            &[("id", product_id.to_string())],
            &[("select", PRODUCT_COLUMNS), ("limit", "1")],
        )?;
        let rows: Vec<ProductRow> = Self::send_json(self.as_anon(Method::GET, url)).await?;
        rows.into_iter()
            .next()
            .map(ProductSummary::try_from)
            .transpose()
    }
}

#[async_trait]
impl AuthProvider for RemoteClient {
    #[instrument(skip(self), fields(email = %email))]
    async fn send_otp(&self, email: &Email) -> Result<(), RemoteError> {
        #[derive(Serialize)]
        struct OtpRequest<'a> {
            email: &'a str,
            create_user: bool,
        }

        let url = self.auth_url("otp")?;
        let request = self.as_anon(Method::POST, url).json(&OtpRequest {
            email: email.as_str(),
            create_user: false,
        });
        Self::send_empty(request).await
    }

    #[instrument(skip(self, code), fields(email = %email))]
    async fn verify_otp(&self, email: &Email, code: &OtpCode) -> Result<Identity, RemoteError> {
        #[derive(Serialize)]
        struct VerifyRequest<'a> {
            #[serde(rename = "type")]
            kind: &'a str,
            email: &'a str,
            token: &'a str,
        }

        let url = self.auth_url("verify")?;
        let request = self.as_anon(Method::POST, url).json(&VerifyRequest {
            kind: "email",
            email: email.as_str(),
            token: code.as_str(),
        });
        let verified: VerifyResponse = Self::send_json(request).await?;
        Ok(verified
            .user
            .into_identity(AccessToken::new(verified.access_token)))
    }

    #[instrument(skip_all)]
    async fn resolve_token(&self, token: &AccessToken) -> Result<Option<Identity>, RemoteError> {
        let url = self.auth_url("user")?;
        let response = self
            .as_anon(Method::GET, url)
            .bearer_auth(token.expose())
            .send()
            .await?;

        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            return Ok(None);
        }

        let user: AuthUser = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| RemoteError::Parse(e.to_string()))?;
        Ok(Some(user.into_identity(token.clone())))
    }
}

#[async_trait]
impl AdminDirectory for RemoteClient {
    #[instrument(skip(self, who), fields(user_id = %who.user_id))]
    async fn admin_for_user(&self, who: &Identity) -> Result<Option<AdminRecord>, RemoteError> {
        self.first_admin(who, "user_id", who.user_id.to_string())
            .await
    }

    #[instrument(skip(self, who), fields(user_id = %who.user_id))]
    async fn list_admins(&self, who: &Identity) -> Result<Vec<AdminRecord>, RemoteError> {
        let url = self.table_url(ADMINS_TABLE, &[], &[("order", "email.asc")])?;
        Self::send_json(self.as_user(Method::GET, url, who)).await
    }

    #[instrument(skip(self, who), fields(email = %email))]
    async fn user_id_by_email(
        &self,
        who: &Identity,
        email: &Email,
    ) -> Result<Option<UserId>, RemoteError> {
        let url = self.rpc_url("get_user_id_by_email")?;
        let request = self
            .as_user(Method::POST, url, who)
            .json(&serde_json::json!({ "email": email.as_str() }));
        Self::send_json(request).await
    }

    #[instrument(skip(self, who), fields(email = %email))]
    async fn admin_by_email(
        &self,
        who: &Identity,
        email: &Email,
    ) -> Result<Option<AdminRecord>, RemoteError> {
        self.first_admin(who, "email", email.to_string()).await
    }

    #[instrument(skip(self, who, admin), fields(email = %admin.email, role = %admin.role))]
    async fn add_admin(
        &self,
        who: &Identity,
        admin: &NewAdmin,
    ) -> Result<AdminRecord, RemoteError> {
        let url = self.rpc_url("add_admin")?;
        Self::send_json(self.as_user(Method::POST, url, who).json(admin)).await
    }

    #[instrument(skip(self, who, update))]
    async fn update_admin(
        &self,
        who: &Identity,
        id: AdminId,
        update: &AdminUpdate,
    ) -> Result<AdminRecord, RemoteError> {
        #[derive(Serialize)]
        struct UpdateArgs<'a> {
            admin_id: AdminId,
            #[serde(flatten)]
            update: &'a AdminUpdate,
        }

        let url = self.rpc_url("update_admin")?;
        let request = self
            .as_user(Method::POST, url, who)
            .json(&UpdateArgs { admin_id: id, update });
        Self::send_json(request).await
    }

    #[instrument(skip(self, who))]
    async fn delete_admin(&self, who: &Identity, id: AdminId) -> Result<(), RemoteError> {
        let url = self.rpc_url("delete_admin")?;
        let request = self
            .as_user(Method::POST, url, who)
            .json(&serde_json::json!({ "admin_id": id }));
        Self::send_empty(request).await
    }
}

#[async_trait]
impl SubscriptionStore for RemoteClient {
    #[instrument(skip(self, subscription), fields(endpoint = %subscription.endpoint))]
    async fn upsert_subscription(
        &self,
        subscription: &PushSubscription,
    ) -> Result<(), RemoteError> {
        let url = self.table_url(SUBSCRIPTIONS_TABLE, &[], &[("on_conflict", "endpoint")])?;
        let request = self
            .as_service(Method::POST, url)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(subscription);
        Self::send_empty(request).await
    }

    #[instrument(skip(self))]
    async fn subscriptions_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<PushSubscription>, RemoteError> {
        let url = self.table_url(
            SUBSCRIPTIONS_TABLE,
            &[("user_id", user_id.to_string())],
            &[("select", "user_id,endpoint,keys")],
        )?;
        Self::send_json(self.as_service(Method::GET, url)).await
    }
}

#[async_trait]
impl Backend for RemoteClient {
    async fn ping(&self) -> Result<(), RemoteError> {
        let url = self.auth_url("health")?;
        Self::send_empty(self.as_anon(Method::GET, url)).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> RemoteClient {
        RemoteClient::new(&BackendConfig {
            url: base.to_string(),
            anon_key: SecretString::from("anon"),
            service_key: SecretString::from("service"),
        })
        .unwrap()
    }

    #[test]
    fn test_table_url_filters() {
        let client = client("https://abc.backend.test");
        let user = UserId::new(uuid::Uuid::nil());
        let url = client
            .table_url(
                CART_TABLE,
                &[("user_id", user.to_string())],
                &[("order", "added_at.asc")],
            )
            .unwrap();

        assert_eq!(url.path(), "/rest/v1/cart_items");
        assert_eq!(
            url.query(),
            Some("user_id=eq.00000000-0000-0000-0000-000000000000&order=added_at.asc")
        );
    }

    #[test]
    fn test_base_url_with_path_keeps_prefix() {
        let client = client("https://gateway.test/backend");
        let url = client.rpc_url("add_admin").unwrap();
        assert_eq!(url.as_str(), "https://gateway.test/backend/rest/v1/rpc/add_admin");
    }

    #[test]
    fn test_email_filter_is_encoded() {
        let client = client("https://abc.backend.test/");
        let url = client
            .table_url(ADMINS_TABLE, &[("email", "a+b@campus.edu".to_string())], &[])
            .unwrap();
        assert_eq!(url.query(), Some("email=eq.a%2Bb%40campus.edu"));
    }

    #[test]
    fn test_invalid_base_url() {
        let result = RemoteClient::new(&BackendConfig {
            url: "not a url".to_string(),
            anon_key: SecretString::from("anon"),
            service_key: SecretString::from("service"),
        });
        assert!(matches!(result, Err(RemoteError::Url(_))));
    }
}
