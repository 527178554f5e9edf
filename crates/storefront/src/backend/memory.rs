//! In-process backend.
//!
//! Mirrors the behaviour the storefront relies on from the hosted service:
//! unique `(user, product)` cart rows, OTP that never creates accounts,
//! admin procedures authorized against the caller's own record, and
//! subscriptions unique by endpoint. Faults can be injected per operation.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use campus_market_core::{AccessToken, AdminId, AdminRole, Email, OtpCode, ProductId, UserId};

use super::{AdminDirectory, AuthProvider, Backend, CartStore, RemoteError, SubscriptionStore};
use crate::models::{
    AdminRecord, AdminUpdate, CartItem, Identity, NewAdmin, NewCartItem, ProductSummary,
    PushSubscription,
};

/// Operations that can be made to fail with [`MemoryBackend::inject_fault`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    FetchCart,
    InsertCart,
    DeleteCart,
    UpdateCart,
    ClearCart,
    SendOtp,
    VerifyOtp,
    AdminLookup,
    UpsertSubscription,
    ListSubscriptions,
    Ping,
}

#[derive(Debug, Clone)]
struct StoredCartRow {
    user_id: UserId,
    product_id: ProductId,
    quantity: u32,
    selected_color: Option<String>,
    selected_size: Option<String>,
    added_at: DateTime<Utc>,
    visible: bool,
}

#[derive(Debug)]
struct State {
    users: HashMap<UserId, Email>,
    tokens: HashMap<String, UserId>,
    otp_code: String,
    pending_codes: HashMap<Email, String>,
    otp_requests: Vec<Email>,
    products: HashMap<ProductId, ProductSummary>,
    cart_rows: Vec<StoredCartRow>,
    delay_visibility: bool,
    admins: Vec<AdminRecord>,
    subscriptions: Vec<PushSubscription>,
    faults: HashSet<Fault>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            users: HashMap::new(),
            tokens: HashMap::new(),
            otp_code: MemoryBackend::DEFAULT_OTP_CODE.to_string(),
            pending_codes: HashMap::new(),
            otp_requests: Vec::new(),
            products: HashMap::new(),
            cart_rows: Vec::new(),
            delay_visibility: false,
            admins: Vec::new(),
            subscriptions: Vec::new(),
            faults: HashSet::new(),
        }
    }
}

impl State {
    fn check(&self, fault: Fault) -> Result<(), RemoteError> {
        if self.faults.contains(&fault) {
            return Err(RemoteError::Api {
                status: 503,
                message: format!("injected fault: {fault:?}"),
            });
        }
        Ok(())
    }

    fn authenticate(&self, who: &Identity) -> Result<UserId, RemoteError> {
        match self.tokens.get(who.access_token.expose()) {
            Some(user_id) if *user_id == who.user_id => Ok(*user_id),
            _ => Err(RemoteError::Api {
                status: 401,
                message: "invalid JWT".to_string(),
            }),
        }
    }

    fn issue_token(&mut self, user_id: UserId) -> Identity {
        let token = format!("memory-token-{}", uuid::Uuid::new_v4());
        self.tokens.insert(token.clone(), user_id);
        Identity {
            user_id,
            email: self.users.get(&user_id).cloned(),
            access_token: AccessToken::new(token),
        }
    }

    /// Server-side authorization of the admin procedures.
    fn require_master(&self, who: &Identity) -> Result<&AdminRecord, RemoteError> {
        let user_id = self.authenticate(who)?;
        self.admins
            .iter()
            .find(|a| a.user_id == user_id && a.is_active && a.is_master_admin)
            .ok_or_else(|| RemoteError::Api {
                status: 403,
                message: "only an active master admin may manage admins".to_string(),
            })
    }

    fn admin_index(&self, id: AdminId) -> Result<usize, RemoteError> {
        self.admins
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| RemoteError::Api {
                status: 404,
                message: format!("admin {id} not found"),
            })
    }
}

/// Backend that keeps all data in memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

impl MemoryBackend {
    /// Code accepted by [`AuthProvider::verify_otp`] unless changed.
    pub const DEFAULT_OTP_CODE: &'static str = "123456";

    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an auth user.
    pub async fn add_user(&self, email: &Email) -> UserId {
        let user_id = UserId::random();
        self.state.lock().await.users.insert(user_id, email.clone());
        user_id
    }

    /// Issue an access token for a registered user.
    pub async fn sign_in(&self, user_id: UserId) -> Identity {
        self.state.lock().await.issue_token(user_id)
    }

    /// Add a product to the catalogue.
    pub async fn add_product(&self, product: ProductSummary) {
        self.state
            .lock()
            .await
            .products
            .insert(product.id, product);
    }

    /// Create an admin record for a user.
    pub async fn add_admin_record(
        &self,
        user_id: UserId,
        role: AdminRole,
        is_active: bool,
        is_master_admin: bool,
    ) -> AdminRecord {
        let mut state = self.state.lock().await;
        let email = state
            .users
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| fallback_email(user_id));
        let record = AdminRecord {
            id: AdminId::random(),
            user_id,
            email,
            role,
            is_active,
            is_master_admin,
            full_name: None,
            username: None,
        };
        state.admins.push(record.clone());
        record
    }

    /// Flip the active flag of an admin record directly.
    pub async fn set_admin_active(&self, id: AdminId, is_active: bool) {
        let mut state = self.state.lock().await;
        if let Some(record) = state.admins.iter_mut().find(|a| a.id == id) {
            record.is_active = is_active;
        }
    }

    /// Change the code the next verification must present.
    pub async fn set_otp_code(&self, code: &str) {
        code.clone_into(&mut self.state.lock().await.otp_code);
    }

    /// Addresses that codes were sent to, in order.
    pub async fn otp_requests(&self) -> Vec<Email> {
        self.state.lock().await.otp_requests.clone()
    }

    /// When enabled, newly inserted cart rows stay invisible to reads until
    /// [`settle`](Self::settle) is called, like a lagging read replica.
    pub async fn set_delayed_visibility(&self, delayed: bool) {
        self.state.lock().await.delay_visibility = delayed;
    }

    /// Make every cart row visible.
    pub async fn settle(&self) {
        for row in &mut self.state.lock().await.cart_rows {
            row.visible = true;
        }
    }

    /// Number of stored cart rows for a user, visible or not.
    pub async fn cart_row_count(&self, user_id: UserId) -> usize {
        self.state
            .lock()
            .await
            .cart_rows
            .iter()
            .filter(|r| r.user_id == user_id)
            .count()
    }

    /// All stored subscriptions.
    pub async fn subscriptions(&self) -> Vec<PushSubscription> {
        self.state.lock().await.subscriptions.clone()
    }

    /// Make an operation fail until [`clear_faults`](Self::clear_faults).
    pub async fn inject_fault(&self, fault: Fault) {
        self.state.lock().await.faults.insert(fault);
    }

    /// Remove all injected faults.
    pub async fn clear_faults(&self) {
        self.state.lock().await.faults.clear();
    }
}

fn fallback_email(user_id: UserId) -> Email {
    Email::parse(&format!("{user_id}@users.invalid"))
        .unwrap_or_else(|_| unreachable!("uuid local part is always a valid email"))
}

#[async_trait]
impl CartStore for MemoryBackend {
    async fn fetch_cart(&self, who: &Identity) -> Result<Vec<CartItem>, RemoteError> {
        let state = self.state.lock().await;
        state.check(Fault::FetchCart)?;
        let user_id = state.authenticate(who)?;

        state
            .cart_rows
            .iter()
            .filter(|r| r.user_id == user_id && r.visible)
            .map(|r| -> Result<CartItem, RemoteError> {
                let product = state.products.get(&r.product_id).cloned().ok_or_else(|| {
                    RemoteError::InvalidRow(format!(
                        "cart line references missing product {}",
                        r.product_id
                    ))
                })?;
                Ok(CartItem {
                    product,
                    quantity: r.quantity,
                    selected_color: r.selected_color.clone(),
                    selected_size: r.selected_size.clone(),
                    added_at: r.added_at,
                })
            })
            .collect()
    }

    async fn insert_cart_item(
        &self,
        who: &Identity,
        item: &NewCartItem,
    ) -> Result<(), RemoteError> {
        let mut state = self.state.lock().await;
        state.check(Fault::InsertCart)?;
        let user_id = state.authenticate(who)?;

        if item.user_id != user_id {
            return Err(RemoteError::Api {
                status: 403,
                message: "row violates row-level security policy".to_string(),
            });
        }
        if !state.products.contains_key(&item.product_id) {
            return Err(RemoteError::Api {
                status: 409,
                message: "foreign key violation on product_id".to_string(),
            });
        }
        if state
            .cart_rows
            .iter()
            .any(|r| r.user_id == user_id && r.product_id == item.product_id)
        {
            return Err(RemoteError::Api {
                status: 409,
                message: "duplicate key value violates unique constraint".to_string(),
            });
        }

        let visible = !state.delay_visibility;
        state.cart_rows.push(StoredCartRow {
            user_id,
            product_id: item.product_id,
            quantity: item.quantity,
            selected_color: item.selected_color.clone(),
            selected_size: item.selected_size.clone(),
            added_at: Utc::now(),
            visible,
        });
        Ok(())
    }

    async fn delete_cart_item(
        &self,
        who: &Identity,
        product_id: ProductId,
    ) -> Result<(), RemoteError> {
        let mut state = self.state.lock().await;
        state.check(Fault::DeleteCart)?;
        let user_id = state.authenticate(who)?;
        state
            .cart_rows
            .retain(|r| !(r.user_id == user_id && r.product_id == product_id));
        Ok(())
    }

    async fn update_cart_quantity(
        &self,
        who: &Identity,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<(), RemoteError> {
        let mut state = self.state.lock().await;
        state.check(Fault::UpdateCart)?;
        let user_id = state.authenticate(who)?;
        for row in state
            .cart_rows
            .iter_mut()
            .filter(|r| r.user_id == user_id && r.product_id == product_id)
        {
            row.quantity = quantity;
        }
        Ok(())
    }

    async fn clear_cart(&self, who: &Identity) -> Result<(), RemoteError> {
        let mut state = self.state.lock().await;
        state.check(Fault::ClearCart)?;
        let user_id = state.authenticate(who)?;
        state.cart_rows.retain(|r| r.user_id != user_id);
        Ok(())
    }

    async fn fetch_product(
        &self,
        product_id: ProductId,
    ) -> Result<Option<ProductSummary>, RemoteError> {
        Ok(self.state.lock().await.products.get(&product_id).cloned())
    }
}

#[async_trait]
impl AuthProvider for MemoryBackend {
    async fn send_otp(&self, email: &Email) -> Result<(), RemoteError> {
        let mut state = self.state.lock().await;
        state.check(Fault::SendOtp)?;
        state.otp_requests.push(email.clone());

        if !state.users.values().any(|e| e == email) {
            return Err(RemoteError::Api {
                status: 422,
                message: "Signups not allowed for otp".to_string(),
            });
        }

        let code = state.otp_code.clone();
        state.pending_codes.insert(email.clone(), code);
        Ok(())
    }

    async fn verify_otp(&self, email: &Email, code: &OtpCode) -> Result<Identity, RemoteError> {
        let mut state = self.state.lock().await;
        state.check(Fault::VerifyOtp)?;

        let expected = state.pending_codes.get(email).cloned();
        if expected.as_deref() != Some(code.as_str()) {
            return Err(RemoteError::Api {
                status: 403,
                message: "Token has expired or is invalid".to_string(),
            });
        }
        state.pending_codes.remove(email);

        let user_id = state
            .users
            .iter()
            .find_map(|(id, e)| (e == email).then_some(*id))
            .ok_or_else(|| RemoteError::Api {
                status: 404,
                message: "user not found".to_string(),
            })?;
        Ok(state.issue_token(user_id))
    }

    async fn resolve_token(&self, token: &AccessToken) -> Result<Option<Identity>, RemoteError> {
        let state = self.state.lock().await;
        Ok(state.tokens.get(token.expose()).map(|user_id| Identity {
            user_id: *user_id,
            email: state.users.get(user_id).cloned(),
            access_token: token.clone(),
        }))
    }
}

#[async_trait]
impl AdminDirectory for MemoryBackend {
    async fn admin_for_user(&self, who: &Identity) -> Result<Option<AdminRecord>, RemoteError> {
        let state = self.state.lock().await;
        state.check(Fault::AdminLookup)?;
        let user_id = state.authenticate(who)?;
        Ok(state.admins.iter().find(|a| a.user_id == user_id).cloned())
    }

    async fn list_admins(&self, who: &Identity) -> Result<Vec<AdminRecord>, RemoteError> {
        let state = self.state.lock().await;
        state.check(Fault::AdminLookup)?;
        state.authenticate(who)?;
        let mut admins = state.admins.clone();
        admins.sort_by(|a, b| a.email.as_str().cmp(b.email.as_str()));
        Ok(admins)
    }

    async fn user_id_by_email(
        &self,
        who: &Identity,
        email: &Email,
    ) -> Result<Option<UserId>, RemoteError> {
        let state = self.state.lock().await;
        state.check(Fault::AdminLookup)?;
        state.authenticate(who)?;
        Ok(state
            .users
            .iter()
            .find_map(|(id, e)| (e == email).then_some(*id)))
    }

    async fn admin_by_email(
        &self,
        who: &Identity,
        email: &Email,
    ) -> Result<Option<AdminRecord>, RemoteError> {
        let state = self.state.lock().await;
        state.check(Fault::AdminLookup)?;
        state.authenticate(who)?;
        Ok(state.admins.iter().find(|a| &a.email == email).cloned())
    }

    async fn add_admin(
        &self,
        who: &Identity,
        admin: &NewAdmin,
    ) -> Result<AdminRecord, RemoteError> {
        let mut state = self.state.lock().await;
        state.require_master(who)?;
        if state.admins.iter().any(|a| a.user_id == admin.user_id) {
            return Err(RemoteError::Api {
                status: 409,
                message: "user is already an admin".to_string(),
            });
        }

        let record = AdminRecord {
            id: AdminId::random(),
            user_id: admin.user_id,
            email: admin.email.clone(),
            role: admin.role,
            is_active: true,
            is_master_admin: false,
            full_name: None,
            username: None,
        };
        state.admins.push(record.clone());
        Ok(record)
    }

    async fn update_admin(
        &self,
        who: &Identity,
        id: AdminId,
        update: &AdminUpdate,
    ) -> Result<AdminRecord, RemoteError> {
        let mut state = self.state.lock().await;
        state.require_master(who)?;
        let index = state.admin_index(id)?;
        let record = state
            .admins
            .get_mut(index)
            .ok_or_else(|| RemoteError::InvalidRow(format!("admin {id} vanished")))?;

        if let Some(role) = update.role {
            record.role = role;
        }
        if let Some(is_active) = update.is_active {
            record.is_active = is_active;
        }
        if let Some(full_name) = &update.full_name {
            record.full_name = Some(full_name.clone());
        }
        if let Some(username) = &update.username {
            record.username = Some(username.clone());
        }
        Ok(record.clone())
    }

    async fn delete_admin(&self, who: &Identity, id: AdminId) -> Result<(), RemoteError> {
        let mut state = self.state.lock().await;
        let caller = state.require_master(who)?.id;
        if caller == id {
            return Err(RemoteError::Api {
                status: 400,
                message: "admins cannot delete themselves".to_string(),
            });
        }
        let index = state.admin_index(id)?;
        state.admins.remove(index);
        Ok(())
    }
}

#[async_trait]
impl SubscriptionStore for MemoryBackend {
    async fn upsert_subscription(
        &self,
        subscription: &PushSubscription,
    ) -> Result<(), RemoteError> {
        let mut state = self.state.lock().await;
        state.check(Fault::UpsertSubscription)?;
        match state
            .subscriptions
            .iter_mut()
            .find(|s| s.endpoint == subscription.endpoint)
        {
            Some(existing) => subscription.clone_into(existing),
            None => state.subscriptions.push(subscription.clone()),
        }
        Ok(())
    }

    async fn subscriptions_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<PushSubscription>, RemoteError> {
        let state = self.state.lock().await;
        state.check(Fault::ListSubscriptions)?;
        Ok(state
            .subscriptions
            .iter()
            .filter(|s| s.user_id == Some(user_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn ping(&self) -> Result<(), RemoteError> {
        self.state.lock().await.check(Fault::Ping)
    }
}
