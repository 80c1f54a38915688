//! # Outward Propagation
//!
//! Local mutations that may be mirrored to the marketplace.
//!
//! ## Commit, Then Notify
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CatalogService::set_product_status(id, Online, propagate = true)       │
//! │                                                                         │
//! │  1. validate + write locally ──────────► committed, authoritative      │
//! │  2. derive OutwardIntent      ──────────► SetOnline { item_id }         │
//! │  3. Notifier::notify(intent)                                            │
//! │        ├─ Ok            ──► MirrorStatus::Mirrored                      │
//! │        └─ Err(cause)    ──► MirrorStatus::Degraded(PropagationWarning)  │
//! │                                                                         │
//! │  The local write is never undone because step 3 failed.                │
//! │  LocalOnly: propagation not requested, nothing changed that the        │
//! │  marketplace tracks, or the record has no marketplace id yet.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Creates default to not propagating. Updates, ship, cancel, refund and
//! deletes default to propagating; the defaults live with the caller.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};

use crate::client::{NewListing, Refund, RutenClient, Shipment};
use crate::error::{ClientError, ClientResult, ServiceError, ServiceResult};
use ruten_core::remote;
use ruten_core::validation::{validate_amount, validate_category_name, validate_stock, validate_title};
use ruten_core::{
    Category, ConfigurationError, CoreError, EntityKind, Money, Order, OrderStatus, Product,
    ProductStatus, ValidationError,
};
use ruten_db::Database;

/// Reason used when a cancel or refund names none.
pub const DEFAULT_REASON: &str = "Customer request";

// =============================================================================
// Intents
// =============================================================================

/// A remote call owed after a local commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutwardIntent {
    CreateProduct(NewListing),
    UpdateStock { item_id: String, stock: i64 },
    UpdatePrice { item_id: String, price: Money },
    SetOnline { item_id: String },
    SetOffline { item_id: String },
    ShipOrder { order_id: String, shipment: Shipment },
    CancelOrder { order_id: String, reason: String },
    RefundOrder { order_id: String, refund: Refund },
    CreateCategory { name: String, parent_id: Option<String> },
    UpdateCategory { category_id: String, name: String, parent_id: Option<String> },
    DeleteCategory { category_id: String },
}

impl OutwardIntent {
    pub fn operation(&self) -> &'static str {
        match self {
            OutwardIntent::CreateProduct(_) => "create_product",
            OutwardIntent::UpdateStock { .. } => "update_stock",
            OutwardIntent::UpdatePrice { .. } => "update_price",
            OutwardIntent::SetOnline { .. } => "set_online",
            OutwardIntent::SetOffline { .. } => "set_offline",
            OutwardIntent::ShipOrder { .. } => "ship_order",
            OutwardIntent::CancelOrder { .. } => "cancel_order",
            OutwardIntent::RefundOrder { .. } => "refund_order",
            OutwardIntent::CreateCategory { .. } => "create_category",
            OutwardIntent::UpdateCategory { .. } => "update_category",
            OutwardIntent::DeleteCategory { .. } => "delete_category",
        }
    }

    /// Marketplace id the call targets; `None` for creates.
    pub fn external_id(&self) -> Option<&str> {
        match self {
            OutwardIntent::CreateProduct(_) | OutwardIntent::CreateCategory { .. } => None,
            OutwardIntent::UpdateStock { item_id, .. }
            | OutwardIntent::UpdatePrice { item_id, .. }
            | OutwardIntent::SetOnline { item_id }
            | OutwardIntent::SetOffline { item_id } => Some(item_id),
            OutwardIntent::ShipOrder { order_id, .. }
            | OutwardIntent::CancelOrder { order_id, .. }
            | OutwardIntent::RefundOrder { order_id, .. } => Some(order_id),
            OutwardIntent::UpdateCategory { category_id, .. }
            | OutwardIntent::DeleteCategory { category_id } => Some(category_id),
        }
    }
}

/// Delivers intents to the marketplace.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, intent: &OutwardIntent) -> ClientResult<Value>;
}

#[async_trait]
impl Notifier for RutenClient {
    async fn notify(&self, intent: &OutwardIntent) -> ClientResult<Value> {
        match intent {
            OutwardIntent::CreateProduct(listing) => self.create_product(listing).await,
            OutwardIntent::UpdateStock { item_id, stock } => {
                self.update_product_stock(item_id, *stock).await
            }
            OutwardIntent::UpdatePrice { item_id, price } => {
                self.update_product_price(item_id, *price).await
            }
            OutwardIntent::SetOnline { item_id } => self.set_product_online(item_id).await,
            OutwardIntent::SetOffline { item_id } => self.set_product_offline(item_id).await,
            OutwardIntent::ShipOrder { order_id, shipment } => {
                self.ship_order(order_id, shipment).await
            }
            OutwardIntent::CancelOrder { order_id, reason } => {
                self.cancel_order(order_id, reason).await
            }
            OutwardIntent::RefundOrder { order_id, refund } => {
                self.refund_order(order_id, refund).await
            }
            OutwardIntent::CreateCategory { name, parent_id } => {
                self.create_category(name, parent_id.as_deref()).await
            }
            OutwardIntent::UpdateCategory {
                category_id,
                name,
                parent_id,
            } => {
                self.update_category(category_id, name, parent_id.as_deref())
                    .await
            }
            OutwardIntent::DeleteCategory { category_id } => {
                self.delete_category(category_id).await
            }
        }
    }
}

// =============================================================================
// Results
// =============================================================================

/// A remote mirror that failed after the local change was committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropagationWarning {
    pub operation: &'static str,
    pub external_id: Option<String>,
    pub cause: ClientError,
}

impl std::fmt::Display for PropagationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "saved locally, but {} was not mirrored to Ruten: {}",
            self.operation, self.cause
        )
    }
}

/// Whether the marketplace reflects a local change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorStatus {
    Mirrored,
    LocalOnly,
    Degraded(PropagationWarning),
}

/// A committed local record plus the state of its remote mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Propagated<T> {
    pub record: T,
    pub mirror: MirrorStatus,
}

impl<T> Propagated<T> {
    fn new(record: T, mirror: MirrorStatus) -> Self {
        Propagated { record, mirror }
    }

    pub fn warning(&self) -> Option<&PropagationWarning> {
        match &self.mirror {
            MirrorStatus::Degraded(warning) => Some(warning),
            _ => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.warning().is_some()
    }
}

// =============================================================================
// Inputs
// =============================================================================

/// Fields for a new local product.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewProduct {
    pub title: String,
    pub description: String,
    pub price: Money,
    pub stock: i64,
    pub status: ProductStatus,
    pub category_id: Option<String>,
}

/// A partial product update. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<Money>,
    pub stock: Option<i64>,
    pub status: Option<ProductStatus>,
    /// `Some(None)` detaches the product from its category.
    pub category_id: Option<Option<String>>,
}

/// A partial category update. `Some(None)` for `parent_id` makes it a root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryChanges {
    pub name: Option<String>,
    pub parent_id: Option<Option<String>>,
}

/// Refund parameters; the amount defaults to the order total.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefundRequest {
    pub amount: Option<Money>,
    pub reason: Option<String>,
    pub note: Option<String>,
}

// =============================================================================
// Catalog Service
// =============================================================================

/// Local catalog mutations with best-effort mirroring.
#[derive(Clone)]
pub struct CatalogService {
    db: Database,
    notifier: Result<Arc<dyn Notifier>, ConfigurationError>,
}

impl CatalogService {
    /// `notifier` is the reason no notifier exists when it is `Err`; requested
    /// propagation then degrades with that configuration cause.
    pub fn new(db: Database, notifier: Result<Arc<dyn Notifier>, ConfigurationError>) -> Self {
        CatalogService { db, notifier }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    // =========================================================================
    // Products
    // =========================================================================

    pub async fn create_product(
        &self,
        input: NewProduct,
        propagate: bool,
    ) -> ServiceResult<Propagated<Product>> {
        validate_title(&input.title)?;
        validate_amount("price", input.price)?;
        validate_stock(input.stock)?;
        ensure_local_status(&input.status)?;
        if let Some(category_id) = &input.category_id {
            self.require_category(category_id).await?;
        }

        let mut product = Product::new(input.title.trim(), Utc::now());
        product.description = input.description;
        product.price_cents = input.price.cents();
        product.stock = input.stock;
        product.status = input.status;
        product.category_id = input.category_id;

        self.db.products().insert(&product).await?;
        info!(id = %product.id, title = %product.title, "Product created");

        if !propagate {
            return Ok(Propagated::new(product, MirrorStatus::LocalOnly));
        }

        let intent = OutwardIntent::CreateProduct(NewListing {
            title: product.title.clone(),
            description: product.description.clone(),
            price: product.price(),
            stock: product.stock,
        });
        match self.notify(intent).await {
            Err(warning) => Ok(Propagated::new(product, MirrorStatus::Degraded(warning))),
            Ok(payload) => {
                match remote::created_external_id(EntityKind::Product, &payload) {
                    Some(item_id) => {
                        self.db.products().set_external_id(&product.id, &item_id).await?;
                        product = self.require_product(&product.id).await?;
                    }
                    None => warn!(id = %product.id, "Create response carried no item_id"),
                }
                Ok(Propagated::new(product, MirrorStatus::Mirrored))
            }
        }
    }

    /// Applies `changes`, then mirrors whichever of price, stock and status
    /// actually changed.
    pub async fn update_product(
        &self,
        id: &str,
        changes: ProductChanges,
        propagate: bool,
    ) -> ServiceResult<Propagated<Product>> {
        let mut product = self.require_product(id).await?;
        let before = product.clone();

        if let Some(title) = changes.title {
            validate_title(&title)?;
            product.title = title.trim().to_string();
        }
        if let Some(description) = changes.description {
            product.description = description;
        }
        if let Some(price) = changes.price {
            validate_amount("price", price)?;
            product.price_cents = price.cents();
        }
        if let Some(stock) = changes.stock {
            validate_stock(stock)?;
            product.stock = stock;
        }
        if let Some(status) = changes.status {
            ensure_local_status(&status)?;
            product.status = status;
        }
        if let Some(category_id) = changes.category_id {
            if let Some(category_id) = &category_id {
                self.require_category(category_id).await?;
            }
            product.category_id = category_id;
        }

        product.updated_at = Utc::now();
        self.db.products().update(&product).await?;
        info!(id = %product.id, "Product updated");

        let intents = match (&product.external_id, propagate) {
            (Some(item_id), true) => product_intents(&before, &product, item_id),
            _ => Vec::new(),
        };
        let mirror = self.mirror_all(intents).await;
        Ok(Propagated::new(product, mirror))
    }

    pub async fn update_stock(
        &self,
        id: &str,
        stock: i64,
        propagate: bool,
    ) -> ServiceResult<Propagated<Product>> {
        let changes = ProductChanges {
            stock: Some(stock),
            ..Default::default()
        };
        self.update_product(id, changes, propagate).await
    }

    pub async fn update_price(
        &self,
        id: &str,
        price: Money,
        propagate: bool,
    ) -> ServiceResult<Propagated<Product>> {
        let changes = ProductChanges {
            price: Some(price),
            ..Default::default()
        };
        self.update_product(id, changes, propagate).await
    }

    pub async fn set_product_status(
        &self,
        id: &str,
        status: ProductStatus,
        propagate: bool,
    ) -> ServiceResult<Propagated<Product>> {
        let changes = ProductChanges {
            status: Some(status),
            ..Default::default()
        };
        self.update_product(id, changes, propagate).await
    }

    /// Deletes locally, then takes the listing offline remotely.
    pub async fn delete_product(
        &self,
        id: &str,
        propagate: bool,
    ) -> ServiceResult<Propagated<Product>> {
        let product = self.db.products().delete(id).await?;
        info!(id = %product.id, "Product deleted");

        let intents = match (&product.external_id, propagate) {
            (Some(item_id), true) => vec![OutwardIntent::SetOffline {
                item_id: item_id.clone(),
            }],
            _ => Vec::new(),
        };
        let mirror = self.mirror_all(intents).await;
        Ok(Propagated::new(product, mirror))
    }

    // =========================================================================
    // Orders
    // =========================================================================

    pub async fn ship_order(
        &self,
        id: &str,
        shipment: Shipment,
        propagate: bool,
    ) -> ServiceResult<Propagated<Order>> {
        let mut order = self.require_order(id).await?;
        let now = Utc::now();
        order.status = OrderStatus::Shipped;
        order.ship_date = Some(now);
        order.updated_at = now;
        self.db.orders().update(&order).await?;
        info!(id = %order.id, tracking = %shipment.tracking_number, "Order shipped");

        let intent = |order_id: String| OutwardIntent::ShipOrder { order_id, shipment };
        self.mirror_order(order, propagate, intent).await
    }

    pub async fn cancel_order(
        &self,
        id: &str,
        reason: Option<String>,
        propagate: bool,
    ) -> ServiceResult<Propagated<Order>> {
        let mut order = self.require_order(id).await?;
        order.status = OrderStatus::Cancelled;
        order.updated_at = Utc::now();
        self.db.orders().update(&order).await?;
        info!(id = %order.id, "Order cancelled");

        let reason = non_blank(reason).unwrap_or_else(|| DEFAULT_REASON.to_string());
        let intent = |order_id: String| OutwardIntent::CancelOrder { order_id, reason };
        self.mirror_order(order, propagate, intent).await
    }

    pub async fn refund_order(
        &self,
        id: &str,
        request: RefundRequest,
        propagate: bool,
    ) -> ServiceResult<Propagated<Order>> {
        let mut order = self.require_order(id).await?;
        let amount = request.amount.unwrap_or_else(|| order.total());
        validate_amount("refund_amount", amount)?;

        order.status = OrderStatus::Refunded;
        order.updated_at = Utc::now();
        self.db.orders().update(&order).await?;
        info!(id = %order.id, amount = %amount, "Order refunded");

        let refund = Refund {
            amount,
            reason: non_blank(request.reason).unwrap_or_else(|| DEFAULT_REASON.to_string()),
            note: request.note.unwrap_or_default(),
        };
        let intent = |order_id: String| OutwardIntent::RefundOrder { order_id, refund };
        self.mirror_order(order, propagate, intent).await
    }

    async fn mirror_order<F>(
        &self,
        order: Order,
        propagate: bool,
        intent: F,
    ) -> ServiceResult<Propagated<Order>>
    where
        F: FnOnce(String) -> OutwardIntent,
    {
        let intents = match (&order.external_id, propagate) {
            (Some(order_id), true) => vec![intent(order_id.clone())],
            _ => Vec::new(),
        };
        let mirror = self.mirror_all(intents).await;
        Ok(Propagated::new(order, mirror))
    }

    // =========================================================================
    // Categories
    // =========================================================================

    pub async fn create_category(
        &self,
        name: &str,
        parent_id: Option<String>,
        propagate: bool,
    ) -> ServiceResult<Propagated<Category>> {
        validate_category_name(name)?;
        let parent_external = match &parent_id {
            Some(parent_id) => self.require_category(parent_id).await?.external_id,
            None => None,
        };

        let mut category = Category::new(name.trim(), Utc::now());
        category.parent_id = parent_id;
        self.db.categories().insert(&category).await?;
        info!(id = %category.id, name = %category.name, "Category created");

        if !propagate {
            return Ok(Propagated::new(category, MirrorStatus::LocalOnly));
        }

        let intent = OutwardIntent::CreateCategory {
            name: category.name.clone(),
            parent_id: parent_external,
        };
        match self.notify(intent).await {
            Err(warning) => Ok(Propagated::new(category, MirrorStatus::Degraded(warning))),
            Ok(payload) => {
                match remote::created_external_id(EntityKind::Category, &payload) {
                    Some(category_id) => {
                        self.db
                            .categories()
                            .set_external_id(&category.id, &category_id)
                            .await?;
                        category = self.require_category(&category.id).await?;
                    }
                    None => warn!(id = %category.id, "Create response carried no category_id"),
                }
                Ok(Propagated::new(category, MirrorStatus::Mirrored))
            }
        }
    }

    pub async fn update_category(
        &self,
        id: &str,
        changes: CategoryChanges,
        propagate: bool,
    ) -> ServiceResult<Propagated<Category>> {
        let mut category = self.require_category(id).await?;

        if let Some(name) = changes.name {
            validate_category_name(&name)?;
            category.name = name.trim().to_string();
        }
        if let Some(parent_id) = changes.parent_id {
            if let Some(parent_id) = &parent_id {
                self.ensure_not_descendant(id, parent_id).await?;
            }
            category.parent_id = parent_id;
        }

        // Resolved before the write so nothing can fail after the commit.
        let parent_external = match &category.parent_id {
            Some(parent_id) => self.require_category(parent_id).await?.external_id,
            None => None,
        };

        category.updated_at = Utc::now();
        self.db.categories().update(&category).await?;
        info!(id = %category.id, "Category updated");

        let intents = match (&category.external_id, propagate) {
            (Some(category_id), true) => vec![OutwardIntent::UpdateCategory {
                category_id: category_id.clone(),
                name: category.name.clone(),
                parent_id: parent_external,
            }],
            _ => Vec::new(),
        };
        let mirror = self.mirror_all(intents).await;
        Ok(Propagated::new(category, mirror))
    }

    /// Refused while the category has children.
    pub async fn delete_category(
        &self,
        id: &str,
        propagate: bool,
    ) -> ServiceResult<Propagated<Category>> {
        self.require_category(id).await?;
        let children = self.db.categories().count_children(id).await?;
        if children > 0 {
            return Err(CoreError::Conflict(format!(
                "category {} still has {} child categories",
                id, children
            ))
            .into());
        }

        let category = self.db.categories().delete(id).await?;
        info!(id = %category.id, "Category deleted");

        let intents = match (&category.external_id, propagate) {
            (Some(category_id), true) => vec![OutwardIntent::DeleteCategory {
                category_id: category_id.clone(),
            }],
            _ => Vec::new(),
        };
        let mirror = self.mirror_all(intents).await;
        Ok(Propagated::new(category, mirror))
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn notify(&self, intent: OutwardIntent) -> Result<Value, PropagationWarning> {
        let operation = intent.operation();
        let external_id = intent.external_id().map(str::to_string);

        let result = match &self.notifier {
            Ok(notifier) => notifier.notify(&intent).await,
            Err(missing) => Err(ClientError::Configuration(missing.clone())),
        };

        result.map_err(|cause| {
            warn!(operation, ?external_id, error = %cause, "Outward propagation failed");
            PropagationWarning {
                operation,
                external_id,
                cause,
            }
        })
    }

    /// Attempts every intent; the first failure is the one reported.
    async fn mirror_all(&self, intents: Vec<OutwardIntent>) -> MirrorStatus {
        if intents.is_empty() {
            return MirrorStatus::LocalOnly;
        }

        let mut first_failure = None;
        for intent in intents {
            if let Err(warning) = self.notify(intent).await {
                first_failure.get_or_insert(warning);
            }
        }

        match first_failure {
            Some(warning) => MirrorStatus::Degraded(warning),
            None => MirrorStatus::Mirrored,
        }
    }

    async fn require_product(&self, id: &str) -> ServiceResult<Product> {
        self.db
            .products()
            .get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::not_found("Product", id).into())
    }

    async fn require_order(&self, id: &str) -> ServiceResult<Order> {
        self.db
            .orders()
            .get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::not_found("Order", id).into())
    }

    async fn require_category(&self, id: &str) -> ServiceResult<Category> {
        self.db
            .categories()
            .get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::not_found("Category", id).into())
    }

    /// Rejects a parent that is the category itself or one of its descendants.
    async fn ensure_not_descendant(&self, id: &str, parent_id: &str) -> ServiceResult<()> {
        let mut cursor = Some(parent_id.to_string());
        while let Some(current) = cursor {
            if current == id {
                return Err(CoreError::Conflict(
                    "a category cannot be placed under itself or its descendants".to_string(),
                )
                .into());
            }
            cursor = self.require_category(&current).await?.parent_id;
        }
        Ok(())
    }
}

/// Intents for the tracked fields that differ between `before` and `after`.
fn product_intents(before: &Product, after: &Product, item_id: &str) -> Vec<OutwardIntent> {
    let mut intents = Vec::new();
    if before.price_cents != after.price_cents {
        intents.push(OutwardIntent::UpdatePrice {
            item_id: item_id.to_string(),
            price: after.price(),
        });
    }
    if before.stock != after.stock {
        intents.push(OutwardIntent::UpdateStock {
            item_id: item_id.to_string(),
            stock: after.stock,
        });
    }
    if before.status != after.status {
        let item_id = item_id.to_string();
        intents.push(match after.status {
            ProductStatus::Online => OutwardIntent::SetOnline { item_id },
            _ => OutwardIntent::SetOffline { item_id },
        });
    }
    intents
}

fn ensure_local_status(status: &ProductStatus) -> Result<(), ServiceError> {
    match status {
        ProductStatus::Online | ProductStatus::Offline => Ok(()),
        ProductStatus::Other(_) => Err(ValidationError::NotAllowed {
            field: "status".to_string(),
            allowed: "online, offline".to_string(),
        }
        .into()),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RemoteSettings;
    use crate::reconciler::reconcile;
    use crate::sink::MemorySink;
    use ruten_core::Credential;
    use ruten_db::DbConfig;
    use serde_json::json;
    use std::sync::Mutex;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Records every intent; answers with `reply` or fails with a 503.
    struct FakeNotifier {
        seen: Mutex<Vec<OutwardIntent>>,
        reply: Option<Value>,
    }

    impl FakeNotifier {
        fn ok(reply: Value) -> Arc<Self> {
            Arc::new(FakeNotifier {
                seen: Mutex::new(Vec::new()),
                reply: Some(reply),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(FakeNotifier {
                seen: Mutex::new(Vec::new()),
                reply: None,
            })
        }

        fn seen(&self) -> Vec<OutwardIntent> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for FakeNotifier {
        async fn notify(&self, intent: &OutwardIntent) -> ClientResult<Value> {
            self.seen.lock().unwrap().push(intent.clone());
            self.reply.clone().ok_or_else(|| ClientError::Transport {
                endpoint: "/fake".to_string(),
                status: Some(503),
                message: "HTTP 503: Service Unavailable".to_string(),
                correlation_id: None,
            })
        }
    }

    async fn service(notifier: Arc<FakeNotifier>) -> CatalogService {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let notifier: Arc<dyn Notifier> = notifier;
        CatalogService::new(db, Ok(notifier))
    }

    async fn synced_product(svc: &CatalogService, item_id: &str) -> Product {
        let mut product = Product::new("Lamp", Utc::now());
        product.external_id = Some(item_id.to_string());
        product.price_cents = 50000;
        product.stock = 4;
        svc.database().products().insert(&product).await.unwrap();
        product
    }

    #[tokio::test]
    async fn test_failed_mirror_keeps_local_status() {
        let notifier = FakeNotifier::failing();
        let svc = service(notifier.clone()).await;
        let product = synced_product(&svc, "A100").await;

        let result = svc
            .set_product_status(&product.id, ProductStatus::Online, true)
            .await
            .unwrap();

        let warning = result.warning().unwrap();
        assert_eq!(warning.operation, "set_online");
        assert_eq!(warning.external_id.as_deref(), Some("A100"));
        assert!(warning.cause.is_transport());

        let stored = svc.database().products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ProductStatus::Online);
    }

    #[tokio::test]
    async fn test_update_mirrors_only_changed_fields() {
        let notifier = FakeNotifier::ok(json!({"status": "success"}));
        let svc = service(notifier.clone()).await;
        let product = synced_product(&svc, "A1").await;

        let result = svc
            .update_product(
                &product.id,
                ProductChanges {
                    title: Some("Desk lamp".to_string()),
                    price: Some(Money::from_cents(50000)),
                    stock: Some(9),
                    ..Default::default()
                },
                true,
            )
            .await
            .unwrap();

        assert_eq!(result.mirror, MirrorStatus::Mirrored);
        assert_eq!(
            notifier.seen(),
            vec![OutwardIntent::UpdateStock {
                item_id: "A1".to_string(),
                stock: 9
            }]
        );
    }

    #[tokio::test]
    async fn test_local_only_without_external_id_or_request() {
        let notifier = FakeNotifier::ok(json!({}));
        let svc = service(notifier.clone()).await;

        let created = svc
            .create_product(
                NewProduct {
                    title: "Unsynced".to_string(),
                    price: Money::from_cents(100),
                    ..Default::default()
                },
                false,
            )
            .await
            .unwrap();
        assert_eq!(created.mirror, MirrorStatus::LocalOnly);

        let updated = svc.update_stock(&created.record.id, 3, true).await.unwrap();
        assert_eq!(updated.mirror, MirrorStatus::LocalOnly);
        assert!(notifier.seen().is_empty());
    }

    #[tokio::test]
    async fn test_missing_client_degrades_with_configuration_cause() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let svc = CatalogService::new(
            db,
            Err(ConfigurationError::MissingCredential("RUTEN_API_KEY")),
        );
        let product = synced_product(&svc, "A7").await;

        let result = svc.update_price(&product.id, Money::from_cents(1), true).await.unwrap();
        let warning = result.warning().unwrap();
        assert!(matches!(warning.cause, ClientError::Configuration(_)));
        assert_eq!(result.record.price_cents, 1);
    }

    #[tokio::test]
    async fn test_create_stores_remote_id_and_round_trips() {
        let notifier = FakeNotifier::ok(json!({"status": "success", "data": {"item_id": 900}}));
        let svc = service(notifier.clone()).await;

        let created = svc
            .create_product(
                NewProduct {
                    title: "Teapot".to_string(),
                    description: "Cast iron".to_string(),
                    price: Money::from_cents(129950),
                    stock: 2,
                    ..Default::default()
                },
                true,
            )
            .await
            .unwrap();
        assert_eq!(created.mirror, MirrorStatus::Mirrored);
        assert_eq!(created.record.external_id.as_deref(), Some("900"));

        // The marketplace echoes the pushed fields back on the next pull.
        let page = vec![json!({
            "item_id": "900",
            "title": "Teapot",
            "description": "Cast iron",
            "price": Money::from_cents(129950).to_wire(),
            "stock": 2,
            "status": "offline"
        })];
        let outcome = reconcile(
            EntityKind::Product,
            &page,
            &svc.database().entity_store(),
        )
        .await
        .unwrap();
        assert_eq!((outcome.inserted, outcome.updated), (0, 1));

        let mut pulled = svc
            .database()
            .products()
            .get_by_id(&created.record.id)
            .await
            .unwrap()
            .unwrap();
        pulled.updated_at = created.record.updated_at;
        assert_eq!(pulled, created.record);
    }

    #[tokio::test]
    async fn test_order_lifecycle_defaults() {
        let notifier = FakeNotifier::ok(json!({"status": "success"}));
        let svc = service(notifier.clone()).await;

        let mut order = Order::new(Utc::now());
        order.external_id = Some("O-9".to_string());
        order.total_cents = 42000;
        svc.database().orders().insert(&order).await.unwrap();

        let refunded = svc
            .refund_order(&order.id, RefundRequest::default(), true)
            .await
            .unwrap();
        assert_eq!(refunded.record.status, OrderStatus::Refunded);
        assert_eq!(
            notifier.seen(),
            vec![OutwardIntent::RefundOrder {
                order_id: "O-9".to_string(),
                refund: Refund {
                    amount: Money::from_cents(42000),
                    reason: DEFAULT_REASON.to_string(),
                    note: String::new(),
                },
            }]
        );

        let shipped = svc
            .ship_order(&order.id, Shipment::default(), false)
            .await
            .unwrap();
        assert_eq!(shipped.mirror, MirrorStatus::LocalOnly);
        assert!(shipped.record.ship_date.is_some());
    }

    #[tokio::test]
    async fn test_category_delete_guard_and_cycles() {
        let notifier = FakeNotifier::ok(json!({"category_id": "55"}));
        let svc = service(notifier.clone()).await;

        let root = svc.create_category("Books", None, true).await.unwrap().record;
        assert_eq!(root.external_id.as_deref(), Some("55"));
        let child = svc
            .create_category("Novels", Some(root.id.clone()), false)
            .await
            .unwrap()
            .record;

        let err = svc.delete_category(&root.id, true).await.unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::Conflict(_))));

        let err = svc
            .update_category(
                &root.id,
                CategoryChanges {
                    parent_id: Some(Some(child.id.clone())),
                    ..Default::default()
                },
                false,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::Conflict(_))));

        svc.delete_category(&child.id, true).await.unwrap();
        let deleted = svc.delete_category(&root.id, true).await.unwrap();
        assert_eq!(deleted.mirror, MirrorStatus::Mirrored);
        assert_eq!(
            notifier.seen().last(),
            Some(&OutwardIntent::DeleteCategory {
                category_id: "55".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_category_update_resolves_parent_before_writing() {
        let notifier = FakeNotifier::ok(json!({"category_id": "55"}));
        let svc = service(notifier.clone()).await;

        let parent = svc.create_category("Books", None, true).await.unwrap().record;
        let child = svc.create_category("Novels", None, true).await.unwrap().record;

        let err = svc
            .update_category(
                &child.id,
                CategoryChanges {
                    name: Some("Fiction".to_string()),
                    parent_id: Some(Some("no-such-category".to_string())),
                },
                true,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::NotFound { .. })));
        let stored = svc.database().categories().get_by_id(&child.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Novels");
        assert_eq!(stored.parent_id, None);

        let moved = svc
            .update_category(
                &child.id,
                CategoryChanges {
                    parent_id: Some(Some(parent.id.clone())),
                    ..Default::default()
                },
                true,
            )
            .await
            .unwrap();
        assert_eq!(moved.mirror, MirrorStatus::Mirrored);
        assert_eq!(
            notifier.seen().last(),
            Some(&OutwardIntent::UpdateCategory {
                category_id: "55".to_string(),
                name: "Novels".to_string(),
                parent_id: Some("55".to_string()),
            })
        );
    }

    #[tokio::test]
    async fn test_client_as_notifier() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/v1/product/item/offline"))
            .and(body_json(json!({"item_id": "A5"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = RutenClient::new(
            Credential::new("k", "s", "salt").unwrap(),
            &RemoteSettings::with_base_url(server.uri()),
            Arc::new(MemorySink::new()),
        )
        .unwrap();
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let notifier: Arc<dyn Notifier> = Arc::new(client);
        let svc = CatalogService::new(db, Ok(notifier));
        let product = synced_product(&svc, "A5").await;

        let deleted = svc.delete_product(&product.id, true).await.unwrap();
        assert_eq!(deleted.mirror, MirrorStatus::Mirrored);
        assert!(svc.database().products().get_by_id(&product.id).await.unwrap().is_none());
    }
}
