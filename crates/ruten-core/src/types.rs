//! # Domain Types
//!
//! Local records mirrored with the partner marketplace.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Order      │   │    Category     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  external_id    │   │  external_id    │   │  external_id    │       │
//! │  │  title          │   │  buyer_name     │   │  name           │       │
//! │  │  price_cents    │   │  total_cents    │   │  parent_id (FK) │       │
//! │  │  stock, status  │   │  status, dates  │   │                 │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  ProductStatus  │   │   OrderStatus   │   │  LocalRecord    │       │
//! │  │  Online         │   │  Pending        │   │  Product(..)    │       │
//! │  │  Offline        │   │  Shipped        │   │  Order(..)      │       │
//! │  │  Other(String)  │   │  Cancelled      │   │  Category(..)   │       │
//! │  └─────────────────┘   │  Refunded       │   └─────────────────┘       │
//! │                        │  Other(String)  │                              │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4, assigned locally, used for database relations
//! - `external_id`: assigned by the marketplace, `None` until the record is
//!   pushed outward or matched by a pull. Unique per kind when present.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::Money;

/// Generates a new local identifier.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// =============================================================================
// Entity Kind
// =============================================================================

/// The three kinds of record kept in sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Product,
    Order,
    Category,
}

impl EntityKind {
    /// Lowercase name, also used as a log field value.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Product => "product",
            EntityKind::Order => "order",
            EntityKind::Category => "category",
        }
    }

    /// Name of the field carrying the remote identifier in partner payloads.
    pub fn external_id_field(&self) -> &'static str {
        match self {
            EntityKind::Product => "item_id",
            EntityKind::Order => "order_id",
            EntityKind::Category => "category_id",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "product" | "products" => Ok(EntityKind::Product),
            "order" | "orders" => Ok(EntityKind::Order),
            "category" | "categories" => Ok(EntityKind::Category),
            other => Err(format!("unknown entity kind '{}'", other)),
        }
    }
}

// =============================================================================
// Product Status
// =============================================================================

/// Listing state of a product.
///
/// Local mutations only ever produce `Online` or `Offline`. A pull may carry
/// any other marketplace state, which is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProductStatus {
    Online,
    Offline,
    Other(String),
}

impl ProductStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ProductStatus::Online => "online",
            ProductStatus::Offline => "offline",
            ProductStatus::Other(s) => s,
        }
    }
}

impl Default for ProductStatus {
    fn default() -> Self {
        ProductStatus::Offline
    }
}

impl From<String> for ProductStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "online" => ProductStatus::Online,
            "offline" => ProductStatus::Offline,
            _ => ProductStatus::Other(s),
        }
    }
}

impl From<&str> for ProductStatus {
    fn from(s: &str) -> Self {
        ProductStatus::from(s.to_string())
    }
}

impl From<ProductStatus> for String {
    fn from(status: ProductStatus) -> Self {
        match status {
            ProductStatus::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Order Status
// =============================================================================

/// Fulfilment state of an order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    Pending,
    Shipped,
    Cancelled,
    Refunded,
    Other(String),
}

impl OrderStatus {
    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
            OrderStatus::Other(s) => s,
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

impl From<String> for OrderStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pending" => OrderStatus::Pending,
            "shipped" => OrderStatus::Shipped,
            "cancelled" => OrderStatus::Cancelled,
            "refunded" => OrderStatus::Refunded,
            _ => OrderStatus::Other(s),
        }
    }
}

impl From<&str> for OrderStatus {
    fn from(s: &str) -> Self {
        OrderStatus::from(s.to_string())
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        match status {
            OrderStatus::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product listed (or to be listed) on the marketplace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Marketplace `item_id`, once known.
    pub external_id: Option<String>,

    /// Listing title.
    pub title: String,

    /// Free-form description, empty when not provided.
    pub description: String,

    /// Price in cents (smallest currency unit).
    pub price_cents: i64,

    /// Units available. Never negative.
    pub stock: i64,

    pub status: ProductStatus,

    /// Local category id.
    pub category_id: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Creates a product with defaults for everything but the title.
    pub fn new(title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Product {
            id: new_id(),
            external_id: None,
            title: title.into(),
            description: String::new(),
            price_cents: 0,
            stock: 0,
            status: ProductStatus::default(),
            category_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

// =============================================================================
// Order
// =============================================================================

/// A buyer order received through the marketplace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    /// Marketplace `order_id`.
    pub external_id: Option<String>,
    pub buyer_name: String,
    pub total_cents: i64,
    pub status: OrderStatus,
    /// When the buyer placed the order, if the marketplace said so.
    pub order_date: Option<DateTime<Utc>>,
    /// When the order was marked shipped locally.
    pub ship_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates a pending order with zero total.
    pub fn new(now: DateTime<Utc>) -> Self {
        Order {
            id: new_id(),
            external_id: None,
            buyer_name: String::new(),
            total_cents: 0,
            status: OrderStatus::default(),
            order_date: None,
            ship_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the order total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

// =============================================================================
// Category
// =============================================================================

/// A store category. Categories form a tree through `parent_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    /// Marketplace `category_id`.
    pub external_id: Option<String>,
    pub name: String,
    /// Local id of the parent category; `None` for a root category.
    pub parent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Category {
    /// Creates a root category.
    pub fn new(name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Category {
            id: new_id(),
            external_id: None,
            name: name.into(),
            parent_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// =============================================================================
// Local Record
// =============================================================================

/// Any persisted record, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LocalRecord {
    Product(Product),
    Order(Order),
    Category(Category),
}

impl LocalRecord {
    pub fn kind(&self) -> EntityKind {
        match self {
            LocalRecord::Product(_) => EntityKind::Product,
            LocalRecord::Order(_) => EntityKind::Order,
            LocalRecord::Category(_) => EntityKind::Category,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            LocalRecord::Product(p) => &p.id,
            LocalRecord::Order(o) => &o.id,
            LocalRecord::Category(c) => &c.id,
        }
    }

    pub fn external_id(&self) -> Option<&str> {
        match self {
            LocalRecord::Product(p) => p.external_id.as_deref(),
            LocalRecord::Order(o) => o.external_id.as_deref(),
            LocalRecord::Category(c) => c.external_id.as_deref(),
        }
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        match self {
            LocalRecord::Product(p) => p.updated_at,
            LocalRecord::Order(o) => o.updated_at,
            LocalRecord::Category(c) => c.updated_at,
        }
    }
}

impl From<Product> for LocalRecord {
    fn from(p: Product) -> Self {
        LocalRecord::Product(p)
    }
}

impl From<Order> for LocalRecord {
    fn from(o: Order) -> Self {
        LocalRecord::Order(o)
    }
}

impl From<Category> for LocalRecord {
    fn from(c: Category) -> Self {
        LocalRecord::Category(c)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_status_round_trips_unknown_values() {
        assert_eq!(ProductStatus::from("online"), ProductStatus::Online);
        assert_eq!(ProductStatus::from("offline"), ProductStatus::Offline);

        let odd = ProductStatus::from("suspended");
        assert_eq!(odd, ProductStatus::Other("suspended".to_string()));
        assert_eq!(odd.as_str(), "suspended");
        assert_eq!(String::from(odd), "suspended");
    }

    #[test]
    fn test_status_serde_is_plain_string() {
        let json = serde_json::to_string(&OrderStatus::Shipped).unwrap();
        assert_eq!(json, "\"shipped\"");

        let parsed: OrderStatus = serde_json::from_str("\"awaiting_pickup\"").unwrap();
        assert_eq!(parsed, OrderStatus::Other("awaiting_pickup".to_string()));
    }

    #[test]
    fn test_defaults() {
        assert_eq!(ProductStatus::default(), ProductStatus::Offline);
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);

        let now = Utc::now();
        let product = Product::new("Mug", now);
        assert_eq!(product.stock, 0);
        assert_eq!(product.price(), Money::zero());
        assert!(product.external_id.is_none());
        assert_eq!(product.created_at, product.updated_at);
    }

    #[test]
    fn test_new_ids_are_unique_uuids() {
        let a = new_id();
        let b = new_id();
        assert_ne!(a, b);
        assert!(uuid::Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn test_entity_kind_parse() {
        assert_eq!("products".parse::<EntityKind>().unwrap(), EntityKind::Product);
        assert_eq!("Order".parse::<EntityKind>().unwrap(), EntityKind::Order);
        assert!("widgets".parse::<EntityKind>().is_err());
        assert_eq!(EntityKind::Category.external_id_field(), "category_id");
    }

    #[test]
    fn test_local_record_accessors() {
        let mut category = Category::new("Books", Utc::now());
        category.external_id = Some("C9".to_string());
        let record = LocalRecord::from(category.clone());

        assert_eq!(record.kind(), EntityKind::Category);
        assert_eq!(record.id(), category.id);
        assert_eq!(record.external_id(), Some("C9"));
    }
}
