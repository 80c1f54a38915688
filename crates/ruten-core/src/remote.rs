//! # Remote Records
//!
//! Decoding of marketplace JSON into typed records, and the merge rules that
//! turn them into local records.
//!
//! ## Decode and Merge
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     One Record Through the Pipeline                     │
//! │                                                                         │
//! │  {"item_id": 1001, "title": "Mug", "price": "199.5", "stock": null}    │
//! │                │                                                        │
//! │                ▼  RemoteRecord::decode(kind, &value)                    │
//! │  RemoteProduct { external_id: "1001", title: Some("Mug"),              │
//! │                  price: Some(19950 cents), stock: None, .. }           │
//! │                │                                                        │
//! │        ┌───────┴────────┐                                               │
//! │        ▼                ▼                                               │
//! │   found locally     not found                                           │
//! │   apply_to(&mut p)  into_new(now)                                       │
//! │   overwrite only    defaults for                                        │
//! │   Some(..) fields   every None                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Lenient Shapes
//! - External ids may be strings or integers
//! - Integers and amounts may be numbers or numeric strings
//! - `null` is the same as absent
//! - Anything else of the wrong type is a [`DecodeError::InvalidField`]

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::error::DecodeError;
use crate::money::Money;
use crate::types::{Category, EntityKind, Order, OrderStatus, Product, ProductStatus};
use crate::validation::parse_remote_datetime;

type Object = Map<String, Value>;

// =============================================================================
// Remote Record
// =============================================================================

/// A record as returned by the marketplace, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteRecord {
    Product(RemoteProduct),
    Order(RemoteOrder),
    Category(RemoteCategory),
}

impl RemoteRecord {
    /// Decodes one page element as a record of `kind`.
    pub fn decode(kind: EntityKind, value: &Value) -> Result<Self, DecodeError> {
        let obj = value.as_object().ok_or(DecodeError::NotAnObject)?;
        match kind {
            EntityKind::Product => RemoteProduct::decode(obj).map(RemoteRecord::Product),
            EntityKind::Order => RemoteOrder::decode(obj).map(RemoteRecord::Order),
            EntityKind::Category => RemoteCategory::decode(obj).map(RemoteRecord::Category),
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            RemoteRecord::Product(_) => EntityKind::Product,
            RemoteRecord::Order(_) => EntityKind::Order,
            RemoteRecord::Category(_) => EntityKind::Category,
        }
    }

    pub fn external_id(&self) -> &str {
        match self {
            RemoteRecord::Product(p) => &p.external_id,
            RemoteRecord::Order(o) => &o.external_id,
            RemoteRecord::Category(c) => &c.external_id,
        }
    }
}

/// Best-effort extraction of the external id from an undecodable element.
///
/// Used to label per-record errors when [`RemoteRecord::decode`] fails.
pub fn peek_external_id(kind: EntityKind, value: &Value) -> Option<String> {
    value
        .as_object()
        .and_then(|obj| external_id(obj, kind.external_id_field()).ok())
}

// =============================================================================
// Product
// =============================================================================

/// A marketplace product (`item_id`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteProduct {
    pub external_id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<Money>,
    pub stock: Option<i64>,
    pub status: Option<ProductStatus>,
}

impl RemoteProduct {
    fn decode(obj: &Object) -> Result<Self, DecodeError> {
        Ok(RemoteProduct {
            external_id: external_id(obj, "item_id")?,
            title: opt_string(obj, "title")?,
            description: opt_string(obj, "description")?,
            price: opt_money(obj, "price")?,
            stock: opt_i64(obj, "stock")?,
            status: opt_string(obj, "status")?.map(ProductStatus::from),
        })
    }

    /// Overwrites every field the marketplace supplied.
    pub fn apply_to(&self, local: &mut Product, now: DateTime<Utc>) {
        if let Some(title) = &self.title {
            local.title = title.clone();
        }
        if let Some(description) = &self.description {
            local.description = description.clone();
        }
        if let Some(price) = self.price {
            local.price_cents = price.cents();
        }
        if let Some(stock) = self.stock {
            local.stock = stock;
        }
        if let Some(status) = &self.status {
            local.status = status.clone();
        }
        local.updated_at = now;
    }

    /// Builds a new local product, defaulting every missing field.
    pub fn into_new(self, now: DateTime<Utc>) -> Product {
        let mut product = Product::new(String::new(), now);
        product.external_id = Some(self.external_id.clone());
        self.apply_to(&mut product, now);
        product
    }
}

// =============================================================================
// Order
// =============================================================================

/// A marketplace order (`order_id`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteOrder {
    pub external_id: String,
    pub buyer_name: Option<String>,
    pub total_amount: Option<Money>,
    pub status: Option<OrderStatus>,
    /// `None` both when absent and when no known date format matched.
    pub order_date: Option<DateTime<Utc>>,
}

impl RemoteOrder {
    fn decode(obj: &Object) -> Result<Self, DecodeError> {
        let order_date = match present(obj, "order_date") {
            Some(Value::String(s)) => parse_remote_datetime(s),
            Some(Value::Number(n)) => parse_remote_datetime(&n.to_string()),
            _ => None,
        };

        Ok(RemoteOrder {
            external_id: external_id(obj, "order_id")?,
            buyer_name: opt_string(obj, "buyer_name")?,
            total_amount: opt_money(obj, "total_amount")?,
            status: opt_string(obj, "status")?.map(OrderStatus::from),
            order_date,
        })
    }

    pub fn apply_to(&self, local: &mut Order, now: DateTime<Utc>) {
        if let Some(buyer) = &self.buyer_name {
            local.buyer_name = buyer.clone();
        }
        if let Some(total) = self.total_amount {
            local.total_cents = total.cents();
        }
        if let Some(status) = &self.status {
            local.status = status.clone();
        }
        if let Some(date) = self.order_date {
            local.order_date = Some(date);
        }
        local.updated_at = now;
    }

    pub fn into_new(self, now: DateTime<Utc>) -> Order {
        let mut order = Order::new(now);
        order.external_id = Some(self.external_id.clone());
        self.apply_to(&mut order, now);
        order
    }
}

// =============================================================================
// Category
// =============================================================================

/// The `parent_id` of a marketplace category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentRef {
    /// `0` or `""`: a top-level category.
    Root,
    /// The marketplace id of the parent.
    External(String),
}

/// What to do with a local category's parent after resolving a [`ParentRef`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentUpdate {
    /// Parent unknown or unresolvable: leave it as it is.
    Keep,
    /// Make the category a root.
    Clear,
    /// Point at this local category id.
    Set(String),
}

/// A marketplace store category (`category_id`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCategory {
    pub external_id: String,
    pub name: Option<String>,
    pub parent: Option<ParentRef>,
}

impl RemoteCategory {
    fn decode(obj: &Object) -> Result<Self, DecodeError> {
        let parent = match present(obj, "parent_id") {
            None => None,
            Some(v) => {
                let raw = id_like(v).ok_or_else(|| DecodeError::InvalidField {
                    field: "parent_id",
                    reason: format!("expected string or integer, got {}", v),
                })?;
                if raw.is_empty() || raw == "0" {
                    Some(ParentRef::Root)
                } else {
                    Some(ParentRef::External(raw))
                }
            }
        };

        Ok(RemoteCategory {
            external_id: external_id(obj, "category_id")?,
            name: opt_string(obj, "name")?,
            parent,
        })
    }

    pub fn apply_to(&self, local: &mut Category, parent: ParentUpdate, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            local.name = name.clone();
        }
        match parent {
            ParentUpdate::Keep => {}
            ParentUpdate::Clear => local.parent_id = None,
            ParentUpdate::Set(id) => local.parent_id = Some(id),
        }
        local.updated_at = now;
    }

    pub fn into_new(self, parent: ParentUpdate, now: DateTime<Utc>) -> Category {
        let mut category = Category::new(String::new(), now);
        category.external_id = Some(self.external_id.clone());
        self.apply_to(&mut category, parent, now);
        category
    }
}

// =============================================================================
// Page Extraction
// =============================================================================

/// Pulls the record array out of a list response.
///
/// `{"data": {"products": [...]}}` for products, `orders` and `categories`
/// likewise. A missing or non-array value yields an empty page.
pub fn extract_page(kind: EntityKind, payload: &Value) -> Vec<Value> {
    let key = match kind {
        EntityKind::Product => "products",
        EntityKind::Order => "orders",
        EntityKind::Category => "categories",
    };

    payload
        .get("data")
        .and_then(|data| data.get(key))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// Reads the id the marketplace assigned in a create response.
///
/// Looks at `data.<field>` first, then a top-level `<field>`.
pub fn created_external_id(kind: EntityKind, payload: &Value) -> Option<String> {
    let field = kind.external_id_field();
    payload
        .get("data")
        .and_then(|data| data.get(field))
        .or_else(|| payload.get(field))
        .and_then(id_like)
        .filter(|id| !id.is_empty())
}

// =============================================================================
// Field Helpers
// =============================================================================

fn present<'a>(obj: &'a Object, name: &str) -> Option<&'a Value> {
    obj.get(name).filter(|v| !v.is_null())
}

fn id_like(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}

fn external_id(obj: &Object, name: &'static str) -> Result<String, DecodeError> {
    present(obj, name)
        .and_then(id_like)
        .filter(|id| !id.is_empty())
        .ok_or(DecodeError::MissingExternalId(name))
}

fn opt_string(obj: &Object, name: &'static str) -> Result<Option<String>, DecodeError> {
    match present(obj, name) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(DecodeError::InvalidField {
            field: name,
            reason: format!("expected string, got {}", other),
        }),
    }
}

fn opt_i64(obj: &Object, name: &'static str) -> Result<Option<i64>, DecodeError> {
    let invalid = |v: &Value| DecodeError::InvalidField {
        field: name,
        reason: format!("expected integer, got {}", v),
    };

    match present(obj, name) {
        None => Ok(None),
        Some(v @ Value::Number(n)) => n.as_i64().map(Some).ok_or_else(|| invalid(v)),
        Some(v @ Value::String(s)) => s.trim().parse().map(Some).map_err(|_| invalid(v)),
        Some(v) => Err(invalid(v)),
    }
}

fn opt_money(obj: &Object, name: &'static str) -> Result<Option<Money>, DecodeError> {
    match present(obj, name) {
        None => Ok(None),
        Some(v) => Money::from_json(v)
            .map(Some)
            .map_err(|e| DecodeError::InvalidField {
                field: name,
                reason: e.to_string(),
            }),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode_product(v: Value) -> Result<RemoteProduct, DecodeError> {
        match RemoteRecord::decode(EntityKind::Product, &v)? {
            RemoteRecord::Product(p) => Ok(p),
            other => panic!("unexpected {:?}", other),
        }
    }

    fn decode_category(v: Value) -> RemoteCategory {
        match RemoteRecord::decode(EntityKind::Category, &v).unwrap() {
            RemoteRecord::Category(c) => c,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_product_lenient_shapes() {
        let p = decode_product(json!({
            "item_id": 1001,
            "title": "Mug",
            "price": "199.5",
            "stock": "12",
            "status": "online",
            "description": null
        }))
        .unwrap();

        assert_eq!(p.external_id, "1001");
        assert_eq!(p.title.as_deref(), Some("Mug"));
        assert_eq!(p.price, Some(Money::from_cents(19950)));
        assert_eq!(p.stock, Some(12));
        assert_eq!(p.status, Some(ProductStatus::Online));
        assert_eq!(p.description, None);
    }

    #[test]
    fn test_decode_rejects_missing_id_and_bad_fields() {
        assert_eq!(
            decode_product(json!({"title": "x"})).unwrap_err(),
            DecodeError::MissingExternalId("item_id")
        );
        assert_eq!(
            decode_product(json!({"item_id": ""})).unwrap_err(),
            DecodeError::MissingExternalId("item_id")
        );
        assert!(matches!(
            decode_product(json!({"item_id": "A", "stock": "many"})).unwrap_err(),
            DecodeError::InvalidField { field: "stock", .. }
        ));
        assert!(matches!(
            decode_product(json!({"item_id": "A", "price": "12.345"})).unwrap_err(),
            DecodeError::InvalidField { field: "price", .. }
        ));
        assert!(matches!(
            decode_product(json!({"item_id": "A", "title": 7})).unwrap_err(),
            DecodeError::InvalidField { field: "title", .. }
        ));
        assert_eq!(
            RemoteRecord::decode(EntityKind::Product, &json!("A")).unwrap_err(),
            DecodeError::NotAnObject
        );
    }

    #[test]
    fn test_apply_keeps_absent_fields() {
        let now = Utc::now();
        let mut local = Product::new("Old title", now);
        local.description = "kept".to_string();
        local.stock = 5;

        let remote = decode_product(json!({"item_id": "R2", "title": "New title", "price": 10})).unwrap();
        let later = now + chrono::Duration::seconds(5);
        remote.apply_to(&mut local, later);

        assert_eq!(local.title, "New title");
        assert_eq!(local.description, "kept");
        assert_eq!(local.stock, 5);
        assert_eq!(local.price_cents, 1000);
        assert_eq!(local.updated_at, later);
    }

    #[test]
    fn test_into_new_uses_defaults() {
        let now = Utc::now();
        let product = decode_product(json!({"item_id": "R1"})).unwrap().into_new(now);
        assert_eq!(product.external_id.as_deref(), Some("R1"));
        assert_eq!(product.title, "");
        assert_eq!(product.price_cents, 0);
        assert_eq!(product.status, ProductStatus::Offline);

        let order = match RemoteRecord::decode(EntityKind::Order, &json!({"order_id": 55})).unwrap() {
            RemoteRecord::Order(o) => o.into_new(now),
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(order.external_id.as_deref(), Some("55"));
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total_cents, 0);
    }

    #[test]
    fn test_order_date_formats() {
        let decode = |date: Value| match RemoteRecord::decode(
            EntityKind::Order,
            &json!({"order_id": "O1", "order_date": date}),
        )
        .unwrap()
        {
            RemoteRecord::Order(o) => o.order_date,
            other => panic!("unexpected {:?}", other),
        };

        assert!(decode(json!("2024-05-01 10:00:00")).is_some());
        assert!(decode(json!("20240501")).is_some());
        assert!(decode(json!(20240501)).is_some());
        assert!(decode(json!("May 1st")).is_none());
        assert!(decode(json!(null)).is_none());
    }

    #[test]
    fn test_unparseable_date_keeps_local_value() {
        let now = Utc::now();
        let original = parse_remote_datetime("20240101");
        let mut local = Order::new(now);
        local.order_date = original;

        if let RemoteRecord::Order(o) =
            RemoteRecord::decode(EntityKind::Order, &json!({"order_id": "O1", "order_date": "??"})).unwrap()
        {
            o.apply_to(&mut local, now);
        }
        assert_eq!(local.order_date, original);
    }

    #[test]
    fn test_category_parent_refs() {
        assert_eq!(decode_category(json!({"category_id": 1, "parent_id": 0})).parent, Some(ParentRef::Root));
        assert_eq!(decode_category(json!({"category_id": 1, "parent_id": ""})).parent, Some(ParentRef::Root));
        assert_eq!(
            decode_category(json!({"category_id": 1, "parent_id": "77"})).parent,
            Some(ParentRef::External("77".to_string()))
        );
        assert_eq!(decode_category(json!({"category_id": 1})).parent, None);
    }

    #[test]
    fn test_category_parent_update() {
        let now = Utc::now();
        let mut local = Category::new("Books", now);
        local.parent_id = Some("p1".to_string());

        let remote = decode_category(json!({"category_id": "C1", "name": "Novels"}));
        remote.apply_to(&mut local, ParentUpdate::Keep, now);
        assert_eq!(local.parent_id.as_deref(), Some("p1"));
        assert_eq!(local.name, "Novels");

        remote.apply_to(&mut local, ParentUpdate::Set("p2".to_string()), now);
        assert_eq!(local.parent_id.as_deref(), Some("p2"));

        remote.apply_to(&mut local, ParentUpdate::Clear, now);
        assert_eq!(local.parent_id, None);
    }

    #[test]
    fn test_extract_page() {
        let payload = json!({"status": "success", "data": {"products": [{"item_id": 1}, {"item_id": 2}]}});
        assert_eq!(extract_page(EntityKind::Product, &payload).len(), 2);
        assert!(extract_page(EntityKind::Order, &payload).is_empty());
        assert!(extract_page(EntityKind::Category, &Value::Null).is_empty());
    }

    #[test]
    fn test_peek_and_created_ids() {
        assert_eq!(
            peek_external_id(EntityKind::Product, &json!({"item_id": 9, "stock": "bad"})),
            Some("9".to_string())
        );
        assert_eq!(peek_external_id(EntityKind::Product, &json!({})), None);

        assert_eq!(
            created_external_id(EntityKind::Product, &json!({"data": {"item_id": 123}})),
            Some("123".to_string())
        );
        assert_eq!(
            created_external_id(EntityKind::Category, &json!({"category_id": "C7"})),
            Some("C7".to_string())
        );
        assert_eq!(created_external_id(EntityKind::Category, &json!({"data": {}})), None);
    }
}
