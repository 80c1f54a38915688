//! # Ruten Partner API Client
//!
//! One method per partner operation. Each method shapes its path, query and
//! body, then delegates to the [`Transport`].
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  RutenClient                                                            │
//! │                                                                         │
//! │  products    list · get · create · stock · price · online · offline    │
//! │              upload images (multipart)                                  │
//! │  orders      list · detail · ship · cancel · refund                    │
//! │  categories  list · create · update · delete                           │
//! │                                                                         │
//! │        │  path + QueryParams + JSON body                               │
//! │        ▼                                                                │
//! │  Transport ── SignedRequest ── reqwest ── CallRecord → sink            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The client is `Send + Sync`; share it behind an `Arc`.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::config::RemoteSettings;
use crate::error::{ClientError, ClientResult};
use crate::sink::ObservabilitySink;
use crate::transport::Transport;
use ruten_core::signer::{Method, QueryParams};
use ruten_core::{Credential, Money};

// =============================================================================
// Paths
// =============================================================================

pub const PATH_PRODUCT_LIST: &str = "/api/v1/product/list";
pub const PATH_PRODUCT_ITEM: &str = "/api/v1/product/item";
pub const PATH_PRODUCT_STOCK: &str = "/api/v1/product/item/stock";
pub const PATH_PRODUCT_PRICE: &str = "/api/v1/product/item/price";
pub const PATH_PRODUCT_ONLINE: &str = "/api/v1/product/item/online";
pub const PATH_PRODUCT_OFFLINE: &str = "/api/v1/product/item/offline";
pub const PATH_PRODUCT_IMAGE: &str = "/api/v1/product/item/image";
pub const PATH_ORDER_LIST: &str = "/api/v1/order/list";
pub const PATH_ORDER_DETAIL: &str = "/api/v1/order/detail";
pub const PATH_ORDER_SHIP: &str = "/api/v1/order/ship";
pub const PATH_ORDER_CANCEL: &str = "/api/v1/order/canceluse";
pub const PATH_ORDER_REFUND: &str = "/api/v1/order/refund";
pub const PATH_CATEGORY_LIST: &str = "/api/v1/product/store_class/list";
pub const PATH_CATEGORY: &str = "/api/v1/product/store_class";

// =============================================================================
// Request Shapes
// =============================================================================

/// Fields sent when listing a new product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewListing {
    pub title: String,
    pub description: String,
    pub price: Money,
    pub stock: i64,
}

/// Parameters of an order listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderListQuery {
    /// Remote status filter; `All` when unset.
    pub order_status: String,
    pub page: u32,
    pub page_size: u32,
    /// `YYYYMMDD`.
    pub start_date: Option<String>,
    /// `YYYYMMDD`.
    pub end_date: Option<String>,
}

impl Default for OrderListQuery {
    fn default() -> Self {
        OrderListQuery {
            order_status: "All".to_string(),
            page: 1,
            page_size: ruten_core::DEFAULT_PAGE_SIZE,
            start_date: None,
            end_date: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Shipment {
    pub shipping_method: String,
    pub tracking_number: String,
    pub shipping_note: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refund {
    pub amount: Money,
    pub reason: String,
    pub note: String,
}

// =============================================================================
// Client
// =============================================================================

/// Typed facade over the partner API.
pub struct RutenClient {
    transport: Transport,
}

impl RutenClient {
    /// Builds a client for `credential` against `settings.base_url`.
    pub fn new(
        credential: Credential,
        settings: &RemoteSettings,
        sink: Arc<dyn ObservabilitySink>,
    ) -> ClientResult<Self> {
        Ok(RutenClient {
            transport: Transport::new(credential, settings, sink)?,
        })
    }

    pub fn credential(&self) -> &Credential {
        self.transport.credential()
    }

    // =========================================================================
    // Products
    // =========================================================================

    pub async fn list_products(&self, page: u32, page_size: u32) -> ClientResult<Value> {
        let query = QueryParams::new()
            .push("page", page)
            .push("page_size", page_size);
        self.transport
            .send(Method::Get, PATH_PRODUCT_LIST, &query, None)
            .await
    }

    /// Fetches one product. The id is percent-encoded into the path.
    pub async fn get_product(&self, item_id: &str) -> ClientResult<Value> {
        let path = format!("{}/{}", PATH_PRODUCT_ITEM, urlencoding::encode(item_id));
        self.get(&path).await
    }

    pub async fn create_product(&self, listing: &NewListing) -> ClientResult<Value> {
        let body = json!({
            "title": listing.title,
            "description": listing.description,
            "price": listing.price.to_wire(),
            "stock": listing.stock,
        });
        self.write(Method::Post, PATH_PRODUCT_ITEM, body).await
    }

    pub async fn update_product_stock(&self, item_id: &str, stock: i64) -> ClientResult<Value> {
        let body = json!({ "item_id": item_id, "stock": stock });
        self.write(Method::Put, PATH_PRODUCT_STOCK, body).await
    }

    pub async fn update_product_price(&self, item_id: &str, price: Money) -> ClientResult<Value> {
        let body = json!({ "item_id": item_id, "price": price.to_wire() });
        self.write(Method::Put, PATH_PRODUCT_PRICE, body).await
    }

    pub async fn set_product_online(&self, item_id: &str) -> ClientResult<Value> {
        self.write(Method::Put, PATH_PRODUCT_ONLINE, json!({ "item_id": item_id }))
            .await
    }

    pub async fn set_product_offline(&self, item_id: &str) -> ClientResult<Value> {
        self.write(Method::Put, PATH_PRODUCT_OFFLINE, json!({ "item_id": item_id }))
            .await
    }

    /// Uploads images for a listing in one multipart request.
    ///
    /// Fails with [`ClientError::MissingFile`] before any network traffic if
    /// a file does not exist.
    pub async fn upload_product_images(
        &self,
        item_id: &str,
        files: &[PathBuf],
    ) -> ClientResult<Value> {
        if files.is_empty() {
            return Err(ClientError::InvalidRequest(
                "at least one image is required".to_string(),
            ));
        }
        self.transport
            .send_multipart(
                PATH_PRODUCT_IMAGE,
                &[("item_id", item_id.to_string())],
                "images",
                files,
            )
            .await
    }

    // =========================================================================
    // Orders
    // =========================================================================

    pub async fn list_orders(&self, params: &OrderListQuery) -> ClientResult<Value> {
        let query = QueryParams::new()
            .push("order_status", &params.order_status)
            .push("page", params.page)
            .push("page_size", params.page_size)
            .push_opt("start_date", params.start_date.as_ref())
            .push_opt("end_date", params.end_date.as_ref());
        self.transport
            .send(Method::Get, PATH_ORDER_LIST, &query, None)
            .await
    }

    pub async fn get_order_detail(&self, order_ids: &[String]) -> ClientResult<Value> {
        if order_ids.is_empty() {
            return Err(ClientError::InvalidRequest(
                "order_ids must not be empty".to_string(),
            ));
        }
        self.write(Method::Post, PATH_ORDER_DETAIL, json!({ "order_ids": order_ids }))
            .await
    }

    pub async fn ship_order(&self, order_id: &str, shipment: &Shipment) -> ClientResult<Value> {
        let body = json!({
            "order_id": order_id,
            "shipping_method": shipment.shipping_method,
            "tracking_number": shipment.tracking_number,
            "shipping_note": shipment.shipping_note,
        });
        self.write(Method::Post, PATH_ORDER_SHIP, body).await
    }

    pub async fn cancel_order(&self, order_id: &str, reason: &str) -> ClientResult<Value> {
        let body = json!({ "order_id": order_id, "reason": reason });
        self.write(Method::Post, PATH_ORDER_CANCEL, body).await
    }

    pub async fn refund_order(&self, order_id: &str, refund: &Refund) -> ClientResult<Value> {
        let body = json!({
            "order_id": order_id,
            "refund_amount": refund.amount.to_wire(),
            "refund_reason": refund.reason,
            "refund_note": refund.note,
        });
        self.write(Method::Post, PATH_ORDER_REFUND, body).await
    }

    // =========================================================================
    // Categories
    // =========================================================================

    pub async fn list_categories(&self) -> ClientResult<Value> {
        self.get(PATH_CATEGORY_LIST).await
    }

    /// `parent_id` is the marketplace id of the parent, `None` for a root.
    pub async fn create_category(
        &self,
        name: &str,
        parent_id: Option<&str>,
    ) -> ClientResult<Value> {
        let body = json!({ "name": name, "parent_id": parent_id });
        self.write(Method::Post, PATH_CATEGORY, body).await
    }

    pub async fn update_category(
        &self,
        category_id: &str,
        name: &str,
        parent_id: Option<&str>,
    ) -> ClientResult<Value> {
        let body = json!({
            "category_id": category_id,
            "name": name,
            "parent_id": parent_id,
        });
        self.write(Method::Put, PATH_CATEGORY, body).await
    }

    /// The DELETE carries its JSON body, and that body is signed.
    pub async fn delete_category(&self, category_id: &str) -> ClientResult<Value> {
        self.write(Method::Delete, PATH_CATEGORY, json!({ "category_id": category_id }))
            .await
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn get(&self, path: &str) -> ClientResult<Value> {
        self.transport
            .send(Method::Get, path, &QueryParams::new(), None)
            .await
    }

    async fn write(&self, method: Method, path: &str, body: Value) -> ClientResult<Value> {
        self.transport
            .send(method, path, &QueryParams::new(), Some(&body))
            .await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use std::io::Write;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client(server: &MockServer) -> RutenClient {
        let cred = Credential::new("identity-key", "signing-secret", "salty").unwrap();
        RutenClient::new(
            cred,
            &RemoteSettings::with_base_url(server.uri()),
            Arc::new(MemorySink::new()),
        )
        .unwrap()
    }

    fn ok() -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({"status": "success"}))
    }

    #[tokio::test]
    async fn test_list_orders_defaults_and_dates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(PATH_ORDER_LIST))
            .and(query_param("order_status", "All"))
            .and(query_param("start_date", "20240101"))
            .respond_with(ok())
            .expect(1)
            .mount(&server)
            .await;

        let c = client(&server).await;
        c.list_orders(&OrderListQuery {
            start_date: Some("20240101".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(
            requests[0].url.query(),
            Some("order_status=All&page=1&page_size=30&start_date=20240101")
        );
    }

    #[tokio::test]
    async fn test_get_product_encodes_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/product/item/A%2FB%201"))
            .respond_with(ok())
            .expect(1)
            .mount(&server)
            .await;

        client(&server).await.get_product("A/B 1").await.unwrap();
    }

    #[tokio::test]
    async fn test_bodyless_get_sends_json_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(PATH_CATEGORY_LIST))
            .and(header("content-type", "application/json"))
            .respond_with(ok())
            .expect(1)
            .mount(&server)
            .await;

        client(&server).await.list_categories().await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert!(requests[0].body.is_empty());
    }

    #[tokio::test]
    async fn test_price_is_sent_as_number() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path(PATH_PRODUCT_PRICE))
            .and(body_json(json!({"item_id": "A1", "price": 199.5})))
            .respond_with(ok())
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .await
            .update_product_price("A1", Money::from_cents(19950))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_category_sends_body() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(PATH_CATEGORY))
            .and(body_json(json!({"category_id": "77"})))
            .respond_with(ok())
            .expect(1)
            .mount(&server)
            .await;

        client(&server).await.delete_category("77").await.unwrap();
    }

    #[tokio::test]
    async fn test_refund_body_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(PATH_ORDER_REFUND))
            .and(body_json(json!({
                "order_id": "O-1",
                "refund_amount": 500,
                "refund_reason": "Customer request",
                "refund_note": ""
            })))
            .respond_with(ok())
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .await
            .refund_order(
                "O-1",
                &Refund {
                    amount: Money::from_cents(50000),
                    reason: "Customer request".to_string(),
                    note: String::new(),
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_upload_images_multipart() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(PATH_PRODUCT_IMAGE))
            .respond_with(ok())
            .expect(1)
            .mount(&server)
            .await;

        let mut a = tempfile::NamedTempFile::new().unwrap();
        a.write_all(b"first-image").unwrap();
        let mut b = tempfile::NamedTempFile::new().unwrap();
        b.write_all(b"second-image").unwrap();

        client(&server)
            .await
            .upload_product_images("A1", &[a.path().to_path_buf(), b.path().to_path_buf()])
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let content_type = requests[0].headers["content-type"].to_str().unwrap().to_string();
        assert!(content_type.starts_with("multipart/form-data"));
        let body = String::from_utf8_lossy(&requests[0].body);
        assert_eq!(body.matches("name=\"images\"").count(), 2);
        assert!(body.contains("name=\"item_id\""));
        assert!(body.contains("first-image"));
    }

    #[tokio::test]
    async fn test_empty_inputs_rejected_locally() {
        let server = MockServer::start().await;
        let c = client(&server).await;

        assert!(matches!(
            c.upload_product_images("A1", &[]).await,
            Err(ClientError::InvalidRequest(_))
        ));
        assert!(matches!(
            c.get_order_detail(&[]).await,
            Err(ClientError::InvalidRequest(_))
        ));
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
