//! Domain endpoints.
//!
//! These calls pass the envelope's `data` through untouched; the session
//! layer does not interpret streams, products or orders.

use reqwest::{Method, Url};
use serde_json::{json, Value};

use super::pipeline::{PendingRequest, RequestConfig};
use super::{ApiError, SessionClient};

/// Default page size for chat history
const CHAT_PAGE_LIMIT: u32 = 50;

/// Build a path from segments, percent-encoding each one so an id cannot
/// add segments or a query string.
fn endpoint(segments: &[&str]) -> Result<String, ApiError> {
    let mut url = Url::parse("http://localhost/")
        .map_err(|e| ApiError::Validation(format!("Invalid endpoint: {}", e)))?;
    url.path_segments_mut()
        .map_err(|()| ApiError::Validation("Invalid endpoint".to_string()))?
        .clear()
        .extend(segments);
    Ok(url.path().to_string())
}

impl SessionClient {
    async fn get_value(&self, path: &str) -> Result<Value, ApiError> {
        self.call(PendingRequest::new(Method::GET, path)).await
    }

    async fn get_filtered(&self, path: &str, filters: &[(&str, &str)]) -> Result<Value, ApiError> {
        let config = RequestConfig::new().queries(filters.iter().copied());
        self.call(PendingRequest::new(Method::GET, path).with_config(config))
            .await
    }

    async fn send_value(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, ApiError> {
        let mut request = PendingRequest::new(method, path);
        request.body = body;
        self.call(request).await
    }

    // ===== Streams =====

    pub async fn get_streams(&self, filters: &[(&str, &str)]) -> Result<Value, ApiError> {
        self.get_filtered("/streams", filters).await
    }

    pub async fn get_live_streams(&self) -> Result<Value, ApiError> {
        self.get_value("/streams/live").await
    }

    pub async fn get_stream(&self, id: &str) -> Result<Value, ApiError> {
        self.get_value(&endpoint(&["streams", id])?).await
    }

    pub async fn like_stream(&self, id: &str) -> Result<Value, ApiError> {
        self.send_value(Method::POST, &endpoint(&["streams", id, "like"])?, None).await
    }

    pub async fn share_stream(&self, id: &str) -> Result<Value, ApiError> {
        self.send_value(Method::POST, &endpoint(&["streams", id, "share"])?, None).await
    }

    // ===== Videos =====

    pub async fn get_videos(&self, filters: &[(&str, &str)]) -> Result<Value, ApiError> {
        self.get_filtered("/videos", filters).await
    }

    pub async fn get_trending_videos(&self) -> Result<Value, ApiError> {
        self.get_value("/videos/trending").await
    }

    pub async fn get_video(&self, id: &str) -> Result<Value, ApiError> {
        self.get_value(&endpoint(&["videos", id])?).await
    }

    pub async fn like_video(&self, id: &str) -> Result<Value, ApiError> {
        self.send_value(Method::POST, &endpoint(&["videos", id, "like"])?, None).await
    }

    // ===== Products =====

    pub async fn get_products(&self, filters: &[(&str, &str)]) -> Result<Value, ApiError> {
        self.get_filtered("/products", filters).await
    }

    pub async fn get_featured_products(&self) -> Result<Value, ApiError> {
        self.get_value("/products/featured").await
    }

    pub async fn get_product(&self, id: &str) -> Result<Value, ApiError> {
        self.get_value(&endpoint(&["products", id])?).await
    }

    pub async fn search_products(&self, query: &str) -> Result<Value, ApiError> {
        self.get_filtered("/products/search", &[("q", query)]).await
    }

    // ===== Cart =====

    pub async fn get_cart(&self) -> Result<Value, ApiError> {
        self.get_value("/cart").await
    }

    pub async fn add_to_cart(&self, product_id: &str, quantity: u32) -> Result<Value, ApiError> {
        let body = json!({ "productId": product_id, "quantity": quantity });
        self.send_value(Method::POST, "/cart/items", Some(body)).await
    }

    pub async fn update_cart_item(&self, item_id: &str, quantity: u32) -> Result<Value, ApiError> {
        let body = json!({ "quantity": quantity });
        self.send_value(Method::PUT, &endpoint(&["cart", "items", item_id])?, Some(body))
            .await
    }

    pub async fn remove_from_cart(&self, item_id: &str) -> Result<Value, ApiError> {
        self.send_value(Method::DELETE, &endpoint(&["cart", "items", item_id])?, None)
            .await
    }

    pub async fn clear_cart(&self) -> Result<Value, ApiError> {
        self.send_value(Method::DELETE, "/cart", None).await
    }

    // ===== Orders =====

    pub async fn get_orders(&self) -> Result<Value, ApiError> {
        self.get_value("/orders").await
    }

    pub async fn create_order(&self, order: Value) -> Result<Value, ApiError> {
        self.send_value(Method::POST, "/orders", Some(order)).await
    }

    pub async fn get_order(&self, id: &str) -> Result<Value, ApiError> {
        self.get_value(&endpoint(&["orders", id])?).await
    }

    // ===== Chat =====

    pub async fn get_chat_messages(&self, stream_key: &str, page: u32, limit: Option<u32>) -> Result<Value, ApiError> {
        let page = page.max(1).to_string();
        let limit = limit.unwrap_or(CHAT_PAGE_LIMIT).to_string();
        self.get_filtered(
            &endpoint(&["chat", stream_key, "messages"])?,
            &[("page", page.as_str()), ("limit", limit.as_str())],
        )
        .await
    }

    pub async fn send_chat_message(&self, stream_key: &str, message: &str) -> Result<Value, ApiError> {
        let body = json!({ "message": message });
        self.send_value(Method::POST, &endpoint(&["chat", stream_key, "messages"])?, Some(body))
            .await
    }

    // ===== Donations =====

    pub async fn create_donation(&self, stream_key: &str, amount: f64, message: Option<&str>) -> Result<Value, ApiError> {
        let body = json!({ "amount": amount, "message": message });
        self.send_value(Method::POST, &endpoint(&["donations", stream_key])?, Some(body))
            .await
    }

    pub async fn get_donation_stats(&self, stream_key: &str) -> Result<Value, ApiError> {
        self.get_value(&endpoint(&["donations", stream_key, "stats"])?).await
    }

    pub async fn get_donation_goals(&self, stream_key: &str) -> Result<Value, ApiError> {
        self.get_value(&endpoint(&["donations", stream_key, "goals"])?).await
    }

    pub async fn get_donation_tiers(&self) -> Result<Value, ApiError> {
        self.get_value("/donations/tiers").await
    }

    // ===== Notifications =====

    pub async fn get_notifications(&self) -> Result<Value, ApiError> {
        self.get_value("/notifications").await
    }

    pub async fn mark_notification_read(&self, id: &str) -> Result<Value, ApiError> {
        let body = json!({ "notificationIds": [id] });
        self.send_value(Method::PATCH, "/notifications/read", Some(body)).await
    }

    pub async fn get_unread_count(&self) -> Result<Value, ApiError> {
        self.get_value("/notifications/unread-count").await
    }

    // ===== Vendors =====

    pub async fn get_vendors(&self) -> Result<Value, ApiError> {
        self.get_value("/vendors").await
    }

    pub async fn get_vendor(&self, id: &str) -> Result<Value, ApiError> {
        self.get_value(&endpoint(&["vendors", id])?).await
    }

    // ===== Analytics =====

    pub async fn track_event(&self, event: &str, data: Option<Value>) -> Result<Value, ApiError> {
        let body = json!({ "event": event, "data": data });
        self.send_value(Method::POST, "/analytics/track", Some(body)).await
    }
}
