// ===============================
// src/domain.rs
// ===============================
use ahash::AHashMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Products and orders are full snapshots fetched fresh each run. `code` is the
// only cross-side join key; `_id` values belong to one account's identifier
// space and are stripped before a snapshot is re-submitted as a payload.

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(rename = "_id", default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub active: bool,
    #[serde(rename = "bodyHtml", default)]
    pub body_html: String,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub vendor: String,
    #[serde(default)]
    pub variants: Vec<Variant>,
    #[serde(default)]
    pub options: Vec<ProductOption>,
    #[serde(rename = "delistedUpdated", default)]
    pub delisted_updated: Option<DateTime<Utc>>,
    // Server-owned timestamps, never written by this process.
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
    #[serde(rename = "companyObjectId", default)]
    pub company_object_id: String,
    #[serde(rename = "type", default)]
    pub product_type: String,
    #[serde(rename = "companyId", default)]
    pub company_id: String,
    #[serde(default)]
    pub attributes: AHashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Image {
    #[serde(rename = "_id", default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub src: String,
    #[serde(default)]
    pub position: i64,
    #[serde(rename = "variantIds", default)]
    pub variant_ids: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    #[serde(default)]
    pub length: i64,
    #[serde(default)]
    pub width: i64,
    #[serde(default)]
    pub height: i64,
    #[serde(default)]
    pub units: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    #[serde(rename = "_id", default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "retailPrice", default)]
    pub retail_price: f64,
    #[serde(rename = "inventory_quantity", default)]
    pub inventory_quantity: i64,
    #[serde(rename = "skipCount", default)]
    pub skip_count: bool,
    #[serde(default)]
    pub weight: i64,
    #[serde(rename = "weightUnits", default)]
    pub weight_units: String,
    #[serde(default)]
    pub dimensions: Dimensions,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub barcode: String,
    #[serde(rename = "barcodeType", default)]
    pub barcode_type: String,
    #[serde(default)]
    pub code: String,
    // Numeric reference shared by both sides, unlike `_id`.
    #[serde(rename = "id", default)]
    pub variant_ref: i64,
    #[serde(default)]
    pub option1: String,
    #[serde(default)]
    pub option2: String,
    #[serde(default)]
    pub option3: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductOption {
    #[serde(rename = "_id", default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub position: i64,
    #[serde(rename = "type", default)]
    pub option_type: String,
}

/// Partial-update payload: only populated fields are transmitted.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProductUpdateBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(rename = "bodyHtml", skip_serializing_if = "Option::is_none")]
    pub body_html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variants: Option<Vec<Variant>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<Image>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<ProductOption>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<AHashMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "addressOne", default)]
    pub address_one: String,
    #[serde(rename = "addressTwo", default)]
    pub address_two: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub zip: String,
    #[serde(default)]
    pub company: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Order {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "sellerOrderCode", default)]
    pub seller_order_code: String,
    #[serde(rename = "buyerOrderCode", default)]
    pub buyer_order_code: String,
    #[serde(default)]
    pub currency: String,
    #[serde(rename = "shippingAddress", default)]
    pub shipping_address: Address,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub posted: bool,
    #[serde(rename = "postedDate", default)]
    pub posted_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub shipped: bool,
    #[serde(rename = "shippedDate", default)]
    pub shipped_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub billed: bool,
    #[serde(rename = "billedDate", default)]
    pub billed_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fulfillments: Vec<Fulfillment>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderItem {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "variantId", default)]
    pub variant_id: String,
    #[serde(default)]
    pub barcode: String,
    #[serde(rename = "barcodeType", default)]
    pub barcode_type: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub cancelled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fulfillment {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub carrier: String,
    #[serde(rename = "trackingCode", default)]
    pub tracking_code: String,
    #[serde(rename = "trackingUrls", default)]
    pub tracking_urls: Vec<String>,
    #[serde(default)]
    pub items: Vec<FulfillmentItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FulfillmentItem {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "orderItemId", default)]
    pub order_item_id: String,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub quantity: i64,
}

/// Creation payload for the buyer side of an order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuyerOrder {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "buyerReference", default)]
    pub buyer_reference: String,
    #[serde(rename = "orderedDate", default)]
    pub ordered_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub address: Address,
    #[serde(default)]
    pub items: Vec<BuyerItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuyerItem {
    #[serde(rename = "variantId", default)]
    pub variant_id: String,
    #[serde(rename = "buyerReference", default)]
    pub buyer_reference: String,
    #[serde(default)]
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewFulfillmentRequestBody {
    pub carrier: String,
    #[serde(rename = "trackingCode")]
    pub tracking_code: String,
    #[serde(rename = "trackingUrls")]
    pub tracking_urls: Vec<String>,
    pub items: Vec<NewFulfillmentItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewFulfillmentItem {
    pub id: i32,
    pub sku: String,
    pub quantity: i64,
}

/// Sync events recorded to the optional JSONL audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    ProductCreated { code: String, seller_id: String },
    ProductUpdated { code: String, seller_id: String },
    OrderCreated { seller_order_id: String, buyer_order_id: String },
    FulfillmentCreated { order_id: String, carrier: String, tracking_code: String },
    Alert { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_body_omits_unset_fields() {
        let body = ProductUpdateBody {
            active: Some(false),
            ..Default::default()
        };
        assert_eq!(serde_json::to_string(&body).unwrap(), r#"{"active":false}"#);
    }

    #[test]
    fn stripped_ids_are_not_serialized() {
        let image = Image {
            id: String::new(),
            src: "https://cdn.example.com/a.jpg".into(),
            position: 1,
            variant_ids: vec![],
        };
        let json = serde_json::to_value(&image).unwrap();
        assert!(json.get("_id").is_none());
    }
}
