//! Persisted record types.
//!
//! Every entity lives in its own flat JSON document (see [`crate::store`]).
//! Field names are camelCase on the wire and on disk. Money values are
//! non-negative integers in the smallest display unit of the store currency.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Catalog base price; per-city inventory may override it.
    pub price: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub category: String,
    /// Derived from the brand registry, not admin input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub best_seller: bool,
    #[serde(default)]
    pub new_arrival: bool,
    /// Resolved per-city stock when listed for a city; otherwise the
    /// optional catalog-level override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock: Option<u32>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct InventoryEntry {
    pub stock: u32,
    /// City-specific price; absent means "use the catalog base price".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<i64>,
}

/// cityId -> productId -> {stock, price}. BTreeMap keeps the persisted
/// document stable across rewrites.
pub type Inventory = BTreeMap<String, BTreeMap<String, InventoryEntry>>;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct City {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub pincodes: Vec<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    pub lat: f64,
    pub lng: f64,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreEvent {
    pub id: String,
    pub name: String,
    /// Empty means the event runs in every city.
    #[serde(default)]
    pub city_ids: Vec<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
}

impl StoreEvent {
    pub fn is_active(&self, city_id: &str, now: DateTime<Utc>) -> bool {
        let in_window = self.starts_at <= now && now <= self.ends_at;
        let in_city = self.city_ids.is_empty() || self.city_ids.iter().any(|c| c == city_id);
        in_window && in_city
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatus {
    Pending,
    Processing,
    Packed,
    Shipped,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Packed => "packed",
            OrderStatus::Shipped => "shipped",
            OrderStatus::OutForDelivery => "out-for-delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: String,
    pub name: String,
    pub quantity: u32,
    /// Unit price captured at order time, deliberately decoupled from the
    /// live catalog price.
    pub unit_price: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEntry {
    pub status: OrderStatus,
    pub at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pincode: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeBreakdown {
    pub delivery_fee: i64,
    pub handling_fee: i64,
    pub platform_fee: i64,
    pub discount: i64,
    pub tip: i64,
    pub grand_total: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub city_id: String,
    pub items: Vec<OrderLine>,
    /// Sum of unit price x quantity over the lines; fees live in `fees`.
    pub total: i64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<CustomerInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fees: Option<FeeBreakdown>,
    /// Append-only audit trail of status transitions.
    #[serde(default)]
    pub history: Vec<StatusEntry>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CouponKind {
    Flat,
    Percentage,
    FreeShipping,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    /// Unique, matched case-insensitively.
    pub code: String,
    pub kind: CouponKind,
    pub value: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_discount: Option<i64>,
    #[serde(default)]
    pub min_order_value: i64,
    #[serde(default)]
    pub description: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSettings {
    pub store_name: String,
    pub support_email: String,
    pub currency_symbol: String,
    pub delivery_fee: i64,
    pub handling_fee: i64,
    pub platform_fee: i64,
    /// Order subtotals at or above this waive the delivery fee.
    pub free_delivery_above: i64,
    /// Plaintext, compared directly by the admin guard. Not production-grade.
    pub admin_password: String,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            store_name: "CityCart".into(),
            support_email: "support@citycart.example".into(),
            currency_symbol: "₹".into(),
            delivery_fee: 40,
            handling_fee: 5,
            platform_fee: 3,
            free_delivery_above: 499,
            admin_password: "admin123".into(),
        }
    }
}
