//! Order placement and fulfillment workflows.

use crate::cart::CheckoutQuote;
use crate::coupons;
use crate::error::{Error, Result};
use crate::models::{
    Coupon, CustomerInfo, FeeBreakdown, GlobalSettings, Inventory, Order, OrderLine,
    OrderStatus, Product, StatusEntry,
};
use crate::notify::Notifier;
use crate::store::{Document, FileStore};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

#[derive(Clone, Debug)]
pub struct RequestedItem {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Clone, Debug, Default)]
pub struct PlaceOrder {
    pub city_id: String,
    pub items: Vec<RequestedItem>,
    pub customer: Option<CustomerInfo>,
    pub coupon_code: Option<String>,
    pub tip: i64,
}

#[derive(Clone)]
pub struct OrderService {
    store: Arc<FileStore>,
    notifier: Notifier,
}

impl OrderService {
    pub fn new(store: Arc<FileStore>, notifier: Notifier) -> Self {
        Self { store, notifier }
    }

    /// Places an order against a city's inventory bucket.
    ///
    /// Every line is validated against current stock before any stock is
    /// touched, so a shortfall on the last line leaves the bucket exactly
    /// as loaded. Unit prices come from the city inventory, falling back to
    /// the catalog base price where the bucket carries no override; client
    /// prices are never consulted.
    pub async fn place(&self, req: PlaceOrder) -> Result<Order> {
        if req.items.is_empty() {
            return Err(Error::Validation("order has no items".into()));
        }
        if req.items.iter().any(|i| i.quantity == 0) {
            return Err(Error::Validation("item quantity must be at least 1".into()));
        }

        let _guard = self.store.lock_mutations().await;
        let mut inventory: Inventory = self.store.read(Document::Inventory).await?;
        let products: Vec<Product> = self.store.read(Document::Products).await?;
        let bucket = inventory
            .get_mut(&req.city_id)
            .ok_or_else(|| Error::NotFound(format!("city {}", req.city_id)))?;

        // Validation pass: all lines checked before any mutation, with
        // quantities aggregated per product so duplicate lines are held
        // against the stock they share.
        let mut requested: BTreeMap<&str, u32> = BTreeMap::new();
        for item in &req.items {
            *requested.entry(item.product_id.as_str()).or_default() += item.quantity;
        }
        for (&product_id, &quantity) in &requested {
            let available = bucket.get(product_id).map(|e| e.stock).unwrap_or(0);
            if quantity > available {
                let name = products
                    .iter()
                    .find(|p| p.id == product_id)
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| product_id.to_string());
                return Err(Error::InsufficientStock {
                    name,
                    requested: quantity,
                    available,
                });
            }
        }

        // Mutation pass: decrement and snapshot lines.
        let mut lines = Vec::with_capacity(req.items.len());
        let mut total: i64 = 0;
        for item in &req.items {
            let catalog_entry = products.iter().find(|p| p.id == item.product_id);
            let base_price = catalog_entry.map(|p| p.price).unwrap_or(0);
            let name = catalog_entry
                .map(|p| p.name.clone())
                .unwrap_or_else(|| item.product_id.clone());
            let unit_price = match bucket.get_mut(&item.product_id) {
                Some(entry) => {
                    entry.stock -= item.quantity;
                    entry.price.unwrap_or(base_price)
                }
                // validation already rejected any line whose bucket entry
                // is missing, since its available stock is 0
                None => base_price,
            };
            total += unit_price * i64::from(item.quantity);
            lines.push(OrderLine {
                product_id: item.product_id.clone(),
                name,
                quantity: item.quantity,
                unit_price,
            });
        }

        let fees = self.fee_breakdown(total, &req).await?;
        let now = Utc::now();
        let status = OrderStatus::Processing;
        let mut orders: Vec<Order> = self.store.read(Document::Orders).await?;
        let order = Order {
            id: unique_order_id(now, &orders),
            city_id: req.city_id.clone(),
            items: lines,
            total,
            status,
            created_at: now,
            customer: req.customer,
            fees: Some(fees),
            history: vec![StatusEntry { status, at: now }],
        };

        orders.insert(0, order.clone()); // most-recent-first
        self.store.write(Document::Orders, &orders).await?;
        self.store.write(Document::Inventory, &inventory).await?;
        info!(order = %order.id, city = %order.city_id, total = order.total, "order placed");
        Ok(order)
    }

    /// Transitions an order's status.
    ///
    /// Same-status calls succeed without touching the history. Transitions
    /// must move forward along the fulfillment sequence, except cancellation
    /// from any non-terminal state; `force` overrides the table for manual
    /// correction.
    pub async fn transition(&self, order_id: &str, status: OrderStatus, force: bool) -> Result<Order> {
        let _guard = self.store.lock_mutations().await;
        let mut orders: Vec<Order> = self.store.read(Document::Orders).await?;
        let order = orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or_else(|| Error::NotFound(format!("order {order_id}")))?;

        if order.status == status {
            return Ok(order.clone());
        }
        if !force && !allowed_transition(order.status, status) {
            return Err(Error::Validation(format!(
                "cannot move order from {} to {status}",
                order.status
            )));
        }

        order.history.push(StatusEntry {
            status,
            at: Utc::now(),
        });
        order.status = status;
        let snapshot = order.clone();
        self.store.write(Document::Orders, &orders).await?;
        info!(order = %snapshot.id, status = %snapshot.status, "order status changed");
        self.notifier.order_status(&snapshot).await;
        Ok(snapshot)
    }

    pub async fn list(&self) -> Result<Vec<Order>> {
        self.store.read(Document::Orders).await
    }

    pub async fn get(&self, order_id: &str) -> Result<Order> {
        self.list()
            .await?
            .into_iter()
            .find(|o| o.id == order_id)
            .ok_or_else(|| Error::NotFound(format!("order {order_id}")))
    }

    async fn fee_breakdown(&self, subtotal: i64, req: &PlaceOrder) -> Result<FeeBreakdown> {
        let settings: GlobalSettings = self.store.read(Document::Settings).await?;
        let applied = match &req.coupon_code {
            Some(code) => {
                let all: Vec<Coupon> = self.store.read(Document::Coupons).await?;
                Some(coupons::validate(code, subtotal, &all)?)
            }
            None => None,
        };
        let quote = CheckoutQuote::compute(subtotal, &settings, applied.as_ref(), req.tip);
        Ok(FeeBreakdown {
            delivery_fee: quote.delivery_fee,
            handling_fee: quote.handling_fee,
            platform_fee: quote.platform_fee,
            discount: quote.discount,
            tip: quote.tip,
            grand_total: quote.grand_total,
        })
    }
}

/// Timestamp-derived order id, suffixed when two placements share a
/// millisecond.
fn unique_order_id(now: DateTime<Utc>, orders: &[Order]) -> String {
    let base = format!("ORD-{}", now.timestamp_millis());
    if !orders.iter().any(|o| o.id == base) {
        return base;
    }
    let mut seq = 1;
    loop {
        let candidate = format!("{base}-{seq}");
        if !orders.iter().any(|o| o.id == candidate) {
            return candidate;
        }
        seq += 1;
    }
}

fn rank(status: OrderStatus) -> u8 {
    match status {
        OrderStatus::Pending => 0,
        OrderStatus::Processing => 1,
        OrderStatus::Packed => 2,
        OrderStatus::Shipped => 3,
        OrderStatus::OutForDelivery => 4,
        OrderStatus::Delivered => 5,
        OrderStatus::Cancelled => 6,
    }
}

/// Forward moves along the fulfillment sequence, plus cancellation from any
/// non-terminal state. Backward moves need `force`.
fn allowed_transition(from: OrderStatus, to: OrderStatus) -> bool {
    if from.is_terminal() {
        return false;
    }
    if to == OrderStatus::Cancelled {
        return true;
    }
    rank(to) > rank(from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Coupon, CouponKind, InventoryEntry};
    use tempfile::TempDir;

    fn product(id: &str, name: &str, price: i64) -> Product {
        Product {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            price,
            image: None,
            category: "grocery".into(),
            brand: None,
            tags: vec![],
            best_seller: false,
            new_arrival: false,
            stock: None,
        }
    }

    async fn seeded() -> (TempDir, Arc<FileStore>, OrderService) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FileStore::new(dir.path()));

        let products = vec![product("p1", "Amul Butter", 120), product("p2", "Brown Bread", 45)];
        store.write(Document::Products, &products).await.unwrap();

        let mut inventory = Inventory::new();
        let bucket = inventory.entry("pune".to_string()).or_default();
        bucket.insert("p1".into(), InventoryEntry { stock: 10, price: Some(100) });
        bucket.insert("p2".into(), InventoryEntry { stock: 3, price: None });
        store.write(Document::Inventory, &inventory).await.unwrap();

        store
            .write(Document::Settings, &GlobalSettings::default())
            .await
            .unwrap();

        let service = OrderService::new(store.clone(), Notifier::disabled());
        (dir, store, service)
    }

    fn request(city: &str, items: &[(&str, u32)]) -> PlaceOrder {
        PlaceOrder {
            city_id: city.into(),
            items: items
                .iter()
                .map(|(id, q)| RequestedItem {
                    product_id: id.to_string(),
                    quantity: *q,
                })
                .collect(),
            ..PlaceOrder::default()
        }
    }

    #[tokio::test]
    async fn test_successful_order_decrements_and_totals() {
        let (_dir, store, service) = seeded().await;
        let order = service.place(request("pune", &[("p1", 2)])).await.unwrap();

        // city price 100 beats the catalog base price 120
        assert_eq!(order.total, 200);
        assert_eq!(order.status, OrderStatus::Processing);
        assert_eq!(order.history.len(), 1);
        assert!(order.id.starts_with("ORD-"));

        let inventory: Inventory = store.read(Document::Inventory).await.unwrap();
        assert_eq!(inventory["pune"]["p1"].stock, 8);

        let orders: Vec<Order> = store.read(Document::Orders).await.unwrap();
        assert_eq!(orders[0].id, order.id);
    }

    #[tokio::test]
    async fn test_base_price_fallback_without_city_override() {
        let (_dir, _store, service) = seeded().await;
        let order = service.place(request("pune", &[("p2", 3)])).await.unwrap();
        assert_eq!(order.total, 3 * 45);
        assert_eq!(order.items[0].name, "Brown Bread");
    }

    #[tokio::test]
    async fn test_shortfall_rejects_and_leaves_inventory_untouched() {
        let (_dir, store, service) = seeded().await;
        let before = std::fs::read(store.path(Document::Inventory)).unwrap();

        let err = service
            .place(request("pune", &[("p1", 5), ("p2", 4)]))
            .await
            .unwrap_err();
        match err {
            Error::InsufficientStock { name, requested, available } => {
                assert_eq!(name, "Brown Bread");
                assert_eq!((requested, available), (4, 3));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let after = std::fs::read(store.path(Document::Inventory)).unwrap();
        assert_eq!(before, after, "inventory document must be unchanged");
        let orders: Vec<Order> = store.read(Document::Orders).await.unwrap();
        assert!(orders.is_empty());
    }

    #[tokio::test]
    async fn test_single_line_shortfall_keeps_stock() {
        let (_dir, store, service) = seeded().await;
        // stock for p2 is 3; ask for 5
        let result = service.place(request("pune", &[("p2", 5)])).await;
        assert!(result.is_err());
        let inventory: Inventory = store.read(Document::Inventory).await.unwrap();
        assert_eq!(inventory["pune"]["p2"].stock, 3);
    }

    #[tokio::test]
    async fn test_duplicate_lines_share_available_stock() {
        let (_dir, store, service) = seeded().await;
        let before = std::fs::read(store.path(Document::Inventory)).unwrap();

        // each line alone fits within p2's stock of 3; together they do not
        let err = service
            .place(request("pune", &[("p2", 2), ("p2", 2)]))
            .await
            .unwrap_err();
        match err {
            Error::InsufficientStock { name, requested, available } => {
                assert_eq!(name, "Brown Bread");
                assert_eq!((requested, available), (4, 3));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let after = std::fs::read(store.path(Document::Inventory)).unwrap();
        assert_eq!(before, after, "inventory document must be unchanged");
    }

    #[tokio::test]
    async fn test_duplicate_lines_within_stock_decrement_once_each() {
        let (_dir, store, service) = seeded().await;
        let order = service
            .place(request("pune", &[("p1", 4), ("p1", 4)]))
            .await
            .unwrap();
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.total, 8 * 100);

        let inventory: Inventory = store.read(Document::Inventory).await.unwrap();
        assert_eq!(inventory["pune"]["p1"].stock, 2);
    }

    #[tokio::test]
    async fn test_unknown_city_rejected() {
        let (_dir, _store, service) = seeded().await;
        assert!(matches!(
            service.place(request("indore", &[("p1", 1)])).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_or_zero_quantity_rejected() {
        let (_dir, _store, service) = seeded().await;
        assert!(matches!(
            service.place(request("pune", &[])).await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            service.place(request("pune", &[("p1", 0)])).await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_product_has_zero_stock() {
        let (_dir, _store, service) = seeded().await;
        let err = service.place(request("pune", &[("ghost", 1)])).await.unwrap_err();
        match err {
            Error::InsufficientStock { available, .. } => assert_eq!(available, 0),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_coupon_and_tip_recorded_in_fees() {
        let (_dir, store, service) = seeded().await;
        let coupons = vec![Coupon {
            code: "SAVE10".into(),
            kind: CouponKind::Percentage,
            value: 10,
            max_discount: Some(50),
            min_order_value: 100,
            description: String::new(),
        }];
        store.write(Document::Coupons, &coupons).await.unwrap();

        let mut req = request("pune", &[("p1", 10)]); // subtotal 1000
        req.coupon_code = Some("save10".into());
        req.tip = 30;
        let order = service.place(req).await.unwrap();
        let fees = order.fees.unwrap();
        assert_eq!(fees.discount, 50);
        assert_eq!(fees.tip, 30);
        assert_eq!(fees.delivery_fee, 0); // above the free-delivery threshold
        assert_eq!(fees.grand_total, 1000 - 50 + 5 + 3 + 30);
    }

    #[tokio::test]
    async fn test_transition_appends_history() {
        let (_dir, _store, service) = seeded().await;
        let order = service.place(request("pune", &[("p1", 1)])).await.unwrap();

        let order = service
            .transition(&order.id, OrderStatus::Packed, false)
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Packed);
        assert_eq!(order.history.len(), 2);
        assert_eq!(order.history[1].status, OrderStatus::Packed);
    }

    #[tokio::test]
    async fn test_same_status_transition_is_noop() {
        let (_dir, _store, service) = seeded().await;
        let placed = service.place(request("pune", &[("p1", 1)])).await.unwrap();
        let after = service
            .transition(&placed.id, OrderStatus::Processing, false)
            .await
            .unwrap();
        assert_eq!(after.history.len(), placed.history.len());
    }

    #[tokio::test]
    async fn test_backward_transition_needs_force() {
        let (_dir, _store, service) = seeded().await;
        let order = service.place(request("pune", &[("p1", 1)])).await.unwrap();
        service.transition(&order.id, OrderStatus::Shipped, false).await.unwrap();

        let err = service
            .transition(&order.id, OrderStatus::Packed, false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let forced = service
            .transition(&order.id, OrderStatus::Packed, true)
            .await
            .unwrap();
        assert_eq!(forced.status, OrderStatus::Packed);
        assert_eq!(forced.history.len(), 3);
    }

    #[tokio::test]
    async fn test_cancel_from_non_terminal_only() {
        let (_dir, _store, service) = seeded().await;
        let order = service.place(request("pune", &[("p1", 1)])).await.unwrap();
        service.transition(&order.id, OrderStatus::Delivered, false).await.unwrap();

        let err = service
            .transition(&order.id, OrderStatus::Cancelled, false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_history_never_shrinks() {
        let (_dir, _store, service) = seeded().await;
        let order = service.place(request("pune", &[("p1", 1)])).await.unwrap();
        let mut last_len = order.history.len();
        let steps = [
            (OrderStatus::Processing, false), // no-op
            (OrderStatus::Packed, false),
            (OrderStatus::Packed, false), // no-op
            (OrderStatus::OutForDelivery, false),
            (OrderStatus::Shipped, true), // forced backward
            (OrderStatus::Delivered, false),
        ];
        for (status, force) in steps {
            let o = service.transition(&order.id, status, force).await.unwrap();
            assert!(o.history.len() >= last_len);
            last_len = o.history.len();
        }
    }

    #[test]
    fn test_order_ids_stay_unique_within_a_millisecond() {
        let now = Utc::now();
        let base = format!("ORD-{}", now.timestamp_millis());
        let mut orders = vec![];
        assert_eq!(unique_order_id(now, &orders), base);

        let existing = Order {
            id: base.clone(),
            city_id: "pune".into(),
            items: vec![],
            total: 0,
            status: OrderStatus::Processing,
            created_at: now,
            customer: None,
            fees: None,
            history: vec![],
        };
        orders.push(existing.clone());
        assert_eq!(unique_order_id(now, &orders), format!("{base}-1"));

        orders.push(Order { id: format!("{base}-1"), ..existing });
        assert_eq!(unique_order_id(now, &orders), format!("{base}-2"));
    }

    #[test]
    fn test_allowed_transition_table() {
        use OrderStatus::*;
        assert!(allowed_transition(Pending, Processing));
        assert!(allowed_transition(Processing, Delivered));
        assert!(allowed_transition(OutForDelivery, Cancelled));
        assert!(!allowed_transition(Delivered, Cancelled));
        assert!(!allowed_transition(Cancelled, Pending));
        assert!(!allowed_transition(Shipped, Packed));
    }
}
