//! Session-local state containers: cart, wishlist, wallet, checkout quote.
//!
//! These are UX caches with no server authority. Prices and stock captured
//! here are never trusted at placement time; the order workflow re-prices
//! every line from the city inventory.

use crate::coupons::AppliedCoupon;
use crate::error::{Error, Result};
use crate::models::GlobalSettings;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: String,
    pub name: String,
    pub quantity: u32,
    pub unit_price: i64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[CartLine] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn subtotal(&self) -> i64 {
        self.items
            .iter()
            .map(|l| l.unit_price * i64::from(l.quantity))
            .sum()
    }

    /// Adding an already-carted product accumulates its quantity.
    pub fn add(&mut self, line: CartLine) {
        if let Some(existing) = self.items.iter_mut().find(|l| l.product_id == line.product_id) {
            existing.quantity += line.quantity;
        } else {
            self.items.push(line);
        }
    }

    /// Quantity 0 removes the line.
    pub fn update_quantity(&mut self, product_id: &str, quantity: u32) -> Result<()> {
        if !self.items.iter().any(|l| l.product_id == product_id) {
            return Err(Error::NotFound(format!("cart item {product_id}")));
        }
        if quantity == 0 {
            self.items.retain(|l| l.product_id != product_id);
        } else if let Some(line) = self.items.iter_mut().find(|l| l.product_id == product_id) {
            line.quantity = quantity;
        }
        Ok(())
    }

    pub fn remove(&mut self, product_id: &str) -> Result<()> {
        let before = self.items.len();
        self.items.retain(|l| l.product_id != product_id);
        if self.items.len() == before {
            return Err(Error::NotFound(format!("cart item {product_id}")));
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Wishlist {
    product_ids: Vec<String>,
}

impl Wishlist {
    pub fn contains(&self, product_id: &str) -> bool {
        self.product_ids.iter().any(|id| id == product_id)
    }

    /// Returns whether the product is wished after the toggle.
    pub fn toggle(&mut self, product_id: &str) -> bool {
        if self.contains(product_id) {
            self.product_ids.retain(|id| id != product_id);
            false
        } else {
            self.product_ids.push(product_id.to_string());
            true
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Wallet {
    balance: i64,
}

impl Wallet {
    pub fn balance(&self) -> i64 {
        self.balance
    }

    pub fn credit(&mut self, amount: i64) {
        self.balance += amount.max(0);
    }

    pub fn debit(&mut self, amount: i64) -> Result<()> {
        if amount > self.balance {
            return Err(Error::Validation(format!(
                "wallet balance {} is below {amount}",
                self.balance
            )));
        }
        self.balance -= amount;
        Ok(())
    }
}

/// Server-computed checkout totals; the client renders this instead of
/// doing its own fee arithmetic.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutQuote {
    pub subtotal: i64,
    pub discount: i64,
    pub delivery_fee: i64,
    pub handling_fee: i64,
    pub platform_fee: i64,
    pub tip: i64,
    pub grand_total: i64,
}

impl CheckoutQuote {
    pub fn compute(
        subtotal: i64,
        settings: &GlobalSettings,
        coupon: Option<&AppliedCoupon>,
        tip: i64,
    ) -> Self {
        let discount = coupon.map(|c| c.discount.min(subtotal)).unwrap_or(0);
        let free_delivery = subtotal >= settings.free_delivery_above
            || coupon.is_some_and(|c| c.waives_delivery());
        let delivery_fee = if free_delivery { 0 } else { settings.delivery_fee };
        let tip = tip.max(0);
        let grand_total = subtotal - discount
            + delivery_fee
            + settings.handling_fee
            + settings.platform_fee
            + tip;
        Self {
            subtotal,
            discount,
            delivery_fee,
            handling_fee: settings.handling_fee,
            platform_fee: settings.platform_fee,
            tip,
            grand_total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CouponKind;

    fn line(id: &str, quantity: u32, unit_price: i64) -> CartLine {
        CartLine {
            product_id: id.into(),
            name: id.into(),
            quantity,
            unit_price,
        }
    }

    #[test]
    fn test_cart_merges_quantities() {
        let mut cart = Cart::new();
        cart.add(line("p1", 2, 50));
        cart.add(line("p1", 1, 50));
        cart.add(line("p2", 1, 30));
        assert_eq!(cart.items().len(), 2);
        assert_eq!(cart.items()[0].quantity, 3);
        assert_eq!(cart.subtotal(), 180);
    }

    #[test]
    fn test_update_quantity_zero_removes() {
        let mut cart = Cart::new();
        cart.add(line("p1", 2, 50));
        cart.update_quantity("p1", 0).unwrap();
        assert!(cart.is_empty());
        assert!(cart.update_quantity("p1", 1).is_err());
    }

    #[test]
    fn test_wishlist_toggle() {
        let mut wl = Wishlist::default();
        assert!(wl.toggle("p1"));
        assert!(wl.contains("p1"));
        assert!(!wl.toggle("p1"));
        assert!(!wl.contains("p1"));
    }

    #[test]
    fn test_wallet_debit_guard() {
        let mut wallet = Wallet::default();
        wallet.credit(100);
        assert!(wallet.debit(150).is_err());
        wallet.debit(60).unwrap();
        assert_eq!(wallet.balance(), 40);
    }

    fn settings() -> GlobalSettings {
        GlobalSettings {
            delivery_fee: 40,
            handling_fee: 5,
            platform_fee: 3,
            free_delivery_above: 499,
            ..GlobalSettings::default()
        }
    }

    #[test]
    fn test_quote_below_threshold_charges_delivery() {
        let q = CheckoutQuote::compute(300, &settings(), None, 0);
        assert_eq!(q.delivery_fee, 40);
        assert_eq!(q.grand_total, 300 + 40 + 5 + 3);
    }

    #[test]
    fn test_quote_free_delivery_at_threshold() {
        let q = CheckoutQuote::compute(499, &settings(), None, 20);
        assert_eq!(q.delivery_fee, 0);
        assert_eq!(q.grand_total, 499 + 5 + 3 + 20);
    }

    #[test]
    fn test_quote_free_shipping_coupon_waives_delivery() {
        let applied = AppliedCoupon {
            code: "FREESHIP".into(),
            kind: CouponKind::FreeShipping,
            discount: 0,
            description: String::new(),
        };
        let q = CheckoutQuote::compute(100, &settings(), Some(&applied), 0);
        assert_eq!(q.delivery_fee, 0);
    }

    #[test]
    fn test_quote_discount_never_exceeds_subtotal() {
        let applied = AppliedCoupon {
            code: "FLAT500".into(),
            kind: CouponKind::Flat,
            discount: 500,
            description: String::new(),
        };
        let q = CheckoutQuote::compute(200, &settings(), Some(&applied), 0);
        assert_eq!(q.discount, 200);
        assert_eq!(q.grand_total, 48); // nothing left of the subtotal, fees still due
    }
}
