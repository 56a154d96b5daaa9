//! Coupon lookup and discount arithmetic.

use crate::error::{Error, Result};
use crate::models::{Coupon, CouponKind};
use serde::Serialize;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedCoupon {
    pub code: String,
    pub kind: CouponKind,
    pub discount: i64,
    pub description: String,
}

impl AppliedCoupon {
    pub fn waives_delivery(&self) -> bool {
        self.kind == CouponKind::FreeShipping
    }
}

/// Case-insensitive lookup plus discount computation against a subtotal.
///
/// A free-shipping coupon reports a discount of 0; the delivery waiver is
/// applied by the checkout quote, not here.
pub fn validate(code: &str, subtotal: i64, coupons: &[Coupon]) -> Result<AppliedCoupon> {
    let coupon = coupons
        .iter()
        .find(|c| c.code.eq_ignore_ascii_case(code))
        .ok_or_else(|| Error::Validation(format!("invalid coupon code: {code}")))?;
    if subtotal < coupon.min_order_value {
        return Err(Error::Validation(format!(
            "coupon {} needs a minimum order of {}",
            coupon.code, coupon.min_order_value
        )));
    }
    let discount = match coupon.kind {
        CouponKind::Flat => coupon.value,
        CouponKind::Percentage => {
            // integer division floors, matching the persisted money unit
            let raw = subtotal * coupon.value / 100;
            match coupon.max_discount {
                Some(cap) => raw.min(cap),
                None => raw,
            }
        }
        CouponKind::FreeShipping => 0,
    };
    Ok(AppliedCoupon {
        code: coupon.code.clone(),
        kind: coupon.kind,
        discount,
        description: coupon.description.clone(),
    })
}
