//! Cart model: ownership, lines and the wholesale pricing rule.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::catalog::{PricingMode, Product, Variant};
use crate::error::{Error, Result};

/// Aggregate cart quantity at which every line is priced wholesale.
pub const WHOLESALE_THRESHOLD: u32 = 6;

/// Exactly one owner per cart: an authenticated customer or an anonymous
/// session key, never both.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CartOwner {
    Customer { id: Uuid },
    Guest { session_key: String },
}

impl CartOwner {
    /// Rebuilds the owner from the two nullable storage columns. The schema
    /// CHECK constraint keeps exactly one populated; a row violating that is
    /// surfaced as corruption, not silently repaired.
    pub fn from_columns(customer_id: Option<Uuid>, session_key: Option<String>) -> Result<Self> {
        match (customer_id, session_key) {
            (Some(id), None) => Ok(Self::Customer { id }),
            (None, Some(session_key)) => Ok(Self::Guest { session_key }),
            _ => Err(Error::InvalidRequest(
                "cart has no single owner".to_string(),
            )),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Cart {
    pub id: Uuid,
    pub owner: CartOwner,
    /// Informational only; authoritative emptiness is the line count.
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct CartLine {
    pub id: Uuid,
    pub cart_id: Uuid,
    pub variant_id: Uuid,
    pub size: String,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

/// A cart line resolved against the catalog with its price frozen for
/// checkout.
#[derive(Clone, Debug, Serialize)]
pub struct PricedLine {
    pub variant_id: Uuid,
    pub size: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl PricedLine {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

pub fn pricing_mode_for(total_quantity: u32) -> PricingMode {
    if total_quantity >= WHOLESALE_THRESHOLD {
        PricingMode::Wholesale
    } else {
        PricingMode::Retail
    }
}

/// Prices every line under the mode selected by the aggregate-quantity rule
/// and returns the lines together with the cart total.
pub fn price_lines(lines: &[(CartLine, Variant, Product)]) -> (PricingMode, Vec<PricedLine>, Decimal) {
    let total_quantity: u32 = lines.iter().map(|(l, _, _)| l.quantity.max(0) as u32).sum();
    let mode = pricing_mode_for(total_quantity);
    let priced: Vec<PricedLine> = lines
        .iter()
        .map(|(line, variant, product)| PricedLine {
            variant_id: variant.id,
            size: line.size.clone(),
            quantity: line.quantity.max(0) as u32,
            unit_price: variant.unit_price(product, mode),
        })
        .collect();
    let total = priced.iter().map(PricedLine::line_total).sum();
    (mode, priced, total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::SizeStock;
    use serde_json::json;

    fn catalog_pair(retail: i64, wholesale: i64) -> (Variant, Product) {
        let product = Product {
            id: Uuid::now_v7(),
            name: "Boot".to_string(),
            slug: "boot".to_string(),
            description: None,
            brand: None,
            gender: None,
            category: None,
            price: Decimal::new(retail, 0),
            wholesale_price: Decimal::new(wholesale, 0),
            on_offer: false,
            status: "active".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let variant = Variant {
            id: Uuid::now_v7(),
            product_id: product.id,
            color: "Negro".to_string(),
            sizes_stock: sqlx::types::Json(SizeStock::from_value(&json!({"38": 10})).unwrap()),
            price: None,
            wholesale_price: None,
            attributes: sqlx::types::Json(json!({})),
            is_principal: true,
            sku: None,
            status: "active".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        (variant, product)
    }

    fn line(variant_id: Uuid, qty: i32) -> CartLine {
        CartLine {
            id: Uuid::now_v7(),
            cart_id: Uuid::now_v7(),
            variant_id,
            size: "38".to_string(),
            quantity: qty,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn owner_is_exactly_one_of_customer_or_guest() {
        let id = Uuid::now_v7();
        assert_eq!(
            CartOwner::from_columns(Some(id), None).unwrap(),
            CartOwner::Customer { id }
        );
        assert!(matches!(
            CartOwner::from_columns(None, Some("sess".to_string())).unwrap(),
            CartOwner::Guest { .. }
        ));
        assert!(CartOwner::from_columns(None, None).is_err());
        assert!(CartOwner::from_columns(Some(id), Some("sess".to_string())).is_err());
    }

    #[test]
    fn five_units_price_retail() {
        let (variant, product) = catalog_pair(100, 80);
        let lines = vec![(line(variant.id, 5), variant, product)];
        let (mode, priced, total) = price_lines(&lines);
        assert_eq!(mode, PricingMode::Retail);
        assert_eq!(priced[0].unit_price, Decimal::new(100, 0));
        assert_eq!(total, Decimal::new(500, 0));
    }

    #[test]
    fn six_units_cross_the_wholesale_threshold() {
        let (variant, product) = catalog_pair(100, 80);
        let lines = vec![(line(variant.id, 6), variant, product)];
        let (mode, priced, total) = price_lines(&lines);
        assert_eq!(mode, PricingMode::Wholesale);
        assert_eq!(priced[0].unit_price, Decimal::new(80, 0));
        assert_eq!(total, Decimal::new(480, 0));
    }

    #[test]
    fn priced_lines_freeze_the_unit_price() {
        let (mut variant, product) = catalog_pair(100, 80);
        let lines = vec![(line(variant.id, 2), variant.clone(), product.clone())];
        let (_, priced, _) = price_lines(&lines);
        assert_eq!(priced[0].unit_price, Decimal::new(100, 0));

        // A later catalog price change must not affect what was frozen.
        variant.price = Some(Decimal::new(150, 0));
        assert_eq!(priced[0].unit_price, Decimal::new(100, 0));
        assert_eq!(priced[0].line_total(), Decimal::new(200, 0));
    }

    #[test]
    fn threshold_counts_quantity_across_lines() {
        let (v1, p1) = catalog_pair(100, 80);
        let (v2, p2) = catalog_pair(50, 40);
        let lines = vec![(line(v1.id, 3), v1, p1), (line(v2.id, 3), v2, p2)];
        let (mode, _, total) = price_lines(&lines);
        assert_eq!(mode, PricingMode::Wholesale);
        assert_eq!(total, Decimal::new(3 * 80 + 3 * 40, 0));
    }
}
