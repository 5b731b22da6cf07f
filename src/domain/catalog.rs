//! Catalog model: products, color variants and the size→stock mapping.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Sentinel color for variants created without an explicit color.
pub const DEFAULT_COLOR: &str = "N/A";

/// Pricing applied to a checkout or cart total.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingMode {
    Retail,
    Wholesale,
}

/// Size-label → stock mapping for a single variant.
///
/// Every write boundary goes through [`SizeStock::from_value`] so that a
/// negative, fractional or non-numeric stock entry never reaches the store.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SizeStock(BTreeMap<String, u32>);

impl SizeStock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a raw JSON object into a stock mapping. The whole mapping is
    /// rejected on the first invalid entry; nothing is partially applied.
    /// Entries are capped at `i32::MAX` so every value survives the `::int`
    /// casts the stock ledger performs in SQL.
    pub fn from_value(raw: &Value) -> Result<Self> {
        let obj = raw.as_object().ok_or_else(|| Error::InvalidStockValue {
            size: "*".to_string(),
            value: raw.clone(),
        })?;
        let mut map = BTreeMap::new();
        for (size, v) in obj {
            let qty = v
                .as_u64()
                .filter(|n| *n <= i32::MAX as u64)
                .map(|n| n as u32)
                .ok_or_else(|| Error::InvalidStockValue {
                    size: size.clone(),
                    value: v.clone(),
                })?;
            map.insert(size.clone(), qty);
        }
        Ok(Self(map))
    }

    /// Resolves the mapping for a variant update: an absent (`null`) payload
    /// keeps the current stock untouched, an object replaces it after
    /// validation. A metadata-only update must never zero a variant's stock.
    pub fn for_update(raw: &Value, current: &SizeStock) -> Result<Self> {
        if raw.is_null() {
            Ok(current.clone())
        } else {
            Self::from_value(raw)
        }
    }

    /// Stock for a size label; absent labels read as zero, never an error.
    pub fn stock_of(&self, size: &str) -> u32 {
        self.0.get(size).copied().unwrap_or(0)
    }

    /// Checked in-memory decrement. The authoritative mutation path is the
    /// conditional UPDATE in the catalog repository; this mirrors its
    /// semantics for domain-level use and tests.
    pub fn decrement(&mut self, size: &str, qty: u32) -> Result<()> {
        let available = self.stock_of(size);
        if available < qty {
            return Err(Error::InsufficientStock {
                size: size.to_string(),
                requested: qty,
                available,
            });
        }
        self.0.insert(size.to_string(), available - qty);
        Ok(())
    }

    pub fn increment(&mut self, size: &str, qty: u32) {
        let current = self.stock_of(size);
        self.0.insert(size.to_string(), current.saturating_add(qty));
    }

    pub fn total(&self) -> u32 {
        self.0.values().sum()
    }

    pub fn sizes(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub gender: Option<String>,
    pub category: Option<String>,
    pub price: Decimal,
    pub wholesale_price: Decimal,
    pub on_offer: bool,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Variant {
    pub id: Uuid,
    pub product_id: Uuid,
    pub color: String,
    pub sizes_stock: sqlx::types::Json<SizeStock>,
    pub price: Option<Decimal>,
    pub wholesale_price: Option<Decimal>,
    pub attributes: sqlx::types::Json<Value>,
    pub is_principal: bool,
    pub sku: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Variant {
    pub fn stock_total(&self) -> u32 {
        self.sizes_stock.total()
    }

    pub fn available(&self) -> bool {
        self.stock_total() > 0
    }

    /// Unit price under a pricing mode, falling back to the parent product
    /// when the variant carries no override.
    pub fn unit_price(&self, product: &Product, mode: PricingMode) -> Decimal {
        match mode {
            PricingMode::Retail => self.price.unwrap_or(product.price),
            PricingMode::Wholesale => self.wholesale_price.unwrap_or(product.wholesale_price),
        }
    }
}

/// Picks the variant that represents the product: the flagged principal if
/// one exists, otherwise the lowest-id (earliest created, ids are v7) variant.
pub fn principal_variant(variants: &[Variant]) -> Option<&Variant> {
    variants
        .iter()
        .find(|v| v.is_principal)
        .or_else(|| variants.iter().min_by_key(|v| v.id))
}

/// Product-level stock: sum of every variant's size→stock entries.
pub fn stock_total(variants: &[Variant]) -> u32 {
    variants.iter().map(Variant::stock_total).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn variant(id: Uuid, principal: bool, stock: Value) -> Variant {
        Variant {
            id,
            product_id: Uuid::now_v7(),
            color: DEFAULT_COLOR.to_string(),
            sizes_stock: sqlx::types::Json(SizeStock::from_value(&stock).unwrap()),
            price: None,
            wholesale_price: None,
            attributes: sqlx::types::Json(json!({})),
            is_principal: principal,
            sku: None,
            status: "active".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn missing_size_reads_as_zero() {
        let stock = SizeStock::from_value(&json!({"38": 5})).unwrap();
        assert_eq!(stock.stock_of("38"), 5);
        assert_eq!(stock.stock_of("44"), 0);
    }

    #[test]
    fn decrement_within_stock() {
        let mut stock = SizeStock::from_value(&json!({"38": 5})).unwrap();
        stock.decrement("38", 3).unwrap();
        assert_eq!(stock.stock_of("38"), 2);
    }

    #[test]
    fn decrement_past_stock_is_refused_without_mutation() {
        let mut stock = SizeStock::from_value(&json!({"38": 5})).unwrap();
        let err = stock.decrement("38", 6).unwrap_err();
        match err {
            Error::InsufficientStock {
                requested,
                available,
                ..
            } => {
                assert_eq!(requested, 6);
                assert_eq!(available, 5);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(stock.stock_of("38"), 5);
    }

    #[test]
    fn negative_and_fractional_entries_reject_the_whole_batch() {
        assert!(SizeStock::from_value(&json!({"38": 5, "39": -1})).is_err());
        assert!(SizeStock::from_value(&json!({"38": 2.5})).is_err());
        assert!(SizeStock::from_value(&json!({"38": "many"})).is_err());
        assert!(SizeStock::from_value(&json!([5, 3])).is_err());
    }

    #[test]
    fn entries_past_the_db_int_range_are_rejected() {
        assert!(SizeStock::from_value(&json!({"38": i32::MAX})).is_ok());
        assert!(SizeStock::from_value(&json!({"38": i32::MAX as i64 + 1})).is_err());
        assert!(SizeStock::from_value(&json!({"38": u32::MAX})).is_err());
    }

    #[test]
    fn update_keeps_current_stock_when_the_field_is_absent() {
        let current = SizeStock::from_value(&json!({"38": 5, "39": 3})).unwrap();
        let kept = SizeStock::for_update(&Value::Null, &current).unwrap();
        assert_eq!(kept, current);

        let replaced = SizeStock::for_update(&json!({"40": 1}), &current).unwrap();
        assert_eq!(replaced.stock_of("40"), 1);
        assert_eq!(replaced.stock_of("38"), 0);

        assert!(SizeStock::for_update(&json!({"38": -2}), &current).is_err());
    }

    #[test]
    fn totals_sum_over_sizes_and_variants() {
        let a = variant(Uuid::now_v7(), false, json!({"38": 5, "39": 3}));
        let b = variant(Uuid::now_v7(), false, json!({"40": 2}));
        assert_eq!(a.stock_total(), 8);
        assert_eq!(stock_total(&[a, b]), 10);
    }

    #[test]
    fn principal_prefers_flag_then_lowest_id() {
        let v1 = variant(Uuid::now_v7(), false, json!({}));
        let v2 = variant(Uuid::now_v7(), true, json!({}));
        let flagged = [v1.clone(), v2.clone()];
        let picked = principal_variant(&flagged).unwrap();
        assert_eq!(picked.id, v2.id);

        let unflagged = [variant(Uuid::now_v7(), false, json!({})), v1.clone()];
        let picked = principal_variant(&unflagged).unwrap();
        let lowest = unflagged.iter().map(|v| v.id).min().unwrap();
        assert_eq!(picked.id, lowest);
    }

    #[test]
    fn variant_price_falls_back_to_product() {
        let product = Product {
            id: Uuid::now_v7(),
            name: "Runner".to_string(),
            slug: "runner".to_string(),
            description: None,
            brand: None,
            gender: None,
            category: None,
            price: Decimal::new(100, 0),
            wholesale_price: Decimal::new(80, 0),
            on_offer: false,
            status: "active".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let mut v = variant(Uuid::now_v7(), false, json!({}));
        assert_eq!(v.unit_price(&product, PricingMode::Retail), Decimal::new(100, 0));
        assert_eq!(
            v.unit_price(&product, PricingMode::Wholesale),
            Decimal::new(80, 0)
        );
        v.price = Some(Decimal::new(120, 0));
        assert_eq!(v.unit_price(&product, PricingMode::Retail), Decimal::new(120, 0));
    }
}
