//! Domain model: catalog, cart, orders and the image gallery rules.

pub mod cart;
pub mod catalog;
pub mod gallery;
pub mod order;

#[cfg(test)]
mod tests {
    //! End-to-end walk over the domain rules: one product, one Negro variant
    //! with sizes 38 and 39, a full gallery, then stock movements.

    use super::catalog::SizeStock;
    use super::gallery::{renumber, VariantImage, MAX_GALLERY_IMAGES};
    use crate::error::Error;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn catalog_scenario() {
        let mut stock = SizeStock::from_value(&json!({"38": 5, "39": 3})).unwrap();

        let variant_id = Uuid::now_v7();
        let gallery: Vec<VariantImage> = (1..=5)
            .map(|order| VariantImage {
                id: Uuid::now_v7(),
                variant_id,
                storage_key: format!("k/{order}"),
                display_order: order,
                created_at: Utc::now(),
            })
            .collect();
        // Five images fill the gallery; a sixth would trip the cap check.
        assert_eq!(gallery.len(), MAX_GALLERY_IMAGES);
        assert!(renumber(&gallery).is_empty());

        // Oversold decrement refused, stock untouched.
        assert!(matches!(
            stock.decrement("38", 6),
            Err(Error::InsufficientStock { available: 5, .. })
        ));
        assert_eq!(stock.stock_of("38"), 5);

        // Exact decrement drains the size; the variant total drops to the
        // other size's stock.
        stock.decrement("38", 5).unwrap();
        assert_eq!(stock.stock_of("38"), 0);
        assert_eq!(stock.total(), 3);
    }
}
