//! Variant image gallery: 5-image cap, canonical storage keys, ordering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Hard cap on images per variant.
pub const MAX_GALLERY_IMAGES: usize = 5;

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct VariantImage {
    pub id: Uuid,
    pub variant_id: Uuid,
    pub storage_key: String,
    pub display_order: i32,
    pub created_at: DateTime<Utc>,
}

/// Lowercase, ascii-alphanumeric slug with single dashes.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut dash_pending = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if dash_pending && !slug.is_empty() {
                slug.push('-');
            }
            dash_pending = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            dash_pending = true;
        }
    }
    slug
}

/// Deterministic, collision-resistant key for a gallery image. The leaf is
/// the image's own id, not its display position: positions are renumbered
/// after removals and two rows must never share a blob. Only valid once the
/// variant has a persisted id; unpersisted uploads land under a staging path
/// instead.
pub fn storage_key_for(
    product_id: Uuid,
    product_name: &str,
    color: &str,
    variant_id: Option<Uuid>,
    image_id: Uuid,
) -> String {
    match variant_id {
        Some(variant_id) => format!(
            "products/{}/{}-{}/{}/{}",
            product_id,
            slugify(product_name),
            slugify(color),
            variant_id,
            image_id
        ),
        None => format!("staging/{image_id}"),
    }
}

/// Contiguous 1..N renumbering of the surviving images, preserving their
/// relative order. Returns only the assignments that change.
pub fn renumber(images: &[VariantImage]) -> Vec<(Uuid, i32)> {
    let mut sorted: Vec<&VariantImage> = images.iter().collect();
    sorted.sort_by_key(|img| img.display_order);
    sorted
        .iter()
        .enumerate()
        .filter_map(|(idx, img)| {
            let target = idx as i32 + 1;
            (img.display_order != target).then_some((img.id, target))
        })
        .collect()
}

/// Final ordering for an explicit reorder request: ids named in `sequence`
/// take positions 1..k in the given order, the rest follow in their current
/// relative order. Unknown ids in the sequence are ignored.
pub fn reorder(images: &[VariantImage], sequence: &[Uuid]) -> Vec<(Uuid, i32)> {
    let mut sorted: Vec<&VariantImage> = images.iter().collect();
    sorted.sort_by_key(|img| img.display_order);

    let mut ordered: Vec<Uuid> = sequence
        .iter()
        .copied()
        .filter(|id| sorted.iter().any(|img| img.id == *id))
        .collect();
    for img in &sorted {
        if !ordered.contains(&img.id) {
            ordered.push(img.id);
        }
    }

    ordered
        .into_iter()
        .enumerate()
        .filter_map(|(idx, id)| {
            let target = idx as i32 + 1;
            let current = images.iter().find(|img| img.id == id)?;
            (current.display_order != target).then_some((id, target))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(order: i32) -> VariantImage {
        VariantImage {
            id: Uuid::now_v7(),
            variant_id: Uuid::now_v7(),
            storage_key: format!("k/{order}"),
            display_order: order,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn slugs_collapse_punctuation() {
        assert_eq!(slugify("Zapatilla Urbana 2000"), "zapatilla-urbana-2000");
        assert_eq!(slugify("  ¡Ñandú!  "), "and");
        assert_eq!(slugify("a--b"), "a-b");
    }

    #[test]
    fn canonical_key_is_deterministic() {
        let product = Uuid::now_v7();
        let variant = Uuid::now_v7();
        let image = Uuid::now_v7();
        let key = storage_key_for(product, "Bota Alta", "Negro", Some(variant), image);
        assert_eq!(
            key,
            format!("products/{product}/bota-alta-negro/{variant}/{image}")
        );
        assert_eq!(
            key,
            storage_key_for(product, "Bota Alta", "Negro", Some(variant), image)
        );
    }

    #[test]
    fn unpersisted_variant_falls_back_to_staging() {
        let image = Uuid::now_v7();
        let key = storage_key_for(Uuid::now_v7(), "Bota", "Negro", None, image);
        assert_eq!(key, format!("staging/{image}"));
    }

    #[test]
    fn keys_stay_distinct_across_removal_and_renumbering() {
        let product = Uuid::now_v7();
        let variant = Uuid::now_v7();
        let mut images: Vec<VariantImage> = (1..=5)
            .map(|order| {
                let id = Uuid::now_v7();
                VariantImage {
                    id,
                    variant_id: variant,
                    storage_key: storage_key_for(product, "Bota", "Negro", Some(variant), id),
                    display_order: order,
                    created_at: Utc::now(),
                }
            })
            .collect();

        // Drop the order-3 image and close the gap, as remove_image does.
        images.remove(2);
        for (id, order) in renumber(&images) {
            images.iter_mut().find(|i| i.id == id).unwrap().display_order = order;
        }
        assert_eq!(
            images.iter().map(|i| i.display_order).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );

        // The next upload lands at position 5 again; its key must not touch
        // any surviving image's blob.
        let next_id = Uuid::now_v7();
        let next_key = storage_key_for(product, "Bota", "Negro", Some(variant), next_id);
        assert!(images.iter().all(|i| i.storage_key != next_key));
    }

    #[test]
    fn removing_the_middle_image_renumbers_contiguously() {
        let mut images: Vec<VariantImage> = (1..=5).map(image).collect();
        images.remove(2); // drop display_order 3
        let changes = renumber(&images);
        // 1 and 2 keep their slots; 4 and 5 shift down.
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].1, 3);
        assert_eq!(changes[1].1, 4);
        let shifted: Vec<Uuid> = images.iter().skip(2).map(|i| i.id).collect();
        assert_eq!(changes[0].0, shifted[0]);
        assert_eq!(changes[1].0, shifted[1]);
    }

    #[test]
    fn reorder_follows_the_requested_sequence() {
        let images: Vec<VariantImage> = (1..=3).map(image).collect();
        let sequence = vec![images[2].id, images[0].id];
        let changes = reorder(&images, &sequence);
        let get = |id: Uuid| changes.iter().find(|(c, _)| *c == id).map(|(_, o)| *o);
        assert_eq!(get(images[2].id), Some(1));
        assert_eq!(get(images[0].id), Some(2));
        // The unmentioned image keeps its relative slot (moves to 3).
        assert_eq!(get(images[1].id), Some(3));
    }

    #[test]
    fn reorder_ignores_unknown_ids() {
        let images: Vec<VariantImage> = (1..=2).map(image).collect();
        let changes = reorder(&images, &[Uuid::now_v7()]);
        assert!(changes.is_empty());
    }
}
