//! Postgres persistence layer.

pub mod cart;
pub mod catalog;
pub mod gallery;
pub mod order;

/// OFFSET for a 1-based page, computed in i64 so an absurd `page` query
/// parameter cannot overflow on the way to the bind.
pub(crate) fn page_offset(page: u32, per_page: u32) -> i64 {
    (i64::from(page.max(1)) - 1) * i64::from(per_page)
}

#[cfg(test)]
mod tests {
    use super::page_offset;

    #[test]
    fn page_offset_stays_in_range() {
        assert_eq!(page_offset(1, 20), 0);
        assert_eq!(page_offset(3, 20), 40);
        assert_eq!(page_offset(0, 20), 0);
        assert_eq!(page_offset(u32::MAX, 100), (u32::MAX as i64 - 1) * 100);
    }
}
