use serde::Deserialize;

pub mod addresses;
pub mod carts;
pub mod categories;
pub mod coupons;
pub mod customers;
pub mod favourites;
pub mod health;
pub mod loyalty;
pub mod offers;
pub mod orders;
pub mod products;

/// Common `?page=&per_page=` query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageQuery {
    /// `(limit, offset, page, per_page)` with per_page clamped to 100.
    pub fn limits(&self) -> (i64, i64, u32, u32) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        let limit = per_page as i64;
        let offset = (page as i64 - 1) * limit;
        (limit, offset, page, per_page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_query_defaults_and_clamps() {
        let (limit, offset, page, per_page) = PageQuery::default().limits();
        assert_eq!((limit, offset, page, per_page), (20, 0, 1, 20));

        let query = PageQuery {
            page: Some(3),
            per_page: Some(500),
        };
        let (limit, offset, page, per_page) = query.limits();
        assert_eq!((limit, offset, page, per_page), (100, 200, 3, 100));

        let query = PageQuery {
            page: Some(0),
            per_page: Some(0),
        };
        let (limit, offset, ..) = query.limits();
        assert_eq!((limit, offset), (1, 0));
    }
}
