use db::models::category::{Category, CreateCategory, UpdateCategory};
use db::models::product::{
    CreateProduct, CreateProductVariant, Product, ProductVariant, UpdateProduct,
};
use rand::Rng;
use sqlx::SqlitePool;
use thiserror::Error;
use utils::text::slugify;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("product not found")]
    ProductNotFound,
    #[error("category not found")]
    CategoryNotFound,
    #[error("variant not found")]
    VariantNotFound,
    #[error("category still has {0} products")]
    CategoryInUse(i64),
}

/// Product and category management. Slugs and SKUs are generated here so
/// the write paths in `db` stay dumb inserts.
pub struct CatalogService;

impl CatalogService {
    pub async fn create_product(
        pool: &SqlitePool,
        data: &CreateProduct,
    ) -> Result<Product, CatalogError> {
        if let Some(category_id) = data.category_id {
            Category::find_by_id(pool, category_id)
                .await?
                .ok_or(CatalogError::CategoryNotFound)?;
        }
        let sku = match &data.sku {
            Some(sku) => sku.trim().to_ascii_uppercase(),
            None => generate_sku("SKU"),
        };
        let slug = unique_product_slug(pool, &data.name, None).await?;
        let product = Product::create(pool, Uuid::new_v4(), data, &sku, &slug).await?;
        Ok(product)
    }

    pub async fn update_product(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateProduct,
    ) -> Result<Product, CatalogError> {
        if let Some(category_id) = data.category_id {
            Category::find_by_id(pool, category_id)
                .await?
                .ok_or(CatalogError::CategoryNotFound)?;
        }
        Product::update(pool, id, data)
            .await?
            .ok_or(CatalogError::ProductNotFound)
    }

    pub async fn archive_product(pool: &SqlitePool, id: Uuid) -> Result<(), CatalogError> {
        let rows = Product::archive(pool, id).await?;
        if rows == 0 {
            return Err(CatalogError::ProductNotFound);
        }
        Ok(())
    }

    pub async fn create_category(
        pool: &SqlitePool,
        data: &CreateCategory,
    ) -> Result<Category, CatalogError> {
        if let Some(parent_id) = data.parent_id {
            Category::find_by_id(pool, parent_id)
                .await?
                .ok_or(CatalogError::CategoryNotFound)?;
        }
        let slug = unique_category_slug(pool, &data.name, None).await?;
        let category = Category::create(pool, Uuid::new_v4(), data, &slug).await?;
        Ok(category)
    }

    pub async fn update_category(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateCategory,
    ) -> Result<Category, CatalogError> {
        Category::find_by_id(pool, id)
            .await?
            .ok_or(CatalogError::CategoryNotFound)?;
        let slug = unique_category_slug(pool, &data.name, Some(id)).await?;
        Category::update(pool, id, data, &slug)
            .await?
            .ok_or(CatalogError::CategoryNotFound)
    }

    /// Hard delete, refused while products still point at the category.
    pub async fn delete_category(pool: &SqlitePool, id: Uuid) -> Result<(), CatalogError> {
        Category::find_by_id(pool, id)
            .await?
            .ok_or(CatalogError::CategoryNotFound)?;
        let in_use = Category::count_products(pool, id).await?;
        if in_use > 0 {
            return Err(CatalogError::CategoryInUse(in_use));
        }
        Category::delete(pool, id).await?;
        Ok(())
    }

    pub async fn create_variant(
        pool: &SqlitePool,
        product_id: Uuid,
        data: &CreateProductVariant,
    ) -> Result<ProductVariant, CatalogError> {
        Product::find_by_id(pool, product_id)
            .await?
            .ok_or(CatalogError::ProductNotFound)?;
        let sku = match &data.sku {
            Some(sku) => sku.trim().to_ascii_uppercase(),
            None => generate_sku("VAR"),
        };
        let variant = ProductVariant::create(pool, Uuid::new_v4(), product_id, data, &sku).await?;
        Ok(variant)
    }

    pub async fn update_variant(
        pool: &SqlitePool,
        product_id: Uuid,
        variant_id: Uuid,
        data: &CreateProductVariant,
    ) -> Result<ProductVariant, CatalogError> {
        Self::variant_of(pool, product_id, variant_id).await?;
        ProductVariant::update(pool, variant_id, data)
            .await?
            .ok_or(CatalogError::VariantNotFound)
    }

    pub async fn delete_variant(
        pool: &SqlitePool,
        product_id: Uuid,
        variant_id: Uuid,
    ) -> Result<(), CatalogError> {
        Self::variant_of(pool, product_id, variant_id).await?;
        ProductVariant::delete(pool, variant_id).await?;
        Ok(())
    }

    async fn variant_of(
        pool: &SqlitePool,
        product_id: Uuid,
        variant_id: Uuid,
    ) -> Result<ProductVariant, CatalogError> {
        let variant = ProductVariant::find_by_id(pool, variant_id)
            .await?
            .ok_or(CatalogError::VariantNotFound)?;
        if variant.product_id != product_id {
            return Err(CatalogError::VariantNotFound);
        }
        Ok(variant)
    }
}

fn generate_sku(prefix: &str) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..100_000_000);
    format!("{prefix}-{suffix:08}")
}

fn slug_base(name: &str) -> String {
    let base = slugify(name);
    if base.is_empty() {
        "item".to_string()
    } else {
        base
    }
}

async fn unique_product_slug(
    pool: &SqlitePool,
    name: &str,
    exclude: Option<Uuid>,
) -> Result<String, CatalogError> {
    let base = slug_base(name);
    let mut candidate = base.clone();
    let mut n = 1u32;
    loop {
        match Product::find_by_slug(pool, &candidate).await? {
            None => return Ok(candidate),
            Some(existing) if Some(existing.id) == exclude => return Ok(candidate),
            Some(_) => {
                n += 1;
                candidate = format!("{base}-{n}");
            }
        }
    }
}

async fn unique_category_slug(
    pool: &SqlitePool,
    name: &str,
    exclude: Option<Uuid>,
) -> Result<String, CatalogError> {
    let base = slug_base(name);
    let mut candidate = base.clone();
    let mut n = 1u32;
    loop {
        match Category::find_by_slug(pool, &candidate).await? {
            None => return Ok(candidate),
            Some(existing) if Some(existing.id) == exclude => return Ok(candidate),
            Some(_) => {
                n += 1;
                candidate = format!("{base}-{n}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use db::models::product::ProductFilter;

    fn new_product(name: &str, price: i64) -> CreateProduct {
        CreateProduct {
            name: name.to_string(),
            sku: None,
            description: None,
            price,
            compare_at_price: None,
            currency: None,
            category_id: None,
            status: None,
        }
    }

    #[tokio::test]
    async fn create_product_generates_slug_and_sku() {
        let pool = memory_pool().await;
        let product = CatalogService::create_product(&pool, &new_product("Espresso Cup", 1250))
            .await
            .unwrap();
        assert_eq!(product.slug, "espresso-cup");
        assert!(product.sku.starts_with("SKU-"));
    }

    #[tokio::test]
    async fn duplicate_names_get_suffixed_slugs() {
        let pool = memory_pool().await;
        let first = CatalogService::create_product(&pool, &new_product("Mug", 900))
            .await
            .unwrap();
        let second = CatalogService::create_product(&pool, &new_product("Mug", 900))
            .await
            .unwrap();
        assert_eq!(first.slug, "mug");
        assert_eq!(second.slug, "mug-2");
    }

    #[tokio::test]
    async fn delete_category_with_products_is_rejected() {
        let pool = memory_pool().await;
        let category = CatalogService::create_category(
            &pool,
            &CreateCategory {
                name: "Drinkware".to_string(),
                description: None,
                parent_id: None,
                position: None,
            },
        )
        .await
        .unwrap();
        let mut data = new_product("Tumbler", 1500);
        data.category_id = Some(category.id);
        CatalogService::create_product(&pool, &data).await.unwrap();

        let err = CatalogService::delete_category(&pool, category.id)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::CategoryInUse(1)));
    }

    #[tokio::test]
    async fn archived_products_leave_default_listing() {
        let pool = memory_pool().await;
        let product = CatalogService::create_product(&pool, &new_product("Kettle", 4200))
            .await
            .unwrap();
        CatalogService::archive_product(&pool, product.id)
            .await
            .unwrap();

        let listed = Product::list(&pool, &ProductFilter::default(), 50, 0)
            .await
            .unwrap();
        assert!(listed.is_empty());
    }
}
