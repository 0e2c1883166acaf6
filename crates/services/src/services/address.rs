use db::models::address::{Address, CreateAddress};
use db::models::customer::Customer;
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AddressError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("customer not found")]
    CustomerNotFound,
    #[error("address not found")]
    AddressNotFound,
}

/// Address book per customer. At most one default address at a time; the
/// first address a customer adds becomes the default automatically.
pub struct AddressService;

impl AddressService {
    pub async fn list(pool: &SqlitePool, customer_id: Uuid) -> Result<Vec<Address>, AddressError> {
        Customer::find_by_id(pool, customer_id)
            .await?
            .ok_or(AddressError::CustomerNotFound)?;
        Ok(Address::find_by_customer_id(pool, customer_id).await?)
    }

    pub async fn create(
        pool: &SqlitePool,
        customer_id: Uuid,
        data: &CreateAddress,
    ) -> Result<Address, AddressError> {
        Customer::find_by_id(pool, customer_id)
            .await?
            .ok_or(AddressError::CustomerNotFound)?;
        let existing = Address::find_by_customer_id(pool, customer_id).await?;
        let is_default = data.is_default.unwrap_or(false) || existing.is_empty();

        let mut tx = pool.begin().await?;
        if is_default {
            Address::clear_default(&mut *tx, customer_id).await?;
        }
        let address = Address::create(&mut *tx, Uuid::new_v4(), customer_id, data, is_default).await?;
        tx.commit().await?;
        Ok(address)
    }

    pub async fn update(
        pool: &SqlitePool,
        customer_id: Uuid,
        address_id: Uuid,
        data: &CreateAddress,
    ) -> Result<Address, AddressError> {
        let current = Self::address_of(pool, customer_id, address_id).await?;
        let is_default = data.is_default.unwrap_or(current.is_default);

        let mut tx = pool.begin().await?;
        if is_default && !current.is_default {
            Address::clear_default(&mut *tx, customer_id).await?;
        }
        let address = Address::update(&mut *tx, address_id, data, is_default)
            .await?
            .ok_or(AddressError::AddressNotFound)?;
        tx.commit().await?;
        Ok(address)
    }

    pub async fn set_default(
        pool: &SqlitePool,
        customer_id: Uuid,
        address_id: Uuid,
    ) -> Result<Address, AddressError> {
        Self::address_of(pool, customer_id, address_id).await?;

        let mut tx = pool.begin().await?;
        Address::clear_default(&mut *tx, customer_id).await?;
        Address::set_default(&mut *tx, address_id).await?;
        tx.commit().await?;

        Address::find_by_id(pool, address_id)
            .await?
            .ok_or(AddressError::AddressNotFound)
    }

    /// Removing the default leaves the customer with no default; the next
    /// explicit set or first new address restores one.
    pub async fn delete(
        pool: &SqlitePool,
        customer_id: Uuid,
        address_id: Uuid,
    ) -> Result<(), AddressError> {
        Self::address_of(pool, customer_id, address_id).await?;
        Address::delete(pool, address_id).await?;
        Ok(())
    }

    async fn address_of(
        pool: &SqlitePool,
        customer_id: Uuid,
        address_id: Uuid,
    ) -> Result<Address, AddressError> {
        let address = Address::find_by_id(pool, address_id)
            .await?
            .ok_or(AddressError::AddressNotFound)?;
        if address.customer_id != customer_id {
            return Err(AddressError::AddressNotFound);
        }
        Ok(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    fn new_address(line1: &str, is_default: Option<bool>) -> CreateAddress {
        CreateAddress {
            label: None,
            line1: line1.to_string(),
            line2: None,
            city: "Lisbon".to_string(),
            region: None,
            postal_code: "1000-001".to_string(),
            country: "pt".to_string(),
            is_default,
        }
    }

    #[tokio::test]
    async fn first_address_becomes_default() {
        let pool = memory_pool().await;
        let customer = seed_customer(&pool).await;
        let address = AddressService::create(&pool, customer.id, &new_address("Rua A 1", None))
            .await
            .unwrap();
        assert!(address.is_default);
        assert_eq!(address.country, "PT");
    }

    #[tokio::test]
    async fn new_default_demotes_previous() {
        let pool = memory_pool().await;
        let customer = seed_customer(&pool).await;
        let first = AddressService::create(&pool, customer.id, &new_address("Rua A 1", None))
            .await
            .unwrap();
        let second =
            AddressService::create(&pool, customer.id, &new_address("Rua B 2", Some(true)))
                .await
                .unwrap();
        assert!(second.is_default);

        let first = Address::find_by_id(&pool, first.id).await.unwrap().unwrap();
        assert!(!first.is_default);

        let defaults = Address::find_default(&pool, customer.id).await.unwrap();
        assert_eq!(defaults.unwrap().id, second.id);
    }

    async fn default_ids(pool: &SqlitePool, customer_id: Uuid) -> Vec<Uuid> {
        Address::find_by_customer_id(pool, customer_id)
            .await
            .unwrap()
            .into_iter()
            .filter(|a| a.is_default)
            .map(|a| a.id)
            .collect()
    }

    #[tokio::test]
    async fn update_with_default_demotes_previous() {
        let pool = memory_pool().await;
        let customer = seed_customer(&pool).await;
        let first = AddressService::create(&pool, customer.id, &new_address("Rua A 1", None))
            .await
            .unwrap();
        let second = AddressService::create(&pool, customer.id, &new_address("Rua B 2", None))
            .await
            .unwrap();
        assert!(first.is_default);
        assert!(!second.is_default);

        let updated = AddressService::update(
            &pool,
            customer.id,
            second.id,
            &new_address("Rua B 2", Some(true)),
        )
        .await
        .unwrap();
        assert!(updated.is_default);
        assert_eq!(default_ids(&pool, customer.id).await, vec![second.id]);
    }

    #[tokio::test]
    async fn set_default_moves_the_flag() {
        let pool = memory_pool().await;
        let customer = seed_customer(&pool).await;
        let first = AddressService::create(&pool, customer.id, &new_address("Rua A 1", None))
            .await
            .unwrap();
        let second = AddressService::create(&pool, customer.id, &new_address("Rua B 2", None))
            .await
            .unwrap();

        let promoted = AddressService::set_default(&pool, customer.id, second.id)
            .await
            .unwrap();
        assert!(promoted.is_default);
        assert_eq!(default_ids(&pool, customer.id).await, vec![second.id]);

        let first = Address::find_by_id(&pool, first.id).await.unwrap().unwrap();
        assert!(!first.is_default);
    }

    #[tokio::test]
    async fn address_of_other_customer_is_hidden() {
        let pool = memory_pool().await;
        let owner = seed_customer(&pool).await;
        let other = seed_customer(&pool).await;
        let address = AddressService::create(&pool, owner.id, &new_address("Rua A 1", None))
            .await
            .unwrap();

        let err = AddressService::delete(&pool, other.id, address.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AddressError::AddressNotFound));
    }
}
