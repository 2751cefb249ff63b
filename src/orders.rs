//! Per-user pending purchase state.
//!
//! A user is either `Idle` or `AwaitingPhone(product)`. Selecting a product
//! overwrites any earlier selection; taking the pending order (when the phone
//! number arrives) returns the user to `Idle`.
use crate::catalog::Catalog;
use crate::model::{Customer, Product, ProductId};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderError {
    #[error("product {0} not found in catalog")]
    NotFound(ProductId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderState {
    Idle,
    AwaitingPhone(ProductId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingOrder {
    pub product_id: ProductId,
    pub selected_at: DateTime<Utc>,
}

/// Concurrency-safe map of pending orders keyed by Telegram user id.
#[derive(Debug, Default)]
pub struct OrderBook {
    pending: Mutex<HashMap<u64, PendingOrder>>,
    ttl: Option<Duration>,
}

impl OrderBook {
    /// `ttl` of `None` keeps pending orders until they are consumed.
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// `Idle -> AwaitingPhone(product_id)`. The product must exist; otherwise
    /// the user's state is left untouched. Returns the product and whichever
    /// selection was replaced.
    #[instrument(skip(self, catalog))]
    pub async fn select<'c>(
        &self,
        catalog: &'c Catalog,
        user_id: u64,
        product_id: ProductId,
    ) -> Result<(&'c Product, Option<PendingOrder>), OrderError> {
        self.select_at(catalog, user_id, product_id, Utc::now()).await
    }

    async fn select_at<'c>(
        &self,
        catalog: &'c Catalog,
        user_id: u64,
        product_id: ProductId,
        now: DateTime<Utc>,
    ) -> Result<(&'c Product, Option<PendingOrder>), OrderError> {
        let product = catalog
            .get(product_id)
            .ok_or(OrderError::NotFound(product_id))?;
        let order = PendingOrder {
            product_id,
            selected_at: now,
        };
        let replaced = self.pending.lock().await.insert(user_id, order);
        if let Some(prev) = replaced {
            debug!(user_id, previous = prev.product_id, "replaced pending order");
        }
        info!(user_id, product_id, "awaiting phone number");
        Ok((product, replaced))
    }

    pub async fn state(&self, user_id: u64) -> OrderState {
        self.state_at(user_id, Utc::now()).await
    }

    async fn state_at(&self, user_id: u64, now: DateTime<Utc>) -> OrderState {
        match self.pending.lock().await.get(&user_id) {
            Some(order) if !self.is_expired(order, now) => OrderState::AwaitingPhone(order.product_id),
            _ => OrderState::Idle,
        }
    }

    /// `AwaitingPhone -> Idle`: remove and return the user's pending order.
    /// Expired orders are dropped and reported as absent.
    pub async fn take(&self, user_id: u64) -> Option<PendingOrder> {
        self.take_at(user_id, Utc::now()).await
    }

    async fn take_at(&self, user_id: u64, now: DateTime<Utc>) -> Option<PendingOrder> {
        let order = self.pending.lock().await.remove(&user_id)?;
        if self.is_expired(&order, now) {
            debug!(user_id, product_id = order.product_id, "pending order expired");
            return None;
        }
        Some(order)
    }

    /// Drop the user's pending order, if any. Returns whether one was live.
    pub async fn cancel(&self, user_id: u64) -> bool {
        self.take(user_id).await.is_some()
    }

    /// Remove every expired entry. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now()).await
    }

    async fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        if self.ttl.is_none() {
            return 0;
        }
        let mut pending = self.pending.lock().await;
        let before = pending.len();
        pending.retain(|_, order| !self.is_expired(order, now));
        before - pending.len()
    }

    pub async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }

    fn is_expired(&self, order: &PendingOrder, now: DateTime<Utc>) -> bool {
        match self.ttl {
            Some(ttl) => now - order.selected_at >= ttl,
            None => false,
        }
    }
}

/// One-shot message for the store admin about a submitted phone number.
/// Never stored; `reference` lets the admin match it to the customer's receipt.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderNotification {
    pub reference: Uuid,
    pub placed_at: DateTime<Utc>,
    pub customer: Customer,
    pub phone: String,
    pub product_id: ProductId,
    pub title: String,
    pub price: i64,
}

impl OrderNotification {
    pub fn compose(product: &Product, customer: &Customer, phone: &str) -> Self {
        Self {
            reference: Uuid::new_v4(),
            placed_at: Utc::now(),
            customer: customer.clone(),
            phone: phone.trim().to_string(),
            product_id: product.id,
            title: product.title.clone(),
            price: product.price,
        }
    }

    /// First block of the reference, short enough to read over the phone.
    pub fn short_reference(&self) -> String {
        self.reference.simple().to_string()[..8].to_uppercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        let product = |id: ProductId, title: &str, price: i64| Product {
            id,
            title: title.into(),
            price,
            image_url: None,
            url: None,
            inventory: None,
        };
        Catalog::new(vec![
            product(1, "یخچال سامسونگ", 25_000_000),
            product(2, "Kettle", 900_000),
        ])
    }

    #[tokio::test]
    async fn select_then_take_returns_to_idle() {
        let catalog = catalog();
        let book = OrderBook::new(None);
        assert_eq!(book.state(7).await, OrderState::Idle);

        let (product, replaced) = book.select(&catalog, 7, 1).await.unwrap();
        assert_eq!(product.title, "یخچال سامسونگ");
        assert!(replaced.is_none());
        assert_eq!(book.state(7).await, OrderState::AwaitingPhone(1));

        let order = book.take(7).await.unwrap();
        assert_eq!(order.product_id, 1);
        assert_eq!(book.state(7).await, OrderState::Idle);
        assert!(book.take(7).await.is_none());
    }

    #[tokio::test]
    async fn unknown_product_leaves_state_untouched() {
        let catalog = catalog();
        let book = OrderBook::new(None);
        assert_eq!(book.select(&catalog, 7, 99).await.unwrap_err(), OrderError::NotFound(99));
        assert_eq!(book.state(7).await, OrderState::Idle);

        book.select(&catalog, 7, 2).await.unwrap();
        assert!(book.select(&catalog, 7, 99).await.is_err());
        assert_eq!(book.state(7).await, OrderState::AwaitingPhone(2));
    }

    #[tokio::test]
    async fn new_selection_overwrites_previous() {
        let catalog = catalog();
        let book = OrderBook::new(None);
        book.select(&catalog, 7, 1).await.unwrap();
        let (_, replaced) = book.select(&catalog, 7, 2).await.unwrap();
        assert_eq!(replaced.map(|o| o.product_id), Some(1));
        assert_eq!(book.take(7).await.map(|o| o.product_id), Some(2));
        assert_eq!(book.len().await, 0);
    }

    #[tokio::test]
    async fn users_do_not_share_state() {
        let catalog = catalog();
        let book = OrderBook::new(None);
        book.select(&catalog, 1, 1).await.unwrap();
        book.select(&catalog, 2, 2).await.unwrap();
        assert!(book.cancel(1).await);
        assert!(!book.cancel(1).await);
        assert_eq!(book.state(2).await, OrderState::AwaitingPhone(2));
    }

    #[tokio::test]
    async fn without_ttl_orders_never_expire() {
        let catalog = catalog();
        let book = OrderBook::new(None);
        let t0 = Utc::now();
        book.select_at(&catalog, 7, 1, t0).await.unwrap();
        let later = t0 + Duration::days(365);
        assert_eq!(book.state_at(7, later).await, OrderState::AwaitingPhone(1));
        assert_eq!(book.purge_expired_at(later).await, 0);
        assert!(book.take_at(7, later).await.is_some());
    }

    #[tokio::test]
    async fn expired_orders_behave_as_idle() {
        let catalog = catalog();
        let book = OrderBook::new(Some(Duration::minutes(10)));
        let t0 = Utc::now();
        book.select_at(&catalog, 7, 1, t0).await.unwrap();
        book.select_at(&catalog, 8, 2, t0 + Duration::minutes(8)).await.unwrap();

        let t1 = t0 + Duration::minutes(11);
        assert_eq!(book.state_at(7, t1).await, OrderState::Idle);
        assert_eq!(book.state_at(8, t1).await, OrderState::AwaitingPhone(2));
        assert_eq!(book.purge_expired_at(t1).await, 1);
        assert_eq!(book.len().await, 1);
        assert!(book.take_at(8, t0 + Duration::minutes(30)).await.is_none());
        assert_eq!(book.len().await, 0);
    }
}
