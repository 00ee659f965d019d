use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use shelfmark_core::{DocumentId, DomainError, timestamp};
use shelfmark_library::{Extra, NewOrder, Order, OrderStatus, PaymentStatus};

use super::{ServiceResult, decode_all, parse_id};
use crate::store::{
    Collection, DocumentStore, Filter, Sort, UpdateResult, from_document, to_document,
};

#[derive(Clone)]
pub struct OrdersRepository {
    store: Arc<dyn DocumentStore>,
}

impl OrdersRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn place(&self, input: NewOrder) -> ServiceResult<Order> {
        let order = Order::place(input, timestamp::now())?;
        self.store
            .insert(Collection::Orders, to_document(&order)?)
            .await?;
        Ok(order)
    }

    pub async fn get(&self, id: &str) -> ServiceResult<Order> {
        let id = parse_id(id)?;
        self.load(&id).await
    }

    /// A buyer's orders, newest first.
    pub async fn list_by_buyer(&self, email: &str) -> ServiceResult<Vec<Order>> {
        self.list_newest_first(Filter::new().eq("buyerEmail", email))
            .await
    }

    /// Orders for a librarian's books, newest first.
    pub async fn list_by_librarian(&self, email: &str) -> ServiceResult<Vec<Order>> {
        self.list_newest_first(Filter::new().eq("librarianEmail", email))
            .await
    }

    /// Move an order one step along `pending → shipped → delivered`.
    ///
    /// The write only lands if the status is still the one that was checked;
    /// otherwise the order is left alone and `Conflict` is returned.
    pub async fn advance(&self, id: &str, requested: &str) -> ServiceResult<UpdateResult> {
        let id = parse_id(id)?;
        let requested: OrderStatus = requested.parse()?;

        let order = self.load(&id).await?;
        let next = order.status.advance_to(requested)?;

        let mut set = Extra::new();
        set.insert("status".into(), Value::String(next.as_str().into()));
        self.compare_and_set(&id, order.status, set).await
    }

    /// Cancel an order that has not been delivered. Payment is cancelled too.
    pub async fn cancel(&self, id: &str) -> ServiceResult<UpdateResult> {
        let id = parse_id(id)?;
        let order = self.load(&id).await?;
        order.status.cancel()?;

        let mut set = Extra::new();
        set.insert(
            "status".into(),
            Value::String(OrderStatus::Cancelled.as_str().into()),
        );
        set.insert(
            "paymentStatus".into(),
            Value::String(PaymentStatus::Cancelled.as_str().into()),
        );
        self.compare_and_set(&id, order.status, set).await
    }

    async fn compare_and_set(
        &self,
        id: &DocumentId,
        expected: OrderStatus,
        set: Extra,
    ) -> ServiceResult<UpdateResult> {
        let filter = Filter::by_id(id).eq("status", expected.as_str());
        let result = self
            .store
            .update_one(Collection::Orders, &filter, set)
            .await?;

        if result.matched == 0 {
            debug!(order_id = %id, expected = %expected, "order status changed underneath update");
            return Err(DomainError::conflict(format!(
                "order {id} is no longer {expected}"
            ))
            .into());
        }
        Ok(result)
    }

    async fn load(&self, id: &DocumentId) -> ServiceResult<Order> {
        let doc = self
            .store
            .find_one(Collection::Orders, &Filter::by_id(id))
            .await?
            .ok_or_else(|| DomainError::not_found("order"))?;
        Ok(from_document(doc)?)
    }

    async fn list_newest_first(&self, filter: Filter) -> ServiceResult<Vec<Order>> {
        let docs = self
            .store
            .find(Collection::Orders, &filter, Some(&Sort::desc("createdAt")))
            .await?;
        Ok(decode_all(docs)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::ServiceError;
    use crate::repositories::test_support::store;

    fn placement(buyer: &str) -> NewOrder {
        NewOrder {
            book_id: Some("book-1".into()),
            buyer_email: Some(buyer.into()),
            librarian_email: Some("lib@example.com".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn placed_orders_start_pending_and_unpaid() {
        let repo = OrdersRepository::new(store());
        let order = repo.place(placement("b@example.com")).await.unwrap();

        let stored = repo.get(&order.id.to_string()).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
        assert_eq!(stored.payment_status, PaymentStatus::Unpaid);
    }

    #[tokio::test]
    async fn placement_requires_book_and_buyer() {
        let repo = OrdersRepository::new(store());
        let err = repo.place(NewOrder::default()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn advance_walks_the_happy_path() {
        let repo = OrdersRepository::new(store());
        let id = repo.place(placement("b@example.com")).await.unwrap().id.to_string();

        repo.advance(&id, "shipped").await.unwrap();
        repo.advance(&id, "delivered").await.unwrap();
        assert_eq!(repo.get(&id).await.unwrap().status, OrderStatus::Delivered);
    }

    #[tokio::test]
    async fn skipping_a_step_is_rejected_and_leaves_status() {
        let repo = OrdersRepository::new(store());
        let id = repo.place(placement("b@example.com")).await.unwrap().id.to_string();

        let err = repo.advance(&id, "delivered").await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Domain(DomainError::InvalidTransition { .. })
        ));
        assert_eq!(repo.get(&id).await.unwrap().status, OrderStatus::Pending);

        let err = repo.advance(&id, "teleported").await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let repo = OrdersRepository::new(store());
        let missing = DocumentId::new().to_string();
        let err = repo.advance(&missing, "shipped").await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::NotFound(_))));

        let err = repo.cancel(&missing).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn cancel_sets_both_statuses_unless_delivered() {
        let repo = OrdersRepository::new(store());
        let id = repo.place(placement("b@example.com")).await.unwrap().id.to_string();

        repo.cancel(&id).await.unwrap();
        let order = repo.get(&id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.payment_status, PaymentStatus::Cancelled);

        let delivered = repo.place(placement("b@example.com")).await.unwrap().id.to_string();
        repo.advance(&delivered, "shipped").await.unwrap();
        repo.advance(&delivered, "delivered").await.unwrap();
        let err = repo.cancel(&delivered).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Conflict(_))));
        assert_eq!(
            repo.get(&delivered).await.unwrap().status,
            OrderStatus::Delivered
        );
    }

    #[tokio::test]
    async fn stale_status_write_is_a_conflict() {
        let repo = OrdersRepository::new(store());
        let order = repo.place(placement("b@example.com")).await.unwrap();
        let id = order.id.to_string();

        // Another writer ships the order after we read it as pending.
        repo.advance(&id, "shipped").await.unwrap();

        let mut set = Extra::new();
        set.insert("status".into(), Value::String("cancelled".into()));
        let err = repo
            .compare_and_set(&order.id, OrderStatus::Pending, set)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Conflict(_))));
        assert_eq!(repo.get(&id).await.unwrap().status, OrderStatus::Shipped);
    }

    #[tokio::test]
    async fn listings_are_newest_first() {
        let repo = OrdersRepository::new(store());
        let older = repo.place(placement("b@example.com")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let newer = repo.place(placement("b@example.com")).await.unwrap();
        repo.place(placement("c@example.com")).await.unwrap();

        let mine = repo.list_by_buyer("b@example.com").await.unwrap();
        let ids: Vec<_> = mine.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);

        assert_eq!(repo.list_by_librarian("lib@example.com").await.unwrap().len(), 3);
    }
}
