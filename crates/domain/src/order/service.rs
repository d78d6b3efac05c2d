//! Order workflow: checkout, cancellation, status changes and ledger reads.

use std::collections::BTreeMap;

use common::{
    Money, NewOrder, NewOrderItem, Order, OrderId, OrderNumber, OrderStatus, OwnerId, Product,
    ProductId,
};
use store::{Store, StoreError, UnitOfWork};

use super::intake::{OrderIntake, ValidatedIntake};
use crate::error::{DomainError, Result};

/// How many fresh order numbers checkout tries before giving up.
const ORDER_NUMBER_ATTEMPTS: usize = 5;

/// Service for placing and managing orders.
///
/// Checkout and cancellation each run in a single unit of work: either every
/// order, item, stock and cart change lands, or none does.
#[derive(Clone)]
pub struct OrderService<S: Store> {
    store: S,
    next_order_number: fn() -> OrderNumber,
}

impl<S: Store> OrderService<S> {
    /// Creates a new order service over the given store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            next_order_number: OrderNumber::generate,
        }
    }

    /// Replaces the order number generator.
    pub fn with_order_numbers(mut self, generator: fn() -> OrderNumber) -> Self {
        self.next_order_number = generator;
        self
    }

    /// Converts the owner's cart into an order.
    ///
    /// Reserves stock for every line, snapshots names and prices onto the
    /// order items and empties the cart.
    #[tracing::instrument(skip(self, intake))]
    pub async fn create_order(&self, owner: OwnerId, intake: OrderIntake) -> Result<Order> {
        match self.checkout(owner, intake).await {
            Ok(order) => {
                metrics::counter!("orders_created_total").increment(1);
                tracing::info!(
                    order_id = %order.id,
                    order_number = %order.order_number,
                    total = %order.total_amount,
                    items = order.items.len(),
                    "Order created"
                );
                Ok(order)
            }
            Err(e) => {
                metrics::counter!("checkout_failures_total", "kind" => e.kind()).increment(1);
                match &e {
                    DomainError::Store(err) => tracing::error!(error = %err, "Checkout failed"),
                    other => tracing::debug!(error = %other, "Checkout rejected"),
                }
                Err(e)
            }
        }
    }

    async fn checkout(&self, owner: OwnerId, intake: OrderIntake) -> Result<Order> {
        let intake = intake.into_validated()?;

        if self.store.list_cart(owner).await?.is_empty() {
            return Err(DomainError::EmptyCart);
        }

        let mut tx = self.store.begin().await?;
        tx.lock_cart(owner).await?;

        // Re-read under the unit of work; a concurrent checkout may have
        // emptied the cart since.
        let lines = tx.cart_lines(owner).await?;
        if lines.is_empty() {
            return Err(DomainError::EmptyCart);
        }

        // Products are locked after the cart and in ascending id order, the
        // same order cart edits use.
        let mut products: BTreeMap<ProductId, Product> = BTreeMap::new();
        let mut ids: Vec<ProductId> = lines.iter().map(|l| l.product_id).collect();
        ids.sort();
        ids.dedup();
        for id in ids {
            let product = tx
                .lock_product(id)
                .await?
                .ok_or_else(|| DomainError::not_found("Product", id))?;
            products.insert(id, product);
        }

        let total = lines
            .iter()
            .map(|line| products[&line.product_id].price.checked_multiply(line.quantity))
            .collect::<Option<Vec<_>>>()
            .and_then(Money::checked_sum)
            .ok_or_else(|| DomainError::invalid("quantity", "order total is too large"))?;

        let mut order = self.insert_order(&mut tx, owner, intake, total).await?;

        for line in &lines {
            let product = &products[&line.product_id];
            if product.stock < line.quantity {
                return Err(insufficient(product, line.quantity));
            }

            let item = tx
                .insert_order_item(NewOrderItem {
                    order_id: order.id,
                    product_id: product.id,
                    product_name: product.name.clone(),
                    product_price: product.price,
                    quantity: line.quantity,
                })
                .await?;

            let quantity = i64::from(line.quantity);
            if tx.adjust_stock(product.id, -quantity, quantity).await?.is_none() {
                return Err(insufficient(product, line.quantity));
            }
            order.items.push(item);
        }

        tx.clear_cart(owner).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn insert_order(
        &self,
        tx: &mut S::Tx,
        owner: OwnerId,
        intake: ValidatedIntake,
        total: Money,
    ) -> Result<Order> {
        let ValidatedIntake {
            delivery,
            payment_method,
            transaction_id,
        } = intake;

        for _ in 0..ORDER_NUMBER_ATTEMPTS {
            let order_number = (self.next_order_number)();
            let inserted = tx
                .insert_order(NewOrder {
                    order_number: order_number.clone(),
                    owner_id: owner,
                    delivery: delivery.clone(),
                    total_amount: total,
                    payment_method,
                    payment_status: payment_method.initial_payment_status(),
                    transaction_id: transaction_id.clone(),
                })
                .await?;
            match inserted {
                Some(order) => return Ok(order),
                None => tracing::warn!(%order_number, "Order number taken, regenerating"),
            }
        }

        Err(StoreError::Unavailable(format!(
            "no free order number after {ORDER_NUMBER_ATTEMPTS} attempts"
        ))
        .into())
    }

    /// Cancels one of the owner's orders and returns its stock to the catalog.
    ///
    /// Items whose product has since been deleted are skipped.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, owner: OwnerId, order_id: OrderId) -> Result<Order> {
        let mut tx = self.store.begin().await?;
        let order = tx
            .lock_order(order_id)
            .await?
            .filter(|o| o.owner_id == owner)
            .ok_or_else(|| DomainError::not_found("Order", order_id))?;

        if !order.order_status.can_cancel() {
            return Err(DomainError::InvalidTransition {
                current: order.order_status,
                action: "cancel",
            });
        }

        let order = tx
            .set_order_status(order_id, OrderStatus::Cancelled)
            .await?
            .ok_or_else(|| DomainError::not_found("Order", order_id))?;

        let mut restock: Vec<(ProductId, u32)> = order
            .items
            .iter()
            .filter_map(|item| item.product_id.map(|id| (id, item.quantity)))
            .collect();
        restock.sort();
        for (product_id, quantity) in restock {
            let quantity = i64::from(quantity);
            if tx.adjust_stock(product_id, quantity, -quantity).await?.is_none() {
                tracing::warn!(%product_id, "Product gone or counters inconsistent, not restocked");
            }
        }

        tx.commit().await?;

        metrics::counter!("orders_cancelled_total").increment(1);
        tracing::info!(order_id = %order.id, "Order cancelled");
        Ok(order)
    }

    /// Overwrites an order's status (administrators).
    ///
    /// Any status may follow any other; moves outside the regular lifecycle
    /// are logged. Setting `cancelled` here does not restock.
    #[tracing::instrument(skip(self))]
    pub async fn update_order_status(&self, order_id: OrderId, status: &str) -> Result<Order> {
        let status: OrderStatus = status
            .parse()
            .map_err(|e| DomainError::invalid("status", format!("{e}")))?;

        let mut tx = self.store.begin().await?;
        let current = tx
            .lock_order(order_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Order", order_id))?;

        if current.order_status != status && !current.order_status.follows_lifecycle(status) {
            tracing::warn!(
                %order_id,
                from = %current.order_status,
                to = %status,
                "Order status overridden outside the regular lifecycle"
            );
        }

        let order = tx
            .set_order_status(order_id, status)
            .await?
            .ok_or_else(|| DomainError::not_found("Order", order_id))?;
        tx.commit().await?;
        Ok(order)
    }

    /// Lists the owner's orders, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_for_owner(&self, owner: OwnerId) -> Result<Vec<Order>> {
        Ok(self.store.list_orders(Some(owner)).await?)
    }

    /// Gets one of the owner's orders.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, owner: OwnerId, order_id: OrderId) -> Result<Order> {
        self.store
            .get_order(order_id)
            .await?
            .filter(|o| o.owner_id == owner)
            .ok_or_else(|| DomainError::not_found("Order", order_id))
    }

    /// Lists every order, newest first (administrators).
    #[tracing::instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<Order>> {
        Ok(self.store.list_orders(None).await?)
    }
}

fn insufficient(product: &Product, requested: u32) -> DomainError {
    DomainError::InsufficientStock {
        product_id: product.id,
        product_name: product.name.clone(),
        available: product.stock,
        requested,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use common::{NewProduct, PaymentStatus};
    use store::InMemoryStore;

    use super::*;
    use crate::cart::CartService;

    struct Fixture {
        store: InMemoryStore,
        cart: CartService<InMemoryStore>,
        orders: OrderService<InMemoryStore>,
    }

    impl Fixture {
        fn new() -> Self {
            let store = InMemoryStore::new();
            Self {
                cart: CartService::new(store.clone()),
                orders: OrderService::new(store.clone()),
                store,
            }
        }

        async fn product(&self, stock: u32, price_cents: i64) -> Product {
            self.store
                .insert_product(NewProduct {
                    name: "Brass Lamp".to_string(),
                    description: String::new(),
                    price: Money::from_cents(price_cents),
                    stock,
                })
                .await
                .unwrap()
        }

        async fn reload(&self, id: ProductId) -> Product {
            self.store.get_product(id).await.unwrap().unwrap()
        }
    }

    fn intake(payment_method: &str) -> OrderIntake {
        OrderIntake {
            full_name: "Asha Rao".to_string(),
            email: "asha@example.com".to_string(),
            phone: "9876543210".to_string(),
            address: "12 MG Road".to_string(),
            city: "Pune".to_string(),
            state: "MH".to_string(),
            pincode: "411001".to_string(),
            payment_method: payment_method.to_string(),
            transaction_id: None,
        }
    }

    #[tokio::test]
    async fn checkout_reserves_stock_and_empties_cart() {
        let fx = Fixture::new();
        let product = fx.product(5, 10_000).await;
        let owner = OwnerId::new();

        let line = fx.cart.add(owner, product.id, 3).await.unwrap().line;
        assert_eq!(line.subtotal().cents(), 30_000);

        let order = fx.orders.create_order(owner, intake("cod")).await.unwrap();

        assert_eq!(order.total_amount.cents(), 30_000);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.order_status, OrderStatus::Pending);
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].subtotal.cents(), 30_000);
        assert!(order.order_number.as_str().starts_with("ORD-"));

        let product = fx.reload(product.id).await;
        assert_eq!((product.stock, product.sold), (2, 3));
        assert_eq!(fx.cart.list(owner).await.unwrap().count, 0);
    }

    #[tokio::test]
    async fn prepaid_methods_are_marked_paid() {
        let fx = Fixture::new();
        let product = fx.product(5, 100).await;
        let owner = OwnerId::new();
        fx.cart.add(owner, product.id, 1).await.unwrap();

        let mut form = intake("card");
        form.transaction_id = Some("TXN-4411".to_string());
        let order = fx.orders.create_order(owner, form).await.unwrap();

        assert_eq!(order.payment_status, PaymentStatus::Paid);
        assert_eq!(order.transaction_id.as_deref(), Some("TXN-4411"));
    }

    #[tokio::test]
    async fn cancel_restores_stock() {
        let fx = Fixture::new();
        let product = fx.product(5, 10_000).await;
        let owner = OwnerId::new();
        fx.cart.add(owner, product.id, 3).await.unwrap();
        let order = fx.orders.create_order(owner, intake("cod")).await.unwrap();

        let cancelled = fx.orders.cancel_order(owner, order.id).await.unwrap();

        assert_eq!(cancelled.order_status, OrderStatus::Cancelled);
        let product = fx.reload(product.id).await;
        assert_eq!((product.stock, product.sold), (5, 0));
    }

    #[tokio::test]
    async fn empty_cart_fails_without_mutation() {
        let fx = Fixture::new();
        let product = fx.product(5, 100).await;

        let err = fx
            .orders
            .create_order(OwnerId::new(), intake("upi"))
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::EmptyCart));
        assert_eq!(fx.store.order_count().await, 0);
        assert_eq!(fx.reload(product.id).await.stock, 5);
    }

    #[tokio::test]
    async fn invalid_intake_is_rejected_before_touching_the_cart() {
        let fx = Fixture::new();
        let product = fx.product(5, 100).await;
        let owner = OwnerId::new();
        fx.cart.add(owner, product.id, 1).await.unwrap();

        let err = fx
            .orders
            .create_order(owner, OrderIntake::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "validation_error");
        assert_eq!(fx.cart.list(owner).await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn insufficient_stock_rolls_everything_back() {
        let fx = Fixture::new();
        let plenty = fx.product(10, 100).await;
        let scarce = fx.product(2, 100).await;
        let owner = OwnerId::new();
        fx.cart.add(owner, plenty.id, 4).await.unwrap();
        fx.cart.add(owner, scarce.id, 2).await.unwrap();

        // Someone else buys one of the scarce units first.
        let rival = OwnerId::new();
        fx.cart.add(rival, scarce.id, 1).await.unwrap();
        fx.orders.create_order(rival, intake("upi")).await.unwrap();

        let err = fx.orders.create_order(owner, intake("cod")).await.unwrap_err();

        match err {
            DomainError::InsufficientStock {
                product_id,
                available,
                requested,
                ..
            } => {
                assert_eq!(product_id, scarce.id);
                assert_eq!((available, requested), (1, 2));
            }
            other => panic!("expected insufficient stock, got {other:?}"),
        }
        let plenty = fx.reload(plenty.id).await;
        assert_eq!((plenty.stock, plenty.sold), (10, 0));
        let scarce = fx.reload(scarce.id).await;
        assert_eq!((scarce.stock, scarce.sold), (1, 1));
        assert_eq!(fx.cart.list(owner).await.unwrap().count, 2);
        assert!(fx.orders.list_for_owner(owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn order_total_that_does_not_fit_is_rejected_without_mutation() {
        let fx = Fixture::new();
        let first = fx.product(5, i64::MAX / 2).await;
        let second = fx.product(5, i64::MAX / 2).await;
        let owner = OwnerId::new();
        fx.cart.add(owner, first.id, 2).await.unwrap();
        fx.cart.add(owner, second.id, 1).await.unwrap();

        let err = fx.orders.create_order(owner, intake("cod")).await.unwrap_err();

        assert_eq!(err.kind(), "validation_error");
        assert_eq!(fx.store.order_count().await, 0);
        assert_eq!(fx.reload(first.id).await.stock, 5);
        assert_eq!(fx.reload(second.id).await.stock, 5);
        assert_eq!(fx.cart.list(owner).await.unwrap().count, 2);
    }

    #[tokio::test]
    async fn store_fault_mid_checkout_leaves_nothing_behind() {
        let fx = Fixture::new();
        let product = fx.product(5, 100).await;
        let owner = OwnerId::new();
        fx.cart.add(owner, product.id, 2).await.unwrap();
        fx.store.set_fail_on_order_item(true);

        let err = fx.orders.create_order(owner, intake("cod")).await.unwrap_err();

        assert_eq!(err.kind(), "internal");
        assert_eq!(fx.store.order_count().await, 0);
        assert_eq!(fx.store.order_item_count().await, 0);
        assert_eq!(fx.reload(product.id).await.stock, 5);
        assert_eq!(fx.cart.list(owner).await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn cancelling_terminal_orders_is_rejected() {
        let fx = Fixture::new();
        let product = fx.product(5, 100).await;
        let owner = OwnerId::new();
        fx.cart.add(owner, product.id, 1).await.unwrap();
        let order = fx.orders.create_order(owner, intake("cod")).await.unwrap();
        fx.orders.cancel_order(owner, order.id).await.unwrap();

        let err = fx.orders.cancel_order(owner, order.id).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::InvalidTransition {
                current: OrderStatus::Cancelled,
                ..
            }
        ));
        assert_eq!(fx.reload(product.id).await.stock, 5);

        fx.cart.add(owner, product.id, 1).await.unwrap();
        let delivered = fx.orders.create_order(owner, intake("cod")).await.unwrap();
        fx.orders
            .update_order_status(delivered.id, "delivered")
            .await
            .unwrap();
        let err = fx.orders.cancel_order(owner, delivered.id).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_transition");
        let product = fx.reload(product.id).await;
        assert_eq!((product.stock, product.sold), (4, 1));
    }

    #[tokio::test]
    async fn orders_are_scoped_to_owner() {
        let fx = Fixture::new();
        let product = fx.product(5, 100).await;
        let owner = OwnerId::new();
        let stranger = OwnerId::new();
        fx.cart.add(owner, product.id, 1).await.unwrap();
        let order = fx.orders.create_order(owner, intake("cod")).await.unwrap();

        assert_eq!(fx.orders.get(owner, order.id).await.unwrap().id, order.id);
        assert_eq!(
            fx.orders.get(stranger, order.id).await.unwrap_err().kind(),
            "not_found"
        );
        assert_eq!(
            fx.orders.cancel_order(stranger, order.id).await.unwrap_err().kind(),
            "not_found"
        );
        assert!(fx.orders.list_for_owner(stranger).await.unwrap().is_empty());
        assert_eq!(fx.orders.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn admin_status_update_is_unconstrained() {
        let fx = Fixture::new();
        let product = fx.product(5, 100).await;
        let owner = OwnerId::new();
        fx.cart.add(owner, product.id, 1).await.unwrap();
        let order = fx.orders.create_order(owner, intake("cod")).await.unwrap();

        let order = fx
            .orders
            .update_order_status(order.id, "delivered")
            .await
            .unwrap();
        assert_eq!(order.order_status, OrderStatus::Delivered);
        let order = fx
            .orders
            .update_order_status(order.id, "pending")
            .await
            .unwrap();
        assert_eq!(order.order_status, OrderStatus::Pending);

        let err = fx
            .orders
            .update_order_status(order.id, "lost")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation_error");
        let err = fx
            .orders
            .update_order_status(OrderId::new(999), "shipped")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[tokio::test]
    async fn cancel_skips_deleted_products() {
        let fx = Fixture::new();
        let kept = fx.product(5, 100).await;
        let purged = fx.product(5, 100).await;
        let owner = OwnerId::new();
        fx.cart.add(owner, kept.id, 2).await.unwrap();
        fx.cart.add(owner, purged.id, 2).await.unwrap();
        let order = fx.orders.create_order(owner, intake("upi")).await.unwrap();
        fx.store.delete_product(purged.id).await.unwrap();

        let cancelled = fx.orders.cancel_order(owner, order.id).await.unwrap();

        assert_eq!(cancelled.order_status, OrderStatus::Cancelled);
        assert!(cancelled.items.iter().any(|i| i.product_id.is_none()));
        let kept = fx.reload(kept.id).await;
        assert_eq!((kept.stock, kept.sold), (5, 0));
    }

    static CALLS: AtomicUsize = AtomicUsize::new(0);

    fn colliding_numbers() -> OrderNumber {
        // First two calls collide, later ones are unique.
        match CALLS.fetch_add(1, Ordering::SeqCst) {
            0 | 1 => OrderNumber::new("ORD-0000000000"),
            _ => OrderNumber::generate(),
        }
    }

    #[tokio::test]
    async fn order_number_collision_is_retried() {
        let fx = Fixture::new();
        let orders = fx.orders.clone().with_order_numbers(colliding_numbers);
        let product = fx.product(5, 100).await;

        let first = OwnerId::new();
        fx.cart.add(first, product.id, 1).await.unwrap();
        let a = orders.create_order(first, intake("cod")).await.unwrap();

        let second = OwnerId::new();
        fx.cart.add(second, product.id, 1).await.unwrap();
        let b = orders.create_order(second, intake("cod")).await.unwrap();

        assert_eq!(a.order_number.as_str(), "ORD-0000000000");
        assert_ne!(a.order_number, b.order_number);
    }

    fn constant_number() -> OrderNumber {
        OrderNumber::new("ORD-FFFFFFFFFF")
    }

    #[tokio::test]
    async fn exhausted_order_numbers_fail_internally_and_roll_back() {
        let fx = Fixture::new();
        let orders = fx.orders.clone().with_order_numbers(constant_number);
        let product = fx.product(5, 100).await;

        let first = OwnerId::new();
        fx.cart.add(first, product.id, 1).await.unwrap();
        orders.create_order(first, intake("cod")).await.unwrap();

        let second = OwnerId::new();
        fx.cart.add(second, product.id, 1).await.unwrap();
        let err = orders.create_order(second, intake("cod")).await.unwrap_err();

        assert_eq!(err.kind(), "internal");
        assert_eq!(fx.reload(product.id).await.stock, 4);
        assert_eq!(fx.cart.list(second).await.unwrap().count, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_checkouts_never_oversell() {
        let fx = Fixture::new();
        let product = fx.product(1, 100).await;
        let alice = OwnerId::new();
        let bob = OwnerId::new();
        fx.cart.add(alice, product.id, 1).await.unwrap();
        fx.cart.add(bob, product.id, 1).await.unwrap();

        let a = tokio::spawn({
            let orders = fx.orders.clone();
            async move { orders.create_order(alice, intake("cod")).await }
        });
        let b = tokio::spawn({
            let orders = fx.orders.clone();
            async move { orders.create_order(bob, intake("cod")).await }
        });
        let results = [a.await.unwrap(), b.await.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().any(|r| matches!(
            r,
            Err(DomainError::InsufficientStock { available: 0, .. })
        )));
        let product = fx.reload(product.id).await;
        assert_eq!((product.stock, product.sold), (0, 1));
    }
}
