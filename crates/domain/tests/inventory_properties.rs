//! Property tests for inventory conservation.
//!
//! Random interleavings of cart additions, checkouts and cancellations must
//! never drive stock negative, and `stock + sold` must stay at the seeded
//! amount for every product.

use common::{Money, NewProduct, OwnerId, ProductId};
use domain::{CartService, DomainError, OrderIntake, OrderService};
use proptest::prelude::*;
use store::{InMemoryStore, Store};

#[derive(Debug, Clone)]
enum Step {
    Add {
        owner: usize,
        product: usize,
        quantity: i64,
    },
    Checkout {
        owner: usize,
    },
    Cancel {
        owner: usize,
        nth: usize,
    },
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => (0..3usize, 0..3usize, 1..5i64).prop_map(|(owner, product, quantity)| Step::Add {
            owner,
            product,
            quantity,
        }),
        2 => (0..3usize).prop_map(|owner| Step::Checkout { owner }),
        1 => (0..3usize, 0..4usize).prop_map(|(owner, nth)| Step::Cancel { owner, nth }),
    ]
}

fn intake() -> OrderIntake {
    OrderIntake {
        full_name: "Prop Tester".to_string(),
        email: "prop@example.com".to_string(),
        phone: "9000000001".to_string(),
        address: "1 Random Way".to_string(),
        city: "Mysuru".to_string(),
        state: "KA".to_string(),
        pincode: "570001".to_string(),
        payment_method: "upi".to_string(),
        transaction_id: None,
    }
}

async fn run(stocks: Vec<u32>, steps: Vec<Step>) -> Result<(), TestCaseError> {
    let store = InMemoryStore::new();
    let cart = CartService::new(store.clone());
    let orders = OrderService::new(store.clone());
    let owners = [OwnerId::new(), OwnerId::new(), OwnerId::new()];

    let mut products: Vec<ProductId> = Vec::new();
    for (i, stock) in stocks.iter().enumerate() {
        let product = store
            .insert_product(NewProduct {
                name: format!("Item {i}"),
                description: String::new(),
                price: Money::from_cents(250),
                stock: *stock,
            })
            .await
            .unwrap();
        products.push(product.id);
    }

    for step in steps {
        match step {
            Step::Add {
                owner,
                product,
                quantity,
            } => {
                let result = cart.add(owners[owner], products[product], quantity).await;
                if let Err(e) = result {
                    prop_assert!(matches!(e, DomainError::InsufficientStock { .. }), "unexpected error variant");
                }
            }
            Step::Checkout { owner } => match orders.create_order(owners[owner], intake()).await {
                Ok(order) => {
                    let total: i64 = order.items.iter().map(|i| i.subtotal.cents()).sum();
                    prop_assert_eq!(order.total_amount.cents(), total);
                }
                Err(e) => prop_assert!(matches!(
                    e,
                    DomainError::EmptyCart | DomainError::InsufficientStock { .. }
                ), "unexpected error variant"),
            },
            Step::Cancel { owner, nth } => {
                let placed = orders.list_for_owner(owners[owner]).await.unwrap();
                if let Some(order) = placed.get(nth) {
                    let result = orders.cancel_order(owners[owner], order.id).await;
                    if let Err(e) = result {
                        prop_assert!(matches!(e, DomainError::InvalidTransition { .. }), "unexpected error variant");
                    }
                }
            }
        }

        for (id, seeded) in products.iter().zip(&stocks) {
            let product = store.get_product(*id).await.unwrap().unwrap();
            prop_assert_eq!(product.stock + product.sold, *seeded);
        }
    }

    // Cancelling everything still open returns all stock.
    for owner in owners {
        for order in orders.list_for_owner(owner).await.unwrap() {
            if order.order_status.can_cancel() {
                orders.cancel_order(owner, order.id).await.unwrap();
            }
        }
    }
    for (id, seeded) in products.iter().zip(&stocks) {
        let product = store.get_product(*id).await.unwrap().unwrap();
        prop_assert_eq!(product.stock, *seeded);
        prop_assert_eq!(product.sold, 0);
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn stock_plus_sold_is_conserved(
        stocks in prop::collection::vec(0..8u32, 3),
        steps in prop::collection::vec(arb_step(), 1..40),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(run(stocks, steps))?;
    }
}
