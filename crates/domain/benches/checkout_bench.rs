use common::{Money, NewProduct, OwnerId, ProductId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{CartService, OrderIntake, OrderService};
use store::{InMemoryStore, Store};

fn intake() -> OrderIntake {
    OrderIntake {
        full_name: "Bench Buyer".to_string(),
        email: "bench@example.com".to_string(),
        phone: "9000000000".to_string(),
        address: "1 Bench Street".to_string(),
        city: "Delhi".to_string(),
        state: "DL".to_string(),
        pincode: "110001".to_string(),
        payment_method: "cod".to_string(),
        transaction_id: None,
    }
}

async fn seed(store: &InMemoryStore, count: usize) -> Vec<ProductId> {
    let mut ids = Vec::with_capacity(count);
    for i in 0..count {
        let product = store
            .insert_product(NewProduct {
                name: format!("Product {i}"),
                description: String::new(),
                price: Money::from_cents(100 * (i as i64 + 1)),
                stock: u32::MAX / 2,
            })
            .await
            .unwrap();
        ids.push(product.id);
    }
    ids
}

fn bench_add_to_cart(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryStore::new();
    let ids = rt.block_on(seed(&store, 1));
    let cart = CartService::new(store);
    let owner = OwnerId::new();

    c.bench_function("domain/add_to_cart", |b| {
        b.iter(|| {
            rt.block_on(async {
                cart.add(owner, ids[0], 1).await.unwrap();
            });
        });
    });
}

fn bench_checkout(c: &mut Criterion, lines: usize) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryStore::new();
    let ids = rt.block_on(seed(&store, lines));
    let cart = CartService::new(store.clone());
    let orders = OrderService::new(store);

    c.bench_function(&format!("domain/checkout_{lines}_lines"), |b| {
        b.iter(|| {
            rt.block_on(async {
                let owner = OwnerId::new();
                for id in &ids {
                    cart.add(owner, *id, 2).await.unwrap();
                }
                orders.create_order(owner, intake()).await.unwrap();
            });
        });
    });
}

fn bench_checkout_small(c: &mut Criterion) {
    bench_checkout(c, 1);
}

fn bench_checkout_large(c: &mut Criterion) {
    bench_checkout(c, 20);
}

fn bench_checkout_and_cancel(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryStore::new();
    let ids = rt.block_on(seed(&store, 5));
    let cart = CartService::new(store.clone());
    let orders = OrderService::new(store);

    c.bench_function("domain/checkout_then_cancel", |b| {
        b.iter(|| {
            rt.block_on(async {
                let owner = OwnerId::new();
                for id in &ids {
                    cart.add(owner, *id, 1).await.unwrap();
                }
                let order = orders.create_order(owner, intake()).await.unwrap();
                orders.cancel_order(owner, order.id).await.unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_add_to_cart,
    bench_checkout_small,
    bench_checkout_large,
    bench_checkout_and_cancel,
);
criterion_main!(benches);
