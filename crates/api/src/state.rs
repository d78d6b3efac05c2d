use std::sync::Arc;

use axum::extract::FromRef;
use domain::{CartService, CatalogService, FavoriteService, OrderService, ReviewService};
use store::Store;

use crate::auth::AuthKeys;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub catalog: CatalogService<S>,
    pub cart: CartService<S>,
    pub orders: OrderService<S>,
    pub reviews: ReviewService<S>,
    pub favorites: FavoriteService<S>,
    pub auth: AuthKeys,
}

impl<S: Store + Clone> AppState<S> {
    /// Builds every service over the same store.
    pub fn new(store: S, auth: AuthKeys) -> Self {
        Self {
            catalog: CatalogService::new(store.clone()),
            cart: CartService::new(store.clone()),
            orders: OrderService::new(store.clone()),
            reviews: ReviewService::new(store.clone()),
            favorites: FavoriteService::new(store),
            auth,
        }
    }
}

impl<S: Store> FromRef<Arc<AppState<S>>> for AuthKeys {
    fn from_ref(state: &Arc<AppState<S>>) -> Self {
        state.auth.clone()
    }
}
