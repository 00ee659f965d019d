use std::sync::Arc;

use secrecy::ExposeSecret;
use tracing::{info, warn};

use shelfmark_auth::Role;
use shelfmark_infra::repositories::{
    BooksRepository, OrdersRepository, RatingsRepository, UsersRepository, WishlistRepository,
};
use shelfmark_infra::store::{InMemoryDocumentStore, PostgresDocumentStore};
use shelfmark_infra::{DocumentStore, StoreError};

use crate::config::ApiConfig;

/// Everything the handlers need, built once at startup.
///
/// All repositories share the same store handle.
#[derive(Clone)]
pub struct AppServices {
    pub store: Arc<dyn DocumentStore>,
    pub users: UsersRepository,
    pub books: BooksRepository,
    pub wishlist: WishlistRepository,
    pub orders: OrdersRepository,
    pub ratings: RatingsRepository,
}

impl AppServices {
    pub fn new(store: Arc<dyn DocumentStore>, default_role: Role) -> Self {
        Self {
            users: UsersRepository::new(store.clone(), default_role),
            books: BooksRepository::new(store.clone()),
            wishlist: WishlistRepository::new(store.clone()),
            orders: OrdersRepository::new(store.clone()),
            ratings: RatingsRepository::new(store.clone()),
            store,
        }
    }

    /// Services over a fresh in-memory store.
    pub fn in_memory(default_role: Role) -> Self {
        Self::new(Arc::new(InMemoryDocumentStore::default()), default_role)
    }
}

/// Pick the store from configuration: Postgres when `DATABASE_URL` is set,
/// otherwise in-memory.
pub async fn build_services(config: &ApiConfig) -> Result<AppServices, StoreError> {
    let store: Arc<dyn DocumentStore> = match &config.database_url {
        Some(url) => {
            let store =
                PostgresDocumentStore::connect(url.expose_secret(), config.database_max_connections)
                    .await?;
            info!(
                max_connections = config.database_max_connections,
                "connected to postgres document store"
            );
            Arc::new(store)
        }
        None => {
            warn!("DATABASE_URL not set; documents are kept in memory and lost on restart");
            Arc::new(InMemoryDocumentStore::default())
        }
    };

    Ok(AppServices::new(store, config.default_user_role))
}
