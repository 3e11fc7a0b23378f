use parking_lot::RwLock;
use sqlx::Row;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use postgres_commit_callbacks::{
    callback_fn, Executor, Manager, TransactionError, TransactionResult, TxManager,
};

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

impl User {
    pub fn named(username: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: format!("{}@example.com", username),
        }
    }
}

/// In-memory cache that must only learn about committed users.
#[derive(Default)]
pub struct UserCache {
    known: RwLock<HashSet<Uuid>>,
}

impl UserCache {
    pub fn contains(&self, id: Uuid) -> bool {
        self.known.read().contains(&id)
    }
}

/// User repository that publishes new users to a cache after commit.
pub struct UserRepository {
    executor: Executor,
    manager: TxManager,
    pub cache: Arc<UserCache>,
}

impl UserRepository {
    pub fn new(executor: Executor, manager: TxManager, cache: Arc<UserCache>) -> Self {
        Self {
            executor,
            manager,
            cache,
        }
    }

    pub async fn create(&self, user: &User) -> TransactionResult<()> {
        {
            let mut tx_guard = self.executor.tx.lock().await;
            let tx = tx_guard
                .as_mut()
                .ok_or(TransactionError::TransactionClosed)?;
            sqlx::query("INSERT INTO users (id, username, email) VALUES ($1, $2, $3)")
                .bind(user.id)
                .bind(&user.username)
                .bind(&user.email)
                .execute(&mut **tx)
                .await?;
        }

        let cache = Arc::clone(&self.cache);
        let id = user.id;
        self.manager.register_callback(
            Some(&self.executor),
            Some(callback_fn(move || {
                let cache = Arc::clone(&cache);
                async move {
                    cache.known.write().insert(id);
                    Ok(())
                }
            })),
        );
        Ok(())
    }

    pub async fn find_by_id(&self, id: Uuid) -> TransactionResult<Option<User>> {
        let mut tx_guard = self.executor.tx.lock().await;
        let tx = tx_guard
            .as_mut()
            .ok_or(TransactionError::TransactionClosed)?;
        let row = sqlx::query("SELECT id, username, email FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;

        Ok(row.map(|r| User {
            id: r.get("id"),
            username: r.get("username"),
            email: r.get("email"),
        }))
    }
}
