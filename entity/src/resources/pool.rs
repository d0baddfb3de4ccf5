//! Bounded pool with scoped acquisition.

use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};
use tokio::sync::{AcquireError, Semaphore, SemaphorePermit};

/// A fixed set of reusable items, such as database connections.
///
/// Items are only reachable through a [`PoolGuard`], which puts the item back
/// when dropped, so a lease is returned on every exit path.
#[derive(Debug)]
pub struct ResourcePool<T> {
    items: Mutex<Vec<T>>,
    permits: Semaphore,
    capacity: usize,
}

impl<T> ResourcePool<T> {
    /// Creates a pool owning `items`.
    #[must_use]
    pub fn new(items: Vec<T>) -> Self {
        let capacity = items.len();
        Self {
            items: Mutex::new(items),
            permits: Semaphore::new(capacity),
            capacity,
        }
    }

    /// Returns the total number of items.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of items not currently leased.
    #[must_use]
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Waits for an item.
    pub async fn acquire(&self) -> Result<PoolGuard<'_, T>, AcquireError> {
        let permit = self.permits.acquire().await?;
        Ok(self.lease(permit))
    }

    /// Takes an item if one is free right now.
    #[must_use]
    pub fn try_acquire(&self) -> Option<PoolGuard<'_, T>> {
        let permit = self.permits.try_acquire().ok()?;
        Some(self.lease(permit))
    }

    /// Stops handing out items; pending and future `acquire` calls fail.
    pub fn close(&self) {
        self.permits.close();
    }

    fn lease<'a>(&'a self, permit: SemaphorePermit<'a>) -> PoolGuard<'a, T> {
        // One permit per item, so an item is always present once a permit is held.
        let item = self.items.lock().pop();
        PoolGuard {
            item,
            pool: self,
            _permit: permit,
        }
    }
}

/// A leased pool item.
#[derive(Debug)]
pub struct PoolGuard<'a, T> {
    item: Option<T>,
    pool: &'a ResourcePool<T>,
    _permit: SemaphorePermit<'a>,
}

impl<T> Deref for PoolGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.item {
            Some(item) => item,
            None => unreachable!("pool guard holds an item until dropped"),
        }
    }
}

impl<T> DerefMut for PoolGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.item {
            Some(item) => item,
            None => unreachable!("pool guard holds an item until dropped"),
        }
    }
}

impl<T> Drop for PoolGuard<'_, T> {
    fn drop(&mut self) {
        // Return the item before the permit is released.
        if let Some(item) = self.item.take() {
            self.pool.items.lock().push(item);
        }
    }
}
