// Copyright 2026 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Content pooling with scope-tied eviction.
//!
//! A [`PoolManager`] owns one [`ContentPool`] per (scope, allocator) pair.
//! There is no process-wide registry: the manager is an explicit object
//! whose lifetime is tied to whoever owns the mount pipeline, and
//! destroying a platform scope evicts exactly that scope's pools.
//!
//! Pool misses are not errors: `acquire` returns `None` (the caller
//! allocates fresh content) and `release` returns `false` when the pool
//! refuses the content (the caller discards it).

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::fmt;

use crate::content::{AllocatorId, Content, ContentAllocator, PlatformContext, ScopeId};

/// How a pool fills and recycles content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum PoolingPolicy {
    /// Fill on `release`, drain on `acquire`.
    #[default]
    Default,
    /// Fill via explicit [`PoolManager::prefill`] only; `release` always
    /// refuses.
    AcquireOnly,
    /// Never pool: `acquire` always misses and `release` always refuses.
    Disabled,
}

/// A bounded pool of recycled content for one allocator within one scope.
pub struct ContentPool {
    policy: PoolingPolicy,
    capacity: usize,
    items: Vec<Content>,
}

impl fmt::Debug for ContentPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentPool")
            .field("policy", &self.policy)
            .field("capacity", &self.capacity)
            .field("len", &self.items.len())
            .finish()
    }
}

impl ContentPool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new(capacity: usize, policy: PoolingPolicy) -> Self {
        Self {
            policy,
            capacity,
            items: Vec::new(),
        }
    }

    /// Takes pooled content, or `None` on a miss.
    pub fn acquire(&mut self) -> Option<Content> {
        if self.policy == PoolingPolicy::Disabled {
            return None;
        }
        self.items.pop()
    }

    /// Offers content back to the pool. Returns `false` if the pool refuses
    /// it (at capacity, or the policy forbids recycling); the caller must
    /// discard the content.
    pub fn release(&mut self, content: Content) -> bool {
        match self.policy {
            PoolingPolicy::Default => {
                if self.items.len() >= self.capacity {
                    return false;
                }
                self.items.push(content);
                true
            }
            PoolingPolicy::AcquireOnly | PoolingPolicy::Disabled => false,
        }
    }

    /// Inserts content regardless of policy, up to capacity. This is the
    /// only fill path for [`PoolingPolicy::AcquireOnly`] pools.
    pub fn prefill_one(&mut self, content: Content) -> bool {
        if self.policy == PoolingPolicy::Disabled || self.items.len() >= self.capacity {
            return false;
        }
        self.items.push(content);
        true
    }

    /// Number of pooled items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the pool is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Owns every content pool for a mount pipeline, keyed by scope and
/// allocator identity.
#[derive(Debug, Default)]
pub struct PoolManager {
    pools: BTreeMap<(ScopeId, AllocatorId), ContentPool>,
}

impl PoolManager {
    /// Creates a manager with no pools.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires pooled content for `allocator` within `scope`, or `None` on
    /// a miss.
    pub fn acquire(&mut self, scope: ScopeId, allocator: &dyn ContentAllocator) -> Option<Content> {
        self.pool_for(scope, allocator).acquire()
    }

    /// Offers content back to the matching pool. Returns `false` if the
    /// pool refuses it.
    pub fn release(
        &mut self,
        scope: ScopeId,
        allocator: &dyn ContentAllocator,
        content: Content,
    ) -> bool {
        self.pool_for(scope, allocator).release(content)
    }

    /// Fills the pool for `allocator` with up to `count` freshly created
    /// items. Returns how many were actually pooled.
    pub fn prefill(
        &mut self,
        ctx: &PlatformContext,
        allocator: &dyn ContentAllocator,
        count: usize,
    ) -> usize {
        let mut filled = 0;
        for _ in 0..count {
            let content = allocator.create(ctx);
            if !self.pool_for(ctx.scope(), allocator).prefill_one(content) {
                break;
            }
            filled += 1;
        }
        filled
    }

    /// Drops every pool owned by `scope`. Pools of other scopes are
    /// unaffected, and subsequent acquires under `scope` start from empty
    /// pools, never returning content tied to the destroyed scope.
    pub fn evict_scope(&mut self, scope: ScopeId) {
        self.pools.retain(|&(s, _), _| s != scope);
    }

    /// Number of live pools (diagnostics).
    #[must_use]
    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    /// Number of pooled items for `allocator` within `scope`.
    #[must_use]
    pub fn pooled_len(&self, scope: ScopeId, allocator: &dyn ContentAllocator) -> usize {
        self.pools
            .get(&(scope, allocator.id()))
            .map_or(0, ContentPool::len)
    }

    fn pool_for(&mut self, scope: ScopeId, allocator: &dyn ContentAllocator) -> &mut ContentPool {
        self.pools
            .entry((scope, allocator.id()))
            .or_insert_with(|| ContentPool::new(allocator.pool_size(), allocator.pooling_policy()))
    }
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;

    use crate::terrane_harness::TestAllocator;

    use super::*;

    fn ctx(scope: u32) -> PlatformContext {
        PlatformContext::new(ScopeId(scope))
    }

    #[test]
    fn acquire_from_empty_pool_misses() {
        let mut pools = PoolManager::new();
        let alloc = TestAllocator::new(1).with_pool_size(1);
        assert!(pools.acquire(ScopeId(0), &alloc).is_none());
    }

    #[test]
    fn release_then_acquire_returns_same_instance() {
        let mut pools = PoolManager::new();
        let alloc = TestAllocator::new(1).with_pool_size(1);
        let content = alloc.create(&ctx(0));

        assert!(pools.release(ScopeId(0), &alloc, content.clone()));
        let recycled = pools.acquire(ScopeId(0), &alloc).unwrap();
        assert!(
            Rc::ptr_eq(&content, &recycled),
            "pool must hand back the exact released instance"
        );
    }

    #[test]
    fn release_refuses_at_capacity() {
        let mut pools = PoolManager::new();
        let alloc = TestAllocator::new(1).with_pool_size(1);

        assert!(pools.release(ScopeId(0), &alloc, alloc.create(&ctx(0))));
        assert!(
            !pools.release(ScopeId(0), &alloc, alloc.create(&ctx(0))),
            "second release exceeds capacity"
        );
        assert_eq!(pools.pooled_len(ScopeId(0), &alloc), 1);
    }

    #[test]
    fn acquire_only_pools_fill_via_prefill_only() {
        let mut pools = PoolManager::new();
        let alloc = TestAllocator::new(1)
            .with_pool_size(2)
            .with_policy(PoolingPolicy::AcquireOnly);

        assert!(!pools.release(ScopeId(0), &alloc, alloc.create(&ctx(0))));
        assert_eq!(pools.prefill(&ctx(0), &alloc, 5), 2, "prefill caps at pool size");
        assert!(pools.acquire(ScopeId(0), &alloc).is_some());
        assert!(pools.acquire(ScopeId(0), &alloc).is_some());
        assert!(pools.acquire(ScopeId(0), &alloc).is_none());
    }

    #[test]
    fn disabled_pools_never_hold_content() {
        let mut pools = PoolManager::new();
        let alloc = TestAllocator::new(1).with_policy(PoolingPolicy::Disabled);

        assert!(!pools.release(ScopeId(0), &alloc, alloc.create(&ctx(0))));
        assert_eq!(pools.prefill(&ctx(0), &alloc, 3), 0);
        assert!(pools.acquire(ScopeId(0), &alloc).is_none());
    }

    #[test]
    fn evicting_a_scope_leaves_other_scopes_alone() {
        let mut pools = PoolManager::new();
        let alloc = TestAllocator::new(1).with_pool_size(2);

        assert!(pools.release(ScopeId(0), &alloc, alloc.create(&ctx(0))));
        assert!(pools.release(ScopeId(1), &alloc, alloc.create(&ctx(1))));

        pools.evict_scope(ScopeId(0));

        assert!(
            pools.acquire(ScopeId(0), &alloc).is_none(),
            "destroyed scope must not return stale content"
        );
        assert!(pools.acquire(ScopeId(1), &alloc).is_some());
    }

    #[test]
    fn scopes_do_not_share_pools() {
        let mut pools = PoolManager::new();
        let alloc = TestAllocator::new(1).with_pool_size(1);

        assert!(pools.release(ScopeId(0), &alloc, alloc.create(&ctx(0))));
        assert!(
            pools.acquire(ScopeId(1), &alloc).is_none(),
            "content released under one scope is invisible to another"
        );
    }
}
