// Copyright 2026 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Double-buffered resolve → layout → commit pipeline.
//!
//! A [`RenderState`] owns the *committed* side of the pipeline: the last
//! render tree that finished resolving and laying out, ready to be handed
//! to [`MountState::mount`](crate::mount::MountState::mount). Resolution is
//! driven by a caller-supplied [`ResolveFunc`] and may be deferred through
//! an [`Executor`]; whichever resolve commits last wins, and superseded
//! results are discarded at commit time without any signal.
//!
//! State-update requests enqueued between resolves are batched: however
//! many arrive, the next resolve pass sees them all at once and the queue
//! drains. Re-measuring under identical constraints short-circuits to the
//! committed tree; measuring under different constraints re-lays-out the
//! cached resolved tree without re-resolving, unless updates are pending.
//!
//! All methods must be called from the single logical owner thread, and
//! executors must run their tasks on that same thread. Nothing here is
//! internally synchronized.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::any::Any;
use core::cell::RefCell;
use core::fmt;

use kurbo::Size;

use crate::constraints::SizeConstraints;
use crate::extension::RenderCoreExtension;
use crate::reduce::{LayoutResult, reduce};
use crate::tree::RenderTree;

/// Runs deferred resolve tasks.
///
/// Tasks must execute serially and on the thread that owns the
/// [`RenderState`] that scheduled them; an implementation is free to run
/// them immediately, queue them behind the current unit of work, or post
/// them to a platform event loop.
pub trait Executor {
    /// Schedules `task` to run.
    fn execute(&self, task: Box<dyn FnOnce()>);
}

/// An [`Executor`] that runs every task inline.
#[derive(Clone, Copy, Debug, Default)]
pub struct DirectExecutor;

impl Executor for DirectExecutor {
    fn execute(&self, task: Box<dyn FnOnce()>) {
        task();
    }
}

/// Produces a layout tree for one resolve pass.
///
/// The pending state updates enqueued since the previous resolve are handed
/// over in arrival order; after the call they are gone from the queue.
pub trait ResolveFunc {
    /// Resolves the current layout root.
    fn resolve(&self, pending_updates: &[StateUpdate]) -> Rc<dyn LayoutResult>;
}

/// One opaque state-update request.
///
/// The pipeline never looks inside; it only guarantees delivery to the next
/// resolve pass, batched with every other update enqueued before it.
#[derive(Clone)]
pub struct StateUpdate(Rc<dyn Any>);

impl StateUpdate {
    /// Wraps an update payload.
    #[must_use]
    pub fn new(payload: Rc<dyn Any>) -> Self {
        Self(payload)
    }

    /// The wrapped payload.
    #[must_use]
    pub fn payload(&self) -> &Rc<dyn Any> {
        &self.0
    }
}

impl fmt::Debug for StateUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StateUpdate(..)")
    }
}

struct Inner {
    resolved: Option<Rc<dyn LayoutResult>>,
    committed: Option<Rc<RenderTree>>,
    constraints: Option<SizeConstraints>,
    pending_updates: Vec<StateUpdate>,
    extensions: Vec<Rc<dyn RenderCoreExtension>>,
    // Monotonic resolve version; a resolve only commits if it is newer
    // than the last committed one.
    schedule_version: u64,
    committed_version: u64,
}

/// Double-buffers committed render trees across resolve passes.
///
/// See the [module docs](self) for the pipeline contract.
pub struct RenderState {
    inner: Rc<RefCell<Inner>>,
    resolver: Rc<dyn ResolveFunc>,
    executor: Rc<dyn Executor>,
}

impl fmt::Debug for RenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("RenderState")
            .field("committed_version", &inner.committed_version)
            .field("schedule_version", &inner.schedule_version)
            .field("pending_updates", &inner.pending_updates.len())
            .finish_non_exhaustive()
    }
}

impl RenderState {
    /// Creates a state that resolves inline via [`DirectExecutor`].
    #[must_use]
    pub fn new(resolver: Rc<dyn ResolveFunc>) -> Self {
        Self::with_executor(resolver, Rc::new(DirectExecutor))
    }

    /// Creates a state whose async resolves run on `executor`.
    #[must_use]
    pub fn with_executor(resolver: Rc<dyn ResolveFunc>, executor: Rc<dyn Executor>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                resolved: None,
                committed: None,
                constraints: None,
                pending_updates: Vec::new(),
                extensions: Vec::new(),
                schedule_version: 0,
                committed_version: 0,
            })),
            resolver,
            executor,
        }
    }

    /// Replaces the extensions that contribute layout visitors to every
    /// subsequent reduction.
    pub fn set_extensions(&self, extensions: Vec<Rc<dyn RenderCoreExtension>>) {
        self.inner.borrow_mut().extensions = extensions;
    }

    /// Enqueues one state-update request for the next resolve pass.
    pub fn enqueue_state_update(&self, update: StateUpdate) {
        self.inner.borrow_mut().pending_updates.push(update);
    }

    /// Number of updates waiting for the next resolve.
    #[must_use]
    pub fn pending_update_count(&self) -> usize {
        self.inner.borrow().pending_updates.len()
    }

    /// Resolves and commits synchronously, draining pending updates.
    ///
    /// Lays out under the last measured constraints, or default constraints
    /// if nothing was measured yet.
    pub fn set_tree(&self) -> Rc<RenderTree> {
        let version = self.next_version();
        let constraints = self.current_constraints();
        resolve_and_commit(&self.inner, &self.resolver, version, constraints)
    }

    /// Schedules a resolve on the executor.
    ///
    /// If anything newer commits before the scheduled task runs to
    /// completion, the task's result is discarded.
    pub fn set_tree_async(&self) {
        let version = self.next_version();
        let inner = Rc::clone(&self.inner);
        let resolver = Rc::clone(&self.resolver);
        self.executor.execute(Box::new(move || {
            let constraints = inner
                .borrow()
                .constraints
                .unwrap_or_default();
            resolve_and_commit(&inner, &resolver, version, constraints);
        }));
    }

    /// Measures the tree under `constraints` and returns the root size.
    ///
    /// Identical constraints with no pending updates short-circuit to the
    /// committed tree. Different constraints re-lay-out the cached resolved
    /// tree; pending updates (or a cold state) force a full resolve.
    pub fn measure(&self, constraints: SizeConstraints) -> Size {
        enum Plan {
            Cached(Size),
            Layout(Rc<dyn LayoutResult>),
            Resolve,
        }

        let plan = {
            let inner = self.inner.borrow();
            if inner.pending_updates.is_empty() && inner.constraints == Some(constraints) {
                match &inner.committed {
                    Some(tree) => Plan::Cached(tree.root().bounds().size()),
                    None => Plan::Resolve,
                }
            } else if inner.pending_updates.is_empty() {
                match &inner.resolved {
                    Some(root) => Plan::Layout(Rc::clone(root)),
                    None => Plan::Resolve,
                }
            } else {
                Plan::Resolve
            }
        };

        let tree = match plan {
            Plan::Cached(size) => return size,
            Plan::Layout(root) => {
                let version = self.next_version();
                let extensions = self.inner.borrow().extensions.clone();
                let tree = Rc::new(reduce(root.as_ref(), constraints, version, &extensions));
                commit(&self.inner, version, constraints, root, Rc::clone(&tree));
                tree
            }
            Plan::Resolve => {
                let version = self.next_version();
                resolve_and_commit(&self.inner, &self.resolver, version, constraints)
            }
        };
        tree.root().bounds().size()
    }

    /// The last committed tree, if any.
    #[must_use]
    pub fn current_tree(&self) -> Option<Rc<RenderTree>> {
        self.inner.borrow().committed.clone()
    }

    fn current_constraints(&self) -> SizeConstraints {
        self.inner.borrow().constraints.unwrap_or_default()
    }

    fn next_version(&self) -> u64 {
        let mut inner = self.inner.borrow_mut();
        inner.schedule_version += 1;
        inner.schedule_version
    }
}

fn resolve_and_commit(
    inner: &Rc<RefCell<Inner>>,
    resolver: &Rc<dyn ResolveFunc>,
    version: u64,
    constraints: SizeConstraints,
) -> Rc<RenderTree> {
    let (updates, extensions) = {
        let mut inner = inner.borrow_mut();
        (
            core::mem::take(&mut inner.pending_updates),
            inner.extensions.clone(),
        )
    };
    let root = resolver.resolve(&updates);
    let tree = Rc::new(reduce(root.as_ref(), constraints, version, &extensions));
    commit(inner, version, constraints, root, Rc::clone(&tree));
    tree
}

fn commit(
    inner: &Rc<RefCell<Inner>>,
    version: u64,
    constraints: SizeConstraints,
    root: Rc<dyn LayoutResult>,
    tree: Rc<RenderTree>,
) {
    let mut inner = inner.borrow_mut();
    // Last committed wins; a superseded resolve is dropped on the floor.
    if version > inner.committed_version {
        inner.resolved = Some(root);
        inner.committed = Some(tree);
        inner.constraints = Some(constraints);
        inner.committed_version = version;
    }
}
