// Copyright 2026 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The incremental mount engine.
//!
//! [`MountState`] owns the live [`MountItem`] table for one mounted
//! hierarchy and reconciles it against successive render trees. Mounting a
//! new tree diffs by render unit id:
//!
//! - unchanged ids whose binders report no update stay mounted untouched
//!   (they may still *move* between host positions without rebinding);
//! - ids absent from the next tree unmount in reverse mount order;
//! - new ids mount in traversal order, parents before children.
//!
//! [`MountDelegate`] fans lifecycle callbacks out to the registered
//! [`RenderCoreExtension`](crate::extension::RenderCoreExtension) set and
//! tracks the logical mount references extensions acquire on ids. A
//! reference count must reach zero before a physical unmount is allowed;
//! while any prevent-mount extension is registered, new non-root ids mount
//! only once some extension acquires them.
//!
//! State machine per hierarchy: Unmounted → Mounted → (Attached ⇄
//! Detached) → Unmounted. Attach and detach run the attach binder list for
//! every mounted item and are fully independent of mount and unmount.
//!
//! All operations must be serialized by the caller on one owner thread;
//! nothing here is internally synchronized.

mod delegate;
mod item;
mod state;

use alloc::string::String;

use thiserror::Error;

use crate::unit::BindError;

pub use delegate::MountDelegate;
pub use item::{MountFlags, MountItem, MountItemId};
pub use state::MountState;

/// A binder execution failure, wrapped with the owning render unit's and
/// binder's descriptions.
///
/// Structural invariant violations (duplicate ids, non-host parents,
/// mismatched fixed binder counts) are bugs and panic instead.
#[derive(Debug, Error)]
pub enum MountError {
    /// A binder's `bind` failed. The item's content is left in an
    /// undefined state; the failure is never swallowed.
    #[error("failed to bind {binder} on {unit}: {source}")]
    Bind {
        /// Description of the owning render unit.
        unit: String,
        /// Description of the failing binder.
        binder: String,
        /// The underlying binder error.
        source: BindError,
    },
    /// A binder's `unbind` failed.
    #[error("failed to unbind {binder} on {unit}: {source}")]
    Unbind {
        /// Description of the owning render unit.
        unit: String,
        /// Description of the failing binder.
        binder: String,
        /// The underlying binder error.
        source: BindError,
    },
}
