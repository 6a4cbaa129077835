// Copyright 2026 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reduction: lowering a layout-result tree into a flat render tree.
//!
//! [`reduce`] walks the [`LayoutResult`] tree depth-first and emits one
//! [`RenderTreeNode`] per layout result that carries a render unit.
//! Transparent wrapper results (no unit) are collapsed: their children
//! attach to the nearest ancestor host, with bounds translated into that
//! host's coordinates.
//!
//! A unit becomes its own **host boundary** only where view grouping is
//! structurally required: it renders a view and some descendant emits
//! output, or a registered extension's layout visitor requests a host for
//! it. Drawables are never hosts.
//!
//! Zero-sized non-leaf results keep their subtrees; children may have
//! nonzero size that accessibility or testing needs, so nothing is pruned
//! by size.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::any::Any;

use kurbo::{Insets, Point, Rect};

use crate::constraints::SizeConstraints;
use crate::extension::{ExtensionId, RenderCoreExtension};
use crate::trace::Tracer;
use crate::tree::{INVALID, RenderTree, RenderTreeNode};
use crate::unit::{LayoutData, RenderType, RenderUnit};

/// One node of the layout engine's output tree.
///
/// Supplied by the external layout engine; the reducer only reads it.
/// Bounds are relative to the parent layout result.
pub trait LayoutResult {
    /// The render unit resolved for this result, if it mounts anything.
    fn render_unit(&self) -> Option<Rc<RenderUnit>>;

    /// Bounds relative to the parent layout result.
    fn bounds(&self) -> Rect;

    /// Padding inside the bounds.
    fn padding(&self) -> Insets {
        Insets::ZERO
    }

    /// Number of child results.
    fn child_count(&self) -> usize;

    /// The child at `index`.
    fn child_at(&self, index: usize) -> &dyn LayoutResult;

    /// Opaque payload handed to binders through the render tree node.
    fn layout_data(&self) -> Option<LayoutData> {
        None
    }
}

/// Visits every layout result during reduction.
///
/// Created fresh per reduction pass via
/// [`RenderCoreExtension::create_layout_visitor`]; the side output returned
/// by [`finish`](Self::finish) is exposed as the extension's result on the
/// produced tree.
pub trait LayoutResultVisitor {
    /// Called for every layout result in traversal order. `position` is the
    /// traversal-order number the result's node received, or would receive
    /// if it emitted one.
    fn visit(&mut self, _result: &dyn LayoutResult, _absolute_bounds: Rect, _position: u32) {}

    /// Whether this visitor requires a host boundary at `result`.
    fn requires_host(&self, _result: &dyn LayoutResult, _absolute_bounds: Rect) -> bool {
        false
    }

    /// Produces the accumulated side output.
    fn finish(&mut self) -> Option<Rc<dyn Any>> {
        None
    }
}

/// Reduces a layout-result tree into a [`RenderTree`].
///
/// `generation` becomes the tree's generation; extensions contribute layout
/// visitors whose side outputs land in the tree's extension results.
///
/// # Panics
///
/// Panics if the root result has no render unit, or if two emitted units
/// share an id (see [`RenderTree::new`]).
#[must_use]
pub fn reduce(
    root: &dyn LayoutResult,
    constraints: SizeConstraints,
    generation: u64,
    extensions: &[Rc<dyn RenderCoreExtension>],
) -> RenderTree {
    reduce_traced(root, constraints, generation, extensions, &mut Tracer::disabled())
}

/// Like [`reduce`], with pipeline tracing.
#[must_use]
pub fn reduce_traced(
    root: &dyn LayoutResult,
    constraints: SizeConstraints,
    generation: u64,
    extensions: &[Rc<dyn RenderCoreExtension>],
    tracer: &mut Tracer,
) -> RenderTree {
    tracer.on_reduce_begin(generation);

    let mut visitors: Vec<(ExtensionId, Box<dyn LayoutResultVisitor>)> = extensions
        .iter()
        .filter_map(|e| e.create_layout_visitor().map(|v| (e.id(), v)))
        .collect();

    let root_unit = root
        .render_unit()
        .unwrap_or_else(|| panic!("root layout result must carry a render unit"));

    let mut pass = ReducePass {
        nodes: Vec::new(),
        visitors: &mut visitors,
    };

    // The root is always a host boundary for its subtree.
    let root_bounds = Rect::from_origin_size(Point::ZERO, root.bounds().size());
    let root_node = Rc::new(RenderTreeNode::new(
        root_unit,
        0,
        INVALID,
        INVALID,
        0,
        root_bounds,
        root_bounds,
        root.padding(),
        root.layout_data(),
    ));
    pass.visit_all(root, root_bounds, 0);
    pass.nodes.push(root_node);

    let mut host_children = 0;
    for i in 0..root.child_count() {
        pass.walk(
            root.child_at(i),
            root_bounds.origin(),
            0,
            Point::ZERO,
            &mut host_children,
        );
    }

    let ReducePass { nodes, .. } = pass;
    let mut extension_results = BTreeMap::new();
    for (id, mut visitor) in visitors.into_iter() {
        if let Some(result) = visitor.finish() {
            extension_results.insert(id, result);
        }
    }

    let tree = RenderTree::new(nodes, generation, constraints, extension_results);
    tracer.on_reduce_end(generation, tree.len());
    tree
}

struct ReducePass<'a> {
    nodes: Vec<Rc<RenderTreeNode>>,
    visitors: &'a mut Vec<(ExtensionId, Box<dyn LayoutResultVisitor>)>,
}

impl ReducePass<'_> {
    /// Walks one layout result.
    ///
    /// `origin` is the absolute origin of the parent result; `host` is the
    /// node index of the nearest ancestor host and `host_origin` its
    /// absolute origin. `host_children` counts outputs already assigned to
    /// that host.
    fn walk(
        &mut self,
        result: &dyn LayoutResult,
        origin: Point,
        host: u32,
        host_origin: Point,
        host_children: &mut u32,
    ) {
        let rel = result.bounds();
        let absolute = Rect::from_origin_size(
            (origin.x + rel.x0, origin.y + rel.y0),
            rel.size(),
        );

        #[expect(
            clippy::cast_possible_truncation,
            reason = "node count is bounded by u32 indices"
        )]
        let position = self.nodes.len() as u32;
        self.visit_all(result, absolute, position);

        let Some(unit) = result.render_unit() else {
            // Transparent wrapper: collapse. The subtree stays under the
            // current host even when this result has zero size.
            for i in 0..result.child_count() {
                self.walk(result.child_at(i), absolute.origin(), host, host_origin, host_children);
            }
            return;
        };

        let host_relative = Rect::from_origin_size(
            (absolute.x0 - host_origin.x, absolute.y0 - host_origin.y),
            absolute.size(),
        );

        let index = position;
        let position_in_host = *host_children;
        *host_children += 1;

        let is_host = unit.render_type() == RenderType::View
            && (self.requires_host(result, absolute) || has_mountable_descendant(result));

        self.nodes.push(Rc::new(RenderTreeNode::new(
            unit,
            index,
            host,
            host,
            position_in_host,
            host_relative,
            absolute,
            result.padding(),
            result.layout_data(),
        )));

        if is_host {
            let mut own_children = 0;
            for i in 0..result.child_count() {
                self.walk(
                    result.child_at(i),
                    absolute.origin(),
                    index,
                    absolute.origin(),
                    &mut own_children,
                );
            }
        } else {
            for i in 0..result.child_count() {
                self.walk(result.child_at(i), absolute.origin(), host, host_origin, host_children);
            }
        }
    }

    fn visit_all(&mut self, result: &dyn LayoutResult, absolute: Rect, position: u32) {
        for (_, visitor) in self.visitors.iter_mut() {
            visitor.visit(result, absolute, position);
        }
    }

    fn requires_host(&self, result: &dyn LayoutResult, absolute: Rect) -> bool {
        self.visitors
            .iter()
            .any(|(_, v)| v.requires_host(result, absolute))
    }
}

/// Whether any descendant of `result` emits a render unit.
fn has_mountable_descendant(result: &dyn LayoutResult) -> bool {
    for i in 0..result.child_count() {
        let child = result.child_at(i);
        if child.render_unit().is_some() || has_mountable_descendant(child) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use crate::terrane_harness::{TestAllocator, TestLayoutResult, test_unit};

    use crate::unit::RenderUnitId;

    use super::*;

    fn view(id: u64) -> Rc<RenderUnit> {
        test_unit(id, RenderType::View, Rc::new(TestAllocator::new(0)))
    }

    fn drawable(id: u64) -> Rc<RenderUnit> {
        test_unit(id, RenderType::Drawable, Rc::new(TestAllocator::new(1)))
    }

    #[test]
    fn three_level_tree_reduces_to_three_outputs() {
        // Root 200×200 hosting:
        //  - child A: a 100×100 view leaf.
        //  - child B: a unit-less wrapper containing a 100×100 view leaf.
        // B collapses; no redundant host is created for it.
        let root = TestLayoutResult::new(Some(view(1)), Rect::new(0.0, 0.0, 200.0, 200.0))
            .child(TestLayoutResult::new(
                Some(view(2)),
                Rect::new(0.0, 0.0, 100.0, 100.0),
            ))
            .child(
                TestLayoutResult::new(None, Rect::new(0.0, 100.0, 200.0, 200.0)).child(
                    TestLayoutResult::new(Some(view(3)), Rect::new(0.0, 0.0, 100.0, 100.0)),
                ),
            );

        let tree = reduce(&root, SizeConstraints::default(), 1, &[]);

        assert_eq!(tree.len(), 3, "root + two leaves, wrapper collapsed");
        assert_eq!(tree.root().unit().id(), RenderUnitId(1));
        // Both leaves mount into the root host.
        assert_eq!(tree.node_at(1).host(), 0);
        assert_eq!(tree.node_at(2).host(), 0);
        assert_eq!(tree.node_at(1).position_in_host(), 0);
        assert_eq!(tree.node_at(2).position_in_host(), 1);
    }

    #[test]
    fn wrapper_offset_translates_into_host_coordinates() {
        let root = TestLayoutResult::new(Some(view(1)), Rect::new(0.0, 0.0, 200.0, 200.0)).child(
            TestLayoutResult::new(None, Rect::new(10.0, 20.0, 210.0, 220.0)).child(
                TestLayoutResult::new(Some(drawable(2)), Rect::new(5.0, 5.0, 55.0, 55.0)),
            ),
        );

        let tree = reduce(&root, SizeConstraints::default(), 1, &[]);

        let leaf = tree.node_at(1);
        assert_eq!(leaf.bounds(), Rect::new(15.0, 25.0, 65.0, 75.0));
        assert_eq!(leaf.absolute_bounds(), Rect::new(15.0, 25.0, 65.0, 75.0));
    }

    #[test]
    fn nested_view_with_children_becomes_its_own_host() {
        let root = TestLayoutResult::new(Some(view(1)), Rect::new(0.0, 0.0, 200.0, 200.0)).child(
            TestLayoutResult::new(Some(view(2)), Rect::new(20.0, 20.0, 120.0, 120.0)).child(
                TestLayoutResult::new(Some(drawable(3)), Rect::new(5.0, 5.0, 25.0, 25.0)),
            ),
        );

        let tree = reduce(&root, SizeConstraints::default(), 1, &[]);

        assert_eq!(tree.len(), 3);
        let inner_host = tree.node_at(1);
        let leaf = tree.node_at(2);
        assert_eq!(inner_host.host(), 0);
        assert_eq!(leaf.host(), 1, "leaf mounts into the nested host");
        assert_eq!(leaf.position_in_host(), 0);
        // Leaf bounds are relative to the nested host.
        assert_eq!(leaf.bounds(), Rect::new(5.0, 5.0, 25.0, 25.0));
        assert_eq!(leaf.absolute_bounds(), Rect::new(25.0, 25.0, 45.0, 45.0));
    }

    #[test]
    fn leaf_view_is_not_a_host() {
        let root = TestLayoutResult::new(Some(view(1)), Rect::new(0.0, 0.0, 100.0, 100.0))
            .child(TestLayoutResult::new(
                Some(view(2)),
                Rect::new(0.0, 0.0, 50.0, 50.0),
            ))
            .child(TestLayoutResult::new(
                Some(drawable(3)),
                Rect::new(50.0, 0.0, 100.0, 50.0),
            ));

        let tree = reduce(&root, SizeConstraints::default(), 1, &[]);

        // The leaf view groups nothing, so the drawable stays on the root.
        assert_eq!(tree.node_at(2).host(), 0);
    }

    #[test]
    fn zero_sized_wrapper_keeps_its_subtree() {
        let root = TestLayoutResult::new(Some(view(1)), Rect::new(0.0, 0.0, 100.0, 100.0)).child(
            TestLayoutResult::new(None, Rect::new(0.0, 0.0, 0.0, 0.0)).child(
                TestLayoutResult::new(Some(drawable(2)), Rect::new(0.0, 0.0, 40.0, 40.0)),
            ),
        );

        let tree = reduce(&root, SizeConstraints::default(), 1, &[]);

        assert_eq!(tree.len(), 2, "zero-sized non-leaf branches are not pruned");
        assert!(tree.contains(RenderUnitId(2)));
    }

    #[test]
    fn nodes_are_numbered_in_traversal_order() {
        let root = TestLayoutResult::new(Some(view(1)), Rect::new(0.0, 0.0, 100.0, 100.0))
            .child(
                TestLayoutResult::new(Some(view(2)), Rect::new(0.0, 0.0, 50.0, 50.0)).child(
                    TestLayoutResult::new(Some(drawable(3)), Rect::new(0.0, 0.0, 10.0, 10.0)),
                ),
            )
            .child(TestLayoutResult::new(
                Some(drawable(4)),
                Rect::new(0.0, 50.0, 50.0, 100.0),
            ));

        let tree = reduce(&root, SizeConstraints::default(), 1, &[]);

        let ids: alloc::vec::Vec<_> = tree.nodes().iter().map(|n| n.unit().id().0).collect();
        assert_eq!(ids, [1, 2, 3, 4], "depth-first mount order");
        for (i, node) in tree.nodes().iter().enumerate() {
            assert_eq!(node.index() as usize, i, "index matches position");
        }
    }

    #[derive(Debug)]
    struct CountingExtension;

    struct CountingVisitor {
        visited: u32,
    }

    impl LayoutResultVisitor for CountingVisitor {
        fn visit(&mut self, _result: &dyn LayoutResult, _absolute_bounds: Rect, _position: u32) {
            self.visited += 1;
        }

        fn finish(&mut self) -> Option<Rc<dyn Any>> {
            Some(Rc::new(self.visited))
        }
    }

    impl RenderCoreExtension for CountingExtension {
        fn id(&self) -> ExtensionId {
            ExtensionId(9)
        }

        fn create_layout_visitor(&self) -> Option<Box<dyn LayoutResultVisitor>> {
            Some(Box::new(CountingVisitor { visited: 0 }))
        }
    }

    #[test]
    fn layout_visitors_accumulate_side_outputs() {
        let root = TestLayoutResult::new(Some(view(1)), Rect::new(0.0, 0.0, 100.0, 100.0))
            .child(TestLayoutResult::new(
                Some(drawable(2)),
                Rect::new(0.0, 0.0, 50.0, 50.0),
            ))
            .child(
                TestLayoutResult::new(None, Rect::new(0.0, 50.0, 100.0, 100.0)).child(
                    TestLayoutResult::new(Some(drawable(3)), Rect::new(0.0, 0.0, 40.0, 40.0)),
                ),
            );

        let ext: Rc<dyn RenderCoreExtension> = Rc::new(CountingExtension);
        let tree = reduce(&root, SizeConstraints::default(), 1, &[ext]);

        let visited = tree
            .extension_result(ExtensionId(9))
            .and_then(|r| r.downcast_ref::<u32>())
            .copied();
        assert_eq!(
            visited,
            Some(4),
            "every layout result is visited, wrappers included"
        );
        assert!(tree.extension_result(ExtensionId(8)).is_none());
    }

    #[test]
    #[should_panic(expected = "duplicate render unit id")]
    fn duplicate_ids_across_branches_fail_fast() {
        let root = TestLayoutResult::new(Some(view(1)), Rect::new(0.0, 0.0, 100.0, 100.0))
            .child(TestLayoutResult::new(
                Some(drawable(7)),
                Rect::new(0.0, 0.0, 10.0, 10.0),
            ))
            .child(TestLayoutResult::new(
                Some(drawable(7)),
                Rect::new(10.0, 0.0, 20.0, 10.0),
            ));

        let _ = reduce(&root, SizeConstraints::default(), 1, &[]);
    }

    #[test]
    #[should_panic(expected = "root layout result must carry a render unit")]
    fn unitless_root_fails_fast() {
        let root = TestLayoutResult::new(None, Rect::new(0.0, 0.0, 100.0, 100.0));
        let _ = reduce(&root, SizeConstraints::default(), 1, &[]);
    }
}
