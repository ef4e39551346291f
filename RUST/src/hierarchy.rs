//! Projection of a spatial index into a navigable presentation tree.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::dataset::{GridId, GridMeta, SpatialIndex};
use crate::error::{BrowseError, Result};

/// Deepest chain below a root the projector follows before giving up.
pub const MAX_DEPTH: usize = 10_000;

/// Low and high corners of a grid in physical space.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    pub left: Vec<f64>,
    pub right: Vec<f64>,
}

impl Bounds {
    /// True when `other` lies inside `self` on every axis both share.
    pub fn contains(&self, other: &Bounds) -> bool {
        let lo = self.left.iter().zip(&other.left).all(|(a, b)| a <= b);
        let hi = self.right.iter().zip(&other.right).all(|(a, b)| a >= b);
        lo && hi
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Leaf,
    Expandable,
}

/// Presentation node mirroring one grid of the index.
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchyNode {
    pub label: String,
    pub bounds: Bounds,
    pub level: u32,
    pub dims: Vec<usize>,
    /// Handle back into the index; field data stays there.
    pub backref: GridId,
    pub children: Vec<Arc<HierarchyNode>>,
}

impl HierarchyNode {
    pub fn kind(&self) -> NodeKind {
        if self.children.is_empty() {
            NodeKind::Leaf
        } else {
            NodeKind::Expandable
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.kind() == NodeKind::Leaf
    }

    /// Nodes in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.walk(&mut |_: &HierarchyNode| count += 1);
        count
    }

    /// Pre-order visit of this subtree.
    pub fn walk(&self, f: &mut dyn FnMut(&HierarchyNode)) {
        let mut stack: Vec<&HierarchyNode> = vec![self];
        while let Some(node) = stack.pop() {
            f(node);
            for child in node.children.iter().rev() {
                stack.push(child);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectOptions {
    pub max_depth: usize,
}

impl Default for ProjectOptions {
    fn default() -> Self {
        Self { max_depth: MAX_DEPTH }
    }
}

/// A node whose children are still being materialized.
struct Frame {
    node: HierarchyNode,
    pending: std::vec::IntoIter<GridId>,
}

impl Frame {
    fn open<I: SpatialIndex + ?Sized>(index: &I, id: GridId) -> Result<Self> {
        let GridMeta {
            left_edge,
            right_edge,
            level,
            dims,
        } = index.meta(id)?;
        let children = index.children(id)?;
        Ok(Self {
            node: HierarchyNode {
                label: index.label(id)?,
                bounds: Bounds {
                    left: left_edge,
                    right: right_edge,
                },
                level,
                dims,
                backref: id,
                children: Vec::with_capacity(children.len()),
            },
            pending: children.into_iter(),
        })
    }

    fn finish(self) -> HierarchyNode {
        let node = self.node;
        for child in &node.children {
            if !node.bounds.contains(&child.bounds) {
                warn!(
                    parent = %node.backref,
                    child = %child.backref,
                    "child bounds extend outside parent bounds"
                );
            }
        }
        node
    }
}

/// Project every root of `index` with the default depth guard.
pub fn project<I: SpatialIndex + ?Sized>(index: &I) -> Result<Vec<Arc<HierarchyNode>>> {
    project_with(index, ProjectOptions::default())
}

/// Build one fully materialized tree per root, children in source order.
///
/// The walk is an explicit-stack pre-order traversal, so its depth is bounded
/// by `opts.max_depth` rather than by the thread's stack.
pub fn project_with<I: SpatialIndex + ?Sized>(
    index: &I,
    opts: ProjectOptions,
) -> Result<Vec<Arc<HierarchyNode>>> {
    let roots = index.roots();
    let mut out = Vec::with_capacity(roots.len());

    for root in roots {
        let mut on_path: HashSet<GridId> = HashSet::from([root]);
        let mut stack = vec![Frame::open(index, root)?];

        while let Some(top) = stack.last_mut() {
            match top.pending.next() {
                Some(child) => {
                    if on_path.contains(&child) {
                        return Err(BrowseError::CyclicHierarchy { grid: child });
                    }
                    // Depth of `child` below the root equals the current stack height.
                    if stack.len() > opts.max_depth {
                        return Err(BrowseError::HierarchyTooDeep {
                            limit: opts.max_depth,
                        });
                    }
                    on_path.insert(child);
                    stack.push(Frame::open(index, child)?);
                }
                None => {
                    let Some(frame) = stack.pop() else { break };
                    on_path.remove(&frame.node.backref);
                    let node = Arc::new(frame.finish());
                    match stack.last_mut() {
                        Some(parent) => parent.node.children.push(node),
                        None => out.push(node),
                    }
                }
            }
        }
    }

    debug!(
        roots = out.len(),
        nodes = out.iter().map(|r| r.node_count()).sum::<usize>(),
        "hierarchy projected"
    );
    Ok(out)
}
