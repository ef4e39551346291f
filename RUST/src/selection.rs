use std::sync::Arc;

use crate::hierarchy::HierarchyNode;
use crate::reactive::Signal;

/// The currently highlighted hierarchy node.
///
/// One writer (the navigation handler), any number of readers; readers
/// compare [`SelectionModel::version`] against the version they last saw.
#[derive(Debug, Default)]
pub struct SelectionModel {
    current: Signal<Option<Arc<HierarchyNode>>>,
}

impl SelectionModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn highlight(&mut self, node: Arc<HierarchyNode>) {
        self.current.set(Some(node));
    }

    pub fn current(&self) -> Option<&Arc<HierarchyNode>> {
        self.current.get().as_ref()
    }

    pub fn version(&self) -> u64 {
        self.current.version()
    }
}
