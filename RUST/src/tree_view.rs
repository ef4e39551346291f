//! Flattened, expandable view over the projected forest.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::dataset::GridId;
use crate::hierarchy::HierarchyNode;

#[derive(Clone, Debug)]
pub struct FlatRow {
    pub depth: usize,
    pub node: Arc<HierarchyNode>,
    pub expanded: bool,
}

impl FlatRow {
    pub fn is_leaf(&self) -> bool {
        self.node.is_leaf()
    }
}

#[derive(Debug, Default)]
pub struct TreeView {
    roots: Vec<Arc<HierarchyNode>>,
    expanded: BTreeMap<GridId, bool>,
    flat: Vec<FlatRow>,
    selected: usize,
    scroll: u16,
}

impl TreeView {
    /// Roots start expanded.
    pub fn new(roots: Vec<Arc<HierarchyNode>>) -> Self {
        let mut expanded = BTreeMap::new();
        for r in &roots {
            expanded.insert(r.backref, true);
        }
        let mut view = Self {
            roots,
            expanded,
            flat: Vec::new(),
            selected: 0,
            scroll: 0,
        };
        view.recompute_flat();
        view
    }

    pub fn roots(&self) -> &[Arc<HierarchyNode>] {
        &self.roots
    }

    pub fn rows(&self) -> &[FlatRow] {
        &self.flat
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn scroll(&self) -> u16 {
        self.scroll
    }

    pub fn selected_row(&self) -> Option<&FlatRow> {
        self.flat.get(self.selected)
    }

    /// The node under the cursor.
    pub fn highlighted(&self) -> Option<Arc<HierarchyNode>> {
        self.selected_row().map(|r| Arc::clone(&r.node))
    }

    fn recompute_flat(&mut self) {
        self.flat.clear();
        for root in &self.roots {
            flatten_visible(root, 0, &mut self.flat, &self.expanded);
        }
        if self.selected >= self.flat.len() && !self.flat.is_empty() {
            self.selected = self.flat.len() - 1;
        }
    }

    /// Expand or collapse the highlighted branch. Leaves are ignored.
    pub fn toggle_expand_selected(&mut self, expand: bool) {
        let Some(row) = self.selected_row() else { return };
        if row.is_leaf() {
            return;
        }
        let id = row.node.backref;
        self.expanded.insert(id, expand);
        self.recompute_flat();
    }

    /// Move the cursor by `delta` rows. Returns the newly highlighted node
    /// when the cursor landed on a different row.
    pub fn move_sel(&mut self, delta: i32) -> Option<Arc<HierarchyNode>> {
        if self.flat.is_empty() {
            self.selected = 0;
            self.scroll = 0;
            return None;
        }
        let cur = self.selected as i64;
        let next = (cur + delta as i64).clamp(0, (self.flat.len() - 1) as i64) as usize;
        self.select(next)
    }

    pub fn select_first(&mut self) -> Option<Arc<HierarchyNode>> {
        self.select(0)
    }

    pub fn select_last(&mut self) -> Option<Arc<HierarchyNode>> {
        self.select(self.flat.len().saturating_sub(1))
    }

    fn select(&mut self, index: usize) -> Option<Arc<HierarchyNode>> {
        if index >= self.flat.len() || index == self.selected {
            return None;
        }
        self.selected = index;
        if self.selected == 0 {
            self.scroll = 0;
        }
        let sel = u16::try_from(self.selected).unwrap_or(u16::MAX);
        if sel < self.scroll {
            self.scroll = sel;
        }
        self.highlighted()
    }

    /// Scroll offset for a viewport of `viewport_h` rows that keeps the cursor visible.
    pub fn visible_scroll(&self, viewport_h: u16) -> u16 {
        let scroll = clamp_scroll(self.scroll, self.flat.len(), viewport_h);
        if self.flat.is_empty() {
            return scroll;
        }
        ensure_visible(scroll, u16::try_from(self.selected).unwrap_or(u16::MAX), viewport_h)
    }
}

pub fn clamp_scroll(scroll: u16, content_len: usize, viewport_h: u16) -> u16 {
    if viewport_h == 0 {
        return 0;
    }
    let content_len = u16::try_from(content_len).unwrap_or(u16::MAX);
    if content_len <= viewport_h {
        return 0;
    }
    let max_scroll = content_len.saturating_sub(viewport_h);
    scroll.min(max_scroll)
}

pub fn ensure_visible(scroll: u16, sel: u16, viewport_h: u16) -> u16 {
    if viewport_h == 0 {
        return scroll;
    }
    let top = scroll;
    let bottom = scroll.saturating_add(viewport_h.saturating_sub(1));
    if sel < top {
        sel
    } else if sel > bottom {
        sel.saturating_sub(viewport_h.saturating_sub(1))
    } else {
        scroll
    }
}

fn flatten_visible(
    node: &Arc<HierarchyNode>,
    depth: usize,
    out: &mut Vec<FlatRow>,
    expanded: &BTreeMap<GridId, bool>,
) {
    let is_expanded = expanded.get(&node.backref).copied().unwrap_or(false);
    out.push(FlatRow {
        depth,
        node: Arc::clone(node),
        expanded: is_expanded,
    });

    if node.is_leaf() || !is_expanded {
        return;
    }

    for ch in &node.children {
        flatten_visible(ch, depth + 1, out, expanded);
    }
}
