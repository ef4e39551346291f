use std::rc::Rc;

use crate::dataset::GridMeta;
use crate::hierarchy::HierarchyNode;
use crate::reactive::Memo;
use crate::selection::SelectionModel;

fn fmt_vec_f64(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{:.6}", x)).collect();
    format!("[{}]", parts.join(", "))
}

fn fmt_dims(dims: &[usize]) -> String {
    if dims.is_empty() {
        return "[?]".to_string();
    }
    let parts: Vec<String> = dims.iter().map(|d| d.to_string()).collect();
    format!("[{}]", parts.join(" x "))
}

/// Metadata text for the selected grid, one `key = value` per line.
#[derive(Debug, Default)]
pub struct GridDetailsPanel {
    text: Memo<u64, Vec<String>>,
}

impl GridDetailsPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self, selection: &SelectionModel) -> Rc<Vec<String>> {
        self.text
            .get_or_compute(selection.version(), || match selection.current() {
                Some(node) => describe(node),
                None => vec!["No grid selected.".to_string()],
            })
    }

    pub fn computations(&self) -> u64 {
        self.text.computations()
    }
}

fn describe(node: &HierarchyNode) -> Vec<String> {
    let meta = GridMeta::new(
        node.bounds.left.clone(),
        node.bounds.right.clone(),
        node.level,
        node.dims.clone(),
    );
    let cells: usize = node.dims.iter().product();
    vec![
        format!("Left Edge = {}", fmt_vec_f64(&node.bounds.left)),
        format!("Right Edge = {}", fmt_vec_f64(&node.bounds.right)),
        format!("Active Dimensions = {}", fmt_dims(&node.dims)),
        format!("Cell Width = {}", fmt_vec_f64(&meta.cell_width())),
        format!("Level = {}", node.level),
        format!("Cells = {}", cells),
        format!("Children = {}", node.children.len()),
    ]
}
