use tree_sitter::{Node, Tree};

/// A parsed script: the tree-sitter tree plus the text it was built from.
///
/// Node byte ranges index into [`ScriptTree::source`].
#[derive(Debug, Clone)]
pub struct ScriptTree {
    source: String,
    tree: Tree,
}

impl ScriptTree {
    pub(crate) fn new(source: String, tree: Tree) -> Self {
        Self { source, tree }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root_node(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Verbatim source text of `node`
    pub fn text(&self, node: Node<'_>) -> &str {
        self.source.get(node.byte_range()).unwrap_or_default()
    }

    /// Source text from the start of `first` to the end of `last`
    pub fn span_text(&self, first: Node<'_>, last: Node<'_>) -> &str {
        self.source
            .get(first.start_byte()..last.end_byte())
            .unwrap_or_default()
    }

    /// Visit every named node in document order, comments excluded
    pub fn walk<'t>(&'t self, mut visit: impl FnMut(Node<'t>)) {
        self.preorder(|node| {
            if node.is_named() && !node.is_extra() {
                visit(node);
            }
            true
        });
    }

    /// Named nodes of one kind, in document order
    pub fn nodes_of_kind(&self, kind: &str) -> Vec<Node<'_>> {
        let mut nodes = Vec::new();
        self.walk(|node| {
            if node.kind() == kind {
                nodes.push(node);
            }
        });
        nodes
    }

    /// First `ERROR` or missing node, if the parser had to recover
    pub fn first_error(&self) -> Option<Node<'_>> {
        if !self.tree.root_node().has_error() {
            return None;
        }
        let mut found = None;
        self.preorder(|node| {
            if node.is_error() || node.is_missing() {
                found = Some(node);
                return false;
            }
            true
        });
        found
    }

    /// Depth-first walk; stops as soon as `visit` returns false
    fn preorder<'t>(&'t self, mut visit: impl FnMut(Node<'t>) -> bool) {
        let mut cursor = self.tree.walk();
        loop {
            if !visit(cursor.node()) {
                return;
            }
            if cursor.goto_first_child() {
                continue;
            }
            loop {
                if cursor.goto_next_sibling() {
                    break;
                }
                if !cursor.goto_parent() {
                    return;
                }
            }
        }
    }
}

/// 1-based line a node starts on
pub fn node_line(node: Node<'_>) -> usize {
    node.start_position().row + 1
}

/// Named children of `node` without comments
pub fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| !child.is_extra())
        .collect()
}
