use crate::error::{AstError, Result};
use crate::tree::{node_line, ScriptTree};
use std::path::Path;
use tree_sitter::Parser;

/// File extension of GDScript sources
pub const SOURCE_EXTENSION: &str = "gd";

/// Check whether a path names a GDScript source file
pub fn is_source_file(path: impl AsRef<Path>) -> bool {
    path.as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(SOURCE_EXTENSION))
}

/// Turns script source into a [`ScriptTree`].
///
/// Implementations are shared across scanner workers, so they must be `Send + Sync` and
/// parsing must not depend on call order.
pub trait AstProvider: Send + Sync {
    /// Prepare the provider; called once before any file is parsed
    fn init(&self) -> Result<()> {
        Ok(())
    }

    /// Parse source text
    fn parse_string(&self, source: &str) -> Result<ScriptTree>;

    /// Read and parse a file
    fn parse_file(&self, path: &Path) -> Result<ScriptTree> {
        let bytes = std::fs::read(path)?;
        let source = String::from_utf8(bytes)
            .map_err(|e| AstError::InvalidEncoding(format!("{}: {e}", path.display())))?;
        self.parse_string(&source)
    }
}

/// The bundled GDScript reader
#[derive(Debug, Clone, Copy, Default)]
pub struct GdScriptProvider;

impl GdScriptProvider {
    pub const fn new() -> Self {
        Self
    }
}

impl AstProvider for GdScriptProvider {
    fn init(&self) -> Result<()> {
        new_parser().map(|_| ())
    }

    fn parse_string(&self, source: &str) -> Result<ScriptTree> {
        // Editors on Windows save a BOM more often than not
        let source = source.strip_prefix('\u{feff}').unwrap_or(source);
        parse_source(source)
    }
}

fn new_parser() -> Result<Parser> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_gdscript::LANGUAGE.into())
        .map_err(|e| AstError::InitError(format!("Failed to set language: {e}")))?;
    Ok(parser)
}

/// Parse GDScript source, rejecting anything the grammar had to recover from.
///
/// A parser is built per call so providers stay shareable across workers.
pub fn parse_source(source: &str) -> Result<ScriptTree> {
    let mut parser = new_parser()?;
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| AstError::parse(1, "Failed to parse source code"))?;
    let tree = ScriptTree::new(source.to_string(), tree);

    if tree.root_node().has_error() {
        let (line, message) = match tree.first_error() {
            Some(node) if node.is_missing() => {
                (node_line(node), format!("missing `{}`", node.kind()))
            }
            Some(node) => (
                node_line(node),
                format!("unexpected `{}`", snippet(tree.text(node))),
            ),
            None => (1, "syntax error".to_string()),
        };
        log::trace!("GDScript parse error at line {line}: {message}");
        return Err(AstError::parse(line, message));
    }
    Ok(tree)
}

fn snippet(text: &str) -> String {
    let first = text.lines().next().unwrap_or_default().trim();
    if first.chars().count() > 40 {
        format!("{}...", first.chars().take(40).collect::<String>())
    } else {
        first.to_string()
    }
}
