//! # Sigscope GDScript
//!
//! Source reader for GDScript (`.gd`) files, producing the tree the signal extractor walks.
//!
//! ## Architecture
//!
//! ```text
//! Source Text
//!     │
//!     ├──> BOM stripped, UTF-8 checked
//!     │
//!     └──> tree-sitter (tree-sitter-gdscript grammar)
//!          ├─> Godot 3 and Godot 4 syntax: signals, lambdas, accessors, $Node / %Unique
//!          └─> Any ERROR or MISSING node rejects the file
//! ```
//!
//! A file the grammar had to recover from is an [`AstError::ParseError`] carrying the line of
//! the first damaged node.
//!
//! ## Example
//!
//! ```rust
//! use sigscope_gdscript::{AstProvider, GdScriptProvider};
//!
//! let provider = GdScriptProvider::new();
//! let tree = provider
//!     .parse_string("signal died\n\nfunc hit():\n\tdied.emit()\n")
//!     .unwrap();
//!
//! let signals: Vec<&str> = tree
//!     .nodes_of_kind("signal_statement")
//!     .into_iter()
//!     .filter_map(|node| node.child_by_field_name("name"))
//!     .map(|name| tree.text(name))
//!     .collect();
//! assert_eq!(signals, vec!["died"]);
//! ```

mod error;
mod provider;
mod tree;

pub use error::{AstError, Result};
pub use provider::{is_source_file, parse_source, AstProvider, GdScriptProvider, SOURCE_EXTENSION};
pub use tree::{named_children, node_line, ScriptTree};
