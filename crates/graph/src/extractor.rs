use crate::types::{FileSignals, SignalConnection, SignalDefinition, SignalEmission};
use sigscope_gdscript::{named_children, node_line, ScriptTree};
use std::collections::{BTreeMap, HashSet};
use tree_sitter::Node;

/// `Object.CONNECT_*` constants and their normalized names, in bit order
const CONNECT_FLAGS: &[(u64, &str, &[&str])] = &[
    (1, "deferred", &["CONNECT_DEFERRED"]),
    (2, "persist", &["CONNECT_PERSIST"]),
    (4, "one_shot", &["CONNECT_ONE_SHOT", "CONNECT_ONESHOT"]),
    (8, "reference_counted", &["CONNECT_REFERENCE_COUNTED"]),
];

/// Pulls signal facts out of one script tree.
///
/// Works on a single file in isolation; names are never resolved against other files.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalExtractor;

impl SignalExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract definitions, emissions and connections; `file_path` is stored on every fact
    pub fn extract(&self, tree: &ScriptTree, file_path: &str) -> FileSignals {
        let mut out = FileSignals::new(file_path);

        let mut visitor = CallVisitor {
            tree,
            file_path,
            out: &mut out,
        };
        tree.walk(|node| match node.kind() {
            "signal_statement" => visitor.definition(node),
            "call" => visitor.visit_call(node),
            "attribute" => visitor.visit_attribute(node),
            _ => {}
        });

        log::debug!(
            "{}: {} definitions, {} emissions, {} connections",
            file_path,
            out.definitions.len(),
            out.emissions.len(),
            out.connections.len()
        );
        out
    }
}

/// Parts of an expression as tree-sitter lays out attribute chains: `a.b.c()` is `[a, b, c()]`
fn chain(node: Node<'_>) -> Vec<Node<'_>> {
    if node.kind() == "attribute" {
        named_children(node)
    } else {
        vec![node]
    }
}

fn arguments(node: Node<'_>) -> Vec<Node<'_>> {
    node.child_by_field_name("arguments")
        .map(named_children)
        .unwrap_or_default()
}

/// Split `recv.sig` into the signal name node and its owner; the owner is empty for a bare `sig`
fn split_signal<'c, 't>(parts: &'c [Node<'t>]) -> Option<(Node<'t>, &'c [Node<'t>])> {
    let (last, owner) = parts.split_last()?;
    (last.kind() == "identifier").then_some((*last, owner))
}

struct CallVisitor<'a> {
    tree: &'a ScriptTree,
    file_path: &'a str,
    out: &'a mut FileSignals,
}

impl<'a> CallVisitor<'a> {
    fn text(&self, node: Node<'_>) -> &'a str {
        self.tree.text(node)
    }

    fn chain_text(&self, parts: &[Node<'_>]) -> String {
        match (parts.first(), parts.last()) {
            (Some(first), Some(last)) => self.tree.span_text(*first, *last).to_string(),
            _ => String::new(),
        }
    }

    fn arg_texts(&self, args: &[Node<'_>]) -> Vec<String> {
        args.iter().map(|a| self.text(*a).to_string()).collect()
    }

    /// Contents of a string or StringName literal
    fn string_literal(&self, node: Node<'_>) -> Option<&'a str> {
        matches!(node.kind(), "string" | "string_name" | "node_path")
            .then(|| unquote(self.text(node)))
    }

    fn method_name(&self, attribute_call: Node<'_>) -> Option<&'a str> {
        named_children(attribute_call)
            .first()
            .filter(|n| n.kind() == "identifier")
            .map(|n| self.text(*n))
    }

    fn definition(&mut self, node: Node<'_>) {
        let Some(name) = node.child_by_field_name("name") else {
            return;
        };

        let mut params = Vec::new();
        let mut typed = BTreeMap::new();
        if let Some(list) = node.child_by_field_name("parameters") {
            for param in named_children(list) {
                let Some((param_name, type_hint)) = self.parameter(param) else {
                    continue;
                };
                if let Some(type_hint) = type_hint {
                    typed.insert(param_name.clone(), type_hint);
                }
                params.push(param_name);
            }
        }

        self.out.definitions.push(SignalDefinition {
            name: self.text(name).to_string(),
            params,
            param_types: (!typed.is_empty()).then_some(typed),
            file_path: self.file_path.to_string(),
            line: node_line(node),
            source: self.text(node).trim_end().to_string(),
        });
    }

    fn parameter(&self, param: Node<'_>) -> Option<(String, Option<String>)> {
        match param.kind() {
            "identifier" => Some((self.text(param).to_string(), None)),
            "variadic_parameter" => self.parameter(*named_children(param).first()?),
            _ => {
                let name = named_children(param)
                    .into_iter()
                    .find(|c| c.kind() == "identifier")?;
                let type_hint = param
                    .child_by_field_name("type")
                    .filter(|t| t.kind() == "type")
                    .map(|t| self.text(t).to_string());
                Some((self.text(name).to_string(), type_hint))
            }
        }
    }

    /// `f(...)`, plus `recv.f(...)` when the grammar nests the attribute inside the call
    fn visit_call(&mut self, call: Node<'_>) {
        let Some(function) = named_children(call).first().copied() else {
            return;
        };
        let args = arguments(call);
        match function.kind() {
            "identifier" => {
                let name = self.text(function);
                self.dispatch(call, name, None, &args);
            }
            "attribute" => {
                let parts = named_children(function);
                if let [receiver @ .., method] = parts.as_slice() {
                    if method.kind() == "identifier" && !receiver.is_empty() {
                        let name = self.text(*method);
                        self.dispatch(call, name, Some(receiver), &args);
                    }
                }
            }
            _ => {}
        }
    }

    /// Every `.method(...)` segment of an attribute chain
    fn visit_attribute(&mut self, attribute: Node<'_>) {
        let parts = named_children(attribute);
        for (i, part) in parts.iter().enumerate().skip(1) {
            if part.kind() != "attribute_call" {
                continue;
            }
            let Some(method) = self.method_name(*part) else {
                continue;
            };
            self.dispatch(attribute, method, Some(&parts[..i]), &arguments(*part));
        }
    }

    fn dispatch(
        &mut self,
        at: Node<'_>,
        method: &str,
        receiver: Option<&[Node<'_>]>,
        args: &[Node<'_>],
    ) {
        match (method, receiver) {
            ("emit", Some(signal)) => self.emit(at, signal, args),
            ("emit_signal", receiver) => self.emit_signal(at, receiver, args),
            ("connect", None) => self.connect_by_name(at, None, args),
            ("connect", Some(receiver)) => {
                if args.first().and_then(|a| self.string_literal(*a)).is_some() {
                    self.connect_by_name(at, Some(receiver), args);
                } else {
                    self.connect(at, receiver, args);
                }
            }
            _ => {}
        }
    }

    /// `sig.emit(...)` or `recv.sig.emit(...)`
    fn emit(&mut self, at: Node<'_>, signal: &[Node<'_>], args: &[Node<'_>]) {
        let Some((name, owner)) = split_signal(signal) else {
            return;
        };
        let emitter = if owner.is_empty() {
            "self".to_string()
        } else {
            self.chain_text(owner)
        };
        let args = self.arg_texts(args);
        self.out.emissions.push(SignalEmission {
            signal_name: self.text(name).to_string(),
            file_path: self.file_path.to_string(),
            line: node_line(at),
            emitter,
            args,
        });
    }

    /// `emit_signal("sig", ...)` or `recv.emit_signal("sig", ...)`
    fn emit_signal(
        &mut self,
        at: Node<'_>,
        receiver: Option<&[Node<'_>]>,
        args: &[Node<'_>],
    ) {
        let Some(signal_name) = args.first().and_then(|a| self.string_literal(*a)) else {
            return;
        };
        let emitter = receiver.map_or_else(|| "self".to_string(), |r| self.chain_text(r));
        let args = self.arg_texts(&args[1..]);
        self.out.emissions.push(SignalEmission {
            signal_name: signal_name.to_string(),
            file_path: self.file_path.to_string(),
            line: node_line(at),
            emitter,
            args,
        });
    }

    /// `sig.connect(handler, flags)` or `recv.sig.connect(handler, flags)`
    fn connect(&mut self, at: Node<'_>, signal: &[Node<'_>], args: &[Node<'_>]) {
        let Some((name, owner)) = split_signal(signal) else {
            return;
        };
        let target = if owner.is_empty() {
            Some("self".to_string())
        } else {
            self.static_target(owner)
        };
        let Some(handler) = args.first() else {
            return;
        };
        let signal_name = self.text(name).to_string();
        self.push_connection(at, signal_name, target, *handler, args.get(1).copied());
    }

    /// `connect("sig", handler, flags)` and the legacy `connect("sig", obj, "method", binds, flags)`
    fn connect_by_name(
        &mut self,
        at: Node<'_>,
        receiver: Option<&[Node<'_>]>,
        args: &[Node<'_>],
    ) {
        let Some(signal_name) = args.first().and_then(|a| self.string_literal(*a)) else {
            return;
        };
        let target = match receiver {
            None => Some("self".to_string()),
            Some(r) => self.static_target(r),
        };

        let legacy_method = args.get(2).filter(|a| self.string_literal(**a).is_some());
        let (handler, flags) = match legacy_method {
            Some(method) => {
                let flags = match args.get(3) {
                    Some(binds) if binds.kind() == "array" => args.get(4),
                    other => other,
                };
                (*method, flags.copied())
            }
            None => {
                let Some(handler) = args.get(1) else {
                    return;
                };
                (*handler, args.get(2).copied())
            }
        };
        self.push_connection(at, signal_name.to_string(), target, handler, flags);
    }

    fn push_connection(
        &mut self,
        at: Node<'_>,
        signal_name: String,
        target: Option<String>,
        handler: Node<'_>,
        flags: Option<Node<'_>>,
    ) {
        let (handler, is_lambda) = self.resolve_handler(handler);
        let flags = flags.map(|f| self.decode_flags(f)).unwrap_or_default();
        self.out.connections.push(SignalConnection {
            signal_name,
            file_path: self.file_path.to_string(),
            line: node_line(at),
            target,
            handler,
            flags,
            is_lambda,
        });
    }

    fn resolve_handler(&self, handler: Node<'_>) -> (String, bool) {
        match handler.kind() {
            "identifier" => (self.text(handler).to_string(), false),
            "string" | "string_name" => (unquote(self.text(handler)).to_string(), false),
            "attribute" => self.resolve_chain(&chain(handler)),
            "lambda" => {
                let label = match handler.child_by_field_name("name") {
                    Some(name) => format!("<lambda:{}>@{}", self.text(name), node_line(handler)),
                    None => format!("<lambda>@{}", node_line(handler)),
                };
                (label, true)
            }
            "call" => {
                let function = named_children(handler).first().copied();
                let args = arguments(handler);
                match function {
                    Some(f) if f.kind() == "identifier" && self.text(f) == "Callable" => {
                        match args.as_slice() {
                            [_, method] if self.string_literal(*method).is_some() => {
                                self.resolve_handler(*method)
                            }
                            [method] => self.resolve_handler(*method),
                            _ => (self.text(handler).to_string(), false),
                        }
                    }
                    Some(f) if f.kind() == "attribute" => match named_children(f).as_slice() {
                        [owner @ .., last]
                            if !owner.is_empty()
                                && matches!(self.text(*last), "bind" | "unbind") =>
                        {
                            self.resolve_chain(owner)
                        }
                        _ => (self.text(handler).to_string(), false),
                    },
                    _ => (self.text(handler).to_string(), false),
                }
            }
            _ => (self.text(handler).to_string(), false),
        }
    }

    fn resolve_chain(&self, parts: &[Node<'_>]) -> (String, bool) {
        match parts {
            [single] => self.resolve_handler(*single),
            [_, .., last] if last.kind() == "identifier" => (self.text(*last).to_string(), false),
            [owner @ .., last]
                if !owner.is_empty()
                    && last.kind() == "attribute_call"
                    && matches!(self.method_name(*last), Some("bind" | "unbind")) =>
            {
                self.resolve_chain(owner)
            }
            _ => (self.chain_text(parts), false),
        }
    }

    /// Receiver text when it is built only from `self`, identifiers and node references
    fn static_target(&self, receiver: &[Node<'_>]) -> Option<String> {
        is_static(receiver).then(|| self.chain_text(receiver))
    }

    fn decode_flags(&self, node: Node<'_>) -> Vec<String> {
        let mut flags = Vec::new();
        self.collect_flags(node, &mut flags);
        let mut seen = HashSet::new();
        flags.retain(|f| seen.insert(f.clone()));
        flags
    }

    fn collect_flags(&self, node: Node<'_>, flags: &mut Vec<String>) {
        let text = self.text(node);
        match node.kind() {
            "binary_operator" => {
                let op = node.child_by_field_name("op").map(|op| self.text(op));
                let left = node.child_by_field_name("left");
                let right = node.child_by_field_name("right");
                match (op, left, right) {
                    (Some("|" | "+"), Some(left), Some(right)) => {
                        self.collect_flags(left, flags);
                        self.collect_flags(right, flags);
                    }
                    _ => flags.push(text.to_string()),
                }
            }
            "integer" => match parse_int(text) {
                Some(bits) => {
                    let mut known = 0;
                    for (bit, name, _) in CONNECT_FLAGS {
                        if bits & bit != 0 {
                            flags.push((*name).to_string());
                            known |= bit;
                        }
                    }
                    if bits & !known != 0 {
                        flags.push(text.to_string());
                    }
                }
                None => flags.push(text.to_string()),
            },
            "identifier" | "attribute" => {
                let constant = chain(node)
                    .last()
                    .filter(|n| n.kind() == "identifier")
                    .map(|n| self.text(*n));
                match constant.and_then(flag_name) {
                    Some(name) => flags.push(name.to_string()),
                    None => flags.push(text.to_string()),
                }
            }
            _ => flags.push(text.to_string()),
        }
    }
}

/// Strip the quotes (and `&`/`^` prefix) off a string literal's source text
fn unquote(text: &str) -> &str {
    let body = text.strip_prefix(['&', '^']).unwrap_or(text);
    for quote in ["\"\"\"", "'''", "\"", "'"] {
        if body.len() >= 2 * quote.len() {
            if let Some(inner) = body
                .strip_prefix(quote)
                .and_then(|b| b.strip_suffix(quote))
            {
                return inner;
            }
        }
    }
    body
}

fn flag_name(constant: &str) -> Option<&'static str> {
    CONNECT_FLAGS
        .iter()
        .find(|(_, _, constants)| constants.contains(&constant))
        .map(|(_, name, _)| *name)
}

fn parse_int(text: &str) -> Option<u64> {
    let text = text.replace('_', "");
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else if let Some(bin) = text.strip_prefix("0b").or_else(|| text.strip_prefix("0B")) {
        u64::from_str_radix(bin, 2).ok()
    } else {
        text.parse().ok()
    }
}

/// `self`, identifiers and node references, optionally followed by plain `.name` segments
fn is_static(parts: &[Node<'_>]) -> bool {
    match parts.split_first() {
        Some((base, rest)) => {
            matches!(base.kind(), "identifier" | "get_node")
                && rest.iter().all(|p| p.kind() == "identifier")
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sigscope_gdscript::{AstProvider, GdScriptProvider};

    fn extract(src: &str) -> FileSignals {
        let tree = GdScriptProvider::new().parse_string(src).unwrap();
        SignalExtractor::new().extract(&tree, "scenes/player.gd")
    }

    #[test]
    fn definitions_keep_source_and_types() {
        let out = extract("signal hit(amount: int, source)\nsignal died\n");
        assert_eq!(out.definitions.len(), 2);

        let hit = &out.definitions[0];
        assert_eq!(hit.params, vec!["amount".to_string(), "source".to_string()]);
        assert_eq!(
            hit.param_types,
            Some(BTreeMap::from([("amount".to_string(), "int".to_string())]))
        );
        assert_eq!(hit.source, "signal hit(amount: int, source)");
        assert_eq!(hit.file_path, "scenes/player.gd");
        assert_eq!(hit.line, 1);

        assert_eq!(out.definitions[1].param_types, None);
        assert_eq!(out.definitions[1].line, 2);
    }

    #[test]
    fn emission_forms() {
        let src = "func f():\n\tdied.emit()\n\t$Hud.score.emit(1, 2)\n\temit_signal(\"hit\", 5)\n\tenemy.emit_signal(\"hit\")\n\temit_signal(name_var)\n";
        let out = extract(src);
        let got: Vec<(String, String, Vec<String>, usize)> = out
            .emissions
            .iter()
            .map(|e| (e.signal_name.clone(), e.emitter.clone(), e.args.clone(), e.line))
            .collect();
        assert_eq!(
            got,
            vec![
                ("died".to_string(), "self".to_string(), vec![], 2),
                (
                    "score".to_string(),
                    "$Hud".to_string(),
                    vec!["1".to_string(), "2".to_string()],
                    3
                ),
                ("hit".to_string(), "self".to_string(), vec!["5".to_string()], 4),
                ("hit".to_string(), "enemy".to_string(), vec![], 5),
            ]
        );
    }

    #[test]
    fn connection_forms_normalize_handlers() {
        let src = r#"func _ready():
	died.connect(_on_died)
	$Hud.retry.connect(game.restart, CONNECT_DEFERRED | CONNECT_ONE_SHOT)
	connect("hit", _on_hit)
	enemy.connect("hit", self, "_on_enemy_hit", [], 4)
	timer.timeout.connect(Callable(self, "_tick"), 3)
	timer.timeout.connect(_on_timeout.bind(1))
	get_node("X").ready.connect(func named(): pass)
	items[0].picked.connect(func(): pass, Object.CONNECT_PERSIST | 64)
"#;
        let out = extract(src);
        let got: Vec<(&str, Option<&str>, &str, Vec<&str>, bool)> = out
            .connections
            .iter()
            .map(|c| {
                (
                    c.signal_name.as_str(),
                    c.target.as_deref(),
                    c.handler.as_str(),
                    c.flags.iter().map(String::as_str).collect(),
                    c.is_lambda,
                )
            })
            .collect();
        assert_eq!(
            got,
            vec![
                ("died", Some("self"), "_on_died", vec![], false),
                ("retry", Some("$Hud"), "restart", vec!["deferred", "one_shot"], false),
                ("hit", Some("self"), "_on_hit", vec![], false),
                ("hit", Some("enemy"), "_on_enemy_hit", vec!["one_shot"], false),
                ("timeout", Some("timer"), "_tick", vec!["deferred", "persist"], false),
                ("timeout", Some("timer"), "_on_timeout", vec![], false),
                ("ready", None, "<lambda:named>@8", vec![], true),
                ("picked", None, "<lambda>@9", vec!["persist", "64"], true),
            ]
        );
    }

    #[test]
    fn lambda_bodies_are_visited() {
        let src = "func _ready():\n\tbutton.pressed.connect(func(): clicked.emit())\n\tvar on_up = func():\n\t\treleased.emit(1)\n\tbutton.button_up.connect(on_up)\n";
        let out = extract(src);
        let handlers: Vec<(&str, bool)> = out
            .connections
            .iter()
            .map(|c| (c.handler.as_str(), c.is_lambda))
            .collect();
        assert_eq!(handlers, vec![("<lambda>@2", true), ("on_up", false)]);

        let emitted: Vec<(&str, usize)> = out
            .emissions
            .iter()
            .map(|e| (e.signal_name.as_str(), e.line))
            .collect();
        assert_eq!(emitted, vec![("clicked", 2), ("released", 4)]);
    }

    #[test]
    fn string_name_and_node_path_literals_are_unquoted() {
        let out = extract("func f():\n\temit_signal(&\"hit\")\n\tconnect(\"hit\", Callable(self, &\"_on_hit\"))\n");
        assert_eq!(out.emissions[0].signal_name, "hit");
        assert_eq!(out.connections[0].handler, "_on_hit");
        assert_eq!(unquote("\"\"\"doc\"\"\""), "doc");
        assert_eq!(unquote("'single'"), "single");
    }

    #[test]
    fn chained_receivers_keep_their_text() {
        let out = extract("func f():\n\tself.owner.hud.updated.emit()\n\t%Menu.opened.connect(_on_open)\n");
        assert_eq!(out.emissions[0].emitter, "self.owner.hud");
        assert_eq!(out.connections[0].target.as_deref(), Some("%Menu"));
    }

    #[test]
    fn unrelated_calls_are_ignored() {
        let out = extract("func f():\n\tprint(\"emit\")\n\tget_signal().emit()\n\tconnect(sig_var, h)\n");
        assert!(out.is_empty());
    }
}
