use sigscope_gdscript::{named_children, AstError, AstProvider, GdScriptProvider, ScriptTree};

fn parse(code: &str) -> ScriptTree {
    GdScriptProvider::new()
        .parse_string(code)
        .expect("parsing failed")
}

fn signal_names(tree: &ScriptTree) -> Vec<String> {
    tree.nodes_of_kind("signal_statement")
        .into_iter()
        .filter_map(|node| node.child_by_field_name("name"))
        .map(|name| tree.text(name).to_string())
        .collect()
}

/// Callee text of every call: `f` for `f()`, `a.b.f` for `a.b.f()`
fn called(tree: &ScriptTree) -> Vec<String> {
    let mut out = Vec::new();
    tree.walk(|node| match node.kind() {
        "call" => {
            if let Some(function) = named_children(node).first() {
                out.push(tree.text(*function).to_string());
            }
        }
        "attribute" => {
            let parts = named_children(node);
            for part in parts.iter().skip(1).filter(|p| p.kind() == "attribute_call") {
                if let Some(method) = named_children(*part).first() {
                    out.push(tree.span_text(parts[0], *method).to_string());
                }
            }
        }
        _ => {}
    });
    out
}

const PLAYER: &str = r#"@tool
class_name Player
extends CharacterBody2D
## Player controller

signal health_changed(new_health: int)
signal died
signal _internal_tick

enum State { IDLE, RUNNING = 2, DEAD }

const SPEED := 300.0
@export var max_health: int = 100
@onready var sprite: AnimatedSprite2D = $Sprite
@onready var hud := %Hud

var health := max_health:
	set(value):
		health = clampi(value, 0, max_health)
		health_changed.emit(health)

var inventory: Array[String] = []
var stats: Dictionary[String, int] = {}

func _ready() -> void:
	hud.retry_pressed.connect(_on_retry, CONNECT_DEFERRED | CONNECT_ONE_SHOT)
	$Timer.timeout.connect(func(): emit_signal("_internal_tick"))
	for item: String in inventory:
		print(item)
	match state:
		State.IDLE, State.RUNNING:
			pass
		_:
			push_warning("odd state %s" % state)

func take_damage(amount: int, source: Node = null) -> void:
	if amount <= 0:
		return
	health -= amount
	if health == 0 and not is_queued_for_deletion():
		died.emit()
	elif source != null:
		(source as Enemy).hit_confirmed.emit(self)

static func describe(p: Player) -> String:
	return "Player(%d)" % p.health

class Buff extends RefCounted:
	signal expired
	var remaining := 3.0

	func tick(delta: float):
		remaining -= delta
		if remaining <= 0.0: expired.emit()
"#;

#[test]
fn finds_signals_everywhere_in_a_player_script() {
    let tree = parse(PLAYER);
    assert_eq!(
        signal_names(&tree),
        vec![
            "health_changed".to_string(),
            "died".to_string(),
            "_internal_tick".to_string(),
            "expired".to_string(),
        ]
    );
}

#[test]
fn reaches_calls_in_accessors_lambdas_and_inner_classes() {
    let tree = parse(PLAYER);
    let calls = called(&tree);
    for expected in [
        "health_changed.emit",
        "hud.retry_pressed.connect",
        "$Timer.timeout.connect",
        "emit_signal",
        "died.emit",
        "(source as Enemy).hit_confirmed.emit",
        "expired.emit",
        "push_warning",
    ] {
        assert!(
            calls.iter().any(|c| c == expected),
            "missing call {expected}, got: {calls:?}"
        );
    }
}

#[test]
fn godot3_style_script_parses() {
    let code = r#"extends Node

signal score_changed

var score = 0 setget set_score

func _ready():
	connect("score_changed", self, "_on_score_changed", [], CONNECT_ONESHOT)
	yield(get_tree(), "idle_frame")

func set_score(value):
	score = value
	emit_signal("score_changed", score)
"#;
    let tree = parse(code);
    assert_eq!(signal_names(&tree), vec!["score_changed".to_string()]);
    let calls = called(&tree);
    assert!(calls.contains(&"connect".to_string()), "{calls:?}");
    assert!(calls.contains(&"emit_signal".to_string()), "{calls:?}");
}

#[test]
fn unknown_syntax_is_rejected_with_its_line() {
    let code = "func a():\n\tvar x = ?? weird ??\n\tfirst.emit()\n";
    let err = GdScriptProvider::new().parse_string(code).unwrap_err();
    assert!(matches!(err, AstError::ParseError { .. }), "{err:?}");
    assert_eq!(err.line(), Some(2));
}

#[test]
fn multiline_lambda_arguments_parse() {
    let code = "func _ready():\n\tbutton.pressed.connect(func():\n\t\tclicked.emit()\n\t)\n\tdone.emit()\n";
    let tree = parse(code);
    assert_eq!(tree.nodes_of_kind("lambda").len(), 1);
    assert_eq!(
        called(&tree),
        vec![
            "button.pressed.connect".to_string(),
            "clicked.emit".to_string(),
            "done.emit".to_string(),
        ]
    );
}
