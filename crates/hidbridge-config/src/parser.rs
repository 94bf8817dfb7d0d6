//! KDL configuration parser

use std::collections::HashMap;
use std::path::Path;

use crate::error::ConfigError;
use crate::model::*;

/// Rebuild a span from offset/len, kdl spans come from an older miette version
fn to_span(offset: usize, len: usize) -> miette::SourceSpan {
    miette::SourceSpan::from((offset, len))
}

/// Load the configuration file.
///
/// With `None` the default path is used and a missing file falls back to the
/// built-in defaults. An explicitly requested path must exist.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    match path {
        Some(path) => parse_config(path),
        None => {
            let path = Path::new(DEFAULT_CONFIG_PATH);
            if path.exists() {
                parse_config(path)
            } else {
                tracing::info!(
                    "No configuration at {}, using built-in defaults",
                    path.display()
                );
                Ok(Config::default())
            }
        }
    }
}

/// Parse a configuration file from the given path
pub fn parse_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config_str(&content)
}

/// Parse configuration from a string
pub fn parse_config_str(content: &str) -> Result<Config, ConfigError> {
    let doc: kdl::KdlDocument = content.parse().map_err(|e: kdl::KdlError| {
        let span = to_span(e.span.offset(), e.span.len());
        ConfigError::ParseError {
            src: content.to_string(),
            span,
            source: e,
        }
    })?;

    let mut config = Config::default();

    for node in doc.nodes() {
        match node.name().value() {
            "gadget" => parse_gadget(node, &mut config.gadget),
            "input" => parse_input(node, &mut config.input),
            "remap" => {
                config.remap = parse_key_value_block(node, "remap", content)?;
            }
            "chord" => {
                config.chord = parse_chord(node, content)?;
            }
            name => {
                tracing::warn!("Unknown top-level node: {}", name);
            }
        }
    }

    validate(&config)?;

    Ok(config)
}

fn first_string(node: &kdl::KdlNode) -> Option<&str> {
    node.entries().first().and_then(|e| e.value().as_string())
}

fn parse_gadget(node: &kdl::KdlNode, gadget: &mut GadgetConfig) {
    if let Some(children) = node.children() {
        for child in children.nodes() {
            match (child.name().value(), first_string(child)) {
                ("keyboard", Some(path)) => {
                    gadget.keyboard = shellexpand::tilde(path).into_owned().into();
                }
                ("mouse", Some(path)) => {
                    gadget.mouse = shellexpand::tilde(path).into_owned().into();
                }
                (name, _) => {
                    tracing::warn!("Unknown gadget config option: {}", name);
                }
            }
        }
    }
}

fn parse_input(node: &kdl::KdlNode, input: &mut InputConfig) {
    if let Some(children) = node.children() {
        for child in children.nodes() {
            match (child.name().value(), first_string(child)) {
                ("watch-dir", Some(path)) => {
                    input.watch_dir = shellexpand::tilde(path).into_owned().into();
                }
                (name, _) => {
                    tracing::warn!("Unknown input config option: {}", name);
                }
            }
        }
    }
}

fn parse_chord(node: &kdl::KdlNode, source: &str) -> Result<ChordLayer, ConfigError> {
    let entry = node.entries().first().ok_or_else(|| ConfigError::MissingField {
        field: "chord trigger key (e.g., `chord \"RightCtrl\" { ... }`)".to_string(),
    })?;

    let name = entry.value().as_string().unwrap_or_default();
    let trigger = canonical_key(name).ok_or_else(|| ConfigError::UnknownKey {
        key: name.to_string(),
        context: "chord".to_string(),
        src: source.to_string(),
        span: to_span(entry.span().offset(), entry.span().len()),
    })?;

    Ok(ChordLayer {
        trigger,
        keys: parse_key_value_block(node, "chord", source)?,
    })
}

fn parse_key_value_block(
    node: &kdl::KdlNode,
    context: &str,
    source: &str,
) -> Result<HashMap<String, String>, ConfigError> {
    let mut map = HashMap::new();

    let unknown = |key: &str, offset: usize, len: usize| ConfigError::UnknownKey {
        key: key.to_string(),
        context: context.to_string(),
        src: source.to_string(),
        span: to_span(offset, len),
    };

    if let Some(children) = node.children() {
        for child in children.nodes() {
            let from_name = child.name().value();
            let from_span = child.name().span();
            let from = canonical_key(from_name)
                .ok_or_else(|| unknown(from_name, from_span.offset(), from_span.len()))?;

            let entry = child.entries().first().ok_or_else(|| ConfigError::MissingField {
                field: format!("target key for '{}' in {} block", from_name, context),
            })?;
            let to_name = entry.value().as_string().unwrap_or_default();
            let to = canonical_key(to_name)
                .ok_or_else(|| unknown(to_name, entry.span().offset(), entry.span().len()))?;

            if map.insert(from, to).is_some() {
                tracing::warn!("Duplicate {} entry for {}, last one wins", context, from_name);
            }
        }
    }

    Ok(map)
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    let trigger = &config.chord.trigger;

    let targeted = config
        .remap
        .values()
        .chain(config.chord.keys.values())
        .any(|to| to == trigger);

    if targeted {
        return Err(ConfigError::Invalid {
            message: format!(
                "chord trigger {} cannot be the target of a remap or chord entry",
                trigger
            ),
        });
    }

    Ok(())
}

/// Normalize a user-facing key name to its kernel name (`KEY_*`).
///
/// Accepts friendly names (`CapsLock`, `Esc`, `RightCtrl`, `F5`, `1`, `-`),
/// case-insensitively, and raw `KEY_*` names as an escape hatch. Raw names
/// are checked against the kernel's key list by the daemon.
pub fn canonical_key(name: &str) -> Option<String> {
    let upper = name.trim().to_uppercase();

    let canonical = match upper.as_str() {
        // Special keys
        "CAPSLOCK" | "CAPS_LOCK" | "CAPS" => "KEY_CAPSLOCK",
        "ESCAPE" | "ESC" => "KEY_ESC",
        "ENTER" | "RETURN" => "KEY_ENTER",
        "TAB" => "KEY_TAB",
        "SPACE" => "KEY_SPACE",
        "BACKSPACE" => "KEY_BACKSPACE",

        // Modifiers
        "LEFTCTRL" | "LCTRL" | "CTRL" => "KEY_LEFTCTRL",
        "RIGHTCTRL" | "RCTRL" => "KEY_RIGHTCTRL",
        "LEFTSHIFT" | "LSHIFT" | "SHIFT" => "KEY_LEFTSHIFT",
        "RIGHTSHIFT" | "RSHIFT" => "KEY_RIGHTSHIFT",
        "LEFTALT" | "LALT" | "ALT" => "KEY_LEFTALT",
        "RIGHTALT" | "RALT" => "KEY_RIGHTALT",
        "LEFTMETA" | "LMETA" | "SUPER" | "META" => "KEY_LEFTMETA",
        "RIGHTMETA" | "RMETA" => "KEY_RIGHTMETA",

        // Symbol keys
        "MINUS" | "-" => "KEY_MINUS",
        "EQUALS" | "EQUAL" | "=" => "KEY_EQUAL",
        "LEFTBRACE" | "LBRACE" | "[" => "KEY_LEFTBRACE",
        "RIGHTBRACE" | "RBRACE" | "]" => "KEY_RIGHTBRACE",
        "SEMICOLON" | ";" => "KEY_SEMICOLON",
        "APOSTROPHE" | "'" => "KEY_APOSTROPHE",
        "GRAVE" | "`" => "KEY_GRAVE",
        "BACKSLASH" | "\\" => "KEY_BACKSLASH",
        "COMMA" | "," => "KEY_COMMA",
        "DOT" | "PERIOD" | "." => "KEY_DOT",
        "SLASH" | "/" => "KEY_SLASH",

        // Arrow keys
        "UP" | "UPARROW" => "KEY_UP",
        "DOWN" | "DOWNARROW" => "KEY_DOWN",
        "LEFT" | "LEFTARROW" => "KEY_LEFT",
        "RIGHT" | "RIGHTARROW" => "KEY_RIGHT",

        // Navigation keys
        "HOME" => "KEY_HOME",
        "END" => "KEY_END",
        "PAGEUP" | "PGUP" => "KEY_PAGEUP",
        "PAGEDOWN" | "PGDN" | "PGDOWN" => "KEY_PAGEDOWN",
        "INSERT" | "INS" => "KEY_INSERT",
        "DELETE" | "DEL" => "KEY_DELETE",

        "NUMLOCK" | "NUM_LOCK" => "KEY_NUMLOCK",
        "SCROLLLOCK" | "SCROLL_LOCK" => "KEY_SCROLLLOCK",

        // Letters and digits
        single if single.len() == 1 && single.chars().all(|c| c.is_ascii_alphanumeric()) => {
            return Some(format!("KEY_{}", single));
        }

        // Function keys F1-F24
        function if is_function_key(function) => {
            return Some(format!("KEY_{}", function));
        }

        raw if raw.len() > 4 && raw.starts_with("KEY_") => {
            return Some(raw.to_string());
        }

        _ => return None,
    };

    Some(canonical.to_string())
}

fn is_function_key(name: &str) -> bool {
    name.strip_prefix('F')
        .and_then(|n| n.parse::<u8>().ok())
        .map(|n| (1..=24).contains(&n))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config_str("").expect("empty config should parse");
        assert_eq!(config, Config::default());
        assert_eq!(config.gadget.keyboard, PathBuf::from("/dev/hidg0"));
        assert_eq!(config.gadget.mouse, PathBuf::from("/dev/hidg1"));
        assert_eq!(config.input.watch_dir, PathBuf::from("/dev/input"));
    }

    #[test]
    fn test_default_tables() {
        let config = Config::default();
        assert_eq!(config.remap.get("KEY_ESC").map(String::as_str), Some("KEY_GRAVE"));
        assert_eq!(config.remap.get("KEY_CAPSLOCK").map(String::as_str), Some("KEY_ESC"));
        assert_eq!(config.chord.trigger, "KEY_RIGHTCTRL");
        assert_eq!(config.chord.keys.len(), 13);
        assert_eq!(config.chord.keys.get("KEY_0").map(String::as_str), Some("KEY_F10"));
    }

    #[test]
    fn test_parse_full_config() {
        let config = r#"
            gadget {
                keyboard "/dev/hidg2"
                mouse "/dev/hidg3"
            }
            input {
                watch-dir "/tmp/input"
            }
            remap {
                CapsLock "LeftCtrl"
            }
            chord "RightAlt" {
                "1" "F1"
                H "Left"
            }
        "#;

        let config = parse_config_str(config).expect("config should parse");
        assert_eq!(config.gadget.keyboard, PathBuf::from("/dev/hidg2"));
        assert_eq!(config.gadget.mouse, PathBuf::from("/dev/hidg3"));
        assert_eq!(config.input.watch_dir, PathBuf::from("/tmp/input"));

        // A remap block replaces the default table
        assert_eq!(config.remap.len(), 1);
        assert_eq!(
            config.remap.get("KEY_CAPSLOCK").map(String::as_str),
            Some("KEY_LEFTCTRL")
        );

        assert_eq!(config.chord.trigger, "KEY_RIGHTALT");
        assert_eq!(config.chord.keys.len(), 2);
        assert_eq!(config.chord.keys.get("KEY_1").map(String::as_str), Some("KEY_F1"));
        assert_eq!(config.chord.keys.get("KEY_H").map(String::as_str), Some("KEY_LEFT"));
    }

    #[test]
    fn test_unknown_key_reports_context() {
        let config = r#"
            remap {
                CapsLock "NotAKey"
            }
        "#;

        match parse_config_str(config) {
            Err(ConfigError::UnknownKey { key, context, .. }) => {
                assert_eq!(key, "NotAKey");
                assert_eq!(context, "remap");
            }
            other => panic!("expected UnknownKey, got {:?}", other),
        }
    }

    #[test]
    fn test_chord_without_trigger_is_error() {
        let config = r#"
            chord {
                "1" "F1"
            }
        "#;

        let result = parse_config_str(config);
        assert!(matches!(result, Err(ConfigError::MissingField { .. })));
    }

    #[test]
    fn test_trigger_as_remap_target_is_rejected() {
        let config = r#"
            remap {
                CapsLock "RightCtrl"
            }
        "#;

        let result = parse_config_str(config);
        assert!(
            matches!(result, Err(ConfigError::Invalid { .. })),
            "remapping onto the chord trigger must be rejected"
        );
    }

    #[test]
    fn test_invalid_kdl_is_parse_error() {
        let result = parse_config_str("remap {");
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_unknown_nodes_are_ignored() {
        let config = r#"
            global {
                log-level "debug"
            }
        "#;

        assert!(parse_config_str(config).is_ok());
    }

    #[test]
    fn test_canonical_key_names() {
        assert_eq!(canonical_key("CapsLock").as_deref(), Some("KEY_CAPSLOCK"));
        assert_eq!(canonical_key("esc").as_deref(), Some("KEY_ESC"));
        assert_eq!(canonical_key("a").as_deref(), Some("KEY_A"));
        assert_eq!(canonical_key("7").as_deref(), Some("KEY_7"));
        assert_eq!(canonical_key("`").as_deref(), Some("KEY_GRAVE"));
        assert_eq!(canonical_key("F12").as_deref(), Some("KEY_F12"));
        assert_eq!(canonical_key("f24").as_deref(), Some("KEY_F24"));
        assert_eq!(canonical_key("RCtrl").as_deref(), Some("KEY_RIGHTCTRL"));
        assert_eq!(canonical_key("KEY_102ND").as_deref(), Some("KEY_102ND"));
    }

    #[test]
    fn test_canonical_key_rejects_unknown() {
        assert_eq!(canonical_key("F25"), None);
        assert_eq!(canonical_key("F0"), None);
        assert_eq!(canonical_key("Hyper"), None);
        assert_eq!(canonical_key("KEY_"), None);
        assert_eq!(canonical_key(""), None);
    }

    #[test]
    fn test_load_config_from_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(file, "gadget {{\n    keyboard \"/dev/hidg5\"\n}}").expect("write config");

        let config = load_config(Some(file.path())).expect("config should load");
        assert_eq!(config.gadget.keyboard, PathBuf::from("/dev/hidg5"));
        assert_eq!(config.gadget.mouse, PathBuf::from("/dev/hidg1"));
    }

    #[test]
    fn test_load_config_explicit_missing_path_is_error() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let missing = dir.path().join("missing.kdl");

        let result = load_config(Some(&missing));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
