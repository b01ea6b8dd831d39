use mnemo_graph::Graph;
use serde_json::Value;

/// Configures label inference via [infer_labels].
#[derive(Debug, Clone)]
pub struct InferConfig {
    /// Entity attribute keys to also check for name-like strings, beyond
    /// the entity's own label, e.g. "aliases" or "nickname".
    pub attr_keys: Vec<String>,

    /// Minimum rune length a candidate name must have to be considered a
    /// match. Guards against single-character names matching almost any
    /// text by coincidence.
    pub min_name_len: usize,
}

impl Default for InferConfig {
    fn default() -> Self {
        Self { attr_keys: Vec::new(), min_name_len: 2 }
    }
}

/// Scan every entity in the graph and return the labels whose display name
/// (or a configured attribute value) appears as a substring of `text`.
///
/// Labels are returned deduplicated and sorted ascending.
pub fn infer_labels(graph: &dyn Graph, text: &str, cfg: &InferConfig) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let mut hits = std::collections::BTreeSet::new();

    let Ok(entities) = graph.list_entities("") else {
        return Vec::new();
    };

    for entity in &entities {
        let name = display_name(&entity.label);
        if matches(name, text, cfg.min_name_len) {
            hits.insert(entity.label.clone());
            continue;
        }

        for key in &cfg.attr_keys {
            if attr_matches(entity.attrs.get(key), text, cfg.min_name_len) {
                hits.insert(entity.label.clone());
                break;
            }
        }
    }

    hits.into_iter().collect()
}

/// The portion of a label after its first namespace separator, e.g.
/// "person:小明" → "小明". Labels without a separator are returned as-is.
fn display_name(label: &str) -> &str {
    match label.find(':') {
        Some(idx) => &label[idx + 1..],
        None => label,
    }
}

fn rune_len(s: &str) -> usize {
    s.chars().count()
}

fn matches(name: &str, text: &str, min_name_len: usize) -> bool {
    !name.is_empty() && rune_len(name) >= min_name_len && text.contains(name)
}

fn attr_matches(value: Option<&Value>, text: &str, min_name_len: usize) -> bool {
    match value {
        Some(Value::String(s)) => matches(s, text, min_name_len),
        Some(Value::Array(items)) => items.iter().any(|v| match v {
            Value::String(s) => matches(s, text, min_name_len),
            _ => false,
        }),
        _ => false,
    }
}
