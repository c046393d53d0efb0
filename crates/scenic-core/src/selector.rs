//! String selectors used by rules to match nodes.
//!
//! Grammar:
//! - `*`: any node carrying a non-null `data.entityType`.
//! - `entityType:<v>`: exact match on `data.entityType`.
//! - `tag:<v>`: membership test on `data.tags` (a string sequence).
//! - `name:<v>`: exact match on the node's `name`.
//! - `type:<v>`: exact match on the node's variant tag.
//!
//! Unknown prefixes and colon-less strings never match and never error;
//! selectors originate from non-deterministic external authors.

use scenic_schema::Node;
use serde_json::Value;

/// Evaluates one selector against one node. Position in the tree is
/// irrelevant; proximity rules call this against every other node.
pub fn matches(node: &Node, selector: &str) -> bool {
    if selector == "*" {
        return entity_type(node).is_some();
    }
    let Some((prefix, value)) = selector.split_once(':') else {
        return false;
    };
    match prefix {
        "entityType" => entity_type(node) == Some(value),
        "tag" => node
            .data
            .get("tags")
            .and_then(Value::as_array)
            .is_some_and(|tags| tags.iter().any(|t| t.as_str() == Some(value))),
        "name" => node.name.as_deref() == Some(value),
        "type" => node.kind.type_name() == value,
        _ => false,
    }
}

fn entity_type(node: &Node) -> Option<&str> {
    node.data.get("entityType").and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenic_schema::NodeKind;

    fn fish() -> Node {
        let mut node = Node::new("f1", NodeKind::Circle { radius: 2.0 });
        node.name = Some("nemo".to_string());
        node.data
            .insert("entityType".to_string(), Value::from("fish"));
        node.data
            .insert("tags".to_string(), Value::from(vec!["sea", "small"]));
        node
    }

    #[test]
    fn star_requires_entity_type() {
        assert!(matches(&fish(), "*"));
        let plain = Node::new("r", NodeKind::Rect {
            width: 1.0,
            height: 1.0,
            corner_radius: 0.0,
        });
        assert!(!matches(&plain, "*"));
    }

    #[test]
    fn prefixed_selectors() {
        let node = fish();
        assert!(matches(&node, "entityType:fish"));
        assert!(!matches(&node, "entityType:crab"));
        assert!(matches(&node, "tag:sea"));
        assert!(!matches(&node, "tag:land"));
        assert!(matches(&node, "name:nemo"));
        assert!(matches(&node, "type:circle"));
        assert!(!matches(&node, "type:rect"));
    }

    #[test]
    fn malformed_selectors_never_match() {
        let node = fish();
        assert!(!matches(&node, "fish"));
        assert!(!matches(&node, ""));
        assert!(!matches(&node, "species:fish"));
        assert!(!matches(&node, ":"));
    }
}
