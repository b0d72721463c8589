//! Input AST representation (§6.1).
//!
//! The analyzer does not tokenize or parse source text; it walks a tree that
//! some external producer (a parser, or a test building one by hand) hands
//! it. The tree is JSON-shaped, matching a typical `ast.dump`-style output:
//! every node carries a tag (`_astname`), a position, and tag-specific
//! children. We deserialize it with `serde_json` rather than modeling one
//! Rust variant per node shape, since the host's grammar is out of scope and
//! the shape is the external contract, not ours to redesign.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::scope::Position;

/// One AST node. Fields beyond `_astname`/`lineno`/`col_offset` vary by tag
/// and are looked up by name out of `fields` on demand.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AstNode {
    #[serde(rename = "_astname", default)]
    pub astname: String,
    #[serde(default)]
    pub lineno: u32,
    #[serde(default)]
    pub col_offset: u32,
    #[serde(flatten)]
    pub fields: std::collections::BTreeMap<String, Value>,
}

impl AstNode {
    pub fn position(&self) -> Position {
        Position { line: self.lineno, column: self.col_offset }
    }

    /// A malformed-AST-safe way to reach a named child field, decoded as an
    /// `AstNode`. `None` if the field is absent or not node-shaped.
    pub fn node_field(&self, name: &str) -> Option<AstNode> {
        self.fields.get(name).and_then(|v| {
            if v.is_null() {
                None
            } else {
                serde_json::from_value(v.clone()).ok()
            }
        })
    }

    /// A named field holding a list of child nodes.
    pub fn list_field(&self, name: &str) -> Vec<AstNode> {
        self.fields
            .get(name)
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| serde_json::from_value(v.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// A named field holding a list of bare strings (e.g. `FunctionDef.args`).
    pub fn string_list_field(&self, name: &str) -> Vec<String> {
        self.fields
            .get(name)
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| {
                        v.as_str()
                            .map(String::from)
                            .or_else(|| v.get("id").and_then(|i| i.as_str()).map(String::from))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn string_field(&self, name: &str) -> Option<String> {
        self.fields.get(name).and_then(|v| v.as_str()).map(String::from)
    }

    /// The `.v` unwrap convention (§6.1) for identifier-shaped nodes
    /// (`Name`): prefers a bare `id` string field, falling back to a `.v`
    /// wrapper (`{"v": "name"}`) some producers use instead.
    pub fn identifier(&self) -> Option<String> {
        self.string_field("id").or_else(|| {
            self.fields
                .get("id")
                .and_then(|v| v.get("v"))
                .and_then(|v| v.as_str())
                .map(String::from)
        })
    }

    /// A field that is either a bare tag string (`"Add"`) or a nested node
    /// carrying one (`{"_astname": "Add"}`), used for `BinOp.op` and
    /// `Name.ctx`.
    pub fn tag_field(&self, name: &str) -> Option<String> {
        let v = self.fields.get(name)?;
        if let Some(s) = v.as_str() {
            return Some(s.to_string());
        }
        v.get("_astname").and_then(|t| t.as_str()).map(String::from)
    }

    /// `FunctionDef.args`: tolerates either a flat list of parameter
    /// names/nodes, or a nested `arguments`-style node whose own `args`
    /// field holds the list (the host AST producer is out of scope, per
    /// §6.1, so both shapes are accepted).
    pub fn param_names(&self) -> Vec<String> {
        fn names_from_array(arr: &[Value]) -> Vec<String> {
            arr.iter()
                .filter_map(|v| {
                    v.as_str()
                        .map(String::from)
                        .or_else(|| v.get("arg").and_then(|a| a.as_str()).map(String::from))
                        .or_else(|| v.get("id").and_then(|a| a.as_str()).map(String::from))
                })
                .collect()
        }
        match self.fields.get("args") {
            Some(Value::Array(arr)) => names_from_array(arr),
            Some(Value::Object(obj)) => obj.get("args").and_then(|v| v.as_array()).map(|arr| names_from_array(arr)).unwrap_or_default(),
            _ => Vec::new(),
        }
    }
}
