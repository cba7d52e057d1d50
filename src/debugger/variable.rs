//! Normalization of the runtime's flat variable maps.
//!
//! The server reports locals and generator variables as one flat map with
//! dotted and indexed keys (`a`, `a.b`, `a[0][1]`, `self.x[2].y`) and every
//! value rendered as a string. The adapter canonicalizes the keys to pure
//! dot form and exposes two views: a nested tree for REPL lookups, and a
//! prefix listing over the flat keys for the DAP variables request.

use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;

/// Canonical form of a variable name: every `[k]` index becomes `.k`.
/// Idempotent, already-canonical names pass through unchanged.
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '[' => {
                if !out.is_empty() && !out.ends_with('.') {
                    out.push('.');
                }
            }
            ']' => {}
            c => out.push(c),
        }
    }
    out
}

/// Normalize every key of a raw server map, preserving the server's order.
pub fn normalize_map(raw: HashMap<String, String>) -> IndexMap<String, String> {
    let mut entries: Vec<(String, String)> = raw.into_iter().collect();
    entries.sort_by(|(a, _), (b, _)| a.cmp(b));
    entries
        .into_iter()
        .map(|(k, v)| (normalize_name(&k), v))
        .collect()
}

/// A leaf value. All-digit strings are reported as integers, anything else
/// stays a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarValue {
    Int(i64),
    Str(String),
}

impl VarValue {
    pub fn parse(raw: &str) -> VarValue {
        if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = raw.parse::<i64>() {
                return VarValue::Int(n);
            }
        }
        VarValue::Str(raw.to_string())
    }
}

impl fmt::Display for VarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarValue::Int(n) => write!(f, "{n}"),
            VarValue::Str(s) => write!(f, "{s}"),
        }
    }
}

/// One node of the reconstructed variable tree.
#[derive(Debug, Clone, PartialEq)]
pub enum VarNode {
    Value(VarValue),
    Object(IndexMap<String, VarNode>),
    Array(Vec<VarNode>),
}

impl VarNode {
    /// Build the tree from a normalized flat map.
    ///
    /// Two passes: the first splits each key on `.` and grows nested
    /// objects, the second converts every object whose keys are exactly
    /// `0..n-1` into an ordered sequence. Sparse index sets stay objects,
    /// which is why the conversion cannot happen during insertion.
    pub fn from_flat(flat: &IndexMap<String, String>) -> VarNode {
        let mut root = IndexMap::new();
        for (key, value) in flat {
            let segments: Vec<&str> = key.split('.').collect();
            insert_path(&mut root, &segments, value);
        }
        seal(VarNode::Object(root), true)
    }

    /// Walk the tree along a normalized dotted path.
    pub fn lookup(&self, path: &str) -> Option<&VarNode> {
        let mut node = self;
        for seg in path.split('.') {
            node = match node {
                VarNode::Object(fields) => fields.get(seg)?,
                VarNode::Array(items) => items.get(seg.parse::<usize>().ok()?)?,
                VarNode::Value(_) => return None,
            };
        }
        Some(node)
    }

    /// Flatten back to normalized keys (leaves only).
    pub fn flatten(&self) -> IndexMap<String, VarValue> {
        let mut out = IndexMap::new();
        flatten_into(self, String::new(), &mut out);
        out
    }
}

impl fmt::Display for VarNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarNode::Value(v) => write!(f, "{v}"),
            VarNode::Object(fields) => {
                write!(f, "{{")?;
                for (i, (name, node)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {node}")?;
                }
                write!(f, "}}")
            }
            VarNode::Array(items) => {
                write!(f, "[")?;
                for (i, node) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{node}")?;
                }
                write!(f, "]")
            }
        }
    }
}

fn insert_path(fields: &mut IndexMap<String, VarNode>, path: &[&str], value: &str) {
    let [seg, rest @ ..] = path else { return };

    if rest.is_empty() {
        // A name can be both a leaf and a prefix of deeper names; the
        // structured form wins over the rendered leaf.
        if !matches!(fields.get(*seg), Some(VarNode::Object(_))) {
            fields.insert(seg.to_string(), VarNode::Value(VarValue::parse(value)));
        }
        return;
    }

    let child = fields
        .entry(seg.to_string())
        .or_insert_with(|| VarNode::Object(IndexMap::new()));
    if !matches!(child, VarNode::Object(_)) {
        *child = VarNode::Object(IndexMap::new());
    }
    let VarNode::Object(child_fields) = child else {
        unreachable!()
    };
    insert_path(child_fields, rest, value);
}

/// Second pass: dense integer keyed objects become arrays. The magic `self`
/// name never collapses, array detection starts after it.
fn seal(node: VarNode, root: bool) -> VarNode {
    match node {
        VarNode::Object(fields) => {
            let sealed: IndexMap<String, VarNode> = fields
                .into_iter()
                .map(|(name, child)| {
                    let keep_object = root && name == "self";
                    let child = seal(child, false);
                    (name, if keep_object { unseal(child) } else { child })
                })
                .collect();

            match dense_indices(&sealed) {
                Some(order) => VarNode::Array(
                    order
                        .into_iter()
                        .map(|k| sealed.get(&k).cloned().expect("key from the same map"))
                        .collect(),
                ),
                None => VarNode::Object(sealed),
            }
        }
        other => other,
    }
}

/// Revert a just-sealed array back to its object form (for `self`).
fn unseal(node: VarNode) -> VarNode {
    match node {
        VarNode::Array(items) => VarNode::Object(
            items
                .into_iter()
                .enumerate()
                .map(|(i, item)| (i.to_string(), item))
                .collect(),
        ),
        other => other,
    }
}

/// If the object's keys are exactly `"0", "1", ..., "n-1"`, return them in
/// numeric order.
fn dense_indices(fields: &IndexMap<String, VarNode>) -> Option<Vec<String>> {
    if fields.is_empty() {
        return None;
    }
    let mut indices = Vec::with_capacity(fields.len());
    for key in fields.keys() {
        indices.push(key.parse::<usize>().ok()?);
    }
    let mut sorted = indices.clone();
    sorted.sort_unstable();
    if sorted.iter().enumerate().any(|(i, &n)| i != n) {
        return None;
    }
    Some(sorted.into_iter().map(|n| n.to_string()).collect())
}

fn flatten_into(node: &VarNode, prefix: String, out: &mut IndexMap<String, VarValue>) {
    match node {
        VarNode::Value(v) => {
            out.insert(prefix, v.clone());
        }
        VarNode::Object(fields) => {
            for (name, child) in fields {
                let path = if prefix.is_empty() {
                    name.clone()
                } else {
                    format!("{prefix}.{name}")
                };
                flatten_into(child, path, out);
            }
        }
        VarNode::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                let path = if prefix.is_empty() {
                    i.to_string()
                } else {
                    format!("{prefix}.{i}")
                };
                flatten_into(child, path, out);
            }
        }
    }
}

// ------------------------------- flat prefix listing --------------------------------------------

/// One direct child of a logical path, as presented to the DAP client.
#[derive(Debug, Clone, PartialEq)]
pub enum ChildEntry {
    Leaf {
        name: String,
        value: VarValue,
    },
    /// A compound child; `path` is the logical path of the child itself.
    Compound {
        name: String,
        path: String,
        is_array: bool,
    },
}

impl ChildEntry {
    pub fn name(&self) -> &str {
        match self {
            ChildEntry::Leaf { name, .. } => name,
            ChildEntry::Compound { name, .. } => name,
        }
    }
}

/// List the direct children of `prefix` (empty string for the top level)
/// over a normalized flat map. A compound child is labeled array when its
/// own first nested segment is numeric; for paths below `self` the leading
/// `self.` is ignored when deciding.
pub fn list_children(flat: &IndexMap<String, String>, prefix: &str) -> Vec<ChildEntry> {
    let mut out: Vec<ChildEntry> = Vec::new();
    let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();

    for (key, value) in flat {
        let rest = if prefix.is_empty() {
            key.as_str()
        } else {
            match key.strip_prefix(prefix).and_then(|r| r.strip_prefix('.')) {
                Some(rest) => rest,
                None => continue,
            }
        };

        let mut segs = rest.split('.');
        let Some(seg) = segs.next() else { continue };
        let next = segs.next();

        let display = render_segment(seg);
        if seen.contains(&display) {
            continue;
        }

        let entry = match next {
            None => ChildEntry::Leaf {
                name: display.clone(),
                value: VarValue::parse(value),
            },
            Some(next) => {
                let child_path = if prefix.is_empty() {
                    seg.to_string()
                } else {
                    format!("{prefix}.{seg}")
                };
                // `self` itself is always an object; its members decide on
                // the segment after `self.`.
                let is_array = seg != "self" && next.bytes().all(|b| b.is_ascii_digit());
                ChildEntry::Compound {
                    name: display.clone(),
                    path: child_path,
                    is_array,
                }
            }
        };
        seen.insert(display);
        out.push(entry);
    }

    out
}

/// Numeric path segments display as `[n]`.
fn render_segment(seg: &str) -> String {
    if !seg.is_empty() && seg.bytes().all(|b| b.is_ascii_digit()) {
        format!("[{seg}]")
    } else {
        seg.to_string()
    }
}

/// Inverse of [`render_segment`], used when the client passes a display
/// name back (e.g. in `setVariable`).
pub fn raw_segment(display: &str) -> &str {
    display
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(display)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(entries: &[(&str, &str)]) -> IndexMap<String, String> {
        normalize_map(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_normalization() {
        assert_eq!(normalize_name("a"), "a");
        assert_eq!(normalize_name("a.b"), "a.b");
        assert_eq!(normalize_name("a[0]"), "a.0");
        assert_eq!(normalize_name("a[0][1]"), "a.0.1");
        assert_eq!(normalize_name("self.x[2].y"), "self.x.2.y");
    }

    #[test]
    fn test_normalization_idempotence() {
        for name in ["a", "a[0]", "a[0][1].b", "self.x[2].y"] {
            let once = normalize_name(name);
            assert_eq!(normalize_name(&once), once);
        }
    }

    #[test]
    fn test_array_of_arrays() {
        let tree = VarNode::from_flat(&flat(&[("a[0][0]", "1"), ("a[0][1]", "2")]));

        let a = tree.lookup("a").unwrap();
        assert!(matches!(a, VarNode::Array(_)));
        assert_eq!(
            tree.lookup("a.0.0"),
            Some(&VarNode::Value(VarValue::Int(1)))
        );
        assert_eq!(
            tree.lookup("a.0.1"),
            Some(&VarNode::Value(VarValue::Int(2)))
        );
    }

    #[test]
    fn test_sparse_indices_stay_objects() {
        let tree = VarNode::from_flat(&flat(&[("a[0]", "1"), ("a[2]", "3")]));
        assert!(matches!(tree.lookup("a"), Some(VarNode::Object(_))));
    }

    #[test]
    fn test_leaf_coercion() {
        assert_eq!(VarValue::parse("42"), VarValue::Int(42));
        assert_eq!(VarValue::parse("0"), VarValue::Int(0));
        assert_eq!(VarValue::parse("4'b1010"), VarValue::Str("4'b1010".to_string()));
        assert_eq!(VarValue::parse(""), VarValue::Str(String::new()));
    }

    #[test]
    fn test_flat_tree_flat_round_trip() {
        let input = flat(&[
            ("a", "1"),
            ("b.c", "2"),
            ("b.d[0]", "3"),
            ("b.d[1]", "x"),
            ("self.y[0]", "5"),
        ]);
        let tree = VarNode::from_flat(&input);
        let back = tree.flatten();

        assert_eq!(back.len(), input.len());
        for (key, value) in &input {
            assert_eq!(back.get(key), Some(&VarValue::parse(value)), "key {key}");
        }
    }

    #[test]
    fn test_self_is_never_an_array() {
        let tree = VarNode::from_flat(&flat(&[("self[0]", "1"), ("self[1]", "2")]));
        assert!(matches!(tree.lookup("self"), Some(VarNode::Object(_))));
        // ...but arrays under self are detected as usual.
        let tree = VarNode::from_flat(&flat(&[("self.x[0]", "1"), ("self.x[1]", "2")]));
        assert!(matches!(tree.lookup("self.x"), Some(VarNode::Array(_))));
    }

    #[test]
    fn test_children_of_top_level() {
        let vars = flat(&[("a", "1"), ("b.c", "2"), ("b.d", "3"), ("e[0]", "4")]);
        let children = list_children(&vars, "");

        assert_eq!(children.len(), 3);
        assert_eq!(
            children[0],
            ChildEntry::Leaf {
                name: "a".to_string(),
                value: VarValue::Int(1)
            }
        );
        assert_eq!(
            children[1],
            ChildEntry::Compound {
                name: "b".to_string(),
                path: "b".to_string(),
                is_array: false
            }
        );
        assert_eq!(
            children[2],
            ChildEntry::Compound {
                name: "e".to_string(),
                path: "e".to_string(),
                is_array: true
            }
        );
    }

    #[test]
    fn test_children_of_nested_path() {
        let vars = flat(&[("b.c", "2"), ("b.d[0]", "3"), ("b.d[1]", "7")]);
        let children = list_children(&vars, "b");
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].name(), "c");
        assert_eq!(children[1].name(), "d");

        let children = list_children(&vars, "b.d");
        assert_eq!(
            children,
            vec![
                ChildEntry::Leaf {
                    name: "[0]".to_string(),
                    value: VarValue::Int(3)
                },
                ChildEntry::Leaf {
                    name: "[1]".to_string(),
                    value: VarValue::Int(7)
                },
            ]
        );
    }

    #[test]
    fn test_segment_rendering_round_trip() {
        assert_eq!(render_segment("0"), "[0]");
        assert_eq!(render_segment("x"), "x");
        assert_eq!(raw_segment("[0]"), "0");
        assert_eq!(raw_segment("x"), "x");
    }
}
