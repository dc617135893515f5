//! Field extraction rules for secondary indexes.

use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

/// How an extracted JSON field is interpreted and ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    /// Signed 64-bit integers. Accepts JSON integers and numeric strings.
    Int,
    /// Unsigned 64-bit integers. Accepts JSON integers and numeric strings.
    Uint,
    /// 64-bit floats in IEEE total order. Accepts JSON numbers and numeric
    /// strings; NaN is rejected.
    Float,
    /// UTF-8 text in byte order. Accepts JSON strings.
    Text,
}

/// A value extracted from an entry, used as the primary sort key of an index.
///
/// Keys of different variants never meet inside one index, but the ordering
/// is total anyway: `Int < Uint < Float < Text`.
#[derive(Debug, Clone)]
pub enum FieldKey {
    /// Signed integer field.
    Int(i64),
    /// Unsigned integer field.
    Uint(u64),
    /// Float field.
    Float(f64),
    /// Text field.
    Text(String),
}

impl FieldKey {
    fn rank(&self) -> u8 {
        match self {
            Self::Int(_) => 0,
            Self::Uint(_) => 1,
            Self::Float(_) => 2,
            Self::Text(_) => 3,
        }
    }
}

impl Ord for FieldKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Uint(a), Self::Uint(b)) => a.cmp(b),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for FieldKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for FieldKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FieldKey {}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Uint(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

/// Declares which field of an entry value an index orders by.
///
/// Entry values are parsed as JSON and `path` is followed one dot-separated
/// segment at a time; numeric segments address array elements. An entry
/// whose value is not JSON, lacks the path, or holds something the kind
/// cannot convert is simply left out of the index.
///
/// An empty path with [`IndexKind::Text`] indexes the raw value as UTF-8
/// text, JSON or not.
///
/// ```rust
/// use stitchdb_core::{FieldKey, IndexRule};
///
/// let rule = IndexRule::int("stats.level");
/// assert_eq!(
///     rule.extract(br#"{"stats":{"level":"12"}}"#),
///     Some(FieldKey::Int(12))
/// );
/// assert_eq!(rule.extract(b"not json"), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexRule {
    path: String,
    kind: IndexKind,
}

impl IndexRule {
    /// Creates a rule for `path` interpreted as `kind`.
    pub fn new(path: impl Into<String>, kind: IndexKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    /// Signed integer rule.
    pub fn int(path: impl Into<String>) -> Self {
        Self::new(path, IndexKind::Int)
    }

    /// Unsigned integer rule.
    pub fn uint(path: impl Into<String>) -> Self {
        Self::new(path, IndexKind::Uint)
    }

    /// Float rule.
    pub fn float(path: impl Into<String>) -> Self {
        Self::new(path, IndexKind::Float)
    }

    /// Text rule.
    pub fn text(path: impl Into<String>) -> Self {
        Self::new(path, IndexKind::Text)
    }

    /// Returns the JSON path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the kind.
    #[must_use]
    pub fn kind(&self) -> IndexKind {
        self.kind
    }

    /// Extracts the sort key from a raw entry value.
    #[must_use]
    pub fn extract(&self, value: &[u8]) -> Option<FieldKey> {
        if self.path.is_empty() && self.kind == IndexKind::Text {
            return std::str::from_utf8(value)
                .ok()
                .map(|text| FieldKey::Text(text.to_owned()));
        }

        let doc: Value = serde_json::from_slice(value).ok()?;
        let mut node = &doc;
        if !self.path.is_empty() {
            for segment in self.path.split('.') {
                node = match node {
                    Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                    _ => node.get(segment)?,
                };
            }
        }
        self.convert(node)
    }

    fn convert(&self, node: &Value) -> Option<FieldKey> {
        match (self.kind, node) {
            (IndexKind::Int, Value::Number(n)) => n.as_i64().map(FieldKey::Int),
            (IndexKind::Int, Value::String(s)) => s.trim().parse().ok().map(FieldKey::Int),
            (IndexKind::Uint, Value::Number(n)) => n.as_u64().map(FieldKey::Uint),
            (IndexKind::Uint, Value::String(s)) => s.trim().parse().ok().map(FieldKey::Uint),
            (IndexKind::Float, Value::Number(n)) => n.as_f64().map(FieldKey::Float),
            (IndexKind::Float, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| !f.is_nan())
                .map(FieldKey::Float),
            (IndexKind::Text, Value::String(s)) => Some(FieldKey::Text(s.clone())),
            _ => None,
        }
    }
}
