//! Collection expression trees
//!
//! A collection is a query over the media library: a tree of operator nodes,
//! each with string attributes and an ordered list of operand collections.
//! Operands are owned, so a tree is always finite and acyclic. Named
//! collections refer to each other only through `Reference` nodes, resolved
//! by name at evaluation time.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Collection operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    Reference,
    Universe,
    Union,
    Intersection,
    Complement,
    Has,
    Match,
    Token,
    Equals,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Idlist,
}

impl CollectionKind {
    /// Human readable operator name used by `Collection::dump`
    pub fn label(&self) -> &'static str {
        match self {
            CollectionKind::Reference => "Reference",
            CollectionKind::Universe => "Universe",
            CollectionKind::Union => "Union",
            CollectionKind::Intersection => "Intersection",
            CollectionKind::Complement => "Complement",
            CollectionKind::Has => "Has",
            CollectionKind::Match => "Match",
            CollectionKind::Token => "Token",
            CollectionKind::Equals => "Equals",
            CollectionKind::NotEqual => "Not-equal",
            CollectionKind::Less => "Less",
            CollectionKind::LessEqual => "Less-equal",
            CollectionKind::Greater => "Greater",
            CollectionKind::GreaterEqual => "Greater-equal",
            CollectionKind::Idlist => "Idlist",
        }
    }

    /// Whether this operator filters its operand by a media property
    pub fn is_filter(&self) -> bool {
        matches!(
            self,
            CollectionKind::Has
                | CollectionKind::Match
                | CollectionKind::Token
                | CollectionKind::Equals
                | CollectionKind::NotEqual
                | CollectionKind::Less
                | CollectionKind::LessEqual
                | CollectionKind::Greater
                | CollectionKind::GreaterEqual
        )
    }
}

/// Namespace a named collection is saved under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CollectionNamespace {
    Collections,
    Playlists,
}

impl CollectionNamespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionNamespace::Collections => "Collections",
            CollectionNamespace::Playlists => "Playlists",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "Collections" => Some(CollectionNamespace::Collections),
            "Playlists" => Some(CollectionNamespace::Playlists),
            _ => None,
        }
    }
}

/// Collection expression node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    kind: CollectionKind,
    attributes: BTreeMap<String, String>,
    operands: Vec<Collection>,
    idlist: Vec<u32>,
}

impl Collection {
    pub fn new(kind: CollectionKind) -> Self {
        Self {
            kind,
            attributes: BTreeMap::new(),
            operands: Vec::new(),
            idlist: Vec::new(),
        }
    }

    /// Every media entry in the library
    pub fn universe() -> Self {
        Self::new(CollectionKind::Universe)
    }

    /// Explicit ordered list of media ids
    pub fn idlist(ids: Vec<u32>) -> Self {
        let mut coll = Self::new(CollectionKind::Idlist);
        coll.idlist = ids;
        coll
    }

    /// Reference to a collection saved under `name` in `namespace`
    pub fn reference(name: &str, namespace: CollectionNamespace) -> Self {
        let mut coll = Self::new(CollectionKind::Reference);
        coll.set_attribute("reference", name);
        coll.set_attribute("namespace", namespace.as_str());
        coll
    }

    /// Property filter over `operand`
    pub fn filter(kind: CollectionKind, field: &str, value: &str, operand: Collection) -> Self {
        let mut coll = Self::new(kind);
        coll.set_attribute("field", field);
        coll.set_attribute("value", value);
        coll.add_operand(operand);
        coll
    }

    /// Set-operation node over `operands`
    pub fn combine(kind: CollectionKind, operands: Vec<Collection>) -> Self {
        let mut coll = Self::new(kind);
        coll.operands = operands;
        coll
    }

    pub fn kind(&self) -> CollectionKind {
        self.kind
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn set_attribute(&mut self, key: &str, value: &str) {
        self.attributes.insert(key.to_string(), value.to_string());
    }

    /// Integer attributes are stored in their decimal string form
    pub fn set_int_attribute(&mut self, key: &str, value: i64) {
        self.set_attribute(key, &value.to_string());
    }

    pub fn remove_attribute(&mut self, key: &str) -> Option<String> {
        self.attributes.remove(key)
    }

    pub fn operands(&self) -> &[Collection] {
        &self.operands
    }

    pub fn add_operand(&mut self, operand: Collection) {
        self.operands.push(operand);
    }

    pub fn clear_operands(&mut self) {
        self.operands.clear();
    }

    pub fn ids(&self) -> &[u32] {
        &self.idlist
    }

    pub fn set_ids(&mut self, ids: Vec<u32>) {
        self.idlist = ids;
    }

    /// Number of nodes in the tree, this one included
    pub fn node_count(&self) -> usize {
        1 + self.operands.iter().map(Collection::node_count).sum::<usize>()
    }

    /// Indented structural dump, one `Type:` line per node
    ///
    /// ```text
    /// Type: Union
    ///   Type: Idlist
    ///   IDs: (1, 2)
    ///   Type: Match
    ///   Attributes: (field: artist, value: Air)
    ///     Type: Universe
    /// ```
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_into(&mut out, 0);
        out
    }

    fn dump_into(&self, out: &mut String, level: usize) {
        let indent = " ".repeat(level * 2);

        let _ = writeln!(out, "{}Type: {}", indent, self.kind.label());

        if !self.idlist.is_empty() {
            let ids: Vec<String> = self.idlist.iter().map(u32::to_string).collect();
            let _ = writeln!(out, "{}IDs: ({})", indent, ids.join(", "));
        }

        if !self.attributes.is_empty() {
            let attrs: Vec<String> = self
                .attributes
                .iter()
                .map(|(k, v)| format!("{}: {}", k, v))
                .collect();
            let _ = writeln!(out, "{}Attributes: ({})", indent, attrs.join(", "));
        }

        for operand in &self.operands {
            operand.dump_into(out, level + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_sets_name_and_namespace() {
        let coll = Collection::reference("Jazz", CollectionNamespace::Collections);
        assert_eq!(coll.kind(), CollectionKind::Reference);
        assert_eq!(coll.attribute("reference"), Some("Jazz"));
        assert_eq!(coll.attribute("namespace"), Some("Collections"));
    }

    #[test]
    fn test_int_attribute_is_decimal_string() {
        let mut coll = Collection::new(CollectionKind::Idlist);
        coll.set_int_attribute("history", 12);
        assert_eq!(coll.attribute("history"), Some("12"));
    }

    #[test]
    fn test_dump_layout() {
        let coll = Collection::combine(
            CollectionKind::Union,
            vec![
                Collection::idlist(vec![1, 2]),
                Collection::filter(CollectionKind::Match, "artist", "Air", Collection::universe()),
            ],
        );

        let expected = "Type: Union\n\
                        \x20\x20Type: Idlist\n\
                        \x20\x20IDs: (1, 2)\n\
                        \x20\x20Type: Match\n\
                        \x20\x20Attributes: (field: artist, value: Air)\n\
                        \x20\x20\x20\x20Type: Universe\n";
        assert_eq!(coll.dump(), expected);
        assert_eq!(coll.node_count(), 4);
    }

    #[test]
    fn test_filter_kinds() {
        assert!(CollectionKind::Equals.is_filter());
        assert!(!CollectionKind::Union.is_filter());
        assert!(!CollectionKind::Idlist.is_filter());
    }

    #[test]
    fn test_namespace_parse() {
        assert_eq!(CollectionNamespace::parse("Playlists"), Some(CollectionNamespace::Playlists));
        assert_eq!(CollectionNamespace::parse("nope"), None);
    }
}
