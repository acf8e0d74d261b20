//! Domain types shared by every deckgen crate.
//!
//! Both [`Record`] and [`TokenMap`] are *ordered*: a record keeps its header
//! column order and a token map keeps its declaration order. Neither is a
//! hash map, because substitution order is observable (see [`TokenMap`]).

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A literal placeholder string searched for in template text, e.g. `[[SUJET]]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token(pub String);

impl Token {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for Token {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Token {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A column header of the records file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldName(pub String);

impl FieldName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for FieldName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for FieldName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// One data row: field name → value, in header order.
///
/// Field names are unique. Building a record from pairs that repeat a name
/// keeps the first position and the last value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    fields: Vec<(FieldName, String)>,
}

impl Record {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<FieldName>,
        V: Into<String>,
    {
        let mut fields: Vec<(FieldName, String)> = Vec::new();
        for (name, value) in pairs {
            let name = name.into();
            let value = value.into();
            match fields.iter_mut().find(|(existing, _)| *existing == name) {
                Some(slot) => slot.1 = value,
                None => fields.push((name, value)),
            }
        }
        Record { fields }
    }

    /// Value of `field`, or `None` if the record has no such column.
    pub fn get(&self, field: &FieldName) -> Option<&str> {
        self.get_str(field.as_str())
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name.as_str() == field)
            .map(|(_, value)| value.as_str())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&FieldName, &str)> {
        self.fields.iter().map(|(name, value)| (name, value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// ---------------------------------------------------------------------------
// TokenMap
// ---------------------------------------------------------------------------

/// A single `token → field` entry of a [`TokenMap`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBinding {
    pub token: Token,
    pub field: FieldName,
}

/// Ordered placeholder table.
///
/// Replacements run in declaration order. When one token's text contains
/// another's (`[[A]]` vs `[[AB]]` is the classic case), whichever is declared
/// first consumes the shared text and the later rule may no longer match.
/// This ordering is part of the contract and must not be re-sorted.
///
/// Declaring the same token twice keeps the first position and the last
/// field.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<TokenBinding>", into = "Vec<TokenBinding>")]
pub struct TokenMap {
    bindings: Vec<TokenBinding>,
}

impl TokenMap {
    pub fn new<I, T, F>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (T, F)>,
        T: Into<Token>,
        F: Into<FieldName>,
    {
        pairs
            .into_iter()
            .map(|(token, field)| TokenBinding {
                token: token.into(),
                field: field.into(),
            })
            .collect::<Vec<_>>()
            .into()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TokenBinding> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl From<Vec<TokenBinding>> for TokenMap {
    fn from(entries: Vec<TokenBinding>) -> Self {
        let mut bindings: Vec<TokenBinding> = Vec::with_capacity(entries.len());
        for entry in entries {
            match bindings.iter_mut().find(|b| b.token == entry.token) {
                Some(slot) => slot.field = entry.field,
                None => bindings.push(entry),
            }
        }
        TokenMap { bindings }
    }
}

impl From<TokenMap> for Vec<TokenBinding> {
    fn from(map: TokenMap) -> Self {
        map.bindings
    }
}

// ---------------------------------------------------------------------------
// OutputArtifact
// ---------------------------------------------------------------------------

/// Where one record's outputs land: the generated deck and its rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputArtifact {
    pub document: PathBuf,
    pub render: PathBuf,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
