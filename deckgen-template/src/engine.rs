//! Substitution engine: rewrites a document's text nodes for one record.
//!
//! For every text node, in document order, the node's text is read once,
//! every `(token, field)` pair of the [`TokenMap`] is applied in declaration
//! order to the accumulated string, and the result is written back once.
//!
//! A pair only fires when the record has the field; otherwise the token stays
//! in the text verbatim. A replacement value is never re-scanned by the pair
//! that produced it, but later pairs do operate on it. Together with the
//! declaration order this makes prefix-colliding tokens order-sensitive:
//!
//! ```text
//! tokens: [[A]] -> f1, [[AB]] -> f2      text: "[[AB]]"
//! "[[A]]" does not occur in "[[AB]]", so f2 wins here, but with
//! tokens: [[A -> f1, [[AB]] -> f2        text: "[[AB]]"
//! the first rule consumes "[[A" and "[[AB]]" never matches.
//! ```
//!
//! That behaviour is kept as-is; tokens are never re-ordered by length.

use deckgen_core::types::{Record, Token, TokenMap};

use crate::package::TextNodes;

/// Counters from one [`apply`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubstitutionStats {
    /// Text nodes visited.
    pub nodes: usize,
    /// Nodes whose text differs after substitution.
    pub changed: usize,
    /// Token occurrences replaced across all nodes.
    pub replacements: usize,
}

/// Substitute `record` into every text node of `document`.
pub fn apply<D>(document: &mut D, record: &Record, tokens: &TokenMap) -> SubstitutionStats
where
    D: TextNodes + ?Sized,
{
    let mut stats = SubstitutionStats::default();
    for node in document.text_nodes_mut() {
        let (text, replaced) = substitute(node.text(), record, tokens);
        stats.nodes += 1;
        stats.replacements += replaced;
        if text != node.text() {
            stats.changed += 1;
        }
        node.set_text(text);
    }
    stats
}

/// Substitute `record` into a single string.
///
/// Returns the new text and the number of token occurrences replaced.
pub fn substitute(text: &str, record: &Record, tokens: &TokenMap) -> (String, usize) {
    let mut current = text.to_string();
    let mut replaced = 0;
    for binding in tokens.iter() {
        let token = binding.token.as_str();
        if token.is_empty() {
            continue;
        }
        let Some(value) = record.get(&binding.field) else {
            continue;
        };
        let hits = current.matches(token).count();
        if hits > 0 {
            current = current.replace(token, value);
            replaced += hits;
        }
    }
    (current, replaced)
}

/// Tokens of `tokens` still present in `text`, in declaration order.
pub fn unresolved<'a>(text: &str, tokens: &'a TokenMap) -> Vec<&'a Token> {
    tokens
        .iter()
        .filter(|b| !b.token.as_str().is_empty() && text.contains(b.token.as_str()))
        .map(|b| &b.token)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::TextNode;

    struct Nodes(Vec<TextNode>);

    impl TextNodes for Nodes {
        fn text_nodes(&self) -> Box<dyn Iterator<Item = &TextNode> + '_> {
            Box::new(self.0.iter())
        }

        fn text_nodes_mut(&mut self) -> Box<dyn Iterator<Item = &mut TextNode> + '_> {
            Box::new(self.0.iter_mut())
        }
    }

    fn tokens() -> TokenMap {
        TokenMap::new([("[[VOTRE_BALISE]]", "NOM_COMPLET"), ("[[SUJET]]", "AUTRE")])
    }

    fn alice() -> Record {
        Record::from_pairs([("NOM_COMPLET", "Alice"), ("AUTRE", "Security")])
    }

    #[test]
    fn replaces_every_mapped_token() {
        let (text, n) = substitute("Hello [[VOTRE_BALISE]], topic [[SUJET]]", &alice(), &tokens());
        assert_eq!(text, "Hello Alice, topic Security");
        assert_eq!(n, 2);
    }

    #[test]
    fn missing_field_leaves_token_verbatim() {
        let record = Record::from_pairs([("NOM_COMPLET", "Alice")]);
        let (text, n) = substitute("Hello [[VOTRE_BALISE]], topic [[SUJET]]", &record, &tokens());
        assert_eq!(text, "Hello Alice, topic [[SUJET]]");
        assert_eq!(n, 1);
    }

    #[test]
    fn empty_value_still_replaces() {
        let record = Record::from_pairs([("NOM_COMPLET", ""), ("AUTRE", "x")]);
        let (text, _) = substitute("<[[VOTRE_BALISE]]>", &record, &tokens());
        assert_eq!(text, "<>");
    }

    #[test]
    fn every_occurrence_in_a_node_is_replaced() {
        let (text, n) = substitute("[[SUJET]]/[[SUJET]]/[[SUJET]]", &alice(), &tokens());
        assert_eq!(text, "Security/Security/Security");
        assert_eq!(n, 3);
    }

    #[test]
    fn value_is_not_rescanned_by_its_own_rule() {
        let map = TokenMap::new([("{x}", "f")]);
        let record = Record::from_pairs([("f", "{x}{x}")]);
        let (text, n) = substitute("{x}", &record, &map);
        assert_eq!(text, "{x}{x}");
        assert_eq!(n, 1);
    }

    #[test]
    fn earlier_rule_output_feeds_later_rules() {
        let map = TokenMap::new([("[[A]]", "f1"), ("[[B]]", "f2")]);
        let record = Record::from_pairs([("f1", "[[B]]"), ("f2", "done")]);
        let (text, _) = substitute("[[A]]", &record, &map);
        assert_eq!(text, "done");
    }

    #[test]
    fn declaration_order_wins_over_token_length() {
        let record = Record::from_pairs([("f1", "short"), ("f2", "long")]);

        let prefix_first = TokenMap::new([("[[A", "f1"), ("[[AB]]", "f2")]);
        assert_eq!(substitute("[[AB]]", &record, &prefix_first).0, "shortB]]");

        let long_first = TokenMap::new([("[[AB]]", "f2"), ("[[A", "f1")]);
        assert_eq!(substitute("[[AB]]", &record, &long_first).0, "long");
    }

    #[test]
    fn bracketed_prefix_token_does_not_match_longer_token() {
        let map = TokenMap::new([("[[A]]", "f1"), ("[[AB]]", "f2")]);
        let record = Record::from_pairs([("f1", "one"), ("f2", "two")]);
        assert_eq!(substitute("[[AB]] [[A]]", &record, &map).0, "two one");
    }

    #[test]
    fn empty_token_is_ignored() {
        let map = TokenMap::new([("", "f")]);
        let record = Record::from_pairs([("f", "X")]);
        assert_eq!(substitute("abc", &record, &map), ("abc".to_string(), 0));
    }

    #[test]
    fn no_trimming() {
        let record = Record::from_pairs([("NOM_COMPLET", "  Alice  ")]);
        let (text, _) = substitute(" [[VOTRE_BALISE]] ", &record, &tokens());
        assert_eq!(text, "   Alice   ");
    }

    #[test]
    fn apply_is_idempotent_once_tokens_are_gone() {
        let mut doc = Nodes(vec![
            TextNode::new("Hello [[VOTRE_BALISE]]"),
            TextNode::new("plain"),
            TextNode::new("[[SUJET]] and [[UNKNOWN]]"),
        ]);
        let first = apply(&mut doc, &alice(), &tokens());
        assert_eq!(first, SubstitutionStats { nodes: 3, changed: 2, replacements: 2 });

        let snapshot: Vec<String> = doc.text_nodes().map(|n| n.text().to_string()).collect();
        let second = apply(&mut doc, &alice(), &tokens());
        let again: Vec<String> = doc.text_nodes().map(|n| n.text().to_string()).collect();
        assert_eq!(snapshot, again);
        assert_eq!(second.changed, 0);
        assert_eq!(again[2], "Security and [[UNKNOWN]]");
    }

    #[test]
    fn unresolved_lists_remaining_tokens() {
        let map = tokens();
        let left = unresolved("Hello Alice, topic [[SUJET]]", &map);
        assert_eq!(left, vec![&Token::from("[[SUJET]]")]);
    }
}
