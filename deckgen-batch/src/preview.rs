//! Dry-run substitution for `deckgen preview`.
//!
//! Substitutes one record into an in-memory copy of the template and
//! reports every text node it would change as a unified diff. Nothing is
//! written.

use similar::TextDiff;

use deckgen_core::{records, types::Token, BatchConfig};
use deckgen_template::engine;

use crate::error::BatchError;
use crate::instance::Template;

/// One text node the record would change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeChange {
    pub slide: u32,
    /// 1-based position of the node within its slide.
    pub node: usize,
    pub before: String,
    pub after: String,
    pub unified_diff: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    /// 1-based record position.
    pub record: usize,
    pub total: usize,
    pub changes: Vec<NodeChange>,
    /// Mapped tokens still present after substitution, in declaration order.
    pub unresolved: Vec<Token>,
}

/// Preview record `row` (1-based) of the configured source.
pub fn preview_record(config: &BatchConfig, row: usize) -> Result<Preview, BatchError> {
    config.validate()?;
    let template = Template::open(&config.template)?;
    let rows = records::load_at(&config.records.path, config.delimiter_byte()?)?;
    let total = rows.len();
    let record = row
        .checked_sub(1)
        .and_then(|i| rows.get(i))
        .ok_or(BatchError::RowOutOfRange { row, total })?;

    let mut package = template.read()?;
    let before = snapshot(package.slides());
    engine::apply(&mut package, record, &config.tokens);
    let after = snapshot(package.slides());

    let mut changes = Vec::new();
    let mut unresolved: Vec<Token> = Vec::new();
    for ((slide, old), (_, new)) in before.iter().zip(&after) {
        for (i, (old_text, new_text)) in old.iter().zip(new).enumerate() {
            for token in engine::unresolved(new_text, &config.tokens) {
                if !unresolved.contains(token) {
                    unresolved.push(token.clone());
                }
            }
            if old_text == new_text {
                continue;
            }
            changes.push(NodeChange {
                slide: *slide,
                node: i + 1,
                before: old_text.clone(),
                after: new_text.clone(),
                unified_diff: node_diff(*slide, i + 1, old_text, new_text),
            });
        }
    }

    tracing::debug!(
        "record {row}: {} changed text nodes, {} unresolved tokens",
        changes.len(),
        unresolved.len()
    );
    Ok(Preview {
        record: row,
        total,
        changes,
        unresolved,
    })
}

fn snapshot<'a>(
    slides: impl Iterator<Item = (u32, Vec<&'a deckgen_template::TextNode>)>,
) -> Vec<(u32, Vec<String>)> {
    slides
        .map(|(number, nodes)| (number, nodes.iter().map(|n| n.text().to_string()).collect()))
        .collect()
}

fn node_diff(slide: u32, node: usize, before: &str, after: &str) -> String {
    let before = format!("{before}\n");
    let after = format!("{after}\n");
    TextDiff::from_lines(&before, &after)
        .unified_diff()
        .header(
            &format!("a/slide{slide}#{node}"),
            &format!("b/slide{slide}#{node}"),
        )
        .context_radius(3)
        .to_string()
}
