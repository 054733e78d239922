//! Generic predicate-driven node removal over the ordered XML tree.

use crate::error::Result;
use crate::rules::RemovalRule;
use crate::xml::{XmlDocument, XmlNode};

/// Remove every node matching `predicate` from the sequence, returning whether
/// anything was removed.
///
/// Iterates last to first so in-place splicing never invalidates pending
/// indices. A matching node is excised whole; its subtree is not inspected
/// further. Non-matching elements are recursed into, and a match anywhere
/// below counts as a modification for the whole call.
///
/// The predicate must be pure: it sees one candidate node and may only inspect
/// that node and its own children to decide ownership.
pub fn remove_matching(nodes: &mut Vec<XmlNode>, predicate: &dyn Fn(&XmlNode) -> bool) -> bool {
    let mut modified = false;
    for i in (0..nodes.len()).rev() {
        if predicate(&nodes[i]) {
            nodes.remove(i);
            modified = true;
            continue;
        }
        if let Some(XmlNode::Element(el)) = nodes.get_mut(i) {
            if remove_matching(&mut el.children, predicate) {
                modified = true;
            }
        }
    }
    modified
}

/// Parse `text`, apply `rule` for `field`, and re-serialize.
///
/// Returns `Ok(Some(new_text))` when at least one fragment was removed,
/// `Ok(None)` when the document is untouched (callers must not rewrite the
/// file in that case), and a parse error for malformed input.
pub fn rewrite(text: &str, rule: &RemovalRule, field: &str) -> Result<Option<String>> {
    let mut doc = XmlDocument::parse(text)?;
    let predicate = rule.predicate(field);
    if remove_matching(&mut doc.nodes, &predicate) {
        Ok(Some(doc.serialize()?))
    } else {
        Ok(None)
    }
}
