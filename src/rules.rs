//! Per-schema removal rules and file classification.
//!
//! A rule decides what fragment "owns" a field usage for one metadata schema.
//! Only the page-layout rule is proven safe for unattended removal; everything
//! else is report-only so the tool never guesses at structure it does not
//! understand.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::xml::XmlNode;

/// File classification by suffix. Advisory metadata only: it selects (or
/// withholds) a removal rule but never changes how bytes are read or written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Layout,
    Flexipage,
    ApexClass,
    Script,
    ValidationRule,
    Flow,
    FieldDefinition,
    CustomObject,
    Other,
}

impl DocumentType {
    /// Classify a path by its metadata suffix.
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if name.ends_with("layout-meta.xml") {
            DocumentType::Layout
        } else if name.ends_with("flexipage-meta.xml") {
            DocumentType::Flexipage
        } else if name.ends_with("validationRule-meta.xml") {
            DocumentType::ValidationRule
        } else if name.ends_with("flow-meta.xml") {
            DocumentType::Flow
        } else if name.ends_with("field-meta.xml") {
            DocumentType::FieldDefinition
        } else if name.ends_with("object-meta.xml") {
            DocumentType::CustomObject
        } else if name.ends_with(".cls") {
            DocumentType::ApexClass
        } else if name.ends_with(".js") || name.ends_with(".html") {
            DocumentType::Script
        } else {
            DocumentType::Other
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DocumentType::Layout => "Layout",
            DocumentType::Flexipage => "Flexipage",
            DocumentType::ApexClass => "Apex Class",
            DocumentType::Script => "Script/Markup",
            DocumentType::ValidationRule => "Validation Rule",
            DocumentType::Flow => "Flow",
            DocumentType::FieldDefinition => "Field Definition",
            DocumentType::CustomObject => "Custom Object",
            DocumentType::Other => "Other",
        };
        write!(f, "{}", label)
    }
}

/// File suffixes the scanner enumerates. Everything else is ignored outright.
pub const SCAN_SUFFIXES: &[&str] = &[
    "layout-meta.xml",
    "flexipage-meta.xml",
    "validationRule-meta.xml",
    "flow-meta.xml",
    "field-meta.xml",
    "object-meta.xml",
    ".cls",
    ".js",
    ".html",
];

/// A structural removal rule for one document type.
///
/// The matcher is a pure function over one candidate wrapper node and the
/// target field name; adding a schema means adding one matcher function and
/// registering it in [`removal_rule`]; the generic remover never changes.
#[derive(Clone, Copy)]
pub struct RemovalRule {
    pub doc_type: DocumentType,
    matcher: fn(&XmlNode, &str) -> bool,
}

impl RemovalRule {
    /// Bind the rule to a concrete field name, yielding the predicate the
    /// generic remover runs over the tree.
    pub fn predicate<'a>(&self, field: &'a str) -> impl Fn(&XmlNode) -> bool + 'a {
        let matcher = self.matcher;
        move |node| matcher(node, field)
    }
}

/// Look up the removal rule registered for a document type.
///
/// `None` means no structural removal exists for that schema and the
/// orchestrator must report the file as unsupported rather than edit it.
pub fn removal_rule(doc_type: DocumentType) -> Option<RemovalRule> {
    match doc_type {
        DocumentType::Layout => Some(RemovalRule {
            doc_type,
            matcher: layout_item_owns_field,
        }),
        DocumentType::Flexipage => Some(RemovalRule {
            doc_type,
            matcher: flexipage_never_matches,
        }),
        _ => None,
    }
}

/// Page layouts: a `<layoutItems>` wrapper owns a usage iff one of its direct
/// `<field>` children carries exactly the target name. Exact, case-sensitive,
/// full match: `Account.MyField__c2` must not match `Account.MyField__c`.
fn layout_item_owns_field(node: &XmlNode, field: &str) -> bool {
    let Some(el) = node.as_element() else {
        return false;
    };
    if el.name != "layoutItems" {
        return false;
    }
    el.children.iter().any(|child| match child {
        XmlNode::Element(c) if c.name == "field" => c.text().as_deref() == Some(field),
        _ => false,
    })
}

/// Flexipages: detect, never auto-remove.
///
/// Component trees nest field references at variable depth inside
/// component-instance property bags, and excising the wrong ancestor silently
/// corrupts unrelated page configuration. The rule slot stays registered so
/// flexipage hits are still surfaced, but no fragment ever matches.
fn flexipage_never_matches(_node: &XmlNode, _field: &str) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::XmlDocument;
    use std::path::PathBuf;

    #[test]
    fn classifies_by_suffix() {
        let cases: &[(&str, DocumentType)] = &[
            ("force-app/Account.layout-meta.xml", DocumentType::Layout),
            ("Record_Page.flexipage-meta.xml", DocumentType::Flexipage),
            ("AccountService.cls", DocumentType::ApexClass),
            ("component.js", DocumentType::Script),
            ("component.html", DocumentType::Script),
            ("Check.validationRule-meta.xml", DocumentType::ValidationRule),
            ("Lead_Convert.flow-meta.xml", DocumentType::Flow),
            ("MyField__c.field-meta.xml", DocumentType::FieldDefinition),
            ("Account.object-meta.xml", DocumentType::CustomObject),
            ("README.md", DocumentType::Other),
        ];
        for (path, expected) in cases {
            assert_eq!(DocumentType::from_path(&PathBuf::from(path)), *expected);
        }
    }

    #[test]
    fn layout_rule_matches_exact_field_only() {
        let doc = XmlDocument::parse(
            r#"<Layout>
                <layoutItems><behavior>Edit</behavior><field>Account.MyField__c</field></layoutItems>
                <layoutItems><field>Account.MyField__c2</field></layoutItems>
                <layoutItems><field>Account.Other__c</field></layoutItems>
            </Layout>"#,
        )
        .unwrap();
        let rule = removal_rule(DocumentType::Layout).unwrap();
        let predicate = rule.predicate("Account.MyField__c");
        let items: Vec<bool> = doc.nodes[0]
            .as_element()
            .unwrap()
            .children
            .iter()
            .map(|n| predicate(n))
            .collect();
        assert_eq!(items, [true, false, false]);
    }

    #[test]
    fn layout_rule_ignores_non_wrapper_elements() {
        let doc = XmlDocument::parse("<Layout><field>Account.MyField__c</field></Layout>").unwrap();
        let rule = removal_rule(DocumentType::Layout).unwrap();
        let predicate = rule.predicate("Account.MyField__c");
        // A bare <field> outside a layoutItems wrapper is never a target.
        assert!(!predicate(&doc.nodes[0].as_element().unwrap().children[0]));
    }

    #[test]
    fn flexipage_rule_always_declines() {
        let doc = XmlDocument::parse(
            "<FlexiPage><itemInstances><value>Account.MyField__c</value></itemInstances></FlexiPage>",
        )
        .unwrap();
        let rule = removal_rule(DocumentType::Flexipage).unwrap();
        let predicate = rule.predicate("Account.MyField__c");
        assert!(doc.nodes.iter().all(|n| !predicate(n)));
    }

    #[test]
    fn unregistered_types_have_no_rule() {
        for doc_type in [
            DocumentType::ApexClass,
            DocumentType::Script,
            DocumentType::ValidationRule,
            DocumentType::Flow,
            DocumentType::FieldDefinition,
            DocumentType::CustomObject,
            DocumentType::Other,
        ] {
            assert!(removal_rule(doc_type).is_none());
        }
    }
}
