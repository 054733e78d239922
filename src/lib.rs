pub mod diff;
pub mod error;
pub mod orchestrator;
pub mod remover;
pub mod rules;
pub mod scanner;
pub mod state;
pub mod xml;


pub use diff::{generate_unified_diff, print_diff, DiffStats};
pub use error::{Error, Result};
pub use orchestrator::{
    plan_one, remove_all, remove_one, BatchReport, PlannedChange, ProgressSink, RemovalOutcome,
    SilentSink,
};
pub use remover::{remove_matching, rewrite};
pub use rules::{removal_rule, DocumentType, RemovalRule};
pub use scanner::{collect_candidate_files, find_dependencies, CancelToken, Dependency};
pub use xml::{Element, XmlDocument, XmlNode};
