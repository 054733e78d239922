use similar::{ChangeTag, TextDiff};
use std::path::Path;

/// Represents statistics about a diff
#[derive(Debug, Default)]
pub struct DiffStats {
    pub files_changed: usize,
    pub lines_added: usize,
    pub lines_removed: usize,
}

impl DiffStats {
    pub fn add(&mut self, other: &DiffStats) {
        self.files_changed += other.files_changed;
        self.lines_added += other.lines_added;
        self.lines_removed += other.lines_removed;
    }

    pub fn print_summary(&self) {
        println!("\nSummary:");
        println!("Files changed: {}", self.files_changed);
        println!("Lines added: {}", self.lines_added);
        println!("Lines removed: {}", self.lines_removed);
    }
}

/// Generate a unified diff between original and modified content
///
/// Returns the unified diff string and statistics about the changes.
pub fn generate_unified_diff(
    path: &Path,
    original: &str,
    modified: &str,
    context_lines: usize,
) -> (String, DiffStats) {
    let diff = TextDiff::from_lines(original, modified);

    let mut output = String::new();
    let mut stats = DiffStats::default();

    let path_str = path.display().to_string();
    output.push_str(&format!("--- {}\n", path_str));
    output.push_str(&format!("+++ {}\n", path_str));

    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => stats.lines_added += 1,
            ChangeTag::Delete => stats.lines_removed += 1,
            ChangeTag::Equal => {}
        }
    }

    let unified = diff.unified_diff().context_radius(context_lines).to_string();
    output.push_str(&unified);

    if stats.lines_added > 0 || stats.lines_removed > 0 {
        stats.files_changed = 1;
    }

    (output, stats)
}

/// Print a unified diff to stdout, returning statistics about the changes.
pub fn print_diff(path: &Path, original: &str, modified: &str) -> DiffStats {
    let (diff_output, stats) = generate_unified_diff(path, original, modified, 3);

    if stats.files_changed > 0 {
        print!("{}", diff_output);
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn counts_removed_lines() {
        let original = "a\nb\nc\n";
        let modified = "a\nc\n";
        let (output, stats) = generate_unified_diff(&PathBuf::from("x.xml"), original, modified, 3);
        assert_eq!(stats.files_changed, 1);
        assert_eq!(stats.lines_removed, 1);
        assert_eq!(stats.lines_added, 0);
        assert!(output.contains("-b"));
    }

    #[test]
    fn identical_content_changes_nothing() {
        let (_, stats) = generate_unified_diff(&PathBuf::from("x.xml"), "same\n", "same\n", 3);
        assert_eq!(stats.files_changed, 0);
    }
}
