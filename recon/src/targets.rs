//! Target parsing — newline-separated input into an ordered target list

use std::fmt;

use serde::Serialize;

/// A single trimmed, non-empty URL or host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Target(String);

impl Target {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Split on line breaks, trim each line and drop the empty ones.
/// Order and duplicates are preserved.
pub fn parse(raw: &str) -> Vec<Target> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| Target(line.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(targets: &[Target]) -> Vec<&str> {
        targets.iter().map(Target::as_str).collect()
    }

    #[test]
    fn test_blank_lines_and_whitespace() {
        let targets = parse("example.com\n\nhttp://foo.test \n");
        assert_eq!(strings(&targets), vec!["example.com", "http://foo.test"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(parse("").is_empty());
        assert!(parse("\n \n\t\n").is_empty());
    }

    #[test]
    fn test_crlf_line_breaks() {
        let targets = parse("a.test\r\nb.test\r\n");
        assert_eq!(strings(&targets), vec!["a.test", "b.test"]);
    }

    #[test]
    fn test_duplicates_and_order_kept() {
        let targets = parse("  b.test\na.test\nb.test");
        assert_eq!(strings(&targets), vec!["b.test", "a.test", "b.test"]);
    }

    #[test]
    fn test_no_blank_entries() {
        let input = "x\n   \n\ty \n\n\nz\t";
        for target in parse(input) {
            assert!(!target.as_str().trim().is_empty());
            assert_eq!(target.as_str(), target.as_str().trim());
        }
    }
}
