use similar::TextDiff;

/// Unified line diff between two report versions. Empty when they match.
pub fn report_diff(previous: &str, current: &str) -> Vec<String> {
    if previous == current {
        return Vec::new();
    }
    let diff = TextDiff::from_lines(previous, current);
    let rendered = diff.unified_diff().header("previous", "current").to_string();
    rendered.lines().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::report_diff;

    #[test]
    fn identical_reports_have_no_diff() {
        assert!(report_diff("a\nb\n", "a\nb\n").is_empty());
    }

    #[test]
    fn changed_lines_are_marked() {
        let lines = report_diff(
            "Findings: fracture of the right femur.\nImpression: acute.\n",
            "Findings: fracture of the left femur.\nImpression: acute.\n",
        );
        assert_eq!(lines[0], "--- previous");
        assert_eq!(lines[1], "+++ current");
        assert!(lines
            .iter()
            .any(|line| line == "-Findings: fracture of the right femur."));
        assert!(lines
            .iter()
            .any(|line| line == "+Findings: fracture of the left femur."));
    }
}
