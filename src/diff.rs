use imara_diff::{Algorithm, Diff, InternedInput, Token};
use std::ops::Range;

/// Sentinel returned instead of a rendered diff when the two texts carry
/// the same lines. The sole channel by which "no change" is signaled.
pub const NO_CHANGES: &str = "No changes detected";

/// A change counts as significant when its rendering carries more than
/// this many added/removed lines.
pub const SIGNIFICANT_LINE_THRESHOLD: usize = 5;

/// How many lines of each unchanged run are reproduced as context.
const CONTEXT_PREVIEW_LINES: usize = 2;

/// Line-level diff of two plain-text snapshots. Added lines render as
/// `+ line`, removed lines as `- line`, and each unchanged run as a
/// truncated two-line preview indented by two spaces. Returns
/// [`NO_CHANGES`] when no line was added or removed.
pub fn generate_diff(old_text: &str, new_text: &str) -> String {
    let input = InternedInput::new(old_text, new_text);
    let diff = Diff::compute(Algorithm::Histogram, &input);

    let mut renderer = ChangeRenderer::new(&input);
    for hunk in diff.hunks() {
        renderer.process_hunk(hunk.before, hunk.after);
    }
    let (rendered, changed_runs) = renderer.finish();

    if changed_runs == 0 {
        NO_CHANGES.to_string()
    } else {
        rendered
    }
}

/// Count rendered `+`/`-` lines and compare against the fixed threshold.
/// Purely syntactic over the diff's own rendering.
pub fn has_significant_changes(diff_text: &str) -> bool {
    let changed = diff_text
        .lines()
        .filter(|line| line.starts_with('+') || line.starts_with('-'))
        .count();

    changed > SIGNIFICANT_LINE_THRESHOLD
}

/// Renders the hunks imara-diff reports, interleaved with previews of
/// the unchanged runs between them.
struct ChangeRenderer<'a> {
    input: &'a InternedInput<&'a str>,
    pos: u32,
    out: String,
    changed_runs: usize,
}

impl<'a> ChangeRenderer<'a> {
    fn new(input: &'a InternedInput<&'a str>) -> Self {
        Self {
            input,
            pos: 0,
            out: String::new(),
            changed_runs: 0,
        }
    }

    fn process_hunk(&mut self, before: Range<u32>, after: Range<u32>) {
        self.push_context(self.pos..before.start);

        if !before.is_empty() {
            let removed =
                self.input.before[before.start as usize..before.end as usize].to_vec();
            self.push_lines(&removed, "- ");
            self.changed_runs += 1;
        }

        if !after.is_empty() {
            let added = self.input.after[after.start as usize..after.end as usize].to_vec();
            self.push_lines(&added, "+ ");
            self.changed_runs += 1;
        }

        self.pos = before.end;
    }

    fn finish(mut self) -> (String, usize) {
        self.push_context(self.pos..self.input.before.len() as u32);
        (self.out, self.changed_runs)
    }

    fn push_context(&mut self, range: Range<u32>) {
        let tokens = &self.input.before[range.start as usize..range.end as usize];
        for &token in tokens.iter().take(CONTEXT_PREVIEW_LINES) {
            self.out.push_str("  ");
            self.out.push_str(self.input.interner[token]);
            self.out.push('\n');
        }
    }

    fn push_lines(&mut self, tokens: &[Token], prefix: &str) {
        for &token in tokens {
            self.out.push_str(prefix);
            self.out.push_str(self.input.interner[token]);
            self.out.push('\n');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_texts_return_sentinel() {
        let text = "Pricing\nStarter: $10/mo\nTeam: $49/mo";
        assert_eq!(generate_diff(text, text), NO_CHANGES);
    }

    #[test]
    fn empty_texts_return_sentinel() {
        assert_eq!(generate_diff("", ""), NO_CHANGES);
    }

    #[test]
    fn price_change_renders_one_removal_and_one_addition() {
        let rendered = generate_diff("Price: $10/mo", "Price: $15/mo");

        assert!(rendered.contains("- Price: $10/mo"));
        assert!(rendered.contains("+ Price: $15/mo"));

        let changed = rendered
            .lines()
            .filter(|l| l.starts_with('+') || l.starts_with('-'))
            .count();
        assert_eq!(changed, 2);
        assert!(!has_significant_changes(&rendered));
    }

    #[test]
    fn pure_addition_renders_plus_lines_only() {
        let old = "Home\nAbout";
        let new = "Home\nAbout\nCareers";

        let rendered = generate_diff(old, new);
        assert!(rendered.contains("+ Careers"));
        assert!(!rendered.lines().any(|l| l.starts_with('-')));
    }

    #[test]
    fn removal_heavy_diff_crosses_the_threshold() {
        let old = "a\nb\nc\nd\ne\nf\ng";
        let new = "g";

        let rendered = generate_diff(old, new);
        let removed = rendered.lines().filter(|l| l.starts_with('-')).count();
        assert_eq!(removed, 6);
        assert!(has_significant_changes(&rendered));
    }

    #[test]
    fn unchanged_runs_are_previewed_at_most_two_lines() {
        let old = "a\nb\nc\nd\ne\nold tail";
        let new = "a\nb\nc\nd\ne\nnew tail";

        let rendered = generate_diff(old, new);
        let context: Vec<&str> = rendered
            .lines()
            .filter(|l| l.starts_with("  "))
            .collect();

        // Five unchanged leading lines collapse to a two-line preview.
        assert_eq!(context, vec!["  a", "  b"]);
        assert!(rendered.contains("- old tail"));
        assert!(rendered.contains("+ new tail"));
    }

    #[test]
    fn significance_boundary_is_strictly_greater_than_five() {
        let five = "+ a\n+ b\n+ c\n- d\n- e\n";
        assert!(!has_significant_changes(five));

        let six = "+ a\n+ b\n+ c\n- d\n- e\n- f\n";
        assert!(has_significant_changes(six));
    }

    #[test]
    fn sentinel_is_never_significant() {
        assert!(!has_significant_changes(NO_CHANGES));
    }

    #[test]
    fn context_lines_do_not_count_toward_significance() {
        let rendered = "  unchanged\n+ one\n- two\n  more unchanged\n";
        assert!(!has_significant_changes(rendered));
    }
}
