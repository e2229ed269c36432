// Comment classification shared by the build-time source scan and its tests.

pub fn is_comment(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("//") || trimmed.starts_with("/*")
}

pub fn is_doc_comment(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("///") || trimmed.starts_with("//!")
}

/// Text of the comment on a line that starts with one, markers stripped.
pub fn comment_body(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    if let Some(rest) = trimmed.strip_prefix("//") {
        return Some(rest.trim_start_matches(['/', '!']).trim());
    }
    let start = line.find("/*")? + 2;
    let body = &line[start..];
    Some(body.find("*/").map_or(body, |end| &body[..end]).trim())
}

pub fn is_shouting(comment: &str) -> bool {
    let mut letters = comment.chars().filter(|c| c.is_alphabetic()).peekable();
    letters.peek().is_some() && letters.all(char::is_uppercase)
}

/// A `// ====...` rule line opening or closing a banner block.
pub fn is_banner_rule(line: &str) -> bool {
    is_comment(line)
        && comment_body(line).is_some_and(|body| body.len() >= 8 && body.chars().all(|c| c == '='))
}

/// Follows banner blocks through the comment lines of one file:
///
/// ```text
/// // ==========
/// //   Section title
/// // ==========
/// ```
///
/// Lines must be fed in file order. A gap in line numbers or a line that is
/// not a pure comment closes any open block.
#[derive(Debug, Default)]
pub struct BannerTracker {
    open: bool,
    last_line: Option<u64>,
}

impl BannerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether `line` belongs to a banner block, rules included.
    pub fn observe(&mut self, line_number: u64, line: &str) -> bool {
        let contiguous = self.last_line.is_some_and(|last| last + 1 == line_number);
        self.last_line = Some(line_number);
        if !contiguous || !is_comment(line) {
            self.open = false;
        }
        if is_banner_rule(line) {
            self.open = !self.open;
            return true;
        }
        self.open
    }
}
