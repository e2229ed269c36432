use grep::regex::RegexMatcher;
use grep::searcher::{Searcher, Sink, SinkMatch};
use std::error::Error;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[path = "hygiene/comments.rs"]
mod comments;

use comments::{BannerTracker, comment_body, is_comment, is_doc_comment, is_shouting};

// Directories holding the crate's own Rust sources. Anything else under the
// package root (vendored reference material, target/) is left alone.
const SOURCE_ROOTS: [&str; 5] = ["denoise", "patches", "tests", "benches", "hygiene"];

const FORBIDDEN_WORDS: [&str; 14] = [
    "FIXED",
    "CORRECTED",
    "FIX",
    "FIXES",
    "NEW",
    "CHANGED",
    "CHANGES",
    "CHANGE",
    "MODIFIED",
    "MODIFIES",
    "MODIFY",
    "UPDATED",
    "UPDATES",
    "UPDATE",
];

// Which matched lines a rule actually reports.
#[derive(Clone, Copy)]
enum LineFilter {
    // Every match is a violation.
    All,
    // Skip matches on comment lines and inside string literals.
    CodeOnly,
    // Skip `///` and `//!` doc comments.
    NonDocComment,
    // Report comments whose alphabetic characters are all uppercase, except
    // the titles of `// ====` banner blocks.
    ShoutingComment,
}

struct Rule {
    name: &'static str,
    pattern: String,
    filter: LineFilter,
    hint: &'static str,
}

fn rules() -> Vec<Rule> {
    vec![
        Rule {
            name: "underscore-prefixed identifiers",
            pattern: r"\b(_[a-zA-Z0-9_]+)\b".to_string(),
            filter: LineFilter::CodeOnly,
            hint: "Either use the binding (dropping the underscore) or remove it completely.",
        },
        Rule {
            name: "forbidden comment words",
            pattern: format!(r"(//|/\*).*(?:{})", FORBIDDEN_WORDS.join("|")),
            filter: LineFilter::All,
            hint: "Comments must describe the code as it is, not its edit history.",
        },
        Rule {
            name: "'**' in regular comments",
            pattern: r"(//|/\*).*\*\*".to_string(),
            filter: LineFilter::NonDocComment,
            hint: "Emphasis markers are only allowed in doc comments.",
        },
        Rule {
            name: "all-uppercase comments",
            pattern: r"(//|/\*).*".to_string(),
            filter: LineFilter::ShoutingComment,
            hint: "Rewrite the comment in sentence case or delete it.",
        },
        Rule {
            name: "#[allow(dead_code)] attributes",
            pattern: r"#\s*\[\s*allow\s*\(\s*dead_code\s*\)\s*\]".to_string(),
            filter: LineFilter::All,
            hint: "Either use the code or remove it completely.",
        },
    ]
}

// Collects the reported lines of one file for one rule.
struct RuleCollector {
    filter: LineFilter,
    banner: BannerTracker,
    violations: Vec<String>,
}

impl RuleCollector {
    fn new(filter: LineFilter) -> Self {
        Self {
            filter,
            banner: BannerTracker::new(),
            violations: Vec::new(),
        }
    }
}

impl Sink for RuleCollector {
    type Error = std::io::Error;

    fn matched(&mut self, _: &Searcher, mat: &SinkMatch) -> Result<bool, Self::Error> {
        let line_number = mat.line_number().unwrap_or(0);
        let line_text = std::str::from_utf8(mat.bytes()).unwrap_or("").trim_end();

        let report = match self.filter {
            LineFilter::All => true,
            LineFilter::CodeOnly => !is_comment(line_text) && !underscore_in_string(line_text),
            LineFilter::NonDocComment => !is_doc_comment(line_text),
            LineFilter::ShoutingComment => {
                let in_banner = self.banner.observe(line_number, line_text);
                !in_banner && comment_body(line_text).is_some_and(is_shouting)
            }
        };
        if report {
            self.violations.push(format!("{line_number}:{line_text}"));
        }
        Ok(true)
    }
}

fn underscore_in_string(line: &str) -> bool {
    line.split('"')
        .enumerate()
        .any(|(i, part)| i % 2 == 1 && part.contains('_'))
}

fn rust_sources() -> Vec<PathBuf> {
    SOURCE_ROOTS
        .iter()
        .map(Path::new)
        .filter(|root| root.is_dir())
        .flat_map(|root| WalkDir::new(root).into_iter().filter_map(|e| e.ok()))
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "rs"))
        .map(|e| e.into_path())
        .collect()
}

fn scan(sources: &[PathBuf]) -> Result<(), Box<dyn Error>> {
    let mut searcher = Searcher::new();
    for rule in rules() {
        let matcher = RegexMatcher::new_line_matcher(&rule.pattern)?;
        for path in sources {
            let mut collector = RuleCollector::new(rule.filter);
            searcher.search_path(&matcher, path, &mut collector)?;
            if collector.violations.is_empty() {
                continue;
            }

            let mut message = format!(
                "\n❌ ERROR: Found {} {} in {}:\n",
                collector.violations.len(),
                rule.name,
                path.display()
            );
            for violation in &collector.violations {
                message.push_str(&format!("   {violation}\n"));
            }
            message.push_str(&format!(
                "\n⚠️ {} are not allowed in this project.\n   {}\n",
                rule.name, rule.hint
            ));
            return Err(message.into());
        }
    }
    Ok(())
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    for root in SOURCE_ROOTS {
        println!("cargo:rerun-if-changed={root}");
    }

    let sources = rust_sources();
    if let Err(e) = scan(&sources) {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
