#[path = "../hygiene/comments.rs"]
mod comments;

use comments::{
    BannerTracker, comment_body, is_banner_rule, is_comment, is_doc_comment, is_shouting,
};
use std::path::Path;
use walkdir::WalkDir;

const RULE: &str = "// ====================================================================";

/// Line numbers the build script's all-uppercase rule would report.
fn shouting_lines(text: &str) -> Vec<usize> {
    let mut banner = BannerTracker::new();
    text.lines()
        .enumerate()
        .filter(|(_, line)| line.contains("//") || line.contains("/*"))
        .filter_map(|(index, line)| {
            let in_banner = banner.observe(index as u64 + 1, line);
            let shouting = !in_banner && comment_body(line).is_some_and(is_shouting);
            shouting.then_some(index + 1)
        })
        .collect()
}

#[test]
fn classifies_comment_lines() {
    assert!(is_comment("    // note"));
    assert!(is_comment("/* block */"));
    assert!(!is_comment("let a = 1; // trailing"));
    assert!(is_doc_comment("/// item docs"));
    assert!(is_doc_comment("//! module docs"));
    assert!(!is_doc_comment("// plain"));
    assert_eq!(comment_body("  //! Module text"), Some("Module text"));
    assert_eq!(comment_body("/* inner */ code"), Some("inner"));
    assert!(is_banner_rule(RULE));
    assert!(!is_banner_rule("// == short"));
    assert!(is_shouting("MSE ONLY"));
    assert!(!is_shouting("MSE is 1"));
    assert!(!is_shouting("1 + 2"));
}

#[test]
fn banner_titles_are_exempt() {
    let text = [
        RULE,
        "//",
        "//         THE DENOISING PASS: VALIDATE, REFRESH, FAN OUT",
        "//",
        RULE,
        "//",
        "// Prose under the banner is ordinary text.",
        "fn main() {}",
    ]
    .join("\n");
    assert!(shouting_lines(&text).is_empty());
}

#[test]
fn shouting_outside_a_banner_is_reported() {
    let text = [
        RULE,
        "//  SECTION",
        RULE,
        "fn main() {",
        "    // DO NOT REORDER",
        "}",
    ]
    .join("\n");
    assert_eq!(shouting_lines(&text), vec![5]);
}

#[test]
fn code_between_rules_closes_the_banner() {
    let text = [RULE, "let a = 1;", "// STRAY TITLE", RULE].join("\n");
    assert_eq!(shouting_lines(&text), vec![3]);
}

#[test]
fn crate_sources_pass_the_uppercase_rule() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR"));
    let mut scanned = 0;
    for dir in ["denoise", "patches", "tests", "benches", "hygiene"] {
        for entry in WalkDir::new(root.join(dir)).into_iter().filter_map(|e| e.ok()) {
            if entry.path().extension().is_none_or(|ext| ext != "rs") {
                continue;
            }
            let text = std::fs::read_to_string(entry.path()).expect("readable source");
            assert_eq!(
                shouting_lines(&text),
                Vec::<usize>::new(),
                "{}",
                entry.path().display()
            );
            scanned += 1;
        }
    }
    assert!(scanned > 10);
}
