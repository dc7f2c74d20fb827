//! Hygiene: source-level standards for the scene crate.
//!
//! Each rule scans production sources under `src/` (test modules excluded)
//! for a pattern and holds it to a budget. Budgets only move down.
#![allow(clippy::absurd_extreme_comparisons)]

use std::fs;
use std::path::Path;

struct SourceFile {
    path: String,
    content: String,
}

/// A forbidden pattern and how many occurrences are tolerated.
struct Rule {
    pattern: &'static str,
    max: usize,
    why: &'static str,
}

// Panics crash the host session.
const UNWRAP: Rule = Rule { pattern: ".unwrap()", max: 0, why: "propagate with `?` or handle the None/Err" };
const EXPECT: Rule = Rule { pattern: ".expect(", max: 0, why: "propagate with `?` or handle the None/Err" };
const PANIC: Rule = Rule { pattern: "panic!(", max: 0, why: "return an error instead" };
const UNREACHABLE: Rule = Rule { pattern: "unreachable!(", max: 0, why: "model the case in the type" };
const TODO: Rule = Rule { pattern: "todo!(", max: 0, why: "finish the stub" };
const UNIMPLEMENTED: Rule = Rule { pattern: "unimplemented!(", max: 0, why: "finish the stub" };

// Silent loss discards errors without looking at them.
const SILENT_DISCARD: Rule = Rule { pattern: "let _ =", max: 0, why: "match on the result and log" };
const DOT_OK: Rule = Rule { pattern: ".ok()", max: 0, why: "match on the result and log" };

// The scene crate does no console I/O; diagnostics go through `tracing`.
const PRINTLN: Rule = Rule { pattern: "println!(", max: 0, why: "use tracing" };
const EPRINTLN: Rule = Rule { pattern: "eprintln!(", max: 0, why: "use tracing" };

const ALLOW_DEAD_CODE: Rule = Rule { pattern: "#[allow(dead_code)]", max: 0, why: "delete the code" };

/// Production `.rs` files under `src/`, excluding `*_test.rs`.
fn source_files() -> Vec<SourceFile> {
    let mut files = Vec::new();
    collect_rs_files(Path::new("src"), &mut files);
    files
}

fn collect_rs_files(dir: &Path, out: &mut Vec<SourceFile>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_rs_files(&path, out);
        } else if path.extension().is_some_and(|e| e == "rs") {
            let path_str = path.to_string_lossy().to_string();
            if path_str.ends_with("_test.rs") {
                continue;
            }
            if let Ok(content) = fs::read_to_string(&path) {
                out.push(SourceFile { path: path_str, content });
            }
        }
    }
}

fn check(rule: &Rule) {
    let files = source_files();
    assert!(!files.is_empty(), "no sources found; run from the scene crate root");

    let hits: Vec<(String, usize)> = files
        .iter()
        .filter_map(|file| {
            let count = file.content.lines().filter(|line| line.contains(rule.pattern)).count();
            (count > 0).then(|| (file.path.clone(), count))
        })
        .collect();
    let count: usize = hits.iter().map(|(_, c)| c).sum();
    let listing = hits
        .iter()
        .map(|(path, c)| format!("  {path}: {c}"))
        .collect::<Vec<_>>()
        .join("\n");

    assert!(
        count <= rule.max,
        "`{}` budget exceeded: found {count}, max {} ({}).\n{listing}",
        rule.pattern,
        rule.max,
        rule.why
    );
}

#[test]
fn unwrap_budget() {
    check(&UNWRAP);
}

#[test]
fn expect_budget() {
    check(&EXPECT);
}

#[test]
fn panic_budget() {
    check(&PANIC);
}

#[test]
fn unreachable_budget() {
    check(&UNREACHABLE);
}

#[test]
fn todo_budget() {
    check(&TODO);
}

#[test]
fn unimplemented_budget() {
    check(&UNIMPLEMENTED);
}

#[test]
fn silent_discard_budget() {
    check(&SILENT_DISCARD);
}

#[test]
fn dot_ok_budget() {
    check(&DOT_OK);
}

#[test]
fn println_budget() {
    check(&PRINTLN);
}

#[test]
fn eprintln_budget() {
    check(&EPRINTLN);
}

#[test]
fn allow_dead_code_budget() {
    check(&ALLOW_DEAD_CODE);
}
