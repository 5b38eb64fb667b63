//! Integration tests that drive the compiled `sift` binary end-to-end
//! through pipes, checking output order, separators and exit codes.

use std::io::Write;
use std::process::{Command, Output, Stdio};

fn run_sift(args: &[&str], input: &[u8]) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_sift"))
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("binary must spawn");
    child
        .stdin
        .as_mut()
        .expect("stdin piped")
        .write_all(input)
        .expect("write to child stdin");
    child.wait_with_output().expect("child must exit")
}

fn stdout_lines(output: &Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn test_help_and_version() {
    let help = run_sift(&["--help"], b"");
    assert!(help.status.success());
    let text = String::from_utf8_lossy(&help.stdout);
    assert!(text.contains("USAGE"), "help must describe usage");
    assert!(text.contains("--filter"));

    let version = run_sift(&["--version"], b"");
    assert!(version.status.success());
    assert!(
        String::from_utf8_lossy(&version.stdout).contains(env!("CARGO_PKG_VERSION")),
        "version output must carry the crate version"
    );
}

#[test]
fn test_filter_ranks_and_exits_zero() {
    let output = run_sift(&["--filter", "ba", "--color", "off"], b"foo\nbar\nbaz\n");
    assert_eq!(output.status.code(), Some(0), "matches mean exit 0");
    assert_eq!(stdout_lines(&output), vec!["bar", "baz"]);
}

#[test]
fn test_positional_query() {
    let output = run_sift(&["ba", "--color=off"], b"foo\nbar\nbaz\n");
    assert_eq!(stdout_lines(&output), vec!["bar", "baz"]);
}

#[test]
fn test_no_match_exits_one() {
    let output = run_sift(&["--filter", "zzz", "--color", "off"], b"foo\nbar\n");
    assert_eq!(output.status.code(), Some(1), "no match means exit 1");
    assert!(output.stdout.is_empty());
}

#[test]
fn test_usage_error_exits_two() {
    let output = run_sift(&["--frobnicate"], b"");
    assert_eq!(output.status.code(), Some(2), "usage errors mean exit 2");
    assert!(!output.stderr.is_empty());
}

#[test]
fn test_bad_regex_exits_two() {
    let output = run_sift(&["--regex", "--filter", "(unclosed"], b"anything\n");
    assert_eq!(output.status.code(), Some(2));
    assert!(
        String::from_utf8_lossy(&output.stderr).contains("regex"),
        "the error message names the regex"
    );
}

#[test]
fn test_empty_query_passes_everything_through() {
    let output = run_sift(&["--color", "off"], b"one\ntwo\nthree\n");
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout_lines(&output), vec!["one", "two", "three"]);
}

#[test]
fn test_tac_order() {
    let output = run_sift(&["--filter", "x", "--tac", "--color", "off"], b"x1\nx2\nx3\n");
    assert_eq!(stdout_lines(&output), vec!["x3", "x2", "x1"]);
}

#[test]
fn test_print0_and_read0() {
    let output = run_sift(
        &["--filter", "b", "--read0", "--print0", "--color", "off"],
        b"a one\0b two\0b three\0",
    );
    assert_eq!(output.status.code(), Some(0));
    let parts: Vec<&[u8]> = output.stdout.split(|&b| b == 0).filter(|p| !p.is_empty()).collect();
    assert_eq!(parts, vec![b"b two".as_slice(), b"b three".as_slice()]);
}

#[test]
fn test_output_emits_original_bytes() {
    // With --ansi matching runs on stripped text but output is the raw record
    let output = run_sift(
        &["--filter", "red", "--ansi", "--color", "off"],
        b"\x1b[31mred\x1b[0m line\nplain\n",
    );
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(output.stdout, b"\x1b[31mred\x1b[0m line\n");
}

#[test]
fn test_forced_color_highlights_matches() {
    let output = run_sift(&["--filter", "bar", "--color", "on"], b"foobar\n");
    assert_eq!(output.status.code(), Some(0));
    let text = String::from_utf8_lossy(&output.stdout);
    assert!(text.contains("\x1b["), "--color on paints even into a pipe");
    assert!(text.contains("bar"));
}

#[test]
fn test_header_lines_excluded_from_output() {
    let output = run_sift(
        &["--header-lines", "1", "--color", "off"],
        b"NAME  SIZE\nfoo 1\nbar 2\n",
    );
    assert_eq!(stdout_lines(&output), vec!["foo 1", "bar 2"]);
}

#[test]
fn test_nth_with_delimiter() {
    let output = run_sift(
        &["--filter", "root", "--nth", "1", "--delimiter", ":", "--color", "off"],
        b"root:x:0\nnobody:x:root\n",
    );
    assert_eq!(stdout_lines(&output), vec!["root:x:0"]);
}

#[test]
fn test_large_input_ranked_consistently() {
    let mut input = Vec::new();
    for i in 0..5_000 {
        input.extend_from_slice(format!("path/to/file-{:04}.txt\n", i).as_bytes());
    }
    input.extend_from_slice(b"path/to/needle.rs\n");

    let output = run_sift(&["--filter", "needle", "--color", "off"], &input);
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout_lines(&output), vec!["path/to/needle.rs"]);
}
