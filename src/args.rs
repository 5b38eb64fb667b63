//! # args.rs - Command-line argument parsing for sift
//!
//! This module handles parsing command-line arguments and provides
//! structured access to the parsed options. Both `--flag value` and
//! `--flag=value` forms are accepted.

use std::str::FromStr;

use crate::ColorMode;
use crate::fields::{self, FieldRange};
use crate::pattern::CaseMatching;
use crate::result::{Criterion, parse_criteria};

/// Parsed command-line arguments for the `sift` binary.
///
/// This structure contains the semantic options extracted from the raw
/// command-line invocation. It is returned by `parse_args()` for use by
/// the main application logic.
#[derive(Debug)]
pub struct Args {
    /// Query to filter with (from `--filter` or the positional argument)
    pub query: String,
    /// Interpret the query as a regular expression
    pub regex: bool,
    /// Default term kind becomes exact
    pub exact: bool,
    /// Reverse the order of equally-ranked items
    pub tac: bool,
    /// Do not rank; keep ingestion order
    pub no_sort: bool,
    /// Case sensitivity mode
    pub case: CaseMatching,
    /// Sort criteria after the score
    pub tiebreak: Vec<Criterion>,
    /// Restrict matching to these fields
    pub nth: Vec<FieldRange>,
    /// Field delimiter regex for `--nth`
    pub delimiter: Option<String>,
    /// Parse ANSI colour codes in the input
    pub ansi: bool,
    /// Read NUL-separated records
    pub read0: bool,
    /// Write NUL-separated records
    pub print0: bool,
    /// Treat the first N lines as a header
    pub header_lines: usize,
    /// Requested color mode (on/off/auto)
    pub color: ColorMode,
    /// Matcher thread count (0 = number of cores)
    pub threads: usize,
    /// Print the version and exit
    pub show_version: bool,
    /// Print usage and exit
    pub show_help: bool,
}

impl Default for Args {
    fn default() -> Self {
        Args {
            query: String::new(),
            regex: false,
            exact: false,
            tac: false,
            no_sort: false,
            case: CaseMatching::Smart,
            tiebreak: vec![Criterion::Score],
            nth: Vec::new(),
            delimiter: None,
            ansi: false,
            read0: false,
            print0: false,
            header_lines: 0,
            color: ColorMode::Auto,
            threads: 0,
            show_version: false,
            show_help: false,
        }
    }
}

/// Parse command-line arguments from the environment.
///
/// Returns parsed arguments or an error message describing the invalid
/// usage.
pub fn parse_args() -> Result<Args, String> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    parse_args_impl(args)
}

/// Internal implementation of argument parsing.
///
/// This function contains the core parsing logic and can be used both by
/// `parse_args()` (which gets args from the environment) and by tests
/// (which pass args directly).
fn parse_args_impl(args: Vec<String>) -> Result<Args, String> {
    // Helper to read an argument value from either "--arg value" or
    // "--arg=value".
    fn parse_arg_value<'a>(
        args: &'a [String],
        index: usize,
        arg_name: &str,
    ) -> Result<(&'a str, usize), String> {
        let arg = args[index].as_str();
        let prefix = format!("--{}=", arg_name);

        if let Some(value) = arg.strip_prefix(&prefix) {
            if value.is_empty() {
                return Err(format!("Missing value for --{}", arg_name));
            }
            Ok((value, index + 1))
        } else if index + 1 < args.len() {
            Ok((args[index + 1].as_str(), index + 2))
        } else {
            Err(format!("Missing value for --{}", arg_name))
        }
    }

    let mut parsed = Args::default();
    let mut positional: Option<String> = None;
    let mut filter: Option<String> = None;
    let mut index = 0;

    while index < args.len() {
        let arg = args[index].as_str();
        match arg {
            "--help" | "-h" => {
                parsed.show_help = true;
                index += 1;
            }
            "--version" | "-V" => {
                parsed.show_version = true;
                index += 1;
            }
            "--regex" => {
                parsed.regex = true;
                index += 1;
            }
            "--exact" | "-e" => {
                parsed.exact = true;
                index += 1;
            }
            "--tac" => {
                parsed.tac = true;
                index += 1;
            }
            "--no-sort" => {
                parsed.no_sort = true;
                index += 1;
            }
            "--ansi" => {
                parsed.ansi = true;
                index += 1;
            }
            "--read0" | "-0" => {
                parsed.read0 = true;
                index += 1;
            }
            "--print0" => {
                parsed.print0 = true;
                index += 1;
            }
            _ if arg == "--filter" || arg == "-f" || arg.starts_with("--filter=") => {
                let (value, next) = parse_arg_value(&args, index, "filter")?;
                filter = Some(value.to_string());
                index = next;
            }
            _ if arg == "--case" || arg.starts_with("--case=") => {
                let (value, next) = parse_arg_value(&args, index, "case")?;
                parsed.case = CaseMatching::from_str(value)?;
                index = next;
            }
            _ if arg == "--tiebreak" || arg.starts_with("--tiebreak=") => {
                let (value, next) = parse_arg_value(&args, index, "tiebreak")?;
                parsed.tiebreak = parse_criteria(value)?;
                index = next;
            }
            _ if arg == "--nth" || arg.starts_with("--nth=") => {
                let (value, next) = parse_arg_value(&args, index, "nth")?;
                parsed.nth = fields::parse_ranges(value)?;
                index = next;
            }
            _ if arg == "--delimiter" || arg == "-d" || arg.starts_with("--delimiter=") => {
                let (value, next) = parse_arg_value(&args, index, "delimiter")?;
                parsed.delimiter = Some(value.to_string());
                index = next;
            }
            _ if arg == "--header-lines" || arg.starts_with("--header-lines=") => {
                let (value, next) = parse_arg_value(&args, index, "header-lines")?;
                parsed.header_lines = value
                    .parse::<usize>()
                    .map_err(|_| format!("Invalid --header-lines value: '{}'", value))?;
                index = next;
            }
            _ if arg == "--color" || arg.starts_with("--color=") => {
                let (value, next) = parse_arg_value(&args, index, "color")?;
                parsed.color = ColorMode::from_str(value)
                    .map_err(|_| format!("Invalid --color value: '{}' (on|off|auto)", value))?;
                index = next;
            }
            _ if arg == "--threads" || arg.starts_with("--threads=") => {
                let (value, next) = parse_arg_value(&args, index, "threads")?;
                parsed.threads = value
                    .parse::<usize>()
                    .map_err(|_| format!("Invalid --threads value: '{}'", value))?;
                index = next;
            }
            _ if arg.starts_with('-') && arg.len() > 1 => {
                return Err(format!("Unknown option: '{}'", arg));
            }
            _ => {
                if positional.is_some() {
                    return Err(format!("Unexpected argument: '{}'", arg));
                }
                positional = Some(arg.to_string());
                index += 1;
            }
        }
    }

    // --filter wins over the positional query when both are present
    parsed.query = filter.or(positional).unwrap_or_default();
    Ok(parsed)
}

/// Print usage information to stdout.
pub fn print_help() {
    println!(
        "sift {} - streaming fuzzy filter

USAGE:
    producer | sift [OPTIONS] [QUERY]

OPTIONS:
    -f, --filter QUERY      Filter with QUERY (same as the positional)
        --regex             Interpret the query as a regular expression
    -e, --exact             Default term kind becomes exact
        --tac               Reverse the order of equally-ranked items
        --no-sort           Keep ingestion order instead of ranking
        --case MODE         Case sensitivity: smart|respect|ignore
        --tiebreak LIST     Sort criteria: length,begin,end,chunk,pathname
        --nth RANGES        Match only these fields (e.g. 1,3..5,-1)
    -d, --delimiter RE      Field delimiter regex for --nth
        --ansi              Parse ANSI colour codes in the input
    -0, --read0             Read NUL-separated records
        --print0            Write NUL-separated records
        --header-lines N    Treat the first N lines as a header
        --color MODE        Colour output: on|off|auto
        --threads N         Matcher threads (0 = number of cores)
    -V, --version           Print version information
    -h, --help              Print this help

EXIT STATUS:
    {}  at least one match
    {}  no match
    {}  error
    {}  interrupted",
        env!("CARGO_PKG_VERSION"),
        crate::EXIT_OK,
        crate::EXIT_NO_MATCH,
        crate::EXIT_ERROR,
        crate::EXIT_INTERRUPT,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, String> {
        parse_args_impl(args.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]).unwrap();
        assert_eq!(args.query, "");
        assert!(!args.regex);
        assert!(!args.tac);
        assert_eq!(args.case, CaseMatching::Smart);
        assert_eq!(args.tiebreak, vec![Criterion::Score]);
        assert_eq!(args.color, ColorMode::Auto);
        assert_eq!(args.threads, 0);
    }

    #[test]
    fn test_positional_query() {
        let args = parse(&["needle"]).unwrap();
        assert_eq!(args.query, "needle");
    }

    #[test]
    fn test_filter_flag_both_forms() {
        assert_eq!(parse(&["--filter", "foo"]).unwrap().query, "foo");
        assert_eq!(parse(&["--filter=foo"]).unwrap().query, "foo");
        assert_eq!(parse(&["-f", "foo"]).unwrap().query, "foo");
    }

    #[test]
    fn test_filter_wins_over_positional() {
        let args = parse(&["positional", "--filter", "flag"]).unwrap();
        assert_eq!(args.query, "flag");
    }

    #[test]
    fn test_boolean_flags() {
        let args =
            parse(&["--regex", "--exact", "--tac", "--no-sort", "--ansi", "--read0", "--print0"])
                .unwrap();
        assert!(args.regex && args.exact && args.tac && args.no_sort);
        assert!(args.ansi && args.read0 && args.print0);
    }

    #[test]
    fn test_case_and_tiebreak() {
        let args = parse(&["--case=ignore", "--tiebreak", "length,begin"]).unwrap();
        assert_eq!(args.case, CaseMatching::Ignore);
        assert_eq!(
            args.tiebreak,
            vec![Criterion::Score, Criterion::Length, Criterion::Begin]
        );

        assert!(parse(&["--case", "fuzzy"]).is_err());
        assert!(parse(&["--tiebreak", "altitude"]).is_err());
    }

    #[test]
    fn test_nth_and_delimiter() {
        let args = parse(&["--nth", "2,-1", "--delimiter", ":"]).unwrap();
        assert_eq!(args.nth.len(), 2);
        assert_eq!(args.delimiter.as_deref(), Some(":"));
        assert!(parse(&["--nth", "0"]).is_err());
    }

    #[test]
    fn test_numeric_options() {
        let args = parse(&["--header-lines=3", "--threads", "8"]).unwrap();
        assert_eq!(args.header_lines, 3);
        assert_eq!(args.threads, 8);
        assert!(parse(&["--header-lines", "many"]).is_err());
        assert!(parse(&["--threads"]).is_err(), "missing value is an error");
    }

    #[test]
    fn test_unknown_option_rejected() {
        assert!(parse(&["--frobnicate"]).is_err());
        assert!(parse(&["-z"]).is_err());
    }

    #[test]
    fn test_two_positionals_rejected() {
        assert!(parse(&["one", "two"]).is_err());
    }

    #[test]
    fn test_help_and_version() {
        assert!(parse(&["--help"]).unwrap().show_help);
        assert!(parse(&["-h"]).unwrap().show_help);
        assert!(parse(&["--version"]).unwrap().show_version);
        assert!(parse(&["-V"]).unwrap().show_version);
    }
}
