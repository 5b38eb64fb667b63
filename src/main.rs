use sift::{
    ColorMode, EXIT_ERROR, EXIT_NO_MATCH, EXIT_OK, Options, Session,
    ansi::{ATTR_BOLD, ATTR_UNDERLINE},
    args::{parse_args, print_help},
    buffer::RecordWriter,
    event::{EventType, Value},
    result::ColorPair,
};

use std::io::{self, IsTerminal, Write};

// Use mimalloc for faster memory allocation (reduces startup overhead)
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Main entry point for the sift binary.
///
/// Runs the matching pipeline in filter mode: read all records from
/// standard input, rank them against the query, and print the ranked
/// selection to standard output. It works by:
/// 1. Parsing command-line arguments.
/// 2. Spawning the reader and coordinator threads over stdin.
/// 3. Waiting until the producer is drained and the final search has
///    settled on the complete data.
/// 4. Writing the ranked records (with match highlighting on terminals).
///
/// Exit status: 0 with at least one match, 1 with none, 2 on errors.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // Parse command-line arguments
    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(EXIT_ERROR);
        }
    };

    if args.show_help {
        print_help();
        std::process::exit(EXIT_OK);
    }
    if args.show_version {
        println!("sift {}", env!("CARGO_PKG_VERSION"));
        std::process::exit(EXIT_OK);
    }

    let options = Options {
        query: args.query.clone(),
        regex: args.regex,
        exact: args.exact,
        tac: args.tac,
        no_sort: args.no_sort,
        case: args.case,
        tiebreak: args.tiebreak.clone(),
        nth: args.nth.clone(),
        delimiter: args.delimiter.clone(),
        ansi: args.ansi,
        read0: args.read0,
        print0: args.print0,
        header_lines: args.header_lines,
        color: args.color,
        threads: args.threads,
    };

    // Decide up front whether the output gets colours; piped output stays
    // plain under Auto.
    let stdout_is_terminal = io::stdout().is_terminal();
    let colorize = match options.color {
        ColorMode::On => true,
        ColorMode::Off => false,
        ColorMode::Auto => stdout_is_terminal,
    };

    let session = match Session::start(&options, io::stdin()) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(EXIT_ERROR);
        }
    };

    // Wait until the producer is drained and a search over the complete
    // data has been installed. Events arrive coalesced; ordering between
    // ReadFin and the final SearchFin is not guaranteed, so both paths
    // re-check the settle condition.
    let mut reading = true;
    let mut read_error: Option<String> = None;
    loop {
        if !reading && session.merger().snapshot_len() == session.item_count() {
            break;
        }
        session.notify_box().wait(|events| {
            for (event, value) in events.drain() {
                match event {
                    EventType::ReadFin => {
                        reading = false;
                        if let Value::Error(msg) = value {
                            read_error = Some(msg);
                        }
                    }
                    // Progress, headers and finished searches just advance
                    // the settle check above
                    _ => {}
                }
            }
        });
    }

    if let Some(msg) = read_error {
        eprintln!("Error: {}", msg);
        session.close();
        std::process::exit(EXIT_ERROR);
    }

    let merger = session.merger();
    let matched = merger.len();

    let stdout = io::stdout();
    let separator = if options.print0 { b'\0' } else { b'\n' };
    let mut writer = RecordWriter::new(
        std::io::BufWriter::with_capacity(64 * 1024, stdout.lock()),
        separator,
    );

    if colorize {
        // Paint match offsets over each record via the colour composer;
        // source colours survive when --ansi captured them.
        let base = ColorPair::DEFAULT;
        let highlight = ColorPair::new(1, -1, ATTR_BOLD);
        for i in 0..matched {
            let result = merger.get(i);
            let item = result.item();
            let runs =
                result.color_offsets(base, highlight, ATTR_UNDERLINE, item.char_len(), false);
            let mut painted = String::with_capacity(item.text().len() + 16);
            let chars: Vec<char> = item.text().chars().collect();
            for run in runs {
                let sgr = run.color.to_ansi_state().to_sgr();
                painted.push_str(&sgr);
                painted.extend(&chars[run.offset.begin as usize..run.offset.end as usize]);
                if !sgr.is_empty() {
                    painted.push_str("\x1b[0m");
                }
            }
            writer.write_record(painted.as_bytes())?;
        }
    } else {
        for i in 0..matched {
            let result = merger.get(i);
            writer.write_record(result.item().orig_bytes())?;
        }
    }
    writer.flush()?;

    session.close();
    std::process::exit(if matched > 0 { EXIT_OK } else { EXIT_NO_MATCH });
}
