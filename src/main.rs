//! Integration-test driver for the KijiMusic tutorial: fetch a KijiBento
//! release, start a local Bento cluster, run the tutorial command sequence
//! against it, and check every command's output.

// Useful common routines
#[macro_use]
mod common;

// The tutorial script itself
mod music;

/// Exit status for bad or missing command-line flags (EX_USAGE).
const EX_USAGE: i32 = 64;

fn parse_args() -> clap::ArgMatches<'static> {
    match music::cli_options().get_matches_safe() {
        Ok(matches) => matches,
        Err(err) => match err.kind {
            // --help and --version keep their normal behavior.
            clap::ErrorKind::HelpDisplayed | clap::ErrorKind::VersionDisplayed => err.exit(),
            _ => {
                eprintln!("{}", err.message);
                std::process::exit(EX_USAGE);
            }
        },
    }
}

fn init_logging(matches: &clap::ArgMatches<'_>) -> Result<(), failure::Error> {
    let mut builder = env_logger::Builder::from_default_env();
    if let Some(level) = matches.value_of("LOG_LEVEL") {
        builder.filter_level(common::parse_log_level(level)?);
    }
    builder.init();
    Ok(())
}

fn run() -> Result<(), failure::Error> {
    let matches = parse_args();
    init_logging(&matches)?;
    music::run(&matches)
}

fn main() {
    use console::style;

    // Always get backtraces. The performance penalty does not matter here;
    // the run time is dominated by the tutorial commands themselves.
    std::env::set_var("RUST_BACKTRACE", "1");

    if let Err(err) = run() {
        const MESSAGE: &str = r#"== ERROR ==================================================================================
`music-tutorial` encountered an error. The command log above may offer clues, as may the
captured *.out/*.err files in the log directory. Passing --log_level debug (or setting
RUST_LOG=debug) echoes every command as it runs."#;

        println!("{}", style(MESSAGE).red().bold());

        // Errors from output checks
        if err.downcast_ref::<common::check::CheckError>().is_some() {
            println!("A tutorial command produced output that failed a check");
        }

        // Print error and backtrace
        println!(
            "`music-tutorial` encountered the following error:\n{}\n{}",
            err.as_fail(),
            err.backtrace(),
        );

        std::process::exit(101);
    }
}
