use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer};

use genealogy::cli::args::Cli;
use genealogy::cli::commands::execute_command;
use genealogy::cli::output;

fn main() {
    let cli = Cli::parse();

    setup_logging(cli.debug);

    if let Err(e) = execute_command(&cli) {
        output::error(&e);
        std::process::exit(e.exit_code());
    }
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        3 => LevelFilter::TRACE,
        _ => {
            eprintln!("Don't be crazy, max is -d -d -d");
            LevelFilter::TRACE
        }
    };

    // Logs go to stderr so stdout stays clean for tree and table output
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .with_span_events(FmtSpan::CLOSE);

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(filter))
        .init();

    match filter {
        LevelFilter::INFO => tracing::info!("Debug mode: info"),
        LevelFilter::DEBUG => tracing::debug!("Debug mode: debug"),
        LevelFilter::TRACE => tracing::debug!("Debug mode: trace"),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genealogy::util::testing;
    use tracing::info;

    // https://docs.rs/clap/latest/clap/_derive/_tutorial/index.html#testing
    #[test]
    fn verify_cli() {
        testing::init_test_setup();
        use clap::CommandFactory;
        Cli::command().debug_assert();
        info!("Debug mode: info");
    }

    #[test]
    fn given_depth_flag_when_parsing_downline_then_uses_short_l() {
        let cli = Cli::try_parse_from(["genealogy", "-dd", "downline", "A", "-L", "2"]).unwrap();
        assert_eq!(cli.debug, 2);
        match cli.command {
            Some(genealogy::cli::Commands::Downline { id, depth }) => {
                assert_eq!(id, "A");
                assert_eq!(depth, Some(2));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
