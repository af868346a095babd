use anyhow::Result;
use clap::{Arg, Command};
use log::{debug, LevelFilter, Log, Metadata, Record};
use mlfq_sched::utils::{default_output_path, read_input_file, resolve_input_path, write_report};
use mlfq_sched::{parse_scheme, valid_scheme, Mlfq};
use std::path::PathBuf;

// Trace output goes to stderr so the timeline on stdout stays clean.
struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("{:5} {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

struct Args {
    inputfile: String,
    scheme: String,
    outputfile: Option<String>,
    verbosity: u64,
    quiet: bool,
}

fn parse_args() -> Args {
    let matches = Command::new("mlfq-sched")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Multilevel feedback queue scheduler simulator")
        .arg(
            Arg::new("inputfile")
                .help("process list, one `id;burst;arrival;level[;priority]` per line")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("scheme")
                .short('s')
                .long("scheme")
                .takes_value(true)
                .default_value("1")
                .validator(valid_scheme)
                .help("level scheme: preset 1, 2, 3 or a list like RR1,RR3,RR4,SJF"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .takes_value(true)
                .help("report path (default: input path with input -> output, .txt -> _out.txt)"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .multiple_occurrences(true)
                .help("log slices (-v) and queue operations (-vv) to stderr"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .help("do not print the timeline"),
        )
        .get_matches();

    Args {
        inputfile: matches.value_of("inputfile").unwrap_or_default().to_string(),
        scheme: matches.value_of("scheme").unwrap_or("1").to_string(),
        outputfile: matches.value_of("output").map(|s| s.to_string()),
        verbosity: matches.occurrences_of("verbose"),
        quiet: matches.is_present("quiet"),
    }
}

fn init_logging(verbosity: u64) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
    debug!("log level {}", level);
}

fn actual_main_fn(args: Args) -> Result<()> {
    let levels = parse_scheme(&args.scheme)?;
    let inputfile = resolve_input_path(&args.inputfile)?;
    let descriptors = read_input_file(&inputfile)?;

    let mut mlfq = Mlfq::new(levels)?;
    for desc in descriptors {
        mlfq.submit(desc)?;
    }

    let quiet = args.quiet;
    mlfq.run_with(|interval| {
        if !quiet {
            println!("{}", interval);
        }
    });

    let outputfile = args
        .outputfile
        .map(PathBuf::from)
        .unwrap_or_else(|| default_output_path(&inputfile));
    write_report(&outputfile, &mlfq)?;
    println!("Output written to: {}", outputfile.display());

    Ok(())
}

fn main() -> Result<()> {
    let args = parse_args();
    init_logging(args.verbosity);
    actual_main_fn(args)
}
