use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use unires::archive::{self, LoadOptions, RunFile};
use unires::v3::{InjectionSelector, Res3File};

#[derive(Parser)]
#[command(name = "unires", about = "Chromatography result file decoder", version)]
struct Cli {
    /// Log debug output (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct LoadArgs {
    /// Keep every Nth curve sample
    #[arg(short, long, default_value = "1")]
    reduce: usize,
    /// Injection point used as volume baseline (default: last)
    #[arg(short, long)]
    injection: Option<usize>,
}

impl LoadArgs {
    fn options(&self) -> LoadOptions {
        LoadOptions {
            reduce:    self.reduce,
            injection: self.injection.map_or(InjectionSelector::Last, InjectionSelector::Index),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a file can be decoded
    Check {
        input: PathBuf,
    },
    /// Print the header table of a .res file
    Header {
        input: PathBuf,
        /// Leave out the magic ids
        #[arg(short, long)]
        short: bool,
    },
    /// Print the injection points of a .res file
    Injections {
        input: PathBuf,
    },
    /// Print the operator name stored in a .res file
    User {
        input: PathBuf,
    },
    /// Decode a file and list its entries
    List {
        input: PathBuf,
        #[command(flatten)]
        load: LoadArgs,
    },
    /// Decode a file and write it as JSON
    Dump {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Single-line JSON
        #[arg(long)]
        compact: bool,
        #[command(flatten)]
        load: LoadArgs,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {

        // ── Check ────────────────────────────────────────────────────────────
        Commands::Check { input } => {
            let validation = archive::validate(&input)?;
            println!("{}", input.display());
            println!("{validation}");
            if !validation.is_supported() {
                std::process::exit(1);
            }
        }

        // ── Header ───────────────────────────────────────────────────────────
        Commands::Header { input, short } => {
            let mut run = Res3File::open(&input)?;
            print!("{}", run.show_header(!short)?);
        }

        // ── Injections ───────────────────────────────────────────────────────
        Commands::Injections { input } => {
            let mut run = Res3File::open(&input)?;
            println!("{}", run.show_injection_points()?);
        }

        // ── User ─────────────────────────────────────────────────────────────
        Commands::User { input } => {
            let run = Res3File::open(&input)?;
            println!("{}", run.get_user());
        }

        // ── List ─────────────────────────────────────────────────────────────
        Commands::List { input, load } => {
            let run = archive::load(&input, &load.options())?;
            println!("{} [{}]", input.display(), run.format());
            match &run {
                RunFile::Res3(r) => {
                    println!("{:<32} {:<11} {:>9}  Unit", "Name", "Kind", "Samples");
                    for (name, record) in r.records().iter() {
                        let unit = match &record.block {
                            unires::DataBlock::Curve { unit, .. } => unit.as_str(),
                            _ => "",
                        };
                        println!("{:<32} {:<11} {:>9}  {}", name, record.block.kind_name(), record.block.len(), unit);
                    }
                }
                RunFile::Uni6(u) => {
                    if let Some(date) = u.created() {
                        println!("Created {date}");
                    }
                    for group in u.groups() {
                        println!("{} (chromatogram {})", group.name, group.chrom_id.as_deref().unwrap_or("?"));
                        for entry in group.entries.values() {
                            println!("  {}", entry.name());
                        }
                    }
                    for (name, entry) in u.entries().iter() {
                        if entry.as_chromatogram().is_none() {
                            println!("{name} [{}]", entry.kind_name());
                        }
                    }
                }
            }
            print_report(&run);
        }

        // ── Dump ─────────────────────────────────────────────────────────────
        Commands::Dump { input, output, compact, load } => {
            let run = archive::load(&input, &load.options())?;
            let json = run.to_json(!compact)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    println!("Written: {}", path.display());
                }
                None => println!("{json}"),
            }
            print_report(&run);
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn print_report(run: &RunFile) {
    let report = run.report();
    if report.is_clean() {
        return;
    }
    eprintln!("{}", report.summary());
    for issue in &report.issues {
        eprintln!("  {issue}");
    }
}
