use std::path::PathBuf;

use clap::Parser;

use perfprobe::emit::OverwritePolicy;
use perfprobe_scenarios::{find, Config, REGISTRY};

/// Run one measurement scenario and write its record stream.
#[derive(Parser)]
#[command(verbatim_doc_comment)]
struct Args {
    /// Scenario name; see --list.
    scenario: Option<String>,

    /// List available scenarios.
    #[arg(long)]
    list: bool,

    /// Directory the record file is written to.
    #[arg(long, default_value = "data")]
    out_dir: PathBuf,

    /// Fail instead of replacing an existing record file.
    #[arg(long)]
    keep_existing: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.list {
        for scenario in REGISTRY {
            println!("{:<22} {}", scenario.name, scenario.summary);
        }
        return;
    }

    let Some(name) = args.scenario.as_deref() else {
        eprintln!("no scenario named; try --list");
        std::process::exit(2);
    };
    let Some(scenario) = find(name) else {
        eprintln!("unknown scenario {name:?}; try --list");
        std::process::exit(2);
    };

    if let Err(e) = perfprobe::install_interrupt_handler() {
        eprintln!("cannot install signal handler: {e}");
        std::process::exit(1);
    }

    let cfg = Config {
        out_dir: args.out_dir,
        policy: if args.keep_existing {
            OverwritePolicy::Preserve
        } else {
            OverwritePolicy::Replace
        },
    };

    println!("[*] running {}", scenario.name);
    match (scenario.run)(&cfg) {
        Ok(()) => {
            // A scenario that skipped conditions on capability denial
            // still exits 0; only unrecoverable setup failures land here
            // as errors.
            println!("[*] {} done", scenario.name);
        }
        Err(e) => {
            log::error!("{}: {e:#}", scenario.name);
            std::process::exit(1);
        }
    }
}
