use std::fs;
use std::io;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use descgen::topology::{self, Topology};
use descgen::Artifacts;

const USAGE: &str = "\
usage: descgen [--config <topology.toml>] [--out-dir <dir>] [-v|--verbose] [-q|--quiet] [--print-table]";

fn main() -> Result<()> {
    let mut args = pico_args::Arguments::from_env();
    if args.contains(["-h", "--help"]) {
        println!("{}", USAGE);
        return Ok(());
    }
    let verbose = args.contains(["-v", "--verbose"]);
    let quiet = args.contains(["-q", "--quiet"]);
    let print_table = args.contains("--print-table");
    let config_path: Option<PathBuf> = args.opt_value_from_str("--config")?;
    let out_dir: PathBuf = args
        .opt_value_from_str("--out-dir")?
        .unwrap_or_else(|| PathBuf::from("."));

    let remaining = args.finish();
    if !remaining.is_empty() {
        bail!("unexpected arguments: {:?}\n{}", remaining, USAGE);
    }

    let level = match (verbose, quiet) {
        (true, _) => log::LevelFilter::Debug,
        (false, true) => log::LevelFilter::Warn,
        (false, false) => log::LevelFilter::Info,
    };
    common::setup_logging("descgen", level);

    log::info!("USB 3.0 / USB 2.0 descriptor export tool");

    let topology = match config_path {
        Some(path) => {
            let data = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Topology::from_toml(&data)
                .with_context(|| format!("failed to parse {}", path.display()))?
        }
        None => Topology::default(),
    };

    log::info!("generating into {}", out_dir.display());
    let artifacts = Artifacts::create(&out_dir)?;
    let finished = topology::compile(&topology, artifacts).context("failed to compile descriptors")?;

    if print_table {
        finished
            .table
            .export(&mut io::stdout().lock(), finished.summary.bitwidths)?;
    }

    log::info!("finished");
    Ok(())
}
