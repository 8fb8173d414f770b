use anyhow::Result;
use clap::Parser;
use std::io::{Read, Write};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Network description file, or pass "-" to read from stdin
    #[clap(value_parser)]
    network: clio::Input,

    /// Simulation configuration file
    #[clap(value_parser)]
    config: clio::Input,

    /// Output path for the generated kernel source
    #[clap(value_parser)]
    source: clio::OutputPath,

    /// Output path for the generated constants header
    #[clap(value_parser)]
    header: clio::OutputPath,
}

fn main() -> Result<()> {
    // usage errors exit with status 1, like compile errors; --help and
    // --version still exit 0
    let mut args = Cli::try_parse().unwrap_or_else(|err| {
        let _ = err.print();
        std::process::exit(if err.use_stderr() { 1 } else { 0 });
    });

    let network_name = args.network.to_string();
    let mut network = String::new();
    args.network.read_to_string(&mut network)?;

    let config_name = args.config.to_string();
    let mut config = String::new();
    args.config.read_to_string(&mut config)?;

    let artifacts = boolnetc::Context::new()
        .network(&network_name, &network)?
        .config(&config_name, &config)?
        .compile()?;

    // the output files exist only after the whole compile has succeeded
    args.source.create()?.write_all(artifacts.source.as_bytes())?;
    args.header.create()?.write_all(artifacts.header.as_bytes())?;

    Ok(())
}
