#![warn(clippy::all, rust_2018_idioms)]

fn main() -> anyhow::Result<()> {
    use clap::Parser;
    let args = aquaserv_cli::cli::Cli::parse();

    if let Err(e) = aquaserv_cli::tracing::init(&args) {
        eprintln!("Failed to start tracing: {e}");
    }

    let rt = aquaserv_cli::create_runtime()?;
    rt.block_on(aquaserv_cli::run(args))
}
