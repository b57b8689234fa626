//! bgsplit CLI entry point

fn main() -> anyhow::Result<()> {
    bgsplit::cli::run_cli()
}
