use anyhow::{Context, Result};
use clap::Parser;
use hybrid_matvec::report::{banner, RunSummary};
use hybrid_matvec::{Coordinator, RunConfig};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn print_summary(summary: &RunSummary) {
    println!("✓ Computation finished!");
    println!();
    println!("{}", summary);
}

#[cfg(not(feature = "mpi"))]
fn run() -> Result<()> {
    use hybrid_matvec::LocalCluster;

    let config = RunConfig::parse();
    config.validate()?;

    println!(
        "{}\n",
        banner(config.dimensions(), config.ranks, config.thread_count())
    );

    let ranks = config.ranks;
    let coordinator = Coordinator::new(config);
    let outputs = LocalCluster::run(ranks, |comm| coordinator.run(comm))?;

    for (rank, output) in outputs.into_iter().enumerate() {
        if let Some(summary) = output.with_context(|| format!("rank {} failed", rank))? {
            print_summary(&summary);
        }
    }
    Ok(())
}

#[cfg(feature = "mpi")]
fn run() -> Result<()> {
    use hybrid_matvec::mpi_backend::MpiCollective;
    use mpi::traits::*;

    let (universe, _threading) = mpi::initialize_with_threading(mpi::Threading::Funneled)
        .context("Failed to initialize MPI")?;
    let world = universe.world();
    let rank = world.rank();

    // Every rank sees the same command line, so every rank rejects a bad one
    // before the first collective.
    let config = RunConfig::parse();
    config.validate()?;
    if config.ranks != 1 {
        log::warn!("--ranks is ignored under MPI; the launcher sets the rank count");
    }

    if rank == 0 {
        println!(
            "{}\n",
            banner(config.dimensions(), world.size() as usize, config.thread_count())
        );
    }

    let coordinator = Coordinator::new(config);
    let summary = coordinator
        .run(MpiCollective::new(world))
        .with_context(|| format!("rank {} failed", rank))?;
    if let Some(summary) = summary {
        print_summary(&summary);
    }
    Ok(())
}
