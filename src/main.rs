use std::{
    env,
    io::{self, Write},
    process::ExitCode,
};

use allocate::{
    Policy, ProcessController, SchedEvent, Scheduler, Sim, SimConfig,
    scheduler::{RoundRobinScheduler, SjfScheduler},
    sim::{Job, load_jobs},
};
use anyhow::{Context, Result};
use env_logger::Builder;

const USAGE: &str = "\
usage: allocate -f <file> [-s SJF|RR] [-m infinite|best-fit] [-q <quantum>]
                [-w <worker>] [-c <config.toml>]";

fn main() -> ExitCode {
    Builder::from_default_env().init();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.iter().any(|arg| arg == "-h" || arg == "--help") {
        println!("{USAGE}");
        return ExitCode::SUCCESS;
    }

    match try_main(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("allocate: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn try_main(args: &[String]) -> Result<()> {
    let config = SimConfig::from_args(args).context("invalid arguments")?;
    let input = config
        .input
        .as_deref()
        .with_context(|| format!("no workload file given\n{USAGE}"))?;
    let jobs = load_jobs(input)?;

    match config.policy {
        Policy::ShortestJobFirst => run::<SjfScheduler>(jobs, &config),
        Policy::RoundRobin => run::<RoundRobinScheduler>(jobs, &config),
    }
}

fn run<S: Scheduler>(jobs: Vec<Job>, config: &SimConfig) -> Result<()> {
    let control = ProcessController::new(config.worker.clone());
    let mut sim = Sim::<S, _>::new(jobs, config.quantum, config.memory, control)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut write_err = None;
    let report = sim.run(|event| {
        // Addresses are only meaningful when memory is bounded
        if let SchedEvent::Ready {
            assigned_at: None, ..
        } = event
        {
            return;
        }
        if write_err.is_none() {
            write_err = writeln!(out, "{event}").err();
        }
    })?;
    if let Some(err) = write_err {
        return Err(err).context("failed to write events");
    }
    writeln!(out, "{report}").context("failed to write report")?;
    Ok(())
}
