//! Worker spawned by `allocate` for every resident workload.
//!
//! Reads 4-byte big-endian times from stdin. The first one is acknowledged
//! straight away; each later one is paired with a signal that says what to do
//! with it. The final output is the hex SHA-256 of the worker's name followed
//! by every time it was sent.

use std::{
    env,
    io::{self, ErrorKind, Read, Write},
    process::ExitCode,
};

use allocate::core::process::{ack_byte, decode_tick};
use anyhow::{Context, Result, bail};
use env_logger::Builder;
use log::{debug, warn};
use nix::sys::signal::{self, SigSet, Signal};
use sha2::{Digest, Sha256};

fn main() -> ExitCode {
    Builder::from_default_env().init();

    match try_main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("process: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn try_main() -> Result<()> {
    let Some(name) = env::args().nth(1) else {
        bail!("usage: process P<name>");
    };

    // Blocked so they queue up for `wait` instead of running default actions
    let mut mask = SigSet::empty();
    mask.add(Signal::SIGCONT);
    mask.add(Signal::SIGTSTP);
    mask.add(Signal::SIGTERM);
    mask.thread_block().context("failed to block signals")?;

    let mut worker = Worker {
        name,
        stdin: io::stdin().lock(),
        stdout: io::stdout().lock(),
        digest: Sha256::new(),
    };
    worker.digest.update(worker.name.as_bytes());

    let Some(now) = worker.next_tick()? else {
        return Ok(());
    };
    worker.ack(now)?;

    while let Some(now) = worker.next_tick()? {
        match mask.wait().context("failed to wait for a signal")? {
            Signal::SIGCONT => worker.ack(now)?,
            Signal::SIGTSTP => {
                debug!("{} stopping at t={now}", worker.name);
                signal::raise(Signal::SIGSTOP).context("failed to stop")?;
            }
            Signal::SIGTERM => return worker.finish(),
            other => warn!("{} ignoring {other:?}", worker.name),
        }
    }
    Ok(())
}

struct Worker<R, W> {
    name: String,
    stdin: R,
    stdout: W,
    digest: Sha256,
}

impl<R: Read, W: Write> Worker<R, W> {
    /// `None` once the parent has closed the pipe.
    fn next_tick(&mut self) -> Result<Option<u32>> {
        let mut bytes = [0; 4];
        match self.stdin.read_exact(&mut bytes) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => {
                debug!("{} lost its parent", self.name);
                return Ok(None);
            }
            Err(err) => return Err(err).context("failed to read time"),
        }
        self.digest.update(bytes);
        Ok(Some(decode_tick(bytes)))
    }

    fn ack(&mut self, now: u32) -> Result<()> {
        self.stdout
            .write_all(&[ack_byte(u64::from(now))])
            .and_then(|()| self.stdout.flush())
            .context("failed to acknowledge")
    }

    fn finish(mut self) -> Result<()> {
        let output = hex::encode(self.digest.finalize());
        self.stdout
            .write_all(output.as_bytes())
            .and_then(|()| self.stdout.flush())
            .context("failed to write output")
    }
}
