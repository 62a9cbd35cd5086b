use std::{
    fs,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};

use allocate::core::{
    ProcessControl, ProcessController, ProcessState, SchedCtx, WorkloadId,
    process::{ProcessError, encode_tick},
};
use nix::{
    errno::Errno,
    sys::signal::{self, Signal},
};
use sha2::{Digest, Sha256};

fn controller() -> ProcessController {
    ProcessController::new(env!("CARGO_BIN_EXE_process"))
}

/// Writes an executable `sh` script standing in for the worker.
fn shell_worker(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("worker.sh");
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn workloads(names: &[u32]) -> Vec<WorkloadId> {
    let mut ctx = SchedCtx::new(1, None);
    names
        .iter()
        .map(|&name| ctx.create_workload(name, 0, 1, 1))
        .collect()
}

fn expected_output(name: u32, ticks: &[u64]) -> String {
    let mut digest = Sha256::new();
    digest.update(format!("P{name}"));
    for &t in ticks {
        digest.update(encode_tick(t).unwrap());
    }
    hex::encode(digest.finalize())
}

#[test]
fn full_lifecycle() {
    let mut control = controller();
    let id = workloads(&[1])[0];

    control.dispatch(id, 1, 0).unwrap();
    assert_eq!(control.state(id), ProcessState::Running);
    assert_eq!(control.resident(), 1);

    control.preempt(id, 2).unwrap();
    assert_eq!(control.state(id), ProcessState::Stopped);

    control.resume(id, 4).unwrap();
    assert_eq!(control.state(id), ProcessState::Running);

    let output = control.terminate(id, 6).unwrap();
    assert_eq!(output.to_string(), expected_output(1, &[0, 2, 4, 6]));
    assert_eq!(control.resident(), 0);
    assert_eq!(control.state(id), ProcessState::NotStarted);
}

#[test]
fn resume_while_running_is_acknowledged() {
    let mut control = controller();
    let id = workloads(&[7])[0];

    control.dispatch(id, 7, 0).unwrap();
    control.resume(id, 300).unwrap();
    let output = control.terminate(id, 301).unwrap();
    assert_eq!(output.to_string(), expected_output(7, &[0, 300, 301]));
}

#[test]
fn terminate_stopped_worker() {
    let mut control = controller();
    let id = workloads(&[2])[0];

    control.dispatch(id, 2, 0).unwrap();
    control.preempt(id, 1).unwrap();
    let output = control.terminate(id, 3).unwrap();

    // Resumed first, so the final time arrives twice
    assert_eq!(output.to_string(), expected_output(2, &[0, 1, 3, 3]));
    assert_eq!(output.as_bytes().len(), 64);
}

#[test]
fn workers_are_independent() {
    let mut control = controller();
    let ids = workloads(&[1, 2, 3]);

    for (name, &id) in [1, 2, 3].into_iter().zip(&ids) {
        control.dispatch(id, name, 0).unwrap();
        control.preempt(id, 1).unwrap();
    }
    assert_eq!(control.resident(), 3);

    let outputs: Vec<_> = [1, 2, 3]
        .into_iter()
        .zip(&ids)
        .rev()
        .map(|(name, &id)| (name, control.terminate(id, 5).unwrap()))
        .collect();
    for (name, output) in outputs {
        assert_eq!(output.to_string(), expected_output(name, &[0, 1, 5, 5]));
    }
}

#[test]
fn transitions_need_a_resident_worker() {
    let mut control = controller();
    let id = workloads(&[1])[0];

    assert!(matches!(
        control.resume(id, 1),
        Err(ProcessError::NotResident(_))
    ));
    assert!(matches!(
        control.terminate(id, 1),
        Err(ProcessError::NotResident(_))
    ));

    control.dispatch(id, 1, 0).unwrap();
    assert!(matches!(
        control.dispatch(id, 1, 0),
        Err(ProcessError::AlreadyDispatched { name: 1 })
    ));
    control.terminate(id, 1).unwrap();
}

#[test]
fn dropping_the_controller_reaps_workers() {
    let mut control = controller();
    let id = workloads(&[1])[0];

    control.dispatch(id, 1, 0).unwrap();
    control.preempt(id, 1).unwrap();
    let pid = control.pid(id).unwrap();
    drop(control);

    assert_eq!(signal::kill(pid, None::<Signal>), Err(Errno::ESRCH));
}

#[test]
fn wrong_ack_is_tolerated_and_worker_reaped() {
    let dir = tempfile::tempdir().unwrap();
    let program = shell_worker(dir.path(), "head -c 4 >/dev/null; printf Z; exec sleep 100");
    let mut control = ProcessController::new(program);
    let id = workloads(&[1])[0];

    control.dispatch(id, 1, 0).unwrap();
    let pid = control.pid(id).unwrap();

    // Killed by SIGTERM without writing anything
    let output = control.terminate(id, 1).unwrap();
    assert_eq!(output.to_string(), "");
    assert_eq!(output.as_bytes(), &[0; 64]);
    assert_eq!(signal::kill(pid, None::<Signal>), Err(Errno::ESRCH));
}

#[test]
fn terminate_after_worker_exited() {
    let dir = tempfile::tempdir().unwrap();
    let program = shell_worker(dir.path(), "head -c 4 >/dev/null; printf Z; exit 0");
    let mut control = ProcessController::new(program);
    let id = workloads(&[1])[0];

    control.dispatch(id, 1, 0).unwrap();
    let pid = control.pid(id).unwrap();

    let output = control.terminate(id, 1).unwrap();
    assert_eq!(output.as_bytes(), &[0; 64]);
    assert_eq!(control.resident(), 0);
    assert_eq!(signal::kill(pid, None::<Signal>), Err(Errno::ESRCH));
}

#[test]
fn short_output_is_zero_padded() {
    let dir = tempfile::tempdir().unwrap();
    let program = shell_worker(
        dir.path(),
        "trap '' TERM; head -c 4 >/dev/null; printf Z; head -c 4 >/dev/null; printf done",
    );
    let mut control = ProcessController::new(program);
    let id = workloads(&[1])[0];

    control.dispatch(id, 1, 0).unwrap();
    let output = control.terminate(id, 1).unwrap();
    assert_eq!(output.to_string(), "done");
    assert_eq!(&output.as_bytes()[..4], b"done");
    assert!(output.as_bytes()[4..].iter().all(|&b| b == 0));
}

#[test]
fn worker_exiting_instead_of_stopping() {
    let dir = tempfile::tempdir().unwrap();
    let program = shell_worker(
        dir.path(),
        "trap '' TSTP; head -c 4 >/dev/null; printf Z; head -c 4 >/dev/null; exit 0",
    );
    let mut control = ProcessController::new(program);
    let id = workloads(&[1])[0];

    control.dispatch(id, 1, 0).unwrap();
    assert!(matches!(
        control.preempt(id, 1),
        Err(ProcessError::ExitedEarly { name: 1 })
    ));
    // Already reaped by the wait, so dropping must not signal the pid again
    assert_eq!(control.state(id), ProcessState::Terminated);
}

#[test]
fn preempt_needs_a_running_worker() {
    let mut control = controller();
    let id = workloads(&[1])[0];

    control.dispatch(id, 1, 0).unwrap();
    control.preempt(id, 1).unwrap();
    assert!(matches!(
        control.preempt(id, 2),
        Err(ProcessError::InvalidTransition {
            transition: "preempt",
            state: ProcessState::Stopped,
            ..
        })
    ));

    control.resume(id, 3).unwrap();
    let output = control.terminate(id, 4).unwrap();
    assert_eq!(output.to_string(), expected_output(1, &[0, 1, 3, 4]));
}
