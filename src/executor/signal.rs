//! Process-group termination
//!
//! Every suite runs in its own process group so that a timeout takes out the
//! framework together with the workers it forked. Termination is two-phase:
//! a graceful signal to the group, then a forceful one if anything in the
//! group outlives the grace period.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;
use tracing::{debug, warn};

/// How far escalation went before the process group was gone
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KillPhase {
    /// The group exited after the graceful signal
    Graceful,
    /// The group had to be killed forcefully
    Forceful,
}

/// Place the command in a fresh process group led by the child
pub fn set_process_group(cmd: &mut tokio::process::Command) {
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.as_std_mut().process_group(0);
    }
    #[cfg(not(unix))]
    let _ = cmd;
}

/// Terminate a timed-out child and reap it.
///
/// The forceful signal is only sent while the group still exists, so a
/// reaped group id is never signalled.
pub async fn terminate(child: &mut Child, grace: Duration) -> (io::Result<ExitStatus>, KillPhase) {
    let pgid = child.id();

    debug!("Sending graceful termination to process group {:?}", pgid);
    send_graceful(child, pgid);

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => {
            // Leader is gone; stragglers in the group still get the forceful signal.
            if group_alive(pgid) {
                warn!("Process group {:?} outlived its leader, killing", pgid);
                send_forceful(child, pgid);
                (status, KillPhase::Forceful)
            } else {
                (status, KillPhase::Graceful)
            }
        }
        Err(_) => {
            warn!(
                "Process group {:?} still alive after {}ms grace period, killing",
                pgid,
                grace.as_millis()
            );
            send_forceful(child, pgid);
            (child.wait().await, KillPhase::Forceful)
        }
    }
}

#[cfg(unix)]
fn send_graceful(_child: &mut Child, pgid: Option<u32>) {
    if let Some(pgid) = pgid {
        // Delivery failures (group already gone) are ignored.
        unsafe { libc::kill(-(pgid as libc::pid_t), libc::SIGTERM) };
    }
}

#[cfg(not(unix))]
fn send_graceful(child: &mut Child, _pgid: Option<u32>) {
    let _ = child.start_kill();
}

#[cfg(unix)]
fn send_forceful(child: &mut Child, pgid: Option<u32>) {
    if let Some(pgid) = pgid {
        unsafe { libc::kill(-(pgid as libc::pid_t), libc::SIGKILL) };
    }
    let _ = child.start_kill();
}

#[cfg(not(unix))]
fn send_forceful(child: &mut Child, _pgid: Option<u32>) {
    let _ = child.start_kill();
}

#[cfg(unix)]
fn group_alive(pgid: Option<u32>) -> bool {
    match pgid {
        Some(pgid) => unsafe { libc::kill(-(pgid as libc::pid_t), 0) == 0 },
        None => false,
    }
}

#[cfg(not(unix))]
fn group_alive(_pgid: Option<u32>) -> bool {
    false
}
