use std::io;
use std::time::Duration;

use tokio::process::{Child, Command};

const TERMINATE_GRACE: Duration = Duration::from_secs(2);

#[cfg(unix)]
pub(super) fn apply_process_group(cmd: &mut Command) {
    unsafe {
        cmd.pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

#[cfg(not(unix))]
pub(super) fn apply_process_group(_cmd: &mut Command) {}

#[cfg(unix)]
fn signal_group(pgid: Option<u32>, signal: i32) {
    if let Some(pgid) = pgid {
        unsafe {
            libc::kill(-(pgid as i32), signal);
        }
    }
}

#[cfg(not(unix))]
fn signal_group(_pgid: Option<u32>, _signal: i32) {}

#[cfg(unix)]
const SIGINT: i32 = libc::SIGINT;
#[cfg(unix)]
const SIGKILL: i32 = libc::SIGKILL;
#[cfg(not(unix))]
const SIGINT: i32 = 2;
#[cfg(not(unix))]
const SIGKILL: i32 = 9;

/// Kills whatever is left of the process group once the child itself has been reaped.
pub(super) fn kill_group(pgid: Option<u32>) {
    signal_group(pgid, SIGKILL);
}

/// Interrupts the whole process group, escalates to SIGKILL after a grace period and reaps the
/// child. `pgid` is captured at spawn time because a reaped child no longer reports its id.
pub(super) async fn terminate_child(child: &mut Child, pgid: Option<u32>) {
    signal_group(pgid, SIGINT);
    if tokio::time::timeout(TERMINATE_GRACE, child.wait())
        .await
        .is_ok()
    {
        signal_group(pgid, SIGKILL);
        return;
    }
    signal_group(pgid, SIGKILL);
    let _ = child.kill().await;
    let _ = tokio::time::timeout(TERMINATE_GRACE, child.wait()).await;
}
