//! Process-group signalling for the process executor.
//!
//! Children are spawned as leaders of their own group, so the group id equals
//! the leader's pid and `kill(-pgid, sig)` reaches every descendant that has
//! not deliberately moved to another group.

use std::time::Duration;
use tokio::process::Child;

/// Sends `signal` to every member of the group led by `pgid`.
///
/// Returns `false` when the group no longer has any members.
#[cfg(unix)]
pub fn signal_group(pgid: u32, signal: libc::c_int) -> bool {
    let Ok(pgid) = libc::pid_t::try_from(pgid) else {
        return false;
    };
    if pgid <= 0 {
        return false;
    }
    let rc = unsafe { libc::kill(-pgid, signal) };
    if rc == -1 {
        let errno = std::io::Error::last_os_error();
        if errno.raw_os_error() != Some(libc::ESRCH) {
            log::error!("Signal {} to process group {} failed: {}", signal, pgid, errno);
        }
        return false;
    }
    true
}

/// SIGKILLs whatever is left in a group whose leader has already exited.
pub fn sweep_group(pgid: u32) {
    #[cfg(unix)]
    {
        if signal_group(pgid, libc::SIGKILL) {
            log::debug!("Killed leftover members of process group {}", pgid);
        }
    }
    #[cfg(not(unix))]
    {
        let _ = pgid;
    }
}

/// Terminates a running child and its whole group: SIGTERM to the group,
/// up to `grace` for the leader to exit, then SIGKILL to the group. The
/// leader is reaped before returning.
pub async fn terminate_group(child: &mut Child, grace: Duration) {
    let Some(pid) = child.id() else {
        // Already reaped
        return;
    };

    #[cfg(unix)]
    {
        if signal_group(pid, libc::SIGTERM) {
            match tokio::time::timeout(grace, child.wait()).await {
                Ok(Ok(status)) => log::debug!("Process {} exited after SIGTERM: {}", pid, status),
                Ok(Err(e)) => log::error!("Wait error after SIGTERM for process {}: {}", pid, e),
                Err(_) => log::warn!(
                    "Process {} didn't respond to SIGTERM within {:?}, sending SIGKILL",
                    pid,
                    grace
                ),
            }
        }
        // Descendants may ignore SIGTERM even when the leader honours it
        signal_group(pid, libc::SIGKILL);
    }

    let _ = child.start_kill();
    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => log::error!("Failed to reap process {}: {}", pid, e),
        Err(_) => log::error!("Process {} still not reaped {:?} after SIGKILL", pid, grace),
    }
}
