//! Real-time scheduling helpers (Linux SCHED_FIFO + mlockall).
//!
//! Best effort: failures downgrade to warnings, the controller still runs.

#[cfg(target_os = "linux")]
pub fn setup_rt_once(rt: bool) {
    use libc::{MCL_CURRENT, MCL_FUTURE, SCHED_FIFO, mlockall, sched_param, sched_setscheduler};
    use std::sync::OnceLock;
    static RT_ONCE: OnceLock<()> = OnceLock::new();

    if !rt {
        return;
    }
    RT_ONCE.get_or_init(|| {
        // Lock current and future pages so the tick path never faults.
        let rc = unsafe { mlockall(MCL_CURRENT | MCL_FUTURE) };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            tracing::warn!(error = %err, "mlockall failed; continuing without memory locking");
        } else {
            tracing::info!("memory locked (MCL_CURRENT | MCL_FUTURE)");
        }

        let param = sched_param { sched_priority: 10 };
        let rc = unsafe { sched_setscheduler(0, SCHED_FIFO, &param) };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            tracing::warn!(error = %err, "SCHED_FIFO unavailable; running with default scheduler");
        } else {
            tracing::info!(priority = 10, "SCHED_FIFO enabled");
        }
    });
}

#[cfg(not(target_os = "linux"))]
pub fn setup_rt_once(rt: bool) {
    if rt {
        tracing::warn!("--rt is only supported on Linux; ignoring");
    }
}
