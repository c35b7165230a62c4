//! Real-time setup for the control thread (Linux SCHED_FIFO / affinity / mlockall).

use crate::cli::{RtArgs, RtLock};

#[cfg(all(feature = "rt", target_os = "linux"))]
pub fn setup_rt_once(args: RtArgs) {
    use std::sync::OnceLock;
    static RT_ONCE: OnceLock<()> = OnceLock::new();

    if !args.rt {
        return;
    }
    RT_ONCE.get_or_init(|| {
        let lock = args.rt_lock.unwrap_or_else(RtLock::os_default);
        match linux::lock_memory(lock) {
            Ok(()) => tracing::info!(?lock, "rt: memory locked"),
            Err(e) => tracing::warn!(error = %e, "rt: mlockall failed"),
        }
        match linux::fifo_priority(args.rt_prio) {
            Ok(prio) => tracing::info!(prio, "rt: SCHED_FIFO applied"),
            Err(e) => tracing::warn!(error = %e, "rt: sched_setscheduler failed"),
        }
        let cpu = args.rt_cpu.unwrap_or(0);
        match linux::pin_to_cpu(cpu) {
            Ok(()) => tracing::info!(cpu, "rt: affinity applied"),
            Err(e) => tracing::warn!(error = %e, "rt: affinity not applied"),
        }
    });
}

#[cfg(not(all(feature = "rt", target_os = "linux")))]
pub fn setup_rt_once(args: RtArgs) {
    if args.rt {
        let _ = (args.rt_prio, args.rt_cpu, args.rt_lock.unwrap_or_else(RtLock::os_default));
        tracing::warn!("real-time mode needs the `rt` feature on Linux; running without it");
    }
}

#[cfg(all(feature = "rt", target_os = "linux"))]
mod linux {
    use crate::cli::RtLock;
    use std::io;

    const MAX_CPUSET_BITS: usize = std::mem::size_of::<libc::cpu_set_t>() * 8;

    fn check(rc: libc::c_int) -> io::Result<()> {
        if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    fn memlock_hint() -> Option<String> {
        let mut rlim = std::mem::MaybeUninit::<libc::rlimit>::uninit();
        // SAFETY: getrlimit writes a full rlimit on success.
        let rc = unsafe { libc::getrlimit(libc::RLIMIT_MEMLOCK, rlim.as_mut_ptr()) };
        if rc != 0 {
            return None;
        }
        // SAFETY: rc == 0 above.
        let r = unsafe { rlim.assume_init() };
        Some(if r.rlim_cur == libc::RLIM_INFINITY {
            "memlock limit: unlimited".to_string()
        } else {
            format!("memlock limit: {} KiB", r.rlim_cur / 1024)
        })
    }

    /// `All` falls back to `Current` when the kernel refuses future pages.
    pub fn lock_memory(lock: RtLock) -> eyre::Result<()> {
        let flags = match lock {
            RtLock::None => return Ok(()),
            RtLock::Current => libc::MCL_CURRENT,
            RtLock::All => libc::MCL_CURRENT | libc::MCL_FUTURE,
        };
        // SAFETY: mlockall takes plain flags.
        let Err(err) = check(unsafe { libc::mlockall(flags) }) else {
            return Ok(());
        };
        let retryable = matches!(err.raw_os_error(), Some(libc::EPERM | libc::ENOMEM));
        if lock == RtLock::All && retryable {
            // SAFETY: as above.
            if check(unsafe { libc::mlockall(libc::MCL_CURRENT) }).is_ok() {
                tracing::warn!("rt: locked current pages only");
                return Ok(());
            }
        }
        let mut msg = format!("mlockall: {err}");
        if retryable {
            if let Some(h) = memlock_hint() {
                msg.push_str(&format!("; {h}"));
            }
            msg.push_str("; needs CAP_IPC_LOCK (or root) and a sufficient 'ulimit -l'");
        }
        Err(eyre::eyre!(msg))
    }

    /// Returns the priority actually applied, clamped to the system range.
    pub fn fifo_priority(prio: Option<i32>) -> eyre::Result<i32> {
        // SAFETY: pure queries.
        let (min, max) = unsafe {
            (
                libc::sched_get_priority_min(libc::SCHED_FIFO),
                libc::sched_get_priority_max(libc::SCHED_FIFO),
            )
        };
        let (min, max) = if min < 0 || max < 0 { (1, 99) } else { (min, max) };
        let value = prio.unwrap_or(max).clamp(min, max);
        let param = libc::sched_param {
            sched_priority: value,
        };
        // SAFETY: param outlives the call.
        check(unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) }).map_err(|e| {
            eyre::eyre!("{e}; needs CAP_SYS_NICE or root (try 'sudo setcap cap_sys_nice=ep <rover>')")
        })?;
        Ok(value)
    }

    pub fn pin_to_cpu(cpu: usize) -> eyre::Result<()> {
        if cpu >= MAX_CPUSET_BITS {
            eyre::bail!("CPU {cpu} exceeds cpu_set_t capacity {MAX_CPUSET_BITS}");
        }
        // SAFETY: cpu_set_t is plain data; zeroed is a valid empty set.
        let mut allowed: libc::cpu_set_t = unsafe { std::mem::zeroed() };
        let size = std::mem::size_of::<libc::cpu_set_t>();
        // SAFETY: allowed is a valid cpu_set_t of `size` bytes.
        check(unsafe { libc::sched_getaffinity(0, size, &mut allowed) })?;
        // SAFETY: cpu < MAX_CPUSET_BITS.
        if !unsafe { libc::CPU_ISSET(cpu, &allowed) } {
            eyre::bail!("CPU {cpu} not permitted by current affinity mask");
        }
        // SAFETY: as above.
        let mut desired: libc::cpu_set_t = unsafe { std::mem::zeroed() };
        unsafe {
            libc::CPU_ZERO(&mut desired);
            libc::CPU_SET(cpu, &mut desired);
        }
        check(unsafe { libc::sched_setaffinity(0, size, &desired) })?;
        Ok(())
    }
}
