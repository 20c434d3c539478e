//! 线程亲和性
//!
//! 将调用线程绑定到指定的逻辑 CPU。绑定失败会作为错误返回，
//! 由调用方决定是否中止（基准测试中一律视为致命错误）。

use thiserror::Error;

/// 亲和性错误
#[derive(Debug, Error)]
pub enum AffinityError {
    #[error("CPU {cpu} is outside the affinity mask range (max {max})")]
    CpuOutOfRange { cpu: usize, max: usize },

    #[error("failed to pin thread to CPU {cpu}: {source}")]
    Os {
        cpu: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("thread affinity is not supported on {0}")]
    Unsupported(&'static str),
}

/// 亲和性掩码可表示的最大 CPU 数
#[cfg(target_os = "linux")]
pub const MAX_CPUS: usize = libc::CPU_SETSIZE as usize;

#[cfg(not(target_os = "linux"))]
pub const MAX_CPUS: usize = 0;

/// 设置当前线程到指定 CPU
#[cfg(target_os = "linux")]
pub fn pin_current_thread_to(cpu: usize) -> Result<(), AffinityError> {
    if cpu >= MAX_CPUS {
        return Err(AffinityError::CpuOutOfRange {
            cpu,
            max: MAX_CPUS - 1,
        });
    }

    let ret = unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(cpu, &mut set);
        libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set)
    };

    if ret != 0 {
        return Err(AffinityError::Os {
            cpu,
            source: std::io::Error::last_os_error(),
        });
    }

    log::trace!("pinned thread {:?} to CPU {}", std::thread::current().name(), cpu);
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn pin_current_thread_to(_cpu: usize) -> Result<(), AffinityError> {
    Err(AffinityError::Unsupported(super::host_os()))
}

/// 当前线程正在运行的 CPU
#[cfg(target_os = "linux")]
pub fn current_cpu() -> Option<usize> {
    let cpu = unsafe { libc::sched_getcpu() };
    usize::try_from(cpu).ok()
}

#[cfg(not(target_os = "linux"))]
pub fn current_cpu() -> Option<usize> {
    None
}

/// 可用逻辑 CPU 数
pub fn available_cpus() -> usize {
    num_cpus::get()
}

/// 物理核心数
pub fn physical_cpus() -> usize {
    num_cpus::get_physical()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_available_cpus() {
        assert!(available_cpus() >= 1);
        assert!(physical_cpus() >= 1);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_out_of_range_cpu_rejected() {
        let err = pin_current_thread_to(MAX_CPUS).unwrap_err();
        assert!(matches!(err, AffinityError::CpuOutOfRange { .. }));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_pin_to_current_cpu() {
        // 绑定到当前所在的 CPU 一定在允许的掩码内
        let handle = std::thread::spawn(|| {
            let cpu = current_cpu().expect("sched_getcpu failed");
            pin_current_thread_to(cpu).expect("pinning to the current CPU failed");
            cpu
        });
        let cpu = handle.join().unwrap();
        assert!(cpu < MAX_CPUS);
    }

    #[cfg(not(target_os = "linux"))]
    #[test]
    fn test_unsupported_platform() {
        assert!(matches!(
            pin_current_thread_to(0),
            Err(AffinityError::Unsupported(_))
        ));
    }
}
