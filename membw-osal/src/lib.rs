//! membw-osal: 操作系统抽象层
//!
//! 提供高精度计时器、线程亲和性和主机平台检测

pub mod affinity;
pub mod platform;
pub mod time;

pub use affinity::{AffinityError, pin_current_thread_to};
pub use platform::PlatformInfo;
pub use time::{clock_granularity_us, measure, now, timestamp_ns};

// ============================================================================
// 平台检测
// ============================================================================

pub fn host_os() -> &'static str {
    #[cfg(target_os = "linux")]
    {
        return "linux";
    }
    #[cfg(target_os = "macos")]
    {
        return "macos";
    }
    #[cfg(target_os = "windows")]
    {
        return "windows";
    }
    #[cfg(target_os = "android")]
    {
        return "android";
    }
    #[allow(unreachable_code)]
    "unknown"
}

pub fn host_arch() -> &'static str {
    #[cfg(target_arch = "x86_64")]
    {
        return "x86_64";
    }
    #[cfg(target_arch = "aarch64")]
    {
        return "aarch64";
    }
    #[cfg(target_arch = "riscv64")]
    {
        return "riscv64";
    }
    #[allow(unreachable_code)]
    "unknown"
}
