//! 主机平台信息
//!
//! 用于在启动时记录运行环境，并检查工作集是否超过物理内存

use std::fmt;

/// 平台信息
#[derive(Debug, Clone)]
pub struct PlatformInfo {
    pub os: String,
    pub arch: String,
    pub cpu_count: usize,
    pub physical_cores: usize,
    pub total_memory: u64,
}

impl PlatformInfo {
    /// 获取当前平台信息
    pub fn get() -> Self {
        Self {
            os: super::host_os().to_string(),
            arch: super::host_arch().to_string(),
            cpu_count: num_cpus::get(),
            physical_cores: num_cpus::get_physical(),
            total_memory: Self::get_total_memory(),
        }
    }

    /// 获取总内存（字节），未知时返回 0
    #[cfg(target_os = "linux")]
    fn get_total_memory() -> u64 {
        let Ok(content) = std::fs::read_to_string("/proc/meminfo") else {
            return 0;
        };
        content
            .lines()
            .find(|line| line.starts_with("MemTotal:"))
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|kb| kb.parse::<u64>().ok())
            .map_or(0, |kb| kb * 1024)
    }

    #[cfg(target_os = "macos")]
    fn get_total_memory() -> u64 {
        use std::process::Command;
        if let Ok(output) = Command::new("sysctl").arg("-n").arg("hw.memsize").output()
            && let Ok(mem_str) = String::from_utf8(output.stdout)
            && let Ok(mem) = mem_str.trim().parse::<u64>()
        {
            return mem;
        }
        0
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    fn get_total_memory() -> u64 {
        0
    }

    /// 给定字节数是否能放入物理内存（内存大小未知时返回 true）
    pub fn fits_in_memory(&self, bytes: u64) -> bool {
        self.total_memory == 0 || bytes <= self.total_memory
    }
}

impl fmt::Display for PlatformInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {}, {} logical CPUs ({} physical), {} MB memory",
            self.os,
            self.arch,
            self.cpu_count,
            self.physical_cores,
            self.total_memory / (1024 * 1024)
        )
    }
}
