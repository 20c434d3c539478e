//! 高精度计时器
//!
//! 计时区间以秒（f64）表示，底层使用单调时钟

#[cfg(unix)]
use std::mem::MaybeUninit;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// 粒度探测的采样次数
const GRANULARITY_SAMPLES: usize = 20;

/// 单调时钟读数
#[cfg(unix)]
fn monotonic() -> Duration {
    let mut ts = MaybeUninit::<libc::timespec>::uninit();
    // SAFETY: clock_gettime 只写入 ts，CLOCK_MONOTONIC 在所有 unix 平台上可用
    let rc = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, ts.as_mut_ptr()) };
    if rc != 0 {
        return since_first_call();
    }
    // SAFETY: 调用成功时 ts 已被完整写入
    let ts = unsafe { ts.assume_init() };
    Duration::new(ts.tv_sec as u64, ts.tv_nsec as u32)
}

#[cfg(not(unix))]
fn monotonic() -> Duration {
    since_first_call()
}

fn since_first_call() -> Duration {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    EPOCH.get_or_init(Instant::now).elapsed()
}

/// 高精度时间戳（纳秒，单调时钟）
#[inline]
pub fn timestamp_ns() -> u64 {
    monotonic().as_nanos() as u64
}

/// 当前时间（秒）
///
/// 两次调用之差即为经过的墙钟时间，保证非负。
#[inline]
pub fn now() -> f64 {
    monotonic().as_secs_f64()
}

/// 执行 `f`，返回其结果与耗时（纳秒）
pub fn measure<R>(f: impl FnOnce() -> R) -> (R, u64) {
    let start = monotonic();
    let result = f();
    let elapsed = monotonic().saturating_sub(start);
    (result, elapsed.as_nanos() as u64)
}

/// 估算时钟粒度（微秒）
///
/// 采集 20 个相隔至少 1 微秒的读数，返回相邻读数的最小正差值。
/// 返回 0 表示粒度小于 1 微秒。
pub fn clock_granularity_us() -> u64 {
    let mut found = [0.0f64; GRANULARITY_SAMPLES];
    let mut t1 = now();
    for slot in found.iter_mut() {
        let mut t2 = now();
        while t2 - t1 < 1.0e-6 {
            t2 = now();
        }
        *slot = t2;
        t1 = t2;
    }

    found
        .windows(2)
        .map(|w| (1.0e6 * (w[1] - w[0])) as i64)
        .map(|delta| delta.max(0) as u64)
        .min()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp() {
        let t1 = timestamp_ns();
        std::thread::sleep(std::time::Duration::from_millis(1));
        let t2 = timestamp_ns();
        assert!(t2 > t1);
    }

    #[test]
    fn test_now_is_monotonic() {
        let t1 = now();
        let t2 = now();
        assert!(t2 - t1 >= 0.0);
    }

    #[test]
    fn test_measure() {
        let (value, elapsed) = measure(|| {
            std::thread::sleep(std::time::Duration::from_millis(2));
            7
        });
        assert_eq!(value, 7);
        assert!(elapsed >= 2_000_000);
    }

    #[test]
    fn test_fallback_clock_advances() {
        let t1 = since_first_call();
        std::thread::sleep(std::time::Duration::from_millis(1));
        assert!(since_first_call() > t1);
    }

    #[test]
    fn test_clock_granularity() {
        let quantum = clock_granularity_us();
        // 每个采样间隔至少 1 微秒，粒度不可能超过 1 秒
        assert!(quantum < 1_000_000);
        println!("Clock granularity: {} us", quantum);
    }
}
