//! 基准测试配置
//!
//! Every knob that the classic STREAM build fixed at compile time (array
//! size, repetition count, element type, offset) plus the harness options.
//! Sources are layered as defaults < TOML file < command line.

use std::path::Path;

use serde::{Deserialize, Serialize};

use membw_mem::{ElementWidth, KernelChoice};

use crate::partition::CpuMapConfig;
use crate::report::ByteAccounting;

/// Default array length, in elements.
pub const DEFAULT_ELEMENT_COUNT: usize = 128_000_000;
/// Default number of trials, including warm-up.
pub const DEFAULT_REPETITIONS: usize = 10;

/// 配置错误类型
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// 无效的配置
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("repetitions ({repetitions}) must exceed warm-up trials ({warmup})")]
    TooFewRepetitions { repetitions: usize, warmup: usize },

    #[error("offset of {offset} bytes is not a multiple of the {element_size}-byte element size")]
    MisalignedOffset { offset: usize, element_size: usize },

    /// 解析错误
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// 序列化错误
    #[error("Failed to serialize configuration: {0}")]
    Serialize(String),

    /// IO 错误
    #[error("IO error: {0}")]
    Io(String),
}

/// Complete benchmark configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BenchConfig {
    /// Worker threads, one partition each
    pub threads: usize,
    /// Elements per array
    pub element_count: usize,
    /// Total trials; the first `warmup_trials` are discarded
    pub repetitions: usize,
    pub element_width: ElementWidth,
    /// Byte offset of every array view from its 64-byte aligned base
    pub offset_bytes: usize,
    /// Partition granularity in elements; defaults to one 512-bit vector
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_width: Option<usize>,
    pub warmup_trials: usize,
    pub cpu_map: CpuMapConfig,
    pub accounting: ByteAccounting,
    pub kernel: KernelChoice,
    /// Pin each worker to its mapped CPU; a failed pin aborts the run
    pub pin_threads: bool,
    /// Check the destination array after the last trial
    pub validate: bool,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            element_count: DEFAULT_ELEMENT_COUNT,
            repetitions: DEFAULT_REPETITIONS,
            element_width: ElementWidth::Four,
            offset_bytes: 0,
            vector_width: None,
            warmup_trials: 1,
            cpu_map: CpuMapConfig::Identity,
            accounting: ByteAccounting::Moved,
            kernel: KernelChoice::Auto,
            pin_threads: true,
            validate: true,
        }
    }
}

impl BenchConfig {
    /// Default configuration for `threads` workers.
    pub fn with_threads(threads: usize) -> Self {
        Self {
            threads,
            ..Self::default()
        }
    }

    /// Partition granularity actually used.
    pub fn effective_vector_width(&self) -> usize {
        self.vector_width
            .unwrap_or_else(|| self.element_width.lanes_512())
    }

    /// Non-warm-up trials that feed the statistics.
    pub fn measured_trials(&self) -> usize {
        self.repetitions.saturating_sub(self.warmup_trials)
    }

    /// Bytes per array view, excluding the offset.
    pub fn array_bytes(&self) -> u64 {
        self.element_count as u64 * self.element_width.bytes() as u64
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threads == 0 {
            return Err(ConfigError::Invalid("threads must be at least 1".into()));
        }
        if self.element_count == 0 {
            return Err(ConfigError::Invalid(
                "element_count must be at least 1".into(),
            ));
        }
        if self.repetitions <= self.warmup_trials {
            return Err(ConfigError::TooFewRepetitions {
                repetitions: self.repetitions,
                warmup: self.warmup_trials,
            });
        }
        if self.effective_vector_width() == 0 {
            return Err(ConfigError::Invalid(
                "vector_width must be at least 1".into(),
            ));
        }
        let element_size = self.element_width.bytes();
        if self.offset_bytes % element_size != 0 {
            return Err(ConfigError::MisalignedOffset {
                offset: self.offset_bytes,
                element_size,
            });
        }
        self.cpu_map.validate()
    }

    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(format!("TOML parse error: {}", e)))
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(format!("TOML serialize error: {}", e)))
    }

    /// 从文件加载配置
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = BenchConfig::default();
        config.validate().unwrap();
        assert_eq!(config.effective_vector_width(), 16);
        assert_eq!(config.measured_trials(), 9);
        assert_eq!(config.array_bytes(), 512_000_000);
    }

    #[test]
    fn test_f64_vector_width() {
        let config = BenchConfig {
            element_width: ElementWidth::Eight,
            ..BenchConfig::default()
        };
        assert_eq!(config.effective_vector_width(), 8);
    }

    #[test]
    fn test_rejects_zero_threads() {
        let config = BenchConfig::with_threads(0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_single_repetition() {
        let config = BenchConfig {
            repetitions: 1,
            ..BenchConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::TooFewRepetitions {
                repetitions: 1,
                warmup: 1
            })
        );
    }

    #[test]
    fn test_rejects_zero_vector_width() {
        let config = BenchConfig {
            vector_width: Some(0),
            ..BenchConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_misaligned_offset() {
        let config = BenchConfig {
            element_width: ElementWidth::Eight,
            offset_bytes: 12,
            ..BenchConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::MisalignedOffset {
                offset: 12,
                element_size: 8
            })
        );
    }

    #[test]
    fn test_from_toml() {
        let toml = r#"
            threads = 4
            element_count = 4096
            element_width = 8
            accounting = "nominal"
            kernel = "portable"

            [cpu_map]
            kind = "scatter"
            groups = 2
            stride = 2
            base = 0
            total = 4
        "#;
        let config = BenchConfig::from_toml(toml).unwrap();
        assert_eq!(config.threads, 4);
        assert_eq!(config.element_count, 4096);
        assert_eq!(config.element_width, ElementWidth::Eight);
        assert_eq!(config.accounting, ByteAccounting::Nominal);
        assert_eq!(config.kernel, KernelChoice::Portable);
        assert_eq!(config.repetitions, DEFAULT_REPETITIONS);
        config.validate().unwrap();
    }

    #[test]
    fn test_from_toml_rejects_bad_width() {
        assert!(matches!(
            BenchConfig::from_toml("element_width = 2"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_from_toml_rejects_unknown_key() {
        assert!(BenchConfig::from_toml("threadz = 2").is_err());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = BenchConfig {
            threads: 3,
            vector_width: Some(32),
            ..BenchConfig::default()
        };
        let text = config.to_toml().unwrap();
        assert_eq!(BenchConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_from_missing_file() {
        let err = BenchConfig::from_file("/nonexistent/membw.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
