//! Configuration module for the loader engine.
//! Settings are read from an INI document; unknown keys are ignored and
//! out-of-range values are clamped.

use std::fs;
use std::path::Path;

use crate::decode::DownscaleFilter;

const DEFAULT_CONFIG_INI: &str = include_str!("../config.ini");

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Order in which the worker pool picks queued load tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueProcessingType {
    /// Oldest request first; preserves request order.
    Fifo,
    /// Newest request first. Rows that scrolled away long ago are the
    /// least likely to still be visible, so their work waits.
    Lifo,
}

impl QueueProcessingType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "fifo" | "queue" | "oldest_first" => Some(Self::Fifo),
            "lifo" | "stack" | "newest_first" => Some(Self::Lifo),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fifo => "fifo",
            Self::Lifo => "lifo",
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Number of decode worker threads
    pub thread_pool_size: usize,
    /// Queue discipline of the worker pool
    pub queue_processing: QueueProcessingType,
    /// Prefix used when naming worker threads
    pub thread_name_prefix: String,
    /// Memory budget the cache capacity is derived from
    pub memory_budget_bytes: u64,
    /// Capacity = budget / fraction
    pub cache_fraction: u32,
    /// Explicit capacity override (bytes)
    pub cache_capacity_bytes: Option<usize>,
    /// Filter used by the built-in decoders when shrinking
    pub downscale_filter: DownscaleFilter,
    /// Pause while the list is being dragged
    pub pause_on_scroll: bool,
    /// Pause while the list is flinging
    pub pause_on_fling: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            thread_pool_size: 3,
            queue_processing: QueueProcessingType::Lifo,
            thread_name_prefix: "uil-pool-".to_string(),
            memory_budget_bytes: 512 * BYTES_PER_MB,
            cache_fraction: 8,
            cache_capacity_bytes: None,
            downscale_filter: DownscaleFilter::default(),
            pause_on_scroll: true,
            pause_on_fling: true,
        }
    }
}

impl EngineConfig {
    /// Effective memory cache capacity in bytes.
    pub fn cache_capacity(&self) -> usize {
        if let Some(bytes) = self.cache_capacity_bytes {
            return bytes;
        }
        let fraction = u64::from(self.cache_fraction.max(1));
        usize::try_from(self.memory_budget_bytes / fraction).unwrap_or(usize::MAX)
    }

    /// Load configuration from an INI file.
    ///
    /// Falls back to the built-in template if the file cannot be read.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => Self::from_ini_str(&content),
            Err(e) => {
                tracing::warn!("Could not read config {:?}: {}; using defaults", path, e);
                Self::from_ini_str(DEFAULT_CONFIG_INI)
            }
        }
    }

    /// Parse INI content into a config. Missing keys keep their defaults.
    pub fn from_ini_str(content: &str) -> Self {
        let mut config = EngineConfig::default();

        let mut in_engine_section = false;
        let mut in_cache_section = false;
        let mut in_decode_section = false;
        let mut in_scroll_section = false;

        for line in content.lines() {
            let line = line.trim();

            // Skip empty lines and comments
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                let section = &line[1..line.len() - 1];
                in_engine_section = section.eq_ignore_ascii_case("engine")
                    || section.eq_ignore_ascii_case("loader");
                in_cache_section = section.eq_ignore_ascii_case("cache")
                    || section.eq_ignore_ascii_case("memory_cache");
                in_decode_section = section.eq_ignore_ascii_case("decode")
                    || section.eq_ignore_ascii_case("quality");
                in_scroll_section = section.eq_ignore_ascii_case("scroll");
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            if in_engine_section {
                match key.as_str() {
                    "thread_pool_size" | "pool_size" | "workers" => {
                        if let Ok(v) = value.parse::<usize>() {
                            config.thread_pool_size = v.clamp(1, 64);
                        }
                    }
                    "queue_processing" | "tasks_processing_order" => {
                        if let Some(v) = QueueProcessingType::from_str(value) {
                            config.queue_processing = v;
                        }
                    }
                    "thread_name_prefix" => {
                        if !value.is_empty() {
                            config.thread_name_prefix = value.to_string();
                        }
                    }
                    _ => {}
                }
            } else if in_cache_section {
                match key.as_str() {
                    "memory_budget_mb" => {
                        if let Ok(v) = value.parse::<u64>() {
                            config.memory_budget_bytes = v.max(1).saturating_mul(BYTES_PER_MB);
                        }
                    }
                    "cache_fraction" | "memory_fraction_divisor" => {
                        if let Ok(v) = value.parse::<u32>() {
                            config.cache_fraction = v.clamp(1, 64);
                        }
                    }
                    "cache_capacity_bytes" => {
                        if let Ok(v) = value.parse::<usize>() {
                            config.cache_capacity_bytes = (v > 0).then_some(v);
                        }
                    }
                    _ => {}
                }
            } else if in_decode_section {
                if let "downscale_filter" | "downscale" = key.as_str() {
                    if let Some(v) = DownscaleFilter::parse(value) {
                        config.downscale_filter = v;
                    }
                }
            } else if in_scroll_section {
                match key.as_str() {
                    "pause_on_scroll" => {
                        if let Some(v) = parse_bool(value) {
                            config.pause_on_scroll = v;
                        }
                    }
                    "pause_on_fling" => {
                        if let Some(v) = parse_bool(value) {
                            config.pause_on_fling = v;
                        }
                    }
                    _ => {}
                }
            }
        }

        config
    }

    /// Serialize to INI.
    pub fn to_ini(&self) -> String {
        let mut content = String::new();
        content.push_str("; Rust Image Loader configuration\n\n");

        content.push_str("[Engine]\n");
        content.push_str(&format!("thread_pool_size = {}\n", self.thread_pool_size));
        content.push_str(&format!("queue_processing = {}\n", self.queue_processing.as_str()));
        content.push_str(&format!("thread_name_prefix = {}\n\n", self.thread_name_prefix));

        content.push_str("[Cache]\n");
        content.push_str(&format!(
            "memory_budget_mb = {}\n",
            (self.memory_budget_bytes / BYTES_PER_MB).max(1)
        ));
        content.push_str(&format!("cache_fraction = {}\n", self.cache_fraction));
        content.push_str(&format!(
            "cache_capacity_bytes = {}\n\n",
            self.cache_capacity_bytes.unwrap_or(0)
        ));

        content.push_str("[Decode]\n");
        content.push_str(&format!("downscale_filter = {}\n\n", self.downscale_filter.name()));

        content.push_str("[Scroll]\n");
        content.push_str(&format!("pause_on_scroll = {}\n", self.pause_on_scroll));
        content.push_str(&format!("pause_on_fling = {}\n", self.pause_on_fling));

        content
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}
