//! Runtime configuration
//!
//! Configuration is fixed when a [`Store`](super::Store) is created and can be
//! loaded from JSON:
//!
//! ```
//! use wasmgc::runtime::{Config, RelaxedSimd};
//!
//! let config = Config::from_json(r#"{ "relaxed_simd": "alternate" }"#).unwrap();
//! assert_eq!(config.relaxed_simd, RelaxedSimd::Alternate);
//! assert_eq!(config.max_array_len, 1 << 24);
//! ```

use serde::{Deserialize, Serialize};

/// Which of the permitted results relaxed SIMD operations produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelaxedSimd {
    /// Same results as the non-relaxed counterpart of each operation
    #[default]
    Deterministic,
    /// The other permitted behaviour: fused multiply-add, top-bit lane
    /// selection, wrapping q15 multiply and so on
    Alternate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub relaxed_simd: RelaxedSimd,
    /// Largest element count `array.new*` may allocate before trapping
    pub max_array_len: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            relaxed_simd: RelaxedSimd::Deterministic,
            max_array_len: 1 << 24,
        }
    }
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_relaxed_simd(mut self, mode: RelaxedSimd) -> Self {
        self.relaxed_simd = mode;
        self
    }

    pub fn with_max_array_len(mut self, len: u32) -> Self {
        self.max_array_len = len;
        self
    }
}
