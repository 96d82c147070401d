//! Configuration Module - Allocator Tuning Parameters
//!
//! Manages the small set of knobs that control the hardening behaviour of
//! the allocator: memory perturbation, the invalid-pointer/double-free
//! check-level policy, and whether `report()` includes a hex dump by
//! default.

use std::sync::OnceLock;

/// Runtime configuration for the allocator.
///
/// # Examples
///
/// ```rust
/// use rmalloc::Config;
///
/// let config = Config::default();
/// assert_eq!(config.perturb_byte, 0);
///
/// let config = Config {
///     check_level: 0b011,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// If non-zero, freed payloads are filled with this byte and freshly
    /// allocated payloads are filled with its bitwise complement.
    ///
    /// Default: 0 (perturbation disabled)
    pub perturb_byte: u8,

    /// Bitfield controlling the invalid-pointer/double-free policy:
    /// bit 0 = print a short message, bit 1 = abort the process, bit 2 =
    /// include the offending pointer in the message.
    ///
    /// Default: 0b001 (print only)
    pub check_level: u8,

    /// If set, `report()` includes the hex/ASCII dump that `report_hex()`
    /// always includes.
    ///
    /// Default: false
    pub hex_dump: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            perturb_byte: 0,
            check_level: 0b001,
            hex_dump: false,
        }
    }
}

impl Config {
    /// Bit 0 of `check_level`: print a short diagnostic message.
    pub fn should_print(&self) -> bool {
        self.check_level & 0b001 != 0
    }

    /// Bit 1 of `check_level`: abort the process.
    pub fn should_abort(&self) -> bool {
        self.check_level & 0b010 != 0
    }

    /// Bit 2 of `check_level`: include the offending pointer in the message.
    pub fn should_print_pointer(&self) -> bool {
        self.check_level & 0b100 != 0
    }

    /// Validate configuration.
    ///
    /// There are currently no invalid combinations of these fields — every
    /// `u8`/`bool` value is meaningful — but `validate` is kept as an
    /// explicit step so a future field with a restricted range has
    /// somewhere to live.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.check_level > 0b111 {
            return Err(ConfigError::InvalidCheckLevel(self.check_level));
        }
        Ok(())
    }

    /// Build configuration from environment variables, falling back to
    /// [`Config::default`] for anything unset or unparsable.
    ///
    /// ```bash
    /// export RMALLOC_PERTURB_BYTE=0x5a
    /// export RMALLOC_CHECK_LEVEL=3
    /// export RMALLOC_HEX_DUMP=1
    /// ```
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("RMALLOC_PERTURB_BYTE") {
            if let Some(byte) = parse_u8(&val) {
                config.perturb_byte = byte;
            }
        }

        if let Ok(val) = std::env::var("RMALLOC_CHECK_LEVEL") {
            if let Some(level) = parse_u8(&val) {
                config.check_level = level;
            }
        }

        if let Ok(val) = std::env::var("RMALLOC_HEX_DUMP") {
            config.hex_dump = val == "1" || val.eq_ignore_ascii_case("true");
        }

        config
    }

    /// The process-wide configuration, parsed from the environment once on
    /// first access.
    pub fn global() -> &'static Config {
        static CONFIG: OnceLock<Config> = OnceLock::new();
        CONFIG.get_or_init(Config::from_env)
    }
}

fn parse_u8(val: &str) -> Option<u8> {
    let val = val.trim();
    if let Some(hex) = val.strip_prefix("0x").or_else(|| val.strip_prefix("0X")) {
        u8::from_str_radix(hex, 16).ok()
    } else {
        val.parse::<u8>().ok()
    }
}

/// Error types for configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid check_level bitfield: {0:#b} (only bits 0-2 are defined)")]
    InvalidCheckLevel(u8),
}
