//! Environment variable helpers used by the runtime configuration
//!
//! ```ignore
//! use coopsched_core::env::{env_get, env_get_bool};
//!
//! let stack: usize = env_get("COOP_STACK_SIZE", 256 * 1024);
//! let debug = env_get_bool("COOP_DEBUG", false);
//! ```

use std::str::FromStr;

/// Read `key` and parse it as `T`; `default` when unset or unparsable
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    env_get_opt(key).unwrap_or(default)
}

/// Read `key` as a boolean
///
/// "1", "true", "yes", "on" (any case) are true, "0", "false", "no", "off"
/// are false. Unset or anything else yields `default`.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => match val.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

/// Read `key` and parse it as `T`, if set and valid
#[inline]
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_returns_default() {
        let val: usize = env_get("__COOP_TEST_UNSET__", 42);
        assert_eq!(val, 42);
        assert!(env_get_bool("__COOP_TEST_UNSET__", true));
        assert_eq!(env_get_opt::<u64>("__COOP_TEST_UNSET__"), None);
    }

    #[test]
    fn test_parse_with_whitespace() {
        std::env::set_var("__COOP_TEST_NUM__", " 123 ");
        let val: usize = env_get("__COOP_TEST_NUM__", 0);
        assert_eq!(val, 123);
        std::env::remove_var("__COOP_TEST_NUM__");
    }

    #[test]
    fn test_invalid_parse_falls_back() {
        std::env::set_var("__COOP_TEST_BAD__", "lots");
        let val: u64 = env_get("__COOP_TEST_BAD__", 7);
        assert_eq!(val, 7);
        std::env::remove_var("__COOP_TEST_BAD__");
    }

    #[test]
    fn test_bool_variants() {
        for (raw, expected) in [("1", true), ("YES", true), ("on", true), ("0", false), ("Off", false)] {
            std::env::set_var("__COOP_TEST_BOOL__", raw);
            assert_eq!(env_get_bool("__COOP_TEST_BOOL__", !expected), expected, "{}", raw);
        }
        std::env::set_var("__COOP_TEST_BOOL__", "maybe");
        assert!(env_get_bool("__COOP_TEST_BOOL__", true));
        std::env::remove_var("__COOP_TEST_BOOL__");
    }
}
