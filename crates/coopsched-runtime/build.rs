//! Build script for coopsched-runtime
//!
//! Merges the runtime defaults with an optional user override file:
//! 1. Start with library defaults
//! 2. If COOP_CONFIG_RS is set, parse that file
//! 3. Known constants from the file replace the defaults
//! 4. Write OUT_DIR/coop_merged_config.rs
//!
//! The override file only needs the values it changes.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

struct ConfigParam {
    name: &'static str,
    rust_type: &'static str,
    default_value: &'static str,
}

const CONFIG_PARAMS: &[ConfigParam] = &[
    ConfigParam {
        name: "STACK_SIZE",
        rust_type: "usize",
        default_value: "256 * 1024", // 256KB
    },
    ConfigParam {
        name: "DEFAULT_PRIORITY",
        rust_type: "i32",
        default_value: "10",
    },
    ConfigParam {
        name: "MAIN_PRIORITY",
        rust_type: "i32",
        default_value: "10",
    },
    ConfigParam {
        name: "IDLE_PARK_TIMEOUT_MS",
        rust_type: "u64",
        default_value: "10",
    },
    ConfigParam {
        name: "DEBUG_LOGGING",
        rust_type: "bool",
        default_value: "false",
    },
    ConfigParam {
        name: "REPORT_STATS",
        rust_type: "bool",
        default_value: "false",
    },
];

fn main() {
    let out_dir = env::var("OUT_DIR").expect("OUT_DIR not set");
    let dest_path = Path::new(&out_dir).join("coop_merged_config.rs");

    let mut config: HashMap<&str, String> = CONFIG_PARAMS
        .iter()
        .map(|p| (p.name, p.default_value.to_string()))
        .collect();

    let user_path = env::var("COOP_CONFIG_RS").ok();
    if let Some(user_path) = &user_path {
        println!("cargo:rerun-if-changed={}", user_path);

        match fs::read_to_string(user_path) {
            Ok(content) => {
                parse_and_merge(&content, &mut config);
                println!("cargo:warning=Using custom config: {}", user_path);
            }
            Err(e) => {
                println!(
                    "cargo:warning=Failed to read COOP_CONFIG_RS ({}): {}",
                    user_path, e
                );
            }
        }
    }

    println!("cargo:rerun-if-env-changed=COOP_CONFIG_RS");

    let output = generate_config(&config, user_path.is_some());
    fs::write(&dest_path, output).expect("Failed to write merged config");
}

/// Merge `pub const NAME: TYPE = VALUE;` lines into `config`
fn parse_and_merge(content: &str, config: &mut HashMap<&str, String>) {
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("//") || !line.starts_with("pub const ") {
            continue;
        }

        let Some((name, value)) = parse_const_line(line) else {
            continue;
        };
        match CONFIG_PARAMS.iter().find(|p| p.name == name) {
            Some(param) => {
                config.insert(param.name, value);
            }
            None => println!("cargo:warning=Unknown config parameter: {}", name),
        }
    }
}

fn parse_const_line(line: &str) -> Option<(String, String)> {
    let rest = line.strip_prefix("pub const ")?.trim();

    let colon_pos = rest.find(':')?;
    let name = rest[..colon_pos].trim().to_string();

    let eq_pos = rest.find('=')?;
    let semi_pos = rest.rfind(';').unwrap_or(rest.len());
    if semi_pos <= eq_pos {
        return None;
    }
    let value = rest[eq_pos + 1..semi_pos].trim().to_string();

    Some((name, value))
}

fn generate_config(config: &HashMap<&str, String>, has_user_file: bool) -> String {
    let mut output = String::new();

    output.push_str("// Auto-generated by build.rs - do not edit\n");
    output.push_str("// Configuration merged from library defaults");
    if has_user_file {
        output.push_str(" and COOP_CONFIG_RS");
    }
    output.push_str("\n\n");

    for param in CONFIG_PARAMS {
        let value = config
            .get(param.name)
            .map(String::as_str)
            .unwrap_or(param.default_value);
        output.push_str(&format!(
            "pub const {}: {} = {};\n",
            param.name, param.rust_type, value
        ));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_const_line() {
        let result = parse_const_line("pub const DEFAULT_PRIORITY: i32 = -3;");
        assert_eq!(result, Some(("DEFAULT_PRIORITY".into(), "-3".into())));

        let result = parse_const_line("pub const STACK_SIZE: usize = 64 * 1024;");
        assert_eq!(result, Some(("STACK_SIZE".into(), "64 * 1024".into())));
    }

    #[test]
    fn test_parse_and_merge_ignores_unknown() {
        let mut config: HashMap<&str, String> = HashMap::new();
        config.insert("REPORT_STATS", "false".into());

        let user_config = r#"
            // Custom config
            pub const REPORT_STATS: bool = true;
            pub const NUM_WORKERS: usize = 16;
        "#;

        parse_and_merge(user_config, &mut config);

        assert_eq!(config.get("REPORT_STATS"), Some(&"true".to_string()));
        assert!(!config.contains_key("NUM_WORKERS"));
    }
}
