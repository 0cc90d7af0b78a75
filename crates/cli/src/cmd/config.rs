//! Show repository configuration

use crate::util;
use anyhow::{Context, Result};

pub fn run(get: Option<&str>) -> Result<()> {
    let manager = util::open_manager()?;

    match get {
        None => {
            print!("{}", toml::to_string_pretty(manager.config())?);
            Ok(())
        }
        Some(key) => {
            let value =
                toml::Value::try_from(manager.config()).context("Failed to serialize config")?;
            let found = lookup(&value, key).with_context(|| format!("Unknown config key: {}", key))?;
            match found {
                toml::Value::String(s) => println!("{}", s),
                other => println!("{}", other),
            }
            Ok(())
        }
    }
}

/// Follow a dotted key such as `store.compression_level`
fn lookup<'a>(value: &'a toml::Value, key: &str) -> Option<&'a toml::Value> {
    key.split('.').try_fold(value, |current, part| current.get(part))
}
