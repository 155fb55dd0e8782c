use std::io::Read;

use serde_json::Value;

use crate::cli::OutputFormat;
use crate::filter::FieldPolicy;

/// Reads a filters argument; `-` means stdin
pub fn read_filters(arg: &str) -> anyhow::Result<String> {
    if arg == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        Ok(arg.to_string())
    }
}

pub fn policy_from(deny: &[String]) -> FieldPolicy {
    deny.iter().cloned().collect()
}

/// Prints `value` as pretty JSON, or `text` in text mode
pub fn output_value(output_format: OutputFormat, value: &Value, text: impl FnOnce() -> String) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => println!("{}", text()),
    }
    Ok(())
}
