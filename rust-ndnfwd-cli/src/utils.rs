//! Utility functions for the ndnfwd CLI

use anyhow::{bail, Result};
use std::time::Duration;

/// Format a duration as a human-readable string
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();

    if total_secs == 0 {
        format!("{:.3}ms", duration.as_secs_f64() * 1000.0)
    } else if total_secs < 60 {
        format!("{}.{:03}s", total_secs, duration.subsec_millis())
    } else {
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        format!("{}m {}s", mins, secs)
    }
}

/// Lowercase hex encoding of `bytes`.
pub fn hex(bytes: &[u8]) -> String {
    let mut hex = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        hex.push_str(&format!("{:02x}", byte));
    }
    hex
}

/// Parses hex, ignoring whitespace and an optional `0x` prefix.
pub fn from_hex(input: &str) -> Result<Vec<u8>> {
    let cleaned: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = cleaned.strip_prefix("0x").unwrap_or(&cleaned);
    if !digits.is_ascii() || digits.len() % 2 != 0 {
        bail!("hex input must be an even number of hex digits");
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| anyhow::anyhow!("invalid hex digits {:?}", &digits[i..i + 2]))
        })
        .collect()
}

/// Print a section header in the CLI output
pub fn print_header(title: &str) {
    let separator = "=".repeat(title.len());
    println!("\n{}", title);
    println!("{}", separator);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_round_trip() {
        let bytes = [0x00, 0x05, 0xab, 0xff];
        assert_eq!(hex(&bytes), "0005abff");
        assert_eq!(from_hex("0x00 05 ab ff").unwrap(), bytes);
        assert!(from_hex("abc").is_err());
        assert!(from_hex("zz").is_err());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_micros(1500)), "1.500ms");
        assert_eq!(format_duration(Duration::from_millis(2250)), "2.250s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
    }
}
