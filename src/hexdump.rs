//! Hex dump codec used as the on-disk text encoding for locally encrypted mail
//!
//! Each line holds a 4-digit hexadecimal offset, up to sixteen space separated byte
//! pairs padded to a fixed column, and a printable-ASCII rendering of the same bytes:
//!
//! ```text
//! 0000: 48 65 6c 6c 6f 2c 20 77 6f 72 6c 64 21              Hello, world!
//! ```
//!
//! The ASCII column is for humans only; [`decode`] never reads it.

use crate::error::{Error, Result};

/// Number of bytes rendered on each line
pub const BYTES_PER_LINE: usize = 16;

/// Width of the hex column (16 pairs joined by single spaces, plus one pad)
const HEX_COLUMN_WIDTH: usize = BYTES_PER_LINE * 3;

/// Encodes bytes as a hex dump.
///
/// An empty input produces an empty document.
pub fn encode(bytes: &[u8]) -> String {
    let lines = bytes.len().div_ceil(BYTES_PER_LINE);
    let mut out = String::with_capacity(lines * (6 + HEX_COLUMN_WIDTH + 2 + BYTES_PER_LINE + 1));

    for (index, chunk) in bytes.chunks(BYTES_PER_LINE).enumerate() {
        let hex = chunk
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(" ");
        let ascii: String = chunk
            .iter()
            .map(|&b| if (0x20..=0x7e).contains(&b) { b as char } else { '.' })
            .collect();

        out.push_str(&format!(
            "{:04x}: {:<width$}  {}\n",
            index * BYTES_PER_LINE,
            hex,
            ascii,
            width = HEX_COLUMN_WIDTH
        ));
    }

    out
}

/// Decodes a hex dump back into the original bytes.
///
/// Blank lines are skipped. Every other line must contain a colon followed by at
/// least one two-digit hex group; anything after the first double space in the
/// value region is the ASCII rendering and is discarded.
pub fn decode(dump: &str) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(dump.len() / 4);

    for (number, raw_line) in dump.split('\n').enumerate() {
        let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);
        if line.trim().is_empty() {
            continue;
        }

        let (_, value) = line
            .split_once(':')
            .ok_or_else(|| Error::Format(format!("hex dump line {} has no offset separator", number + 1)))?;

        let value = value.trim_start();
        let hex_region = match value.find("  ") {
            Some(index) => &value[..index],
            None => value,
        };

        let before = bytes.len();
        for group in hex_region.split_whitespace() {
            bytes.push(parse_pair(group).ok_or_else(|| {
                Error::Format(format!(
                    "hex dump line {} contains an invalid byte group: {:?}",
                    number + 1,
                    group
                ))
            })?);
        }

        if bytes.len() == before {
            return Err(Error::Format(format!(
                "hex dump line {} contains no byte groups",
                number + 1
            )));
        }
    }

    Ok(bytes)
}

fn parse_pair(group: &str) -> Option<u8> {
    if group.len() != 2 || !group.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u8::from_str_radix(group, 16).ok()
}
