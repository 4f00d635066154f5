//! ASCII armor decoding (RFC 4880 section 6).

use base64::{Engine as _, engine::general_purpose};

use super::GpgError;

const CRC24_INIT: u32 = 0x00B7_04CE;
const CRC24_POLY: u32 = 0x0186_4CFB;

pub(crate) fn crc24(data: &[u8]) -> u32 {
    let mut crc = CRC24_INIT;
    for byte in data {
        crc ^= u32::from(*byte) << 16;
        for _ in 0..8 {
            crc <<= 1;
            if crc & 0x0100_0000 != 0 {
                crc ^= CRC24_POLY;
            }
        }
    }
    crc & 0x00FF_FFFF
}

/// Returns true when the input looks like an armored block rather than
/// binary packets.
pub fn is_armored(data: &[u8]) -> bool {
    let trimmed = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .map(|start| &data[start..])
        .unwrap_or_default();
    trimmed.starts_with(b"-----BEGIN PGP ")
}

/// Decodes the first armored block in `text` into its binary packets.
///
/// Armor headers (`Version:`, `Comment:` ...) are skipped. When a CRC-24
/// checksum line is present it must match the decoded payload.
pub fn dearmor(text: &str) -> Result<Vec<u8>, GpgError> {
    let mut lines = text.lines().map(str::trim_end);

    lines
        .by_ref()
        .find(|line| line.starts_with("-----BEGIN PGP "))
        .ok_or_else(|| GpgError::Armor("missing BEGIN line".to_string()))?;

    let mut in_headers = true;
    let mut payload = String::new();
    let mut checksum = None;
    let mut terminated = false;

    for line in lines {
        if line.starts_with("-----END PGP ") {
            terminated = true;
            break;
        }
        if in_headers {
            if line.is_empty() {
                in_headers = false;
                continue;
            }
            if line.contains(": ") {
                continue;
            }
            // Some producers omit the blank separator when there are no headers
            in_headers = false;
        }
        if let Some(crc) = line.strip_prefix('=') {
            checksum = Some(crc.to_string());
            continue;
        }
        payload.push_str(line.trim());
    }

    if !terminated {
        return Err(GpgError::Armor("missing END line".to_string()));
    }

    let data = general_purpose::STANDARD
        .decode(payload.as_bytes())
        .map_err(|e| GpgError::Armor(format!("invalid base64 payload: {e}")))?;

    if let Some(crc) = checksum {
        let expected = general_purpose::STANDARD
            .decode(crc.as_bytes())
            .map_err(|e| GpgError::Armor(format!("invalid checksum line: {e}")))?;
        if expected.len() != 3 {
            return Err(GpgError::Armor("checksum must be 3 bytes".to_string()));
        }
        let expected =
            (u32::from(expected[0]) << 16) | (u32::from(expected[1]) << 8) | u32::from(expected[2]);
        if expected != crc24(&data) {
            return Err(GpgError::Armor("CRC-24 checksum mismatch".to_string()));
        }
    }

    Ok(data)
}
