//! OpenPGP packet framing (RFC 4880 section 4).
//!
//! Both old-format and new-format headers are understood. Partial body
//! lengths are not, since keys and detached signatures never use them.

use super::GpgError;

pub const TAG_SIGNATURE: u8 = 2;
pub const TAG_PUBLIC_KEY: u8 = 6;
pub const TAG_PUBLIC_SUBKEY: u8 = 14;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet<'a> {
    pub tag: u8,
    pub body: &'a [u8],
}

/// Splits a binary OpenPGP message into packets.
pub fn parse_packets(data: &[u8]) -> Result<Vec<Packet<'_>>, GpgError> {
    let mut reader = Reader::new(data);
    let mut packets = Vec::new();

    while !reader.is_empty() {
        let header = reader.u8()?;
        if header & 0x80 == 0 {
            return Err(GpgError::Packet(format!(
                "invalid packet header byte {header:#04x}"
            )));
        }

        let (tag, length) = if header & 0x40 != 0 {
            (header & 0x3f, new_format_length(&mut reader)?)
        } else {
            let tag = (header >> 2) & 0x0f;
            let length = match header & 0x03 {
                0 => usize::from(reader.u8()?),
                1 => usize::from(reader.u16()?),
                2 => reader.u32()? as usize,
                // Indeterminate length runs to the end of the input
                _ => reader.remaining(),
            };
            (tag, length)
        };

        packets.push(Packet {
            tag,
            body: reader.take(length)?,
        });
    }

    Ok(packets)
}

fn new_format_length(reader: &mut Reader<'_>) -> Result<usize, GpgError> {
    let first = usize::from(reader.u8()?);
    match first {
        0..=191 => Ok(first),
        192..=223 => {
            let second = usize::from(reader.u8()?);
            Ok(((first - 192) << 8) + second + 192)
        }
        255 => Ok(reader.u32()? as usize),
        _ => Err(GpgError::Unsupported(
            "partial body lengths".to_string(),
        )),
    }
}

/// Bounds-checked cursor over packet bytes.
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn take(&mut self, len: usize) -> Result<&'a [u8], GpgError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| GpgError::Packet("unexpected end of packet data".to_string()))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub fn u8(&mut self) -> Result<u8, GpgError> {
        Ok(self.take(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16, GpgError> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn u32(&mut self) -> Result<u32, GpgError> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Reads a multiprecision integer, returning its big-endian magnitude.
    pub fn mpi(&mut self) -> Result<&'a [u8], GpgError> {
        let bits = usize::from(self.u16()?);
        self.take(bits.div_ceil(8))
    }
}
