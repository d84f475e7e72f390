use bitstream_io::{BitRead, BitReader, BitWrite, BitWriter, Endianness};

use super::{ParseError, constants::MAX_POINTER_HOPS};

pub trait PacketComponent {
    fn write<E: Endianness>(
        &self,
        writer: &mut BitWriter<&mut Vec<u8>, E>,
    ) -> Result<(), ParseError>;

    /// Read the component. `packet_buf` is the whole message, needed to
    /// follow compression pointers in owner names.
    fn read<E: Endianness>(
        &mut self,
        reader: &mut BitReader<&[u8], E>,
        packet_buf: &[u8],
    ) -> Result<(), ParseError>;

    fn read_labels<E: Endianness>(
        &mut self,
        reader: &mut BitReader<&[u8], E>,
        packet_buf: &[u8],
    ) -> Result<Vec<String>, ParseError> {
        let mut labels = Vec::new();
        loop {
            let label_len = reader.read_var::<u8>(8)?;
            if label_len == 0 {
                break;
            }
            if label_len & 0xC0 == 0xC0 {
                // A pointer always ends the name in the stream
                let low = reader.read_var::<u8>(8)?;
                let offset = (usize::from(label_len & 0x3F) << 8) | usize::from(low);
                labels.extend(decode_name_at(packet_buf, offset)?);
                break;
            }
            if label_len > 63 {
                return Err(ParseError::InvalidLabel);
            }
            let mut buf = vec![0; label_len as usize];
            reader.read_bytes(&mut buf)?;
            labels.push(String::from_utf8(buf).map_err(|_| ParseError::InvalidLabel)?);
        }

        Ok(labels)
    }

    fn write_labels<E: Endianness>(
        &self,
        writer: &mut BitWriter<&mut Vec<u8>, E>,
        labels: &[String],
    ) -> Result<(), ParseError> {
        for label in labels.iter().filter(|l| !l.is_empty()) {
            if label.len() > 63 {
                return Err(ParseError::InvalidLabel);
            }
            writer.write_var::<u8>(8, label.len() as u8)?;
            writer.write_bytes(label.as_bytes())?;
        }
        writer.write_var::<u8>(8, 0)?;

        Ok(())
    }
}

/// Decode a (possibly compressed) name starting at `offset` in the message.
pub fn decode_name_at(packet_buf: &[u8], mut offset: usize) -> Result<Vec<String>, ParseError> {
    let mut labels = Vec::new();
    let mut hops = 0;
    loop {
        let len = *packet_buf.get(offset).ok_or(ParseError::InvalidLabel)?;
        if len == 0 {
            return Ok(labels);
        }
        if len & 0xC0 == 0xC0 {
            hops += 1;
            if hops > MAX_POINTER_HOPS {
                return Err(ParseError::CompressionLoop);
            }
            let low = *packet_buf.get(offset + 1).ok_or(ParseError::InvalidLabel)?;
            offset = (usize::from(len & 0x3F) << 8) | usize::from(low);
            continue;
        }
        if len > 63 {
            return Err(ParseError::InvalidLabel);
        }
        let start = offset + 1;
        let end = start + len as usize;
        let raw = packet_buf.get(start..end).ok_or(ParseError::InvalidLabel)?;
        labels.push(String::from_utf8(raw.to_vec()).map_err(|_| ParseError::InvalidLabel)?);
        offset = end;
    }
}

/// Split a presentation-format name into labels, dropping the root.
pub fn labels_from_name(name: &str) -> Vec<String> {
    name.split('.')
        .filter(|l| !l.is_empty())
        .map(|l| l.to_string())
        .collect()
}

/// Canonical (lower-cased, uncompressed) wire form of a name.
pub fn canonical_wire_name(name: &str) -> Vec<u8> {
    let mut wire = Vec::with_capacity(name.len() + 2);
    for label in name.split('.').filter(|l| !l.is_empty()) {
        wire.push(label.len() as u8);
        wire.extend(label.bytes().map(|b| b.to_ascii_lowercase()));
    }
    wire.push(0);
    wire
}
