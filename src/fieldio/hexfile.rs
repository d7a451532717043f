//! Line records of a bitstream image.
//!
//! Each line is `:BBAAAATT<payload>...`: a marker, a two-digit byte count,
//! four address digits the loader ignores, a two-digit record type and, for
//! data records, `2 * BB` payload digits.

/// Record type that carries payload bytes.
pub const DATA_RECORD: u8 = 0x00;

const COUNT_AT: usize = 1;
const TYPE_AT: usize = 7;
const PAYLOAD_AT: usize = 9;

/// Why a line could not be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordError {
    MissingMarker,
    BadHeader,
    BadPayload,
}

/// One parsed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitstreamRecord<'a> {
    pub byte_count: u8,
    pub record_type: u8,
    payload: &'a [u8],
}

impl<'a> BitstreamRecord<'a> {
    /// Parses one line, without its line terminator.
    ///
    /// The payload of a data record is validated up front so that streaming
    /// never starts on a line that cannot be finished.
    pub fn parse(line: &'a [u8]) -> Result<Self, RecordError> {
        if line.first() != Some(&b':') {
            return Err(RecordError::MissingMarker);
        }
        let byte_count =
            hex_pair(line.get(COUNT_AT..COUNT_AT + 2)).ok_or(RecordError::BadHeader)?;
        let record_type =
            hex_pair(line.get(TYPE_AT..TYPE_AT + 2)).ok_or(RecordError::BadHeader)?;

        let payload: &[u8] = if record_type == DATA_RECORD {
            let end = PAYLOAD_AT + 2 * byte_count as usize;
            let digits = line.get(PAYLOAD_AT..end).ok_or(RecordError::BadPayload)?;
            if !digits.iter().all(u8::is_ascii_hexdigit) {
                return Err(RecordError::BadPayload);
            }
            digits
        } else {
            &[]
        };

        Ok(Self {
            byte_count,
            record_type,
            payload,
        })
    }

    #[inline]
    pub fn is_data(&self) -> bool {
        self.record_type == DATA_RECORD
    }

    /// Payload bytes, empty for non-data records.
    pub fn bytes(&self) -> impl Iterator<Item = u8> + 'a {
        self.payload.chunks_exact(2).filter_map(|pair| hex_pair(Some(pair)))
    }

    pub fn len(&self) -> usize {
        self.payload.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

fn hex_digit(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

fn hex_pair(pair: Option<&[u8]>) -> Option<u8> {
    match pair? {
        [hi, lo] => Some(hex_digit(*hi)? << 4 | hex_digit(*lo)?),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_record_payload() {
        let rec = BitstreamRecord::parse(b":03000000A1b2FF").unwrap();
        assert!(rec.is_data());
        assert_eq!(rec.byte_count, 3);
        assert_eq!(rec.len(), 3);
        assert!(rec.bytes().eq([0xA1, 0xB2, 0xFF]));
    }

    #[test]
    fn non_data_records_carry_no_bytes() {
        let rec = BitstreamRecord::parse(b":00000001FF").unwrap();
        assert_eq!(rec.record_type, 0x01);
        assert!(rec.is_empty());

        // Payload of other record types is not inspected.
        let rec = BitstreamRecord::parse(b":02000004zz").unwrap();
        assert_eq!(rec.bytes().count(), 0);
    }

    #[test]
    fn malformed_lines() {
        assert_eq!(
            BitstreamRecord::parse(b"03000000A1B2FF"),
            Err(RecordError::MissingMarker)
        );
        assert_eq!(BitstreamRecord::parse(b":0"), Err(RecordError::BadHeader));
        assert_eq!(
            BitstreamRecord::parse(b":G30000000102"),
            Err(RecordError::BadHeader)
        );
        assert_eq!(
            BitstreamRecord::parse(b":030000000102"),
            Err(RecordError::BadPayload)
        );
        assert_eq!(
            BitstreamRecord::parse(b":0200000001X2"),
            Err(RecordError::BadPayload)
        );
    }
}
