//! Minimal DNS message codec (RFC 1035) for A, AAAA and TXT queries.
//!
//! Only what a stub resolver needs: encode a single-question recursive query
//! and pull the answer records of the queried type out of the response.

use std::net::{Ipv4Addr, Ipv6Addr};

const HEADER_LEN: usize = 12;
const FLAG_QR: u16 = 0x8000;
const FLAG_TC: u16 = 0x0200;
const FLAG_RD: u16 = 0x0100;
const CLASS_IN: u16 = 1;
const MAX_NAME_LEN: usize = 255;
const MAX_LABEL_LEN: usize = 63;
const TYPE_OPT: u16 = 41;

/// UDP payload size advertised through EDNS0.
pub const EDNS_PAYLOAD_SIZE: u16 = 4096;

/// Encoded length of the EDNS0 OPT record closing every query.
pub(crate) const OPT_LEN: usize = 11;

/// Record types the codec understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    /// IPv4 address.
    A,
    /// IPv6 address.
    Aaaa,
    /// Text strings.
    Txt,
}

impl RecordType {
    /// Wire value of the type.
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::A => 1,
            Self::Txt => 16,
            Self::Aaaa => 28,
        }
    }
}

/// Codec errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    /// The query name cannot be encoded.
    #[error("invalid name {0:?}")]
    InvalidName(String),

    /// The response ended early or points outside itself.
    #[error("malformed response: {0}")]
    Malformed(&'static str),

    /// The response answers a different query.
    #[error("response id {got} does not match query id {want}")]
    IdMismatch {
        /// Id of the query.
        want: u16,
        /// Id found in the response.
        got: u16,
    },

    /// The server did not fit the answer into one datagram.
    #[error("response truncated")]
    Truncated,

    /// The name does not exist.
    #[error("no such host")]
    NxDomain,

    /// The server reported a failure.
    #[error("server returned rcode {0}")]
    Rcode(u8),
}

/// Encodes a recursive query for `name` with the given id.
///
/// The query advertises an EDNS0 buffer of [`EDNS_PAYLOAD_SIZE`] bytes so
/// large answers are not truncated at 512 bytes.
///
/// # Errors
/// Returns [`WireError::InvalidName`] for empty labels, labels longer than 63
/// bytes or names longer than 255 bytes.
pub fn encode_query(id: u16, name: &str, rtype: RecordType) -> Result<Vec<u8>, WireError> {
    let mut buf = Vec::with_capacity(HEADER_LEN + name.len() + 6 + OPT_LEN);
    buf.extend_from_slice(&id.to_be_bytes());
    buf.extend_from_slice(&FLAG_RD.to_be_bytes());
    buf.extend_from_slice(&1u16.to_be_bytes()); // qdcount
    buf.extend_from_slice(&[0; 4]); // an, ns
    buf.extend_from_slice(&1u16.to_be_bytes()); // ar: the OPT record

    let trimmed = name.strip_suffix('.').unwrap_or(name);
    if trimmed.is_empty() {
        return Err(WireError::InvalidName(name.to_string()));
    }
    let mut encoded_len = 1;
    for label in trimmed.split('.') {
        if label.is_empty() || label.len() > MAX_LABEL_LEN {
            return Err(WireError::InvalidName(name.to_string()));
        }
        encoded_len += label.len() + 1;
        buf.push(label.len() as u8);
        buf.extend_from_slice(label.as_bytes());
    }
    if encoded_len > MAX_NAME_LEN {
        return Err(WireError::InvalidName(name.to_string()));
    }
    buf.push(0);

    buf.extend_from_slice(&rtype.code().to_be_bytes());
    buf.extend_from_slice(&CLASS_IN.to_be_bytes());

    // EDNS0 OPT: root owner, class carries the payload size, no options
    buf.push(0);
    buf.extend_from_slice(&TYPE_OPT.to_be_bytes());
    buf.extend_from_slice(&EDNS_PAYLOAD_SIZE.to_be_bytes());
    buf.extend_from_slice(&[0; 6]); // extended rcode, version, flags, rdlength
    Ok(buf)
}

/// Extracts the answers of type `rtype` from a response to query `id`.
///
/// Addresses are rendered in their standard textual form; the strings of one
/// TXT record are concatenated. Answers of other types (e.g. the CNAME chain
/// leading to the addresses) are skipped.
///
/// # Errors
/// Returns an error for malformed or truncated responses, id mismatches and
/// non-zero response codes.
pub fn decode_answers(id: u16, buf: &[u8], rtype: RecordType) -> Result<Vec<String>, WireError> {
    let mut reader = Reader { buf, pos: 0 };

    let got = reader.u16()?;
    if got != id {
        return Err(WireError::IdMismatch { want: id, got });
    }
    let flags = reader.u16()?;
    if flags & FLAG_QR == 0 {
        return Err(WireError::Malformed("not a response"));
    }
    if flags & FLAG_TC != 0 {
        return Err(WireError::Truncated);
    }
    match (flags & 0x000f) as u8 {
        0 => {}
        3 => return Err(WireError::NxDomain),
        rcode => return Err(WireError::Rcode(rcode)),
    }
    let qdcount = reader.u16()?;
    let ancount = reader.u16()?;
    reader.skip(4)?; // ns, ar

    for _ in 0..qdcount {
        reader.skip_name()?;
        reader.skip(4)?;
    }

    let mut answers = Vec::new();
    for _ in 0..ancount {
        reader.skip_name()?;
        let atype = reader.u16()?;
        let class = reader.u16()?;
        reader.skip(4)?; // ttl
        let rdlength = reader.u16()? as usize;
        let rdata = reader.take(rdlength)?;

        if class != CLASS_IN || atype != rtype.code() {
            continue;
        }
        answers.push(decode_rdata(rtype, rdata)?);
    }
    Ok(answers)
}

fn decode_rdata(rtype: RecordType, rdata: &[u8]) -> Result<String, WireError> {
    match rtype {
        RecordType::A => {
            let octets: [u8; 4] = rdata
                .try_into()
                .map_err(|_| WireError::Malformed("A record is not 4 bytes"))?;
            Ok(Ipv4Addr::from(octets).to_string())
        }
        RecordType::Aaaa => {
            let octets: [u8; 16] = rdata
                .try_into()
                .map_err(|_| WireError::Malformed("AAAA record is not 16 bytes"))?;
            Ok(Ipv6Addr::from(octets).to_string())
        }
        RecordType::Txt => {
            let mut text = String::new();
            let mut pos = 0;
            while pos < rdata.len() {
                let len = rdata[pos] as usize;
                let chunk = rdata
                    .get(pos + 1..pos + 1 + len)
                    .ok_or(WireError::Malformed("TXT string overruns record"))?;
                text.push_str(&String::from_utf8_lossy(chunk));
                pos += 1 + len;
            }
            Ok(text)
        }
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        let end = self.pos.checked_add(n).ok_or(WireError::Malformed("length overflow"))?;
        let slice = self
            .buf
            .get(self.pos..end)
            .ok_or(WireError::Malformed("unexpected end of message"))?;
        self.pos = end;
        Ok(slice)
    }

    fn skip(&mut self, n: usize) -> Result<(), WireError> {
        self.take(n).map(|_| ())
    }

    fn u16(&mut self) -> Result<u16, WireError> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Skips a possibly compressed name. A compression pointer always ends
    /// the name in the current position, so it is never followed.
    fn skip_name(&mut self) -> Result<(), WireError> {
        loop {
            let len = self.take(1)?[0];
            match len & 0xc0 {
                0x00 if len == 0 => return Ok(()),
                0x00 => self.skip(len as usize)?,
                0xc0 => return self.skip(1),
                _ => return Err(WireError::Malformed("unsupported label type")),
            }
        }
    }
}
