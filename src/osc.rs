//! OSC 1.0 message codec.
//!
//! Wire format:
//! ```text
//! [address:str][type tags:str][args...]
//! ```
//! Strings are NUL-terminated and padded to a 4-byte boundary. Numeric
//! arguments are big-endian. Blobs carry an int32 length prefix and a payload
//! padded to 4 bytes.
//!
//! The decoder skips unknown type tags with a warning instead of failing. A
//! skipped tag that actually had a payload leaves the remaining arguments
//! misaligned; OSC gives no way to know the size of an unknown argument.

use crate::error::{OscQueryError, Result};
use crate::types::Rgba;

/// One decoded OSC argument
#[derive(Debug, Clone, PartialEq)]
pub enum OscArg {
    Int(i32),
    /// Low word of an `h`/`t` argument
    UInt(u32),
    Float(f32),
    Double(f64),
    String(String),
    Blob(Vec<u8>),
    Char(char),
    Midi([u8; 4]),
    Bool(bool),
    Nil,
    Color(Rgba),
}

impl OscArg {
    /// Numeric view used when copying an argument into a number slot
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            OscArg::Int(v) => Some(f64::from(*v)),
            OscArg::UInt(v) => Some(f64::from(*v)),
            OscArg::Float(v) => Some(f64::from(*v)),
            OscArg::Double(v) => Some(*v),
            OscArg::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    fn tag(&self) -> char {
        match self {
            OscArg::Int(_) | OscArg::UInt(_) => 'i',
            OscArg::Float(_) => 'f',
            OscArg::Double(_) => 'd',
            OscArg::String(_) => 's',
            OscArg::Blob(_) => 'b',
            OscArg::Char(_) => 'c',
            OscArg::Midi(_) => 'm',
            OscArg::Bool(true) => 'T',
            OscArg::Bool(false) => 'F',
            OscArg::Nil => 'N',
            OscArg::Color(_) => 'r',
        }
    }
}

/// A decoded OSC message
#[derive(Debug, Clone, PartialEq)]
pub struct OscMessage {
    pub address: String,
    pub args: Vec<OscArg>,
}

impl OscMessage {
    pub fn new(address: impl Into<String>, args: Vec<OscArg>) -> Self {
        Self {
            address: address.into(),
            args,
        }
    }
}

fn padded(len: usize) -> usize {
    (len + 3) & !3
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|&end| end <= self.buf.len());
        let Some(end) = end else {
            return Err(OscQueryError::MalformedWire(format!(
                "need {} bytes at offset {}, buffer is {} bytes",
                n,
                self.pos,
                self.buf.len()
            )));
        };
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Skip padding; a missing tail at the very end of the buffer is tolerated
    fn skip_padding(&mut self, consumed: usize) {
        let pad = padded(consumed) - consumed;
        self.pos = (self.pos + pad).min(self.buf.len());
    }

    fn read_string(&mut self) -> Result<String> {
        let rest = &self.buf[self.pos.min(self.buf.len())..];
        let Some(nul) = rest.iter().position(|&b| b == 0) else {
            return Err(OscQueryError::MalformedWire(format!(
                "unterminated string at offset {}",
                self.pos
            )));
        };
        let value = String::from_utf8_lossy(&rest[..nul]).into_owned();
        self.pos += nul + 1;
        self.skip_padding(nul + 1);
        Ok(value)
    }

    fn read_blob(&mut self) -> Result<Vec<u8>> {
        let size = i32::from_be_bytes(self.take_array()?);
        let size = usize::try_from(size)
            .map_err(|_| OscQueryError::MalformedWire(format!("negative blob size {}", size)))?;
        let payload = self.take(size)?.to_vec();
        self.skip_padding(size);
        Ok(payload)
    }
}

/// Decode one OSC message from a binary frame
///
/// # Errors
///
/// Returns [`OscQueryError::MalformedWire`] when the address does not start
/// with `/`, the type-tag string does not start with `,`, or the buffer ends
/// in the middle of an argument.
pub fn decode_message(bytes: &[u8]) -> Result<OscMessage> {
    let mut reader = Reader::new(bytes);

    let address = reader.read_string()?;
    if !address.starts_with('/') {
        return Err(OscQueryError::MalformedWire(format!(
            "address must start with '/', got {:?}",
            address
        )));
    }

    // Messages without a type-tag string carry no arguments
    let tags = if reader.at_end() {
        String::new()
    } else {
        reader.read_string()?
    };
    if !tags.is_empty() && !tags.starts_with(',') {
        return Err(OscQueryError::MalformedWire(format!(
            "type tags must start with ',', got {:?}",
            tags
        )));
    }

    let mut args = Vec::new();
    for tag in tags.chars().skip(1) {
        match tag {
            'i' => args.push(OscArg::Int(i32::from_be_bytes(reader.take_array()?))),
            'f' => args.push(OscArg::Float(f32::from_be_bytes(reader.take_array()?))),
            's' | 'S' => args.push(OscArg::String(reader.read_string()?)),
            'b' => args.push(OscArg::Blob(reader.read_blob()?)),
            'h' | 't' => {
                let high = i32::from_be_bytes(reader.take_array()?);
                let low = u32::from_be_bytes(reader.take_array()?);
                args.push(OscArg::Int(high));
                args.push(OscArg::UInt(low));
            }
            'd' => args.push(OscArg::Double(f64::from_be_bytes(reader.take_array()?))),
            'c' => {
                let [byte] = reader.take_array::<1>()?;
                args.push(OscArg::Char(char::from(byte)));
            }
            'm' => args.push(OscArg::Midi(reader.take_array()?)),
            'T' => args.push(OscArg::Bool(true)),
            'F' => args.push(OscArg::Bool(false)),
            'N' => args.push(OscArg::Nil),
            'I' => {}
            'r' => args.push(OscArg::Color(Rgba::from_packed(u32::from_be_bytes(
                reader.take_array()?,
            )))),
            other => {
                tracing::warn!("Unknown OSC type tag '{}' in {}, skipping argument", other, address);
            }
        }
    }

    Ok(OscMessage { address, args })
}

fn write_string(buf: &mut Vec<u8>, value: &str) {
    buf.extend_from_slice(value.as_bytes());
    buf.push(0);
    buf.resize(padded(buf.len()), 0);
}

/// Encode a message with type tags inferred from its arguments
///
/// `UInt` arguments are written as `i` with the same bit pattern.
pub fn encode_message(msg: &OscMessage) -> Vec<u8> {
    let mut buf = Vec::new();
    write_string(&mut buf, &msg.address);

    let tags: String = std::iter::once(',').chain(msg.args.iter().map(OscArg::tag)).collect();
    write_string(&mut buf, &tags);

    for arg in &msg.args {
        match arg {
            OscArg::Int(v) => buf.extend_from_slice(&v.to_be_bytes()),
            OscArg::UInt(v) => buf.extend_from_slice(&v.to_be_bytes()),
            OscArg::Float(v) => buf.extend_from_slice(&v.to_be_bytes()),
            OscArg::Double(v) => buf.extend_from_slice(&v.to_be_bytes()),
            OscArg::String(s) => write_string(&mut buf, s),
            OscArg::Blob(bytes) => {
                buf.extend_from_slice(&(bytes.len() as i32).to_be_bytes());
                buf.extend_from_slice(bytes);
                buf.resize(padded(buf.len()), 0);
            }
            // The type table gives `c` a single byte, unpadded
            OscArg::Char(c) => buf.push(u8::try_from(*c).unwrap_or(b'?')),
            OscArg::Midi(bytes) => buf.extend_from_slice(bytes),
            OscArg::Color(c) => buf.extend_from_slice(&c.to_packed().to_be_bytes()),
            OscArg::Bool(_) | OscArg::Nil => {}
        }
    }

    buf
}
