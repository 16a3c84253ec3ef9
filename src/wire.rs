//! Binary cursor readers and the outbound event writer
//!
//! Commands arrive little-endian. Readers borrow the message buffer; spans
//! they return are views into it. Outbound event words go out in network
//! order.

use crate::error::ProtocolError;

/// Positional cursor over one inbound message
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Resume reading a partially consumed message
    pub fn at(data: &'a [u8], pos: usize) -> Self {
        Self {
            data,
            pos: pos.min(data.len()),
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Move the cursor back to a position previously returned by `position`
    pub fn rewind(&mut self, pos: usize) {
        self.pos = pos.min(self.data.len());
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        if self.remaining() < n {
            return Err(ProtocolError::Overrun {
                offset: self.pos,
                wanted: n,
                available: self.remaining(),
            });
        }
        let span = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(span)
    }

    pub fn u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take(1)?[0])
    }

    pub fn bool(&mut self) -> Result<bool, ProtocolError> {
        Ok(self.u8()? != 0)
    }

    pub fn u16(&mut self) -> Result<u16, ProtocolError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn i16(&mut self) -> Result<i16, ProtocolError> {
        let b = self.take(2)?;
        Ok(i16::from_le_bytes([b[0], b[1]]))
    }

    pub fn u32(&mut self) -> Result<u32, ProtocolError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// `u32` byte length followed by that many bytes
    pub fn bytes(&mut self) -> Result<&'a [u8], ProtocolError> {
        let len = self.u32()? as usize;
        self.take(len)
    }

    /// `u32` word count followed by that many 32-bit words
    pub fn node_stream(&mut self) -> Result<NodeReader<'a>, ProtocolError> {
        let words = self.u32()? as usize;
        let len = words.checked_mul(4).ok_or(ProtocolError::Overrun {
            offset: self.pos,
            wanted: usize::MAX,
            available: self.remaining(),
        })?;
        Ok(NodeReader::new(self.take(len)?))
    }
}

/// Word cursor over a node-operation sub-stream
#[derive(Debug, Clone)]
pub struct NodeReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> NodeReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn len_words(&self) -> usize {
        self.data.len() / 4
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        let available = self.data.len() - self.pos;
        if available < n {
            return Err(ProtocolError::Overrun {
                offset: self.pos,
                wanted: n,
                available,
            });
        }
        let span = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(span)
    }

    pub fn u32(&mut self) -> Result<u32, ProtocolError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn f32(&mut self) -> Result<f32, ProtocolError> {
        Ok(f32::from_bits(self.u32()?))
    }

    /// Byte length, then the bytes padded up to a whole word
    pub fn string(&mut self) -> Result<String, ProtocolError> {
        let len = self.u32()? as usize;
        let padded = len.div_ceil(4) * 4;
        let raw = self.take(padded)?;
        Ok(String::from_utf8_lossy(&raw[..len]).into_owned())
    }
}

/// Builds one outbound event record
#[derive(Debug, Default)]
pub struct EventWriter {
    buf: Vec<u8>,
}

impl EventWriter {
    /// Starts a record with its `type, serial, time` header
    pub fn new(kind: u8, serial: u32, time: u32) -> Self {
        let mut w = Self {
            buf: Vec::with_capacity(48),
        };
        w.put_u32(kind as u32);
        w.put_u32(serial);
        w.put_u32(time);
        w
    }

    pub fn put_u32(&mut self, v: u32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn put_i32(&mut self, v: i32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}
