//! The byte emitter.
//!
//! Owns an output buffer and an offset counter. The buffer may be drained
//! (or cleared) at any point; the offset keeps accumulating, so it always
//! reflects the absolute position within the emitted stream.
//!
//! Argument emission follows the target datatype encoding: a leading
//! datatype byte followed by a little-endian payload. The only exception is
//! the null byte terminating variable-length argument lists.

/// Datatype byte preceding a 32-bit integer argument.
const DATATYPE_I32: u8 = 0x01;
/// Datatype byte preceding a global variable offset.
const DATATYPE_VAR: u8 = 0x02;
/// Datatype byte preceding a local variable index.
const DATATYPE_LVAR: u8 = 0x03;
/// Datatype byte preceding an 8-bit integer argument.
const DATATYPE_I8: u8 = 0x04;
/// Datatype byte preceding a 16-bit integer argument.
const DATATYPE_I16: u8 = 0x05;
/// Datatype byte preceding a Q11.4 fixed-point argument.
const DATATYPE_Q11_4: u8 = 0x06;

/// Emits little-endian bytecode. See the module docs.
#[derive(Debug, Default)]
pub struct CodeEmitter {
    buffer: Vec<u8>,
    offset: u32,
}

impl CodeEmitter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an emitter with an internal buffer of the given capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            offset: 0,
        }
    }

    /// The absolute offset of the next emitted byte.
    #[must_use]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    #[must_use]
    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }

    #[must_use]
    pub fn buffer_capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn buffer_reserve(&mut self, capacity: usize) {
        if capacity > self.buffer.capacity() {
            self.buffer.reserve(capacity - self.buffer.len());
        }
    }

    /// Discards the buffered bytes. The offset is unaffected.
    pub fn buffer_clear(&mut self) {
        self.buffer.clear();
    }

    /// Moves the buffered bytes into `output`. The offset is unaffected.
    pub fn drain(&mut self, output: &mut Vec<u8>) -> &mut Self {
        output.append(&mut self.buffer);
        self
    }

    /// Emits a 16-bit opcode, setting its high bit when `not_flag` is set.
    pub fn emit_opcode(&mut self, opcode: u16, not_flag: bool) -> &mut Self {
        let opcode = if not_flag { opcode | 0x8000 } else { opcode };
        self.emit_raw_u16(opcode)
    }

    /// Emits the null byte that terminates a variable argument list.
    pub fn emit_eoal(&mut self) -> &mut Self {
        self.emit_raw_byte(0)
    }

    /// Emits an integer argument in the smallest width that holds it.
    pub fn emit_int(&mut self, value: i32) -> &mut Self {
        if let Ok(value) = i8::try_from(value) {
            self.emit_i8(value)
        } else if let Ok(value) = i16::try_from(value) {
            self.emit_i16(value)
        } else {
            self.emit_i32(value)
        }
    }

    pub fn emit_i8(&mut self, value: i8) -> &mut Self {
        self.emit_raw_byte(DATATYPE_I8).emit_raw_i8(value)
    }

    pub fn emit_i16(&mut self, value: i16) -> &mut Self {
        self.emit_raw_byte(DATATYPE_I16).emit_raw_i16(value)
    }

    pub fn emit_i32(&mut self, value: i32) -> &mut Self {
        self.emit_raw_byte(DATATYPE_I32).emit_raw_i32(value)
    }

    /// Emits a floating-point argument as Q11.4 fixed-point.
    ///
    /// The value saturates to the representable range and rounds toward
    /// zero at sub-resolution.
    pub fn emit_q11_4(&mut self, value: f32) -> &mut Self {
        // A float-to-int cast truncates toward zero and saturates, which is
        // exactly the fixed-point conversion required.
        let fixed = (value * 16.0) as i32;
        let fixed = fixed.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
        self.emit_raw_byte(DATATYPE_Q11_4).emit_raw_i16(fixed)
    }

    /// Emits a global variable reference given its byte offset.
    pub fn emit_var(&mut self, offset: u16) -> &mut Self {
        self.emit_raw_byte(DATATYPE_VAR).emit_raw_u16(offset)
    }

    /// Emits a local variable reference given its index.
    pub fn emit_lvar(&mut self, index: u16) -> &mut Self {
        self.emit_raw_byte(DATATYPE_LVAR).emit_raw_u16(index)
    }

    pub fn emit_raw_byte(&mut self, byte: u8) -> &mut Self {
        self.buffer.push(byte);
        self.offset += 1;
        self
    }

    pub fn emit_raw_u8(&mut self, value: u8) -> &mut Self {
        self.emit_raw_byte(value)
    }

    pub fn emit_raw_i8(&mut self, value: i8) -> &mut Self {
        self.emit_raw_byte(value as u8)
    }

    pub fn emit_raw_u16(&mut self, value: u16) -> &mut Self {
        self.emit_raw_bytes(&value.to_le_bytes(), 2)
    }

    pub fn emit_raw_i16(&mut self, value: i16) -> &mut Self {
        self.emit_raw_bytes(&value.to_le_bytes(), 2)
    }

    pub fn emit_raw_u32(&mut self, value: u32) -> &mut Self {
        self.emit_raw_bytes(&value.to_le_bytes(), 4)
    }

    pub fn emit_raw_i32(&mut self, value: i32) -> &mut Self {
        self.emit_raw_bytes(&value.to_le_bytes(), 4)
    }

    /// Emits raw bytes, zero-padded (or truncated) to `output_size`.
    pub fn emit_raw_bytes(&mut self, bytes: &[u8], output_size: usize) -> &mut Self {
        let copied = bytes.len().min(output_size);
        self.buffer.extend_from_slice(&bytes[..copied]);
        self.buffer.resize(self.buffer.len() + (output_size - copied), 0);
        self.offset += u32::try_from(output_size).expect("output size out of range");
        self
    }
}
