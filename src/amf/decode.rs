// AMF decoder utilities

/// Cursor over a buffer being decoded
pub struct AMFDecodingCursor<'a> {
    /// Buffer being decoded
    buffer: &'a [u8],

    /// Current position
    pos: usize,
}

impl<'a> AMFDecodingCursor<'a> {
    /// Creates new cursor for a buffer
    pub fn new(buffer: &'a [u8]) -> AMFDecodingCursor<'a> {
        AMFDecodingCursor { buffer, pos: 0 }
    }

    /// Number of bytes not consumed yet
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.pos)
    }

    /// Reads n bytes
    /// Errors on buffer overflow
    pub fn read(&mut self, n: usize) -> Result<&'a [u8], ()> {
        let r = self.look(n)?;
        self.pos += n;
        Ok(r)
    }

    /// Reads a single byte
    pub fn read_byte(&mut self) -> Result<u8, ()> {
        Ok(self.read(1)?[0])
    }

    /// Reads n bytes without moving the cursor
    pub fn look(&self, n: usize) -> Result<&'a [u8], ()> {
        if n > self.remaining() {
            return Err(());
        }

        Ok(&self.buffer[self.pos..self.pos + n])
    }

    /// Looks at the next byte without moving the cursor
    pub fn look_byte(&self) -> Result<u8, ()> {
        Ok(self.look(1)?[0])
    }

    /// Skips n bytes
    pub fn skip(&mut self, n: usize) -> Result<(), ()> {
        self.read(n).map(|_| ())
    }

    /// Returns true if the cursor is at the end
    pub fn ended(&self) -> bool {
        self.remaining() == 0
    }
}
