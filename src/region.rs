//! Write-only views over the archive sink handed to content producers.
//!
//! None of these expose seeking or closing, so a producer can only append
//! bytes at the position the writer chose for it.

use std::fmt;
use std::io;
use std::io::Seek;
use std::io::Write;

use crate::utils::write_zeros;
use crate::Result;
use crate::TarError;

/// Passes writes straight through to the sink.
pub struct UnrestrictedWriteRegion<'a, W: Write> {
    sink: &'a mut W,
}

impl<'a, W: Write> UnrestrictedWriteRegion<'a, W> {
    pub fn new(sink: &'a mut W) -> Self {
        UnrestrictedWriteRegion { sink }
    }
}

impl<'a, W: Write> Write for UnrestrictedWriteRegion<'a, W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.sink.write(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}

/// Restricts writes to the absolute byte range `[start, end)` of the sink.
///
/// Every write is checked as a whole: either all of `data` lands inside the
/// range or nothing is written and `TarError::WriteOutOfRange` is returned.
/// The zero-filling variant nulls the rest of the range after each write,
/// which leaves the sink at `end`, so a second write fails unless the sink
/// is moved back into the range first.
pub struct BoundedWriteRegion<'a, W: Write + Seek> {
    sink: &'a mut W,
    start: u64,
    end: u64,
    zero_fill: bool,
}

impl<'a, W: Write + Seek> BoundedWriteRegion<'a, W> {
    pub fn new(sink: &'a mut W, start: u64, length: u64) -> Self {
        BoundedWriteRegion {
            sink,
            start,
            end: start + length,
            zero_fill: false,
        }
    }

    pub fn zero_filling(sink: &'a mut W, start: u64, length: u64) -> Self {
        BoundedWriteRegion {
            zero_fill: true,
            ..BoundedWriteRegion::new(sink, start, length)
        }
    }

    fn write_bounded(&mut self, data: &[u8]) -> Result<()> {
        let position = self.sink.stream_position()?;
        let len = data.len() as u64;
        check_range(position, len, self.start, self.end)?;

        self.sink.write_all(data)?;

        if self.zero_fill {
            let position = position + len;
            if position <= self.end {
                write_zeros(&mut *self.sink, self.end - position)?;
            }
        }

        Ok(())
    }
}

impl<'a, W: Write + Seek> Write for BoundedWriteRegion<'a, W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.write_bounded(data)?;
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}

impl<'a, W: Write + Seek> fmt::Debug for BoundedWriteRegion<'a, W> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("BoundedWriteRegion")
            .field("start", &self.start)
            .field("end", &self.end)
            .field("zero_fill", &self.zero_fill)
            .finish()
    }
}

/// Where the headers and content of an entry may go.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum Channel {
    /// Anywhere; the normal case of appending to the archive.
    Unrestricted,
    /// Inside a placeholder. Headers may start at `header_start`, content
    /// is confined to `[start, start + length)`.
    Placeholder { header_start: u64, start: u64, length: u64 },
}

impl Channel {
    pub fn open<W: Write + Seek>(self, sink: &mut W) -> ContentChannel<'_, W> {
        match self {
            Channel::Unrestricted => ContentChannel::Unrestricted(UnrestrictedWriteRegion::new(sink)),
            Channel::Placeholder { start, length, .. } => {
                ContentChannel::Bounded(BoundedWriteRegion::zero_filling(sink, start, length))
            }
        }
    }

    /// Fail unless `[position, position + len)` lies inside the content
    /// region of this channel.
    pub fn check(self, position: u64, len: u64) -> Result<()> {
        match self {
            Channel::Unrestricted => Ok(()),
            Channel::Placeholder { start, length, .. } => check_range(position, len, start, start + length),
        }
    }

    /// Fail unless `len` header bytes written at `position` stay inside the
    /// placeholder, counting its own header blocks.
    pub fn check_header(self, position: u64, len: u64) -> Result<()> {
        match self {
            Channel::Unrestricted => Ok(()),
            Channel::Placeholder { header_start, start, length } => {
                check_range(position, len, header_start, start + length)
            }
        }
    }
}

fn check_range(position: u64, len: u64, start: u64, end: u64) -> Result<()> {
    if position < start || position + len > end {
        Err(TarError::WriteOutOfRange { position, len, start, end })
    } else {
        Ok(())
    }
}

/// The region content is currently written through.
pub enum ContentChannel<'a, W: Write + Seek> {
    Unrestricted(UnrestrictedWriteRegion<'a, W>),
    Bounded(BoundedWriteRegion<'a, W>),
}

impl<'a, W: Write + Seek> Write for ContentChannel<'a, W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        match self {
            ContentChannel::Unrestricted(region) => region.write(data),
            ContentChannel::Bounded(region) => region.write(data),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            ContentChannel::Unrestricted(region) => region.flush(),
            ContentChannel::Bounded(region) => region.flush(),
        }
    }
}
