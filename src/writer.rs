//! Sequencing of headers, content and padding into an archive.

use std::fs::File;
use std::io;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::debug;

use crate::constants::END_OF_ARCHIVE_SIZE;
use crate::header::{write_header, HeaderRecord};
use crate::metadata::{EntryAttributes, OwnerResolver, SourceMetadata, SystemOwnerResolver};
use crate::region::Channel;
use crate::utils::{padding_len, write_zeros};
use crate::Result;
use crate::TarError;

/// Room reserved in the archive for a file written later.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub struct Placeholder {
    pub header_start: u64,
    pub content_start: u64,
    pub size: u64,
}

impl Placeholder {
    fn channel(&self) -> Channel {
        Channel::Placeholder {
            header_start: self.header_start,
            start: self.content_start,
            length: self.size,
        }
    }
}

/// Writes an archive into a seekable sink.
///
/// The sink must be empty when the writer is created. Between operations it
/// is always positioned at its end. After [`close`](ArchiveWriter::close)
/// every operation fails with `TarError::ClosedWriter`.
pub struct ArchiveWriter<W: Write + Seek> {
    sink: W,
    placeholders: Vec<Placeholder>,
    resolver: Box<dyn OwnerResolver>,
    closed: bool,
}

impl ArchiveWriter<File> {
    /// Create the archive at `path`, run `body` on it and close it.
    ///
    /// The archive is closed even when `body` fails.
    pub fn create<P, F>(path: P, body: F) -> Result<()>
        where P: AsRef<Path>,
              F: FnOnce(&mut ArchiveWriter<File>) -> Result<()> {
        let file = File::create(path)?;
        ArchiveWriter::scoped(file, body).map(drop)
    }
}

impl<W: Write + Seek> ArchiveWriter<W> {
    /// Writer resolving owner names through the host databases.
    pub fn new(sink: W) -> Result<Self> {
        ArchiveWriter::with_resolver(sink, SystemOwnerResolver)
    }

    pub fn with_resolver<R>(mut sink: W, resolver: R) -> Result<Self>
        where R: OwnerResolver + 'static {
        let end = sink.seek(SeekFrom::End(0))?;
        if end != 0 {
            return Err(TarError::InvalidSink(format!("sink must be empty, found {} bytes", end)));
        }

        Ok(ArchiveWriter {
            sink,
            placeholders: Vec::new(),
            resolver: Box::new(resolver),
            closed: false,
        })
    }

    /// Run `body` on a new writer over `sink` and close it, returning the
    /// sink. The archive is closed even when `body` fails, unless `body`
    /// already closed it.
    pub fn scoped<F>(sink: W, body: F) -> Result<W>
        where F: FnOnce(&mut ArchiveWriter<W>) -> Result<()> {
        let mut writer = ArchiveWriter::new(sink)?;
        let result = body(&mut writer);
        let closed = if writer.closed { Ok(()) } else { writer.close() };
        result.and(closed)?;
        Ok(writer.into_inner())
    }

    /// Append a file whose size is known up front.
    ///
    /// Owner and group names missing from `metadata` are looked up from the
    /// numeric ids. Exactly `metadata.size` bytes are copied from `source`.
    pub fn add_file<N, R>(&mut self, name: N, metadata: &SourceMetadata, source: R) -> Result<()>
        where N: Into<Vec<u8>>,
              R: Read {
        self.append_file(Channel::Unrestricted, name.into(), metadata, source)
    }

    /// Append the file at `path` under `name`.
    pub fn add_file_from_path<N, P>(&mut self, name: N, path: P) -> Result<()>
        where N: Into<Vec<u8>>,
              P: AsRef<Path> {
        self.append_path(Channel::Unrestricted, name.into(), path.as_ref())
    }

    /// Append a file whose content is written by `producer`, returning its
    /// size.
    ///
    /// The header is written twice: once as a reservation before the
    /// content, and once more with the measured size afterwards.
    pub fn add_file_from_stream<N, F>(&mut self, name: N, attributes: &EntryAttributes, producer: F) -> Result<u64>
        where N: Into<Vec<u8>>,
              F: FnOnce(&mut dyn Write) -> io::Result<()> {
        self.append_stream(Channel::Unrestricted, name.into(), attributes, producer)
    }

    /// Reserve room for a file of `file_size` bytes to be written later
    /// with [`with_placeholder`](ArchiveWriter::with_placeholder).
    pub fn add_file_placeholder<N>(&mut self, name: N, file_size: u64) -> Result<usize>
        where N: Into<Vec<u8>> {
        self.reserve(Channel::Unrestricted, name.into(), file_size)
    }

    /// Go back to placeholder `index` and run `body` to fill it.
    ///
    /// Content written by `body` is restricted to the reserved region and
    /// whatever part of it stays unwritten is nulled. The sink is moved back
    /// to its end afterwards, also when `body` fails.
    pub fn with_placeholder<F, T>(&mut self, index: usize, body: F) -> Result<T>
        where F: FnOnce(&mut PlaceholderScope<'_, W>) -> Result<T> {
        self.check_open()?;
        let placeholder = self.placeholder_at(index)?;

        debug!("filling placeholder {} at offset {}", index, placeholder.header_start);
        self.sink.seek(SeekFrom::Start(placeholder.header_start))?;

        let result = body(&mut PlaceholderScope {
            writer: &mut *self,
            channel: placeholder.channel(),
        });
        let restored = self.sink.seek(SeekFrom::End(0));

        let value = result?;
        restored?;
        Ok(value)
    }

    pub fn placeholder(&self, index: usize) -> Option<&Placeholder> {
        self.placeholders.get(index)
    }

    /// Terminate the archive and flush the sink.
    pub fn close(&mut self) -> Result<()> {
        self.check_open()?;

        self.sink.seek(SeekFrom::End(0))?;
        write_zeros(&mut self.sink, END_OF_ARCHIVE_SIZE as u64)?;
        self.sink.flush()?;
        self.closed = true;

        debug!("closed archive with {} placeholders", self.placeholders.len());
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    pub fn into_inner(self) -> W {
        self.sink
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            Err(TarError::ClosedWriter)
        } else {
            Ok(())
        }
    }

    fn placeholder_at(&self, index: usize) -> Result<Placeholder> {
        self.placeholders
            .get(index)
            .copied()
            .ok_or(TarError::PlaceholderNotFound(index))
    }

    fn position(&mut self) -> Result<u64> {
        Ok(self.sink.stream_position()?)
    }

    /// Write `header` at the current position, returning that position.
    /// Nothing is written unless the whole header fits the channel.
    fn write_entry_header(&mut self, channel: Channel, header: &HeaderRecord) -> Result<u64> {
        let position = self.position()?;
        channel.check_header(position, header.encoded_len())?;
        write_header(&mut self.sink, header)?;
        Ok(position)
    }

    /// Pad to the next block boundary, returning the position after it.
    fn write_padding(&mut self) -> Result<u64> {
        let position = self.position()?;
        let padding = padding_len(position);
        write_zeros(&mut self.sink, padding)?;
        Ok(position + padding)
    }

    fn append_file<R: Read>(&mut self, channel: Channel, name: Vec<u8>, metadata: &SourceMetadata, source: R) -> Result<()> {
        self.check_open()?;

        let uname = match &metadata.uname {
            Some(uname) => Some(uname.clone()),
            None => self.resolver.user_name(metadata.uid),
        };
        let gname = match &metadata.gname {
            Some(gname) => Some(gname.clone()),
            None => self.resolver.group_name(metadata.gid),
        };

        let header = HeaderRecord {
            mode: metadata.mode,
            uid: Some(metadata.uid),
            gid: Some(metadata.gid),
            size: metadata.size,
            mtime: metadata.mtime,
            uname,
            gname,
            ..HeaderRecord::new(name)
        };
        self.write_entry_header(channel, &header)?;

        let copied = io::copy(&mut source.take(metadata.size), &mut channel.open(&mut self.sink))?;
        if copied != metadata.size {
            return Err(TarError::SizeMismatch {
                expected: metadata.size,
                actual: copied,
            });
        }

        self.write_padding()?;
        Ok(())
    }

    fn append_path(&mut self, channel: Channel, name: Vec<u8>, path: &Path) -> Result<()> {
        self.check_open()?;

        let file = File::open(path)?;
        let metadata = SourceMetadata::from_fs(&file.metadata()?);
        self.append_file(channel, name, &metadata, file)
    }

    fn append_stream<F>(&mut self, channel: Channel, name: Vec<u8>, attributes: &EntryAttributes, producer: F) -> Result<u64>
        where F: FnOnce(&mut dyn Write) -> io::Result<()> {
        self.check_open()?;

        let header_start = self.write_entry_header(channel, &HeaderRecord::new(name.clone()))?;

        let content_start = self.position()?;
        producer(&mut channel.open(&mut self.sink))?;
        let size = self.position()? - content_start;
        let content_end = self.write_padding()?;

        let header = HeaderRecord {
            mode: attributes.mode(),
            uid: attributes.uid,
            gid: attributes.gid,
            size,
            mtime: attributes.mtime(),
            uname: Some(attributes.uname().to_owned()),
            gname: Some(attributes.gname().to_owned()),
            ..HeaderRecord::new(name)
        };
        self.sink.seek(SeekFrom::Start(header_start))?;
        write_header(&mut self.sink, &header)?;

        match channel {
            Channel::Unrestricted => self.sink.seek(SeekFrom::End(0))?,
            Channel::Placeholder { .. } => self.sink.seek(SeekFrom::Start(content_end))?,
        };

        debug!("streamed {} bytes into entry at offset {}", size, header_start);
        Ok(size)
    }

    fn reserve(&mut self, channel: Channel, name: Vec<u8>, file_size: u64) -> Result<usize> {
        self.check_open()?;

        let header = HeaderRecord {
            size: file_size,
            ..HeaderRecord::new(name)
        };
        let header_start = self.position()?;
        let content_start = header_start + header.encoded_len();
        channel.check(content_start, file_size)?;
        self.write_entry_header(channel, &header)?;
        write_zeros(&mut self.sink, file_size)?;
        self.write_padding()?;

        self.placeholders.push(Placeholder {
            header_start,
            content_start,
            size: file_size,
        });

        let index = self.placeholders.len() - 1;
        debug!("reserved placeholder {} of {} bytes at offset {}", index, file_size, header_start);
        Ok(index)
    }
}

/// Handle passed to the body of a placeholder fill.
///
/// Offers the same ways of adding files as the writer itself, but headers
/// and content are confined to the placeholder's blocks. Content goes
/// through a zero-filling region, so after the first member with content
/// the region is used up.
pub struct PlaceholderScope<'a, W: Write + Seek> {
    writer: &'a mut ArchiveWriter<W>,
    channel: Channel,
}

impl<'a, W: Write + Seek> PlaceholderScope<'a, W> {
    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn add_file<N, R>(&mut self, name: N, metadata: &SourceMetadata, source: R) -> Result<()>
        where N: Into<Vec<u8>>,
              R: Read {
        self.writer.append_file(self.channel, name.into(), metadata, source)
    }

    pub fn add_file_from_path<N, P>(&mut self, name: N, path: P) -> Result<()>
        where N: Into<Vec<u8>>,
              P: AsRef<Path> {
        self.writer.append_path(self.channel, name.into(), path.as_ref())
    }

    pub fn add_file_from_stream<N, F>(&mut self, name: N, attributes: &EntryAttributes, producer: F) -> Result<u64>
        where N: Into<Vec<u8>>,
              F: FnOnce(&mut dyn Write) -> io::Result<()> {
        self.writer.append_stream(self.channel, name.into(), attributes, producer)
    }

    /// Reserve a placeholder inside this one.
    pub fn add_file_placeholder<N>(&mut self, name: N, file_size: u64) -> Result<usize>
        where N: Into<Vec<u8>> {
        self.writer.reserve(self.channel, name.into(), file_size)
    }

    /// Fill a placeholder that lies inside this one. The sink
    /// returns to its current position afterwards.
    pub fn with_placeholder<F, T>(&mut self, index: usize, body: F) -> Result<T>
        where F: FnOnce(&mut PlaceholderScope<'_, W>) -> Result<T> {
        let placeholder = self.writer.placeholder_at(index)?;
        let end = placeholder.content_start + placeholder.size;
        self.channel.check_header(placeholder.header_start, end - placeholder.header_start)?;

        let resume = self.writer.position()?;
        self.writer.sink.seek(SeekFrom::Start(placeholder.header_start))?;

        let result = body(&mut PlaceholderScope {
            writer: &mut *self.writer,
            channel: placeholder.channel(),
        });
        let restored = self.writer.sink.seek(SeekFrom::Start(resume));

        let value = result?;
        restored?;
        Ok(value)
    }
}
