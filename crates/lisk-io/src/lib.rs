//! lisk-io - Unified input/output ports.
//!
//! A `Port` is a byte-oriented reader or writer over one of three backings:
//! a real file (including the process standard streams), an owned byte
//! buffer, or a null sink that discards everything. Ports carry one byte of
//! pushback, sticky EOF and error flags, and two advisory flags (`color`,
//! `pretty`) that the printer consults when serializing values.
//!
//! A port is never both input and output; its direction is fixed at
//! construction. Closing a port is idempotent and never closes the process
//! standard streams.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use thiserror::Error;

/// Error type for port operations that cannot be reported through the
/// sticky `error` flag alone.
#[derive(Debug, Error)]
pub enum PortError {
    /// Seek was attempted on a backing that does not support it.
    #[error("port does not support seeking")]
    Unseekable,

    /// The port has been closed and its contents are no longer valid.
    #[error("port is closed")]
    Closed,

    /// The operation was attempted against the wrong port direction.
    #[error("wrong port direction: expected {expected}")]
    Direction { expected: &'static str },

    /// An underlying OS-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for port operations.
pub type PortResult<T> = std::result::Result<T, PortError>;

/// Direction of a port. A port is exactly one of the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Bytes flow from the port to the caller.
    In,
    /// Bytes flow from the caller to the port.
    Out,
}

/// Origin for [`Port::seek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    /// Absolute offset from the start.
    Set,
    /// Relative to the current position.
    Cur,
    /// Offset back from the end.
    End,
}

/// A file-like stream. The standard streams are distinguished so that
/// `close` can leave them alone.
enum FileStream {
    Stdin,
    Stdout,
    Stderr,
    Handle(File),
}

impl FileStream {
    fn is_standard(&self) -> bool {
        !matches!(self, FileStream::Handle(_))
    }
}

/// Storage behind a port.
enum Backing {
    /// A real file or standard stream.
    File(FileStream),
    /// An owned, growable byte buffer.
    Bytes(Vec<u8>),
    /// Discards writes, yields EOF on reads.
    Null,
}

/// A unified reader/writer over files, owned byte buffers, and a null sink.
///
/// See the module documentation for the overall contract. All operations
/// are byte-oriented; the port performs no character decoding of any kind.
pub struct Port {
    backing: Backing,
    role: Direction,
    /// Current byte position. Only meaningful for byte-buffer backings;
    /// file backings delegate position tracking to the OS.
    position: usize,
    /// One byte of pushback, consumed before the backing is touched.
    ungetc: Option<u8>,
    eof: bool,
    error: bool,
    /// Advisory: the printer emits ANSI escapes when set.
    pub color: bool,
    /// Advisory: the printer indents nested lists when set.
    pub pretty: bool,
    closed: bool,
}

impl Port {
    fn new(backing: Backing, role: Direction) -> Self {
        Port {
            backing,
            role,
            position: 0,
            ungetc: None,
            eof: false,
            error: false,
            color: false,
            pretty: false,
            closed: false,
        }
    }

    /// An input port over the process standard input.
    pub fn standard_input() -> Self {
        Port::new(Backing::File(FileStream::Stdin), Direction::In)
    }

    /// An output port over the process standard output.
    pub fn standard_output() -> Self {
        Port::new(Backing::File(FileStream::Stdout), Direction::Out)
    }

    /// An output port over the process standard error.
    pub fn standard_error() -> Self {
        Port::new(Backing::File(FileStream::Stderr), Direction::Out)
    }

    /// An input port over an open file handle.
    pub fn file_input(file: File) -> Self {
        Port::new(Backing::File(FileStream::Handle(file)), Direction::In)
    }

    /// An output port over an open file handle.
    pub fn file_output(file: File) -> Self {
        Port::new(Backing::File(FileStream::Handle(file)), Direction::Out)
    }

    /// An input port reading from an owned copy of `bytes`.
    pub fn string_input(bytes: impl Into<Vec<u8>>) -> Self {
        Port::new(Backing::Bytes(bytes.into()), Direction::In)
    }

    /// An output port accumulating into an owned byte buffer, retrievable
    /// with [`Port::string_contents`].
    pub fn string_output() -> Self {
        Port::new(Backing::Bytes(Vec::new()), Direction::Out)
    }

    /// An output port that discards everything and reports success.
    pub fn null_output() -> Self {
        Port::new(Backing::Null, Direction::Out)
    }

    /// True if this is an input port. A closed port is neither input nor
    /// output.
    pub fn is_in(&self) -> bool {
        !self.closed && self.role == Direction::In
    }

    /// True if this is an output port.
    pub fn is_out(&self) -> bool {
        !self.closed && self.role == Direction::Out
    }

    /// True for file and standard-stream backings.
    pub fn is_file(&self) -> bool {
        !self.closed && matches!(self.backing, Backing::File(_))
    }

    /// True for owned-byte-buffer backings.
    pub fn is_string(&self) -> bool {
        !self.closed && matches!(self.backing, Backing::Bytes(_))
    }

    /// True for the null sink.
    pub fn is_null(&self) -> bool {
        !self.closed && matches!(self.backing, Backing::Null)
    }

    /// True once [`Port::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Sticky end-of-file flag, set by the first read past the end.
    pub fn eof(&self) -> bool {
        self.eof
    }

    /// Sticky error flag, set by failed operations such as a double
    /// pushback or an OS write failure.
    pub fn error(&self) -> bool {
        self.error
    }

    /// Clears the sticky EOF and error flags.
    pub fn clear_flags(&mut self) {
        self.eof = false;
        self.error = false;
    }

    /// Reads one byte. Returns `None` at end of input (and sets the EOF
    /// flag). The pushback byte, if any, is consumed first.
    pub fn getc(&mut self) -> Option<u8> {
        if self.closed {
            self.error = true;
            return None;
        }
        if self.role != Direction::In {
            self.error = true;
            return None;
        }
        if let Some(b) = self.ungetc.take() {
            return Some(b);
        }
        match &mut self.backing {
            Backing::File(stream) => {
                let mut buf = [0u8; 1];
                let n = match stream {
                    FileStream::Stdin => std::io::stdin().lock().read(&mut buf),
                    FileStream::Handle(f) => f.read(&mut buf),
                    _ => Ok(0),
                };
                match n {
                    Ok(1) => Some(buf[0]),
                    Ok(_) => {
                        self.eof = true;
                        None
                    }
                    Err(_) => {
                        self.eof = true;
                        self.error = true;
                        None
                    }
                }
            }
            Backing::Bytes(buf) => {
                if self.position < buf.len() {
                    let b = buf[self.position];
                    self.position += 1;
                    Some(b)
                } else {
                    self.eof = true;
                    None
                }
            }
            Backing::Null => {
                self.eof = true;
                None
            }
        }
    }

    /// Pushes one byte back so the next [`Port::getc`] returns it. A second
    /// pushback without an intervening read sets the error flag and fails.
    pub fn ungetc(&mut self, byte: u8) -> bool {
        if self.closed || self.ungetc.is_some() {
            self.error = true;
            return false;
        }
        self.ungetc = Some(byte);
        true
    }

    /// Writes one byte. Byte buffers grow as needed; the null sink
    /// discards and reports success. Returns false on failure and sets the
    /// error flag.
    pub fn putc(&mut self, byte: u8) -> bool {
        self.write_all(&[byte])
    }

    /// Writes a run of bytes with [`Port::putc`] semantics.
    pub fn puts(&mut self, bytes: &[u8]) -> bool {
        self.write_all(bytes)
    }

    fn write_all(&mut self, bytes: &[u8]) -> bool {
        if self.closed || self.role != Direction::Out {
            self.error = true;
            return false;
        }
        match &mut self.backing {
            Backing::File(stream) => {
                let r = match stream {
                    FileStream::Stdout => std::io::stdout().lock().write_all(bytes),
                    FileStream::Stderr => std::io::stderr().lock().write_all(bytes),
                    FileStream::Handle(f) => f.write_all(bytes),
                    FileStream::Stdin => {
                        self.error = true;
                        return false;
                    }
                };
                if r.is_err() {
                    self.error = true;
                    return false;
                }
                true
            }
            Backing::Bytes(buf) => {
                // Writes may land mid-buffer after a seek; overwrite then
                // extend.
                for &b in bytes {
                    if self.position < buf.len() {
                        buf[self.position] = b;
                    } else {
                        buf.push(b);
                    }
                    self.position += 1;
                }
                true
            }
            Backing::Null => true,
        }
    }

    /// Block read into `buf`; returns the number of bytes read.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let mut n = 0;
        while n < buf.len() {
            match self.getc() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        n
    }

    /// Block write from `buf`; returns the number of bytes written (all or
    /// nothing for byte buffers and files).
    pub fn write(&mut self, buf: &[u8]) -> usize {
        if self.write_all(buf) {
            buf.len()
        } else {
            0
        }
    }

    /// Reads until `delim` or EOF. The returned bytes never contain the
    /// delimiter. Returns `None` iff no bytes were read and EOF was
    /// reached.
    pub fn getdelim(&mut self, delim: u8) -> Option<Vec<u8>> {
        let mut out = Vec::new();
        loop {
            match self.getc() {
                Some(b) if b == delim => return Some(out),
                Some(b) => out.push(b),
                None => {
                    if out.is_empty() {
                        return None;
                    }
                    return Some(out);
                }
            }
        }
    }

    /// Reads one `\n`-terminated line, without the terminator.
    pub fn getline(&mut self) -> Option<Vec<u8>> {
        self.getdelim(b'\n')
    }

    /// Repositions the port. File backings delegate to the OS; byte
    /// buffers clamp the resulting position to `[0, limit]`; the null sink
    /// does not seek. Discards any pending pushback.
    pub fn seek(&mut self, offset: i64, whence: Whence) -> PortResult<usize> {
        if self.closed {
            return Err(PortError::Closed);
        }
        self.ungetc = None;
        self.eof = false;
        match &mut self.backing {
            Backing::File(FileStream::Handle(f)) => {
                let pos = match whence {
                    Whence::Set => f.seek(SeekFrom::Start(offset.max(0) as u64)),
                    Whence::Cur => f.seek(SeekFrom::Current(offset)),
                    Whence::End => f.seek(SeekFrom::End(-offset)),
                }?;
                Ok(pos as usize)
            }
            Backing::File(_) => Err(PortError::Unseekable),
            Backing::Bytes(buf) => {
                let limit = buf.len() as i64;
                let target = match whence {
                    Whence::Set => offset,
                    Whence::Cur => self.position as i64 + offset,
                    Whence::End => limit - offset,
                };
                self.position = target.clamp(0, limit) as usize;
                Ok(self.position)
            }
            Backing::Null => Err(PortError::Unseekable),
        }
    }

    /// Current byte position for byte buffers and files.
    pub fn tell(&mut self) -> PortResult<usize> {
        match &mut self.backing {
            Backing::File(FileStream::Handle(f)) => Ok(f.stream_position()? as usize),
            Backing::Bytes(_) => Ok(self.position),
            _ => Err(PortError::Unseekable),
        }
    }

    /// Flushes buffered OS output, if any.
    pub fn flush(&mut self) {
        if let Backing::File(stream) = &mut self.backing {
            let _ = match stream {
                FileStream::Stdout => std::io::stdout().lock().flush(),
                FileStream::Stderr => std::io::stderr().lock().flush(),
                FileStream::Handle(f) => f.flush(),
                FileStream::Stdin => Ok(()),
            };
        }
    }

    /// The current contents of a byte-buffer port. Subsequent writes may
    /// reallocate the buffer, so the slice must not be held across one.
    pub fn string_contents(&self) -> Option<&[u8]> {
        if self.closed {
            return None;
        }
        match &self.backing {
            Backing::Bytes(buf) => Some(buf),
            _ => None,
        }
    }

    /// Closes the port, releasing the file handle or byte buffer. The
    /// process standard streams are never closed. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.flush();
        let release = match &self.backing {
            Backing::File(stream) => !stream.is_standard(),
            Backing::Bytes(_) => true,
            Backing::Null => false,
        };
        if release {
            // Dropping the old backing closes the OS file or frees the
            // buffer.
            self.backing = Backing::Null;
        }
        self.closed = true;
    }
}

impl Drop for Port {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Port {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let backing = match self.backing {
            Backing::File(_) => "file",
            Backing::Bytes(_) => "string",
            Backing::Null => "null",
        };
        f.debug_struct("Port")
            .field("backing", &backing)
            .field("role", &self.role)
            .field("position", &self.position)
            .field("eof", &self.eof)
            .field("error", &self.error)
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn string_input_reads_bytes_then_eof() {
        let mut p = Port::string_input("ab");
        assert_eq!(p.getc(), Some(b'a'));
        assert_eq!(p.getc(), Some(b'b'));
        assert!(!p.eof());
        assert_eq!(p.getc(), None);
        assert!(p.eof());
    }

    #[test]
    fn ungetc_single_pushback() {
        let mut p = Port::string_input("xy");
        assert_eq!(p.getc(), Some(b'x'));
        assert!(p.ungetc(b'x'));
        assert_eq!(p.getc(), Some(b'x'));
        assert_eq!(p.getc(), Some(b'y'));
    }

    #[test]
    fn ungetc_double_pushback_fails() {
        let mut p = Port::string_input("a");
        assert!(p.ungetc(b'z'));
        assert!(!p.ungetc(b'q'));
        assert!(p.error());
        // The first pushback is still there.
        assert_eq!(p.getc(), Some(b'z'));
    }

    #[test]
    fn string_output_accumulates() {
        let mut p = Port::string_output();
        assert!(p.putc(b'h'));
        assert!(p.puts(b"ello"));
        assert_eq!(p.string_contents(), Some(b"hello".as_ref()));
    }

    #[test]
    fn string_output_overwrites_after_seek() {
        let mut p = Port::string_output();
        p.puts(b"abcdef");
        p.seek(1, Whence::Set).unwrap();
        p.puts(b"XY");
        assert_eq!(p.string_contents(), Some(b"aXYdef".as_ref()));
    }

    #[test]
    fn null_output_discards_and_succeeds() {
        let mut p = Port::null_output();
        assert!(p.putc(b'x'));
        assert!(p.puts(b"anything"));
        assert!(p.is_null());
        assert_eq!(p.string_contents(), None);
    }

    #[test]
    fn write_to_input_port_fails() {
        let mut p = Port::string_input("data");
        assert!(!p.putc(b'x'));
        assert!(p.error());
    }

    #[test]
    fn read_from_output_port_fails() {
        let mut p = Port::string_output();
        assert_eq!(p.getc(), None);
        assert!(p.error());
    }

    #[test]
    fn getdelim_stops_at_delimiter() {
        let mut p = Port::string_input("one\ntwo");
        assert_eq!(p.getdelim(b'\n'), Some(b"one".to_vec()));
        assert_eq!(p.getdelim(b'\n'), Some(b"two".to_vec()));
        assert_eq!(p.getdelim(b'\n'), None);
    }

    #[test]
    fn getdelim_absent_only_on_empty_eof() {
        let mut p = Port::string_input("");
        assert_eq!(p.getdelim(b'\n'), None);
        let mut p = Port::string_input("x");
        assert_eq!(p.getdelim(b'\n'), Some(b"x".to_vec()));
    }

    #[test]
    fn seek_clamps_on_byte_buffers() {
        let mut p = Port::string_input("hello");
        assert_eq!(p.seek(100, Whence::Set).unwrap(), 5);
        assert_eq!(p.seek(-3, Whence::Cur).unwrap(), 2);
        assert_eq!(p.getc(), Some(b'l'));
        assert_eq!(p.seek(2, Whence::End).unwrap(), 3);
        assert_eq!(p.getc(), Some(b'l'));
    }

    #[test]
    fn seek_clears_eof() {
        let mut p = Port::string_input("a");
        assert_eq!(p.getc(), Some(b'a'));
        assert_eq!(p.getc(), None);
        assert!(p.eof());
        p.seek(0, Whence::Set).unwrap();
        assert_eq!(p.getc(), Some(b'a'));
    }

    #[test]
    fn null_sink_does_not_seek() {
        let mut p = Port::null_output();
        assert!(matches!(p.seek(0, Whence::Set), Err(PortError::Unseekable)));
    }

    #[test]
    fn close_is_idempotent_and_invalidates() {
        let mut p = Port::string_input("abc");
        p.close();
        p.close();
        assert!(p.is_closed());
        assert!(!p.is_in());
        assert!(!p.is_string());
        assert_eq!(p.getc(), None);
        assert!(p.error());
    }

    #[test]
    fn file_roundtrip_putc_seek_getc() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"").unwrap();
        let path = tmp.path().to_path_buf();

        let out = std::fs::OpenOptions::new()
            .write(true)
            .open(&path)
            .unwrap();
        let mut w = Port::file_output(out);
        assert!(w.putc(b'Q'));
        w.close();

        let mut r = Port::file_input(std::fs::File::open(&path).unwrap());
        assert!(r.is_file());
        assert_eq!(r.getc(), Some(b'Q'));
        assert_eq!(r.getc(), None);
        r.seek(0, Whence::Set).unwrap();
        assert_eq!(r.getc(), Some(b'Q'));
    }

    #[test]
    fn block_read_and_write() {
        let mut out = Port::string_output();
        assert_eq!(out.write(b"12345"), 5);
        let data = out.string_contents().unwrap().to_vec();

        let mut inp = Port::string_input(data);
        let mut buf = [0u8; 3];
        assert_eq!(inp.read(&mut buf), 3);
        assert_eq!(&buf, b"123");
        assert_eq!(inp.read(&mut buf), 2);
        assert_eq!(&buf[..2], b"45");
    }

    #[test]
    fn direction_predicates() {
        let p = Port::string_input("x");
        assert!(p.is_in() && !p.is_out());
        let q = Port::string_output();
        assert!(q.is_out() && !q.is_in());
        let n = Port::null_output();
        assert!(n.is_out() && n.is_null() && !n.is_file() && !n.is_string());
    }
}
