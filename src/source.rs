// Copyright (C) 2026 Brian Johnson
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Readable byte stream of known total length
pub trait Source: Read + Send {
    fn length(&self) -> u64;

    /// Name the stream was opened under, used when no destination name is given
    fn name(&self) -> Option<&str>;
}

/// A file opened for sending
#[derive(Debug)]
pub struct FileSource {
    file: File,
    len: u64,
    name: Option<String>,
}

impl FileSource {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let metadata = file.metadata()?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Not a regular file: {}", path.display()),
            ));
        }

        Ok(FileSource {
            file,
            len: metadata.len(),
            name: file_name(path),
        })
    }
}

impl Read for FileSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Source for FileSource {
    fn length(&self) -> u64 {
        self.len
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// Final path component, if it is valid UTF-8
pub fn file_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
}

// ============================================================================
// In-memory Source for Testing
// ============================================================================

#[cfg(test)]
pub struct MemorySource {
    data: io::Cursor<Vec<u8>>,
    name: Option<String>,
    length: u64,
}

#[cfg(test)]
impl MemorySource {
    pub fn new(data: Vec<u8>, name: Option<&str>) -> Self {
        MemorySource {
            length: data.len() as u64,
            data: io::Cursor::new(data),
            name: name.map(str::to_string),
        }
    }

    /// Overrides the advertised length, leaving the content as is
    pub fn with_length(mut self, length: u64) -> Self {
        self.length = length;
        self
    }
}

#[cfg(test)]
impl Read for MemorySource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.data.read(buf)
    }
}

#[cfg(test)]
impl Source for MemorySource {
    fn length(&self) -> u64 {
        self.length
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_file_source_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::File::create(&path).unwrap().write_all(b"hello world").unwrap();

        let mut source = FileSource::open(&path).unwrap();
        assert_eq!(source.length(), 11);
        assert_eq!(source.name(), Some("hello.txt"));

        let mut content = Vec::new();
        source.read_to_end(&mut content).unwrap();
        assert_eq!(content, b"hello world");
    }

    #[test]
    fn test_file_source_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileSource::open(&dir.path().join("missing.bin")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_file_source_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FileSource::open(dir.path()).is_err());
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name(Path::new("/path/to/file.txt")).as_deref(), Some("file.txt"));
        assert_eq!(file_name(Path::new("readme")).as_deref(), Some("readme"));
        assert_eq!(file_name(Path::new("/")), None);
    }
}
