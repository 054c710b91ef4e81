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

//! Wire protocol constants and frame layout

use crate::crc::checksum;
use crate::sender::SendError;

/// Maximum payload bytes carried by one data chunk
pub const CHUNK_SIZE: usize = 1024;

/// Trailing checksum appended to every frame
pub const CHECKSUM_LEN: usize = 2;

/// Name field, excluding the terminator byte that always follows it
pub const NAME_FIELD_LEN: usize = 12;

/// Name field, terminator, 32-bit length and checksum
pub const HEADER_LEN: usize = NAME_FIELD_LEN + 1 + 4 + CHECKSUM_LEN;

const LENGTH_OFFSET: usize = NAME_FIELD_LEN + 1;

/// Longest base name allowed by the peer's 8.3 file system
pub const MAX_BASE_LEN: usize = 8;

/// Longest extension, leading dot included
pub const MAX_EXTENSION_LEN: usize = 4;

/// Resends allowed for one frame after checksum errors
pub const MAX_RETRIES: u32 = 5;

/// Ack - frame accepted
pub const ACK_OK: u8 = 0;

/// Ack - checksum mismatch, resend the same frame
pub const ACK_CHECKSUM_ERROR: u8 = 1;

/// Checks that `name` fits the peer's 8.3 naming rules.
///
/// The extension is everything from the last dot on, so "FILE.TAR.GZ" has
/// the base "FILE.TAR" and the extension ".GZ".
pub fn validate_name(name: &str) -> Result<(), SendError> {
    if name.is_empty() {
        return Err(SendError::InvalidName(name.to_string()));
    }
    if !name.is_ascii() || name.bytes().any(|b| b.is_ascii_control()) {
        return Err(SendError::InvalidName(name.to_string()));
    }

    let (base, extension) = match name.rfind('.') {
        Some(dot) => name.split_at(dot),
        None => (name, ""),
    };

    if base.len() > MAX_BASE_LEN {
        return Err(SendError::NameTooLong(name.to_string()));
    }
    if extension.len() > MAX_EXTENSION_LEN {
        return Err(SendError::ExtensionTooLong(name.to_string()));
    }

    Ok(())
}

/// Builds the header frame announcing `name` and `length`.
///
/// `name` must already have passed [`validate_name`]. Name bytes past the
/// terminator are left zeroed.
pub fn build_header(name: &str, length: u32) -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];

    let name = name.as_bytes();
    let name_len = name.len().min(NAME_FIELD_LEN);
    header[..name_len].copy_from_slice(&name[..name_len]);

    header[LENGTH_OFFSET..LENGTH_OFFSET + 4].copy_from_slice(&length.to_le_bytes());

    let crc = checksum(&header[..HEADER_LEN - CHECKSUM_LEN]);
    header[HEADER_LEN - CHECKSUM_LEN..].copy_from_slice(&crc.to_le_bytes());

    header
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_header(header: &[u8; HEADER_LEN]) -> (String, u32, u16) {
        let name_end = header.iter().position(|&b| b == 0).unwrap();
        assert!(name_end <= NAME_FIELD_LEN);
        let name = String::from_utf8(header[..name_end].to_vec()).unwrap();
        let length = u32::from_le_bytes(header[13..17].try_into().unwrap());
        let crc = u16::from_le_bytes(header[17..19].try_into().unwrap());
        (name, length, crc)
    }

    #[test]
    fn test_header_layout() {
        let header = build_header("A.TXT", 100);

        assert_eq!(HEADER_LEN, 19);
        assert_eq!(&header[..5], b"A.TXT");
        assert!(header[5..13].iter().all(|&b| b == 0));
        assert_eq!(&header[13..17], &[100, 0, 0, 0]);
        assert_eq!(&header[17..19], &[0x73, 0x08]);
    }

    #[test]
    fn test_header_decodes_back() {
        let header = build_header("A.TXT", 100);
        let (name, length, crc) = parse_header(&header);

        assert_eq!(name, "A.TXT");
        assert_eq!(length, 100);
        assert_eq!(crc, checksum(&header[..17]));
    }

    #[test]
    fn test_header_full_length_name() {
        let header = build_header("FILENAME.EXT", 0x0102_0304);
        let (name, length, _) = parse_header(&header);

        assert_eq!(&header[..12], b"FILENAME.EXT");
        assert_eq!(header[12], 0);
        assert_eq!(name, "FILENAME.EXT");
        assert_eq!(length, 0x0102_0304);
        assert_eq!(&header[13..17], &[0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn test_validate_name_accepts_8_3() {
        assert!(validate_name("A.TXT").is_ok());
        assert!(validate_name("FILENAME.EXT").is_ok());
        assert!(validate_name("README").is_ok());
        assert!(validate_name("ABCDEFGH").is_ok());
        assert!(validate_name("A.").is_ok());
        assert!(validate_name("FILE.TAR.GZ").is_ok());
        assert!(validate_name(".TXT").is_ok());
    }

    #[test]
    fn test_validate_name_base_too_long() {
        assert!(matches!(validate_name("ABCDEFGHI.TXT"), Err(SendError::NameTooLong(_))));
        assert!(matches!(validate_name("ABCDEFGHI"), Err(SendError::NameTooLong(_))));
        assert!(matches!(validate_name("FILE.TARX.GZ"), Err(SendError::NameTooLong(_))));
    }

    #[test]
    fn test_validate_name_extension_too_long() {
        assert!(matches!(validate_name("A.ABCD"), Err(SendError::ExtensionTooLong(_))));
        assert!(matches!(validate_name("FILE.HTML"), Err(SendError::ExtensionTooLong(_))));
    }

    #[test]
    fn test_validate_name_invalid() {
        assert!(matches!(validate_name(""), Err(SendError::InvalidName(_))));
        assert!(matches!(validate_name("FÎLE.TXT"), Err(SendError::InvalidName(_))));
        assert!(matches!(validate_name("A\0B.TXT"), Err(SendError::InvalidName(_))));
    }
}
