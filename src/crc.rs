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

//! CRC-16/CCITT checksum shared by the header and every data chunk

/// Reflected form of the CCITT polynomial x^16 + x^12 + x^5 + 1
const POLY: u16 = 0x8408;

const SEED: u16 = 0xFFFF;

/// Computes the frame checksum over `data`.
///
/// The register is inverted at the end and its two bytes are swapped, so
/// the value written little-endian puts the high byte of the plain CRC
/// first. An empty range returns the inverted seed without the swap.
pub fn checksum(data: &[u8]) -> u16 {
    if data.is_empty() {
        return !SEED;
    }

    let mut crc = SEED;
    for &byte in data {
        let mut bits = byte;
        for _ in 0..8 {
            if (crc ^ bits as u16) & 0x0001 != 0 {
                crc = (crc >> 1) ^ POLY;
            } else {
                crc >>= 1;
            }
            bits >>= 1;
        }
    }

    (!crc).swap_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_known_vectors() {
        assert_eq!(checksum(b"123456789"), 0x6E90);
        assert_eq!(checksum(b"A"), 0xF5A3);
        assert_eq!(checksum(&[0x00]), 0x78F0);
    }

    #[test]
    fn test_checksum_empty_range() {
        let buffer = [0xAAu8; 16];
        assert_eq!(checksum(&buffer[..0]), 0x0000);
        assert_eq!(checksum(&[]), 0x0000);
    }

    #[test]
    fn test_checksum_sub_range() {
        let mut buffer = b"123456789".to_vec();
        buffer.extend_from_slice(&[0xDE, 0xAD]);
        assert_eq!(checksum(&buffer[..9]), 0x6E90);
    }

    #[test]
    fn test_checksum_deterministic() {
        let data: Vec<u8> = (0..=255).collect();
        assert_eq!(checksum(&data), checksum(&data));
        assert_eq!(checksum(&data), 0x3C30);
    }

    #[test]
    fn test_checksum_single_bit_flip() {
        let data: Vec<u8> = (0..64).map(|i| (i * 7) as u8).collect();
        let reference = checksum(&data);

        for byte in 0..data.len() {
            for bit in 0..8 {
                let mut flipped = data.clone();
                flipped[byte] ^= 1 << bit;
                assert_ne!(checksum(&flipped), reference, "flip at byte {} bit {}", byte, bit);
            }
        }
    }
}
