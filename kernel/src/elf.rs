/*
 * Copyright 2025 The Sonata developers
 *
 * This file is part of Sonata.
 *
 * Sonata is free software: you can redistribute it and/or modify it under the
 * terms of the GNU General Public License as published by the Free Software
 * Foundation, either version 3 of the License, or (at your option) any later
 * version.
 *
 * Sonata is distributed in the hope that it will be useful, but WITHOUT ANY
 * WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR
 * A PARTICULAR PURPOSE. See the GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License along with
 * Sonata. If not, see <https://www.gnu.org/licenses/>.
 */

//! ELF32 image parsing, just enough to load static executables.

use crate::{errno, errno::EResult};

/// The ELF magic number.
const MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
/// ELF class: 32-bit.
const CLASS_32: u8 = 1;
/// Object type: executable.
const TYPE_EXEC: u16 = 2;
/// Machine: x86.
const MACHINE_386: u16 = 3;

/// Program header type: loadable segment.
pub const PT_LOAD: u32 = 1;
/// Segment flag: writable.
pub const PF_W: u32 = 0x2;

/// A program header.
#[derive(Clone, Copy, Debug)]
pub struct ProgramHeader {
	/// Segment type.
	pub p_type: u32,
	/// Offset of the segment's bytes in the file.
	pub p_offset: u32,
	/// Virtual address the segment is loaded at.
	pub p_vaddr: u32,
	/// Size of the segment's bytes in the file.
	pub p_filesz: u32,
	/// Size of the segment in memory; the tail past `p_filesz` is
	/// zero-filled.
	pub p_memsz: u32,
	/// Segment flags.
	pub p_flags: u32,
}

/// A parsed ELF32 executable image.
pub struct Image<'b> {
	data: &'b [u8],
	/// The program entry point.
	pub entry: u32,
	phoff: usize,
	phentsize: usize,
	phnum: usize,
}

fn read_u16(data: &[u8], off: usize) -> u16 {
	u16::from_le_bytes([data[off], data[off + 1]])
}

fn read_u32(data: &[u8], off: usize) -> u32 {
	u32::from_le_bytes([data[off], data[off + 1], data[off + 2], data[off + 3]])
}

impl<'b> Image<'b> {
	/// Parses and validates the image in `data`.
	pub fn parse(data: &'b [u8]) -> EResult<Self> {
		if data.len() < 52 || data[0..4] != MAGIC {
			return Err(errno!(ENOEXEC));
		}
		if data[4] != CLASS_32 {
			return Err(errno!(ENOEXEC));
		}
		if read_u16(data, 16) != TYPE_EXEC || read_u16(data, 18) != MACHINE_386 {
			return Err(errno!(ENOEXEC));
		}
		let phoff = read_u32(data, 28) as usize;
		let phentsize = read_u16(data, 42) as usize;
		let phnum = read_u16(data, 44) as usize;
		if phentsize < 32 || phoff.saturating_add(phnum * phentsize) > data.len() {
			return Err(errno!(ENOEXEC));
		}
		Ok(Self {
			data,
			entry: read_u32(data, 24),
			phoff,
			phentsize,
			phnum,
		})
	}

	/// Iterates the program headers.
	pub fn program_headers(&self) -> impl Iterator<Item = ProgramHeader> + '_ {
		(0..self.phnum).map(|i| {
			let off = self.phoff + i * self.phentsize;
			ProgramHeader {
				p_type: read_u32(self.data, off),
				p_offset: read_u32(self.data, off + 4),
				p_vaddr: read_u32(self.data, off + 8),
				p_filesz: read_u32(self.data, off + 16),
				p_memsz: read_u32(self.data, off + 20),
				p_flags: read_u32(self.data, off + 24),
			}
		})
	}

	/// Returns the bytes of the given segment.
	pub fn segment_data(&self, phdr: &ProgramHeader) -> EResult<&'b [u8]> {
		let start = phdr.p_offset as usize;
		let end = start
			.checked_add(phdr.p_filesz as usize)
			.ok_or(errno!(ENOEXEC))?;
		self.data.get(start..end).ok_or(errno!(ENOEXEC))
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test_case]
	fn reject_garbage() {
		assert_eq!(Image::parse(b"not an elf").err(), Some(errno!(ENOEXEC)));
		assert_eq!(Image::parse(&[]).err(), Some(errno!(ENOEXEC)));
	}

	#[test_case]
	fn parse_minimal_header() {
		let mut data = [0u8; 52];
		data[0..4].copy_from_slice(&MAGIC);
		data[4] = CLASS_32;
		data[16..18].copy_from_slice(&TYPE_EXEC.to_le_bytes());
		data[18..20].copy_from_slice(&MACHINE_386.to_le_bytes());
		data[24..28].copy_from_slice(&0x8048000u32.to_le_bytes());
		// No program headers
		data[42..44].copy_from_slice(&32u16.to_le_bytes());
		let image = Image::parse(&data).unwrap();
		assert_eq!(image.entry, 0x8048000);
		assert_eq!(image.program_headers().count(), 0);
	}
}
