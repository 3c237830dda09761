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

//! Read-only USTAR archive file system, used as the root.
//!
//! The archive is a sequence of 512-byte metadata blocks, each followed by
//! the file's data blocks rounded up to 512 bytes. Lookups stream the
//! archive from the mount's starting block, decoding octal sizes to skip
//! over files. Directories are synthetic: `readdir` enumerates them by
//! prefix-matching names.

use super::{DirFiller, FileInfo, FilesystemOps};
use crate::{
	device::storage::BlockStorage,
	errno,
	errno::EResult,
	file::{Stat, PERM_ALL, S_IFDIR, S_IFREG},
};
use alloc::{string::String, sync::Arc, vec};

/// The size of an archive block in bytes.
const BLOCK_SIZE: usize = 512;
/// The offset of the "ustar" magic in a metadata block.
const MAGIC_OFFSET: usize = 257;
/// The offset of the octal file size in a metadata block.
const SIZE_OFFSET: usize = 0x7c;
/// The length of the octal file size field.
const SIZE_LEN: usize = 11;
/// The offset of the octal modification time in a metadata block.
const MTIME_OFFSET: usize = 136;
/// The length of the octal modification time field.
const MTIME_LEN: usize = 11;
/// The offset of the type flag in a metadata block.
const TYPE_OFFSET: usize = 156;
/// Type flag of a directory entry.
const TYPE_DIRECTORY: u8 = b'5';

/// Decodes a null-padded octal string.
fn oct2bin(s: &[u8]) -> u64 {
	let mut n = 0u64;
	for &c in s {
		if !(b'0'..=b'7').contains(&c) {
			break;
		}
		n = n * 8 + (c - b'0') as u64;
	}
	n
}

/// One metadata block of the archive.
struct Header {
	/// The entry's name, leading `./` stripped.
	name: String,
	/// The entry's data size in bytes.
	size: u64,
	/// The entry's modification time.
	mtime: u32,
	/// Tells whether the entry is a directory.
	directory: bool,
	/// The LBA of the first data block.
	data_lba: u64,
}

/// The USTAR file system instance.
pub struct Ustar {
	storage: Arc<dyn BlockStorage>,
	/// The LBA of the first metadata block.
	start_lba: u64,
}

impl Ustar {
	/// Opens the archive starting at `start_lba` on `storage`.
	///
	/// Fails with [`errno::ENXIO`] if no USTAR magic is found there.
	pub fn detect(storage: Arc<dyn BlockStorage>, start_lba: u64) -> EResult<Self> {
		let mut block = vec![0u8; BLOCK_SIZE];
		storage.read_blocks(start_lba, &mut block)?;
		if &block[MAGIC_OFFSET..MAGIC_OFFSET + 5] != b"ustar" {
			return Err(errno!(ENXIO));
		}
		Ok(Self {
			storage,
			start_lba,
		})
	}

	/// Streams the archive's metadata blocks, calling `f` for each entry.
	///
	/// Iteration stops when `f` returns `true` or when the archive ends.
	fn for_each_entry(&self, mut f: impl FnMut(&Header) -> bool) -> EResult<()> {
		let mut lba = self.start_lba;
		let mut block = vec![0u8; BLOCK_SIZE];
		loop {
			if lba >= self.storage.block_count() {
				return Ok(());
			}
			self.storage.read_blocks(lba, &mut block)?;
			if &block[MAGIC_OFFSET..MAGIC_OFFSET + 5] != b"ustar" {
				return Ok(());
			}
			let name_len = block[..100].iter().position(|c| *c == 0).unwrap_or(100);
			let raw_name = core::str::from_utf8(&block[..name_len]).map_err(|_| errno!(EIO))?;
			let name = raw_name.strip_prefix("./").unwrap_or(raw_name);
			let size = oct2bin(&block[SIZE_OFFSET..SIZE_OFFSET + SIZE_LEN]);
			let header = Header {
				name: String::from(name.trim_end_matches('/')),
				size,
				mtime: oct2bin(&block[MTIME_OFFSET..MTIME_OFFSET + MTIME_LEN]) as u32,
				directory: block[TYPE_OFFSET] == TYPE_DIRECTORY || raw_name.ends_with('/'),
				data_lba: lba + 1,
			};
			if !header.name.is_empty() && f(&header) {
				return Ok(());
			}
			lba += 1 + size.div_ceil(BLOCK_SIZE as u64);
		}
	}

	/// Finds the entry matching the mount-relative `path`.
	fn lookup(&self, path: &str) -> EResult<Option<Header>> {
		let target = path.trim_start_matches('/');
		let mut found = None;
		self.for_each_entry(|header| {
			if header.name == target {
				found = Some(Header {
					name: header.name.clone(),
					size: header.size,
					mtime: header.mtime,
					directory: header.directory,
					data_lba: header.data_lba,
				});
				true
			} else {
				false
			}
		})?;
		Ok(found)
	}
}

impl FilesystemOps for Ustar {
	fn name(&self) -> &'static str {
		"ustar"
	}

	fn open(&self, path: &str, fi: &mut FileInfo) -> EResult<()> {
		let header = self.lookup(path)?.ok_or(errno!(ENOENT))?;
		if header.directory {
			return Err(errno!(EISDIR));
		}
		fi.handle = header.data_lba - 1;
		Ok(())
	}

	fn read(&self, path: &str, _fi: Option<&FileInfo>, buf: &mut [u8], offset: u64)
		-> EResult<usize> {
		let header = self.lookup(path)?.ok_or(errno!(ENOENT))?;
		if header.directory {
			return Err(errno!(EISDIR));
		}
		if offset >= header.size {
			return Ok(0);
		}
		let len = buf.len().min((header.size - offset) as usize);
		// Read whole blocks covering the window, then copy the slice out
		let first_block = offset / BLOCK_SIZE as u64;
		let end_block = (offset + len as u64).div_ceil(BLOCK_SIZE as u64);
		let mut window = vec![0u8; ((end_block - first_block) as usize) * BLOCK_SIZE];
		self.storage
			.read_blocks(header.data_lba + first_block, &mut window)?;
		let start = (offset % BLOCK_SIZE as u64) as usize;
		buf[..len].copy_from_slice(&window[start..start + len]);
		Ok(len)
	}

	fn getattr(&self, path: &str, _fi: Option<&FileInfo>) -> EResult<Stat> {
		if path == "/" {
			return Ok(Stat {
				mode: S_IFDIR | PERM_ALL,
				size: 0,
				mtime: 0,
				ctime: 0,
			});
		}
		let header = self.lookup(path)?.ok_or(errno!(ENOENT))?;
		Ok(Stat {
			mode: if header.directory {
				S_IFDIR | PERM_ALL
			} else {
				S_IFREG | PERM_ALL
			},
			size: header.size,
			mtime: header.mtime,
			ctime: header.mtime,
		})
	}

	fn readdir(&self, path: &str, offset: usize, filler: DirFiller) -> EResult<()> {
		let dir = path.trim_start_matches('/');
		if !dir.is_empty() {
			match self.lookup(path)? {
				Some(header) if header.directory => {}
				Some(_) => return Err(errno!(ENOTDIR)),
				None => return Err(errno!(ENOENT)),
			}
		}
		let mut skipped = 0;
		self.for_each_entry(|header| {
			// Keep entries directly under `dir`
			let child = if dir.is_empty() {
				header.name.as_str()
			} else {
				match header.name.strip_prefix(dir) {
					Some(rest) if rest.starts_with('/') => &rest[1..],
					_ => return false,
				}
			};
			if child.is_empty() || child.contains('/') {
				return false;
			}
			if skipped < offset {
				skipped += 1;
				return false;
			}
			filler(child)
		})?;
		Ok(())
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test_case]
	fn octal_sizes() {
		assert_eq!(oct2bin(b"00000000644"), 0o644);
		assert_eq!(oct2bin(b"0000000001\0"), 1);
		assert_eq!(oct2bin(b"00000000000"), 0);
	}
}
