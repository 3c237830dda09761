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

//! The `readdir` system call lists directory entries.
//!
//! Entries are marshalled into the caller's fixed-size entry buffer; the
//! call returns the number of entries written and stops early when the
//! buffer is full.

use crate::{
	file::{vfs, Dirent, DIRENT_NAME_MAX},
	process::user::{UserSlice, UserString},
};
use alloc::vec::Vec;
use macros::syscall;

#[syscall]
pub fn readdir(
	path: UserString,
	entry_offset: usize,
	buf: UserSlice,
	buf_size: usize,
) -> crate::errno::EResult<i32> {
	let path = path.copy_from_user()?;
	let abs = super::absolute_path(&path);
	let capacity = buf_size / size_of::<Dirent>();
	let mut entries: Vec<Dirent> = Vec::new();
	vfs::readdir(&abs, entry_offset, &mut |name| {
		if entries.len() >= capacity {
			return true;
		}
		let mut dirent = Dirent::default();
		let len = name.len().min(DIRENT_NAME_MAX);
		dirent.name[..len].copy_from_slice(&name.as_bytes()[..len]);
		entries.push(dirent);
		false
	})?;
	// Marshal the entries out as raw bytes
	let bytes = unsafe {
		core::slice::from_raw_parts(
			entries.as_ptr().cast::<u8>(),
			entries.len() * size_of::<Dirent>(),
		)
	};
	buf.copy_to_user(bytes)?;
	Ok(entries.len() as i32)
}
