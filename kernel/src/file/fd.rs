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

//! Per-process file descriptors.
//!
//! A file descriptor is an integer indexing the process's table of open
//! file pointers; an empty slot means the descriptor is free. Duplication
//! bumps the open file's reference count.

use crate::{errno, errno::EResult, file::vfs, limits::OPEN_MAX};

/// A process's file descriptor table, mapping descriptors to indexes in the
/// kernel open file table.
#[derive(Default)]
pub struct FdTable([Option<u32>; OPEN_MAX]);

impl FdTable {
	/// Creates an empty table.
	pub const fn new() -> Self {
		Self([None; OPEN_MAX])
	}

	/// Binds the open file at `file_idx` to the lowest free descriptor.
	pub fn alloc(&mut self, file_idx: usize) -> EResult<i32> {
		let fd = self
			.0
			.iter()
			.position(Option::is_none)
			.ok_or(errno!(EMFILE))?;
		self.0[fd] = Some(file_idx as u32);
		Ok(fd as i32)
	}

	/// Returns the open file index bound to `fd`.
	pub fn get(&self, fd: i32) -> EResult<usize> {
		usize::try_from(fd)
			.ok()
			.and_then(|fd| self.0.get(fd).copied().flatten())
			.map(|idx| idx as usize)
			.ok_or(errno!(EBADF))
	}

	/// Closes `fd`, dropping one reference on the open file.
	pub fn close(&mut self, fd: i32) -> EResult<()> {
		let idx = self.get(fd)?;
		vfs::close(idx)?;
		self.0[fd as usize] = None;
		Ok(())
	}

	/// Duplicates `fd` onto the lowest free descriptor, bumping the open
	/// file's reference count.
	pub fn dup(&mut self, fd: i32) -> EResult<i32> {
		let idx = self.get(fd)?;
		let new_fd = self.alloc(idx)?;
		if let Err(e) = vfs::dup(idx) {
			self.0[new_fd as usize] = None;
			return Err(e);
		}
		Ok(new_fd)
	}

	/// Closes every descriptor in the table.
	pub fn close_all(&mut self) {
		for fd in 0..OPEN_MAX {
			if self.0[fd].is_some() {
				let _ = self.close(fd as i32);
			}
		}
	}

	/// Duplicates the whole table for a forked child: the child's
	/// descriptors refer to the same open file entries, with reference
	/// counts incremented.
	///
	/// On failure, the references already taken are released again, so the
	/// caller's open files keep their counts.
	pub fn duplicate(&self) -> EResult<FdTable> {
		let mut table = FdTable::new();
		for (fd, entry) in self.0.iter().enumerate() {
			let Some(idx) = entry else {
				continue;
			};
			if let Err(e) = vfs::dup(*idx as usize) {
				for dup_idx in table.0.iter().flatten() {
					let _ = vfs::close(*dup_idx as usize);
				}
				return Err(e);
			}
			table.0[fd] = Some(*idx);
		}
		Ok(table)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test_case]
	fn fd_lowest_free() {
		let mut table = FdTable::new();
		// Descriptors are handed out lowest-first and reused after close
		assert_eq!(table.alloc(7).unwrap(), 0);
		assert_eq!(table.alloc(8).unwrap(), 1);
		assert_eq!(table.get(0).unwrap(), 7);
		assert_eq!(table.get(1).unwrap(), 8);
		table.0[0] = None;
		assert_eq!(table.alloc(9).unwrap(), 0);
	}

	#[test_case]
	fn fd_bad_descriptor() {
		let table = FdTable::new();
		assert_eq!(table.get(-1), Err(errno!(EBADF)));
		assert_eq!(table.get(0), Err(errno!(EBADF)));
		assert_eq!(table.get(OPEN_MAX as i32), Err(errno!(EBADF)));
	}
}
