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

//! The `read` system call reads from an open file.

use crate::{
	file::vfs,
	process::{user::UserSlice, Process},
};
use alloc::vec;
use macros::syscall;

/// The largest single transfer; partial reads let the caller loop.
const READ_MAX: usize = 65536;

#[syscall]
pub fn read(fd: i32, buf: UserSlice, count: usize) -> crate::errno::EResult<i32> {
	if count == 0 {
		return Ok(0);
	}
	let count = count.min(READ_MAX);
	let idx = Process::current().lock().files.get(fd)?;
	// Bounce through a kernel buffer: the file system may yield while the
	// user mapping stays bound
	let mut kbuf = vec![0u8; count];
	let n = vfs::read(idx, &mut kbuf)?;
	buf.copy_to_user(&kbuf[..n])?;
	Ok(n as i32)
}
