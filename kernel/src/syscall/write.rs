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

//! The `write` system call writes to an open file.

use crate::{
	file::vfs,
	process::{user::UserSlice, Process},
};
use macros::syscall;

/// The largest single transfer; partial writes let the caller loop.
const WRITE_MAX: usize = 65536;

#[syscall]
pub fn write(fd: i32, buf: UserSlice, count: usize) -> crate::errno::EResult<i32> {
	if count == 0 {
		return Ok(0);
	}
	let count = count.min(WRITE_MAX);
	let idx = Process::current().lock().files.get(fd)?;
	let kbuf = buf.copy_from_user(count)?;
	let n = vfs::write(idx, &kbuf)?;
	Ok(n as i32)
}
