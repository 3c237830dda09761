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

//! The `getcwd` system call returns the working directory.

use crate::process::user::UserSlice;
use macros::syscall;

#[syscall]
pub fn getcwd(buf: UserSlice, size: usize) -> crate::errno::EResult<i32> {
	let cwd = crate::process::getcwd();
	if size < cwd.len() + 1 {
		return Err(crate::errno!(ERANGE));
	}
	let mut bytes = alloc::vec::Vec::with_capacity(cwd.len() + 1);
	bytes.extend_from_slice(cwd.as_bytes());
	bytes.push(0);
	buf.copy_to_user(&bytes)?;
	Ok(0)
}
