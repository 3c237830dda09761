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

//! The `stat` system call returns a file's status.

use crate::{
	file::{vfs, Stat},
	process::user::{UserSlice, UserString},
};
use macros::syscall;

#[syscall]
pub fn stat(path: UserString, buf: UserSlice) -> crate::errno::EResult<i32> {
	let path = path.copy_from_user()?;
	let abs = super::absolute_path(&path);
	let stat = vfs::getattr_path(&abs)?;
	let bytes = unsafe {
		core::slice::from_raw_parts(
			(&stat as *const Stat).cast::<u8>(),
			size_of::<Stat>(),
		)
	};
	buf.copy_to_user(bytes)?;
	Ok(0)
}
