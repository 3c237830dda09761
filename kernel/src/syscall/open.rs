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

//! The `open` system call opens a file and binds it to a descriptor.

use crate::{
	file::{vfs, OpenFlags},
	process::{user::UserString, Process},
};
use macros::syscall;

#[syscall]
pub fn open(path: UserString, flags: u32) -> crate::errno::EResult<i32> {
	let path = path.copy_from_user()?;
	let abs = super::absolute_path(&path);
	let idx = vfs::open(&abs, OpenFlags::from_bits_retain(flags))?;
	let fd = Process::current().lock().files.alloc(idx);
	match fd {
		Ok(fd) => Ok(fd),
		Err(e) => {
			let _ = vfs::close(idx);
			Err(e)
		}
	}
}
