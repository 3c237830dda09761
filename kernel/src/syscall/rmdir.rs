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

//! The `rmdir` system call removes an empty directory.

use crate::{file::vfs, process::user::UserString};
use macros::syscall;

#[syscall]
pub fn rmdir(path: UserString) -> crate::errno::EResult<i32> {
	let path = path.copy_from_user()?;
	let abs = super::absolute_path(&path);
	vfs::rmdir(&abs)?;
	Ok(0)
}
