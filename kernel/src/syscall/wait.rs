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

//! The `wait` system call reaps a zombie child.

use crate::process::user::UserSlice;
use macros::syscall;

#[syscall]
pub fn wait(status: UserSlice) -> crate::errno::EResult<i32> {
	let (pid, encoded) = crate::process::wait()?;
	// A null status pointer means the caller does not care
	let addr = crate::syscall::user_stack_arg(frame, 0)?;
	if addr != 0 {
		status.copy_to_user(&encoded.to_le_bytes())?;
	}
	Ok(pid as i32)
}
