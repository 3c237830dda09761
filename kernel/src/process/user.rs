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

//! Accessors for userspace memory.
//!
//! Pointer arguments coming through the system call gateway are wrapped in
//! these types; every dereference first validates accessibility against the
//! current process's page directory, with userspace permissions.

use crate::{
	errno,
	errno::EResult,
	limits::PATH_MAX,
	memory::VirtAddr,
	process::Process,
};
use alloc::{string::String, vec, vec::Vec};

/// Validates that `addr..addr + len` is accessible from userspace.
fn check_access(addr: VirtAddr, len: usize, write: bool) -> EResult<()> {
	if addr.is_null() {
		return Err(errno!(EFAULT));
	}
	let ok = {
		let proc = Process::current().lock();
		let page_dir = proc.page_dir.as_ref().ok_or(errno!(EFAULT))?;
		page_dir.is_accessible(addr, len, false, write)
	};
	if ok {
		Ok(())
	} else {
		Err(errno!(EFAULT))
	}
}

/// A userspace buffer of bytes.
#[derive(Clone, Copy, Debug)]
pub struct UserSlice(VirtAddr);

impl UserSlice {
	/// Wraps the raw system call argument.
	pub fn from_syscall_arg(arg: usize) -> Self {
		Self(VirtAddr(arg))
	}

	/// Copies `len` bytes from userspace.
	pub fn copy_from_user(&self, len: usize) -> EResult<Vec<u8>> {
		check_access(self.0, len, false)?;
		let mut buf = vec![0u8; len];
		unsafe {
			core::ptr::copy_nonoverlapping(self.0.as_ptr::<u8>(), buf.as_mut_ptr(), len);
		}
		Ok(buf)
	}

	/// Copies `buf` into userspace.
	pub fn copy_to_user(&self, buf: &[u8]) -> EResult<()> {
		check_access(self.0, buf.len(), true)?;
		unsafe {
			core::ptr::copy_nonoverlapping(buf.as_ptr(), self.0.as_ptr::<u8>(), buf.len());
		}
		Ok(())
	}
}

/// A null-terminated userspace string.
#[derive(Clone, Copy, Debug)]
pub struct UserString(VirtAddr);

impl UserString {
	/// Wraps the raw system call argument.
	pub fn from_syscall_arg(arg: usize) -> Self {
		Self(VirtAddr(arg))
	}

	/// Copies the string from userspace.
	///
	/// Fails with [`errno::ENAMETOOLONG`] past [`PATH_MAX`] bytes, and with
	/// [`errno::EINVAL`] on invalid UTF-8.
	pub fn copy_from_user(&self) -> EResult<String> {
		let mut bytes = Vec::new();
		for i in 0..PATH_MAX {
			let addr = self.0 + i;
			check_access(addr, 1, false)?;
			let b = unsafe { *addr.as_ptr::<u8>() };
			if b == 0 {
				return String::from_utf8(bytes).map_err(|_| errno!(EINVAL));
			}
			bytes.push(b);
		}
		Err(errno!(ENAMETOOLONG))
	}
}

/// A userspace array of string pointers, terminated by a null pointer.
#[derive(Clone, Copy, Debug)]
pub struct UserArgv(VirtAddr);

impl UserArgv {
	/// Wraps the raw system call argument.
	pub fn from_syscall_arg(arg: usize) -> Self {
		Self(VirtAddr(arg))
	}

	/// Copies the argument vector from userspace, capped at
	/// [`crate::limits::ARG_MAX`] entries.
	pub fn copy_from_user(&self) -> EResult<Vec<String>> {
		let mut args = Vec::new();
		for i in 0..crate::limits::ARG_MAX {
			let slot = self.0 + i * size_of::<u32>();
			check_access(slot, size_of::<u32>(), false)?;
			let ptr = unsafe { *slot.as_ptr::<u32>() };
			if ptr == 0 {
				return Ok(args);
			}
			args.push(UserString(VirtAddr(ptr as usize)).copy_from_user()?);
		}
		Err(errno!(E2BIG))
	}
}
