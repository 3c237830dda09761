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

//! Concrete file systems.
//!
//! A file system plugs into the VFS by implementing [`FilesystemOps`].
//! Paths handed to a file system are relative to its mount point and always
//! start with `/`. Operations a file system does not support keep their
//! default implementation, which the VFS surfaces as permission denied.
//!
//! Each implementation owns its private state behind its own lock; the VFS
//! never calls into a file system while holding the VFS lock, so blocking
//! operations (pipes, console input) are free to yield.

pub mod console;
pub mod fat32;
pub mod pipe;
pub mod ustar;

use crate::{
	errno,
	errno::EResult,
	file::{Mode, OpenFlags, Stat},
};

/// Per-open-file information passed down to file system operations.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileInfo {
	/// The flags the file was opened with.
	pub flags: OpenFlags,
	/// The file system's internal handle for the open file.
	pub handle: u64,
}

/// Callback marshalling directory entries during `readdir`.
///
/// Returns `true` when the destination buffer is full, stopping the
/// iteration.
pub type DirFiller<'f> = &'f mut dyn FnMut(&str) -> bool;

/// The operation table of a mounted file system.
///
/// All paths are relative to the mount point and start with `/`.
pub trait FilesystemOps: Send + Sync {
	/// The name of the file system type.
	fn name(&self) -> &'static str;

	/// Opens the file at `path`, filling `fi.handle` with the file system's
	/// handle for it.
	///
	/// Depending on `fi.flags`, the file may be created or truncated.
	fn open(&self, path: &str, fi: &mut FileInfo) -> EResult<()> {
		let _ = (path, fi);
		Err(errno!(EPERM))
	}

	/// Releases the handle of an open file.
	fn release(&self, path: &str, fi: &FileInfo) -> EResult<()> {
		let _ = (path, fi);
		Ok(())
	}

	/// Reads from the file at `path` into `buf`, starting at byte `offset`.
	///
	/// Returns the number of bytes read; `0` means end of file.
	fn read(&self, path: &str, fi: Option<&FileInfo>, buf: &mut [u8], offset: u64)
		-> EResult<usize> {
		let _ = (path, fi, buf, offset);
		Err(errno!(EPERM))
	}

	/// Writes `buf` to the file at `path`, starting at byte `offset`.
	///
	/// Returns the number of bytes written.
	fn write(&self, path: &str, fi: Option<&FileInfo>, buf: &[u8], offset: u64) -> EResult<usize> {
		let _ = (path, fi, buf, offset);
		Err(errno!(EPERM))
	}

	/// Truncates or zero-extends the file at `path` to `size` bytes.
	fn truncate(&self, path: &str, size: u64, fi: Option<&FileInfo>) -> EResult<()> {
		let _ = (path, size, fi);
		Err(errno!(EPERM))
	}

	/// Iterates the entries of the directory at `path`, starting at entry
	/// `offset`, handing each name to `filler`.
	fn readdir(&self, path: &str, offset: usize, filler: DirFiller) -> EResult<()> {
		let _ = (path, offset, filler);
		Err(errno!(EPERM))
	}

	/// Returns the status of the file at `path`.
	fn getattr(&self, path: &str, fi: Option<&FileInfo>) -> EResult<Stat> {
		let _ = (path, fi);
		Err(errno!(EPERM))
	}

	/// Creates a node (regular file or special file) at `path`.
	fn mknod(&self, path: &str, mode: Mode) -> EResult<()> {
		let _ = (path, mode);
		Err(errno!(EPERM))
	}

	/// Creates a directory at `path`.
	fn mkdir(&self, path: &str, mode: Mode) -> EResult<()> {
		let _ = (path, mode);
		Err(errno!(EPERM))
	}

	/// Removes the empty directory at `path`.
	fn rmdir(&self, path: &str) -> EResult<()> {
		let _ = path;
		Err(errno!(EPERM))
	}

	/// Removes the file at `path`.
	fn unlink(&self, path: &str) -> EResult<()> {
		let _ = path;
		Err(errno!(EPERM))
	}

	/// Creates at `new` a link to the file at `old`. Both paths live on
	/// this file system.
	fn link(&self, old: &str, new: &str) -> EResult<()> {
		let _ = (old, new);
		Err(errno!(EPERM))
	}

	/// Moves the file at `from` to `to`, replacing `to` if it exists. Both
	/// paths live on this file system.
	fn rename(&self, from: &str, to: &str) -> EResult<()> {
		let _ = (from, to);
		Err(errno!(EPERM))
	}
}
