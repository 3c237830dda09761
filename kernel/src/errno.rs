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

//! Errno utilities.
//!
//! Every recoverable kernel surface reports failure as an [`Errno`] out of a
//! closed taxonomy. The system call gateway turns an `Err(e)` into the
//! negative value `-e` in the caller's result register.

/// Type representing a Unix errno.
pub type Errno = i32;

/// Operation not permitted.
pub const EPERM: Errno = 1;
/// No such file or directory.
pub const ENOENT: Errno = 2;
/// No such process.
pub const ESRCH: Errno = 3;
/// Interrupted function.
pub const EINTR: Errno = 4;
/// I/O error.
pub const EIO: Errno = 5;
/// No such device or address.
pub const ENXIO: Errno = 6;
/// Argument list too long.
pub const E2BIG: Errno = 7;
/// Executable file format error.
pub const ENOEXEC: Errno = 8;
/// Bad file descriptor.
pub const EBADF: Errno = 9;
/// No child processes.
pub const ECHILD: Errno = 10;
/// Resource unavailable, try again.
pub const EAGAIN: Errno = 11;
/// Not enough space.
pub const ENOMEM: Errno = 12;
/// Permission denied.
pub const EACCES: Errno = 13;
/// Bad address.
pub const EFAULT: Errno = 14;
/// Device or resource busy.
pub const EBUSY: Errno = 16;
/// File exists.
pub const EEXIST: Errno = 17;
/// Cross-device link.
pub const EXDEV: Errno = 18;
/// No such device.
pub const ENODEV: Errno = 19;
/// Not a directory.
pub const ENOTDIR: Errno = 20;
/// Is a directory.
pub const EISDIR: Errno = 21;
/// Invalid argument.
pub const EINVAL: Errno = 22;
/// Too many files open in system.
pub const ENFILE: Errno = 23;
/// File descriptor value too large.
pub const EMFILE: Errno = 24;
/// Inappropriate I/O control operation.
pub const ENOTTY: Errno = 25;
/// File too large.
pub const EFBIG: Errno = 27;
/// No space left on device.
pub const ENOSPC: Errno = 28;
/// Invalid seek.
pub const ESPIPE: Errno = 29;
/// Read-only file system.
pub const EROFS: Errno = 30;
/// Broken pipe.
pub const EPIPE: Errno = 32;
/// Result too large.
pub const ERANGE: Errno = 34;
/// Filename too long.
pub const ENAMETOOLONG: Errno = 36;
/// Functionality not supported.
pub const ENOSYS: Errno = 38;
/// Directory not empty.
pub const ENOTEMPTY: Errno = 39;

/// Result type for operations that can fail with an [`Errno`].
pub type EResult<T> = Result<T, Errno>;

/// Evaluates to the [`Errno`] with the given name.
#[macro_export]
macro_rules! errno {
	($name:ident) => {
		$crate::errno::$name
	};
}
