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

//! Kernel-wide limits.

/// The maximum length of a path in bytes.
pub const PATH_MAX: usize = 4096;
/// The maximum length of a file name in bytes.
pub const NAME_MAX: usize = 255;
/// The number of file descriptors per process.
pub const OPEN_MAX: usize = 16;
/// The number of entries in the kernel-wide open file table.
pub const FILE_MAX: usize = 128;
/// The number of slots in the process table.
pub const PROC_MAX: usize = 64;
/// The number of slots in the mount table.
pub const MOUNT_MAX: usize = 8;
/// The default capacity of a pipe in bytes.
pub const PIPE_BUF: usize = 512;
/// The maximum number of command line arguments accepted by `exec`.
pub const ARG_MAX: usize = 10;
