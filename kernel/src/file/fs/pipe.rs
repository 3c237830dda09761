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

//! The pipe file system.
//!
//! A pipe is a circular byte buffer with a reader index and a writer index
//! over a capacity specified at creation. Opening a path registers or
//! reuses a named pipe; the reference count is the number of live file
//! descriptors. `read` yields while the buffer is empty, `write` while it
//! is full, so a transfer larger than the capacity streams through without
//! deadlock.
//!
//! The pipe table lock is never held across a yield.

use super::{FileInfo, FilesystemOps};
use crate::{
	errno,
	errno::EResult,
	file::{Stat, PERM_ALL, S_IFIFO},
	sync::spin::IntSpin,
};
use alloc::{string::String, string::ToString, vec, vec::Vec};

/// The maximum number of live pipes.
const PIPE_MAX: usize = 64;

/// A named circular byte buffer.
struct Pipe {
	name: String,
	buf: Vec<u8>,
	/// Reader index.
	r: usize,
	/// Writer index.
	w: usize,
	/// The number of live file descriptors on the pipe.
	ref_count: u32,
}

impl Pipe {
	/// One slot is kept empty to distinguish a full buffer from an empty
	/// one.
	fn free_space(&self) -> usize {
		if self.r <= self.w {
			self.buf.len() - (self.w - self.r) - 1
		} else {
			self.r - self.w - 1
		}
	}

	fn ready_bytes(&self) -> usize {
		self.buf.len() - self.free_space() - 1
	}

	fn push(&mut self, b: u8) {
		debug_assert!(self.free_space() > 0);
		let w = self.w;
		self.buf[w] = b;
		self.w = (w + 1) % self.buf.len();
	}

	fn pop(&mut self) -> u8 {
		debug_assert!(self.ready_bytes() > 0);
		let b = self.buf[self.r];
		self.r = (self.r + 1) % self.buf.len();
		b
	}
}

/// The pipe file system instance.
pub struct PipeFs {
	pipes: IntSpin<Vec<Option<Pipe>>>,
}

impl PipeFs {
	/// Creates the instance.
	pub fn new() -> Self {
		Self {
			pipes: IntSpin::new(Vec::new()),
		}
	}

	fn find_by_name(pipes: &[Option<Pipe>], name: &str) -> Option<usize> {
		pipes
			.iter()
			.position(|p| p.as_ref().map(|p| p.name == name).unwrap_or(false))
	}
}

impl FilesystemOps for PipeFs {
	fn name(&self) -> &'static str {
		"pipe"
	}

	/// Opens the pipe named by `path`, creating it if needed.
	///
	/// At creation, the pipe's capacity is carried in the upper bits of the
	/// open flags (`flags >> 4`). A capacity of one byte or less is
	/// rejected.
	fn open(&self, path: &str, fi: &mut FileInfo) -> EResult<()> {
		let mut pipes = self.pipes.lock();
		if let Some(idx) = Self::find_by_name(&pipes, path) {
			pipes[idx].as_mut().unwrap().ref_count += 1;
			fi.handle = idx as u64;
			return Ok(());
		}
		let capacity = (fi.flags.bits() >> 4) as usize;
		if capacity <= 1 {
			return Err(errno!(EINVAL));
		}
		let pipe = Pipe {
			name: path.to_string(),
			// One extra slot distinguishes full from empty
			buf: vec![0; capacity + 1],
			r: 0,
			w: 0,
			ref_count: 1,
		};
		let idx = match pipes.iter().position(Option::is_none) {
			Some(idx) => {
				pipes[idx] = Some(pipe);
				idx
			}
			None if pipes.len() < PIPE_MAX => {
				pipes.push(Some(pipe));
				pipes.len() - 1
			}
			None => return Err(errno!(ENFILE)),
		};
		fi.handle = idx as u64;
		Ok(())
	}

	fn release(&self, _path: &str, fi: &FileInfo) -> EResult<()> {
		let mut pipes = self.pipes.lock();
		let pipe = pipes
			.get_mut(fi.handle as usize)
			.and_then(Option::as_mut)
			.ok_or(errno!(ENOENT))?;
		pipe.ref_count -= 1;
		if pipe.ref_count == 0 {
			pipes[fi.handle as usize] = None;
		}
		Ok(())
	}

	/// Reads `buf.len()` bytes, yielding while the buffer is empty.
	fn read(&self, _path: &str, fi: Option<&FileInfo>, buf: &mut [u8], _offset: u64)
		-> EResult<usize> {
		let fi = fi.ok_or(errno!(EPERM))?;
		let mut n = 0;
		while n < buf.len() {
			let progressed = {
				let mut pipes = self.pipes.lock();
				let pipe = pipes
					.get_mut(fi.handle as usize)
					.and_then(Option::as_mut)
					.ok_or(errno!(EPIPE))?;
				let chunk = pipe.ready_bytes().min(buf.len() - n);
				for _ in 0..chunk {
					buf[n] = pipe.pop();
					n += 1;
				}
				chunk > 0
			};
			if !progressed && n < buf.len() {
				crate::process::scheduler::yield_now();
			}
		}
		Ok(n)
	}

	/// Writes `buf.len()` bytes, yielding while the buffer is full.
	fn write(&self, _path: &str, fi: Option<&FileInfo>, buf: &[u8], _offset: u64)
		-> EResult<usize> {
		let fi = fi.ok_or(errno!(EPERM))?;
		let mut n = 0;
		while n < buf.len() {
			let progressed = {
				let mut pipes = self.pipes.lock();
				let pipe = pipes
					.get_mut(fi.handle as usize)
					.and_then(Option::as_mut)
					.ok_or(errno!(EPIPE))?;
				let chunk = pipe.free_space().min(buf.len() - n);
				for _ in 0..chunk {
					pipe.push(buf[n]);
					n += 1;
				}
				chunk > 0
			};
			if !progressed && n < buf.len() {
				crate::process::scheduler::yield_now();
			}
		}
		Ok(n)
	}

	/// Reports the number of ready bytes and the FIFO mode.
	fn getattr(&self, path: &str, fi: Option<&FileInfo>) -> EResult<Stat> {
		let pipes = self.pipes.lock();
		let pipe = match fi {
			Some(fi) => pipes.get(fi.handle as usize).and_then(Option::as_ref),
			None => {
				Self::find_by_name(&pipes, path).and_then(|idx| pipes[idx].as_ref())
			}
		}
		.ok_or(errno!(ENOENT))?;
		Ok(Stat {
			mode: S_IFIFO | PERM_ALL,
			size: pipe.ready_bytes() as u64,
			mtime: 0,
			ctime: 0,
		})
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test_case]
	fn ring_wraps() {
		let mut pipe = Pipe {
			name: String::new(),
			buf: vec![0; 9],
			r: 0,
			w: 0,
			ref_count: 1,
		};
		assert_eq!(pipe.free_space(), 8);
		assert_eq!(pipe.ready_bytes(), 0);
		for round in 0..4 {
			for i in 0..8u8 {
				pipe.push(round * 8 + i);
			}
			assert_eq!(pipe.free_space(), 0);
			for i in 0..8u8 {
				assert_eq!(pipe.pop(), round * 8 + i);
			}
		}
		assert_eq!(pipe.ready_bytes(), 0);
	}
}
