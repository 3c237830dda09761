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

//! The console character device.
//!
//! Reads consume the keyboard input ring, blocking by cooperatively
//! yielding. Writes run through the TTY engine, which interprets ANSI
//! escape sequences. Terminal reports (such as the cursor-position report)
//! are injected into a dedicated ring that reads drain before keyboard
//! input.

use super::{DirFiller, FileInfo, FilesystemOps};
use crate::{
	device::keyboard,
	errno::EResult,
	file::{Stat, PERM_ALL, S_IFCHR},
	sync::spin::IntSpin,
	tty,
};

/// The size of the report injection ring in bytes.
const REPORT_RING_SIZE: usize = 64;

/// Ring buffer carrying terminal report responses.
struct ReportRing {
	buf: [u8; REPORT_RING_SIZE],
	read: usize,
	write: usize,
}

static REPORTS: IntSpin<ReportRing> = IntSpin::new(ReportRing {
	buf: [0; REPORT_RING_SIZE],
	read: 0,
	write: 0,
});

/// Injects bytes into the console input stream, ahead of keyboard input.
///
/// Called by the TTY when answering a report request.
pub fn push_input(bytes: &[u8]) {
	let mut ring = REPORTS.lock();
	for &b in bytes {
		if ring.write == (ring.read + REPORT_RING_SIZE - 1) % REPORT_RING_SIZE {
			break;
		}
		let idx = ring.write;
		ring.buf[idx] = b;
		ring.write = (ring.write + 1) % REPORT_RING_SIZE;
	}
}

fn pop_report() -> Option<u8> {
	let mut ring = REPORTS.lock();
	if ring.read == ring.write {
		return None;
	}
	let c = ring.buf[ring.read];
	ring.read = (ring.read + 1) % REPORT_RING_SIZE;
	Some(c)
}

/// The console file system instance.
pub struct Console;

impl Console {
	/// Creates the instance.
	pub fn new() -> Self {
		Self
	}
}

impl FilesystemOps for Console {
	fn name(&self) -> &'static str {
		"console"
	}

	fn open(&self, _path: &str, _fi: &mut FileInfo) -> EResult<()> {
		Ok(())
	}

	fn read(&self, _path: &str, _fi: Option<&FileInfo>, buf: &mut [u8], _offset: u64)
		-> EResult<usize> {
		let mut n = 0;
		while n < buf.len() {
			// Report responses first, then keyboard input
			let c = pop_report().or_else(keyboard::read_key);
			match c {
				Some(c) => {
					buf[n] = c;
					n += 1;
				}
				// Block only when nothing was transferred yet
				None if n == 0 => crate::process::scheduler::yield_now(),
				None => break,
			}
		}
		Ok(n)
	}

	fn write(&self, _path: &str, _fi: Option<&FileInfo>, buf: &[u8], _offset: u64)
		-> EResult<usize> {
		tty::TTY.lock().write(buf);
		Ok(buf.len())
	}

	fn getattr(&self, _path: &str, _fi: Option<&FileInfo>) -> EResult<Stat> {
		Ok(Stat {
			mode: S_IFCHR | PERM_ALL,
			size: 0,
			mtime: 0,
			ctime: 0,
		})
	}

	fn readdir(&self, _path: &str, _offset: usize, _filler: DirFiller) -> EResult<()> {
		Ok(())
	}
}
