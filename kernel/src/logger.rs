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

//! Kernel logging.
//!
//! The kernel uses the `log` facade. Records are kept in a fixed ring
//! buffer, mirrored to the serial port, and shown on the TTY unless the
//! logger is silenced.

use crate::{device::serial, sync::spin::IntSpin, tty};
use core::fmt::Write;
use log::{LevelFilter, Log, Metadata, Record};

/// The size of the kernel logs buffer in bytes.
const LOGS_SIZE: usize = 65536;

/// The kernel's logger.
pub static LOGGER: IntSpin<Logger> = IntSpin::new(Logger::new());

/// Kernel logger, storing logs in a ring buffer.
pub struct Logger {
	/// Tells whether records are hidden from the TTY.
	pub silent: bool,

	buf: [u8; LOGS_SIZE],
	/// The buffer's writing head.
	write_head: usize,
	/// The number of bytes stored in the buffer.
	len: usize,
}

impl Logger {
	const fn new() -> Self {
		Self {
			silent: false,
			buf: [0; LOGS_SIZE],
			write_head: 0,
			len: 0,
		}
	}

	/// Pushes the given bytes onto the logs buffer, overwriting the oldest
	/// data when full.
	pub fn push(&mut self, s: &[u8]) {
		for &b in s {
			self.buf[self.write_head] = b;
			self.write_head = (self.write_head + 1) % LOGS_SIZE;
			if self.len < LOGS_SIZE {
				self.len += 1;
			}
		}
	}
}

impl Write for Logger {
	fn write_str(&mut self, s: &str) -> core::fmt::Result {
		self.push(s.as_bytes());
		serial::write(s.as_bytes());
		if !self.silent {
			tty::write_kernel(s.as_bytes());
		}
		Ok(())
	}
}

struct KernelLog;

impl Log for KernelLog {
	fn enabled(&self, _metadata: &Metadata) -> bool {
		true
	}

	fn log(&self, record: &Record) {
		let mut logger = LOGGER.lock();
		let _ = writeln!(logger, "[{:>5}] {}", record.level(), record.args());
	}

	fn flush(&self) {}
}

static KERNEL_LOG: KernelLog = KernelLog;

/// Initializes the logging facade.
pub(crate) fn init() {
	log::set_logger(&KERNEL_LOG).expect("logger initialized twice");
	log::set_max_level(LevelFilter::Info);
}
