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

//! The system call gateway.
//!
//! A single software interrupt vector is installed as a trap gate callable
//! from ring 3. The handler dispatches on the value of `eax`; the arguments
//! live on the interrupted user stack, above the saved return address, and
//! are fetched through [`user_stack_arg`] after pointer validation.
//!
//! Every call returns a signed integer in the caller's `eax`: non-negative
//! means success, negative values are `-errno`.

mod chdir;
mod close;
mod dup;
mod exec;
mod exit;
mod fork;
mod getcwd;
mod gettime;
mod mkdir;
mod net;
mod open;
mod print;
mod read;
mod readdir;
mod rename;
mod rmdir;
mod sbrk;
mod sched_yield;
mod seek;
mod stat;
mod unlink;
mod wait;
mod write;

use crate::{
	arch::x86::idt::IntFrame,
	errno,
	errno::EResult,
	memory::VirtAddr,
	process::Process,
};

pub const SYS_EXEC: u32 = 1;
pub const SYS_PRINT: u32 = 2;
pub const SYS_YIELD: u32 = 3;
pub const SYS_FORK: u32 = 4;
pub const SYS_EXIT: u32 = 5;
pub const SYS_WAIT: u32 = 6;
pub const SYS_OPEN: u32 = 7;
pub const SYS_CLOSE: u32 = 8;
pub const SYS_READ: u32 = 9;
pub const SYS_WRITE: u32 = 10;
pub const SYS_SEEK: u32 = 11;
pub const SYS_SBRK: u32 = 12;
pub const SYS_DUP: u32 = 13;
pub const SYS_READDIR: u32 = 14;
pub const SYS_MKDIR: u32 = 15;
pub const SYS_RMDIR: u32 = 16;
pub const SYS_UNLINK: u32 = 17;
pub const SYS_RENAME: u32 = 18;
pub const SYS_STAT: u32 = 19;
pub const SYS_CHDIR: u32 = 20;
pub const SYS_GETCWD: u32 = 21;
pub const SYS_GETTIME: u32 = 22;
pub const SYS_SOCKET: u32 = 23;
pub const SYS_SENDTO: u32 = 24;
pub const SYS_RECVFROM: u32 = 25;

/// Fetches the `n`th system call argument from the interrupted user stack.
///
/// The stack slot is validated against the current process's page
/// directory with userspace permissions before the read.
pub fn user_stack_arg(frame: &IntFrame, n: usize) -> EResult<usize> {
	let addr = VirtAddr(frame.esp as usize + size_of::<u32>() * (n + 1));
	let accessible = {
		let proc = Process::current().lock();
		let page_dir = proc.page_dir.as_ref().ok_or(errno!(EFAULT))?;
		page_dir.is_accessible(addr, size_of::<u32>(), false, false)
	};
	if !accessible {
		return Err(errno!(EFAULT));
	}
	Ok(unsafe { *addr.as_ptr::<u32>() } as usize)
}

/// Dispatches and executes the system call held by `frame`.
pub fn handle(frame: &mut IntFrame) {
	let result = match frame.eax {
		SYS_EXEC => exec::exec(frame),
		SYS_PRINT => print::print(frame),
		SYS_YIELD => sched_yield::sched_yield(frame),
		SYS_FORK => fork::fork(frame),
		SYS_EXIT => exit::exit(frame),
		SYS_WAIT => wait::wait(frame),
		SYS_OPEN => open::open(frame),
		SYS_CLOSE => close::close(frame),
		SYS_READ => read::read(frame),
		SYS_WRITE => write::write(frame),
		SYS_SEEK => seek::seek(frame),
		SYS_SBRK => sbrk::sbrk(frame),
		SYS_DUP => dup::dup(frame),
		SYS_READDIR => readdir::readdir(frame),
		SYS_MKDIR => mkdir::mkdir(frame),
		SYS_RMDIR => rmdir::rmdir(frame),
		SYS_UNLINK => unlink::unlink(frame),
		SYS_RENAME => rename::rename(frame),
		SYS_STAT => stat::stat(frame),
		SYS_CHDIR => chdir::chdir(frame),
		SYS_GETCWD => getcwd::getcwd(frame),
		SYS_GETTIME => gettime::gettime(frame),
		SYS_SOCKET => net::socket(frame),
		SYS_SENDTO => net::sendto(frame),
		SYS_RECVFROM => net::recvfrom(frame),
		id => panic!("unknown syscall {id}"),
	};
	frame.eax = match result {
		Ok(val) => val as u32,
		Err(e) => (-e) as u32,
	};
}

/// Resolves a user-supplied path to its normalised absolute form, against
/// the current process's working directory.
pub(self) fn absolute_path(path: &str) -> alloc::string::String {
	let cwd = crate::process::getcwd();
	crate::file::path::normalize(path, &cwd)
}
