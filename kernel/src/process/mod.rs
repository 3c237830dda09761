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

//! Process management.
//!
//! The process table is a fixed array of slots. Each process owns a page
//! directory, a one-page kernel stack carrying its trapframe, a kernel
//! context used for stack switching, an open-file table and a current
//! working directory.
//!
//! Exactly one process is `Running` at any instant outside the scheduler
//! loop. A `Zombie` keeps its exit code and pid until its parent (or init)
//! reaps it; children of an exiting process are re-parented to init.

pub mod exec;
pub mod scheduler;
pub mod user;

use crate::{
	arch::x86::idt::IntFrame,
	errno,
	errno::EResult,
	file::{fd::FdTable, path, vfs},
	limits::PROC_MAX,
	memory::{vmem, vmem::VMem, VirtAddr, PAGE_SIZE},
	sync::spin::IntSpin,
};
use alloc::string::{String, ToString};
use core::{
	mem::size_of,
	sync::atomic::{AtomicU32, AtomicUsize, Ordering::Relaxed},
};

/// A process identifier.
pub type Pid = u32;

/// The pid of the init process.
pub const INIT_PID: Pid = 1;

/// Sentinel marking "no current process".
const NO_CURRENT: usize = usize::MAX;

/// States of a process.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum State {
	/// The slot is free.
	Unused,
	/// The slot is claimed, the process is being built.
	Embryo,
	/// The process is ready to run.
	Runnable,
	/// The process is running on the CPU.
	Running,
	/// The process is waiting for an event.
	Sleeping,
	/// The process has exited and awaits reaping.
	Zombie,
}

/// The kernel-side register save area used to switch between kernel
/// stacks.
///
/// The layout matches the push sequence of `switch_kernel_context` in
/// [`scheduler`]: callee-saved registers, then the saved instruction
/// pointer.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct Context {
	pub edi: u32,
	pub esi: u32,
	pub ebx: u32,
	pub ebp: u32,
	pub eip: u32,
}

/// A process descriptor.
pub struct Process {
	/// The process id, monotonically allocated.
	pub pid: Pid,
	/// The current state.
	pub state: State,
	/// The process's address space.
	pub page_dir: Option<VMem>,
	/// The bottom of the one-page kernel stack. Null when unallocated.
	pub kernel_stack: VirtAddr,
	/// The parent's pid, `None` for init.
	pub parent: Option<Pid>,
	/// The trapframe, living at the top of the kernel stack.
	pub trapframe: *mut IntFrame,
	/// The saved kernel context.
	pub context: *mut Context,
	/// Highest user address in use; `sbrk` moves it.
	pub size: u32,
	/// The value of `size` right after `exec`; `sbrk` cannot go below it.
	pub orig_size: u32,
	/// The exit code, meaningful in state [`State::Zombie`].
	pub exit_code: i32,
	/// The current working directory, an owned absolute path.
	pub cwd: String,
	/// The file descriptor table.
	pub files: FdTable,
}

unsafe impl Send for Process {}

impl Process {
	const fn unused() -> Self {
		Self {
			pid: 0,
			state: State::Unused,
			page_dir: None,
			kernel_stack: VirtAddr(0),
			parent: None,
			trapframe: core::ptr::null_mut(),
			context: core::ptr::null_mut(),
			size: 0,
			orig_size: 0,
			exit_code: 0,
			cwd: String::new(),
			files: FdTable::new(),
		}
	}

	/// Returns the address one past the top of the kernel stack.
	pub fn kernel_stack_top(&self) -> VirtAddr {
		self.kernel_stack + PAGE_SIZE
	}
}

/// The process table.
static PROCESSES: [IntSpin<Process>; PROC_MAX] = [const { IntSpin::new(Process::unused()) }; PROC_MAX];

/// The slot index of the running process, [`NO_CURRENT`] inside the
/// scheduler loop.
static CURRENT: AtomicUsize = AtomicUsize::new(NO_CURRENT);

/// The next process id.
static NEXT_PID: AtomicU32 = AtomicU32::new(INIT_PID);

/// Returns the process slot at `idx`.
pub(crate) fn slot(idx: usize) -> &'static IntSpin<Process> {
	&PROCESSES[idx]
}

/// Returns the number of slots in the process table.
pub(crate) fn slot_count() -> usize {
	PROC_MAX
}

/// Returns the slot index of the running process, if any.
pub(crate) fn current_index() -> Option<usize> {
	let idx = CURRENT.load(Relaxed);
	(idx != NO_CURRENT).then_some(idx)
}

pub(crate) fn set_current_index(idx: Option<usize>) {
	CURRENT.store(idx.unwrap_or(NO_CURRENT), Relaxed);
}

impl Process {
	/// Returns the running process's slot.
	///
	/// Panics when called outside process context.
	pub fn current() -> &'static IntSpin<Process> {
		&PROCESSES[current_index().expect("no running process")]
	}

	/// Returns the running process's pid.
	pub fn current_pid() -> Pid {
		Self::current().lock().pid
	}
}

/// Reserves a free slot, assigns a new pid, allocates the kernel stack and
/// lays out the trapframe and the return trampoline on it.
///
/// The new process is left in state [`State::Embryo`]; the caller finishes
/// and marks it [`State::Runnable`].
///
/// Returns the slot index.
pub fn create_process() -> EResult<usize> {
	unsafe extern "C" {
		fn int_ret();
	}
	// Claim a slot
	let idx = 'claim: {
		for (idx, slot) in PROCESSES.iter().enumerate() {
			let mut proc = slot.lock();
			if proc.state == State::Unused {
				proc.state = State::Embryo;
				break 'claim idx;
			}
		}
		return Err(errno!(EAGAIN));
	};
	let mut proc = PROCESSES[idx].lock();
	proc.pid = NEXT_PID.fetch_add(1, Relaxed);
	proc.parent = None;
	proc.exit_code = 0;
	proc.size = 0;
	proc.orig_size = 0;
	proc.cwd = String::from("/");
	proc.files = FdTable::new();
	// One page of kernel stack
	let stack = vmem::kernel_vmem().alloc_pages(1, true, true)?;
	proc.kernel_stack = stack;
	unsafe {
		stack.as_ptr::<u8>().write_bytes(0, PAGE_SIZE);
	}
	// Lay out, from the top: trapframe, the address of the userspace return
	// trampoline, then the kernel context whose saved instruction pointer
	// targets the process setup routine. The call chain after the first
	// switch is: scheduler -> initialize_process -> int_ret -> userspace
	let mut sp = proc.kernel_stack_top();
	sp = sp - size_of::<IntFrame>();
	proc.trapframe = sp.as_ptr();
	sp = sp - size_of::<u32>();
	unsafe {
		*sp.as_ptr::<u32>() = int_ret as usize as u32;
	}
	sp = sp - size_of::<Context>();
	proc.context = sp.as_ptr();
	unsafe {
		*proc.context = Context {
			eip: initialize_process as usize as u32,
			..Default::default()
		};
	}
	Ok(idx)
}

/// First function of every process, running on its own kernel stack.
///
/// Returning from here lands on `int_ret`, which restores the trapframe
/// and drops to user mode.
extern "C" fn initialize_process() {
	// Nothing to release: the scheduler holds no lock across the switch
}

// The init trampoline. The `.user` section is mapped user-accessible, so
// this code is the only kernel code executable from ring 3; its job is to
// exec the real init binary. Addresses are resolved at link time.
core::arch::global_asm!(
	r#"
.section .user, "ax"

.global user_init_start
user_init_start:
	push offset init_argv
	push offset init_path
	# Fake return address: arguments start one word above the stack pointer
	push 0
	mov eax, {SYS_EXEC}
	int 0x80
	# `exec` does not return on success; nothing left to do on failure
.Lhang:
	jmp .Lhang

init_path:
	.asciz "/boot/usr/bin/init.elf"
.align 4
init_argv:
	.long init_path
	.long 0
"#,
	SYS_EXEC = const crate::syscall::SYS_EXEC,
);

/// Creates the first userspace process.
///
/// Its address space carries only the user-mapped trampoline and a stack
/// page; the trampoline execs the init binary.
pub fn init_first_process() -> EResult<()> {
	unsafe extern "C" {
		static user_init_start: core::ffi::c_void;
	}
	let idx = create_process()?;
	let mut proc = PROCESSES[idx].lock();
	assert_eq!(proc.pid, INIT_PID);
	let page_dir = VMem::try_new()?;
	// One page of user stack right below kernelspace
	let stack_top = crate::memory::PROCESS_END;
	page_dir.alloc_pages_at(stack_top - PAGE_SIZE, PAGE_SIZE, false, true)?;
	let entry = VirtAddr(core::ptr::addr_of!(user_init_start) as usize);
	unsafe {
		(*proc.trapframe).init_user(entry.0 as u32, stack_top.0 as u32);
	}
	proc.page_dir = Some(page_dir);
	proc.size = stack_top.0 as u32;
	proc.orig_size = proc.size;
	proc.state = State::Runnable;
	Ok(())
}

/// Forks the current process.
///
/// The child gets a deep copy of the caller's user space, a copy of the
/// trapframe with its result register forced to zero, duplicated file
/// descriptors (bumping open-file reference counts) and the same working
/// directory. Returns the child's pid.
pub fn fork(frame: &IntFrame) -> EResult<Pid> {
	let child_idx = create_process()?;
	// Duplicate the caller's state
	let duplicated = {
		let parent = Process::current().lock();
		match parent.page_dir.as_ref().unwrap().copy_user_space() {
			Ok(page_dir) => match parent.files.duplicate() {
				Ok(files) => Ok((
					page_dir,
					files,
					parent.cwd.clone(),
					parent.size,
					parent.orig_size,
					parent.pid,
				)),
				Err(e) => {
					drop(parent);
					page_dir.free_user_space();
					Err(e)
				}
			},
			Err(e) => Err(e),
		}
	};
	let (page_dir, files, cwd, size, orig_size, parent_pid) = match duplicated {
		Ok(state) => state,
		Err(e) => {
			// Put the claimed slot back so it can be reused
			let kernel_stack = {
				let mut child = PROCESSES[child_idx].lock();
				let stack = child.kernel_stack;
				*child = Process::unused();
				stack
			};
			vmem::kernel_vmem().dealloc_pages(kernel_stack, 1);
			return Err(e);
		}
	};
	let mut child = PROCESSES[child_idx].lock();
	child.page_dir = Some(page_dir);
	child.files = files;
	child.cwd = cwd;
	child.size = size;
	child.orig_size = orig_size;
	child.parent = Some(parent_pid);
	unsafe {
		*child.trapframe = frame.clone();
		// The child observes a zero return from `fork`
		(*child.trapframe).eax = 0;
	}
	let pid = child.pid;
	child.state = State::Runnable;
	Ok(pid)
}

/// Terminates the current process with the given exit code.
///
/// Every open file descriptor is closed, children are re-parented to init,
/// the process becomes a zombie and control returns to the scheduler. The
/// function does not return.
pub fn exit(code: i32) -> ! {
	let self_idx = current_index().expect("exit outside process context");
	let self_pid = {
		let mut proc = PROCESSES[self_idx].lock();
		let files = core::mem::take(&mut proc.files);
		let pid = proc.pid;
		drop(proc);
		// Closing may call into file systems; do it without the slot lock
		let mut files = files;
		files.close_all();
		pid
	};
	if self_pid == INIT_PID {
		panic!("init exited with code {code}");
	}
	// Re-parent children to init
	for (idx, slot) in PROCESSES.iter().enumerate() {
		if idx == self_idx {
			continue;
		}
		let mut proc = slot.lock();
		if proc.state != State::Unused && proc.parent == Some(self_pid) {
			proc.parent = Some(INIT_PID);
		}
	}
	{
		let mut proc = PROCESSES[self_idx].lock();
		proc.exit_code = code;
		proc.state = State::Zombie;
	}
	scheduler::yield_to_scheduler();
	unreachable!("return to an exited process");
}

/// Waits for a child process to exit.
///
/// Reaps the first zombie child found: frees its kernel stack and user
/// address space, clears its slot and returns its pid along with the
/// encoded wait status. While children exist but none is a zombie, the
/// process yields and retries. Without children, the call fails with
/// [`errno::ECHILD`].
pub fn wait() -> EResult<(Pid, i32)> {
	let self_pid = Process::current().lock().pid;
	loop {
		let mut has_child = false;
		for slot in PROCESSES.iter() {
			let reaped = {
				let mut child = slot.lock();
				if child.state == State::Unused || child.parent != Some(self_pid) {
					continue;
				}
				has_child = true;
				if child.state != State::Zombie {
					continue;
				}
				// Reap: take the resources out, then clear the slot
				let pid = child.pid;
				let status = (child.exit_code & 0xff) << 8;
				let page_dir = child.page_dir.take();
				let kernel_stack = child.kernel_stack;
				*child = Process::unused();
				Some((pid, status, page_dir, kernel_stack))
			};
			if let Some((pid, status, page_dir, kernel_stack)) = reaped {
				if let Some(page_dir) = page_dir {
					page_dir.free_user_space();
				}
				vmem::kernel_vmem().dealloc_pages(kernel_stack, 1);
				return Ok((pid, status));
			}
		}
		if !has_child {
			return Err(errno!(ECHILD));
		}
		scheduler::yield_now();
	}
}

/// Changes the current working directory.
///
/// The argument is resolved to an absolute form and must name a directory.
pub fn chdir(path: &str) -> EResult<()> {
	let abs = {
		let proc = Process::current().lock();
		path::normalize(path, &proc.cwd)
	};
	let stat = vfs::getattr_path(&abs)?;
	if !stat.is_dir() {
		return Err(errno!(ENOTDIR));
	}
	Process::current().lock().cwd = abs;
	Ok(())
}

/// Returns the current working directory.
pub fn getcwd() -> String {
	Process::current().lock().cwd.to_string()
}

/// Extends (or, if `delta` is negative, contracts) the process's user-space
/// high-water mark, never below its original size.
///
/// Returns the previous mark.
pub fn sbrk(delta: i32) -> EResult<u32> {
	let (old_size, new_size) = {
		let proc = Process::current().lock();
		let old = proc.size;
		let new = old as i64 + delta as i64;
		if new < proc.orig_size as i64 || new > crate::memory::PROCESS_END.0 as i64 {
			return Err(errno!(EINVAL));
		}
		(old, new as u32)
	};
	if new_size > old_size {
		// Allocate the pages covering the growth
		let first = VirtAddr(old_size as usize).align_to(PAGE_SIZE);
		let end = VirtAddr(new_size as usize).align_to(PAGE_SIZE);
		if end > first {
			let proc = Process::current().lock();
			let page_dir = proc.page_dir.as_ref().unwrap();
			page_dir.alloc_pages_at(first, end.0 - first.0, false, true)?;
		}
	} else if new_size < old_size {
		let first = VirtAddr(new_size as usize).align_to(PAGE_SIZE);
		let end = VirtAddr(old_size as usize).align_to(PAGE_SIZE);
		if end > first {
			let proc = Process::current().lock();
			let page_dir = proc.page_dir.as_ref().unwrap();
			page_dir.dealloc_pages(first, (end.0 - first.0) / PAGE_SIZE);
		}
	}
	Process::current().lock().size = new_size;
	Ok(old_size)
}
