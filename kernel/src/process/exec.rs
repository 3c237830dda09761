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

//! Program execution.
//!
//! `exec` builds a fresh address space from an ELF image: each `PT_LOAD`
//! segment is linked into a window, zeroed and copied; the user stack is
//! laid out with `argc`, the `argv` pointers and the argument string
//! bodies just above the highest mapped address; finally the process's
//! directory is swapped and the trapframe rewritten so the interrupt
//! return lands on the new entry point.

use crate::{
	arch::x86::idt::IntFrame,
	elf,
	elf::Image,
	errno,
	errno::EResult,
	file::{vfs, OpenFlags},
	memory::{vmem, vmem::VMem, VirtAddr, PAGE_SIZE, PROCESS_END},
	process::{Process, State},
};
use alloc::{string::String, vec, vec::Vec};

/// The size of the user stack in pages.
const USER_STACK_PAGES: usize = 8;

/// Reads the whole file at `path` into memory.
fn read_program(path: &str) -> EResult<Vec<u8>> {
	let size = vfs::getattr_path(path)?.size as usize;
	let idx = vfs::open(path, OpenFlags::empty())?;
	let mut data = vec![0u8; size];
	let mut off = 0;
	let res = loop {
		if off >= size {
			break Ok(());
		}
		match vfs::read(idx, &mut data[off..]) {
			Ok(0) => break Err(errno!(EIO)),
			Ok(n) => off += n,
			Err(e) => break Err(e),
		}
	};
	vfs::close(idx)?;
	res?;
	Ok(data)
}

/// Copies `data` into `page_dir` at `vaddr`, allocating the target pages,
/// and zero-filling up to `mem_size`.
fn load_segment(
	page_dir: &VMem,
	vaddr: VirtAddr,
	data: &[u8],
	mem_size: usize,
	user_writable: bool,
) -> EResult<()> {
	let window = page_dir.link_pages(vaddr, mem_size, user_writable, true)?;
	unsafe {
		core::ptr::write_bytes(window.as_ptr::<u8>(), 0, mem_size);
		core::ptr::copy_nonoverlapping(data.as_ptr(), window.as_ptr::<u8>(), data.len());
	}
	vmem::unmap_pages(window, mem_size);
	Ok(())
}

/// Replaces the current process's program with the executable at `path`.
///
/// On success the function rewrites `frame` so that the interrupt return
/// resumes at the new program's entry point, and does not return an error
/// afterwards.
pub fn exec(frame: &mut IntFrame, path: &str, argv: &[String]) -> EResult<()> {
	let program = read_program(path)?;
	let image = Image::parse(&program)?;
	let page_dir = VMem::try_new()?;
	// Load every PT_LOAD segment and track the highest mapped address
	let mut vaddr_ub = 0u32;
	for phdr in image.program_headers() {
		if phdr.p_type != elf::PT_LOAD || phdr.p_memsz == 0 {
			continue;
		}
		let data = image.segment_data(&phdr)?;
		load_segment(
			&page_dir,
			VirtAddr(phdr.p_vaddr as usize),
			data,
			phdr.p_memsz as usize,
			phdr.p_flags & elf::PF_W != 0,
		)?;
		vaddr_ub = vaddr_ub.max(phdr.p_vaddr + phdr.p_memsz);
	}
	if vaddr_ub == 0 {
		return Err(errno!(ENOEXEC));
	}
	// The user stack sits right below kernelspace
	let stack_top = PROCESS_END;
	page_dir.alloc_pages_at(
		stack_top - USER_STACK_PAGES * PAGE_SIZE,
		USER_STACK_PAGES * PAGE_SIZE,
		false,
		true,
	)?;
	// Copy the argv string bodies just above the highest mapped address
	let mut arg_ptrs = Vec::with_capacity(argv.len());
	let mut cursor = vaddr_ub;
	for arg in argv {
		let bytes = arg.as_bytes();
		let window = page_dir.link_pages(VirtAddr(cursor as usize), bytes.len() + 1, false, true)?;
		unsafe {
			core::ptr::copy_nonoverlapping(bytes.as_ptr(), window.as_ptr::<u8>(), bytes.len());
			*window.as_ptr::<u8>().add(bytes.len()) = 0;
		}
		vmem::unmap_pages(window, bytes.len() + 1);
		arg_ptrs.push(cursor);
		cursor += bytes.len() as u32 + 1;
	}
	// Lay out the stack: fake return address, argc, argv, then the argv
	// array itself
	let argc = argv.len() as u32;
	let mut words: Vec<u32> = Vec::with_capacity(3 + argv.len() + 1);
	words.push(0);
	words.push(argc);
	let content_size = (3 + argv.len() + 1) * size_of::<u32>();
	let esp = stack_top - content_size;
	// `argv` points at the array laid out right after the fixed words
	words.push((esp.0 + 3 * size_of::<u32>()) as u32);
	words.extend_from_slice(&arg_ptrs);
	words.push(0);
	let window = page_dir.link_pages(esp, content_size, false, true)?;
	unsafe {
		core::ptr::copy_nonoverlapping(words.as_ptr(), window.as_ptr::<u32>(), words.len());
	}
	vmem::unmap_pages(window, content_size);
	// Swap the address space and schedule the return into the new program
	let old_dir = {
		let mut proc = Process::current().lock();
		debug_assert_eq!(proc.state, State::Running);
		page_dir.copy_kernel_mappings();
		let old = proc.page_dir.replace(page_dir);
		let new = proc.page_dir.as_ref().unwrap();
		unsafe {
			new.bind();
		}
		proc.size = cursor;
		proc.orig_size = cursor;
		old
	};
	if let Some(old_dir) = old_dir {
		old_dir.free_user_space();
	}
	frame.init_user(image.entry, esp.0 as u32);
	Ok(())
}
