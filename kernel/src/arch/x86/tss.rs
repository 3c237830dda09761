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

//! The TSS (Task State Segment) is mostly deprecated, but it still tells the
//! CPU which stack to switch to when an interrupt crosses from ring 3 to
//! ring 0.

use crate::arch::x86::gdt;
use core::{arch::asm, mem, mem::size_of, ptr::addr_of};

/// Task State Segment.
#[repr(C)]
#[allow(missing_docs)]
pub struct Tss {
	pub prev_tss: u32,
	pub esp0: u32,
	pub ss0: u32,
	pub esp1: u32,
	pub ss1: u32,
	pub esp2: u32,
	pub ss2: u32,
	pub cr3: u32,
	pub eip: u32,
	pub eflags: u32,
	pub eax: u32,
	pub ecx: u32,
	pub edx: u32,
	pub ebx: u32,
	pub esp: u32,
	pub ebp: u32,
	pub esi: u32,
	pub edi: u32,
	pub es: u32,
	pub cs: u32,
	pub ss: u32,
	pub ds: u32,
	pub fs: u32,
	pub gs: u32,
	pub ldt: u32,
	pub trap: u16,
	pub iomap_base: u16,
}

/// The Task State Segment.
static mut TSS: Tss = unsafe { mem::zeroed() };

/// Initializes the TSS and loads it into the task register.
pub(crate) fn init() {
	unsafe {
		TSS.ss0 = gdt::KERNEL_DS as u32;
		// Setting the I/O map base beyond the segment limit forbids I/O
		// instructions from userspace
		TSS.iomap_base = size_of::<Tss>() as u16;
		gdt::set_tss_entry(addr_of!(TSS) as u32, (size_of::<Tss>() - 1) as u32);
		asm!("ltr ax", in("ax") gdt::TSS_OFFSET as u16);
	}
}

/// Sets the stack pointer the CPU switches to on a ring 3 to ring 0
/// transition.
pub fn set_kernel_stack(esp0: u32) {
	unsafe {
		TSS.esp0 = esp0;
	}
}
