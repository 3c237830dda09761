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

//! Kernel panic handling.
//!
//! A kernel panic occurs when an error is raised that the kernel cannot
//! recover from. The panic prints the site, the message and the machine
//! state, then halts with interrupts disabled.

use crate::{
	arch::x86,
	arch::x86::{cli, idt::IntFrame},
	memory::VirtAddr,
	println, register_get,
};
use core::panic::PanicInfo;

/// Called on Rust panic.
#[panic_handler]
fn panic(panic_info: &PanicInfo) -> ! {
	cli();
	crate::logger::LOGGER.lock().silent = false;
	println!("-- KERNEL PANIC! --");
	match panic_info.location() {
		Some(loc) => println!("Reason: {} Location: {loc}", panic_info.message()),
		None => println!("Reason: {}", panic_info.message()),
	}
	x86::halt();
}

/// The list of interrupt error messages ordered by index of the
/// corresponding interrupt vector.
static INT_REASONS: &[&str] = &[
	"Divide-by-zero Error",
	"Debug",
	"Non-maskable Interrupt",
	"Breakpoint",
	"Overflow",
	"Bound Range Exceeded",
	"Invalid Opcode",
	"Device Not Available",
	"Double Fault",
	"Coprocessor Segment Overrun",
	"Invalid TSS",
	"Segment Not Present",
	"Stack-Segment Fault",
	"General Protection Fault",
	"Page Fault",
	"Unknown",
	"x87 Floating-Point Exception",
	"Alignment Check",
	"Machine Check",
	"SIMD Floating-Point Exception",
];

/// Panics with the information of an interrupt frame.
pub fn with_frame(frame: &IntFrame) -> ! {
	cli();
	crate::logger::LOGGER.lock().silent = false;
	let reason = INT_REASONS.get(frame.int as usize).unwrap_or(&"Unknown");
	println!("-- KERNEL PANIC! --");
	println!(
		"Reason: {reason} (vector {}, code {:#x})",
		frame.int, frame.code
	);
	println!(
		"eip: {:08x} cs: {:04x} eflags: {:08x}",
		frame.eip, frame.cs, frame.eflags
	);
	println!(
		"eax: {:08x} ebx: {:08x} ecx: {:08x} edx: {:08x}",
		frame.eax, frame.ebx, frame.ecx, frame.edx
	);
	println!(
		"esi: {:08x} edi: {:08x} ebp: {:08x}",
		frame.esi, frame.edi, frame.ebp
	);
	let cr2 = VirtAddr(register_get!("cr2"));
	let cr3 = register_get!("cr3");
	println!("cr2: {cr2:?} cr3: {cr3:08x}");
	x86::halt();
}
