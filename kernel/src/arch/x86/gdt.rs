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

//! The GDT (Global Descriptor Table) describes memory segments.
//!
//! Segmentation is legacy, but the table is still required to handle
//! protection rings and to load the Task State Segment. All segments span
//! the whole address space.

use core::arch::asm;
use core::mem::size_of;

/// The offset of the kernel code segment.
pub const KERNEL_CS: usize = 8;
/// The offset of the kernel data segment.
pub const KERNEL_DS: usize = 16;
/// The offset of the user code segment.
pub const USER_CS: usize = 24;
/// The offset of the user data segment.
pub const USER_DS: usize = 32;
/// The offset of the Task State Segment.
pub const TSS_OFFSET: usize = 40;

/// Requested Privilege Level for ring 3.
pub const USER_RPL: usize = 3;

/// A GDT entry.
#[repr(C, align(8))]
#[derive(Clone, Copy, Default)]
pub struct Entry(pub u64);

impl Entry {
	/// Creates a new entry with the given information.
	pub const fn new(base: u32, limit: u32, access_byte: u8, flags: u8) -> Self {
		let mut val = 0u64;
		val |= limit as u64 & 0xffff;
		val |= ((limit as u64 >> 16) & 0xf) << 48;
		val |= (base as u64 & 0xffffff) << 16;
		val |= ((base as u64 >> 24) & 0xff) << 56;
		val |= (access_byte as u64) << 40;
		val |= ((flags as u64) & 0xf) << 52;
		Self(val)
	}
}

/// The number of entries in the GDT.
const ENTRIES_COUNT: usize = 6;

/// The GDT.
///
/// The TSS entry is filled at initialization since it depends on the TSS's
/// address.
static mut GDT: [Entry; ENTRIES_COUNT] = [
	// Null entry
	Entry(0),
	// Kernel code
	Entry::new(0, !0, 0b10011010, 0b1100),
	// Kernel data
	Entry::new(0, !0, 0b10010010, 0b1100),
	// User code
	Entry::new(0, !0, 0b11111010, 0b1100),
	// User data
	Entry::new(0, !0, 0b11110010, 0b1100),
	// TSS
	Entry(0),
];

/// Sets the TSS entry of the GDT.
///
/// # Safety
///
/// `base` and `limit` must describe a valid TSS.
pub unsafe fn set_tss_entry(base: u32, limit: u32) {
	GDT[TSS_OFFSET / 8] = Entry::new(base, limit, 0b10001001, 0b0000);
}

/// Loads the GDT and reloads segment registers.
pub(crate) fn init() {
	#[repr(C, packed)]
	struct Gdtr {
		size: u16,
		offset: u32,
	}
	unsafe {
		let gdtr = Gdtr {
			size: (size_of::<[Entry; ENTRIES_COUNT]>() - 1) as u16,
			offset: core::ptr::addr_of!(GDT) as u32,
		};
		asm!(
			"lgdt [{gdtr}]",
			// Reload data segments
			"mov ax, {ds}",
			"mov ds, ax",
			"mov es, ax",
			"mov fs, ax",
			"mov gs, ax",
			"mov ss, ax",
			// Reload the code segment with a far jump
			"push {cs}",
			"lea eax, [3f]",
			"push eax",
			"retf",
			"3:",
			gdtr = in(reg) &gdtr,
			ds = const KERNEL_DS,
			cs = const KERNEL_CS,
			out("eax") _,
		);
	}
}
