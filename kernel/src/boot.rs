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

//! Kernel entry.
//!
//! The `.boot` sections run identity-mapped, before paging is enabled. The
//! entry code installs the boot page directory, which maps the first
//! [`BOOT_MAPPED_MEMORY`] bytes of physical memory both at identity and in
//! the higher half, then jumps to [`crate::kernel_main`] at its virtual
//! address. The boot directory stays alive afterwards as the kernel's
//! master page directory.

use crate::arch::x86::paging::{Entry, Flags, Table, ENTRIES_PER_TABLE};
use crate::memory::{FrameIndex, PAGE_SIZE};
use core::arch::global_asm;

/// Boot stack size in bytes.
pub const BOOT_STACK_SIZE: usize = 32768;

/// The number of statically allocated boot page tables.
const BOOT_TABLES_COUNT: usize = 4;
/// The amount of physical memory mapped by the boot page tables.
pub const BOOT_MAPPED_MEMORY: usize = BOOT_TABLES_COUNT * ENTRIES_PER_TABLE * PAGE_SIZE;

/// The boot page tables, mapping the first [`BOOT_MAPPED_MEMORY`] bytes of
/// physical memory with 4 KiB entries.
///
/// The statics are marked as **mutable** because the CPU sets accessed and
/// dirty flags.
#[no_mangle]
#[link_section = ".boot.data"]
static mut BOOT_PAGE_TABLES: [Table; BOOT_TABLES_COUNT] = const {
	let mut tables = [Table::new(), Table::new(), Table::new(), Table::new()];
	let mut i = 0;
	while i < BOOT_TABLES_COUNT * ENTRIES_PER_TABLE {
		let frame = FrameIndex(i as u32);
		tables[i / ENTRIES_PER_TABLE].0[i % ENTRIES_PER_TABLE] =
			Entry::new_const(frame, Flags::WRITE);
		i += 1;
	}
	tables
};

/// The boot page directory, which becomes the kernel's master directory.
///
/// Its table entries and its self-referential slot depend on physical
/// addresses only known at link time, so they are installed by the entry
/// assembly below.
#[no_mangle]
#[link_section = ".boot.data"]
static mut BOOT_PAGE_DIR: Table = Table::new();

global_asm!(
	r#"
.code32
.section .boot.text, "ax"

# Multiboot header
.align 4
header:
	# Multiboot magic
	.long 0x1badb002
	# Flags: page-align modules, memory info, video mode
	.long 0x00000007
	# Checksum
	.long -(0x1badb002 + 0x00000007)
	# Unused address fields (valid only with flag bit 16)
	.long 0, 0, 0, 0, 0
	# Video: linear framebuffer, 1024x768x32
	.long 0
	.long 1024
	.long 768
	.long 32

.section .boot.stack, "aw"
.align 8
boot_stack:
.skip {BOOT_STACK_SIZE}
boot_stack_top:

.section .boot.text, "ax"

.global multiboot_entry
.type multiboot_entry, @function

multiboot_entry:
	cld
	# Install the boot page tables into the directory, both identity and
	# higher half. The directory entries carry the user bit: user access is
	# controlled at the table level, where only the `.user` section is open
	mov esi, offset BOOT_PAGE_TABLES
	or esi, 0x7
	mov edi, 0
fill_dir:
	mov [BOOT_PAGE_DIR + edi * 4], esi
	mov [BOOT_PAGE_DIR + 768 * 4 + edi * 4], esi
	add esi, 4096
	inc edi
	cmp edi, {BOOT_TABLES_COUNT}
	jne fill_dir
	# Install the self-referential slot
	mov esi, offset BOOT_PAGE_DIR
	or esi, 0x3
	mov [BOOT_PAGE_DIR + 1023 * 4], esi
	# Enable paging and write protection
	mov ecx, offset BOOT_PAGE_DIR
	mov cr3, ecx
	mov ecx, cr0
	or ecx, 0x80010000
	mov cr0, ecx
	# Jump to the higher half
	mov ecx, offset higher_half
	jmp ecx

.section .text

higher_half:
	mov esp, offset boot_stack_top
	add esp, 0xc0000000
	xor ebp, ebp
	# `kernel_main(magic, multiboot_ptr)`
	push ebx
	push eax
	call kernel_main
	# `kernel_main` never returns
	ud2
"#,
	BOOT_STACK_SIZE = const BOOT_STACK_SIZE,
	BOOT_TABLES_COUNT = const BOOT_TABLES_COUNT,
);
