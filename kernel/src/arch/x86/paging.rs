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

//! x86 two-level paging primitives.
//!
//! The last slot of every page directory points at the directory itself, so
//! that while a directory is bound, the directory and all its page tables
//! are reachable at fixed virtual addresses at the very top of the address
//! space (the *recursive mapping*). The price is that the last 4 MiB of
//! kernelspace cannot be used for regular mappings.

use crate::memory::{FrameIndex, PhysAddr, VirtAddr, PAGE_SIZE};
use bitflags::bitflags;
use core::arch::asm;

/// The number of entries in a page directory or page table.
pub const ENTRIES_PER_TABLE: usize = 1024;
/// The index of the self-referential slot in a page directory.
pub const RECURSIVE_SLOT: usize = ENTRIES_PER_TABLE - 1;
/// The number of page directory entries reserved for userspace.
pub const USERSPACE_TABLES: usize = 768;

/// The base virtual address of the recursive mapping region.
///
/// While a directory is bound, the page table for directory slot `i` is
/// visible at `RECURSIVE_BASE + i * PAGE_SIZE`, and the directory itself at
/// the very last page.
pub const RECURSIVE_BASE: VirtAddr = VirtAddr(0xffc00000);
/// The virtual address of the currently bound page directory.
pub const CURRENT_DIR: VirtAddr = VirtAddr(0xfffff000);

bitflags! {
	/// Flags of a page directory/page table entry.
	#[repr(transparent)]
	#[derive(Clone, Copy, Debug, Eq, PartialEq)]
	pub struct Flags: u32 {
		/// The entry is present.
		const PRESENT = 1 << 0;
		/// The page can be written.
		const WRITE = 1 << 1;
		/// The page can be accessed by userspace operations.
		const USER = 1 << 2;
		/// Write-through caching is enabled for the page.
		const WRITE_THROUGH = 1 << 3;
		/// The page is not cached.
		const CACHE_DISABLE = 1 << 4;
		/// The page has been read or written.
		const ACCESSED = 1 << 5;
		/// The page has been written.
		const DIRTY = 1 << 6;
		/// The directory entry maps a 4 MiB page.
		const PAGE_SIZE = 1 << 7;
	}
}

/// A page directory or page table entry.
///
/// An entry carries flag bits in its low byte and a 20-bit frame index in
/// its upper bits.
#[repr(transparent)]
#[derive(Clone, Copy, Default, Eq, PartialEq)]
pub struct Entry(u32);

impl Entry {
	/// An absent entry.
	pub const UNUSED: Self = Self(0);

	/// Creates an entry from the given frame and flags.
	///
	/// The [`Flags::PRESENT`] flag is inserted automatically.
	#[inline]
	pub fn new(frame: FrameIndex, flags: Flags) -> Self {
		Self::new_const(frame, flags)
	}

	/// Like [`Entry::new`], but usable in const context.
	pub const fn new_const(frame: FrameIndex, flags: Flags) -> Self {
		Self((frame.0 << 12) | flags.bits() | Flags::PRESENT.bits())
	}

	/// Tells whether the entry is present.
	#[inline]
	pub fn is_present(self) -> bool {
		self.0 & Flags::PRESENT.bits() != 0
	}

	/// Returns the entry's flags.
	#[inline]
	pub fn flags(self) -> Flags {
		Flags::from_bits_truncate(self.0)
	}

	/// Returns the index of the frame the entry points to.
	#[inline]
	pub fn frame(self) -> FrameIndex {
		FrameIndex(self.0 >> 12)
	}
}

/// A page directory or page table.
#[repr(C, align(4096))]
pub struct Table(pub [Entry; ENTRIES_PER_TABLE]);

impl Table {
	/// Creates a new zeroed table.
	pub const fn new() -> Self {
		Self([Entry::UNUSED; ENTRIES_PER_TABLE])
	}

	/// Tells whether the table has no present entry.
	pub fn is_empty(&self) -> bool {
		self.0.iter().all(|e| !e.is_present())
	}
}

/// Returns the directory slot index for the given virtual address.
#[inline]
pub fn dir_index(addr: VirtAddr) -> usize {
	(addr.0 >> 22) & 0x3ff
}

/// Returns the page table slot index for the given virtual address.
#[inline]
pub fn table_index(addr: VirtAddr) -> usize {
	(addr.0 >> 12) & 0x3ff
}

/// Returns a reference to the currently bound page directory, through the
/// recursive mapping.
///
/// # Safety
///
/// The caller must ensure exclusive access to the directory for the lifetime
/// of the reference.
pub unsafe fn current_dir<'a>() -> &'a mut Table {
	&mut *CURRENT_DIR.as_ptr()
}

/// Returns a reference to the page table for directory slot `dir_idx` of the
/// currently bound directory, through the recursive mapping.
///
/// # Safety
///
/// The directory entry at `dir_idx` must be present, and the caller must
/// ensure exclusive access to the table for the lifetime of the reference.
pub unsafe fn current_table<'a>(dir_idx: usize) -> &'a mut Table {
	&mut *(RECURSIVE_BASE + dir_idx * PAGE_SIZE).as_ptr()
}

/// Binds the page directory at the given physical address to the CPU.
///
/// # Safety
///
/// The caller must ensure the directory maps the kernel's code, data and
/// stacks at their expected addresses.
#[inline]
pub unsafe fn bind(dir: PhysAddr) {
	asm!("mov cr3, {}", in(reg) dir.0);
}

/// Returns the physical address of the currently bound page directory.
#[inline]
pub fn bound_dir() -> PhysAddr {
	PhysAddr(crate::register_get!("cr3"))
}

/// Invalidates the TLB entry for the page at the given address.
#[inline]
pub fn invlpg(addr: VirtAddr) {
	unsafe {
		asm!("invlpg [{}]", in(reg) addr.0, options(nostack));
	}
}

/// Flushes the whole TLB by reloading the page directory register.
#[inline]
pub fn flush_tlb() {
	unsafe {
		asm!(
			"mov {tmp}, cr3",
			"mov cr3, {tmp}",
			tmp = out(reg) _
		);
	}
}

/// Returns the address that caused the last page fault.
#[inline]
pub fn fault_addr() -> VirtAddr {
	VirtAddr(crate::register_get!("cr2"))
}
