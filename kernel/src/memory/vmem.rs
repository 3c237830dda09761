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

//! Virtual memory management.
//!
//! A [`VMem`] wraps one page directory. Directories themselves live in
//! kernelspace, so a foreign directory's entries can always be read
//! directly; the page *tables* of a foreign directory are reached through a
//! transient window in the scratch region (directory slot
//! [`WINDOW_SLOT`]), which every live directory shares.
//!
//! Kernelspace mappings are installed into the master directory and
//! mirrored into the bound directory, so that every address space observes
//! the same kernel mappings. The scheduler refreshes the kernel slots of a
//! directory right before binding it.

use crate::{
	arch::x86::paging,
	arch::x86::paging::{
		dir_index, table_index, Entry, Flags, Table, ENTRIES_PER_TABLE, RECURSIVE_SLOT,
		USERSPACE_TABLES,
	},
	errno,
	errno::EResult,
	memory::{bitmap, FrameIndex, PageIndex, PhysAddr, VirtAddr, KERNEL_BEGIN, PAGE_SIZE},
	sync::{once::OnceInit, spin::IntSpin},
};
use core::{ffi::c_void, ptr, slice};

/// The directory slot reserved for transient mapping windows.
pub const WINDOW_SLOT: usize = 1022;
/// The number of pages in the window region.
const WINDOW_PAGES: usize = ENTRIES_PER_TABLE;
/// The base virtual address of the window region.
const WINDOW_BASE: VirtAddr = VirtAddr(WINDOW_SLOT << 22);

/// The byte written over deallocated pages, to crash dangling references
/// early.
const DEALLOC_SENTINEL: u8 = 0x01;

unsafe extern "C" {
	/// The end of the kernel image in virtual memory (linker script symbol).
	static KERNEL_VIRTUAL_END: c_void;
	/// The end of the kernel image in physical memory (linker script symbol).
	static KERNEL_PHYS_END: c_void;
}

/// Returns the virtual address of the end of the kernel image.
pub fn kernel_virtual_end() -> VirtAddr {
	VirtAddr(unsafe { ptr::addr_of!(KERNEL_VIRTUAL_END) } as usize)
}

/// Returns the physical address of the end of the kernel image.
pub fn kernel_phys_end() -> PhysAddr {
	PhysAddr(unsafe { ptr::addr_of!(KERNEL_PHYS_END) } as usize)
}

/// Allocation bitmap for the window region, one bit per page.
static WINDOWS: IntSpin<[u32; WINDOW_PAGES / 32]> = IntSpin::new([0; WINDOW_PAGES / 32]);

/// Reserves `count` contiguous window slots.
fn window_reserve(count: usize) -> usize {
	let mut bits = WINDOWS.lock();
	let mut run = 0;
	for i in 0..WINDOW_PAGES {
		if bits[i / 32] & (1 << (i % 32)) != 0 {
			run = 0;
			continue;
		}
		run += 1;
		if run == count {
			let first = i + 1 - count;
			for j in first..=i {
				bits[j / 32] |= 1 << (j % 32);
			}
			return first;
		}
	}
	panic!("out of mapping windows");
}

/// Releases `count` window slots starting at `first`.
fn window_release(first: usize, count: usize) {
	let mut bits = WINDOWS.lock();
	for i in first..(first + count) {
		bits[i / 32] &= !(1 << (i % 32));
	}
}

/// Maps `frame` at the given window slot and returns the mapped address.
///
/// The scratch table is shared between all directories, so the mapping is
/// visible regardless of the bound directory.
fn window_map(slot: usize, frame: FrameIndex) -> VirtAddr {
	let addr = WINDOW_BASE + slot * PAGE_SIZE;
	unsafe {
		let scratch = paging::current_table(WINDOW_SLOT);
		scratch.0[slot] = Entry::new(frame, Flags::WRITE);
	}
	paging::invlpg(addr);
	addr
}

/// Unmaps the given window slot.
fn window_unmap(slot: usize) {
	let addr = WINDOW_BASE + slot * PAGE_SIZE;
	unsafe {
		let scratch = paging::current_table(WINDOW_SLOT);
		scratch.0[slot] = Entry::UNUSED;
	}
	paging::invlpg(addr);
}

/// Access to one page table of a [`VMem`], through the recursive mapping if
/// the directory is bound, through a window otherwise.
struct TableGuard {
	table: *mut Table,
	/// The window slot backing the access, if any.
	window: Option<usize>,
}

impl TableGuard {
	fn get(&self) -> &'static mut Table {
		unsafe { &mut *self.table }
	}
}

impl Drop for TableGuard {
	fn drop(&mut self) {
		if let Some(slot) = self.window {
			window_unmap(slot);
			window_release(slot, 1);
		}
	}
}

/// A virtual memory context, wrapping one page directory.
pub struct VMem {
	/// Kernel-virtual address of the directory page.
	dir: VirtAddr,
	/// Physical address of the directory page.
	dir_phys: PhysAddr,
}

/// The kernel's master virtual memory context.
static KERNEL_VMEM: OnceInit<VMem> = unsafe { OnceInit::new() };

/// Returns the kernel's master virtual memory context.
pub fn kernel_vmem() -> &'static VMem {
	KERNEL_VMEM.get()
}

impl VMem {
	/// Returns the physical address of the directory.
	pub fn phys(&self) -> PhysAddr {
		self.dir_phys
	}

	/// Tells whether the directory is currently bound to the CPU.
	pub fn is_bound(&self) -> bool {
		paging::bound_dir() == self.dir_phys
	}

	/// Binds the directory to the CPU.
	///
	/// # Safety
	///
	/// The directory must map the kernel's code, data and stacks.
	pub unsafe fn bind(&self) {
		paging::bind(self.dir_phys);
	}

	/// Returns a mutable reference to the directory's entries.
	///
	/// Directories live in kernelspace, which is mapped in every address
	/// space, so the access is always direct.
	fn dir(&self) -> &'static mut Table {
		unsafe { &mut *self.dir.as_ptr::<Table>() }
	}

	/// Returns access to the page table at directory slot `dir_idx`.
	///
	/// If the entry is absent and `create` is set, a new zeroed table is
	/// allocated and installed; otherwise the function returns `None`.
	fn table(&self, dir_idx: usize, create: bool) -> Option<TableGuard> {
		let dir = self.dir();
		if !dir.0[dir_idx].is_present() {
			if !create {
				return None;
			}
			let frame = bitmap::first_free_frame();
			let entry = Entry::new(frame, Flags::WRITE | Flags::USER);
			dir.0[dir_idx] = entry;
			// Mirror fresh kernelspace tables into the bound directory so the
			// new mapping is reachable immediately
			if dir_idx >= USERSPACE_TABLES && !self.is_bound() {
				unsafe {
					paging::current_dir().0[dir_idx] = entry;
				}
			}
			let guard = self.table_access(dir_idx, frame);
			guard.get().0.fill(Entry::UNUSED);
			return Some(guard);
		}
		let frame = dir.0[dir_idx].frame();
		Some(self.table_access(dir_idx, frame))
	}

	/// Returns an accessor for the table backed by `frame` at slot
	/// `dir_idx`.
	fn table_access(&self, dir_idx: usize, frame: FrameIndex) -> TableGuard {
		if self.is_bound() {
			paging::invlpg(VirtAddr(paging::RECURSIVE_BASE.0 + dir_idx * PAGE_SIZE));
			TableGuard {
				table: unsafe { paging::current_table(dir_idx) },
				window: None,
			}
		} else {
			let slot = window_reserve(1);
			let addr = window_map(slot, frame);
			TableGuard {
				table: addr.as_ptr(),
				window: Some(slot),
			}
		}
	}

	/// Installs a mapping from the page at `page` to `frame`.
	///
	/// If `may_remap` is `false` and the page is already present, the
	/// function fails with [`errno::EEXIST`].
	fn map_page(
		&self,
		page: PageIndex,
		frame: FrameIndex,
		kernel: bool,
		writable: bool,
		may_remap: bool,
	) -> EResult<()> {
		let addr = page.addr();
		let table = self.table(dir_index(addr), true).unwrap();
		let entry = &mut table.get().0[table_index(addr)];
		if entry.is_present() && !may_remap {
			return Err(errno!(EEXIST));
		}
		let mut flags = Flags::empty();
		if !kernel {
			flags |= Flags::USER;
		}
		if writable {
			flags |= Flags::WRITE;
		}
		*entry = Entry::new(frame, flags);
		// Kernelspace tables are shared across directories, so the entry
		// just written is live in the bound address space as well
		if self.is_bound() || addr.is_kernelspace() {
			paging::invlpg(addr);
		}
		Ok(())
	}

	/// Removes the mapping for the page at `page` and returns the frame it
	/// pointed to.
	///
	/// The frame's bitmap bit is left untouched.
	fn unmap_page(&self, page: PageIndex) -> Option<FrameIndex> {
		let addr = page.addr();
		let table = self.table(dir_index(addr), false)?;
		let entry = &mut table.get().0[table_index(addr)];
		if !entry.is_present() {
			return None;
		}
		let frame = entry.frame();
		*entry = Entry::UNUSED;
		if self.is_bound() || addr.is_kernelspace() {
			paging::invlpg(addr);
		}
		Some(frame)
	}

	/// Reads the page table entry for the given address.
	fn entry(&self, addr: VirtAddr) -> Option<Entry> {
		let table = self.table(dir_index(addr), false)?;
		let entry = table.get().0[table_index(addr)];
		entry.is_present().then_some(entry)
	}

	/// Finds `count` contiguous non-present pages.
	///
	/// The kernelspace search begins after the kernel image; the userspace
	/// search begins at the second page, so that the null address is never
	/// handed out.
	pub(crate) fn find_free_pages(&self, count: usize, kernel: bool) -> EResult<PageIndex> {
		let (first, end) = if kernel {
			(
				PageIndex::from_addr(kernel_virtual_end()),
				PageIndex((WINDOW_SLOT * ENTRIES_PER_TABLE) as u32),
			)
		} else {
			(
				PageIndex(1),
				PageIndex((USERSPACE_TABLES * ENTRIES_PER_TABLE) as u32),
			)
		};
		let mut run = 0usize;
		let mut page = first.0;
		while page < end.0 {
			let addr = PageIndex(page).addr();
			let dir_idx = dir_index(addr);
			// An absent directory slot is 1024 free pages at once
			if table_index(addr) == 0 && !self.dir().0[dir_idx].is_present() {
				run += ENTRIES_PER_TABLE;
				page += ENTRIES_PER_TABLE as u32;
			} else {
				let present = self
					.table(dir_idx, false)
					.map(|t| t.get().0[table_index(addr)].is_present())
					.unwrap_or(false);
				if present {
					run = 0;
				} else {
					run += 1;
				}
				page += 1;
			}
			if run >= count {
				return Ok(PageIndex(page - run as u32));
			}
		}
		Err(errno!(ENOMEM))
	}

	/// Allocates `count` contiguous virtual pages backed by fresh frames and
	/// returns the address of the first.
	///
	/// The kernelspace search begins after the kernel image.
	pub fn alloc_pages(&self, count: usize, kernel: bool, writable: bool) -> EResult<VirtAddr> {
		if count == 0 {
			return Err(errno!(EINVAL));
		}
		let first = self.find_free_pages(count, kernel)?;
		for i in 0..count {
			let frame = bitmap::first_free_frame();
			self.map_page(PageIndex(first.0 + i as u32), frame, kernel, writable, false)?;
		}
		Ok(first.addr())
	}

	/// Same as [`VMem::alloc_pages`], but at the given address.
	///
	/// Fails with [`errno::EEXIST`] if any target page is already present.
	pub fn alloc_pages_at(
		&self,
		addr: VirtAddr,
		size: usize,
		kernel: bool,
		writable: bool,
	) -> EResult<VirtAddr> {
		let first = PageIndex::from_addr(addr.down_align_to(PAGE_SIZE));
		let count = crate::memory::page_count(size);
		for i in 0..count {
			let page = PageIndex(first.0 + i as u32);
			if self.entry(page.addr()).is_some() {
				return Err(errno!(EEXIST));
			}
			let frame = bitmap::first_free_frame();
			self.map_page(page, frame, kernel, writable, false)?;
		}
		Ok(first.addr())
	}

	/// Deallocates `count` pages starting at `addr`.
	///
	/// Writable pages are overwritten with a sentinel byte first, so that
	/// dangling references crash early. Each page's backing frame is
	/// released exactly once.
	pub fn dealloc_pages(&self, addr: VirtAddr, count: usize) {
		let first = PageIndex::from_addr(addr);
		for i in 0..count {
			let page = PageIndex(first.0 + i as u32);
			// Kernelspace pages are reachable from any address space
			if self.is_bound() || page.addr().is_kernelspace() {
				if let Some(entry) = self.entry(page.addr()) {
					if entry.flags().contains(Flags::WRITE) {
						unsafe {
							slice::from_raw_parts_mut(page.addr().as_ptr::<u8>(), PAGE_SIZE)
								.fill(DEALLOC_SENTINEL);
						}
					}
				}
			}
			if let Some(frame) = self.unmap_page(page) {
				bitmap::clear_frame(frame);
			}
		}
	}

	/// Installs mappings from `first_page` to the caller-chosen `frames`.
	///
	/// Used to bind the framebuffer or DMA regions. The frames are marked
	/// as claimed in the frame bitmap.
	pub fn map_pages_at(
		&self,
		first_page: PageIndex,
		frames: &[FrameIndex],
		kernel: bool,
		writable: bool,
		may_remap: bool,
	) -> EResult<VirtAddr> {
		for (i, frame) in frames.iter().enumerate() {
			bitmap::set_frame(*frame);
			self.map_page(
				PageIndex(first_page.0 + i as u32),
				*frame,
				kernel,
				writable,
				may_remap,
			)?;
		}
		Ok(first_page.addr())
	}

	/// Temporarily exposes the range `addr..addr + size` of this address
	/// space in the current one, so the kernel can copy into or out of it
	/// without switching directories.
	///
	/// If `create` is set, absent pages in the target range are allocated
	/// as userspace pages with `user_writable` access.
	///
	/// On success, returns the window address corresponding to `addr`. The
	/// window must be released with [`unmap_pages`].
	pub fn link_pages(
		&self,
		addr: VirtAddr,
		size: usize,
		user_writable: bool,
		create: bool,
	) -> EResult<VirtAddr> {
		let first = PageIndex::from_addr(addr.down_align_to(PAGE_SIZE));
		let off = addr.0 % PAGE_SIZE;
		let count = crate::memory::page_count(off + size);
		let first_slot = window_reserve(count);
		for i in 0..count {
			let page = PageIndex(first.0 + i as u32);
			let frame = match self.entry(page.addr()) {
				Some(entry) => entry.frame(),
				None if create => {
					let frame = bitmap::first_free_frame();
					self.map_page(page, frame, false, user_writable, false)?;
					frame
				}
				None => {
					// Roll the window back
					for j in 0..i {
						window_unmap(first_slot + j);
					}
					window_release(first_slot, count);
					return Err(errno!(EFAULT));
				}
			};
			window_map(first_slot + i, frame);
		}
		Ok(WINDOW_BASE + first_slot * PAGE_SIZE + off)
	}

	/// Walks the directory and returns the physical address backing `addr`.
	pub fn translate(&self, addr: VirtAddr) -> Option<PhysAddr> {
		let entry = self.entry(addr)?;
		Some(PhysAddr(entry.frame().addr().0 + addr.0 % PAGE_SIZE))
	}

	/// Tells whether the range `addr..addr + size` is accessible.
	///
	/// `from_kernel` tells whether the access is performed by kernel code,
	/// which only requires the pages to be present. `write` tells whether
	/// the access is a write.
	pub fn is_accessible(&self, addr: VirtAddr, size: usize, from_kernel: bool, write: bool) -> bool {
		let first = PageIndex::from_addr(addr.down_align_to(PAGE_SIZE));
		let count = crate::memory::page_count(addr.0 % PAGE_SIZE + size.max(1));
		for i in 0..count {
			let page = PageIndex(first.0 + i as u32);
			let Some(entry) = self.entry(page.addr()) else {
				return false;
			};
			if from_kernel {
				continue;
			}
			let flags = entry.flags();
			if !flags.contains(Flags::USER) {
				return false;
			}
			if write && !flags.contains(Flags::WRITE) {
				return false;
			}
		}
		true
	}

	/// Deep-copies the userspace of this address space into a fresh one.
	///
	/// Kernelspace mappings are duplicated by reference; each present user
	/// page gets a fresh frame with its bytes copied. Used by `fork`.
	///
	/// The source directory must be bound.
	pub fn copy_user_space(&self) -> EResult<VMem> {
		assert!(self.is_bound());
		let dst = VMem::try_new()?;
		for dir_idx in 0..USERSPACE_TABLES {
			let Some(src_table) = self.table(dir_idx, false) else {
				continue;
			};
			for tbl_idx in 0..ENTRIES_PER_TABLE {
				let entry = src_table.get().0[tbl_idx];
				if !entry.is_present() {
					continue;
				}
				let page = PageIndex((dir_idx * ENTRIES_PER_TABLE + tbl_idx) as u32);
				let frame = bitmap::first_free_frame();
				// Copy the page's bytes through a window
				let slot = window_reserve(1);
				let win = window_map(slot, frame);
				unsafe {
					ptr::copy_nonoverlapping(
						page.addr().as_ptr::<u8>(),
						win.as_ptr::<u8>(),
						PAGE_SIZE,
					);
				}
				window_unmap(slot);
				window_release(slot, 1);
				let writable = entry.flags().contains(Flags::WRITE);
				dst.map_page(page, frame, false, writable, false)?;
			}
		}
		Ok(dst)
	}

	/// Releases every mapped user frame, every user page table frame, then
	/// the directory frame itself.
	pub fn free_user_space(self) {
		assert!(!self.is_bound());
		for dir_idx in 0..USERSPACE_TABLES {
			let dir_entry = self.dir().0[dir_idx];
			if !dir_entry.is_present() {
				continue;
			}
			{
				let table = self.table(dir_idx, false).unwrap();
				for entry in &table.get().0 {
					if entry.is_present() {
						bitmap::clear_frame(entry.frame());
					}
				}
			}
			self.dir().0[dir_idx] = Entry::UNUSED;
			bitmap::clear_frame(dir_entry.frame());
		}
		// Free the directory page itself
		kernel_vmem().dealloc_pages(self.dir, 1);
	}

	/// Refreshes this directory's kernelspace slots from the master
	/// directory.
	///
	/// Called by the scheduler before binding the directory, so that
	/// kernelspace stays identical across all live directories.
	pub fn copy_kernel_mappings(&self) {
		let master = kernel_vmem().dir();
		let dir = self.dir();
		for i in USERSPACE_TABLES..RECURSIVE_SLOT {
			dir.0[i] = master.0[i];
		}
	}

	/// Creates a fresh address space with kernelspace mapped and an empty
	/// userspace.
	pub fn try_new() -> EResult<VMem> {
		let dir = kernel_vmem().alloc_pages(1, true, true)?;
		let dir_phys = kernel_vmem()
			.translate(dir)
			.expect("fresh directory not mapped");
		let vmem = VMem {
			dir,
			dir_phys,
		};
		vmem.dir().0.fill(Entry::UNUSED);
		vmem.copy_kernel_mappings();
		// Install the self-referential slot
		vmem.dir().0[RECURSIVE_SLOT] =
			Entry::new(FrameIndex::from_addr(dir_phys), Flags::WRITE);
		Ok(vmem)
	}
}

/// Releases a window previously returned by [`VMem::link_pages`].
pub fn unmap_pages(window: VirtAddr, size: usize) {
	let off = window.0 % PAGE_SIZE;
	let first_slot = (window.0 - WINDOW_BASE.0 - off) / PAGE_SIZE;
	let count = crate::memory::page_count(off + size);
	for i in 0..count {
		window_unmap(first_slot + i);
	}
	window_release(first_slot, count);
}

/// Initializes virtual memory management.
///
/// Adopts the boot page directory as the kernel's master directory, removes
/// its identity mappings and installs the shared scratch table for mapping
/// windows.
pub(crate) fn init() {
	unsafe extern "C" {
		static BOOT_PAGE_DIR: c_void;
		static USER_BEGIN: c_void;
		static USER_END: c_void;
	}
	let dir_phys = PhysAddr(unsafe { ptr::addr_of!(BOOT_PAGE_DIR) } as usize);
	let master = VMem {
		dir: KERNEL_BEGIN + dir_phys.0,
		dir_phys,
	};
	// Drop the identity mappings installed at boot, userspace starts empty
	for i in 0..USERSPACE_TABLES {
		master.dir().0[i] = Entry::UNUSED;
	}
	// Open the `.user` section to ring 3: it carries the trampoline a fresh
	// process starts in. Code only, so the write permission is dropped
	let user_begin = VirtAddr(unsafe { ptr::addr_of!(USER_BEGIN) } as usize);
	let user_end = VirtAddr(unsafe { ptr::addr_of!(USER_END) } as usize);
	let mut addr = user_begin;
	while addr < user_end {
		let frame = FrameIndex::from_addr(PhysAddr(addr.0 - KERNEL_BEGIN.0));
		unsafe {
			let table = paging::current_table(dir_index(addr));
			table.0[table_index(addr)] = Entry::new(frame, Flags::USER);
		}
		paging::invlpg(addr);
		addr = addr + PAGE_SIZE;
	}
	// Install the scratch table shared by all directories
	let scratch_frame = bitmap::first_free_frame();
	master.dir().0[WINDOW_SLOT] = Entry::new(scratch_frame, Flags::WRITE);
	paging::flush_tlb();
	unsafe {
		paging::current_table(WINDOW_SLOT).0.fill(Entry::UNUSED);
		KERNEL_VMEM.init(master);
	}
	paging::flush_tlb();
}

#[cfg(test)]
mod test {
	use super::*;

	#[test_case]
	fn alloc_translate() {
		let vmem = kernel_vmem();
		let addr = vmem.alloc_pages(2, true, true).unwrap();
		let phys0 = vmem.translate(addr).unwrap();
		let phys1 = vmem.translate(addr + PAGE_SIZE).unwrap();
		assert!(bitmap::test_frame(FrameIndex::from_addr(phys0)));
		assert!(bitmap::test_frame(FrameIndex::from_addr(phys1)));
		vmem.dealloc_pages(addr, 2);
		assert!(!bitmap::test_frame(FrameIndex::from_addr(phys0)));
		assert_eq!(vmem.translate(addr), None);
	}

	#[test_case]
	fn accessibility() {
		let vmem = kernel_vmem();
		let addr = vmem.alloc_pages(1, true, true).unwrap();
		assert!(vmem.is_accessible(addr, PAGE_SIZE, true, true));
		// Kernel pages are not accessible to userspace
		assert!(!vmem.is_accessible(addr, PAGE_SIZE, false, false));
		vmem.dealloc_pages(addr, 1);
		assert!(!vmem.is_accessible(addr, PAGE_SIZE, true, false));
	}
}
