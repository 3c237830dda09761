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

//! The Multiboot standard specifies the interface between the bootloader and
//! the kernel. The bootloader hands over a pointer to an information record
//! containing the physical memory map, the framebuffer and the list of boot
//! modules.

use crate::{
	memory::{PhysAddr, VirtAddr, KERNEL_BEGIN},
	sync::once::OnceInit,
};
use core::{ffi::c_void, marker::PhantomData};

/// The magic number passed by a Multiboot-compliant bootloader.
pub const BOOTLOADER_MAGIC: u32 = 0x2badb002;

/// Information record flag: the memory map is valid.
const INFO_MEM_MAP: u32 = 1 << 6;
/// Information record flag: the module list is valid.
const INFO_MODS: u32 = 1 << 3;
/// Information record flag: the framebuffer fields are valid.
const INFO_FRAMEBUFFER: u32 = 1 << 12;

/// Memory map entry type: usable RAM.
pub const MEMORY_AVAILABLE: u32 = 1;
/// Memory map entry type: ACPI reclaimable memory.
pub const MEMORY_ACPI_RECLAIMABLE: u32 = 3;

/// Framebuffer type: direct RGB.
pub const FRAMEBUFFER_TYPE_RGB: u8 = 1;
/// Framebuffer type: EGA text mode.
pub const FRAMEBUFFER_TYPE_EGA_TEXT: u8 = 2;

/// The raw information record, as laid out by the bootloader.
#[repr(C)]
struct InfoRecord {
	flags: u32,

	mem_lower: u32,
	mem_upper: u32,

	boot_device: u32,
	cmdline: u32,

	mods_count: u32,
	mods_addr: u32,

	syms: [u32; 4],

	mmap_length: u32,
	mmap_addr: u32,

	drives_length: u32,
	drives_addr: u32,

	config_table: u32,
	boot_loader_name: u32,
	apm_table: u32,

	vbe_control_info: u32,
	vbe_mode_info: u32,
	vbe_mode: u16,
	vbe_interface_seg: u16,
	vbe_interface_off: u16,
	vbe_interface_len: u16,

	framebuffer_addr: u64,
	framebuffer_pitch: u32,
	framebuffer_width: u32,
	framebuffer_height: u32,
	framebuffer_bpp: u8,
	framebuffer_type: u8,
	color_info: [u8; 6],
}

/// A memory map entry.
///
/// `base` and `len` are 64-bit even on a 32-bit machine, because the BIOS
/// may report ranges above the 4 GiB boundary.
#[repr(C, packed)]
pub struct MmapEntry {
	size: u32,
	/// Base physical address of the range.
	pub base: u64,
	/// Length of the range in bytes.
	pub len: u64,
	/// Type of the range. Type [`MEMORY_AVAILABLE`] is usable RAM.
	pub type_: u32,
}

/// A boot module entry.
#[repr(C)]
struct ModEntry {
	start: u32,
	end: u32,
	string: u32,
	reserved: u32,
}

/// The framebuffer handed over by the bootloader.
#[derive(Clone, Copy, Debug)]
pub struct FramebufferInfo {
	/// Physical address of the framebuffer.
	pub addr: PhysAddr,
	/// Bytes per scanline.
	pub pitch: u32,
	/// Width in pixels (or characters, in text mode).
	pub width: u32,
	/// Height in pixels (or characters, in text mode).
	pub height: u32,
	/// Bits per pixel.
	pub bpp: u8,
	/// Framebuffer type. See `FRAMEBUFFER_TYPE_*`.
	pub type_: u8,
}

/// Kernel boot information, structured and filtered.
pub struct BootInfo {
	/// The lower memory size in KiB.
	pub mem_lower: u32,
	/// The upper memory size in KiB.
	pub mem_upper: u32,

	/// Physical location of the memory map.
	mmap_addr: PhysAddr,
	/// Size of the memory map in bytes.
	mmap_length: usize,

	/// The framebuffer, if the bootloader provided one.
	pub framebuffer: Option<FramebufferInfo>,

	/// The first boot module, if any.
	pub module: Option<&'static [u8]>,
}

/// An iterator over the boot memory map.
///
/// Entries are variable-sized: each one carries the offset of the next.
pub struct MmapIter<'b> {
	cur: VirtAddr,
	end: VirtAddr,
	boot_info: PhantomData<&'b BootInfo>,
}

impl<'b> Iterator for MmapIter<'b> {
	type Item = &'b MmapEntry;

	fn next(&mut self) -> Option<Self::Item> {
		if self.cur >= self.end {
			return None;
		}
		let entry = unsafe { &*self.cur.as_ptr::<MmapEntry>() };
		self.cur = self.cur + (entry.size as usize + 4);
		Some(entry)
	}
}

impl BootInfo {
	/// Returns an iterator over the boot memory map.
	pub fn memory_map(&self) -> MmapIter<'_> {
		let cur = phys_to_boot_virt(self.mmap_addr);
		MmapIter {
			cur,
			end: cur + self.mmap_length,
			boot_info: PhantomData,
		}
	}
}

/// The boot information record.
static BOOT_INFO: OnceInit<BootInfo> = unsafe { OnceInit::new() };

/// Returns the boot information provided by the bootloader.
pub fn get_boot_info() -> &'static BootInfo {
	BOOT_INFO.get()
}

/// Converts a physical address in low memory to its boot-mapped virtual
/// address.
fn phys_to_boot_virt(addr: PhysAddr) -> VirtAddr {
	KERNEL_BEGIN + addr.0
}

/// Reads the information record at the given physical pointer and fills the
/// boot information structure.
///
/// # Safety
///
/// The caller must ensure `ptr` points to a valid Multiboot information
/// record located in boot-mapped low memory.
pub unsafe fn read(magic: u32, ptr: *const c_void) -> &'static BootInfo {
	if magic != BOOTLOADER_MAGIC {
		panic!("invalid multiboot magic: {magic:08x}");
	}
	let record = &*phys_to_boot_virt(PhysAddr(ptr as usize)).as_ptr::<InfoRecord>();
	if record.flags & INFO_MEM_MAP == 0 {
		panic!("bootloader did not provide a memory map");
	}
	let framebuffer = (record.flags & INFO_FRAMEBUFFER != 0).then(|| FramebufferInfo {
		addr: PhysAddr(record.framebuffer_addr as usize),
		pitch: record.framebuffer_pitch,
		width: record.framebuffer_width,
		height: record.framebuffer_height,
		bpp: record.framebuffer_bpp,
		type_: record.framebuffer_type,
	});
	let module = (record.flags & INFO_MODS != 0 && record.mods_count > 0).then(|| {
		let ent = &*phys_to_boot_virt(PhysAddr(record.mods_addr as usize)).as_ptr::<ModEntry>();
		let begin = phys_to_boot_virt(PhysAddr(ent.start as usize));
		core::slice::from_raw_parts(begin.as_ptr::<u8>(), (ent.end - ent.start) as usize)
	});
	BOOT_INFO.init(BootInfo {
		mem_lower: record.mem_lower,
		mem_upper: record.mem_upper,
		mmap_addr: PhysAddr(record.mmap_addr as usize),
		mmap_length: record.mmap_length as usize,
		framebuffer,
		module,
	});
	BOOT_INFO.get()
}
