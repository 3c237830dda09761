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

//! Boot video setup.
//!
//! The bootloader hands over either a VBE linear framebuffer (32 bpp only)
//! or legacy EGA text mode. In text mode, the EGA display is attached to
//! the TTY. With a framebuffer, the pixels are mapped into kernelspace
//! through `map_pages_at` and exposed for drawing; text output then only
//! reaches the serial port, since framebuffer text rendering belongs to an
//! external display driver.

use crate::{
	memory::{vmem, FrameIndex, VirtAddr, PAGE_SIZE},
	multiboot::{BootInfo, FramebufferInfo, FRAMEBUFFER_TYPE_EGA_TEXT, FRAMEBUFFER_TYPE_RGB},
	sync::once::OnceInit,
	tty,
	tty::vga::TextDisplay,
};
use alloc::vec::Vec;

/// A mapped linear framebuffer.
pub struct Framebuffer {
	/// Virtual address of the mapped pixels.
	addr: VirtAddr,
	/// Bytes per scanline.
	pitch: u32,
	/// Width in pixels.
	pub width: u32,
	/// Height in pixels.
	pub height: u32,
}

impl Framebuffer {
	/// Writes one pixel, `color` being `0x00RRGGBB`.
	pub fn put_pixel(&self, x: u32, y: u32, color: u32) {
		debug_assert!(x < self.width && y < self.height);
		let off = y as usize * self.pitch as usize + x as usize * 4;
		unsafe {
			core::ptr::write_volatile((self.addr + off).as_ptr::<u32>(), color);
		}
	}

	/// Fills a rectangle with the given color.
	pub fn fill_rect(&self, x: u32, y: u32, width: u32, height: u32, color: u32) {
		for j in y..(y + height).min(self.height) {
			for i in x..(x + width).min(self.width) {
				self.put_pixel(i, j, color);
			}
		}
	}
}

/// The mapped framebuffer, when the bootloader provided one.
static FRAMEBUFFER: OnceInit<Option<Framebuffer>> = unsafe { OnceInit::new() };

/// The EGA text display attached to the TTY in text mode.
static mut TEXT_DISPLAY: TextDisplay = TextDisplay;

/// Returns the mapped framebuffer, if any.
pub fn framebuffer() -> Option<&'static Framebuffer> {
	FRAMEBUFFER.get().as_ref()
}

/// Maps the framebuffer's physical range into kernelspace.
fn map_framebuffer(info: &FramebufferInfo) -> Framebuffer {
	let size = info.pitch as usize * info.height as usize;
	let pages = crate::memory::page_count(size);
	let frames: Vec<FrameIndex> = (0..pages)
		.map(|i| FrameIndex::from_addr(info.addr + i * PAGE_SIZE))
		.collect();
	let vmem = vmem::kernel_vmem();
	let first = vmem
		.find_free_pages(pages, true)
		.expect("no virtual space for the framebuffer");
	let addr = vmem
		.map_pages_at(first, &frames, true, true, false)
		.expect("cannot map the framebuffer");
	Framebuffer {
		addr,
		pitch: info.pitch,
		width: info.width,
		height: info.height,
	}
}

/// Initializes the boot display.
pub(crate) fn init(boot_info: &BootInfo) {
	let fb = match &boot_info.framebuffer {
		Some(info) if info.type_ == FRAMEBUFFER_TYPE_RGB => {
			if info.bpp != 32 {
				panic!("unsupported framebuffer depth: {} bpp", info.bpp);
			}
			let fb = map_framebuffer(info);
			log::info!("framebuffer {}x{}x32", fb.width, fb.height);
			Some(fb)
		}
		Some(info) if info.type_ == FRAMEBUFFER_TYPE_EGA_TEXT => {
			tty::attach_display(unsafe { &mut *core::ptr::addr_of_mut!(TEXT_DISPLAY) });
			None
		}
		// Without framebuffer information, assume legacy text mode
		None => {
			tty::attach_display(unsafe { &mut *core::ptr::addr_of_mut!(TEXT_DISPLAY) });
			None
		}
		Some(info) => panic!("unsupported framebuffer type: {}", info.type_),
	};
	unsafe {
		FRAMEBUFFER.init(fb);
	}
}
