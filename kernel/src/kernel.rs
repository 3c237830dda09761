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

//! Sonata is a self-hosting 32-bit x86 kernel written in Rust.
//!
//! Boot order matters: physical memory first, then virtual memory, then the
//! heap; everything past that point may allocate. The kernel ends up in the
//! scheduler loop, which never returns.

#![no_std]
#![no_main]
#![feature(alloc_error_handler)]
#![feature(custom_test_frameworks)]
#![feature(negative_impls)]
#![allow(dead_code)]
#![allow(internal_features)]
#![test_runner(crate::selftest::runner)]
#![reexport_test_harness_main = "kernel_selftest"]

extern crate alloc;

pub mod arch;
mod boot;
pub mod device;
pub mod elf;
#[macro_use]
pub mod errno;
pub mod event;
pub mod file;
pub mod limits;
pub mod logger;
pub mod memory;
pub mod multiboot;
pub mod panic;
#[macro_use]
pub mod print;
pub mod process;
pub mod selftest;
pub mod sync;
pub mod syscall;
pub mod time;
pub mod tty;
pub mod video;

use crate::arch::x86::{gdt, idt, pic, tss};
use core::ffi::c_void;

/// The kernel's name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
/// Current kernel version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The main function of the Rust code, responsible for the initialization
/// of the kernel, never returning.
///
/// Arguments:
/// - `magic` is the magic number passed by the bootloader.
/// - `multiboot_ptr` is the physical pointer to the boot information
///   record.
#[no_mangle]
pub extern "C" fn kernel_main(magic: u32, multiboot_ptr: *const c_void) -> ! {
	// Tables first: nothing may fault or get interrupted without them
	gdt::init();
	tss::init();
	pic::init();
	idt::init();
	device::serial::init();
	logger::init();
	log::info!("boot {NAME} version {VERSION}");

	// Read boot information
	let boot_info = unsafe { multiboot::read(magic, multiboot_ptr) };

	// Memory management, leaves first
	log::info!("setup memory management");
	memory::bitmap::initialize_bitmap(boot_info, memory::vmem::kernel_phys_end());
	memory::vmem::init();
	memory::malloc::init();
	// From now on, the kernel may allocate

	#[cfg(test)]
	{
		kernel_selftest();
		crate::arch::x86::halt();
	}

	log::info!("setup display");
	video::init(boot_info);

	log::info!("setup devices");
	device::keyboard::init();
	device::storage::init();

	log::info!("setup time management");
	time::init();

	log::info!("setup files management");
	file::init().expect("files management initialization failed");

	log::info!("spawn init process");
	process::init_first_process().expect("cannot create the init process");

	arch::x86::sti();
	process::scheduler::scheduler();
}
