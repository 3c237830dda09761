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

//! Interrupt event dispatch.
//!
//! Device drivers register IRQ callbacks through [`register_irq`]; the
//! common assembly stub funnels every vector into [`interrupt_handler`].
//!
//! Exceptions are fatal: there is no demand paging and no signal delivery,
//! so any unexpected fault panics the kernel.

use crate::{
	arch::x86::{
		idt::{IntFrame, SYSCALL_ENTRY},
		paging, pic,
	},
	sync::spin::IntSpin,
};

/// An IRQ callback.
pub type IrqHandler = fn(&mut IntFrame);

/// The page fault exception vector.
const PAGE_FAULT: u32 = 0x0e;

/// Registered IRQ handlers, indexed by IRQ number.
static IRQ_HANDLERS: IntSpin<[Option<IrqHandler>; 16]> = IntSpin::new([None; 16]);

/// Registers a callback for the given IRQ line and unmasks it.
pub fn register_irq(irq: u8, handler: IrqHandler) {
	assert!(irq < 16);
	{
		let mut handlers = IRQ_HANDLERS.lock();
		if handlers[irq as usize].is_some() {
			panic!("IRQ {irq} registered twice");
		}
		handlers[irq as usize] = Some(handler);
	}
	pic::enable_irq(irq);
}

/// The common interrupt entry point, called by the assembly stub with the
/// register image saved on the kernel stack.
#[no_mangle]
extern "C" fn interrupt_handler(frame: &mut IntFrame) {
	match frame.int {
		// System call
		n if n as usize == SYSCALL_ENTRY => crate::syscall::handle(frame),
		// Hardware IRQ
		n if (pic::IRQ_BASE as u32..pic::IRQ_BASE as u32 + 16).contains(&n) => {
			let irq = (n - pic::IRQ_BASE as u32) as u8;
			let handler = IRQ_HANDLERS.lock()[irq as usize];
			match handler {
				Some(handler) => handler(frame),
				// Spurious interrupt
				None => pic::end_of_interrupt(irq),
			}
		}
		// CPU exception
		PAGE_FAULT => {
			let addr = paging::fault_addr();
			crate::println!(
				"page fault at {addr:?} (code {:#x}, eip {:08x})",
				frame.code,
				frame.eip
			);
			crate::panic::with_frame(frame);
		}
		_ => crate::panic::with_frame(frame),
	}
}
