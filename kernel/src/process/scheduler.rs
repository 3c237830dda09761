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

//! The cooperative round-robin scheduler.
//!
//! The scheduler is an infinite loop over the process table, running on its
//! own stack (the boot stack). For each runnable process it refreshes the
//! directory's kernel mappings, points the TSS at the top of the process's
//! kernel stack, and swaps kernel contexts into it. The process comes back
//! by swapping into the saved scheduler context, either voluntarily or when
//! the timer tick requests a yield.
//!
//! The scheduler never runs on a user stack, and no spin lock is ever held
//! across a context switch.

use crate::{
	arch::x86,
	arch::x86::{cli, hlt, sti, tss},
	process,
	process::{Context, State},
};
use core::arch::global_asm;

unsafe extern "C" {
	/// Swaps kernel stacks: pushes the callee-saved registers, stores the
	/// stack pointer into `*old`, loads `new` as the stack pointer and pops
	/// the callee-saved registers of the target context.
	fn switch_kernel_context(old: *mut *mut Context, new: *mut Context);
}

// The layout popped here is the `Context` structure.
global_asm!(
	r#"
.section .text
.global switch_kernel_context
switch_kernel_context:
	mov eax, [esp + 4]
	mov edx, [esp + 8]

	push ebp
	push ebx
	push esi
	push edi

	# Swap stacks
	mov [eax], esp
	mov esp, edx

	pop edi
	pop esi
	pop ebx
	pop ebp
	ret
"#
);

/// The saved scheduler context. Only touched with interrupts disabled.
static mut SCHEDULER_CONTEXT: *mut Context = core::ptr::null_mut();

/// The scheduler loop. Never returns.
///
/// With no runnable process, the CPU sleeps with interrupts enabled until
/// the next tick.
pub fn scheduler() -> ! {
	loop {
		cli();
		let mut ran = false;
		for idx in 0..process::slot_count() {
			let (context, sched_slot) = {
				let mut proc = process::slot(idx).lock();
				if proc.state != State::Runnable {
					continue;
				}
				proc.state = State::Running;
				// Kernelspace must look identical from every directory
				let page_dir = proc.page_dir.as_ref().unwrap();
				page_dir.copy_kernel_mappings();
				tss::set_kernel_stack(proc.kernel_stack_top().0 as u32);
				unsafe {
					page_dir.bind();
				}
				(proc.context, core::ptr::addr_of_mut!(SCHEDULER_CONTEXT))
			};
			process::set_current_index(Some(idx));
			unsafe {
				switch_kernel_context(sched_slot, context);
			}
			process::set_current_index(None);
			ran = true;
		}
		if !ran {
			// Nothing to run: wait for an interrupt to change the picture
			sti();
			hlt();
		}
	}
}

/// Swaps the current process out, back into the scheduler loop.
///
/// The caller must have updated the process's state first.
pub(super) fn yield_to_scheduler() {
	let idx = process::current_index().expect("yield outside process context");
	cli();
	let context_slot = {
		let mut proc = process::slot(idx).lock();
		core::ptr::addr_of_mut!(proc.context)
	};
	unsafe {
		switch_kernel_context(context_slot, SCHEDULER_CONTEXT);
	}
}

/// Voluntarily gives the CPU away; the process is rescheduled on a later
/// round.
///
/// Outside process context (during early boot), the function is a no-op,
/// which turns yield loops into plain busy waits.
pub fn yield_now() {
	let Some(idx) = process::current_index() else {
		return;
	};
	let int_state = x86::is_interrupt_enabled();
	cli();
	{
		let mut proc = process::slot(idx).lock();
		if proc.state == State::Running {
			proc.state = State::Runnable;
		}
	}
	yield_to_scheduler();
	if int_state {
		sti();
	}
}

/// Requests a yield from the timer interrupt.
///
/// Runs on the interrupted process's kernel stack; the end-of-interrupt has
/// already been sent, so the switched-to process can receive the next tick.
pub fn preempt() {
	let Some(idx) = process::current_index() else {
		return;
	};
	let running = {
		let proc = process::slot(idx).lock();
		proc.state == State::Running
	};
	if running {
		yield_now();
	}
}
