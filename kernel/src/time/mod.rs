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

//! Time management.
//!
//! The PIT drives the scheduler tick; the RTC provides the wall clock.

pub mod pit;
pub mod rtc;

use crate::{
	arch::x86::{idt::IntFrame, pic},
	event,
};
use core::sync::atomic::{AtomicU64, Ordering::Relaxed};

/// The scheduler tick frequency in hertz.
pub const TICK_FREQUENCY: u32 = 50;
/// A yield is requested every `YIELD_TICKS` ticks.
const YIELD_TICKS: u64 = 2;

/// The number of ticks since boot.
static TICKS: AtomicU64 = AtomicU64::new(0);

/// Returns the number of timer ticks since boot.
pub fn ticks() -> u64 {
	TICKS.load(Relaxed)
}

/// Returns the current Unix timestamp, read from the RTC.
pub fn now() -> u32 {
	rtc::read().to_unix()
}

/// The timer interrupt callback.
///
/// The end-of-interrupt is sent *before* a potential context switch, so
/// that the next tick can be received while another process runs.
fn tick_handler(_frame: &mut IntFrame) {
	let ticks = TICKS.fetch_add(1, Relaxed) + 1;
	pic::end_of_interrupt(0);
	if ticks % YIELD_TICKS == 0 {
		crate::process::scheduler::preempt();
	}
}

/// Initializes time management: programs the PIT and hooks the tick.
pub(crate) fn init() {
	pit::set_frequency(TICK_FREQUENCY);
	event::register_irq(0, tick_handler);
}
