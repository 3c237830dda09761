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

//! PIT (Programmable Interval Timer) driver, channel 0.

use crate::arch::x86::io::outb;

/// The PIT's base oscillator frequency in hertz.
const BASE_FREQUENCY: u32 = 1193182;

/// Channel 0 data port.
const CHANNEL_0: u16 = 0x40;
/// Mode/command port.
const COMMAND: u16 = 0x43;

/// Command: channel 0, lobyte/hibyte access, square wave generator.
const CMD_SQUARE_WAVE: u8 = 0b00110110;

/// Programs channel 0 to fire at approximately `freq` hertz.
pub fn set_frequency(freq: u32) {
	let mut divisor = BASE_FREQUENCY / freq;
	if divisor == 0 || divisor > 65535 {
		divisor = 65535;
	}
	unsafe {
		outb(COMMAND, CMD_SQUARE_WAVE);
		outb(CHANNEL_0, (divisor & 0xff) as u8);
		outb(CHANNEL_0, ((divisor >> 8) & 0xff) as u8);
	}
}
