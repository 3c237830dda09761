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

//! PS/2 keyboard driver.
//!
//! Scancodes (set 1) are translated to ASCII and pushed into a fixed input
//! ring, which the console file system consumes.

use crate::{arch::x86::idt::IntFrame, arch::x86::io::inb, arch::x86::pic, event, sync::spin::IntSpin};

/// The keyboard data port.
const DATA_PORT: u16 = 0x60;

/// The size of the input ring in bytes.
const RING_SIZE: usize = 256;

/// Key release bit in a set-1 scancode.
const RELEASE: u8 = 0x80;

/// Left and right shift scancodes.
const LEFT_SHIFT: u8 = 0x2a;
const RIGHT_SHIFT: u8 = 0x36;
/// Caps lock scancode.
const CAPS_LOCK: u8 = 0x3a;
/// The prefix of extended scancodes.
const EXTENDED: u8 = 0xe0;

/// Scancode set 1 to ASCII, unshifted.
static PLAIN_MAP: [u8; 0x3a] = [
	0, 0x1b, b'1', b'2', b'3', b'4', b'5', b'6', b'7', b'8', b'9', b'0', b'-', b'=', 0x08, b'\t',
	b'q', b'w', b'e', b'r', b't', b'y', b'u', b'i', b'o', b'p', b'[', b']', b'\n', 0, b'a', b's',
	b'd', b'f', b'g', b'h', b'j', b'k', b'l', b';', b'\'', b'`', 0, b'\\', b'z', b'x', b'c', b'v',
	b'b', b'n', b'm', b',', b'.', b'/', 0, b'*', 0, b' ',
];

/// Scancode set 1 to ASCII, shifted.
static SHIFT_MAP: [u8; 0x3a] = [
	0, 0x1b, b'!', b'@', b'#', b'$', b'%', b'^', b'&', b'*', b'(', b')', b'_', b'+', 0x08, b'\t',
	b'Q', b'W', b'E', b'R', b'T', b'Y', b'U', b'I', b'O', b'P', b'{', b'}', b'\n', 0, b'A', b'S',
	b'D', b'F', b'G', b'H', b'J', b'K', b'L', b':', b'"', b'~', 0, b'|', b'Z', b'X', b'C', b'V',
	b'B', b'N', b'M', b'<', b'>', b'?', 0, b'*', 0, b' ',
];

struct Keyboard {
	ring: [u8; RING_SIZE],
	read: usize,
	write: usize,

	shift: bool,
	caps_lock: bool,
	/// The previous byte was an extended prefix.
	extended: bool,
}

impl Keyboard {
	fn push(&mut self, c: u8) {
		if c == 0 {
			return;
		}
		if self.write == (self.read + RING_SIZE - 1) % RING_SIZE {
			// Ring is full, drop the input
			return;
		}
		self.ring[self.write] = c;
		self.write = (self.write + 1) % RING_SIZE;
	}

	fn pop(&mut self) -> Option<u8> {
		if self.read == self.write {
			return None;
		}
		let c = self.ring[self.read];
		self.read = (self.read + 1) % RING_SIZE;
		Some(c)
	}

	fn handle_scancode(&mut self, code: u8) {
		if code == EXTENDED {
			self.extended = true;
			return;
		}
		if self.extended {
			// Cursor and navigation keys are not translated
			self.extended = false;
			return;
		}
		match code {
			LEFT_SHIFT | RIGHT_SHIFT => self.shift = true,
			c if c == (LEFT_SHIFT | RELEASE) || c == (RIGHT_SHIFT | RELEASE) => self.shift = false,
			CAPS_LOCK => self.caps_lock = !self.caps_lock,
			c if c & RELEASE != 0 => {}
			c => {
				let map = if self.shift { &SHIFT_MAP } else { &PLAIN_MAP };
				let Some(&ascii) = map.get(c as usize) else {
					return;
				};
				let mut ascii = ascii;
				if self.caps_lock && ascii.is_ascii_alphabetic() {
					ascii ^= 0x20;
				}
				self.push(ascii);
			}
		}
	}
}

static KEYBOARD: IntSpin<Keyboard> = IntSpin::new(Keyboard {
	ring: [0; RING_SIZE],
	read: 0,
	write: 0,
	shift: false,
	caps_lock: false,
	extended: false,
});

fn keyboard_handler(_frame: &mut IntFrame) {
	let code = unsafe { inb(DATA_PORT) };
	KEYBOARD.lock().handle_scancode(code);
	pic::end_of_interrupt(1);
}

/// Pops one character from the input ring.
///
/// Returns `None` if no input is pending.
pub fn read_key() -> Option<u8> {
	KEYBOARD.lock().pop()
}

/// Hooks the keyboard IRQ.
pub(crate) fn init() {
	event::register_irq(1, keyboard_handler);
}
