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

//! The TTY output engine.
//!
//! The TTY interprets control characters and ANSI escape sequences and
//! renders text through a [`Display`] port. Before a display is attached,
//! output is simply dropped (it still reaches the serial port through the
//! logger).

pub mod ansi;
pub mod vga;

use crate::sync::spin::IntSpin;
use ansi::AnsiBuffer;
use vga::Color;

/// A text display port.
///
/// The concrete display driver is an external collaborator; the TTY only
/// relies on this narrow surface.
pub trait Display: Send {
	/// Width of the display in characters.
	fn width(&self) -> i16;
	/// Height of the display in characters.
	fn height(&self) -> i16;
	/// Puts a character at the given position.
	fn put(&mut self, x: i16, y: i16, c: u8, fg: Color, bg: Color);
	/// Copies row `src` over row `dst`.
	fn copy_row(&mut self, src: i16, dst: i16);
	/// Clears row `y`.
	fn clear_row(&mut self, y: i16, bg: Color);
	/// Moves the hardware cursor.
	fn set_cursor(&mut self, x: i16, y: i16);
	/// Shows or hides the hardware cursor.
	fn show_cursor(&mut self, visible: bool);
}

/// Region selector for clear operations.
#[derive(Clone, Copy, Eq, PartialEq)]
pub enum Clear {
	/// From the cursor to the end of the screen.
	ScreenAfter,
	/// From the beginning of the screen to the cursor.
	ScreenBefore,
	/// The whole screen.
	Screen,
	/// From the cursor to the end of the line.
	LineAfter,
	/// From the beginning of the line to the cursor.
	LineBefore,
	/// The whole line.
	Line,
}

/// The TTY state.
pub struct Tty {
	/// Cursor column.
	pub cursor_x: i16,
	/// Cursor row.
	pub cursor_y: i16,

	fg: Color,
	bg: Color,
	cursor_visible: bool,

	/// Buffer for partially received ANSI sequences.
	pub(super) ansi_buffer: AnsiBuffer,

	display: Option<&'static mut dyn Display>,
}

/// The kernel's TTY.
pub static TTY: IntSpin<Tty> = IntSpin::new(Tty {
	cursor_x: 0,
	cursor_y: 0,
	fg: vga::DEFAULT_FG,
	bg: vga::DEFAULT_BG,
	cursor_visible: true,
	ansi_buffer: AnsiBuffer::new(),
	display: None,
});

impl Tty {
	fn width(&self) -> i16 {
		self.display.as_ref().map(|d| d.width()).unwrap_or(vga::WIDTH)
	}

	fn height(&self) -> i16 {
		self.display.as_ref().map(|d| d.height()).unwrap_or(vga::HEIGHT)
	}

	/// Scrolls the screen up by one row.
	fn scroll(&mut self) {
		let (height, bg) = (self.height(), self.bg);
		if let Some(display) = self.display.as_mut() {
			for y in 1..height {
				display.copy_row(y, y - 1);
			}
			display.clear_row(height - 1, bg);
		}
	}

	/// Moves the cursor down `n` rows, at the beginning of the line,
	/// scrolling if needed.
	pub fn newline(&mut self, n: i16) {
		self.cursor_x = 0;
		for _ in 0..n {
			if self.cursor_y == self.height() - 1 {
				self.scroll();
			} else {
				self.cursor_y += 1;
			}
		}
	}

	/// Prints one character at the cursor, handling control characters.
	pub fn putchar(&mut self, c: u8) {
		match c {
			b'\n' => self.newline(1),
			b'\r' => self.cursor_x = 0,
			b'\t' => {
				let next = (self.cursor_x / 8 + 1) * 8;
				self.cursor_x = next.min(self.width() - 1);
			}
			// Backspace
			0x08 => {
				if self.cursor_x > 0 {
					self.cursor_x -= 1;
					let (x, y, fg, bg) = (self.cursor_x, self.cursor_y, self.fg, self.bg);
					if let Some(display) = self.display.as_mut() {
						display.put(x, y, b' ', fg, bg);
					}
				}
			}
			c if (0x20..0x7f).contains(&c) => {
				let (x, y, fg, bg) = (self.cursor_x, self.cursor_y, self.fg, self.bg);
				if let Some(display) = self.display.as_mut() {
					display.put(x, y, c, fg, bg);
				}
				self.cursor_x += 1;
				if self.cursor_x >= self.width() {
					self.newline(1);
				}
			}
			_ => {}
		}
	}

	/// Clears the given region.
	pub fn clear(&mut self, region: Clear) {
		let (width, height, bg) = (self.width(), self.height(), self.bg);
		let (cx, cy) = (self.cursor_x, self.cursor_y);
		let Some(display) = self.display.as_mut() else {
			return;
		};
		match region {
			Clear::Screen => {
				for y in 0..height {
					display.clear_row(y, bg);
				}
			}
			Clear::ScreenAfter => {
				for x in cx..width {
					display.put(x, cy, b' ', vga::DEFAULT_FG, bg);
				}
				for y in (cy + 1)..height {
					display.clear_row(y, bg);
				}
			}
			Clear::ScreenBefore => {
				for y in 0..cy {
					display.clear_row(y, bg);
				}
				for x in 0..=cx {
					display.put(x, cy, b' ', vga::DEFAULT_FG, bg);
				}
			}
			Clear::Line => display.clear_row(cy, bg),
			Clear::LineAfter => {
				for x in cx..width {
					display.put(x, cy, b' ', vga::DEFAULT_FG, bg);
				}
			}
			Clear::LineBefore => {
				for x in 0..=cx {
					display.put(x, cy, b' ', vga::DEFAULT_FG, bg);
				}
			}
		}
	}

	/// Resets colors to their defaults.
	pub fn reset_attrs(&mut self) {
		self.fg = vga::DEFAULT_FG;
		self.bg = vga::DEFAULT_BG;
	}

	/// Sets the foreground color.
	pub fn set_fgcolor(&mut self, color: Color) {
		self.fg = color;
	}

	/// Sets the background color.
	pub fn set_bgcolor(&mut self, color: Color) {
		self.bg = color;
	}

	/// Resets the foreground color.
	pub fn reset_fgcolor(&mut self) {
		self.fg = vga::DEFAULT_FG;
	}

	/// Resets the background color.
	pub fn reset_bgcolor(&mut self) {
		self.bg = vga::DEFAULT_BG;
	}

	/// Swaps foreground and background colors.
	pub fn swap_colors(&mut self) {
		core::mem::swap(&mut self.fg, &mut self.bg);
	}

	/// Shows or hides the cursor.
	pub fn set_cursor_visible(&mut self, visible: bool) {
		self.cursor_visible = visible;
		if let Some(display) = self.display.as_mut() {
			display.show_cursor(visible);
		}
	}

	/// Clamps the cursor into the screen and flushes its position to the
	/// display.
	pub fn update(&mut self) {
		self.cursor_x = self.cursor_x.clamp(0, self.width() - 1);
		self.cursor_y = self.cursor_y.clamp(0, self.height() - 1);
		let (x, y, visible) = (self.cursor_x, self.cursor_y, self.cursor_visible);
		if let Some(display) = self.display.as_mut() {
			if visible {
				display.set_cursor(x, y);
			}
		}
	}

	/// Writes the given bytes, interpreting ANSI escape sequences.
	pub fn write(&mut self, bytes: &[u8]) {
		let mut i = 0;
		while i < bytes.len() {
			if bytes[i] == ansi::ESCAPE_CHAR || !self.ansi_buffer.is_empty() {
				i += ansi::handle(self, &bytes[i..]);
			} else {
				self.putchar(bytes[i]);
				i += 1;
			}
		}
		self.update();
	}
}

/// Attaches the given display to the TTY and clears it.
pub fn attach_display(display: &'static mut dyn Display) {
	let mut tty = TTY.lock();
	tty.display = Some(display);
	tty.clear(Clear::Screen);
	tty.update();
}

/// Writes kernel output to the TTY.
///
/// Called by the logger; does nothing before a display is attached.
pub fn write_kernel(bytes: &[u8]) {
	TTY.lock().write(bytes);
}
