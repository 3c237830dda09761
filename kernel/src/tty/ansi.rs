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

//! ANSI escape sequences allow to control the terminal through its output
//! stream.
//!
//! Supported CSI commands: cursor moves (`A`..`D`, `E`, `G`, `H`), clear
//! screen/line (`J`, `K`), SGR color and attributes (`m`), cursor
//! visibility (`?25h`/`?25l`) and the cursor-position report (`6n`), whose
//! response is injected into the console input stream.

use super::{vga, Clear, Tty};
use core::str;

/// The character initializing an ANSI escape sequence.
pub const ESCAPE_CHAR: u8 = 0x1b;
/// The Control Sequence Introducer character.
const CSI_CHAR: u8 = b'[';

/// The size of the buffer used to parse ANSI escape sequences.
const BUFFER_SIZE: usize = 64;
/// The maximum number of parameters in a sequence.
const SEQ_MAX: usize = 5;

/// Possible states of the parser after looking at the buffer.
enum AnsiState {
	/// The sequence is valid and has been executed.
	Valid,
	/// The sequence is incomplete, waiting for more data.
	Incomplete,
	/// The sequence is invalid; its bytes are printed as normal characters.
	Invalid,
}

/// A FIFO buffer for partially received escape sequences.
pub struct AnsiBuffer {
	buf: [u8; BUFFER_SIZE],
	cursor: usize,
}

impl AnsiBuffer {
	/// Creates an empty buffer.
	pub const fn new() -> Self {
		Self {
			buf: [0; BUFFER_SIZE],
			cursor: 0,
		}
	}

	/// Tells whether the buffer is empty.
	pub fn is_empty(&self) -> bool {
		self.cursor == 0
	}

	/// Pushes as much of `data` as fits, returning the number of pushed
	/// bytes.
	fn push_back(&mut self, data: &[u8]) -> usize {
		let len = data.len().min(BUFFER_SIZE - self.cursor);
		self.buf[self.cursor..(self.cursor + len)].copy_from_slice(&data[..len]);
		self.cursor += len;
		len
	}

	/// Removes the first `n` bytes.
	fn pop_front(&mut self, n: usize) {
		self.buf.rotate_left(n);
		self.cursor -= n;
	}

	/// Clears the buffer.
	fn clear(&mut self) {
		self.cursor = 0;
	}
}

/// A consuming view over the TTY's ANSI buffer.
///
/// Consuming data on the view does not affect the underlying buffer, only
/// the view itself.
struct View<'t> {
	tty: &'t mut Tty,
	cursor: usize,
}

impl<'t> View<'t> {
	fn buffer(&self) -> &[u8] {
		&self.tty.ansi_buffer.buf[..self.tty.ansi_buffer.cursor]
	}

	fn consumed(&self) -> usize {
		self.cursor
	}

	fn peek(&self) -> Option<u8> {
		self.buffer().get(self.cursor).copied()
	}

	fn next(&mut self) -> Option<u8> {
		let c = self.peek()?;
		self.cursor += 1;
		Some(c)
	}

	/// Consumes the next decimal number, if any.
	fn next_nbr(&mut self) -> Option<u32> {
		let digits = self.buffer()[self.cursor..]
			.iter()
			.take_while(|c| c.is_ascii_digit())
			.count();
		if digits == 0 {
			return None;
		}
		let s = str::from_utf8(&self.buffer()[self.cursor..(self.cursor + digits)]).ok()?;
		let n = str::parse::<u32>(s).ok()?;
		self.cursor += digits;
		Some(n)
	}

	/// Consumes a `;`-separated sequence of numbers into `buf`, truncating
	/// extra parameters.
	fn next_nbr_sequence<'b>(&mut self, buf: &'b mut [Option<u32>]) -> &'b [Option<u32>] {
		let mut i = 0;
		for b in buf.iter_mut() {
			*b = self.next_nbr();
			i += 1;
			if self.peek() != Some(b';') {
				break;
			}
			self.cursor += 1;
		}
		// Skip remaining parameters of the sequence
		loop {
			if self.next_nbr().is_some() {
				continue;
			}
			if self.peek() == Some(b';') {
				self.cursor += 1;
				continue;
			}
			break;
		}
		&buf[..i]
	}
}

/// Returns the VGA color associated with an SGR command.
fn color_from_sgr(cmd: u8) -> vga::Color {
	match cmd {
		30 | 40 => vga::COLOR_BLACK,
		31 | 41 => vga::COLOR_RED,
		32 | 42 => vga::COLOR_GREEN,
		33 | 43 => vga::COLOR_BROWN,
		34 | 44 => vga::COLOR_BLUE,
		35 | 45 => vga::COLOR_MAGENTA,
		36 | 46 => vga::COLOR_CYAN,
		37 | 47 => vga::COLOR_LIGHT_GREY,
		90 | 100 => vga::COLOR_DARK_GREY,
		91 | 101 => vga::COLOR_LIGHT_RED,
		92 | 102 => vga::COLOR_LIGHT_GREEN,
		93 | 103 => vga::COLOR_YELLOW,
		94 | 104 => vga::COLOR_LIGHT_BLUE,
		95 | 105 => vga::COLOR_LIGHT_MAGENTA,
		96 | 106 => vga::COLOR_LIGHT_CYAN,
		97 | 107 => vga::COLOR_WHITE,
		_ => vga::COLOR_BLACK,
	}
}

/// Moves the cursor. `d` is the direction character, `n` the count.
fn move_cursor(tty: &mut Tty, d: u8, n: Option<u32>) -> AnsiState {
	let n = n.unwrap_or(1).clamp(0, i16::MAX as u32) as i16;
	match d {
		b'A' => tty.cursor_y = (tty.cursor_y - n).max(0),
		b'B' => tty.cursor_y += n,
		b'C' => tty.cursor_x += n,
		b'D' => tty.cursor_x = (tty.cursor_x - n).max(0),
		_ => return AnsiState::Invalid,
	}
	AnsiState::Valid
}

/// Handles a Select Graphic Rendition command.
fn parse_sgr(tty: &mut Tty, seq: &[Option<u32>]) -> AnsiState {
	match seq.first().copied().flatten().unwrap_or(0) {
		0 => tty.reset_attrs(),
		7 => tty.swap_colors(),
		c @ (30..=37 | 90..=97) => tty.set_fgcolor(color_from_sgr(c as u8)),
		39 => tty.reset_fgcolor(),
		c @ (40..=47 | 100..=107) => tty.set_bgcolor(color_from_sgr(c as u8)),
		49 => tty.reset_bgcolor(),
		// Unsupported font attributes are accepted and ignored
		1..=29 | 50..=107 => {}
		_ => return AnsiState::Invalid,
	}
	AnsiState::Valid
}

/// Parses and executes the CSI sequence in the view.
fn parse_csi(view: &mut View) -> AnsiState {
	if view.peek() == Some(b'?') {
		// Private mode: cursor visibility
		view.cursor += 1;
		return match (view.next_nbr(), view.next()) {
			(Some(25), Some(b'h')) => {
				view.tty.set_cursor_visible(true);
				AnsiState::Valid
			}
			(Some(25), Some(b'l')) => {
				view.tty.set_cursor_visible(false);
				AnsiState::Valid
			}
			(_, None) => AnsiState::Incomplete,
			_ => AnsiState::Invalid,
		};
	}
	let mut seq_buf: [Option<u32>; SEQ_MAX] = [None; SEQ_MAX];
	let seq = view.next_nbr_sequence(seq_buf.as_mut_slice());
	let Some(cmd) = view.next() else {
		return AnsiState::Incomplete;
	};
	let state = match (seq, cmd) {
		(&[nbr], b'A'..=b'D') => move_cursor(view.tty, cmd, nbr),
		(&[nbr], b'E') => {
			view.tty.newline(nbr.unwrap_or(1).clamp(1, i16::MAX as u32) as i16);
			AnsiState::Valid
		}
		(&[nbr], b'G') => {
			view.tty.cursor_x = nbr.unwrap_or(1).clamp(1, i16::MAX as u32) as i16 - 1;
			AnsiState::Valid
		}
		(&[row, column], b'H') | (&[row, column], b'f') => {
			view.tty.cursor_y = row.unwrap_or(1).clamp(1, i16::MAX as u32) as i16 - 1;
			view.tty.cursor_x = column.unwrap_or(1).clamp(1, i16::MAX as u32) as i16 - 1;
			AnsiState::Valid
		}
		(&[row], b'H') => {
			view.tty.cursor_y = row.unwrap_or(1).clamp(1, i16::MAX as u32) as i16 - 1;
			view.tty.cursor_x = 0;
			AnsiState::Valid
		}
		(&[nbr], b'J') => {
			let region = match nbr.unwrap_or(0) {
				0 => Clear::ScreenAfter,
				1 => Clear::ScreenBefore,
				2 => Clear::Screen,
				_ => return AnsiState::Invalid,
			};
			view.tty.clear(region);
			AnsiState::Valid
		}
		(&[nbr], b'K') => {
			let region = match nbr.unwrap_or(0) {
				0 => Clear::LineAfter,
				1 => Clear::LineBefore,
				2 => Clear::Line,
				_ => return AnsiState::Invalid,
			};
			view.tty.clear(region);
			AnsiState::Valid
		}
		(&[Some(6)], b'n') => {
			// Cursor position report, injected into the console input
			let mut buf = [0u8; 16];
			let row = view.tty.cursor_y + 1;
			let col = view.tty.cursor_x + 1;
			let len = format_report(&mut buf, row, col);
			crate::file::fs::console::push_input(&buf[..len]);
			AnsiState::Valid
		}
		(seq, b'm') => parse_sgr(view.tty, seq),
		_ => AnsiState::Invalid,
	};
	view.tty.update();
	state
}

/// Formats the `ESC [ row ; col R` cursor report into `buf` and returns its
/// length.
fn format_report(buf: &mut [u8; 16], row: i16, col: i16) -> usize {
	use core::fmt::Write;
	struct Cursor<'b> {
		buf: &'b mut [u8],
		len: usize,
	}
	impl Write for Cursor<'_> {
		fn write_str(&mut self, s: &str) -> core::fmt::Result {
			let end = (self.len + s.len()).min(self.buf.len());
			self.buf[self.len..end].copy_from_slice(&s.as_bytes()[..(end - self.len)]);
			self.len = end;
			Ok(())
		}
	}
	let mut cursor = Cursor {
		buf,
		len: 0,
	};
	let _ = write!(cursor, "\x1b[{row};{col}R");
	cursor.len
}

/// Parses the sequence at the head of the buffer.
fn parse(view: &mut View) -> AnsiState {
	if view.next() != Some(ESCAPE_CHAR) {
		return AnsiState::Invalid;
	}
	let Some(prefix) = view.next() else {
		return AnsiState::Incomplete;
	};
	match prefix {
		CSI_CHAR => parse_csi(view),
		_ => AnsiState::Invalid,
	}
}

/// Feeds `input` to the TTY's ANSI parser.
///
/// Returns the number of input bytes consumed.
pub fn handle(tty: &mut Tty, input: &[u8]) -> usize {
	let n = tty.ansi_buffer.push_back(input);
	if n == 0 {
		// The buffer is stuck full on an unfinished sequence, drop it
		tty.ansi_buffer.clear();
		return 0;
	}
	while !tty.ansi_buffer.is_empty() {
		if tty.ansi_buffer.buf[0] != ESCAPE_CHAR {
			break;
		}
		let mut view = View {
			tty: &mut *tty,
			cursor: 0,
		};
		let state = parse(&mut view);
		let len = view.consumed();
		match state {
			AnsiState::Valid => {}
			AnsiState::Incomplete => break,
			AnsiState::Invalid => {
				for i in 0..len {
					tty.putchar(tty.ansi_buffer.buf[i]);
				}
			}
		}
		tty.ansi_buffer.pop_front(len);
	}
	// Flush leading non-escape bytes back through the regular path
	while !tty.ansi_buffer.is_empty() && tty.ansi_buffer.buf[0] != ESCAPE_CHAR {
		let c = tty.ansi_buffer.buf[0];
		tty.ansi_buffer.pop_front(1);
		tty.putchar(c);
	}
	n
}
