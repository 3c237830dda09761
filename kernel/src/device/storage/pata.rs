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

//! ATA PIO driver for the primary IDE channel, 28-bit addressing.
//!
//! Transfers are polled, one word at a time. Slow, but the interface is
//! narrow and there is no DMA engine to set up.

use super::BlockStorage;
use crate::{
	arch::x86::io::{inb, inw, outb, outw},
	errno,
	errno::EResult,
	sync::spin::IntSpin,
};

/// The sector size in bytes.
pub const SECTOR_SIZE: usize = 512;

/// Primary channel I/O base port.
const IO_BASE: u16 = 0x1f0;
/// Primary channel control port.
const CONTROL: u16 = 0x3f6;

/// Data register.
const REG_DATA: u16 = IO_BASE;
/// Error register.
const REG_ERROR: u16 = IO_BASE + 1;
/// Sector count register.
const REG_SECTOR_COUNT: u16 = IO_BASE + 2;
/// LBA low register.
const REG_LBA_LO: u16 = IO_BASE + 3;
/// LBA mid register.
const REG_LBA_MID: u16 = IO_BASE + 4;
/// LBA high register.
const REG_LBA_HI: u16 = IO_BASE + 5;
/// Drive/head register.
const REG_DRIVE: u16 = IO_BASE + 6;
/// Status/command register.
const REG_STATUS: u16 = IO_BASE + 7;

/// Status: error.
const STATUS_ERR: u8 = 1 << 0;
/// Status: drive fault.
const STATUS_DF: u8 = 1 << 5;
/// Status: data request ready.
const STATUS_DRQ: u8 = 1 << 3;
/// Status: busy.
const STATUS_BSY: u8 = 1 << 7;

/// Command: read sectors with retries.
const CMD_READ_SECTORS: u8 = 0x20;
/// Command: write sectors with retries.
const CMD_WRITE_SECTORS: u8 = 0x30;
/// Command: flush the write cache.
const CMD_CACHE_FLUSH: u8 = 0xe7;
/// Command: identify device.
const CMD_IDENTIFY: u8 = 0xec;

/// One transfer at a time on the channel.
static CHANNEL: IntSpin<()> = IntSpin::new(());

/// A drive on the primary IDE channel.
pub struct PataDrive {
	/// Tells whether the drive is the slave.
	slave: bool,
	/// Total number of addressable sectors (28-bit).
	sectors: u32,
}

fn status() -> u8 {
	unsafe { inb(REG_STATUS) }
}

/// Waits until the drive is no longer busy.
fn wait_not_busy() -> EResult<()> {
	while status() & STATUS_BSY != 0 {
		core::hint::spin_loop();
	}
	Ok(())
}

/// Waits until the drive is ready to transfer data.
fn wait_data_request() -> EResult<()> {
	loop {
		let status = status();
		if status & (STATUS_ERR | STATUS_DF) != 0 {
			return Err(errno!(EIO));
		}
		if status & STATUS_BSY == 0 && status & STATUS_DRQ != 0 {
			return Ok(());
		}
		core::hint::spin_loop();
	}
}

/// Selects the drive and programs an LBA and sector count.
fn select(slave: bool, lba: u32, count: u8) {
	unsafe {
		outb(
			REG_DRIVE,
			0xe0 | ((slave as u8) << 4) | ((lba >> 24) & 0x0f) as u8,
		);
		outb(REG_SECTOR_COUNT, count);
		outb(REG_LBA_LO, (lba & 0xff) as u8);
		outb(REG_LBA_MID, ((lba >> 8) & 0xff) as u8);
		outb(REG_LBA_HI, ((lba >> 16) & 0xff) as u8);
	}
}

/// Reads the 400ns-delay status register a few times to let the drive
/// settle after selection.
fn settle() {
	for _ in 0..4 {
		unsafe {
			inb(CONTROL);
		}
	}
}

impl PataDrive {
	/// Probes for a drive, returning `None` when absent.
	pub fn detect(slave: bool) -> Option<Self> {
		let _guard = CHANNEL.lock();
		unsafe {
			outb(REG_DRIVE, 0xa0 | ((slave as u8) << 4));
			settle();
			outb(REG_SECTOR_COUNT, 0);
			outb(REG_LBA_LO, 0);
			outb(REG_LBA_MID, 0);
			outb(REG_LBA_HI, 0);
			outb(REG_STATUS, CMD_IDENTIFY);
			if status() == 0 {
				// No drive on the line
				return None;
			}
			while status() & STATUS_BSY != 0 {
				core::hint::spin_loop();
			}
			// A non-ATA device aborts with junk in the LBA registers
			if inb(REG_LBA_MID) != 0 || inb(REG_LBA_HI) != 0 {
				return None;
			}
			wait_data_request().ok()?;
			let mut identify = [0u16; 256];
			for word in identify.iter_mut() {
				*word = inw(REG_DATA);
			}
			// Words 60-61 hold the total count of 28-bit addressable sectors
			let sectors = identify[60] as u32 | ((identify[61] as u32) << 16);
			if sectors == 0 {
				return None;
			}
			Some(Self {
				slave,
				sectors,
			})
		}
	}

	fn check_range(&self, lba: u64, count: usize) -> EResult<()> {
		if lba + count as u64 > self.sectors as u64 {
			return Err(errno!(EINVAL));
		}
		Ok(())
	}
}

impl BlockStorage for PataDrive {
	fn block_size(&self) -> usize {
		SECTOR_SIZE
	}

	fn block_count(&self) -> u64 {
		self.sectors as u64
	}

	fn read_blocks(&self, lba: u64, buf: &mut [u8]) -> EResult<()> {
		assert_eq!(buf.len() % SECTOR_SIZE, 0);
		let count = buf.len() / SECTOR_SIZE;
		self.check_range(lba, count)?;
		let _guard = CHANNEL.lock();
		// The sector count register holds at most 256 sectors (0 means 256)
		for (chunk_idx, chunk) in buf.chunks_mut(SECTOR_SIZE * 256).enumerate() {
			let chunk_lba = lba as u32 + (chunk_idx * 256) as u32;
			let chunk_count = chunk.len() / SECTOR_SIZE;
			wait_not_busy()?;
			select(self.slave, chunk_lba, chunk_count as u8);
			unsafe {
				outb(REG_STATUS, CMD_READ_SECTORS);
			}
			for sector in chunk.chunks_mut(SECTOR_SIZE) {
				wait_data_request()?;
				for word in sector.chunks_mut(2) {
					let val = unsafe { inw(REG_DATA) };
					word[0] = (val & 0xff) as u8;
					word[1] = (val >> 8) as u8;
				}
			}
		}
		Ok(())
	}

	fn write_blocks(&self, lba: u64, buf: &[u8]) -> EResult<()> {
		assert_eq!(buf.len() % SECTOR_SIZE, 0);
		let count = buf.len() / SECTOR_SIZE;
		self.check_range(lba, count)?;
		let _guard = CHANNEL.lock();
		for (chunk_idx, chunk) in buf.chunks(SECTOR_SIZE * 256).enumerate() {
			let chunk_lba = lba as u32 + (chunk_idx * 256) as u32;
			let chunk_count = chunk.len() / SECTOR_SIZE;
			wait_not_busy()?;
			select(self.slave, chunk_lba, chunk_count as u8);
			unsafe {
				outb(REG_STATUS, CMD_WRITE_SECTORS);
			}
			for sector in chunk.chunks(SECTOR_SIZE) {
				wait_data_request()?;
				for word in sector.chunks(2) {
					let val = word[0] as u16 | ((word[1] as u16) << 8);
					unsafe {
						outw(REG_DATA, val);
					}
				}
			}
			unsafe {
				outb(REG_STATUS, CMD_CACHE_FLUSH);
			}
			wait_not_busy()?;
		}
		Ok(())
	}
}
