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

//! MBR partition table reader.

use super::BlockStorage;
use crate::{errno, errno::EResult};
use alloc::vec;

/// The byte offset of the partition table in the first sector.
const TABLE_OFFSET: usize = 0x1be;
/// The boot signature closing the first sector.
const BOOT_SIGNATURE: u16 = 0xaa55;

/// Partition type of a FAT32 partition with LBA addressing.
pub const PART_TYPE_FAT32_LBA: u8 = 0x0c;

/// A partition table entry.
#[derive(Clone, Copy, Debug, Default)]
pub struct Partition {
	/// Tells whether the partition is marked active.
	pub active: bool,
	/// The partition type.
	pub type_: u8,
	/// The LBA of the partition's first sector.
	pub start_lba: u32,
	/// The number of sectors in the partition.
	pub sector_count: u32,
}

/// Reads the four-entry partition table of the given device.
///
/// Returns [`errno::ENXIO`] if the boot signature is missing.
pub fn read_partitions(storage: &dyn BlockStorage) -> EResult<[Partition; 4]> {
	let mut sector = vec![0u8; storage.block_size()];
	storage.read_blocks(0, &mut sector)?;
	let signature = u16::from_le_bytes([sector[510], sector[511]]);
	if signature != BOOT_SIGNATURE {
		return Err(errno!(ENXIO));
	}
	let mut partitions = [Partition::default(); 4];
	for (i, part) in partitions.iter_mut().enumerate() {
		let entry = &sector[TABLE_OFFSET + i * 16..TABLE_OFFSET + (i + 1) * 16];
		part.active = entry[0] == 0x80;
		part.type_ = entry[4];
		part.start_lba = u32::from_le_bytes([entry[8], entry[9], entry[10], entry[11]]);
		part.sector_count = u32::from_le_bytes([entry[12], entry[13], entry[14], entry[15]]);
	}
	Ok(partitions)
}

/// Returns the active FAT32 partition, if one exists.
pub fn find_fat32_partition(storage: &dyn BlockStorage) -> EResult<Option<Partition>> {
	let partitions = read_partitions(storage)?;
	Ok(partitions.into_iter().find(|p| {
		p.active && p.type_ == PART_TYPE_FAT32_LBA && p.start_lba > 0 && p.sector_count > 0
	}))
}
