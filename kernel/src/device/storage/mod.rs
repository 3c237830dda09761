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

//! Block storage devices.
//!
//! Concrete file systems consume only the [`BlockStorage`] port; the ATA
//! PIO driver sits behind it.

pub mod mbr;
pub mod pata;

use crate::{errno::EResult, sync::spin::IntSpin};
use alloc::{sync::Arc, vec::Vec};

/// A block storage device.
pub trait BlockStorage: Send + Sync {
	/// The size of a block in bytes.
	fn block_size(&self) -> usize;
	/// The number of blocks on the device.
	fn block_count(&self) -> u64;
	/// Reads `buf.len() / block_size` blocks starting at `lba` into `buf`.
	///
	/// `buf`'s length must be a multiple of the block size.
	fn read_blocks(&self, lba: u64, buf: &mut [u8]) -> EResult<()>;
	/// Writes `buf.len() / block_size` blocks starting at `lba` from `buf`.
	///
	/// `buf`'s length must be a multiple of the block size.
	fn write_blocks(&self, lba: u64, buf: &[u8]) -> EResult<()>;
}

/// The index of the IDE master drive.
pub const IDE_MASTER: usize = 0;
/// The index of the IDE slave drive.
pub const IDE_SLAVE: usize = 1;

/// The registered storage devices.
static DRIVES: IntSpin<Vec<Option<Arc<dyn BlockStorage>>>> = IntSpin::new(Vec::new());

/// Returns the storage device with the given index, if present.
pub fn get(index: usize) -> Option<Arc<dyn BlockStorage>> {
	DRIVES.lock().get(index).cloned().flatten()
}

/// Probes the IDE bus and registers detected drives.
pub(crate) fn init() {
	let mut drives = DRIVES.lock();
	for (i, slave) in [(IDE_MASTER, false), (IDE_SLAVE, true)] {
		match pata::PataDrive::detect(slave) {
			Some(drive) => {
				log::info!(
					"drive {i}: ATA PIO, {} sectors",
					drive.block_count()
				);
				drives.push(Some(Arc::new(drive) as Arc<dyn BlockStorage>));
			}
			None => drives.push(None),
		}
	}
}
