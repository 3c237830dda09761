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

//! FAT32 directory records.
//!
//! Directories are lists of 32-byte records: 8.3 *short* entries, and
//! *long* (LFN) entries carrying UCS-2 name fragments. A file with a long
//! name is stored as one short record preceded by one or more long records
//! in decreasing sequence order, each carrying a checksum of the short
//! name.

use alloc::{string::String, vec::Vec};

/// The size of a directory record in bytes.
pub const RECORD_SIZE: usize = 32;

/// First name byte marking the end of a directory.
pub const MARKER_END: u8 = 0x00;
/// First name byte marking a deleted record.
pub const MARKER_DELETED: u8 = 0xe5;

/// Attribute: read-only.
pub const ATTR_READ_ONLY: u8 = 0x01;
/// Attribute: hidden.
pub const ATTR_HIDDEN: u8 = 0x02;
/// Attribute: system.
pub const ATTR_SYSTEM: u8 = 0x04;
/// Attribute: volume label.
pub const ATTR_VOLUME_ID: u8 = 0x08;
/// Attribute: directory.
pub const ATTR_DIRECTORY: u8 = 0x10;
/// Attribute: archive.
pub const ATTR_ARCHIVE: u8 = 0x20;
/// Attribute combination marking a long name record.
pub const ATTR_LFN: u8 = 0x0f;

/// Sequence bit marking the head (last logical) LFN record.
pub const LFN_HEAD: u8 = 0x40;
/// The number of UCS-2 characters carried by one LFN record.
pub const LFN_CHARS: usize = 13;
/// The maximum number of LFN records per file.
pub const LFN_MAX_RECORDS: usize = 0x14;

/// An 8.3 short directory entry, decoded.
#[derive(Clone, Copy, Debug, Default)]
pub struct ShortEntry {
	/// The 8+3 uppercase name, space padded.
	pub name: [u8; 11],
	/// Attribute bits.
	pub attr: u8,
	/// Creation time, FAT encoding.
	pub ctime_time: u16,
	/// Creation date, FAT encoding.
	pub ctime_date: u16,
	/// Modification time, FAT encoding.
	pub mtime_time: u16,
	/// Modification date, FAT encoding.
	pub mtime_date: u16,
	/// First cluster of the file's chain, `0` for an empty file.
	pub first_cluster: u32,
	/// File size in bytes.
	pub size: u32,
}

impl ShortEntry {
	/// Decodes a 32-byte record.
	pub fn from_record(rec: &[u8]) -> Self {
		debug_assert_eq!(rec.len(), RECORD_SIZE);
		let mut name = [0u8; 11];
		name.copy_from_slice(&rec[0..11]);
		let cluster_hi = u16::from_le_bytes([rec[20], rec[21]]);
		let cluster_lo = u16::from_le_bytes([rec[26], rec[27]]);
		Self {
			name,
			attr: rec[11],
			ctime_time: u16::from_le_bytes([rec[14], rec[15]]),
			ctime_date: u16::from_le_bytes([rec[16], rec[17]]),
			mtime_time: u16::from_le_bytes([rec[22], rec[23]]),
			mtime_date: u16::from_le_bytes([rec[24], rec[25]]),
			first_cluster: ((cluster_hi as u32) << 16) | cluster_lo as u32,
			size: u32::from_le_bytes([rec[28], rec[29], rec[30], rec[31]]),
		}
	}

	/// Encodes into a 32-byte record.
	pub fn to_record(self) -> [u8; RECORD_SIZE] {
		let mut rec = [0u8; RECORD_SIZE];
		rec[0..11].copy_from_slice(&self.name);
		rec[11] = self.attr;
		rec[14..16].copy_from_slice(&self.ctime_time.to_le_bytes());
		rec[16..18].copy_from_slice(&self.ctime_date.to_le_bytes());
		// Last access date mirrors the modification date
		rec[18..20].copy_from_slice(&self.mtime_date.to_le_bytes());
		rec[20..22].copy_from_slice(&((self.first_cluster >> 16) as u16).to_le_bytes());
		rec[22..24].copy_from_slice(&self.mtime_time.to_le_bytes());
		rec[24..26].copy_from_slice(&self.mtime_date.to_le_bytes());
		rec[26..28].copy_from_slice(&(self.first_cluster as u16).to_le_bytes());
		rec[28..32].copy_from_slice(&self.size.to_le_bytes());
		rec
	}

	/// Tells whether the entry is a directory.
	pub fn is_dir(&self) -> bool {
		self.attr & ATTR_DIRECTORY != 0
	}

	/// Returns the 8.3 name in its displayable `NAME.EXT` form.
	pub fn display_name(&self) -> String {
		let base_len = self.name[..8]
			.iter()
			.rposition(|c| *c != b' ')
			.map(|p| p + 1)
			.unwrap_or(0);
		let ext_len = self.name[8..]
			.iter()
			.rposition(|c| *c != b' ')
			.map(|p| p + 1)
			.unwrap_or(0);
		let mut out = String::new();
		for &c in &self.name[..base_len] {
			out.push(c as char);
		}
		if ext_len > 0 {
			out.push('.');
			for &c in &self.name[8..8 + ext_len] {
				out.push(c as char);
			}
		}
		out
	}
}

/// Computes the checksum of an 8.3 short name, stored in every LFN record
/// of the same file.
pub fn lfn_checksum(name: &[u8; 11]) -> u8 {
	let mut sum = 0u8;
	for &c in name {
		sum = sum.rotate_right(1).wrapping_add(c);
	}
	sum
}

/// The byte offsets of the UCS-2 characters within an LFN record.
const LFN_CHAR_OFFSETS: [usize; LFN_CHARS] = [1, 3, 5, 7, 9, 14, 16, 18, 20, 22, 24, 28, 30];

/// Decodes the 13 UCS-2 characters of an LFN record.
pub fn lfn_fragment(rec: &[u8]) -> [u16; LFN_CHARS] {
	let mut chars = [0u16; LFN_CHARS];
	for (i, off) in LFN_CHAR_OFFSETS.iter().enumerate() {
		chars[i] = u16::from_le_bytes([rec[*off], rec[*off + 1]]);
	}
	chars
}

/// Builds the LFN records for `name`, in on-disk order (head first,
/// decreasing sequence numbers), followed by nothing: the caller appends
/// the short record.
///
/// Returns `None` when the name needs more than the maximum number of
/// records.
pub fn encode_lfn(name: &str, checksum: u8) -> Option<Vec<[u8; RECORD_SIZE]>> {
	let ucs2: Vec<u16> = name.chars().map(|c| c as u16).collect();
	let count = ucs2.len().div_ceil(LFN_CHARS);
	if count == 0 || count > LFN_MAX_RECORDS {
		return None;
	}
	let mut records = Vec::with_capacity(count);
	for seq in (1..=count).rev() {
		let mut rec = [0u8; RECORD_SIZE];
		rec[0] = seq as u8 | if seq == count { LFN_HEAD } else { 0 };
		rec[11] = ATTR_LFN;
		rec[13] = checksum;
		let base = (seq - 1) * LFN_CHARS;
		for (i, off) in LFN_CHAR_OFFSETS.iter().enumerate() {
			// Names are null-terminated, then padded with 0xffff
			let c = match base + i {
				n if n < ucs2.len() => ucs2[n],
				n if n == ucs2.len() => 0x0000,
				_ => 0xffff,
			};
			rec[*off..*off + 2].copy_from_slice(&c.to_le_bytes());
		}
		records.push(rec);
	}
	Some(records)
}

/// A directory entry resolved to its long name and its position within the
/// directory.
#[derive(Clone, Debug, Default)]
pub struct FileEntry {
	/// The decoded short entry.
	pub short: ShortEntry,
	/// The file's name: the long name when present, the 8.3 form otherwise.
	pub name: String,
	/// The first cluster of the directory holding the entry, `0` for the
	/// root directory.
	pub dir_cluster: u32,
	/// Index of the entry's first record (LFN head or short record) within
	/// the directory.
	pub first_record: usize,
	/// Total number of records (LFNs plus the short record).
	pub record_count: usize,
}

/// Iterates the records of a raw directory image, producing resolved
/// entries.
///
/// LFN fragments are accumulated and validated against the short name
/// checksum; orphaned fragments fall back to the 8.3 name.
pub struct EntryIter<'d> {
	data: &'d [u8],
	idx: usize,
}

impl<'d> EntryIter<'d> {
	/// Creates an iterator over the raw directory image `data`.
	pub fn new(data: &'d [u8]) -> Self {
		Self {
			data,
			idx: 0,
		}
	}
}

impl Iterator for EntryIter<'_> {
	type Item = FileEntry;

	fn next(&mut self) -> Option<FileEntry> {
		let mut lfn: Vec<u16> = Vec::new();
		let mut lfn_checksum_seen: Option<u8> = None;
		let mut first_record = self.idx;
		loop {
			let rec = self
				.data
				.get(self.idx * RECORD_SIZE..(self.idx + 1) * RECORD_SIZE)?;
			match rec[0] {
				MARKER_END => return None,
				MARKER_DELETED => {
					self.idx += 1;
					lfn.clear();
					lfn_checksum_seen = None;
					first_record = self.idx;
					continue;
				}
				_ => {}
			}
			if rec[11] == ATTR_LFN {
				// Fragments are stored highest sequence first; prepend
				let seq = rec[0] & !LFN_HEAD;
				if rec[0] & LFN_HEAD != 0 {
					lfn.clear();
					first_record = self.idx;
				}
				let frag = lfn_fragment(rec);
				let keep = frag
					.iter()
					.take_while(|c| **c != 0x0000 && **c != 0xffff)
					.count();
				let mut acc = Vec::with_capacity(lfn.len() + keep);
				if seq > 0 {
					acc.extend_from_slice(&frag[..keep]);
					acc.extend_from_slice(&lfn);
					lfn = acc;
				}
				lfn_checksum_seen = Some(rec[13]);
				self.idx += 1;
				continue;
			}
			// Short record
			let short = ShortEntry::from_record(rec);
			self.idx += 1;
			if short.attr & ATTR_VOLUME_ID != 0 {
				lfn.clear();
				lfn_checksum_seen = None;
				first_record = self.idx;
				continue;
			}
			let valid_lfn = lfn_checksum_seen == Some(lfn_checksum(&short.name)) && !lfn.is_empty();
			let name = if valid_lfn {
				lfn.iter()
					.map(|c| char::from_u32(*c as u32).unwrap_or('?'))
					.collect()
			} else {
				first_record = self.idx - 1;
				short.display_name()
			};
			return Some(FileEntry {
				short,
				name,
				dir_cluster: 0,
				first_record,
				record_count: self.idx - first_record,
			});
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test_case]
	fn short_name_display() {
		let mut e = ShortEntry::default();
		e.name.copy_from_slice(b"HELLO   TXT");
		assert_eq!(e.display_name(), "HELLO.TXT");
		e.name.copy_from_slice(b"NOEXT      ");
		assert_eq!(e.display_name(), "NOEXT");
	}

	#[test_case]
	fn record_round_trip() {
		let mut e = ShortEntry::default();
		e.name.copy_from_slice(b"FILE    BIN");
		e.attr = ATTR_ARCHIVE;
		e.first_cluster = 0x00123456;
		e.size = 1234;
		e.mtime_date = 0x5678;
		e.mtime_time = 0x1234;
		let decoded = ShortEntry::from_record(&e.to_record());
		assert_eq!(decoded.name, e.name);
		assert_eq!(decoded.first_cluster, e.first_cluster);
		assert_eq!(decoded.size, e.size);
		assert_eq!(decoded.mtime_date, e.mtime_date);
		assert_eq!(decoded.mtime_time, e.mtime_time);
	}

	#[test_case]
	fn checksum_known_value() {
		// Checksum of "FOO     BAR" computed by the reference algorithm
		let name = *b"FOO     BAR";
		let mut sum = 0u8;
		for &c in &name {
			sum = sum.rotate_right(1).wrapping_add(c);
		}
		assert_eq!(lfn_checksum(&name), sum);
	}

	#[test_case]
	fn lfn_encode_decode() {
		let name = "A longer file name.txt";
		let csum = 0x42;
		let records = encode_lfn(name, csum).unwrap();
		assert_eq!(records.len(), name.chars().count().div_ceil(LFN_CHARS));
		// Head record carries the sequence head bit
		assert_eq!(records[0][0] & LFN_HEAD, LFN_HEAD);
		// Decode back through the iterator, with a matching short record
		let mut short = ShortEntry::default();
		short.name.copy_from_slice(b"ALONGE~1TXT");
		let mut data = Vec::new();
		let csum = lfn_checksum(&short.name);
		for rec in encode_lfn(name, csum).unwrap() {
			data.extend_from_slice(&rec);
		}
		data.extend_from_slice(&short.to_record());
		data.extend_from_slice(&[0u8; RECORD_SIZE]);
		let entries: Vec<FileEntry> = EntryIter::new(&data).collect();
		assert_eq!(entries.len(), 1);
		assert_eq!(entries[0].name, name);
		assert_eq!(entries[0].first_record, 0);
		assert_eq!(entries[0].record_count, records.len() + 1);
	}
}
