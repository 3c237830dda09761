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

//! The virtual file system.
//!
//! The mount table binds absolute path prefixes to file system instances;
//! lookups pick the longest matching prefix and hand the residual suffix to
//! the mounted file system. The mount table and the open file table share
//! one lock; concrete file system calls always happen outside of it, so
//! that blocking operations can yield.

use crate::{
	device::storage,
	errno,
	errno::EResult,
	file::{
		fs,
		fs::{DirFiller, FileInfo, FilesystemOps},
		open_file::{FileTable, OpenFile},
		OpenFlags, Stat, Whence,
	},
	limits::MOUNT_MAX,
	sync::spin::IntSpin,
};
use alloc::{
	string::{String, ToString},
	sync::Arc,
};

/// The starting LBA of the USTAR root archive on the master drive, right
/// after the space reserved to the bootloader.
const USTAR_ROOT_LBA: u64 = 16;

/// A mount point, binding an absolute path prefix to a file system
/// instance.
struct MountPoint {
	/// The unique ID of the mount.
	id: u32,
	/// The absolute path the file system is mounted on.
	target: String,
	/// The mounted file system.
	fs: Arc<dyn FilesystemOps>,
}

/// VFS state: the mount table and the open file table, under one lock.
struct Vfs {
	mounts: [Option<MountPoint>; MOUNT_MAX],
	next_mount_id: u32,
	files: FileTable,
}

static VFS: IntSpin<Vfs> = IntSpin::new(Vfs {
	mounts: [const { None }; MOUNT_MAX],
	next_mount_id: 0,
	files: FileTable::new(),
});

/// Resolution of a path against the mount table.
struct Resolved {
	fs: Arc<dyn FilesystemOps>,
	mount_id: u32,
	/// The path relative to the mount, always starting with `/`.
	residual: String,
}

/// Finds the mount point whose target is the longest prefix of `path`.
///
/// `path` must be absolute. The root mount always matches with length 1.
fn find_mount(path: &str) -> EResult<Resolved> {
	if !path.starts_with('/') {
		return Err(errno!(EINVAL));
	}
	let vfs = VFS.lock();
	let mut best: Option<(&MountPoint, usize)> = None;
	for mp in vfs.mounts.iter().flatten() {
		let match_len = if mp.target == "/" {
			1
		} else if path == mp.target {
			mp.target.len()
		} else if path.starts_with(mp.target.as_str())
			&& path.as_bytes().get(mp.target.len()) == Some(&b'/')
		{
			mp.target.len()
		} else {
			continue;
		};
		if best.map(|(_, len)| match_len > len).unwrap_or(true) {
			best = Some((mp, match_len));
		}
	}
	let (mp, _) = best.ok_or(errno!(ENXIO))?;
	let residual = if mp.target == "/" {
		path.to_string()
	} else if path == mp.target {
		String::from("/")
	} else {
		path[mp.target.len()..].to_string()
	};
	Ok(Resolved {
		fs: mp.fs.clone(),
		mount_id: mp.id,
		residual,
	})
}

/// Mounts `fs` on the absolute path `target`.
///
/// Except for the root, the target must already exist as a directory on the
/// parent file system. Mounting twice on the same target fails with
/// [`errno::EEXIST`].
pub fn mount(target: &str, fs: Arc<dyn FilesystemOps>) -> EResult<()> {
	if !target.starts_with('/') {
		return Err(errno!(EINVAL));
	}
	if target != "/" {
		let stat = getattr_path(target)?;
		if !stat.is_dir() {
			return Err(errno!(ENOTDIR));
		}
	}
	let mut vfs = VFS.lock();
	if vfs
		.mounts
		.iter()
		.flatten()
		.any(|mp| mp.target == target)
	{
		return Err(errno!(EEXIST));
	}
	let slot = vfs
		.mounts
		.iter()
		.position(Option::is_none)
		.ok_or(errno!(ENOSPC))?;
	let id = vfs.next_mount_id;
	vfs.next_mount_id += 1;
	vfs.mounts[slot] = Some(MountPoint {
		id,
		target: target.to_string(),
		fs,
	});
	Ok(())
}

/// Unmounts the file system at `target`.
///
/// Fails with [`errno::EBUSY`] while open files live on the mount.
pub fn unmount(target: &str) -> EResult<()> {
	let mut vfs = VFS.lock();
	let slot = vfs
		.mounts
		.iter()
		.position(|mp| mp.as_ref().map(|mp| mp.target == target).unwrap_or(false))
		.ok_or(errno!(ENXIO))?;
	let id = vfs.mounts[slot].as_ref().unwrap().id;
	if vfs.files.mount_busy(id) {
		return Err(errno!(EBUSY));
	}
	vfs.mounts[slot] = None;
	Ok(())
}

/// Opens the file at the absolute path `path` and returns its index in the
/// open file table.
pub fn open(path: &str, flags: OpenFlags) -> EResult<usize> {
	let resolved = find_mount(path)?;
	let mut fi = FileInfo {
		flags,
		handle: 0,
	};
	resolved.fs.open(&resolved.residual, &mut fi)?;
	let mut vfs = VFS.lock();
	let Some(idx) = vfs.files.find_free() else {
		drop(vfs);
		let _ = resolved.fs.release(&resolved.residual, &fi);
		return Err(errno!(ENFILE));
	};
	vfs.files.0[idx] = Some(OpenFile {
		mount_id: resolved.mount_id,
		fs: resolved.fs,
		path: resolved.residual,
		handle: fi.handle,
		offset: 0,
		flags,
		readable: flags.readable(),
		writable: flags.writable(),
		ref_count: 1,
	});
	Ok(idx)
}

/// Snapshot of an open file entry, used to call into the file system
/// outside the VFS lock.
struct Snapshot {
	fs: Arc<dyn FilesystemOps>,
	path: String,
	fi: FileInfo,
	offset: u64,
	readable: bool,
	writable: bool,
}

fn snapshot(idx: usize) -> EResult<Snapshot> {
	let vfs = VFS.lock();
	let f = vfs.files.get(idx).ok_or(errno!(ENOENT))?;
	Ok(Snapshot {
		fs: f.fs.clone(),
		path: f.path.clone(),
		fi: FileInfo {
			flags: f.flags,
			handle: f.handle,
		},
		offset: f.offset,
		readable: f.readable,
		writable: f.writable,
	})
}

/// Increments the reference count of the open file at `idx`.
pub fn dup(idx: usize) -> EResult<()> {
	let mut vfs = VFS.lock();
	let f = vfs.files.get_mut(idx).ok_or(errno!(ENOENT))?;
	f.ref_count += 1;
	Ok(())
}

/// Decrements the reference count of the open file at `idx`, releasing the
/// entry when it drops to zero.
pub fn close(idx: usize) -> EResult<()> {
	let entry = {
		let mut vfs = VFS.lock();
		let f = vfs.files.get_mut(idx).ok_or(errno!(ENOENT))?;
		f.ref_count -= 1;
		if f.ref_count > 0 {
			return Ok(());
		}
		vfs.files.0[idx].take().unwrap()
	};
	let fi = FileInfo {
		flags: entry.flags,
		handle: entry.handle,
	};
	entry.fs.release(&entry.path, &fi)
}

/// Reads from the open file at `idx` into `buf`, advancing the offset by
/// the number of bytes read.
pub fn read(idx: usize, buf: &mut [u8]) -> EResult<usize> {
	let snap = snapshot(idx)?;
	if !snap.readable {
		return Err(errno!(EPERM));
	}
	let n = snap.fs.read(&snap.path, Some(&snap.fi), buf, snap.offset)?;
	let mut vfs = VFS.lock();
	if let Some(f) = vfs.files.get_mut(idx) {
		f.offset += n as u64;
	}
	Ok(n)
}

/// Writes `buf` to the open file at `idx`, advancing the offset by the
/// number of bytes written.
pub fn write(idx: usize, buf: &[u8]) -> EResult<usize> {
	let snap = snapshot(idx)?;
	if !snap.writable {
		return Err(errno!(EPERM));
	}
	let n = snap.fs.write(&snap.path, Some(&snap.fi), buf, snap.offset)?;
	let mut vfs = VFS.lock();
	if let Some(f) = vfs.files.get_mut(idx) {
		f.offset += n as u64;
	}
	Ok(n)
}

/// Adjusts the offset of the open file at `idx` and returns the new offset.
///
/// Seeking past the end of a regular file is allowed; subsequent writes
/// zero-extend.
pub fn seek(idx: usize, offset: i64, whence: Whence) -> EResult<i64> {
	let snap = snapshot(idx)?;
	let base = match whence {
		Whence::Set => 0,
		Whence::Cur => snap.offset as i64,
		Whence::End => snap.fs.getattr(&snap.path, Some(&snap.fi))?.size as i64,
	};
	let new_offset = base.checked_add(offset).ok_or(errno!(EINVAL))?;
	if new_offset < 0 {
		return Err(errno!(EINVAL));
	}
	let mut vfs = VFS.lock();
	let f = vfs.files.get_mut(idx).ok_or(errno!(ENOENT))?;
	f.offset = new_offset as u64;
	Ok(new_offset)
}

/// Returns the status of the open file at `idx`.
pub fn getattr(idx: usize) -> EResult<Stat> {
	let snap = snapshot(idx)?;
	snap.fs.getattr(&snap.path, Some(&snap.fi))
}

/// Returns the status of the file at the absolute path `path`.
pub fn getattr_path(path: &str) -> EResult<Stat> {
	let resolved = find_mount(path)?;
	resolved.fs.getattr(&resolved.residual, None)
}

/// Truncates the open file at `idx` to `size` bytes.
pub fn truncate(idx: usize, size: u64) -> EResult<()> {
	let snap = snapshot(idx)?;
	if !snap.writable {
		return Err(errno!(EPERM));
	}
	snap.fs.truncate(&snap.path, size, Some(&snap.fi))
}

/// Iterates the entries of the directory at the absolute path `path`,
/// starting at entry `offset`.
pub fn readdir(path: &str, offset: usize, filler: DirFiller) -> EResult<()> {
	let resolved = find_mount(path)?;
	resolved.fs.readdir(&resolved.residual, offset, filler)
}

/// Creates a node at the absolute path `path`.
pub fn mknod(path: &str, mode: crate::file::Mode) -> EResult<()> {
	let resolved = find_mount(path)?;
	resolved.fs.mknod(&resolved.residual, mode)
}

/// Creates a directory at the absolute path `path`.
pub fn mkdir(path: &str, mode: crate::file::Mode) -> EResult<()> {
	let resolved = find_mount(path)?;
	resolved.fs.mkdir(&resolved.residual, mode)
}

/// Removes the empty directory at the absolute path `path`.
pub fn rmdir(path: &str) -> EResult<()> {
	let resolved = find_mount(path)?;
	resolved.fs.rmdir(&resolved.residual)
}

/// Removes the file at the absolute path `path`.
pub fn unlink(path: &str) -> EResult<()> {
	let resolved = find_mount(path)?;
	resolved.fs.unlink(&resolved.residual)
}

/// Creates at `new` a link to `old`. Both paths must live on the same
/// mount.
pub fn link(old: &str, new: &str) -> EResult<()> {
	let from = find_mount(old)?;
	let to = find_mount(new)?;
	if from.mount_id != to.mount_id {
		return Err(errno!(EPERM));
	}
	from.fs.link(&from.residual, &to.residual)
}

/// Moves the file at `from` to `to`. Both paths must live on the same
/// mount.
///
/// Renaming a file onto itself does nothing.
pub fn rename(from: &str, to: &str) -> EResult<()> {
	if from == to {
		return Ok(());
	}
	let src = find_mount(from)?;
	let dst = find_mount(to)?;
	if src.mount_id != dst.mount_id {
		return Err(errno!(EPERM));
	}
	src.fs.rename(&src.residual, &dst.residual)
}

/// Mounts the base hierarchy: USTAR at `/`, FAT32 at `/home`, the console
/// at `/console` and pipes at `/pipe`.
pub(super) fn mount_defaults() -> EResult<()> {
	// The master drive carries the read-only USTAR root
	match storage::get(storage::IDE_MASTER).map(|d| fs::ustar::Ustar::detect(d, USTAR_ROOT_LBA)) {
		Some(Ok(root)) => mount("/", Arc::new(root))?,
		Some(Err(e)) => {
			log::warn!("master drive carries no USTAR archive ({e})");
			return Ok(());
		}
		None => {
			log::warn!("no master drive, root file system unavailable");
			return Ok(());
		}
	}
	// The slave drive carries the writable FAT32 home
	if let Some(drive) = storage::get(storage::IDE_SLAVE) {
		match fs::fat32::Fat32::detect(drive) {
			Ok(fat) => match mount("/home", Arc::new(fat)) {
				Ok(()) => {}
				Err(e) => log::warn!("cannot mount /home ({e})"),
			},
			Err(e) => log::warn!("slave drive carries no FAT32 file system ({e})"),
		}
	}
	mount("/console", Arc::new(fs::console::Console::new()))?;
	mount("/pipe", Arc::new(fs::pipe::PipeFs::new()))?;
	Ok(())
}
