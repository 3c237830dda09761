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

//! Reader-writer lock that waits by yielding to the scheduler.
//!
//! Used to protect each mount's private state: mutations take the lock
//! exclusive, reads take it shared. Contrary to [`crate::sync::spin::Spin`],
//! waiting on this lock cooperatively gives the CPU to other processes, so
//! it must only be taken from process context, never from an interrupt
//! handler.

use crate::sync::spin::IntSpin;
use core::{
	cell::UnsafeCell,
	ops::{Deref, DerefMut},
};

#[derive(Default)]
struct State {
	/// The number of readers currently holding the lock.
	readers: usize,
	/// Tells whether a writer currently holds the lock.
	writer: bool,
}

/// Reader-writer lock yielding the CPU while waiting.
pub struct YieldRwLock<T: ?Sized> {
	state: IntSpin<State>,
	data: UnsafeCell<T>,
}

impl<T> YieldRwLock<T> {
	/// Creates a new instance wrapping the given `data`.
	pub const fn new(data: T) -> Self {
		Self {
			state: IntSpin::new(State {
				readers: 0,
				writer: false,
			}),
			data: UnsafeCell::new(data),
		}
	}
}

impl<T: ?Sized> YieldRwLock<T> {
	/// Acquires the lock shared, yielding while a writer holds it.
	pub fn read(&self) -> ReadGuard<'_, T> {
		loop {
			{
				let mut state = self.state.lock();
				if !state.writer {
					state.readers += 1;
					break;
				}
			}
			crate::process::scheduler::yield_now();
		}
		ReadGuard {
			lock: self,
		}
	}

	/// Acquires the lock exclusive, yielding while any other holder exists.
	pub fn write(&self) -> WriteGuard<'_, T> {
		loop {
			{
				let mut state = self.state.lock();
				if !state.writer && state.readers == 0 {
					state.writer = true;
					break;
				}
			}
			crate::process::scheduler::yield_now();
		}
		WriteGuard {
			lock: self,
		}
	}
}

unsafe impl<T> Sync for YieldRwLock<T> {}

/// Shared access to a [`YieldRwLock`], released on drop.
pub struct ReadGuard<'l, T: ?Sized> {
	lock: &'l YieldRwLock<T>,
}

impl<T: ?Sized> Deref for ReadGuard<'_, T> {
	type Target = T;

	fn deref(&self) -> &Self::Target {
		unsafe { &*self.lock.data.get() }
	}
}

impl<T: ?Sized> Drop for ReadGuard<'_, T> {
	fn drop(&mut self) {
		let mut state = self.lock.state.lock();
		state.readers -= 1;
	}
}

/// Exclusive access to a [`YieldRwLock`], released on drop.
pub struct WriteGuard<'l, T: ?Sized> {
	lock: &'l YieldRwLock<T>,
}

impl<T: ?Sized> Deref for WriteGuard<'_, T> {
	type Target = T;

	fn deref(&self) -> &Self::Target {
		unsafe { &*self.lock.data.get() }
	}
}

impl<T: ?Sized> DerefMut for WriteGuard<'_, T> {
	fn deref_mut(&mut self) -> &mut Self::Target {
		unsafe { &mut *self.lock.data.get() }
	}
}

impl<T: ?Sized> Drop for WriteGuard<'_, T> {
	fn drop(&mut self) {
		let mut state = self.lock.state.lock();
		state.writer = false;
	}
}
