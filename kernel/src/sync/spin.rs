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

//! Mutually exclusive access primitive based on a spinlock.
//!
//! One particularity with kernel development is that multi-threading is not
//! the only way to get concurrency issues: an interruption may be triggered
//! at any moment. Spinlocks are thus equipped with an option to mask
//! interrupts while locked. Masking nests: the interrupt flag as observed on
//! the first (outermost) acquisition is restored when the last guard drops.

use crate::arch::x86::{cli, is_interrupt_enabled, sti};
use core::{
	cell::UnsafeCell,
	fmt,
	fmt::Formatter,
	hint,
	ops::{Deref, DerefMut},
	sync::atomic::{
		AtomicBool,
		Ordering::{Acquire, Release},
	},
};

#[inline(always)]
fn lock(lock: &AtomicBool) {
	while lock.swap(true, Acquire) {
		hint::spin_loop();
	}
}

/// Unlocks the associated [`Spin`] when dropped.
pub struct SpinGuard<'m, T: ?Sized, const INT: bool> {
	spin: &'m Spin<T, INT>,
	/// The interrupt status before locking. Only relevant if `INT == false`.
	int_state: bool,
}

impl<T: ?Sized, const INT: bool> Deref for SpinGuard<'_, T, INT> {
	type Target = T;

	fn deref(&self) -> &Self::Target {
		unsafe { &*self.spin.data.get() }
	}
}

impl<T: ?Sized, const INT: bool> DerefMut for SpinGuard<'_, T, INT> {
	fn deref_mut(&mut self) -> &mut Self::Target {
		unsafe { &mut *self.spin.data.get() }
	}
}

impl<T: ?Sized, const INT: bool> !Send for SpinGuard<'_, T, INT> {}

impl<T: ?Sized + fmt::Debug, const INT: bool> fmt::Debug for SpinGuard<'_, T, INT> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(self.deref(), f)
	}
}

impl<T: ?Sized, const INT: bool> Drop for SpinGuard<'_, T, INT> {
	fn drop(&mut self) {
		unsafe {
			self.spin.unlock(self.int_state);
		}
	}
}

/// Wraps a value which can be accessed by only one context at a time.
///
/// The `INT` generic parameter tells whether interrupts are allowed while
/// locked. The default value is `true`.
pub struct Spin<T: ?Sized, const INT: bool = true> {
	spin: AtomicBool,
	data: UnsafeCell<T>,
}

impl<T, const INT: bool> Spin<T, INT> {
	/// Creates a new instance wrapping the given `data`.
	pub const fn new(data: T) -> Self {
		Self {
			spin: AtomicBool::new(false),
			data: UnsafeCell::new(data),
		}
	}
}

impl<T: Default, const INT: bool> Default for Spin<T, INT> {
	fn default() -> Self {
		Self::new(Default::default())
	}
}

impl<T: ?Sized, const INT: bool> Spin<T, INT> {
	/// Acquires the spinlock, looping until it becomes available.
	///
	/// The returned [`SpinGuard`] unlocks the spinlock when dropped.
	pub fn lock(&self) -> SpinGuard<'_, T, INT> {
		let int_state = if !INT {
			let enabled = is_interrupt_enabled();
			cli();
			enabled
		} else {
			// In this case, this value does not matter
			false
		};
		lock(&self.spin);
		SpinGuard {
			spin: self,
			int_state,
		}
	}

	/// Releases the spinlock. Called when the guard is dropped.
	///
	/// `int_state` is the state of interrupts before locking.
	///
	/// # Safety
	///
	/// If the spinlock is not locked, the behaviour is undefined.
	pub unsafe fn unlock(&self, int_state: bool) {
		self.spin.store(false, Release);
		if !INT && int_state {
			sti();
		}
	}
}

unsafe impl<T, const INT: bool> Sync for Spin<T, INT> {}

impl<T: ?Sized + fmt::Debug, const INT: bool> fmt::Debug for Spin<T, INT> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let guard = self.lock();
		fmt::Debug::fmt(&*guard, f)
	}
}

/// Type alias on [`Spin`] representing a spinlock which masks interrupts.
pub type IntSpin<T> = Spin<T, false>;
/// Type alias on [`SpinGuard`] representing a guard which masks interrupts.
pub type IntSpinGuard<'m, T> = SpinGuard<'m, T, false>;
