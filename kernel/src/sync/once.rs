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

//! Static values initialized once at boot.

use core::{
	cell::UnsafeCell,
	mem::MaybeUninit,
	sync::atomic::{
		AtomicBool,
		Ordering::{Acquire, Release},
	},
};

/// A value initialized exactly once, at kernel initialization.
pub struct OnceInit<T> {
	init: AtomicBool,
	data: UnsafeCell<MaybeUninit<T>>,
}

impl<T> OnceInit<T> {
	/// Creates a new uninitialized instance.
	///
	/// # Safety
	///
	/// The value must be initialized with [`OnceInit::init`] before any call
	/// to [`OnceInit::get`].
	pub const unsafe fn new() -> Self {
		Self {
			init: AtomicBool::new(false),
			data: UnsafeCell::new(MaybeUninit::uninit()),
		}
	}

	/// Initializes with the given value.
	///
	/// If already initialized, the function panics.
	///
	/// # Safety
	///
	/// This function must not be called concurrently with itself or
	/// [`OnceInit::get`].
	pub unsafe fn init(&self, val: T) {
		if self.init.load(Acquire) {
			panic!("static initialized twice");
		}
		(*self.data.get()).write(val);
		self.init.store(true, Release);
	}

	/// Returns the inner value.
	///
	/// If not yet initialized, the function panics.
	pub fn get(&self) -> &T {
		if !self.init.load(Acquire) {
			panic!("static used before initialization");
		}
		unsafe { (*self.data.get()).assume_init_ref() }
	}

	/// Tells whether the value has been initialized.
	pub fn is_init(&self) -> bool {
		self.init.load(Acquire)
	}
}

unsafe impl<T: Sync> Sync for OnceInit<T> {}
