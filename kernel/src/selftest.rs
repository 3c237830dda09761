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

//! Kernel self-testing.
//!
//! Unit tests run inside the kernel, after memory management is up but
//! before processes start. The runner is plugged into Rust's custom test
//! framework; each `#[test_case]` function is executed in sequence and a
//! failure panics the kernel.

use crate::println;

/// A testable unit.
pub trait Testable {
	/// Runs the test.
	fn run(&self);
}

impl<T: Fn()> Testable for T {
	fn run(&self) {
		println!("test {} ...", core::any::type_name::<T>());
		self();
		println!("test {} ... ok", core::any::type_name::<T>());
	}
}

/// The test runner, invoked by the generated test harness.
pub fn runner(tests: &[&dyn Testable]) {
	println!("running {} kernel self-tests", tests.len());
	for test in tests {
		test.run();
	}
	println!("self-tests done");
}
