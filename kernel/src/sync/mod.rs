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

//! Synchronization primitives.
//!
//! Lock ordering is strict: (process table) ⊂ (VFS) ⊂ (mount private state)
//! ⊂ (heap / frame bitmap). The scheduler yield primitive must never be
//! called while a [`spin::Spin`] lock is held; only [`rwlock::YieldRwLock`]
//! may be held across a yield, on the reader side.

pub mod once;
pub mod rwlock;
pub mod spin;
