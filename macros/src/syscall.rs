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

//! This module implements the macro used to declare a system call.
//!
//! On this kernel's ABI, the system call number lives in `eax` and the
//! arguments live on the interrupted user stack, above the saved return
//! address. The generated prologue fetches each argument through the
//! trapframe's saved user stack pointer, after the accessibility of the
//! stack slot has been validated.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, FnArg, ItemFn, Path, Type, TypePath};

/// Implementation of the syscall macro.
pub fn syscall(input: TokenStream) -> TokenStream {
	let input = parse_macro_input!(input as ItemFn);

	// Check signature is valid
	if input.sig.constness.is_some() {
		panic!("a system call handler cannot be `const`");
	}
	if !input.sig.generics.params.is_empty() {
		panic!("a system call cannot have generic arguments");
	}
	if input.sig.variadic.is_some() {
		panic!("a system call handler cannot have variadic arguments");
	}

	let args = input
		.sig
		.inputs
		.iter()
		.enumerate()
		.map(|(i, arg)| match arg {
			FnArg::Typed(typed) => {
				let pat = &typed.pat;
				let ty = &typed.ty;
				(pat, ty, i)
			}
			FnArg::Receiver(_) => panic!("a system call handler cannot have a `self` argument"),
		})
		.collect::<Vec<_>>();

	let args_tokens: proc_macro2::TokenStream = args
		.iter()
		.map(|(pat, ty, i)| {
			match ty.as_ref() {
				// Special case for userspace pointers
				Type::Path(TypePath {
					path: Path {
						segments, ..
					},
					..
				}) if segments
					.first()
					.map(|s| s.ident.to_string().starts_with("User"))
					.unwrap_or(false) =>
				{
					quote! {
						let #pat = #ty::from_syscall_arg(
							crate::syscall::user_stack_arg(frame, #i)?,
						);
					}
				}
				// Normal argument
				ty => quote! {
					let #pat = crate::syscall::user_stack_arg(frame, #i)? as #ty;
				},
			}
		})
		.collect();

	let ident = input.sig.ident;
	let code = input.block;

	let toks = if cfg!(feature = "strace") {
		let name = ident.to_string();
		let args_pats: Vec<_> = args.iter().map(|(pat, ..)| pat).collect();
		quote! {
			#[allow(unused_variables)]
			pub fn #ident(
				frame: &mut crate::arch::x86::idt::IntFrame,
			) -> crate::errno::EResult<i32> {
				#args_tokens
				let pid = crate::process::Process::current_pid();
				crate::println!("[strace {}] {}{:?}", pid, #name, (#(&#args_pats,)*));
				let ret = (|| #code)();
				crate::println!("[strace {}] -> {:?}", pid, ret);
				ret
			}
		}
	} else {
		quote! {
			#[allow(unused_variables)]
			pub fn #ident(
				frame: &mut crate::arch::x86::idt::IntFrame,
			) -> crate::errno::EResult<i32> {
				#args_tokens
				#code
			}
		}
	};
	toks.into()
}
