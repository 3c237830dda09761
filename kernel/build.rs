//! Build script for the kernel.
//!
//! Selects the linker script for the target and makes cargo watch it.

use std::path::PathBuf;

fn main() {
	let manifest_dir = PathBuf::from(std::env::var("CARGO_MANIFEST_DIR").unwrap());
	let linker_script = manifest_dir.join("arch/x86/linker.ld");
	println!("cargo:rerun-if-changed={}", linker_script.display());
	println!("cargo:rustc-link-arg=-T{}", linker_script.display());
	println!("cargo:rustc-link-arg=--no-dynamic-linker");
}
