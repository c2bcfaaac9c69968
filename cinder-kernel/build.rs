fn main() {
    // Only the bare-metal image uses the linker script
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("none") {
        let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap();
        println!("cargo:rustc-link-arg-bins=-T{}/kernel.ld", manifest_dir);
    }

    // Rerun if linker script changes
    println!("cargo:rerun-if-changed=kernel.ld");
}
