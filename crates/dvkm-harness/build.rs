fn main() {
    // The emulator breaks on the markers and writes the input region at
    // addresses read from the image, so the binary must load at a fixed base.
    let target_os = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    if target_os == "linux" {
        println!("cargo:rustc-link-arg-bins=-no-pie");
    }
    println!("cargo:rerun-if-changed=build.rs");
}
