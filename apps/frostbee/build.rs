use ld_memory::{Memory, MemorySection};

fn main() {
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("none") {
        return;
    }

    let memory = Memory::new()
        .add_section(MemorySection::new("RAM", 0x20000000, 256 * 1024))
        .add_section(
            MemorySection::new("FLASH", 0x0, 1024 * 1024)
                .pagesize(4096)
                .from_env_with_prefix("FROSTBEE_FLASH"),
        );

    memory.to_cargo_outdir("memory.x").expect("wrote memory.x");

    println!("cargo:rustc-link-arg-bins=--nmagic");
    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
    println!("cargo:rerun-if-changed=build.rs");
}
