use std::env;

fn main() {
    let target = env::var("CARGO_CFG_TARGET_ARCH").unwrap();

    if target == "riscv32" {
        // Build startup code and archive it
        let mut cc = cc::Build::new();
        cc.compiler("riscv64-unknown-elf-gcc")
            .flag("-march=rv32imac")
            .flag("-mabi=ilp32");

        cc.file("src/arch/riscv/startup.S")
            .file("src/arch/riscv/trap.S")
            .compile("libcpu.a");

        println!("cargo:rerun-if-changed=src/arch/riscv/startup.S");
        println!("cargo:rerun-if-changed=src/arch/riscv/trap.S");
        println!("cargo:rerun-if-changed=linkers/riscv32.ld");
    }

    // Optional flat binary loaded as a user process at boot
    println!("cargo:rustc-check-cfg=cfg(user_image)");
    println!("cargo:rerun-if-env-changed=RVK_USER_IMAGE");
    if let Ok(path) = env::var("RVK_USER_IMAGE") {
        println!("cargo:rustc-cfg=user_image");
        println!("cargo:rustc-env=RVK_USER_IMAGE={}", path);
        println!("cargo:rerun-if-changed={}", path);
    }

    println!("cargo:rerun-if-changed=build.rs");
}
