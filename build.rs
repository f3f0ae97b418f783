//! Build script for proto compilation and version stamping.
//!
//! The generated protocol code is committed as `src/generated.rs`, so proto
//! compilation only runs with `cargo build --features regenerate-proto`.
//!
//! Release pipelines stamp the provider version by exporting
//! `XYZ_PROVIDER_VERSION` at build time; without it the crate version is used.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(feature = "regenerate-proto")]
    {
        let out_dir = std::path::PathBuf::from("src");
        tonic_prost_build::configure()
            .build_server(true)
            .build_client(true)
            .out_dir(&out_dir)
            .compile_protos(&["proto/provider.proto"], &["proto"])?;

        let generated = out_dir.join("hemmer.provider.v1.rs");
        let target = out_dir.join("generated.rs");
        if generated.exists() {
            std::fs::rename(generated, target)?;
        }
    }

    println!("cargo:rerun-if-changed=proto/provider.proto");
    println!("cargo:rerun-if-env-changed=XYZ_PROVIDER_VERSION");

    Ok(())
}
