use std::env;
use std::path::PathBuf;

const WATCHED: [&str; 4] = ["FFMPEG_DIR", "VCPKG_ROOT", "VCPKGRS_DYNAMIC", "VCPKGRS_TRIPLET"];

fn main() {
    for variable in WATCHED {
        println!("cargo:rerun-if-env-changed={variable}");
    }

    // Only Windows builds need help locating the FFmpeg libraries used for
    // probing; elsewhere pkg-config finds them.
    if env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("windows") || env::var_os("FFMPEG_DIR").is_some() {
        return;
    }

    let Some(install) = vcpkg_install() else {
        println!(
            "cargo:warning=tomp4 probes media through the FFmpeg libraries. Set FFMPEG_DIR (or VCPKG_ROOT with FFmpeg installed via vcpkg) before building on Windows."
        );
        return;
    };

    if !install.exists() {
        println!(
            "cargo:warning=VCPKG_ROOT is set but {} does not exist; install the ffmpeg port or set FFMPEG_DIR.",
            install.display(),
        );
        return;
    }

    println!(
        "cargo:warning=Using the vcpkg FFmpeg under {}. Export FFMPEG_DIR={} to silence this message.",
        install.display(),
        install.display(),
    );
    if env::var_os("VCPKGRS_DYNAMIC").is_none() {
        println!("cargo:warning=Set VCPKGRS_DYNAMIC=1 if the vcpkg FFmpeg was built as DLLs.");
    }
}

fn vcpkg_install() -> Option<PathBuf> {
    let root = env::var_os("VCPKG_ROOT")?;
    let triplet = env::var("VCPKGRS_TRIPLET").unwrap_or_else(|_| "x64-windows".to_string());
    Some(PathBuf::from(root).join("installed").join(triplet))
}
