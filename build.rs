//! Build-time hints for locating the FFmpeg development libraries.
//!
//! `ffmpeg-sys-next` does the actual discovery; this only warns early on
//! Windows, where a missing `FFMPEG_DIR` is the usual cause of link errors.

use std::env;
use std::path::PathBuf;

const WATCHED_VARIABLES: [&str; 4] = ["FFMPEG_DIR", "VCPKG_ROOT", "VCPKGRS_DYNAMIC", "VCPKGRS_TRIPLET"];

fn main() {
    for variable in WATCHED_VARIABLES {
        println!("cargo:rerun-if-env-changed={variable}");
    }

    if env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("windows")
        || env::var_os("FFMPEG_DIR").is_some()
    {
        return;
    }

    let Some(vcpkg_root) = env::var_os("VCPKG_ROOT") else {
        println!(
            "cargo:warning=frame2img: FFMPEG_DIR is not set. Install FFmpeg with vcpkg and point FFMPEG_DIR at it."
        );
        return;
    };

    let triplet = env::var("VCPKGRS_TRIPLET").unwrap_or_else(|_| "x64-windows".to_string());
    let install_dir = PathBuf::from(vcpkg_root).join("installed").join(triplet);

    if !install_dir.exists() {
        println!(
            "cargo:warning=frame2img: no vcpkg FFmpeg install under {}.",
            install_dir.display()
        );
        return;
    }

    println!(
        "cargo:warning=frame2img: found vcpkg FFmpeg at {0}; set FFMPEG_DIR={0} to use it explicitly.",
        install_dir.display()
    );
    if env::var_os("VCPKGRS_DYNAMIC").is_none() {
        println!("cargo:warning=frame2img: set VCPKGRS_DYNAMIC=1 for dynamic vcpkg FFmpeg builds.");
    }
}
