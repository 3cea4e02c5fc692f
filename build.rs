use std::env;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    if env::var_os("CARGO_FEATURE_NATIVE").is_none() {
        return;
    }
    let windows = env::var("CARGO_CFG_TARGET_OS").map_or(false, |os| os == "windows");
    let oracle_client_lib = if windows { "oci" } else { "clntsh" };
    println!("cargo:rustc-link-lib=dylib={}", oracle_client_lib);

    if windows {
        if let Some( path ) = env::var_os("PATH") {
            for dir in env::split_paths(&path) {
                if has_oci_dll(&dir) {
                    println!("cargo:rustc-link-search=native={}", dir.display());
                }
            }
        }
    }
}

fn has_oci_dll(dir: &std::path::PathBuf) -> bool {
    if let Ok( iter ) = dir.read_dir() {
        for entry in iter {
            if let Ok( file ) = entry {
                if let Some( name ) = file.file_name().to_str() {
                    if name.to_lowercase() == "oci.dll" {
                        return true;
                    }
                }
            }
        }
    }
    false
}
