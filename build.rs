// Link against libheif. A pkg-config probe picks up the system install;
// without pkg-config metadata we fall back to plain linking and rely on the
// default library search path.

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    match pkg_config::Config::new().atleast_version("1.18").probe("libheif") {
        Ok(library) => {
            for lib in &library.libs {
                println!("cargo:rustc-link-lib={lib}");
            }
            for link_path in &library.link_paths {
                println!("cargo:rustc-link-search={}", link_path.display());
            }
        }
        Err(_) => {
            println!("cargo:rustc-link-lib=heif");
        }
    }
}
