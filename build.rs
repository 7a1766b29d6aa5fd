use std::fs;

fn main() {
    // VERSION is the single source of truth for release tooling
    let version_file = fs::read_to_string("VERSION")
        .expect("VERSION file not found - run: echo '0.1.0' > VERSION");

    let version = version_file.trim();
    let cargo_version = env!("CARGO_PKG_VERSION");

    if version != cargo_version {
        panic!(
            "\n\n\
            VERSION MISMATCH for reactive-cache\n\
            VERSION file: {}\n\
            Cargo.toml:   {}\n\n\
            Update both to the same release number.\n\n",
            version, cargo_version
        );
    }

    println!("cargo:rerun-if-changed=VERSION");
}
