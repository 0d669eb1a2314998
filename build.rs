use std::env;

const GIT_DIR: &str = "./.git";

#[cfg(feature = "git_version")]
fn git_short_id() -> Option<String> {
    let repo = gix::ThreadSafeRepository::open(GIT_DIR).ok()?.to_thread_local();
    let id = repo.head_id().ok()?.shorten().ok()?;

    Some(id.to_string())
}

#[cfg(not(feature = "git_version"))]
fn git_short_id() -> Option<String> {
    None
}

/// How `DevicePath` can reach the kernel driver in this build.
fn libdrm_mode() -> Option<&'static str> {
    if env::var_os("CARGO_FEATURE_LIBDRM_DYNAMIC_LOADING").is_some() {
        Some("libdrm dlopen")
    } else if env::var_os("CARGO_FEATURE_LIBDRM_LINK").is_some() {
        Some("libdrm")
    } else {
        None
    }
}

fn main() {
    let mut tags: Vec<String> = vec!["GFX6-GFX8".to_string()];

    tags.extend(libdrm_mode().map(str::to_string));
    tags.extend(git_short_id().map(|id| format!("git-{id}")));

    if env::var("PROFILE").is_ok_and(|p| p != "release") {
        tags.push("debug build".to_string());
    }

    println!(
        "cargo:rustc-env=TITLE={} {} ({})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        tags.join(", "),
    );

    if cfg!(feature = "git_version") && std::path::Path::new(GIT_DIR).exists() {
        println!("cargo:rerun-if-changed={GIT_DIR}/HEAD");
        println!("cargo:rerun-if-changed={GIT_DIR}/refs");
    }
    println!("cargo:rerun-if-changed=build.rs");
}
