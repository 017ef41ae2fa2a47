// Prevents additional console window on Windows in release, DO NOT REMOVE!!
#![cfg_attr(all(not(debug_assertions), feature = "tauri-app"), windows_subsystem = "windows")]

fn main() {
    #[cfg(feature = "tauri-app")]
    haske_lib::run();

    #[cfg(not(feature = "tauri-app"))]
    std::process::exit(haske_lib::headless::run());
}
