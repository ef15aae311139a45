// src/catalog/builtin.rs

//! Built-in catalog rows for a winit/wgpu style GUI application

use super::{CatalogEntry, Dependency, Variant};
use crate::platform::{Feature, Platform};

pub const WASM_TARGET: &str = "wasm32-unknown-unknown";

pub(super) fn entries() -> Vec<CatalogEntry> {
    vec![
        // Build system generator and library lookup, everywhere
        CatalogEntry {
            native: vec![Dependency::tool("cmake"), Dependency::tool("pkg-config")],
            ..Default::default()
        },
        // X11 / Wayland windowing, keyboard layouts, GPU loader and fonts
        CatalogEntry {
            platform: Some(Platform::Linux),
            build: vec![
                Dependency::library("libX11"),
                Dependency::library("libXcursor"),
                Dependency::library("libXrandr"),
                Dependency::library("libXi"),
                Dependency::library("libxkbcommon"),
                Dependency::library("wayland"),
                Dependency::library("vulkan-loader"),
                Dependency::library("fontconfig"),
            ],
            ..Default::default()
        },
        // Native file dialog: the GTK stack plus the wrapper that points the
        // binary at GSettings schemas
        CatalogEntry {
            platform: Some(Platform::Linux),
            feature: Some(Feature::GtkFilePicker),
            native: vec![Dependency::hook("wrapGAppsHook")],
            build: vec![
                Dependency::library("glib"),
                Dependency::library("atk"),
                Dependency::library("gtk3").with_data(),
                Dependency::library("cairo"),
                Dependency::library("pango"),
                Dependency::library("gdk-pixbuf"),
                Dependency::library("gsettings-desktop-schemas").with_data(),
            ],
            ..Default::default()
        },
        CatalogEntry {
            platform: Some(Platform::Macos),
            build: vec![
                Dependency::framework("AppKit"),
                Dependency::framework("CoreGraphics"),
                Dependency::framework("CoreServices"),
                Dependency::framework("Foundation"),
                Dependency::framework("OpenGL"),
            ],
            ..Default::default()
        },
        CatalogEntry {
            feature: Some(Feature::Wasm),
            targets: vec![WASM_TARGET.to_string()],
            ..Default::default()
        },
        // Interactive shells only
        CatalogEntry {
            only: Some(Variant::Development),
            native: vec![
                Dependency::tool("cargo"),
                Dependency::tool("rustc"),
                Dependency::tool("rustfmt"),
                Dependency::tool("clippy"),
                Dependency::tool("rust-analyzer"),
            ],
            ..Default::default()
        },
        CatalogEntry {
            feature: Some(Feature::Wasm),
            only: Some(Variant::Development),
            native: vec![Dependency::tool("trunk")],
            ..Default::default()
        },
    ]
}
