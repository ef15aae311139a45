// tests/dev_shell.rs

//! Dev shell provisioning on top of a composed derivation.

mod common;

use common::{compose_for, sample_project};
use kiln::catalog::{Catalog, Dependency};
use kiln::environment::{DATA_DIRS_VAR, EnvMap, SCHEMAS_PATH_VAR, StoreLocator};
use kiln::platform::{Feature, FeatureSet, Platform};
use kiln::shell::{SCHEMA_HOOK, SHELL_MARKER_VAR, provision};
use std::path::Path;

fn store() -> StoreLocator {
    StoreLocator::new(Path::new("/store"))
}

#[test]
fn test_shell_shares_build_inputs() {
    let project = sample_project();
    let features = FeatureSet::new().with(Feature::GtkFilePicker);
    let drv = compose_for(project.path(), Platform::Linux, features.clone());
    let mut tools = Catalog::builtin()
        .dev_tools(Platform::Linux, &features)
        .unwrap();
    tools.push(Dependency::tool("gdb"));

    let shell = provision(&drv, &tools, &store()).unwrap();

    assert!(std::ptr::eq(shell.deps(), drv.deps()));
    assert!(shell.tools().iter().any(|t| t.name == "rust-analyzer"));
    assert!(shell.tools().iter().any(|t| t.name == "gdb"));
    assert!(!shell.tools().iter().any(|t| t.name == "trunk"));
    assert!(shell.env().contains_key(SCHEMAS_PATH_VAR));
    assert_eq!(shell.hook().map(|h| h.script()), Some(SCHEMA_HOOK));
}

#[test]
fn test_wasm_shell_gets_bundler() {
    let project = sample_project();
    let features = FeatureSet::new().with(Feature::Wasm);
    let drv = compose_for(project.path(), Platform::Macos, features.clone());
    let tools = Catalog::builtin()
        .dev_tools(Platform::Macos, &features)
        .unwrap();

    let shell = provision(&drv, &tools, &store()).unwrap();
    assert!(shell.tools().iter().any(|t| t.name == "trunk"));
    assert!(shell.hook().is_none());
    assert!(shell.env().is_empty());
    assert!(shell.path_prefix().contains(&Path::new("/store/trunk/bin").to_path_buf()));
}

#[cfg(unix)]
#[test]
fn test_hook_extends_data_dirs() {
    let project = sample_project();
    let drv = compose_for(
        project.path(),
        Platform::Linux,
        FeatureSet::new().with(Feature::GtkFilePicker),
    );
    let shell = provision(&drv, &[], &store()).unwrap();

    let inherited: EnvMap = [
        ("PATH".to_string(), "/usr/bin:/bin".to_string()),
        (DATA_DIRS_VAR.to_string(), "/usr/local/share:/usr/share".to_string()),
    ]
    .into_iter()
    .collect();
    let env = shell.prepare(&inherited);

    let data_dirs = env.get(DATA_DIRS_VAR).unwrap();
    assert!(data_dirs.starts_with("/store/gtk3/share/gsettings-schemas/gtk3:"));
    assert!(data_dirs.ends_with(":/usr/local/share:/usr/share"));
    assert_eq!(env.get(SHELL_MARKER_VAR), Some("nes-emu"));
}

#[test]
fn test_rendered_script_is_sourceable_shape() {
    let project = sample_project();
    let drv = compose_for(project.path(), Platform::Linux, FeatureSet::new());
    let shell = provision(&drv, &[Dependency::tool("cargo")], &store()).unwrap();

    let script = shell.render_script();
    for line in script.lines().filter(|l| !l.is_empty()) {
        assert!(line.starts_with("export "), "unexpected line: {}", line);
    }
    assert!(script.contains(SHELL_MARKER_VAR));
}
