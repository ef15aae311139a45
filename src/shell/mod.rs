// src/shell/mod.rs

//! Development shell provisioning
//!
//! A dev shell sees the same dependency set as the production build, plus
//! development-only tools (compiler, formatter, linter, language server and
//! a wasm bundler when the wasm feature is on). On Linux the shell also runs
//! a startup hook that puts the GSettings schemas on `XDG_DATA_DIRS` so
//! native file dialogs work from inside the shell.
//!
//! The hook is best effort: if it fails the shell still starts, with a
//! warning, using the environment as it was before the hook ran.

use crate::catalog::{Dependency, DependencySet};
use crate::derivation::Derivation;
use crate::environment::{EnvMap, PATH_VAR, PackageLocator, compose_environment};
use crate::error::{Error, Result};
use crate::platform::Platform;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use tracing::{debug, info, warn};

/// Startup hook exposing GSettings schemas to GTK dialogs
///
/// Unset variables contribute nothing; an unset `XDG_DATA_DIRS` falls back to
/// the XDG default so system data dirs stay visible.
pub const SCHEMA_HOOK: &str = r#"export XDG_DATA_DIRS="${GSETTINGS_SCHEMAS_PATH:+$GSETTINGS_SCHEMAS_PATH:}${XDG_DATA_DIRS:-/usr/local/share:/usr/share}""#;

/// Set to the package name inside a dev shell
pub const SHELL_MARKER_VAR: &str = "IN_KILN_SHELL";

/// A POSIX shell snippet run when the dev shell starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellHook {
    script: String,
}

impl ShellHook {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
        }
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    /// Run the hook in `sh` against `env` and return the environment it leaves
    pub fn run(&self, env: &EnvMap) -> Result<EnvMap> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(format!("{}\nenv -0", self.script))
            .env_clear()
            .envs(env.iter())
            .output()
            .map_err(|e| Error::IoError(format!("Failed to run shell hook: {}", e)))?;

        if !output.status.success() {
            return Err(Error::IoError(format!(
                "Shell hook failed ({}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(parse_env_dump(&output.stdout))
    }
}

/// Parse the NUL-separated output of `env -0`
fn parse_env_dump(raw: &[u8]) -> EnvMap {
    raw.split(|b| *b == 0)
        .filter(|chunk| !chunk.is_empty())
        .filter_map(|chunk| {
            let entry = String::from_utf8_lossy(chunk);
            let (key, value) = entry.split_once('=')?;
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

/// An interactive environment for working on a derivation
#[derive(Debug, Clone)]
pub struct DevEnvironment<'a> {
    derivation: &'a Derivation,
    tools: Vec<Dependency>,
    env: EnvMap,
    path_prefix: Vec<PathBuf>,
    hook: Option<ShellHook>,
}

/// Build the dev environment for `derivation`
///
/// `dev_tools` are added on top of the production dependency set; names
/// already present in either are skipped.
pub fn provision<'a>(
    derivation: &'a Derivation,
    dev_tools: &[Dependency],
    locator: &dyn PackageLocator,
) -> Result<DevEnvironment<'a>> {
    let deps = derivation.deps();
    let mut tools: Vec<Dependency> = Vec::new();
    for tool in dev_tools {
        if deps.contains(&tool.name) || tools.iter().any(|t| t.name == tool.name) {
            debug!("Skipping duplicate dev tool {}", tool.name);
            continue;
        }
        tools.push(tool.clone());
    }

    let env = compose_environment(deps, derivation.platform(), locator)?;

    let mut path_prefix: Vec<PathBuf> = Vec::new();
    for dep in tools.iter().chain(deps.native_build_inputs.iter()) {
        if let Some(dir) = locator.bin_dir(dep)
            && !path_prefix.contains(&dir)
        {
            path_prefix.push(dir);
        }
    }

    let hook = match derivation.platform() {
        Platform::Linux => Some(ShellHook::new(SCHEMA_HOOK)),
        Platform::Macos => None,
    };

    info!(
        "Provisioned dev shell for {}: {} inputs, {} dev tools",
        derivation.full_name(),
        deps.len(),
        tools.len()
    );

    Ok(DevEnvironment {
        derivation,
        tools,
        env,
        path_prefix,
        hook,
    })
}

impl<'a> DevEnvironment<'a> {
    pub fn derivation(&self) -> &'a Derivation {
        self.derivation
    }

    /// Same dependency set the production build uses
    pub fn deps(&self) -> &DependencySet {
        self.derivation.deps()
    }

    pub fn tools(&self) -> &[Dependency] {
        &self.tools
    }

    pub fn env(&self) -> &EnvMap {
        &self.env
    }

    pub fn path_prefix(&self) -> &[PathBuf] {
        &self.path_prefix
    }

    pub fn hook(&self) -> Option<&ShellHook> {
        self.hook.as_ref()
    }

    pub fn platform(&self) -> Platform {
        self.derivation.platform()
    }

    /// Replace the startup hook
    pub fn with_hook(mut self, hook: Option<ShellHook>) -> Self {
        self.hook = hook;
        self
    }

    /// Final shell environment on top of `inherited`
    ///
    /// A failing hook is logged and skipped.
    pub fn prepare(&self, inherited: &EnvMap) -> EnvMap {
        let mut env = inherited.clone();
        env.overlay(&self.env);
        env.insert(SHELL_MARKER_VAR, self.derivation.name());
        if let Err(e) = env.prepend_path(PATH_VAR, &self.path_prefix) {
            warn!("Could not extend PATH: {}", e);
        }

        if let Some(hook) = &self.hook {
            match hook.run(&env) {
                Ok(after) => env = after,
                Err(e) => warn!("Shell hook failed, continuing without it: {}", e),
            }
        }

        env
    }

    /// Start an interactive shell and wait for it to exit
    ///
    /// Uses `shell` when given, then `$SHELL`, then `bash`, then `sh`.
    pub fn enter(&self, shell: Option<&Path>) -> Result<ExitStatus> {
        let inherited = EnvMap::from_process();
        let shell = match shell {
            Some(path) => path.to_path_buf(),
            None => inherited
                .get("SHELL")
                .map(PathBuf::from)
                .or_else(|| which::which("bash").ok())
                .unwrap_or_else(|| PathBuf::from("sh")),
        };
        let env = self.prepare(&inherited);

        info!(
            "Entering dev shell for {} ({})",
            self.derivation.full_name(),
            shell.display()
        );

        Command::new(&shell)
            .current_dir(self.derivation.source().root())
            .env_clear()
            .envs(env.iter())
            .status()
            .map_err(|e| Error::IoError(format!("Failed to start {}: {}", shell.display(), e)))
    }

    /// POSIX script reproducing this environment, for `eval` or `source`
    pub fn render_script(&self) -> String {
        let mut script = String::new();
        for (key, value) in self.env.iter() {
            script.push_str(&format!("export {}={}\n", key, quote(value)));
        }
        script.push_str(&format!(
            "export {}={}\n",
            SHELL_MARKER_VAR,
            quote(self.derivation.name())
        ));
        if !self.path_prefix.is_empty() {
            let prefix: Vec<String> = self
                .path_prefix
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect();
            script.push_str(&format!(
                "export PATH={}\"${{PATH:+:$PATH}}\"\n",
                quote(&prefix.join(":"))
            ));
        }
        if let Some(hook) = &self.hook {
            script.push_str(hook.script());
            script.push('\n');
        }
        script
    }
}

/// Single-quote a value for POSIX shells
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::derivation::{CheckPhase, Composition, Meta};
    use crate::environment::{DATA_DIRS_VAR, SCHEMAS_PATH_VAR, StoreLocator};
    use crate::platform::{Feature, FeatureSet};
    use crate::source::{ExcludeRules, filter_source};
    use crate::version::derive_version;
    use std::fs;
    use tempfile::TempDir;

    fn derivation(dir: &TempDir, platform: Platform, features: FeatureSet) -> Derivation {
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/main.rs"), "fn main() {}\n").unwrap();
        fs::write(dir.path().join("Cargo.lock"), "version = 3\n").unwrap();
        Composition {
            name: "nes-emu".to_string(),
            platform,
            version: derive_version("20240115").unwrap(),
            deps: Catalog::builtin().resolve(platform, &features).unwrap(),
            features,
            source: filter_source(dir.path(), &ExcludeRules::default()).unwrap(),
            lock_file: dir.path().join("Cargo.lock"),
            meta: Meta::default(),
            check: CheckPhase::Enabled,
            binary: None,
        }
        .compose()
        .unwrap()
    }

    fn locator() -> StoreLocator {
        StoreLocator::new(Path::new("/store"))
    }

    #[test]
    fn test_provision_adds_tools_on_top_of_build_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let features = FeatureSet::new().with(Feature::Wasm);
        let drv = derivation(&dir, Platform::Linux, features.clone());
        let tools = Catalog::builtin()
            .dev_tools(Platform::Linux, &features)
            .unwrap();

        let shell = provision(&drv, &tools, &locator()).unwrap();
        let names: Vec<&str> = shell.tools().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            ["cargo", "rustc", "rustfmt", "clippy", "rust-analyzer", "trunk"]
        );
        assert_eq!(shell.deps(), drv.deps());
        assert_eq!(shell.path_prefix()[0], PathBuf::from("/store/cargo/bin"));
        assert!(shell.path_prefix().contains(&PathBuf::from("/store/cmake/bin")));
        assert_eq!(shell.hook().unwrap().script(), SCHEMA_HOOK);
    }

    #[test]
    fn test_duplicate_tools_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let drv = derivation(&dir, Platform::Linux, FeatureSet::new());
        let tools = vec![
            Dependency::tool("cmake"),
            Dependency::tool("gdb"),
            Dependency::tool("gdb"),
        ];
        let shell = provision(&drv, &tools, &locator()).unwrap();
        assert_eq!(shell.tools().len(), 1);
        assert_eq!(shell.tools()[0].name, "gdb");
    }

    #[test]
    fn test_macos_has_no_hook() {
        let dir = tempfile::tempdir().unwrap();
        let drv = derivation(&dir, Platform::Macos, FeatureSet::new());
        let shell = provision(&drv, &[], &locator()).unwrap();
        assert!(shell.hook().is_none());
        assert!(shell.env().is_empty());
    }

    #[test]
    fn test_prepare_runs_schema_hook() {
        let dir = tempfile::tempdir().unwrap();
        let features = FeatureSet::new().with(Feature::GtkFilePicker);
        let drv = derivation(&dir, Platform::Linux, features);
        let shell = provision(&drv, &[], &locator()).unwrap();

        let inherited: EnvMap = [
            ("PATH".to_string(), "/usr/bin:/bin".to_string()),
            (DATA_DIRS_VAR.to_string(), "/usr/share".to_string()),
        ]
        .into_iter()
        .collect();
        let env = shell.prepare(&inherited);

        let schemas = env.get(SCHEMAS_PATH_VAR).unwrap().to_string();
        assert_eq!(
            env.get(DATA_DIRS_VAR).unwrap(),
            format!("{}:/usr/share", schemas)
        );
        assert_eq!(env.get(SHELL_MARKER_VAR), Some("nes-emu"));
        assert!(env.get("PATH").unwrap().ends_with(":/usr/bin:/bin"));
    }

    #[cfg(unix)]
    #[test]
    fn test_schema_hook_without_inherited_data_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let features = FeatureSet::new().with(Feature::GtkFilePicker);
        let drv = derivation(&dir, Platform::Linux, features);
        let shell = provision(&drv, &[], &locator()).unwrap();

        let inherited: EnvMap = [("PATH".to_string(), "/usr/bin:/bin".to_string())]
            .into_iter()
            .collect();
        let env = shell.prepare(&inherited);

        let schemas = env.get(SCHEMAS_PATH_VAR).unwrap().to_string();
        assert_eq!(
            env.get(DATA_DIRS_VAR).unwrap(),
            format!("{}:/usr/local/share:/usr/share", schemas)
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_schema_hook_without_schemas() {
        let dir = tempfile::tempdir().unwrap();
        let drv = derivation(&dir, Platform::Linux, FeatureSet::new());
        let shell = provision(&drv, &[], &locator()).unwrap();
        assert!(!shell.env().contains_key(SCHEMAS_PATH_VAR));

        let inherited: EnvMap = [("PATH".to_string(), "/usr/bin:/bin".to_string())]
            .into_iter()
            .collect();
        let env = shell.prepare(&inherited);
        assert_eq!(env.get(DATA_DIRS_VAR), Some("/usr/local/share:/usr/share"));

        let inherited: EnvMap = [
            ("PATH".to_string(), "/usr/bin:/bin".to_string()),
            (DATA_DIRS_VAR.to_string(), "/opt/share".to_string()),
        ]
        .into_iter()
        .collect();
        let env = shell.prepare(&inherited);
        assert_eq!(env.get(DATA_DIRS_VAR), Some("/opt/share"));
    }

    #[test]
    fn test_failing_hook_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let drv = derivation(&dir, Platform::Linux, FeatureSet::new());
        let shell = provision(&drv, &[], &locator())
            .unwrap()
            .with_hook(Some(ShellHook::new("exit 3")));

        let inherited: EnvMap = [("PATH".to_string(), "/usr/bin:/bin".to_string())]
            .into_iter()
            .collect();
        let env = shell.prepare(&inherited);
        assert_eq!(env.get(SHELL_MARKER_VAR), Some("nes-emu"));
        assert!(env.contains_key(crate::environment::LIBRARY_PATH_VAR));
    }

    #[test]
    fn test_render_script() {
        let dir = tempfile::tempdir().unwrap();
        let drv = derivation(&dir, Platform::Linux, FeatureSet::new());
        let shell = provision(&drv, &[Dependency::tool("cargo")], &locator()).unwrap();
        let script = shell.render_script();
        assert!(script.contains("export LD_LIBRARY_PATH='/store/libX11/lib:"));
        assert!(script.contains("export PATH='/store/cargo/bin:"));
        assert!(script.ends_with(&format!("{}\n", SCHEMA_HOOK)));
    }

    #[test]
    fn test_parse_env_dump() {
        let env = parse_env_dump(b"A=1\0B=x=y\0MULTI=line1\nline2\0");
        assert_eq!(env.get("A"), Some("1"));
        assert_eq!(env.get("B"), Some("x=y"));
        assert_eq!(env.get("MULTI"), Some("line1\nline2"));
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("it's"), r"'it'\''s'");
    }
}
