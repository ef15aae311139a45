// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: project manifest
fn manifest_arg() -> Arg {
    Arg::new("manifest")
        .short('m')
        .long("manifest")
        .value_name("PATH")
        .default_value("kiln.toml")
        .global(true)
        .help("Path to the project manifest")
}

/// Common argument: target platform
fn platform_arg() -> Arg {
    Arg::new("platform")
        .short('p')
        .long("platform")
        .value_name("PLATFORM")
        .global(true)
        .help("Target platform (linux, macos, or a system string such as x86_64-linux)")
}

fn feature_arg() -> Arg {
    Arg::new("feature")
        .short('F')
        .long("feature")
        .value_name("FEATURE")
        .action(ArgAction::Append)
        .global(true)
        .help("Enable a feature on top of the manifest's (gtk-file-picker, wasm)")
}

fn build_cli() -> Command {
    Command::new("kiln")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Kiln Contributors")
        .about("Declarative build composition for native GUI applications")
        .subcommand_required(true)
        .arg(manifest_arg())
        .arg(platform_arg())
        .arg(feature_arg())
        .arg(
            Arg::new("timestamp")
                .long("timestamp")
                .value_name("YYYYMMDD")
                .global(true)
                .help("Build timestamp; defaults to the manifest, then the source's mtime"),
        )
        .arg(
            Arg::new("store")
                .long("store")
                .value_name("PATH")
                .global(true)
                .help("Package store root used to locate dependencies"),
        )
        .subcommand(
            Command::new("check")
                .about("Compose the derivation and run its check phase")
                .arg(
                    Arg::new("validate_only")
                        .long("validate-only")
                        .action(ArgAction::SetTrue)
                        .help("Only parse and validate the manifest"),
                )
                .arg(
                    Arg::new("keep_staging")
                        .long("keep-staging")
                        .action(ArgAction::SetTrue)
                        .help("Keep the staging directory after the run"),
                ),
        )
        .subcommand(
            Command::new("build")
                .about("Build the derivation, reusing a cached output when the plan is unchanged")
                .arg(
                    Arg::new("out_dir")
                        .short('o')
                        .long("out-dir")
                        .value_name("PATH")
                        .help("Output cache directory"),
                )
                .arg(
                    Arg::new("jobs")
                        .short('j')
                        .long("jobs")
                        .value_name("N")
                        .help("Number of parallel jobs"),
                )
                .arg(
                    Arg::new("keep_staging")
                        .long("keep-staging")
                        .action(ArgAction::SetTrue)
                        .help("Keep the staging directory after the build"),
                )
                .arg(
                    Arg::new("no_link")
                        .long("no-link")
                        .action(ArgAction::SetTrue)
                        .help("Do not create the result link next to the manifest"),
                ),
        )
        .subcommand(
            Command::new("dev-shell")
                .about("Enter a development shell with the build inputs and dev tools")
                .arg(
                    Arg::new("shell")
                        .long("shell")
                        .value_name("PATH")
                        .help("Shell to start (default: $SHELL)"),
                )
                .arg(
                    Arg::new("print")
                        .long("print")
                        .action(ArgAction::SetTrue)
                        .help("Print the environment as a POSIX script instead of starting a shell"),
                ),
        )
        .subcommand(
            Command::new("plan")
                .about("Print the composed derivation as JSON")
                .arg(
                    Arg::new("compact")
                        .long("compact")
                        .action(ArgAction::SetTrue)
                        .help("Compact output on one line"),
                ),
        )
        .subcommand(
            Command::new("version")
                .about("Print the derived package version")
                .arg(
                    Arg::new("semver")
                        .long("semver")
                        .action(ArgAction::SetTrue)
                        .help("Print the strict semver rendering"),
                ),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(Arg::new("shell").required(true).help("bash, zsh, fish, elvish or powershell")),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("kiln.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
