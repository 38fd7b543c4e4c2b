//! Dependency installation into a scratch directory.
//!
//! Builds a minimal `package.json` holding only the requested dependencies,
//! copies the project's lockfile next to it, runs the package manager there
//! and hands the result to the layout resolver. The package manager itself is
//! a black box behind [`CommandRunner`].

use crate::entry::ArchiveEntry;
use crate::error::EntryError;
use crate::ignore::IgnoreMatcher;
use crate::layout::{resolve_package_entries, PackageManager};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::TempDir;
use tokio::fs;
use tracing::{debug, info};

/// Archive prefix for installed dependencies unless told otherwise.
pub const DEFAULT_PACKAGE_PREFIX: &str = "node_modules";

const SLICE_NAME: &str = "build";
const SCRATCH_PREFIX: &str = "nodezip-install-";

/// Synthetic `package.json` restricted to the requested dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestSlice {
    pub name: String,
    pub private: bool,
    pub dependencies: BTreeMap<String, String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectManifest {
    #[serde(default)]
    dependencies: BTreeMap<String, Value>,
    #[serde(default)]
    dev_dependencies: BTreeMap<String, Value>,
}

impl ProjectManifest {
    /// Look a dependency up in `dependencies`, then `devDependencies`.
    fn version_of(&self, name: &str) -> Result<Option<&str>, EntryError> {
        for (section, deps) in [
            ("dependencies", &self.dependencies),
            ("devDependencies", &self.dev_dependencies),
        ] {
            match deps.get(name) {
                Some(Value::String(v)) if !v.is_empty() => return Ok(Some(v.as_str())),
                Some(Value::String(_)) | None => {}
                Some(other) => {
                    return Err(EntryError::package_json_invalid(format!(
                        "'{section}.{name}' must be a string, got {other}"
                    )));
                }
            }
        }
        Ok(None)
    }
}

impl ManifestSlice {
    /// Build the slice from the project's `package.json` content.
    ///
    /// Every requested name must appear in `dependencies` or
    /// `devDependencies`; it is pinned to the version spec found there.
    pub fn from_manifest(
        manifest: &str,
        requested: &[String],
        package_json: &Path,
    ) -> Result<Self, EntryError> {
        let project: ProjectManifest = serde_json::from_str(manifest).map_err(|e| {
            EntryError::package_json_invalid(format!(
                "invalid JSON in {}: {e}",
                package_json.display()
            ))
        })?;

        let mut dependencies = BTreeMap::new();
        for name in requested {
            let Some(version) = project.version_of(name)? else {
                return Err(EntryError::dep_not_found(name, package_json));
            };
            dependencies.insert(name.clone(), version.to_string());
        }

        Ok(Self {
            name: SLICE_NAME.to_string(),
            private: true,
            dependencies,
        })
    }
}

/// What to install.
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// The project's `package.json`.
    pub package_json: PathBuf,
    /// The project's lockfile; its file name selects the package manager.
    pub lockfile: PathBuf,
    /// Dependency names to install.
    pub packages: Vec<String>,
    /// Target CPU architecture (`arch=` in `.npmrc`).
    pub arch: Option<String>,
    /// Target OS platform (`platform=` in `.npmrc`).
    pub platform: Option<String>,
}

impl InstallOptions {
    pub fn new(
        package_json: impl Into<PathBuf>,
        lockfile: impl Into<PathBuf>,
        packages: Vec<String>,
    ) -> Self {
        Self {
            package_json: package_json.into(),
            lockfile: lockfile.into(),
            packages,
            ..Default::default()
        }
    }

    pub fn with_arch(mut self, arch: Option<String>) -> Self {
        self.arch = arch;
        self
    }

    pub fn with_platform(mut self, platform: Option<String>) -> Self {
        self.platform = platform;
        self
    }

    fn npm_config(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(arch) = &self.arch {
            lines.push(format!("arch={arch}"));
        }
        if let Some(platform) = &self.platform {
            lines.push(format!("platform={platform}"));
        }
        lines
    }
}

/// A package manager invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl InstallCommand {
    #[must_use]
    pub fn for_manager(manager: PackageManager) -> Self {
        let (program, args): (&str, &[&str]) = match manager {
            PackageManager::Npm => ("npm", &["ci"][..]),
            PackageManager::Yarn => ("yarn", &["--frozen-lockfile"][..]),
            PackageManager::Pnpm => ("pnpm", &["install", "--no-frozen-lockfile"][..]),
        };
        Self {
            program: program.to_string(),
            args: args.iter().map(ToString::to_string).collect(),
        }
    }
}

impl fmt::Display for InstallCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Runs the package manager to completion and reports its exit code.
pub trait CommandRunner {
    /// Run `command` in `cwd`. A process killed by a signal reports `-1`.
    fn run(
        &self,
        command: &InstallCommand,
        cwd: &Path,
    ) -> impl Future<Output = io::Result<i32>> + Send;
}

/// Spawns the real package manager with inherited stdio.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(
        &self,
        command: &InstallCommand,
        cwd: &Path,
    ) -> impl Future<Output = io::Result<i32>> + Send {
        let mut cmd = tokio::process::Command::new(&command.program);
        cmd.args(&command.args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        async move {
            let status = cmd.status().await?;
            Ok(status.code().unwrap_or(-1))
        }
    }
}

/// A finished install. Owns the scratch directory, which is deleted on drop.
#[derive(Debug)]
pub struct InstalledPackages {
    dir: TempDir,
    manager: PackageManager,
}

impl InstalledPackages {
    #[must_use]
    pub fn manager(&self) -> PackageManager {
        self.manager
    }

    /// The scratch directory the install ran in.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    #[must_use]
    pub fn node_modules(&self) -> PathBuf {
        self.dir.path().join("node_modules")
    }

    /// Archive entries of the installed tree.
    ///
    /// The stream borrows the install so the scratch directory cannot be
    /// dropped while entries are still being read.
    pub async fn entries(
        &self,
        archive_prefix: &str,
        ignore: IgnoreMatcher,
    ) -> Result<BoxStream<'_, Result<ArchiveEntry, EntryError>>, EntryError> {
        let stream =
            resolve_package_entries(self.manager, self.dir.path(), archive_prefix, ignore).await?;
        Ok(stream)
    }
}

/// Install the requested dependencies into a fresh scratch directory.
///
/// The lockfile kind and the requested names are validated before anything
/// is written or spawned. The package manager runs to completion; any
/// non-zero exit code fails the install.
pub async fn install_packages<R: CommandRunner>(
    options: &InstallOptions,
    runner: &R,
) -> Result<InstalledPackages, EntryError> {
    let manager = PackageManager::from_lockfile(&options.lockfile)?;

    let manifest = fs::read_to_string(&options.package_json)
        .await
        .map_err(|e| {
            EntryError::package_json_invalid(format!(
                "failed to read {}: {e}",
                options.package_json.display()
            ))
        })?;
    let slice = ManifestSlice::from_manifest(&manifest, &options.packages, &options.package_json)?;

    let dir = tempfile::Builder::new()
        .prefix(SCRATCH_PREFIX)
        .tempdir()
        .map_err(|e| EntryError::scratch_write_failed(format!("failed to create scratch dir: {e}")))?;
    debug!(dir = %dir.path().display(), %manager, "prepared scratch directory");

    let slice_json = serde_json::to_vec(&slice)
        .map_err(|e| EntryError::scratch_write_failed(format!("failed to encode package.json: {e}")))?;
    fs::write(dir.path().join("package.json"), slice_json)
        .await
        .map_err(|e| EntryError::scratch_write_failed(format!("failed to write package.json: {e}")))?;

    fs::copy(&options.lockfile, dir.path().join(manager.lockfile_name()))
        .await
        .map_err(|e| {
            EntryError::scratch_write_failed(format!(
                "failed to copy {}: {e}",
                options.lockfile.display()
            ))
        })?;

    let npm_config = options.npm_config();
    if !npm_config.is_empty() {
        let mut npmrc = npm_config.join("\n");
        npmrc.push('\n');
        fs::write(dir.path().join(".npmrc"), npmrc)
            .await
            .map_err(|e| EntryError::scratch_write_failed(format!("failed to write .npmrc: {e}")))?;
    }

    let command = InstallCommand::for_manager(manager);
    info!(
        command = %command,
        flags = %npm_config.join(", "),
        packages = slice.dependencies.len(),
        "installing packages"
    );

    let code = runner
        .run(&command, dir.path())
        .await
        .map_err(|e| EntryError::install_spawn_failed(&command.program, &e))?;
    if code != 0 {
        return Err(EntryError::install_failed(&command.program, code));
    }

    Ok(InstalledPackages { dir, manager })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::codes;
    use crate::layout::MODULES_MANIFEST_NAME;
    use futures::TryStreamExt;
    use std::fs as stdfs;
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// Records calls and fakes an install layout instead of spawning anything.
    struct FakeRunner {
        exit_code: i32,
        layout: fn(&Path),
        calls: Mutex<Vec<(InstallCommand, PathBuf)>>,
    }

    impl FakeRunner {
        fn new(exit_code: i32, layout: fn(&Path)) -> Self {
            Self {
                exit_code,
                layout,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(InstallCommand, PathBuf)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl CommandRunner for FakeRunner {
        fn run(
            &self,
            command: &InstallCommand,
            cwd: &Path,
        ) -> impl Future<Output = io::Result<i32>> + Send {
            self.calls
                .lock()
                .unwrap()
                .push((command.clone(), cwd.to_path_buf()));
            (self.layout)(cwd);
            let code = self.exit_code;
            async move { Ok(code) }
        }
    }

    fn no_layout(_: &Path) {}

    fn npm_layout(cwd: &Path) {
        let pkg = cwd.join("node_modules/left-pad");
        stdfs::create_dir_all(&pkg).unwrap();
        stdfs::write(pkg.join("index.js"), "module.exports = 1;").unwrap();
    }

    fn pnpm_layout(cwd: &Path) {
        let nm = cwd.join("node_modules");
        let pkg = nm.join(".pnpm/a@1.0.0/node_modules/a");
        stdfs::create_dir_all(&pkg).unwrap();
        stdfs::write(pkg.join("index.js"), "").unwrap();
        stdfs::write(
            nm.join(MODULES_MANIFEST_NAME),
            "hoistedDependencies:\n  a@1.0.0:\n    a: public\n",
        )
        .unwrap();
    }

    /// Writes a project with the given lockfile name and returns its paths.
    fn project(dir: &Path, lockfile: &str) -> (PathBuf, PathBuf) {
        let package_json = dir.join("package.json");
        stdfs::write(
            &package_json,
            r#"{
                "name": "app",
                "dependencies": {"left-pad": "^1.3.0", "a": "1.0.0", "shared": "2.0.0"},
                "devDependencies": {"jest": "^29.0.0", "shared": "1.0.0"}
            }"#,
        )
        .unwrap();
        let lock = dir.join(lockfile);
        stdfs::write(&lock, "lock").unwrap();
        (package_json, lock)
    }

    async fn archive_paths(installed: &InstalledPackages) -> Vec<String> {
        let entries: Vec<ArchiveEntry> = installed
            .entries(DEFAULT_PACKAGE_PREFIX, IgnoreMatcher::empty())
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        let mut paths: Vec<String> = entries
            .iter()
            .map(|e| e.archive_path().to_string())
            .collect();
        paths.sort();
        paths
    }

    #[test]
    fn test_slice_prefers_dependencies() {
        let slice = ManifestSlice::from_manifest(
            r#"{"dependencies": {"x": "2.0.0"}, "devDependencies": {"x": "1.0.0", "y": "^3"}}"#,
            &["x".to_string(), "y".to_string()],
            Path::new("package.json"),
        )
        .unwrap();

        assert_eq!(slice.name, "build");
        assert!(slice.private);
        assert_eq!(slice.dependencies.get("x").map(String::as_str), Some("2.0.0"));
        assert_eq!(slice.dependencies.get("y").map(String::as_str), Some("^3"));
    }

    #[test]
    fn test_slice_serializes_like_package_json() {
        let slice = ManifestSlice::from_manifest(
            r#"{"dependencies": {"x": "1.0.0"}}"#,
            &["x".to_string()],
            Path::new("package.json"),
        )
        .unwrap();
        let json = serde_json::to_value(&slice).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"name": "build", "private": true, "dependencies": {"x": "1.0.0"}})
        );
    }

    #[test]
    fn test_slice_missing_dependency() {
        let err = ManifestSlice::from_manifest(
            r#"{"dependencies": {"x": "1.0.0"}}"#,
            &["nope".to_string()],
            Path::new("/app/package.json"),
        )
        .unwrap_err();
        assert_eq!(err.code(), codes::DEP_NOT_FOUND);
        assert!(err.message().contains("nope"));
        assert!(err.message().contains("/app/package.json"));
    }

    #[test]
    fn test_slice_rejects_non_string_version() {
        let err = ManifestSlice::from_manifest(
            r#"{"dependencies": {"x": 1}}"#,
            &["x".to_string()],
            Path::new("package.json"),
        )
        .unwrap_err();
        assert_eq!(err.code(), codes::PACKAGE_JSON_INVALID);
    }

    #[test]
    fn test_slice_invalid_json() {
        let err =
            ManifestSlice::from_manifest("{", &[], Path::new("package.json")).unwrap_err();
        assert_eq!(err.code(), codes::PACKAGE_JSON_INVALID);
    }

    #[test]
    fn test_install_commands() {
        assert_eq!(
            InstallCommand::for_manager(PackageManager::Npm).to_string(),
            "npm ci"
        );
        assert_eq!(
            InstallCommand::for_manager(PackageManager::Yarn).to_string(),
            "yarn --frozen-lockfile"
        );
        assert_eq!(
            InstallCommand::for_manager(PackageManager::Pnpm).to_string(),
            "pnpm install --no-frozen-lockfile"
        );
    }

    #[tokio::test]
    async fn test_unrecognized_lockfile_fails_before_install() {
        let dir = tempdir().unwrap();
        let (package_json, lock) = project(dir.path(), "shrinkwrap.yaml");
        let runner = FakeRunner::new(0, no_layout);

        let options = InstallOptions::new(package_json, lock, vec!["left-pad".to_string()]);
        let err = install_packages(&options, &runner).await.unwrap_err();

        assert_eq!(err.code(), codes::LOCKFILE_UNRECOGNIZED);
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_dependency_fails_before_install() {
        let dir = tempdir().unwrap();
        let (package_json, lock) = project(dir.path(), "package-lock.json");
        let runner = FakeRunner::new(0, no_layout);

        let options = InstallOptions::new(package_json, lock, vec!["missing".to_string()]);
        let err = install_packages(&options, &runner).await.unwrap_err();

        assert_eq!(err.code(), codes::DEP_NOT_FOUND);
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_non_zero_exit_surfaces_code() {
        let dir = tempdir().unwrap();
        let (package_json, lock) = project(dir.path(), "package-lock.json");
        let runner = FakeRunner::new(1, no_layout);

        let options = InstallOptions::new(package_json, lock, vec!["left-pad".to_string()]);
        let err = install_packages(&options, &runner).await.unwrap_err();

        assert_eq!(err.code(), codes::INSTALL_FAILED);
        assert_eq!(err.exit_code(), Some(1));
        assert!(err.to_string().contains("code 1"));
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_npm_install_then_entries() {
        let dir = tempdir().unwrap();
        let (package_json, lock) = project(dir.path(), "package-lock.json");
        let runner = FakeRunner::new(0, npm_layout);

        let options = InstallOptions::new(package_json, lock, vec!["left-pad".to_string()]);
        let installed = install_packages(&options, &runner).await.unwrap();

        assert_eq!(installed.manager(), PackageManager::Npm);
        let calls = runner.calls();
        assert_eq!(calls[0].0, InstallCommand::for_manager(PackageManager::Npm));
        assert_eq!(calls[0].1, installed.path());

        let written: Value =
            serde_json::from_str(&stdfs::read_to_string(installed.path().join("package.json")).unwrap())
                .unwrap();
        assert_eq!(written["dependencies"], serde_json::json!({"left-pad": "^1.3.0"}));
        assert_eq!(
            stdfs::read_to_string(installed.path().join("package-lock.json")).unwrap(),
            "lock"
        );
        assert!(!installed.path().join(".npmrc").exists());

        assert_eq!(
            archive_paths(&installed).await,
            vec!["node_modules/left-pad/index.js"]
        );
    }

    #[tokio::test]
    async fn test_pnpm_install_then_entries() {
        let dir = tempdir().unwrap();
        let (package_json, lock) = project(dir.path(), "pnpm-lock.yaml");
        let runner = FakeRunner::new(0, pnpm_layout);

        let options = InstallOptions::new(package_json, lock, vec!["a".to_string()]);
        let installed = install_packages(&options, &runner).await.unwrap();

        assert_eq!(
            archive_paths(&installed).await,
            vec![
                "node_modules/.pnpm/a@1.0.0/node_modules/a/index.js",
                "node_modules/a/index.js",
            ]
        );
    }

    #[tokio::test]
    async fn test_arch_and_platform_written_to_npmrc() {
        let dir = tempdir().unwrap();
        let (package_json, lock) = project(dir.path(), "yarn.lock");
        let runner = FakeRunner::new(0, npm_layout);

        let options = InstallOptions::new(package_json, lock, vec!["jest".to_string()])
            .with_arch(Some("arm64".to_string()))
            .with_platform(Some("linux".to_string()));
        let installed = install_packages(&options, &runner).await.unwrap();

        assert_eq!(
            stdfs::read_to_string(installed.path().join(".npmrc")).unwrap(),
            "arch=arm64\nplatform=linux\n"
        );
        assert_eq!(
            runner.calls()[0].0,
            InstallCommand::for_manager(PackageManager::Yarn)
        );
    }

    #[tokio::test]
    async fn test_scratch_dir_removed_on_drop() {
        let dir = tempdir().unwrap();
        let (package_json, lock) = project(dir.path(), "package-lock.json");
        let runner = FakeRunner::new(0, npm_layout);

        let options = InstallOptions::new(package_json, lock, vec!["left-pad".to_string()]);
        let installed = install_packages(&options, &runner).await.unwrap();
        let path = installed.path().to_path_buf();
        assert!(path.exists());
        drop(installed);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_system_runner_spawn_failure() {
        let dir = tempdir().unwrap();
        let command = InstallCommand {
            program: "nodezip-no-such-package-manager".to_string(),
            args: vec![],
        };
        assert!(SystemRunner.run(&command, dir.path()).await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_runner_reports_exit_code() {
        let dir = tempdir().unwrap();
        let command = InstallCommand {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "exit 3".to_string()],
        };
        assert_eq!(SystemRunner.run(&command, dir.path()).await.unwrap(), 3);
    }
}
