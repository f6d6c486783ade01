#![allow(dead_code)]

//! A fake host for workflow tests.
//!
//! [`FakeRunner`] answers package-manager and init-system queries from an
//! in-memory state and reproduces the filesystem side effects of the archive
//! tools (`dpkg-deb`, `apt-get download`, `ar`, `tar`, `dpkg -i`) under the
//! test root.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use mesos_install_core::config::{Node, Settings};
use mesos_install_core::context::ProvisionContext;
use mesos_install_core::host::download::write_atomic;
use mesos_install_core::host::{CommandOutput, CommandRunner, CommandSpec, Downloader};
use mesos_install_core::types::{InitVariant, PlatformFamily};
use tempfile::TempDir;
use url::Url;

pub const UPSTREAM_CONTROL: &str = "\
Package: mesos
Version: 1.4.1-2.0.6
Architecture: amd64
Depends: java8-runtime-headless | java7-runtime-headless, libcurl3, libevent-dev, \
         libsvn1, libsasl2-modules
Description: Cluster resource manager with efficient resource isolation
";

pub const YUM_LISTING: &str = "\
Available Packages
mesos.x86_64                      1.4.0-2.0.1                      mesosphere
mesos.x86_64                      1.4.1-2.0.1                      mesosphere
mesos.x86_64                      1.4.10-2.0.3                     mesosphere
";

pub const LIBCURL_PAYLOAD: &str = "ELF libcurl.so.4.5.0";

#[derive(Debug, Default)]
struct HostState {
    root: PathBuf,
    installed: BTreeSet<String>,
    running: BTreeSet<String>,
    enabled: BTreeSet<String>,
    failing: BTreeSet<String>,
    repacked_control: Option<String>,
}

/// Records every command and simulates its effect on the test root.
#[derive(Debug, Clone, Default)]
pub struct FakeRunner {
    calls: Rc<RefCell<Vec<CommandSpec>>>,
    state: Rc<RefCell<HostState>>,
}

impl FakeRunner {
    pub fn new(root: &Path) -> Self {
        let runner = Self::default();
        runner.state.borrow_mut().root = root.to_path_buf();
        runner
    }

    pub fn install(&self, package: &str) {
        self.state.borrow_mut().installed.insert(package.to_string());
    }

    pub fn is_installed(&self, package: &str) -> bool {
        self.state.borrow().installed.contains(package)
    }

    /// Mark a service as running and enabled, as a package postinst would.
    pub fn start_service(&self, service: &str) {
        let mut state = self.state.borrow_mut();
        state.running.insert(service.to_string());
        state.enabled.insert(service.to_string());
    }

    pub fn is_running(&self, service: &str) -> bool {
        self.state.borrow().running.contains(service)
    }

    pub fn is_enabled(&self, service: &str) -> bool {
        self.state.borrow().enabled.contains(service)
    }

    /// Make every invocation of `program` exit non-zero.
    pub fn fail(&self, program: &str) {
        self.state.borrow_mut().failing.insert(program.to_string());
    }

    /// Control file contents at the time the package was repacked.
    pub fn repacked_control(&self) -> Option<String> {
        self.state.borrow().repacked_control.clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls.borrow().iter().map(ToString::to_string).collect()
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.borrow().clone()
    }

    /// Number of recorded commands starting with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.commands()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }

    fn simulate(&self, spec: &CommandSpec) -> anyhow::Result<CommandOutput> {
        let args: Vec<&str> = spec.args.iter().map(String::as_str).collect();
        let cwd = spec.cwd.clone().unwrap_or_default();
        let mut state = self.state.borrow_mut();

        let output = match (spec.program.as_str(), args.as_slice()) {
            ("dpkg-query", [.., package]) | ("rpm", ["-q", package]) => {
                if state.installed.contains(*package) {
                    CommandOutput::success().with_stdout("install ok installed")
                } else {
                    CommandOutput::failure(1)
                }
            }
            ("apt-get", ["install", "-y", "-q", package]) | ("yum", ["install", "-y", package]) => {
                state.installed.insert(package.to_string());
                CommandOutput::success()
            }
            ("apt-get", ["download", ..]) => {
                std::fs::write(cwd.join("libcurl3_7.58.0-2ubuntu2_amd64.deb"), "!<arch>\n")?;
                CommandOutput::success()
            }
            ("yum", [.., "list", _]) => CommandOutput::success().with_stdout(YUM_LISTING),
            ("dpkg-deb", ["-R", _, scratch]) => {
                let debian = Path::new(scratch).join("DEBIAN");
                std::fs::create_dir_all(&debian)?;
                std::fs::write(debian.join("control"), UPSTREAM_CONTROL)?;
                CommandOutput::success()
            }
            ("dpkg-deb", ["-b", scratch, out]) => {
                let control = Path::new(scratch).join("DEBIAN").join("control");
                state.repacked_control = Some(std::fs::read_to_string(control)?);
                std::fs::write(out, "!<arch>\nrepacked\n")?;
                CommandOutput::success()
            }
            ("dpkg", ["-i", _]) => {
                let binary = state.root.join("usr/sbin/mesos-master");
                std::fs::create_dir_all(binary.parent().unwrap_or(&state.root))?;
                std::fs::write(binary, "ELF mesos-master")?;
                state.installed.insert("mesos".to_string());
                CommandOutput::success()
            }
            ("chown", _) => CommandOutput::success(),
            ("ar", ["x", _, member]) => {
                std::fs::write(cwd.join(member), "xz")?;
                CommandOutput::success()
            }
            ("tar", ["xf", _]) => {
                let lib_dir = cwd.join("usr/lib/x86_64-linux-gnu");
                std::fs::create_dir_all(&lib_dir)?;
                std::fs::write(lib_dir.join("libcurl.so.4.5.0"), LIBCURL_PAYLOAD)?;
                #[cfg(unix)]
                std::os::unix::fs::symlink("libcurl.so.4.5.0", lib_dir.join("libcurl.so.4"))?;
                #[cfg(not(unix))]
                std::fs::write(lib_dir.join("libcurl.so.4"), LIBCURL_PAYLOAD)?;
                CommandOutput::success()
            }
            ("/bin/systemctl", ["--system", "daemon-reload"]) => CommandOutput::success(),
            ("systemctl", ["is-active", "--quiet", service]) => {
                exit_for(state.running.contains(*service))
            }
            ("systemctl", ["is-enabled", "--quiet", service]) => {
                exit_for(state.enabled.contains(*service))
            }
            ("systemctl", ["stop", service]) | ("stop", [service]) => {
                state.running.remove(*service);
                CommandOutput::success()
            }
            ("systemctl", ["disable", service]) => {
                state.enabled.remove(*service);
                CommandOutput::success()
            }
            ("status", [service]) => {
                let status = if state.running.contains(*service) {
                    "start/running, process 4242"
                } else {
                    "stop/waiting"
                };
                CommandOutput::success().with_stdout(format!("{} {}\n", service, status))
            }
            ("update-rc.d", [service, "disable"]) => {
                for level in 2..=5 {
                    let dir = state.root.join(format!("etc/rc{}.d", level));
                    let start = dir.join(format!("S20{}", service));
                    if start.exists() {
                        std::fs::rename(&start, dir.join(format!("K01{}", service)))?;
                    }
                }
                state.enabled.remove(*service);
                CommandOutput::success()
            }
            (program, [verb]) if program.contains("/etc/init.d/") => {
                let service = Path::new(program)
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                match *verb {
                    "status" => exit_for(state.running.contains(&service)),
                    "stop" => {
                        state.running.remove(&service);
                        CommandOutput::success()
                    }
                    _ => CommandOutput::failure(2),
                }
            }
            _ => CommandOutput {
                code: Some(127),
                stdout: String::new(),
                stderr: format!("{}: command not found", spec.program),
            },
        };
        Ok(output)
    }
}

fn exit_for(condition: bool) -> CommandOutput {
    if condition {
        CommandOutput::success()
    } else {
        CommandOutput::failure(3)
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, spec: &CommandSpec) -> anyhow::Result<CommandOutput> {
        self.calls.borrow_mut().push(spec.clone());
        if self.state.borrow().failing.contains(&spec.program) {
            return Ok(CommandOutput {
                code: Some(1),
                stdout: String::new(),
                stderr: "simulated failure".to_string(),
            });
        }
        self.simulate(spec)
    }
}

/// Serves a small placeholder archive for every URL.
#[derive(Debug, Clone, Default)]
pub struct FakeDownloader {
    urls: Rc<RefCell<Vec<Url>>>,
}

impl FakeDownloader {
    pub fn urls(&self) -> Vec<String> {
        self.urls.borrow().iter().map(ToString::to_string).collect()
    }
}

impl Downloader for FakeDownloader {
    fn download(&self, url: &Url, dest: &Path) -> anyhow::Result<u64> {
        self.urls.borrow_mut().push(url.clone());
        let bytes = b"!<arch>\nupstream\n";
        write_atomic(dest, bytes)?;
        Ok(bytes.len() as u64)
    }
}

/// A test root with fake host backends.
pub struct FakeHost {
    pub temp: TempDir,
    pub runner: FakeRunner,
    pub downloader: FakeDownloader,
}

impl FakeHost {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let runner = FakeRunner::new(temp.path());
        Self {
            temp,
            runner,
            downloader: FakeDownloader::default(),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    /// Absolute host path resolved under the test root.
    pub fn path(&self, host_path: &str) -> PathBuf {
        self.temp.path().join(host_path.trim_start_matches('/'))
    }

    pub fn write(&self, host_path: &str, content: &str) {
        let path = self.path(host_path);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    pub fn context(&self) -> ProvisionContext {
        let settings = Settings {
            root: self.temp.path().to_path_buf(),
            ..Settings::default()
        };
        ProvisionContext::with_backends(
            settings,
            Box::new(self.runner.clone()),
            Box::new(self.downloader.clone()),
        )
    }
}

pub fn node(platform_family: PlatformFamily, init: InitVariant, recipes: &[&str]) -> Node {
    Node {
        platform_family,
        version: "1.4.1".to_string(),
        init,
        repo: true,
        recipes: recipes.iter().map(|r| r.to_string()).collect(),
    }
}
