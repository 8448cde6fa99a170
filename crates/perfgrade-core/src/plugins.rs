//! Command plugins declared in YAML or JSON manifests.
//!
//! ```yaml
//! name: notify
//! hooks:
//!   after_scenario: ["./notify.sh"]
//!   after_run: "echo done"
//! ```
//!
//! Each command runs through the platform shell with the hook event as JSON
//! on stdin and the manifest's directory as working directory. A command that
//! outlives `timeout_secs` (default 60) is killed and fails the hook.

use anyhow::Context;
use indexmap::IndexMap;
use serde::Deserialize;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use wait_timeout::ChildExt;

use crate::errors::{BenchError, Result};
use crate::hooks::{HookEvent, HookName, HookRegistry, Plugin};

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum CommandList {
    One(String),
    Many(Vec<String>),
}

impl CommandList {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(c) => vec![c],
            Self::Many(c) => c,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawManifest {
    name: Option<String>,
    #[serde(default)]
    timeout_secs: Option<u64>,
    #[serde(default)]
    hooks: IndexMap<String, CommandList>,
}

pub const DEFAULT_HOOK_TIMEOUT: Duration = Duration::from_secs(60);

/// A plugin whose hook handlers are shell commands.
#[derive(Debug, Clone)]
pub struct CommandPlugin {
    name: String,
    dir: PathBuf,
    timeout: Duration,
    commands: IndexMap<HookName, Vec<String>>,
}

impl CommandPlugin {
    /// Parse a manifest body. `path` is used for the default name and working directory.
    pub fn from_manifest(path: &Path, raw: &str) -> Result<Self> {
        let load_err = |message: String| BenchError::PluginLoad {
            path: path.to_path_buf(),
            message,
        };

        let is_json = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        let manifest: RawManifest = if is_json {
            serde_json::from_str(raw).map_err(|e| load_err(format!("invalid JSON: {e}")))?
        } else {
            serde_yaml::from_str(raw).map_err(|e| load_err(format!("invalid YAML: {e}")))?
        };

        let mut commands: IndexMap<HookName, Vec<String>> = IndexMap::new();
        for (hook, list) in manifest.hooks {
            let name = HookName::parse(&hook)
                .ok_or_else(|| load_err(format!("unknown hook '{hook}'")))?;
            let list = list.into_vec();
            if list.is_empty() || list.iter().any(|c| c.trim().is_empty()) {
                return Err(load_err(format!("empty command for hook '{hook}'")));
            }
            commands.entry(name).or_default().extend(list);
        }
        if commands.is_empty() {
            return Err(load_err("manifest declares no hooks".into()));
        }
        let timeout = match manifest.timeout_secs {
            Some(0) => return Err(load_err("timeout_secs must be at least 1".into())),
            Some(secs) => Duration::from_secs(secs),
            None => DEFAULT_HOOK_TIMEOUT,
        };

        let name = manifest
            .name
            .filter(|n| !n.trim().is_empty())
            .or_else(|| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "plugin".to_string());
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            name,
            dir,
            timeout,
            commands,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| BenchError::PluginLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_manifest(path, &raw)
    }

    pub fn commands(&self, hook: HookName) -> &[String] {
        self.commands.get(&hook).map(Vec::as_slice).unwrap_or(&[])
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn run_command(command: &str, dir: &Path, input: Arc<Vec<u8>>, timeout: Duration) -> anyhow::Result<()> {
    let (shell, flag) = if cfg!(target_os = "windows") {
        ("cmd", "/C")
    } else {
        ("sh", "-c")
    };
    let mut child = Command::new(shell)
        .arg(flag)
        .arg(command)
        .current_dir(dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to spawn '{command}'"))?;

    // stdin is fed while stdout and stderr drain.
    let writer = child.stdin.take().map(|mut stdin| {
        thread::spawn(move || match stdin.write_all(&input) {
            Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => Err(e),
            _ => Ok(()),
        })
    });
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = match child
        .wait_timeout(timeout)
        .with_context(|| format!("waiting for '{command}'"))?
    {
        Some(status) => status,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            anyhow::bail!("'{command}' timed out after {}s", timeout.as_secs());
        }
    };

    let stdout = stdout.join().unwrap_or_default();
    let stderr = stderr.join().unwrap_or_default();
    if let Some(writer) = writer {
        match writer.join() {
            Ok(Err(e)) => return Err(e).with_context(|| format!("writing event to '{command}'")),
            Ok(Ok(())) => {}
            Err(_) => anyhow::bail!("stdin writer for '{command}' panicked"),
        }
    }

    let stdout = String::from_utf8_lossy(&stdout);
    if !stdout.trim().is_empty() {
        tracing::debug!(command, bytes = stdout.len(), "hook command output");
    }
    if !status.success() {
        let stderr = String::from_utf8_lossy(&stderr);
        anyhow::bail!(
            "'{command}' exited with {status}{}",
            if stderr.trim().is_empty() {
                String::new()
            } else {
                format!(": {}", stderr.trim())
            }
        );
    }
    Ok(())
}

impl Plugin for CommandPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn hooks(&self) -> Vec<HookName> {
        self.commands.keys().copied().collect()
    }

    fn on_event(&self, event: &HookEvent<'_>) -> anyhow::Result<()> {
        let input = Arc::new(serde_json::to_vec(event)?);
        for command in self.commands(event.name()) {
            run_command(command, &self.dir, Arc::clone(&input), self.timeout)
                .with_context(|| format!("plugin '{}'", self.name))?;
        }
        Ok(())
    }
}

/// Load each manifest and register it. Failures are logged and skipped.
///
/// Returns the names of the plugins that were registered.
pub fn load_plugins<P: AsRef<Path>>(registry: &mut HookRegistry, paths: &[P]) -> Vec<String> {
    let mut loaded = Vec::new();
    for path in paths {
        let path = path.as_ref();
        match CommandPlugin::load(path) {
            Ok(plugin) => {
                tracing::info!(plugin = %plugin.name, path = %path.display(), "loaded plugin");
                loaded.push(plugin.name.clone());
                registry.register_plugin(Arc::new(plugin));
            }
            Err(e) => tracing::warn!("{e}; skipping"),
        }
    }
    loaded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Scenario;

    #[test]
    fn parses_yaml_manifest_with_aliases() {
        let raw = "name: notify\nhooks:\n  onScenarioCompleted: [\"echo a\", \"echo b\"]\n  after_run: \"echo done\"\n";
        let p = CommandPlugin::from_manifest(Path::new("plugins/notify.yaml"), raw).unwrap();
        assert_eq!(p.name(), "notify");
        assert_eq!(p.hooks(), vec![HookName::AfterScenario, HookName::AfterRun]);
        assert_eq!(p.commands(HookName::AfterScenario).len(), 2);
        assert_eq!(p.dir, PathBuf::from("plugins"));
    }

    #[test]
    fn json_manifest_defaults_name_to_stem() {
        let raw = r#"{"hooks": {"before_run": "true"}}"#;
        let p = CommandPlugin::from_manifest(Path::new("audit.json"), raw).unwrap();
        assert_eq!(p.name(), "audit");
        assert_eq!(p.dir, PathBuf::from("."));
        assert_eq!(p.timeout, DEFAULT_HOOK_TIMEOUT);
    }

    #[test]
    fn zero_timeout_is_load_error() {
        let raw = "timeout_secs: 0\nhooks:\n  after_run: \"true\"\n";
        assert!(CommandPlugin::from_manifest(Path::new("slow.yaml"), raw).is_err());
    }

    #[test]
    fn unknown_hook_is_load_error() {
        let raw = "hooks:\n  on_teardown: \"echo x\"\n";
        let err = CommandPlugin::from_manifest(Path::new("bad.yaml"), raw).unwrap_err();
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("on_teardown"));
    }

    #[test]
    fn empty_command_is_load_error() {
        let raw = "hooks:\n  after_run: []\n";
        assert!(CommandPlugin::from_manifest(Path::new("bad.yaml"), raw).is_err());
    }

    #[test]
    fn missing_manifest_is_skipped() {
        let mut reg = HookRegistry::new();
        let loaded = load_plugins(&mut reg, &["does/not/exist.yaml"]);
        assert!(loaded.is_empty());
        assert!(reg.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn command_receives_event_on_stdin() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("capture.yaml");
        std::fs::write(
            &manifest,
            "hooks:\n  before_scenario: \"cat > event.json\"\n",
        )
        .unwrap();

        let mut reg = HookRegistry::new();
        assert_eq!(load_plugins(&mut reg, &[&manifest]), vec!["capture"]);

        let s = Scenario {
            method: "GET".into(),
            path: "/pets".into(),
            url: "http://h/pets".into(),
            headers: None,
            body: None,
            operation_id: None,
        };
        reg.fire(&HookEvent::BeforeScenario { scenario: &s }).unwrap();

        let written = std::fs::read_to_string(dir.path().join("event.json")).unwrap();
        let v: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(v["event"], "before_scenario");
        assert_eq!(v["scenario"]["url"], "http://h/pets");
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_fatal_hook_error() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("fail.yaml");
        std::fs::write(&manifest, "hooks:\n  before_run: \"exit 3\"\n").unwrap();

        let mut reg = HookRegistry::new();
        load_plugins(&mut reg, &[&manifest]);
        let err = reg.fire(&HookEvent::BeforeRun { scenarios: &[] }).unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, BenchError::Hook { hook: "before_run", .. }));
    }

    #[cfg(unix)]
    #[test]
    fn echoing_command_handles_events_larger_than_a_pipe() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("echo.yaml");
        std::fs::write(&manifest, "timeout_secs: 20\nhooks:\n  before_run: \"cat\"\n").unwrap();

        let mut reg = HookRegistry::new();
        load_plugins(&mut reg, &[&manifest]);
        let scenarios: Vec<Scenario> = (0..3000)
            .map(|i| Scenario {
                method: "GET".into(),
                path: format!("/resources/{i}/items/{{id}}"),
                url: format!("http://localhost:8080/resources/{i}/items/1"),
                headers: None,
                body: Some(format!("{{\"padding\":\"{}\"}}", "x".repeat(64))),
                operation_id: Some(format!("listItems{i}")),
            })
            .collect();
        reg.fire(&HookEvent::BeforeRun { scenarios: &scenarios }).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn command_past_its_timeout_is_killed() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("slow.yaml");
        std::fs::write(&manifest, "timeout_secs: 1\nhooks:\n  after_run: \"exec sleep 30\"\n").unwrap();

        let mut reg = HookRegistry::new();
        load_plugins(&mut reg, &[&manifest]);
        let started = std::time::Instant::now();
        let endpoints = crate::model::Endpoints::new();
        let err = reg
            .fire(&HookEvent::AfterRun {
                scenarios: &[],
                endpoints: &endpoints,
            })
            .unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(15));
        assert!(err.to_string().contains("timed out"), "{err}");
    }
}
