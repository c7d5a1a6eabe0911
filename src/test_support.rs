//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::env;
use std::ffi::OsString;
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{Mutex, MutexGuard};

use crate::driver::{
    Driver, DriverError, DriverFuture, DriverOptions, FlagSpec, decode_config, encode_config,
    ready,
};
use crate::machine::{DriverLoader, LoadError, LoadFuture};
use crate::plugin::PluginError;
use crate::ssh::{CommandOutput, CommandRunner, SpawnError, SshCommand, SshTarget};
use crate::state::State;

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Used to drive deterministic command outcomes without spawning processes.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Arc<std::sync::Mutex<VecDeque<CommandOutput>>>,
    invocations: Arc<std::sync::Mutex<Vec<CommandInvocation>>>,
}

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        std::iter::once(self.program.clone())
            .chain(
                self.args
                    .iter()
                    .map(|arg| arg.to_string_lossy().into_owned()),
            )
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        self.invocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Pushes a successful exit status.
    pub fn push_success(&self) {
        self.push_output(Some(0), "", "");
    }

    /// Pushes a failing exit code with stderr text.
    pub fn push_failure(&self, code: i32) {
        self.push_output(Some(code), "", "simulated failure");
    }

    /// Pushes an explicit command output response.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(CommandOutput {
                code,
                stdout: stdout.into(),
                stderr: stderr.into(),
            });
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, SpawnError> {
        self.invocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(CommandInvocation {
                program: program.to_owned(),
                args: args.to_vec(),
            });
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .ok_or_else(|| SpawnError {
                program: program.to_owned(),
                message: String::from("no scripted response available"),
            })
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: Mutex<()> = Mutex::const_new(());

/// Guard that holds the env mutex and cleans up variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }

    /// Unsets environment variables while holding the global mutex.
    pub async fn remove_vars(keys: &[&str]) -> Self {
        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(keys.len());
        for key in keys {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::remove_var(key) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}

/// Driver name reported by [`ScriptedDriver`].
pub const SCRIPTED_DRIVER: &str = "scripted";

/// Driver name for which [`ScriptedLoader`] reports a missing plugin.
pub const MISSING_DRIVER: &str = "missing";

/// How a [`ScriptedDriver`] behaves for one host.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScriptedBehaviour {
    /// State reported by `state`.
    pub state: State,
    /// Delay before `state` answers.
    pub delay: Duration,
    /// Whether lifecycle actions fail.
    pub fail_actions: bool,
    /// Whether `create` fails.
    pub fail_create: bool,
    /// Whether `remove` fails.
    pub fail_remove: bool,
}

impl ScriptedBehaviour {
    /// A host that reports `state` immediately.
    #[must_use]
    pub fn reporting(state: State) -> Self {
        Self {
            state,
            ..Self::default()
        }
    }

    /// Adds a delay before the state is reported.
    #[must_use]
    pub const fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
struct ScriptedConfig {
    #[serde(rename = "MachineName")]
    machine_name: String,
    #[serde(rename = "URL")]
    url: String,
    #[serde(rename = "Actions")]
    actions: Vec<String>,
}

/// In-memory driver recording every call into a shared journal.
#[derive(Debug)]
pub struct ScriptedDriver {
    config: ScriptedConfig,
    behaviour: ScriptedBehaviour,
    journal: Arc<std::sync::Mutex<Vec<String>>>,
}

impl ScriptedDriver {
    fn record(&self, call: &str) {
        self.journal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(format!("{}:{call}", self.config.machine_name));
    }

    fn act(&mut self, action: &str) -> Result<(), DriverError> {
        self.record(action);
        if self.behaviour.fail_actions {
            return Err(DriverError::provider(format!("{action} refused")));
        }
        self.config.actions.push(action.to_owned());
        Ok(())
    }
}

impl Driver for ScriptedDriver {
    fn driver_name(&self) -> &str {
        SCRIPTED_DRIVER
    }

    fn create_flags(&self) -> DriverFuture<'_, Vec<FlagSpec>> {
        ready(Ok(vec![
            FlagSpec::string("scripted-url", "URL reported by the host", "tcp://127.0.0.1:2376")
                .env("SCRIPTED_URL"),
            FlagSpec::int("scripted-size", "Size of the host", 1),
        ]))
    }

    fn config_raw(&self) -> DriverFuture<'_, Value> {
        ready(encode_config(&self.config))
    }

    fn set_config_raw(&mut self, raw: Value) -> DriverFuture<'_, ()> {
        ready(decode_config(raw).map(|decoded| self.config = decoded))
    }

    fn set_config_from_flags<'a>(
        &'a mut self,
        options: &'a DriverOptions,
    ) -> DriverFuture<'a, ()> {
        self.record(&format!("flags size={}", options.int("scripted-size")));
        self.config.url = options.string("scripted-url");
        ready(Ok(()))
    }

    fn machine_name(&self) -> DriverFuture<'_, String> {
        ready(Ok(self.config.machine_name.clone()))
    }

    fn create(&mut self) -> DriverFuture<'_, ()> {
        self.record("create");
        if self.behaviour.fail_create {
            return ready(Err(DriverError::provider("quota exceeded")));
        }
        ready(Ok(()))
    }

    fn remove(&mut self) -> DriverFuture<'_, ()> {
        self.record("remove");
        if self.behaviour.fail_remove {
            return ready(Err(DriverError::provider("resource is locked")));
        }
        ready(Ok(()))
    }

    fn start(&mut self) -> DriverFuture<'_, ()> {
        ready(self.act("start"))
    }

    fn stop(&mut self) -> DriverFuture<'_, ()> {
        ready(self.act("stop"))
    }

    fn restart(&mut self) -> DriverFuture<'_, ()> {
        ready(self.act("restart"))
    }

    fn kill(&mut self) -> DriverFuture<'_, ()> {
        ready(self.act("kill"))
    }

    fn upgrade(&mut self) -> DriverFuture<'_, ()> {
        ready(self.act("upgrade"))
    }

    fn ip(&self) -> DriverFuture<'_, String> {
        ready(Ok(String::from("192.0.2.10")))
    }

    fn url(&self) -> DriverFuture<'_, String> {
        ready(Ok(self.config.url.clone()))
    }

    fn state(&self) -> DriverFuture<'_, State> {
        let ScriptedBehaviour { state, delay, .. } = self.behaviour;
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            Ok(state)
        })
    }

    fn ssh_command<'a>(&'a self, args: &'a [String]) -> DriverFuture<'a, SshCommand> {
        let mut ssh_args = vec![format!("root@{}", self.config.machine_name)];
        ssh_args.extend(args.iter().cloned());
        ready(Ok(SshCommand {
            program: String::from("ssh"),
            args: ssh_args,
        }))
    }

    fn ssh_target(&self) -> DriverFuture<'_, SshTarget> {
        ready(Ok(SshTarget {
            host: String::from("192.0.2.10"),
            port: 22,
            user: String::from("root"),
            identity_file: Some(format!("/keys/{}", self.config.machine_name)),
        }))
    }

    fn close(&mut self) -> DriverFuture<'_, ()> {
        self.record("close");
        ready(Ok(()))
    }
}

/// Loader handing out [`ScriptedDriver`]s, configured per machine name.
#[derive(Clone, Debug, Default)]
pub struct ScriptedLoader {
    behaviours: HashMap<String, ScriptedBehaviour>,
    journal: Arc<std::sync::Mutex<Vec<String>>>,
}

impl ScriptedLoader {
    /// Creates a loader whose hosts all report [`State::None`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the behaviour of `machine`.
    #[must_use]
    pub fn with_host(mut self, machine: &str, behaviour: ScriptedBehaviour) -> Self {
        self.behaviours.insert(machine.to_owned(), behaviour);
        self
    }

    /// Handle on the call journal, usable after the loader is moved.
    #[must_use]
    pub fn journal(&self) -> Journal {
        Journal(Arc::clone(&self.journal))
    }
}

/// Shared record of `machine:call` entries.
#[derive(Clone, Debug)]
pub struct Journal(Arc<std::sync::Mutex<Vec<String>>>);

impl Journal {
    /// Snapshot of every recorded call.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Calls recorded for `machine`, without the machine prefix.
    #[must_use]
    pub fn calls_for(&self, machine: &str) -> Vec<String> {
        let prefix = format!("{machine}:");
        self.entries()
            .into_iter()
            .filter_map(|entry| entry.strip_prefix(&prefix).map(str::to_owned))
            .collect()
    }
}

impl DriverLoader for ScriptedLoader {
    fn load<'a>(
        &'a self,
        driver_name: &'a str,
        machine_name: &'a str,
        raw: Value,
    ) -> LoadFuture<'a> {
        Box::pin(async move {
            if driver_name == MISSING_DRIVER {
                return Err(LoadError::Plugin(PluginError::NotFound {
                    driver: driver_name.to_owned(),
                }));
            }
            let mut driver = ScriptedDriver {
                config: ScriptedConfig::default(),
                behaviour: self
                    .behaviours
                    .get(machine_name)
                    .copied()
                    .unwrap_or_default(),
                journal: Arc::clone(&self.journal),
            };
            driver.set_config_raw(raw).await?;
            driver.config.machine_name = machine_name.to_owned();
            Ok(Box::new(driver) as Box<dyn Driver>)
        })
    }
}
