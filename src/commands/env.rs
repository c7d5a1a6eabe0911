//! `env` output for the supported shells.

use std::fmt;
use std::str::FromStr;

use camino::Utf8PathBuf;
use thiserror::Error;

use super::Connection;

const PROGRAM: &str = "docker-machine";
const VARIABLES: [&str; 4] = [
    "DOCKER_TLS_VERIFY",
    "DOCKER_HOST",
    "DOCKER_CERT_PATH",
    "DOCKER_MACHINE_NAME",
];

/// Shell syntax used by `env`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Shell {
    /// `export NAME="value"`.
    #[default]
    Posix,
    /// `set -x NAME "value";`.
    Fish,
    /// `$Env:NAME = "value"`.
    Powershell,
    /// `set NAME=value`.
    Cmd,
}

/// Raised for a `--shell` value no syntax exists for.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown shell '{0}': expected bash, sh, zsh, fish, powershell or cmd")]
pub struct UnknownShellError(pub String);

impl FromStr for Shell {
    type Err = UnknownShellError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "bash" | "sh" | "zsh" | "posix" => Ok(Self::Posix),
            "fish" => Ok(Self::Fish),
            "powershell" => Ok(Self::Powershell),
            "cmd" => Ok(Self::Cmd),
            other => Err(UnknownShellError(other.to_owned())),
        }
    }
}

impl fmt::Display for Shell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Posix => "bash",
            Self::Fish => "fish",
            Self::Powershell => "powershell",
            Self::Cmd => "cmd",
        })
    }
}

impl Shell {
    /// Picks the syntax from the login shell path in `$SHELL`; anything
    /// unrecognised is treated as POSIX.
    #[must_use]
    pub fn detect(login_shell: Option<&str>) -> Self {
        login_shell
            .and_then(|path| path.rsplit('/').next())
            .and_then(|name| name.parse().ok())
            .unwrap_or_default()
    }

    const fn set_syntax(self) -> (&'static str, &'static str, &'static str) {
        match self {
            Self::Posix => ("export ", "=\"", "\"\n"),
            Self::Fish => ("set -x ", " \"", "\";\n"),
            Self::Powershell => ("$Env:", " = \"", "\"\n"),
            Self::Cmd => ("set ", "=", "\n"),
        }
    }

    const fn unset_syntax(self) -> (&'static str, &'static str, &'static str) {
        match self {
            Self::Posix => ("unset ", "", "\n"),
            Self::Fish => ("set -e ", "", ";\n"),
            Self::Powershell => ("Remove-Item Env:\\\\", "", "\n"),
            Self::Cmd => ("set ", "=", "\n"),
        }
    }

    fn usage_hint(self, machine: &str) -> String {
        let command = match self {
            Self::Posix => format!("eval \"$({PROGRAM} env {machine})\""),
            Self::Fish => format!("eval ({PROGRAM} env {machine})"),
            Self::Powershell => {
                format!("{PROGRAM} env --shell=powershell {machine} | Invoke-Expression")
            }
            Self::Cmd => String::from("copy and paste the above values into your command prompt"),
        };
        format!("# Run this command to configure your shell: \n# {command}\n")
    }
}

/// Variables exported by `env` for one host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnvSettings {
    /// Host name.
    pub machine_name: String,
    /// Docker daemon URL.
    pub docker_host: String,
    /// Directory holding the host's certificates.
    pub cert_path: Utf8PathBuf,
    /// Whether the client should verify TLS.
    pub tls_verify: bool,
}

impl EnvSettings {
    /// Settings for `connection`, with certificates read from `cert_path`.
    /// Unix socket URLs carry no TLS settings.
    #[must_use]
    pub fn new(connection: Connection, cert_path: Utf8PathBuf) -> Self {
        let tls_verify = !connection.url.starts_with("unix://");
        Self {
            machine_name: connection.name,
            docker_host: connection.url,
            cert_path: if tls_verify { cert_path } else { Utf8PathBuf::new() },
            tls_verify,
        }
    }

    /// Renders the assignments followed by a usage hint.
    #[must_use]
    pub fn render(&self, shell: Shell) -> String {
        let (prefix, delimiter, suffix) = shell.set_syntax();
        let values = [
            if self.tls_verify { "1" } else { "" },
            self.docker_host.as_str(),
            self.cert_path.as_str(),
            self.machine_name.as_str(),
        ];
        let mut out: String = VARIABLES
            .iter()
            .zip(values)
            .map(|(name, value)| format!("{prefix}{name}{delimiter}{value}{suffix}"))
            .collect();
        out.push_str(&shell.usage_hint(&self.machine_name));
        out
    }
}

/// Renders the commands clearing every variable `env` sets.
#[must_use]
pub fn render_unset(shell: Shell) -> String {
    let (prefix, delimiter, suffix) = shell.unset_syntax();
    VARIABLES
        .iter()
        .map(|name| format!("{prefix}{name}{delimiter}{suffix}"))
        .collect()
}
