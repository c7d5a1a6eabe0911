//! `scp` invocations between local paths and machines.

use super::{DEFAULT_SSH_PORT, SshCommand, SshTarget, expand_tilde};

const SCP_BIN: &str = "scp";

const SCP_OPTIONS: [&str; 4] = [
    "IdentitiesOnly=yes",
    "StrictHostKeyChecking=no",
    "UserKnownHostsFile=/dev/null",
    "LogLevel=quiet",
];

/// One side of a copy.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ScpEndpoint {
    /// A path on this machine.
    Local(String),
    /// A path on a host reached through `target`.
    Remote {
        /// Connection details of the host.
        target: SshTarget,
        /// Path on the host.
        path: String,
    },
}

impl ScpEndpoint {
    const fn target(&self) -> Option<&SshTarget> {
        match self {
            Self::Local(_) => None,
            Self::Remote { target, .. } => Some(target),
        }
    }

    fn location(&self) -> String {
        match self {
            Self::Local(path) => path.clone(),
            Self::Remote { target, path } if target.host.contains(':') => {
                format!("{}@[{}]:{path}", target.user, target.host)
            }
            Self::Remote { target, path } => format!("{}@{}:{path}", target.user, target.host),
        }
    }
}

/// Builds the `scp` invocation copying `source` to `destination`.
///
/// Copies between two hosts are relayed through this machine (`-3`), so
/// both identities are offered. `scp` takes a single port, so the first
/// non-default port among the remote sides wins.
#[must_use]
pub fn scp_command(source: &ScpEndpoint, destination: &ScpEndpoint, recursive: bool) -> SshCommand {
    let mut args = Vec::with_capacity(SCP_OPTIONS.len() * 2 + 10);
    for option in SCP_OPTIONS {
        args.push(String::from("-o"));
        args.push(option.to_owned());
    }
    args.push(String::from("-3"));
    if recursive {
        args.push(String::from("-r"));
    }

    let targets: Vec<&SshTarget> = [source, destination]
        .into_iter()
        .filter_map(ScpEndpoint::target)
        .collect();
    if let Some(port) = targets
        .iter()
        .map(|target| target.port)
        .find(|port| *port != DEFAULT_SSH_PORT)
    {
        args.push(String::from("-P"));
        args.push(port.to_string());
    }
    for identity in targets
        .iter()
        .filter_map(|target| target.identity_file.as_deref())
        .filter(|path| !path.is_empty())
    {
        args.push(String::from("-i"));
        args.push(expand_tilde(identity));
    }

    args.push(source.location());
    args.push(destination.location());
    SshCommand {
        program: SCP_BIN.to_owned(),
        args,
    }
}
