//! Newtypes for Scaleway API values to avoid stringly-typed code.

use std::ops::Deref;

macro_rules! newtype {
    ($name:ident) => {
        #[derive(Clone, Debug, Eq, PartialEq)]
        pub(crate) struct $name(String);

        impl $name {
            pub(crate) const fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &Self::Target {
                self.as_str()
            }
        }
    };
}

newtype!(ServerId);
newtype!(ServerStatus);
newtype!(Action);

/// Point-in-time view of a server as reported by the API.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct ServerSnapshot {
    pub(crate) id: ServerId,
    pub(crate) status: ServerStatus,
    pub(crate) allowed_actions: Vec<Action>,
    pub(crate) public_ip: Option<String>,
}

impl ServerSnapshot {
    pub(crate) fn from_instance(server: scaleway_rs::ScalewayInstance) -> Self {
        Self {
            id: server.id.into(),
            status: server.state.into(),
            allowed_actions: server
                .allowed_actions
                .into_iter()
                .map(Action::from)
                .collect(),
            public_ip: server.public_ip.map(|ip| ip.address),
        }
    }

    pub(crate) fn allows(&self, action: &str) -> bool {
        self.allowed_actions
            .iter()
            .any(|allowed| allowed.as_str() == action)
    }
}
