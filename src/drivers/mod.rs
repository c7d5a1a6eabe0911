//! Drivers compiled into this crate, one per plugin binary.
//!
//! A stored host names its driver in `DriverName`; the CLI launches the
//! matching plugin, which decodes the opaque `Driver` JSON into its own type
//! through [`crate::driver::Driver::set_config_raw`].

pub mod generic;
pub mod none;
pub mod scaleway;
