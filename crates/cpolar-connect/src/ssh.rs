//! SSH key and config reconciliation.
//!
//! Everything needed to make `ssh <alias>` reach a freshly resolved tunnel
//! endpoint: key pair lifecycle ([`keys`]), key-auth probing and public-key
//! provisioning ([`client`]), SSH client config block reconciliation
//! ([`config_file`]), and launching the interactive session ([`connect`]).
//!
//! This module depends on the resolver's output type
//! ([`crate::tunnel::TunnelEndpoint`]) only, never on the resolver itself.

pub mod client;
pub mod config_file;
pub mod connect;
pub mod keys;

pub use client::{KEY_AUTH_TIMEOUT, UPLOAD_TIMEOUT, UploadOutcome, test_key_auth, upload_public_key};
pub use config_file::reconcile_config;
pub use connect::{INTERRUPT_EXIT_CODE, SshTarget, build_ssh_args, connect};
pub use keys::{KeyPairStatus, ensure_key_pair, public_key_path};
