//! Fixture builders shared by `openpackage_core` and `openpackage_cli` tests:
//! fake canonical packages, scratch workspaces/registries, and in-memory
//! `RegistryTransport`/`CredentialStore` doubles so the resolver and
//! pull/push protocol can be exercised without real network or keychain I/O.

mod fixtures;
mod fakes;

pub use fixtures::{fake_manifest, fake_package, temp_registry, temp_workspace};
pub use fakes::{FakeCredentialStore, FakeTransport};
