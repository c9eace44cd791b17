//! Exercises the resolver and pull/push protocol against a [`FakeTransport`]
//! test double, rather than mocking every call individually.

use openpackage_core::{
    Credentials, LocalRegistryStore, PackageName, ResolveMode, merge_partial_pull, resolve,
};
use openpackage_test_support::{FakeTransport, fake_package};

#[tokio::test]
async fn remote_primary_resolves_a_version_only_known_to_the_transport() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalRegistryStore::new(dir.path().join("registry"));
    let name = PackageName::parse("tools").unwrap();

    let transport = FakeTransport::new();
    let package = fake_package("tools", "2.0.0", &[("docs/guide.md", "remote body")]);
    transport.register("tools", package, "fake://tools@2.0.0", b"archive-bytes".to_vec());

    let resolution = resolve(&store, Some(&transport), &Credentials::None, &name, "*", ResolveMode::RemotePrimary, false)
        .await
        .unwrap();

    assert_eq!(resolution.version.unwrap().to_string(), "2.0.0");
}

#[tokio::test]
async fn pulling_a_package_and_merging_it_locally_preserves_untouched_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalRegistryStore::new(dir.path().join("registry"));

    let local = fake_package("tools", "1.0.0", &[("docs/keep.md", "keep me"), ("docs/old.md", "stale")]);
    store.save(&local, false).unwrap();

    let transport = FakeTransport::new();
    let remote = fake_package("tools", "1.0.0", &[("docs/old.md", "fresh from remote")]);
    transport.register("tools", remote.clone(), "fake://tools@1.0.0", b"ignored".to_vec());

    let req = openpackage_core::PullRequest { recursive: true, include_manifest: true, paths: Some(vec!["docs/old.md".into()]) };
    let response = transport.pull("tools", "1.0.0", &req, &Credentials::None).await.unwrap();

    let incoming_files = vec![remote.file("docs/old.md").unwrap().clone()];
    let merged = merge_partial_pull(Some(&local), response.package, incoming_files, &["docs/old.md".to_string()], false).unwrap();

    assert_eq!(merged.file("docs/keep.md").unwrap().content, "keep me");
    assert_eq!(merged.file("docs/old.md").unwrap().content, "fresh from remote");
    assert!(merged.metadata.is_partial());
}
