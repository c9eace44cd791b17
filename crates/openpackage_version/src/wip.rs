use semver::{BuildMetadata, Prerelease, Version};
use sha2::{Digest, Sha256};

const BASE62_ALPHABET: &[u8; 62] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const TAG_BYTES: usize = 4;

/// A short, deterministic base62 tag derived from a workspace's absolute path.
/// Two calls with the same path always produce the same tag; different paths
/// produce different tags with overwhelming probability.
pub fn workspace_tag(workspace_path: &str) -> String {
    let digest = Sha256::digest(workspace_path.as_bytes());
    base62_encode(&digest[..TAG_BYTES])
}

fn base62_encode(bytes: &[u8]) -> String {
    // Treat the bytes as a big-endian unsigned integer and repeatedly divide
    // by 62, the same technique `git2`/`blake3`-style short-hash tags use.
    let mut value: u64 = 0;
    for &b in bytes {
        value = (value << 8) | u64::from(b);
    }
    if value == 0 {
        return BASE62_ALPHABET[0].to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        let digit = (value % 62) as usize;
        out.push(BASE62_ALPHABET[digit]);
        value /= 62;
    }
    out.reverse();
    String::from_utf8(out).expect("base62 alphabet is ASCII")
}

/// Encodes `counter` as a base62 string (no leading zero padding beyond `"0"` itself).
pub fn base62_counter(counter: u64) -> String {
    if counter == 0 {
        return "0".to_string();
    }
    let mut value = counter;
    let mut out = Vec::new();
    while value > 0 {
        let digit = (value % 62) as usize;
        out.push(BASE62_ALPHABET[digit]);
        value /= 62;
    }
    out.reverse();
    String::from_utf8(out).expect("base62 alphabet is ASCII")
}

/// Generates `<base>-<workspaceTag>.<counter>`, the WIP version form described
/// in the data model. `base` should already be the version the WIP stream is
/// developing towards (e.g. the result of [`crate::patch`] applied to the
/// last stable version); the caller is responsible for tracking `counter`
/// monotonically per workspace across a save cycle.
pub fn generate_wip(base: &Version, workspace_path: &str, counter: u64) -> Version {
    let tag = workspace_tag(workspace_path);
    let pre = format!("{tag}.{}", base62_counter(counter));
    Version {
        major: base.major,
        minor: base.minor,
        patch: base.patch,
        pre: Prerelease::new(&pre).expect("tag.counter is a valid prerelease identifier"),
        build: BuildMetadata::EMPTY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_tag_is_deterministic() {
        let a = workspace_tag("/home/alice/project");
        let b = workspace_tag("/home/alice/project");
        assert_eq!(a, b);
    }

    #[test]
    fn different_paths_produce_different_tags() {
        assert_ne!(
            workspace_tag("/home/alice/project"),
            workspace_tag("/home/bob/project")
        );
    }

    #[test]
    fn counter_increments_are_reflected_in_the_prerelease() {
        let base = Version::new(1, 1, 0);
        let first = generate_wip(&base, "/ws", 0);
        let second = generate_wip(&base, "/ws", 1);
        assert_ne!(first.pre, second.pre);
        assert_eq!(first.major, 1);
        assert_eq!(first.minor, 1);
        assert_eq!(first.patch, 0);
    }

    /// The reset-on-base-change behaviour is exercised at the save-engine
    /// layer; here we only verify the raw generation is a pure function of
    /// its inputs.
    #[test]
    fn generation_is_pure() {
        let base = Version::new(1, 1, 0);
        let a = generate_wip(&base, "/ws", 3);
        let b = generate_wip(&base, "/ws", 3);
        assert_eq!(a, b);
    }
}
