/// Merges one package's section into a shared root file (`AGENTS.md` or a
/// platform's root file).
///
/// Sections are delimited by `<!-- openpackage:<name> start -->` /
/// `<!-- openpackage:<name> end -->`. If a section for `package_name` already
/// exists its body is replaced in place; otherwise a new section is appended,
/// separated from existing content by one blank line. Sections belonging to
/// other packages are preserved verbatim, including their original ordering.
pub fn merge_section(existing: &str, package_name: &str, body: &str) -> String {
    let start_marker = format!("<!-- openpackage:{package_name} start -->");
    let end_marker = format!("<!-- openpackage:{package_name} end -->");

    if let Some(start_idx) = existing.find(&start_marker) {
        if let Some(end_rel) = existing[start_idx..].find(&end_marker) {
            let end_idx = start_idx + end_rel + end_marker.len();
            let mut out = String::new();
            out.push_str(&existing[..start_idx]);
            out.push_str(&start_marker);
            out.push('\n');
            out.push_str(body.trim_end());
            out.push('\n');
            out.push_str(&end_marker);
            out.push_str(&existing[end_idx..]);
            return out;
        }
    }

    let mut out = existing.trim_end().to_string();
    if !out.is_empty() {
        out.push_str("\n\n");
    }
    out.push_str(&start_marker);
    out.push('\n');
    out.push_str(body.trim_end());
    out.push('\n');
    out.push_str(&end_marker);
    out.push('\n');
    out
}

/// Selects which section body to use for a given root file: platform-specific
/// root files prefer a platform-specific body when the payload provides one,
/// `AGENTS.md` always gets the universal body.
pub fn section_body_for<'a>(
    is_universal_root: bool,
    universal_body: &'a str,
    platform_body: Option<&'a str>,
) -> &'a str {
    if is_universal_root {
        universal_body
    } else {
        platform_body.unwrap_or(universal_body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_new_section_to_empty_file() {
        let merged = merge_section("", "pkg-a", "A");
        assert!(merged.contains("<!-- openpackage:pkg-a start -->\nA\n<!-- openpackage:pkg-a end -->"));
    }

    #[test]
    fn two_packages_coexist_and_updates_touch_only_their_own_section() {
        let file = merge_section("", "pkg-a", "A");
        let file = merge_section(&file, "pkg-b", "B");
        assert!(file.contains("pkg-a"));
        assert!(file.contains("pkg-b"));

        let updated = merge_section(&file, "pkg-a", "A2");
        assert!(updated.contains("<!-- openpackage:pkg-a start -->\nA2\n<!-- openpackage:pkg-a end -->"));
        assert!(updated.contains("<!-- openpackage:pkg-b start -->\nB\n<!-- openpackage:pkg-b end -->"));
    }

    #[test]
    fn merge_is_idempotent_for_unchanged_body() {
        let once = merge_section("", "pkg-a", "A");
        let twice = merge_section(&once, "pkg-a", "A");
        assert_eq!(once, twice);
    }

    #[test]
    fn platform_root_falls_back_to_universal_body_when_no_override() {
        assert_eq!(section_body_for(false, "universal", None), "universal");
        assert_eq!(section_body_for(false, "universal", Some("platform")), "platform");
        assert_eq!(section_body_for(true, "universal", Some("platform")), "universal");
    }
}
