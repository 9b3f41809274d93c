use refpack_core::resolver::{pick, visible};
use refpack_core::{ArtifactName, ResolveError, parse_catalog, resolve};

const CATALOG: &str = r#"[
    { "tag_name": "nightly-1050-abc123", "published_at": "2024-01-02T00:00:00Z", "assets": [] },
    { "tag_name": "nightly-1050-def456", "published_at": "2024-01-03T00:00:00Z", "assets": [] },
    { "tag_name": "nightly-1049-xyz000", "published_at": "2024-01-01T00:00:00Z", "assets": [] },
    { "tag_name": "v1.0.0", "published_at": "2024-02-01T00:00:00Z", "assets": [] },
    { "tag_name": "nightly-99-short", "published_at": "2024-02-02T00:00:00Z", "assets": [] }
]"#;

#[test]
fn catalog_resolves_to_newest_release_per_version() {
    let releases = parse_catalog(CATALOG.as_bytes()).expect("parse catalog");

    let groups = resolve(&releases, None).expect("resolve catalog");

    let resolved: Vec<(&str, &str)> = groups
        .iter()
        .map(|group| (group.number.as_str(), group.tag()))
        .collect();
    assert_eq!(
        resolved,
        vec![("1050", "nightly-1050-def456"), ("1049", "nightly-1049-xyz000")]
    );
}

#[test]
fn chosen_release_names_the_output_archive() {
    let releases = parse_catalog(CATALOG.as_bytes()).expect("parse catalog");
    let groups = resolve(&releases, None).expect("resolve catalog");
    let shown = visible(&groups, 1);

    let chosen = pick(shown, 5).expect("fallback to newest");

    assert_eq!(
        ArtifactName::derive(chosen).file_name("REFramework"),
        "REFramework_nightly-1050-def456_03Jan24.zip"
    );
}

#[test]
fn prefix_that_matches_nothing_is_an_error() {
    let releases = parse_catalog(CATALOG.as_bytes()).expect("parse catalog");

    assert_eq!(
        resolve(&releases, Some("2")).map(|groups| groups.len()),
        Err(ResolveError::NoQualifyingReleases)
    );
}
