//! Tests for the store writer
//!
//! These tests verify:
//! - Cluster packing against the byte budget
//! - Source validation (ids, structure, registry arguments)
//! - Write summary bookkeeping

use std::fs;
use std::path::PathBuf;

use lexstore::LexError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup() -> (TempDir, PathBuf, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let src = temp_dir.path().join("source.xml");
    let dst = temp_dir.path().join("store.lex");
    (temp_dir, src, dst)
}

fn write_store(
    src: &PathBuf,
    dst: &PathBuf,
    xml: &str,
    paths: &[&str],
    cluster_size: u16,
) -> lexstore::Result<lexstore::WriteSummary> {
    fs::write(src, xml).unwrap();
    let paths: Vec<String> = paths.iter().map(|p| p.to_string()).collect();
    lexstore::write(src, dst, &paths, cluster_size)
}

// =============================================================================
// Cluster Packing
// =============================================================================

#[test]
fn two_small_entries_share_one_cluster() {
    let (_temp, src, dst) = setup();
    let xml = r#"<body>
        <entry xml:id="100"><a><b>foo</b></a></entry>
        <entry xml:id="200"><a><b>foo</b></a></entry>
    </body>"#;

    let summary = write_store(&src, &dst, xml, &[], 64000).unwrap();

    assert_eq!(summary.entries, 2);
    assert_eq!(summary.clusters, 1);
    assert_eq!(summary.lexicon_keys, 1);
    assert_eq!(summary.alphabet_len, 2);
}

#[test]
fn tiny_budget_splits_entries_across_clusters() {
    let (_temp, src, dst) = setup();
    let xml = r#"<body>
        <entry xml:id="1"><a><b>foo</b></a></entry>
        <entry xml:id="2"><a><b>foo</b></a></entry>
        <entry xml:id="3"><a><b>foo</b></a></entry>
    </body>"#;

    // each blob is 14 bytes: pop(1) + bits(1) + 3 records(12)
    let summary = write_store(&src, &dst, xml, &[], 20).unwrap();
    assert_eq!(summary.clusters, 3);

    // every entry still reconstructs from its own cluster
    let reader = lexstore::Reader::open(&dst).unwrap();
    for id in [1u64, 2, 3] {
        assert_eq!(reader.get(id).unwrap().unwrap(), "<a><b>foo</b></a>");
    }
}

#[test]
fn entry_larger_than_budget_is_rejected() {
    let (_temp, src, dst) = setup();
    let xml = r#"<body>
        <entry xml:id="1"><a><b>a text leaf that will not fit</b></a></entry>
    </body>"#;

    match write_store(&src, &dst, xml, &[], 8) {
        Err(LexError::InvalidInput(_)) => {}
        other => panic!("expected InvalidInput, got {:?}", other.map(|s| s.entries)),
    }
}

// =============================================================================
// Source Validation
// =============================================================================

#[test]
fn duplicate_entry_ids_are_rejected() {
    let (_temp, src, dst) = setup();
    let xml = r#"<body>
        <entry xml:id="7"><a>x</a></entry>
        <entry xml:id="e7"><a>y</a></entry>
    </body>"#;

    assert!(matches!(
        write_store(&src, &dst, xml, &[], 64000),
        Err(LexError::InvalidInput(_))
    ));
}

#[test]
fn entry_without_id_is_rejected() {
    let (_temp, src, dst) = setup();
    let xml = r#"<body><entry><a>x</a></entry></body>"#;

    assert!(matches!(
        write_store(&src, &dst, xml, &[], 64000),
        Err(LexError::Source(_))
    ));
}

#[test]
fn entry_with_two_roots_is_rejected() {
    let (_temp, src, dst) = setup();
    let xml = r#"<body><entry xml:id="1"><a>x</a><b>y</b></entry></body>"#;

    assert!(matches!(
        write_store(&src, &dst, xml, &[], 64000),
        Err(LexError::Source(_))
    ));
}

#[test]
fn mixed_text_and_children_is_rejected() {
    let (_temp, src, dst) = setup();
    let xml = r#"<body><entry xml:id="1"><a>x<b>y</b></a></entry></body>"#;

    assert!(matches!(
        write_store(&src, &dst, xml, &[], 64000),
        Err(LexError::Source(_))
    ));
}

#[test]
fn nested_entries_are_rejected() {
    let (_temp, src, dst) = setup();
    let xml = r#"<body><entry xml:id="1"><entry xml:id="2">x</entry></entry></body>"#;

    assert!(matches!(
        write_store(&src, &dst, xml, &[], 64000),
        Err(LexError::Source(_))
    ));
}

#[test]
fn unsorted_registry_is_rejected() {
    let (_temp, src, dst) = setup();
    let xml = r#"<body><entry xml:id="1"><a>x</a></entry></body>"#;

    assert!(matches!(
        write_store(&src, &dst, xml, &["/b", "/a"], 64000),
        Err(LexError::InvalidInput(_))
    ));
}

#[test]
fn zero_cluster_budget_is_rejected() {
    let (_temp, src, dst) = setup();
    let xml = r#"<body><entry xml:id="1"><a>x</a></entry></body>"#;

    assert!(matches!(
        write_store(&src, &dst, xml, &[], 0),
        Err(LexError::InvalidInput(_))
    ));
}

#[test]
fn elements_outside_the_body_are_ignored() {
    let (_temp, src, dst) = setup();
    let xml = r#"<TEI>
        <teiHeader><title>ignored</title></teiHeader>
        <body><entry xml:id="5"><a>kept</a></entry></body>
    </TEI>"#;

    let summary = write_store(&src, &dst, xml, &[], 64000).unwrap();
    assert_eq!(summary.entries, 1);
    assert_eq!(summary.lexicon_keys, 1);

    let reader = lexstore::Reader::open(&dst).unwrap();
    assert_eq!(reader.get(5).unwrap().unwrap(), "<a>kept</a>");
    assert!(reader.find("ignored", 0, 0, 0, None, 0).unwrap().is_empty());
}

#[test]
fn empty_body_writes_an_empty_store() {
    let (_temp, src, dst) = setup();
    let summary = write_store(&src, &dst, "<body></body>", &[], 64000).unwrap();

    assert_eq!(summary.entries, 0);
    assert_eq!(summary.clusters, 0);

    let reader = lexstore::Reader::open(&dst).unwrap();
    assert_eq!(reader.entry_count(), 0);
    assert_eq!(reader.get(1).unwrap(), None);
}
