//! Integration tests for the wikisieve filtering pipeline.
//!
//! These tests drive the whole data flow: BZ2-compressed XML on disk, the
//! streaming source, the pre-filter chain, the pruning tree builder and the
//! XML writer.
//!
//! - **Language Tests** -- Section extraction plus empty-text pruning
//! - **Ordering Tests** -- Kept pages and revisions keep document order
//! - **Truncation Tests** -- Text size limit and its log
//! - **Config Tests** -- Pipelines described in JSON
//! - **Writer Tests** -- Pruned output parses back to the same tree
//!
//! All tests share the `sample_xml()` fixture, a tiny Wiktionary dump with
//! pages that do and do not carry a Polish section.

use bzip2::write::BzEncoder;
use bzip2::Compression;
use std::fs;
use std::io::Write;
use tempfile::NamedTempFile;
use wikisieve::builder::TreeBuilder;
use wikisieve::config::SieveConfig;
use wikisieve::language::LanguagePrefilter;
use wikisieve::models::{MediaWiki, Page, Revision};
use wikisieve::parser::WikiSource;
use wikisieve::pipeline::{Loaded, PipelineBuilder};
use wikisieve::postfilter::{KeepAll, NonEmptyText, Predicates, TitlePatterns};
use wikisieve::text_size::{TextSizeLimit, TextSizePrefilter};
use wikisieve::writer::to_xml_string;

/// Helper: create a BZ2-compressed XML file from a string and return the temp file handle.
///
/// The `.bz2` suffix is what makes the source decompress it.
fn create_bz2_xml(xml: &str) -> NamedTempFile {
    let mut encoder = BzEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(xml.as_bytes()).unwrap();
    let compressed = encoder.finish().unwrap();

    let mut tmp = tempfile::Builder::new().suffix(".xml.bz2").tempfile().unwrap();
    tmp.write_all(&compressed).unwrap();
    tmp.flush().unwrap();
    tmp
}

/// Sample Wiktionary XML: "kot" has an English and a Polish revision,
/// "dog" has English only, "pies" has Polish with subsections followed by
/// another language.
fn sample_xml() -> &'static str {
    r#"<mediawiki xmlns="http://www.mediawiki.org/xml/export-0.10/" xml:lang="pl">
  <siteinfo>
    <sitename>Wikisłownik</sitename>
  </siteinfo>
  <page>
    <title>kot</title>
    <ns>0</ns>
    <id>1</id>
    <revision>
      <id>10</id>
      <text xml:space="preserve">==English==
foo</text>
    </revision>
    <revision>
      <id>11</id>
      <parentid>10</parentid>
      <text xml:space="preserve">==Polish==
bar</text>
    </revision>
  </page>
  <page>
    <title>dog</title>
    <ns>0</ns>
    <id>2</id>
    <revision>
      <id>20</id>
      <text xml:space="preserve">==English==
baz</text>
    </revision>
  </page>
  <page>
    <title>pies</title>
    <ns>0</ns>
    <id>3</id>
    <revision>
      <id>30</id>
      <text xml:space="preserve">{{also|Pies}}
== [[Polish]] ==
===Noun===
pies &amp; kot
==German==
Hund</text>
    </revision>
  </page>
</mediawiki>
"#
}

fn source(file: &NamedTempFile, chunk_size: usize) -> WikiSource<Box<dyn std::io::BufRead>> {
    WikiSource::open(file.path().to_str().unwrap())
        .unwrap()
        .with_chunk_size(chunk_size)
}

fn by_language(file: &NamedTempFile, chunk_size: usize, loose: bool) -> Loaded {
    let builder = PipelineBuilder::new();
    let builder = if loose {
        builder.text_filter(LanguagePrefilter::loose("Polish").unwrap())
    } else {
        builder.text_filter(LanguagePrefilter::new("Polish").unwrap())
    };
    builder
        .source(source(file, chunk_size))
        .post_filter(NonEmptyText)
        .build()
        .unwrap()
        .run()
        .unwrap()
}

fn titles(root: &MediaWiki) -> Vec<&str> {
    root.pages.iter().map(|p| p.title.as_str()).collect()
}

fn texts(page: &Page) -> Vec<&str> {
    page.revisions().map(|r| r.text.as_str()).collect()
}

// ============================================================================
// Language Tests
// ============================================================================

#[test]
fn language_keeps_only_pages_with_section() {
    let file = create_bz2_xml(sample_xml());
    let loaded = by_language(&file, 1 << 16, false);

    assert_eq!(titles(&loaded.root), vec!["kot"]);
    let kot = &loaded.root.pages[0];
    assert_eq!(kot.revisions().count(), 1);
    assert_eq!(texts(kot), vec!["==Polish==\nbar"]);
    assert_eq!(kot.revisions().next().unwrap().id.as_deref(), Some("11"));

    assert_eq!(loaded.stats.pages_seen, 3);
    assert_eq!(loaded.stats.pages_kept, 1);
    assert_eq!(loaded.stats.revisions_seen, 4);
    assert_eq!(loaded.stats.revisions_kept, 1);
}

#[test]
fn language_result_independent_of_chunk_size() {
    let file = create_bz2_xml(sample_xml());
    let reference = by_language(&file, 1 << 16, true).root;
    for chunk_size in [1, 2, 3, 5, 8, 13] {
        assert_eq!(by_language(&file, chunk_size, true).root, reference, "chunk size {}", chunk_size);
    }
}

#[test]
fn loose_language_accepts_linked_header() {
    let file = create_bz2_xml(sample_xml());
    let loaded = by_language(&file, 7, true);

    assert_eq!(titles(&loaded.root), vec!["kot", "pies"]);
    assert_eq!(
        texts(&loaded.root.pages[1]),
        vec!["== [[Polish]] ==\n===Noun===\npies & kot\n"]
    );
}

#[test]
fn siteinfo_survives_filtering() {
    let file = create_bz2_xml(sample_xml());
    let loaded = by_language(&file, 64, false);
    assert_eq!(loaded.root.extra.len(), 1);
    assert_eq!(loaded.root.extra[0].name, "siteinfo");
    assert!(loaded.root.extra[0].text().contains("Wikisłownik"));
}

// ============================================================================
// Ordering Tests
// ============================================================================

#[test]
fn kept_pages_and_revisions_keep_document_order() {
    let mut xml = String::from("<mediawiki>\n");
    for p in 0..20 {
        xml.push_str(&format!("<page><title>p{}</title>", p));
        for r in 0..5 {
            xml.push_str(&format!("<revision><id>{}</id><text>{}</text></revision>", r, r));
        }
        xml.push_str("</page>\n");
    }
    xml.push_str("</mediawiki>\n");
    let file = create_bz2_xml(&xml);

    let keep_page = |p: &Page| p.title.trim_start_matches('p').parse::<u32>().unwrap() % 3 == 0;
    let keep_revision = |r: &Revision, _p: &Page| r.text != "1" && r.text != "2";
    let loaded = PipelineBuilder::new()
        .source(source(&file, 4))
        .post_filter(Predicates::new(keep_page, keep_revision))
        .build()
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(
        titles(&loaded.root),
        vec!["p0", "p3", "p6", "p9", "p12", "p15", "p18"]
    );
    for page in &loaded.root.pages {
        assert_eq!(texts(page), vec!["0", "3", "4"]);
    }
    assert_eq!(loaded.stats.revisions_seen, 100);
    assert_eq!(loaded.stats.revisions_kept, 60);
}

// ============================================================================
// Truncation Tests
// ============================================================================

#[test]
fn title_filter_with_truncation_log() {
    let file = create_bz2_xml(sample_xml());
    let log = NamedTempFile::new().unwrap();
    let truncate = TextSizePrefilter::new(TextSizeLimit::Chars(12))
        .with_log(fs::File::create(log.path()).unwrap());

    let loaded = PipelineBuilder::new()
        .source(source(&file, 5))
        .text_filter(truncate)
        .post_filter(TitlePatterns::new(["^pi", "^k"]).unwrap())
        .build()
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(titles(&loaded.root), vec!["kot", "pies"]);
    assert_eq!(texts(&loaded.root.pages[0]), vec!["==English==\n", "==Polish==\nb"]);
    assert_eq!(texts(&loaded.root.pages[1]), vec!["{{also|Pies}"]);

    let records = fs::read_to_string(log.path()).unwrap();
    let pies_size = "{{also|Pies}}\n== [[Polish]] ==\n===Noun===\npies & kot\n==German==\nHund"
        .chars()
        .count();
    assert_eq!(
        records,
        format!("15 12 kot\n14 12 kot\n15 12 dog\n{} 12 pies\n", pies_size)
    );
}

#[test]
fn unlimited_text_size_changes_nothing() {
    let file = create_bz2_xml(sample_xml());
    let plain = PipelineBuilder::new()
        .source(source(&file, 16))
        .post_filter(KeepAll)
        .build()
        .unwrap()
        .run()
        .unwrap();
    let limited = PipelineBuilder::new()
        .source(source(&file, 16))
        .text_filter(TextSizePrefilter::new(TextSizeLimit::Unlimited))
        .post_filter(KeepAll)
        .build()
        .unwrap()
        .run()
        .unwrap();
    assert_eq!(plain.root, limited.root);
}

// ============================================================================
// Config Tests
// ============================================================================

#[test]
fn config_file_drives_pipeline() {
    let file = create_bz2_xml(sample_xml());
    let mut config_file = NamedTempFile::new().unwrap();
    config_file
        .write_all(
            br#"{
                "prefilters": [
                    { "kind": "language", "name": "Polish", "loose": true },
                    { "kind": "text_size", "limit": 13 }
                ],
                "post_filter": { "kind": "non_empty_text" },
                "chunk_size": 3
            }"#,
        )
        .unwrap();

    let config = SieveConfig::from_file(config_file.path().to_str().unwrap()).unwrap();
    let loaded = PipelineBuilder::from_config(&config)
        .unwrap()
        .source(source(&file, config.chunk_size.unwrap()))
        .build()
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(titles(&loaded.root), vec!["kot", "pies"]);
    assert_eq!(texts(&loaded.root.pages[0]), vec!["==Polish==\nba"]);
    assert_eq!(texts(&loaded.root.pages[1]), vec!["== [[Polish]]"]);
}

#[test]
fn config_without_post_filter_fails_before_reading() {
    let config = SieveConfig::from_json(r#"{ "prefilters": [] }"#).unwrap();
    let result = PipelineBuilder::<&[u8]>::from_config(&config);
    assert!(result.is_err());
}

// ============================================================================
// Writer Tests
// ============================================================================

#[test]
fn written_output_parses_back() {
    let file = create_bz2_xml(sample_xml());
    let loaded = by_language(&file, 9, true);
    let xml = to_xml_string(&loaded.root).unwrap();

    assert!(xml.contains("<title>pies</title>"));
    assert!(!xml.contains("<title>dog</title>"));
    assert!(xml.contains("pies &amp; kot"));
    assert!(!xml.contains("Hund"));

    let mut builder = TreeBuilder::new(());
    WikiSource::new(xml.as_bytes()).run(&mut builder).unwrap();
    let (again, ()) = builder.finish().unwrap();
    assert_eq!(titles(&again), titles(&loaded.root));
    for (a, b) in again.pages.iter().zip(&loaded.root.pages) {
        assert_eq!(texts(a), texts(b));
    }
}

#[test]
fn plain_xml_input_is_read_uncompressed() {
    let mut plain = tempfile::Builder::new().suffix(".xml").tempfile().unwrap();
    plain.write_all(sample_xml().as_bytes()).unwrap();
    plain.flush().unwrap();

    let loaded = by_language(&plain, 1 << 16, false);
    assert_eq!(titles(&loaded.root), vec!["kot"]);
}
