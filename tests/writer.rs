use exonsite::{
    classify, modification_ratios, summarize_sites, CoordinateOptions, ProbabilityRow, RatioTable,
    Reader, SiteCall, SiteTable, SummaryTable, TranscriptIndex, Writer,
};

fn sites() -> Vec<exonsite::AnnotatedSite> {
    let store = Reader::from_path("tests/data/test.gtf")
        .unwrap()
        .into_store()
        .unwrap();
    let index = TranscriptIndex::build(&store, &CoordinateOptions::default());
    classify(
        &index,
        &[
            SiteCall::new("AT1G01020.4", 426),
            SiteCall::new("AT1G01020.4", 860),
            SiteCall::new("AT1G01020.4", 861),
            SiteCall::new("AT5G00000.1", 1),
        ],
    )
}

#[test]
fn write_site_table() {
    let mut buf = Vec::new();
    Writer::<SiteTable>::from_records(&sites(), &mut buf).unwrap();
    let text = String::from_utf8(buf).unwrap();
    let lines: Vec<&str> = text.trim_end().split('\n').collect();
    assert_eq!(lines.len(), 5);
    assert_eq!(
        lines[0],
        "transcript_id\tposition\texon_number\ttotal_exons_in_transcript\ttotal_exons_in_gene\tis_last_exon"
    );
    assert_eq!(lines[1], "AT1G01020.4\t426\t4\t7\t8\tfalse");
    assert_eq!(lines[2], "AT1G01020.4\t860\t7\t7\t8\ttrue");
    assert_eq!(lines[3], "AT1G01020.4\t861\tUTR\t7\tunknown\tfalse");
    assert_eq!(lines[4], "AT5G00000.1\t1\tUTR\tunknown\tunknown\tfalse");
}

#[test]
fn write_single_record_has_no_header() {
    let mut buf = Vec::new();
    Writer::<SiteTable>::from_record(&sites()[0], &mut buf).unwrap();
    assert_eq!(buf, b"AT1G01020.4\t426\t4\t7\t8\tfalse\n");
}

#[test]
fn write_summary_table_with_overall_row() {
    let summaries = summarize_sites(&sites());
    let mut buf = Vec::new();
    Writer::<SummaryTable>::from_records(&summaries, &mut buf).unwrap();
    let text = String::from_utf8(buf).unwrap();
    let lines: Vec<&str> = text.trim_end().split('\n').collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[1], "AT1G01020.4\t3\t1\t1\t1");
    assert_eq!(lines[2], "AT5G00000.1\t1\t0\t0\t1");
    assert_eq!(lines[3], "Overall\t4\t1\t1\t2");
}

#[test]
fn write_ratio_table() {
    let rows = vec![
        ProbabilityRow {
            transcript_id: "AT1G01100.2".into(),
            transcript_position: 475,
            probability_modified: 0.95,
        },
        ProbabilityRow {
            transcript_id: "AT1G01100.2".into(),
            transcript_position: 600,
            probability_modified: 0.12,
        },
    ];
    let ratios = modification_ratios(&rows, 0.9, "WT_1");
    let mut buf = Vec::new();
    Writer::<RatioTable>::from_records(&ratios, &mut buf).unwrap();
    let text = String::from_utf8(buf).unwrap();
    assert_eq!(
        text,
        "transcript_id\tnon_modified\tmodified\ttotal_sites\tmod_ratio\tcondition\n\
AT1G01100.2\t1\t1\t2\t0.5\tWT_1\n"
    );
}

#[test]
fn write_to_path_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sites_exon_annotated.tab");
    Writer::<SiteTable>::to_path(&path, &sites()).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("transcript_id\tposition\t"));
    assert_eq!(text.lines().count(), 5);
}

#[cfg(not(feature = "gzip"))]
#[test]
fn write_gz_without_codec_is_unsupported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sites.tab.gz");
    assert!(matches!(
        Writer::<SiteTable>::to_path(&path, &sites()),
        Err(exonsite::WriterError::Unsupported(_))
    ));
}

#[cfg(feature = "gzip")]
#[test]
fn write_gz_output() {
    use std::io::Read;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sites.tab.gz");
    Writer::<SiteTable>::to_path(&path, &sites()).unwrap();

    let mut text = String::new();
    flate2::read::MultiGzDecoder::new(std::fs::File::open(&path).unwrap())
        .read_to_string(&mut text)
        .unwrap();
    assert_eq!(text.lines().count(), 5);
}
