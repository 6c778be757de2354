use exonsite::{
    classify, summarize_sites, CategoryCounts, CoordinateOptions, ExonAssignment, GeneExonCount,
    ProbabilityTable, Reader, SiteCall, SiteCategory, TableOptions, TranscriptIndex,
};

fn index() -> TranscriptIndex {
    let store = Reader::from_path("tests/data/test.gtf")
        .unwrap()
        .into_store()
        .unwrap();
    TranscriptIndex::build(&store, &CoordinateOptions::default())
}

#[test]
fn test_classify_exon_and_last_exon() {
    let index = index();
    let calls = vec![
        SiteCall::new("AT1G01020.4", 426),
        SiteCall::new("AT1G01020.4", 860),
        SiteCall::new("AT1G01010.1", 3),
    ];
    let sites = classify(&index, &calls);
    assert_eq!(sites.len(), 3);

    assert_eq!(sites[0].exon, ExonAssignment::Exon(4));
    assert_eq!(sites[0].total_exons_in_transcript, Some(7));
    assert_eq!(sites[0].total_exons_in_gene, GeneExonCount::Known(8));
    assert!(!sites[0].is_last_exon);
    assert_eq!(sites[0].category(), SiteCategory::NonLastExon);

    assert_eq!(sites[1].exon, ExonAssignment::Exon(7));
    assert!(sites[1].is_last_exon);

    assert_eq!(sites[2].transcript_id, "AT1G01010.1");
    assert_eq!(sites[2].exon, ExonAssignment::Exon(1));
    assert_eq!(sites[2].total_exons_in_gene, GeneExonCount::Known(6));
}

#[test]
fn test_classify_utr_and_unknown() {
    let index = index();
    let calls = vec![
        SiteCall::new("AT1G01020.4", 861),
        SiteCall::new("AT5G00000.1", 12),
    ];
    let sites = classify(&index, &calls);

    assert_eq!(sites[0].exon, ExonAssignment::Utr);
    assert_eq!(sites[0].total_exons_in_transcript, Some(7));
    assert_eq!(sites[0].total_exons_in_gene, GeneExonCount::Unknown);
    assert!(!sites[0].is_last_exon);

    assert_eq!(sites[1].exon, ExonAssignment::Utr);
    assert_eq!(sites[1].total_exons_in_transcript, None);
}

#[test]
fn test_classify_preserves_order_and_duplicates() {
    let index = index();
    let calls = vec![
        SiteCall::new("AT1G01030.1", 900),
        SiteCall::new("AT1G01010.1", 3),
        SiteCall::new("AT1G01030.1", 900),
    ];
    let sites = classify(&index, &calls);
    let order: Vec<(&str, u64)> = sites
        .iter()
        .map(|site| (site.transcript_id.as_str(), site.position))
        .collect();
    assert_eq!(
        order,
        vec![("AT1G01030.1", 900), ("AT1G01010.1", 3), ("AT1G01030.1", 900)]
    );
    assert_eq!(sites[0], sites[2]);
}

#[test]
fn test_classify_empty_input() {
    let calls: Vec<SiteCall> = Vec::new();
    assert!(classify(&index(), &calls).is_empty());
    assert!(classify(&TranscriptIndex::default(), &[SiteCall::new("a.1", 1)])[0]
        .total_exons_in_transcript
        .is_none());
}

#[test]
fn test_pipeline_from_probability_table() {
    let data = "transcript_id,transcript_position,n_reads,probability_modified,kmer,mod_ratio
AT1G01020.4,426,30,0.966,GGACT,0.5
AT1G01020.4,861,25,0.966,AGACA,0.4
AT1G01010.1,3,21,0.066,TGACC,0.0
AT1G01010.1,5899,40,0.066,GAACT,0.0
";
    let table = ProbabilityTable::from_reader(data.as_bytes(), TableOptions::new()).unwrap();
    let sites = classify(&index(), &table.methylated_sites(0.9));
    assert_eq!(sites.len(), 2);

    let counts = CategoryCounts::from_sites(&sites);
    assert_eq!(counts.total_sites, 2);
    assert_eq!(counts.non_last_exon_sites, 1);
    assert_eq!(counts.utr_sites, 1);

    let summaries = summarize_sites(&sites);
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].transcript_id, "AT1G01020.4");
    assert_eq!(summaries[0].counts, counts);
}
