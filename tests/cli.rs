use std::fs;
use std::path::Path;
use std::process::Command;

const GTF: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data/test.gtf");
const HEADER: &str =
    "transcript_id,transcript_position,n_reads,probability_modified,kmer,mod_ratio";

fn write_table(dir: &Path, condition: &str, rows: &[&str]) -> String {
    let run = dir.join(condition);
    fs::create_dir_all(&run).unwrap();
    let path = run.join("data.site_proba.csv");
    fs::write(&path, format!("{HEADER}\n{}\n", rows.join("\n"))).unwrap();
    path.to_string_lossy().into_owned()
}

fn exonsite(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_exonsite"))
        .args(args)
        .output()
        .unwrap()
}

fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

fn two_conditions(dir: &Path) -> (String, String) {
    let vir_1 = write_table(
        dir,
        "vir_1",
        &[
            "AT1G01020.4,426,30,0.966,GGACT,0.5",
            "AT1G01010.1,3,21,0.95,TGACC,0.4",
        ],
    );
    let vir_2 = write_table(
        dir,
        "vir_2",
        &[
            "AT1G01020.4,860,25,0.97,AGACA,0.4",
            "AT1G01010.1,5,40,0.10,GAACT,0.0",
        ],
    );
    (vir_1, vir_2)
}

#[test]
fn test_same_named_inputs_keep_separate_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let (vir_1, vir_2) = two_conditions(dir.path());
    let out = dir.path().join("out");
    let log = dir.path().join("run.log");

    let output = exonsite(&[
        "--gtf",
        GTF,
        "--m6a",
        vir_1.as_str(),
        vir_2.as_str(),
        "--out",
        out.to_str().unwrap(),
        "--logfile",
        log.to_str().unwrap(),
        "--ratio",
    ]);
    assert!(output.status.success(), "{output:?}");

    let first = read_lines(&out.join("vir_1_data.site_proba_exon_annotated.tab"));
    assert_eq!(first.len(), 3);
    assert_eq!(first[1], "AT1G01020.4\t426\t4\t7\t8\tfalse");
    assert_eq!(first[2], "AT1G01010.1\t3\t1\t6\t6\tfalse");

    let second = read_lines(&out.join("vir_2_data.site_proba_exon_annotated.tab"));
    assert_eq!(second.len(), 2);
    assert_eq!(second[1], "AT1G01020.4\t860\t7\t7\t8\ttrue");

    let ratio = read_lines(&out.join("vir_1_data.site_proba_mod_ratio.tab"));
    assert_eq!(ratio.len(), 3);
    assert_eq!(ratio[1], "AT1G01010.1\t0\t1\t1\t1\tvir_1_data.site_proba");
    assert_eq!(ratio[2], "AT1G01020.4\t0\t1\t1\t1\tvir_1_data.site_proba");

    let ratio = read_lines(&out.join("vir_2_data.site_proba_mod_ratio.tab"));
    assert_eq!(ratio.len(), 3);
    assert_eq!(ratio[1], "AT1G01010.1\t1\t0\t1\t0\tvir_2_data.site_proba");
    assert_eq!(ratio[2], "AT1G01020.4\t0\t1\t1\t1\tvir_2_data.site_proba");

    let log = fs::read_to_string(&log).unwrap();
    assert!(log.contains("INFO: 2 transcripts are common to all conditions"));
}

#[test]
fn test_gene_list_restricts_ratios() {
    let dir = tempfile::tempdir().unwrap();
    let (vir_1, vir_2) = two_conditions(dir.path());
    let out = dir.path().join("out");
    let list = dir.path().join("genes.txt");
    fs::write(&list, "AT1G01020.4\nAT1G01030\n").unwrap();

    let output = exonsite(&[
        "--gtf",
        GTF,
        "--m6a",
        vir_1.as_str(),
        vir_2.as_str(),
        "--out",
        out.to_str().unwrap(),
        "--logfile",
        dir.path().join("run.log").to_str().unwrap(),
        "--ratio",
        "--gene-list",
        list.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{output:?}");

    for condition in ["vir_1", "vir_2"] {
        let path = out.join(format!("{condition}_data.site_proba_mod_ratio.tab"));
        let rows = read_lines(&path);
        assert_eq!(rows.len(), 2, "{condition}");
        assert!(rows[1].starts_with("AT1G01020.4\t"));
    }
}

#[test]
fn test_missing_input_fails() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.csv");
    let output = exonsite(&[
        "--gtf",
        GTF,
        "--m6a",
        missing.to_str().unwrap(),
        "--logfile",
        dir.path().join("run.log").to_str().unwrap(),
    ]);
    assert!(!output.status.success());
}

#[test]
fn test_comma_in_path_is_a_single_input() {
    let dir = tempfile::tempdir().unwrap();
    let rows = ["AT1G01020.4,426,30,0.966,GGACT,0.5"];
    let input = write_table(dir.path(), "wt,rep1", &rows);
    let out = dir.path().join("annotated.tab");

    let output = exonsite(&[
        "--gtf",
        GTF,
        "--m6a",
        input.as_str(),
        "--out",
        out.to_str().unwrap(),
        "--logfile",
        dir.path().join("run.log").to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{output:?}");

    let rows = read_lines(&out);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1], "AT1G01020.4\t426\t4\t7\t8\tfalse");
}
