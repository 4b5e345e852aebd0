use std::fs::File;
use std::io::Write;
use std::path::Path;

use kadence::event::{EventStore, Metric, GROUP_FILES};
use kadence::summary::{summarize_all, SummaryError};

fn write_group(dir: &Path, file: &str, rows: &[&str]) {
    let mut f = File::create(dir.join(file)).unwrap();
    writeln!(f, "Hand,Hold,Direction,Latency,Flight").unwrap();
    for row in rows {
        writeln!(f, "{}", row).unwrap();
    }
}

fn write_all_groups(dir: &Path, rows: &[&str]) {
    for (_, file) in GROUP_FILES {
        write_group(dir, file, rows);
    }
}

#[test]
fn test_load_and_summarize_reference_sample() {
    let dir = tempfile::tempdir().unwrap();
    let rows: Vec<String> = (1..=10)
        .map(|hold| format!("L,{hold},LL,{},0", hold * 2))
        .collect();
    let refs: Vec<&str> = rows.iter().map(String::as_str).collect();
    write_all_groups(dir.path(), &refs);

    let store = EventStore::load_dir(dir.path()).unwrap();
    let results = summarize_all(&store, Metric::Hold);

    assert_eq!(results.len(), 5);
    for result in &results {
        let s = result.as_ref().unwrap();
        assert_eq!(s.count, 10);
        assert_eq!(s.q1, 3.25);
        assert_eq!(s.median, 5.5);
        assert_eq!(s.q3, 7.75);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 10.0);
    }

    // Same store, other metric: latency columns are doubled holds.
    let latency = summarize_all(&store, Metric::Latency);
    assert_eq!(latency[0].as_ref().unwrap().median, 11.0);
}

#[test]
fn test_summaries_ignore_source_row_order() {
    let sorted_dir = tempfile::tempdir().unwrap();
    let shuffled_dir = tempfile::tempdir().unwrap();
    write_all_groups(
        sorted_dir.path(),
        &["L,10,LL,10,0", "L,20,LL,20,0", "L,30,LL,30,0", "L,40,LL,40,0"],
    );
    write_all_groups(
        shuffled_dir.path(),
        &["L,30,LL,30,0", "L,10,LL,10,0", "L,40,LL,40,0", "L,20,LL,20,0"],
    );

    let sorted = summarize_all(
        &EventStore::load_dir(sorted_dir.path()).unwrap(),
        Metric::Hold,
    );
    let shuffled = summarize_all(
        &EventStore::load_dir(shuffled_dir.path()).unwrap(),
        Metric::Hold,
    );

    assert_eq!(sorted, shuffled);
}

#[test]
fn test_nan_cells_are_counted_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    write_all_groups(
        dir.path(),
        &["L,100,LL,150,50", "L,oops,LL,150,50", "L,,LL,150,50"],
    );

    let store = EventStore::load_dir(dir.path()).unwrap();
    let results = summarize_all(&store, Metric::Hold);

    let s = results[0].as_ref().unwrap();
    assert_eq!(s.count, 1);
    assert_eq!(s.excluded, 2);
    assert_eq!(s.median, 100.0);
}

#[test]
fn test_empty_group_error_does_not_poison_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    write_all_groups(dir.path(), &["L,100,LL,150,50"]);
    // MAOB only has a header.
    write_group(dir.path(), "maob_events.csv", &[]);

    let store = EventStore::load_dir(dir.path()).unwrap();
    let results = summarize_all(&store, Metric::Hold);

    assert_eq!(results.len(), 5);
    for (i, result) in results.iter().enumerate() {
        if store.groups()[i].name == "MAOB" {
            assert!(matches!(
                result,
                Err(SummaryError::EmptySample { group, .. }) if group == "MAOB"
            ));
        } else {
            assert!(result.is_ok(), "group {} should summarize", i);
        }
    }
}
