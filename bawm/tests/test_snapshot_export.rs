use bawm::analysis::{classify, Snapshot, Thresholds};
use bawm::domain::Domain;
use bawm::export::{export_snapshot, export_to_file};

fn scenario_counters() -> Snapshot {
    // One context switch, one block request, two page allocations
    Snapshot::default().with(Domain::Cpu, 1).with(Domain::Io, 1).with(Domain::Mem, 2)
}

#[test]
fn test_export_creates_valid_json() {
    let counters = scenario_counters();
    let classification = classify(&counters, &Thresholds::default());

    let mut buffer = Vec::new();
    export_snapshot(&mut buffer, &counters, classification).expect("Failed to export snapshot");

    let json_str = String::from_utf8(buffer).expect("Invalid UTF-8");
    let parsed: serde_json::Value = serde_json::from_str(&json_str).expect("Invalid JSON");

    assert_eq!(parsed["counters"]["cpu"], 1);
    assert_eq!(parsed["counters"]["io"], 1);
    assert_eq!(parsed["counters"]["mem"], 2);
    assert!(parsed["counters"].get("parallel").is_none());
    assert!(parsed["counters"].get("net").is_none());
    assert_eq!(parsed["load"], "IDLE");
    assert_eq!(parsed["parallel_saturated"], false);
}

#[test]
fn test_export_to_file() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("counters.json");

    let counters = Snapshot::default().with(Domain::Net, 4200).with(Domain::Parallel, 0);
    let classification = classify(&counters, &Thresholds::default());
    export_to_file(&path, &counters, classification).expect("Failed to export snapshot");

    let parsed: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).expect("Invalid JSON");
    assert_eq!(parsed["counters"]["net"], 4200);
    assert_eq!(parsed["counters"]["parallel"], 0);
    assert_eq!(parsed["load"], "NET");
}

#[test]
fn test_export_to_missing_directory_fails() {
    let counters = scenario_counters();
    let classification = classify(&counters, &Thresholds::default());
    let err = export_to_file(
        std::path::Path::new("/nonexistent/dir/counters.json"),
        &counters,
        classification,
    )
    .unwrap_err();
    assert!(err.to_string().contains("Failed to write snapshot file"));
}
