use opwatch_core::{parse_progress, ProgressEvent, UnitCount};
use pretty_assertions::assert_eq;

#[test]
fn empty_and_blank_logs_yield_nothing() {
    assert_eq!(parse_progress(""), None);
    assert_eq!(parse_progress("   \n\t\n  "), None);
}

#[test]
fn garbage_lines_are_ignored() {
    assert_eq!(parse_progress("garbage\nmore garbage"), None);
}

#[test]
fn well_formed_marker_is_parsed() {
    let event = parse_progress(
        "[PROGRESS] 12/100 datasets processed | 5/10 satellites | Elapsed: 34s",
    )
    .expect("marker parses");

    assert_eq!(
        event,
        ProgressEvent {
            current_units: 12,
            total_units: 100,
            elapsed_seconds: 34,
            message: Some("12/100 datasets processed | 5/10 satellites".to_string()),
            secondary: Some(UnitCount {
                current: 5,
                total: 10,
                label: "satellites".to_string(),
            }),
        }
    );
}

#[test]
fn most_recent_marker_wins() {
    let log = "\
starting crawl
[PROGRESS] 1/100 datasets processed | 1/10 satellites | Elapsed: 2s
INFO fetched page 3
[PROGRESS] 40/100 datasets processed | 4/10 satellites | Elapsed: 20s
INFO fetched page 4
";
    let event = parse_progress(log).expect("marker parses");
    assert_eq!(event.current_units, 40);
    assert_eq!(event.elapsed_seconds, 20);
}

#[test]
fn malformed_latest_line_falls_back_to_previous_marker() {
    let log = "\
[PROGRESS] 7/100 datasets processed | 2/10 satellites | Elapsed: 9s
[PROGRESS] 8/100 datasets processed | 2/10 satellites | Elapsed: soon";
    let event = parse_progress(log).expect("earlier marker parses");
    assert_eq!(event.current_units, 7);
    assert_eq!(event.elapsed_seconds, 9);
}

#[test]
fn current_above_total_is_discarded_not_clamped() {
    let log = "\
[PROGRESS] 50/100 datasets processed | 5/10 satellites | Elapsed: 10s
[PROGRESS] 120/100 datasets processed | 5/10 satellites | Elapsed: 11s";
    let event = parse_progress(log).expect("earlier marker parses");
    assert_eq!(event.current_units, 50);

    assert_eq!(
        parse_progress("[PROGRESS] 3/2 datasets | 1/1 satellites | Elapsed: 1s"),
        None
    );
}

#[test]
fn inconsistent_secondary_pair_is_discarded() {
    assert_eq!(
        parse_progress("[PROGRESS] 3/20 datasets | 11/10 satellites | Elapsed: 1s"),
        None
    );
}

#[test]
fn tag_must_prefix_the_line() {
    assert_eq!(
        parse_progress("note: [PROGRESS] 3/20 datasets | 1/10 satellites | Elapsed: 1s"),
        None
    );
}

#[test]
fn surrounding_whitespace_and_crlf_are_tolerated() {
    let event = parse_progress("  [PROGRESS] 3/20 datasets | 1/10 satellites | Elapsed: 4s  \r\n")
        .expect("marker parses");
    assert_eq!(event.current_units, 3);
    assert_eq!(event.total_units, 20);
    assert_eq!(event.elapsed_seconds, 4);
}

#[test]
fn zero_totals_are_accepted() {
    let event = parse_progress("[PROGRESS] 0/0 datasets | 0/0 satellites | Elapsed: 0s")
        .expect("marker parses");
    assert_eq!(event.total_units, 0);
    assert_eq!(event.elapsed_seconds, 0);
}
