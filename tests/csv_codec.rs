// tests/csv_codec.rs
//
// Codec properties: serialize → parse reproduces rows, and on well-formed
// input the parser agrees with the `csv` crate.

use lead_ingest::csv_codec::{parse, serialize};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const ALPHABET: &[&str] = &["a", "B", "7", " ", ",", "\"", "\n", "\r\n", "é", "-", "x y"];

/// Random cell without leading/trailing whitespace (the parser trims).
fn random_cell(rng: &mut StdRng) -> String {
    let len = rng.random_range(1..8);
    let mut s = String::new();
    for _ in 0..len {
        s.push_str(ALPHABET[rng.random_range(0..ALPHABET.len())]);
    }
    let trimmed = s.trim().to_string();
    if trimmed.is_empty() {
        "v".to_string()
    } else {
        trimmed
    }
}

#[test]
fn serialize_then_parse_reproduces_rows() {
    let mut rng = StdRng::seed_from_u64(0x1ead5);
    for _ in 0..200 {
        let cols = rng.random_range(1..6);
        let headers: Vec<String> = (0..cols).map(|i| format!("h{i}")).collect();
        let rows: Vec<Vec<String>> = (0..rng.random_range(1..6))
            .map(|_| (0..cols).map(|_| random_cell(&mut rng)).collect())
            .collect();

        let text = serialize(&headers, rows.clone()).unwrap();
        let parsed = parse(&text);

        assert_eq!(parsed.headers, headers, "text: {text:?}");
        assert_eq!(parsed.records.len(), rows.len(), "text: {text:?}");
        for (rec, row) in parsed.records.iter().zip(&rows) {
            let got: Vec<&String> = headers.iter().map(|h| &rec[h]).collect();
            let want: Vec<&String> = row.iter().collect();
            assert_eq!(got, want, "text: {text:?}");
        }
    }
}

#[test]
fn agrees_with_csv_crate_on_well_formed_input() {
    let text = "name,street,city\n\"Doe, Jane\",\"1 \"\"Main\"\" St\",Avon\nBo,2 Oak,\"Lake\nCity\"\n";
    let ours = parse(text);

    let mut reader = csv::Reader::from_reader(text.as_bytes());
    let headers: Vec<String> = reader
        .headers()
        .expect("headers")
        .iter()
        .map(str::to_string)
        .collect();
    assert_eq!(ours.headers, headers);

    let theirs: Vec<Vec<String>> = reader
        .records()
        .map(|r| r.expect("record").iter().map(str::to_string).collect())
        .collect();
    assert_eq!(ours.records.len(), theirs.len());
    for (rec, row) in ours.records.iter().zip(&theirs) {
        let got: Vec<String> = headers.iter().map(|h| rec[h].clone()).collect();
        assert_eq!(&got, row);
    }
}

#[test]
fn single_row_is_not_a_table() {
    let p = parse("only,a,header");
    assert!(p.headers.is_empty());
    assert!(p.records.is_empty());
}
