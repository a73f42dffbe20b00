use field_extract::FieldExtractor;

const TOKEN: &str = "q6x04kc0oqm8v40t93pl34eg77dy1p0dp";
const OTHER_TOKEN: &str = "abcdefghijklmnopqrstuvwxyz0123456";

/// Simplified test harness to verify IP extraction.
fn check_ips(haystack: &str, expected: &[&str]) {
    let extractor = FieldExtractor::new().expect("Failed to build extractor");
    let actual = extractor.extract(haystack).ips;

    assert_eq!(actual, expected, "\nFailed for haystack: {}\n", haystack);
}

fn check_target(haystack: &str, expected: Option<&str>) {
    let extractor = FieldExtractor::new().expect("Failed to build extractor");
    assert_eq!(
        extractor.extract(haystack).target,
        expected,
        "\nFailed for haystack: {}\n",
        haystack
    );
}

fn check_token(haystack: &str, expected: Option<&str>) {
    let extractor = FieldExtractor::new().expect("Failed to build extractor");
    assert_eq!(
        extractor.extract(haystack).token.as_deref(),
        expected,
        "\nFailed for haystack: {}\n",
        haystack
    );
}

#[test]
fn test_ipv4_variations() {
    check_ips(
        "Standard: 8.8.8.8, LAN: 192.168.1.1, Loop: 127.0.0.1",
        &["8.8.8.8", "192.168.1.1", "127.0.0.1"],
    );
}

#[test]
fn test_octets_are_not_range_checked() {
    check_ips("bogus 999.300.256.1 here", &["999.300.256.1"]);
}

#[test]
fn test_duplicates_preserved_in_order() {
    check_ips(
        "10.0.0.1 -> 10.0.0.2 -> 10.0.0.1",
        &["10.0.0.1", "10.0.0.2", "10.0.0.1"],
    );
}

#[test]
fn test_ip_word_boundaries() {
    // glued to a word on the left
    check_ips("host1.2.3.4", &[]);
    // too many digits in the first octet
    check_ips("1234.1.1.1", &[]);
    // a fifth component only truncates the match
    check_ips("version 1.2.3.4.5", &["1.2.3.4"]);
    // punctuation is a boundary
    check_ips("(10.1.2.3),[10.1.2.4]", &["10.1.2.3", "10.1.2.4"]);
}

#[test]
fn test_no_ips() {
    check_ips("nothing to see here 1.2.3", &[]);
}

#[test]
fn test_target_rightmost_wins() {
    check_target("[first.example] then [second.example]", Some("second.example"));
}

#[test]
fn test_target_rejects_whitespace() {
    check_target("[with space]", None);
    check_target("[]", None);
    check_target("no brackets at all", None);
}

#[test]
fn test_target_greedy_adjacent_groups() {
    check_target("[a][b]", Some("a][b"));
}

#[test]
fn test_token_last_occurrence() {
    let line = format!("2024-01-01 10:00:00 [{}.example.test] {}", TOKEN, TOKEN);
    let expected = format!(" {}", TOKEN);
    check_token(&line, Some(&expected));

    let line = format!("{} and later {}", TOKEN, OTHER_TOKEN);
    let expected = format!(" {}", OTHER_TOKEN);
    check_token(&line, Some(&expected));
}

#[test]
fn test_token_length_and_alphabet() {
    // one short
    check_token(&TOKEN[..32], None);
    // uppercase is outside the alphabet
    check_token(&TOKEN.to_uppercase(), None);
    // a longer run still yields its first 33 characters
    let long = format!("{}zz", TOKEN);
    let expected = format!(" {}", TOKEN);
    check_token(&long, Some(&expected));
}

#[test]
fn test_interaction_line() {
    let extractor = FieldExtractor::new().unwrap();
    let line = format!(
        "2024-01-01 10:00:00 IDs: [example.test] 192.168.0.1 dns 192.168.0.1 {}",
        TOKEN
    );
    let fields = extractor.extract(&line);

    assert_eq!(fields.ips, vec!["192.168.0.1", "192.168.0.1"]);
    assert_eq!(fields.target, Some("example.test"));
    assert_eq!(fields.token, Some(format!(" {}", TOKEN)));
    assert!(!fields.is_empty());
}

#[test]
fn test_non_ascii_line() {
    let extractor = FieldExtractor::new().unwrap();
    let fields = extractor.extract("żółw 10.0.0.1 [ścieżka] ünïcode");
    assert_eq!(fields.ips, vec!["10.0.0.1"]);
    assert_eq!(fields.target, Some("ścieżka"));
    assert_eq!(fields.token, None);
}
