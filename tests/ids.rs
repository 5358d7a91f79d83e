use std::collections::HashSet;

use grove::ids::new_id;

#[test]
fn id_carries_prefix_timestamp_and_suffix() {
    let id = new_id("post");
    let parts: Vec<&str> = id.splitn(3, '_').collect();
    assert_eq!(parts.len(), 3);
    assert_eq!(parts[0], "post");
    parts[1].parse::<i64>().expect("millisecond timestamp");
    assert_eq!(parts[2].len(), 8);
    assert!(parts[2].chars().all(|c| c.is_ascii_alphanumeric()));
    assert!(!parts[2].chars().any(|c| c.is_ascii_uppercase()));
}

#[test]
fn ids_in_a_tight_loop_do_not_collide() {
    let mut seen = HashSet::new();
    for _ in 0..1000 {
        assert!(seen.insert(new_id("opt")), "duplicate id generated");
    }
}
