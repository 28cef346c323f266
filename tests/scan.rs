// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Range-scan properties P1, P6 and scenarios S1, S2 driven through a
//! larger tree than `correctness.rs` bothers with, to exercise scans
//! that cross several leaf splits.

use latticekv::Table;
use std::ops::ControlFlow;

#[test]
fn p1_forward_and_reverse_scans_are_mirror_images() {
    let table: Table<u64> = Table::new();
    let mut ctx = table.context();
    let mut keys: Vec<u64> = (0..500).collect();
    // Insertion order scrambled on purpose; order must come from the
    // tree, not from insertion order.
    keys.swap(0, 499);
    keys.swap(1, 250);
    for &k in &keys {
        table.put_or_update(&mut ctx, &k.to_be_bytes(), k);
    }

    let mut forward = Vec::new();
    table.scan(&ctx, None, true, |_k, v| {
        forward.push(*v);
        ControlFlow::Continue(())
    });
    let mut reverse = Vec::new();
    table.reverse_scan(&ctx, None, true, |_k, v| {
        reverse.push(*v);
        ControlFlow::Continue(())
    });
    reverse.reverse();

    assert_eq!(forward, reverse);
    assert_eq!(forward, (0u64..500).collect::<Vec<_>>());
}

#[test]
fn p6_scan_reaches_every_key_across_many_leaf_splits() {
    let table: Table<u64> = Table::new();
    let mut ctx = table.context();
    // Fan-out is 15; this forces several levels of internal splits.
    for i in 0..5_000u64 {
        table.put_or_update(&mut ctx, &i.to_be_bytes(), i);
    }

    let mut seen = Vec::with_capacity(5_000);
    table.scan(&ctx, None, true, |_k, v| {
        seen.push(*v);
        ControlFlow::Continue(())
    });
    assert_eq!(seen.len(), 5_000);
    assert_eq!(seen, (0u64..5_000).collect::<Vec<_>>());
}

#[test]
fn s1_scan_from_each_literal_key_matches_suffix_of_sorted_order() {
    let table: Table<String> = Table::new();
    let mut ctx = table.context();
    let keys = [
        "", "0", "1", "10", "100000000", "1000000001",
        "aaaaaaaaaaaaaaaaaaaaaaaaaa", "aaaaaaaaaaaaaaabbbb",
        "aaaaaaaaaaaaaaabbbc", "xxxxxxxxy",
    ];
    for &k in &keys {
        table.put_or_update(&mut ctx, k.as_bytes(), k.to_string());
    }
    let mut sorted: Vec<&str> = keys.to_vec();
    sorted.sort();

    for (i, &start) in sorted.iter().enumerate() {
        let mut got = Vec::new();
        table.scan(&ctx, Some(start.as_bytes()), true, |k, _v| {
            got.push(String::from_utf8(k.to_vec()).unwrap());
            ControlFlow::Continue(())
        });
        assert_eq!(got, sorted[i..], "scanning from {start:?}");
    }
}

#[test]
fn s1_inclusive_flag_excludes_or_includes_the_exact_boundary_key() {
    let table: Table<String> = Table::new();
    let mut ctx = table.context();
    let keys = [
        "", "0", "1", "10", "100000000", "1000000001",
        "aaaaaaaaaaaaaaaaaaaaaaaaaa", "aaaaaaaaaaaaaaabbbb",
        "aaaaaaaaaaaaaaabbbc", "xxxxxxxxy",
    ];
    for &k in &keys {
        table.put_or_update(&mut ctx, k.as_bytes(), k.to_string());
    }

    let boundary = "aaaaaaaaaaaaaaaaaaaaaaaaaa";
    let mut inclusive = Vec::new();
    table.scan(&ctx, Some(boundary.as_bytes()), true, |k, _v| {
        inclusive.push(String::from_utf8(k.to_vec()).unwrap());
        ControlFlow::Continue(())
    });
    assert_eq!(
        inclusive,
        vec![boundary, "aaaaaaaaaaaaaaabbbb", "aaaaaaaaaaaaaaabbbc", "xxxxxxxxy"]
    );

    let mut exclusive = Vec::new();
    table.scan(&ctx, Some(boundary.as_bytes()), false, |k, _v| {
        exclusive.push(String::from_utf8(k.to_vec()).unwrap());
        ControlFlow::Continue(())
    });
    assert_eq!(exclusive, vec!["aaaaaaaaaaaaaaabbbb", "aaaaaaaaaaaaaaabbbc", "xxxxxxxxy"]);
}

#[test]
fn s2_windowed_scan_across_a_split_tree() {
    let table: Table<String> = Table::new();
    let mut ctx = table.context();
    for i in 100..200 {
        table.put_or_update(&mut ctx, format!("k{i:03}").as_bytes(), format!("v{i:03}"));
    }

    for i in (90..210).step_by(3) {
        let bound = format!("k{i:03}");
        let mut window = Vec::new();
        table.scan(&ctx, Some(bound.as_bytes()), true, |k, _v| {
            window.push(String::from_utf8(k.to_vec()).unwrap());
            if window.len() == 10 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        let start = i.max(100);
        let end = (i + 9).min(199);
        let expected: Vec<String> = (start..=end).map(|n| format!("k{n:03}")).collect();
        assert_eq!(window, expected, "window starting at i={i}");
    }
}
