//! Range streaming: ordering, truncation, cache-only, failures, hybrid gaps.

mod common;

use common::{day, daily_log, exec, Fixture};
use lifelog_core::{Direction, Lifelog};
use lifelog_sync::{
    DailyStreamer, FailureScope, GapPlanner, HybridStreamer, RangeRequest, RangeStreamingStrategy,
    StrategyKind,
};

// ── 1. Reference scenario ────────────────────────────────────────────

#[test]
fn two_day_range_ascending_with_empty_cache() {
    for kind in StrategyKind::ALL {
        let fx = Fixture::new();
        fx.seed([daily_log(day(13)), daily_log(day(14))]);

        let request = RangeRequest::new(day(13), day(14)).with_direction(Direction::Asc);
        let output = fx.strategy(kind).stream_range(&request);

        assert_eq!(output.ids(), vec!["log_2023-07-13", "log_2023-07-14"], "{kind}");
        assert!(output.is_complete(), "{kind}");
        for d in [13, 14] {
            let entry = fx.entry(day(d)).unwrap();
            assert_eq!(entry.logs, vec![daily_log(day(d))], "{kind}");
        }
        assert_eq!(fx.remote.day_requests(exec()), 1, "{kind}: probe attempted");
        assert_eq!(fx.stamp(day(13)), Some(day(14)), "{kind}");
        assert_eq!(fx.stamp(day(14)), None, "{kind}");
    }
}

// ── 2. Ordering and truncation ───────────────────────────────────────

fn seed_three_days(fx: &Fixture) {
    fx.seed([
        Lifelog::stub("10-a", day(10)),
        Lifelog::stub("12-a", day(12)),
        Lifelog::stub("10-b", day(10)),
        Lifelog::stub("12-b", day(12)),
        Lifelog::stub("11-a", day(11)),
    ]);
}

#[test]
fn output_follows_direction_and_keeps_within_day_order() {
    for kind in StrategyKind::ALL {
        let fx = Fixture::new();
        seed_three_days(&fx);

        let desc = fx.strategy(kind).stream_range(&RangeRequest::new(day(10), day(12)));
        assert_eq!(desc.ids(), vec!["12-a", "12-b", "11-a", "10-a", "10-b"], "{kind}");

        let asc = fx
            .strategy(kind)
            .stream_range(&RangeRequest::new(day(10), day(12)).with_direction(Direction::Asc));
        assert_eq!(asc.ids(), vec!["10-a", "10-b", "11-a", "12-a", "12-b"], "{kind}");
    }
}

#[test]
fn cached_day_contents_do_not_depend_on_direction() {
    for kind in StrategyKind::ALL {
        let asc_first = Fixture::new();
        let desc_first = Fixture::new();
        seed_three_days(&asc_first);
        seed_three_days(&desc_first);

        let request = RangeRequest::new(day(10), day(12));
        asc_first
            .strategy(kind)
            .stream_range(&request.clone().with_direction(Direction::Asc));
        desc_first.strategy(kind).stream_range(&request);

        for d in 10..=12 {
            let a = asc_first.entry(day(d)).unwrap().logs;
            let b = desc_first.entry(day(d)).unwrap().logs;
            assert_eq!(a, b, "{kind}: day {d}");
        }
        let day_ten: Vec<_> = asc_first.entry(day(10)).unwrap().logs;
        assert_eq!(day_ten, vec![Lifelog::stub("10-a", day(10)), Lifelog::stub("10-b", day(10))]);
    }
}

#[test]
fn max_results_caps_output_but_not_the_cache() {
    for kind in StrategyKind::ALL {
        let fx = Fixture::new();
        seed_three_days(&fx);

        let output = fx
            .strategy(kind)
            .stream_range(&RangeRequest::new(day(10), day(12)).with_max_results(3));

        assert_eq!(output.ids(), vec!["12-a", "12-b", "11-a"], "{kind}");
        assert_eq!(fx.entry(day(10)).unwrap().logs.len(), 2, "{kind}");
    }
}

#[test]
fn range_past_today_is_clamped() {
    for kind in StrategyKind::ALL {
        let fx = Fixture::new();
        fx.seed([daily_log(day(14)), daily_log(exec()), daily_log(day(17))]);

        let output = fx.strategy(kind).stream_range(&RangeRequest::new(day(14), day(20)));

        assert_eq!(output.ids(), vec!["log_2023-07-15", "log_2023-07-14"], "{kind}");
        assert!(fx.entry(day(16)).is_none(), "{kind}");
        assert!(fx.entry(day(17)).is_none(), "{kind}");
    }
}

#[test]
fn parallel_daily_matches_sequential() {
    let sequential = Fixture::new();
    let parallel = Fixture::new();
    for fx in [&sequential, &parallel] {
        fx.seed((1..=14).map(|d| daily_log(day(d))));
    }

    let request = RangeRequest::new(day(1), day(14)).with_direction(Direction::Asc);
    let a = DailyStreamer::new(sequential.ctx.clone()).stream_range(&request);
    let b = DailyStreamer::new(parallel.ctx.clone())
        .with_workers(4)
        .stream_range(&request);

    assert_eq!(a.ids(), b.ids());
    assert_eq!(a.logs.len(), 14);
    for d in 1..14 {
        assert_eq!(parallel.stamp(day(d)), sequential.stamp(day(d)));
    }
}

// ── 3. Cache-only ────────────────────────────────────────────────────

#[test]
fn cache_only_returns_cached_logs_verbatim() {
    for kind in StrategyKind::ALL {
        let fx = Fixture::new();
        fx.cache(day(14), vec![Lifelog::stub("untrusted", day(14))], None);
        fx.cache(day(16), vec![Lifelog::stub("ahead", day(16))], None);
        fx.seed([Lifelog::stub("upstream", day(14))]);

        let output = fx
            .strategy(kind)
            .stream_range(&RangeRequest::new(day(13), day(16)).cache_only());

        assert_eq!(output.ids(), vec!["ahead", "untrusted"], "{kind}");
        assert_eq!(fx.remote.request_count(), 0, "{kind}");
        assert!(fx.entry(day(13)).is_none(), "{kind}");
    }
}

// ── 4. Failure isolation ─────────────────────────────────────────────

#[test]
fn failed_day_does_not_abort_siblings() {
    let fx = Fixture::new();
    fx.seed((10..=13).map(|d| daily_log(day(d))));
    fx.remote.fail_on(day(12));

    let output = fx
        .strategy(StrategyKind::PerDay)
        .stream_range(&RangeRequest::new(day(10), day(13)));

    assert_eq!(output.ids(), vec!["log_2023-07-13", "log_2023-07-11", "log_2023-07-10"]);
    assert_eq!(output.failures.len(), 1);
    assert_eq!(output.failures[0].scope, FailureScope::Day(day(12)));
    assert!(fx.entry(day(12)).is_none());
    assert!(fx.entry(day(11)).is_some());
}

#[test]
fn failed_bulk_query_writes_nothing() {
    let fx = Fixture::new();
    fx.seed((10..=13).map(|d| daily_log(day(d))));
    fx.remote.fail_ranges(true);

    let output = fx
        .strategy(StrategyKind::Bulk)
        .stream_range(&RangeRequest::new(day(10), day(13)));

    assert!(output.logs.is_empty());
    assert_eq!(
        output.failures[0].scope,
        FailureScope::Gap {
            start: day(10),
            end: day(13)
        }
    );
    assert!((10..=13).all(|d| fx.entry(day(d)).is_none()));
}

#[test]
fn unsaved_day_is_served_but_confirms_nothing() {
    for kind in StrategyKind::ALL {
        let fx = Fixture::with_write_failures([day(13)]);
        fx.seed([daily_log(day(12)), daily_log(day(13))]);

        let output = fx.strategy(kind).stream_range(&RangeRequest::new(day(12), day(13)));

        assert_eq!(output.ids(), vec!["log_2023-07-13", "log_2023-07-12"], "{kind}");
        assert!(output.is_complete(), "{kind}");
        assert!(fx.entry(day(13)).is_none(), "{kind}");
        // Day 13's records never reached the cache, so they cannot vouch for 12.
        assert_eq!(fx.stamp(day(12)), None, "{kind}");
    }
}

// ── 5. Hybrid gaps ───────────────────────────────────────────────────

/// Days 4..=8 cached and trusted; 1..=3 becomes a bulk gap, 9..=10 a daily one.
fn hybrid_fixture() -> Fixture {
    let fx = Fixture::new();
    fx.seed((1..=10).map(|d| daily_log(day(d))));
    for d in 4..=8 {
        fx.cache(day(d), vec![daily_log(day(d))], Some(day(9)));
    }
    fx
}

#[test]
fn hybrid_fills_bulk_and_daily_gaps_concurrently() {
    let fx = hybrid_fixture();
    let hybrid = HybridStreamer::new(fx.ctx.clone())
        .with_planner(GapPlanner::default())
        .with_max_workers(3);

    let output = hybrid.stream_range(&RangeRequest::new(day(1), day(10)).with_direction(Direction::Asc));

    let expected: Vec<String> = (1..=10).map(|d| format!("log_{}", day(d))).collect();
    assert_eq!(output.ids(), expected);
    assert!(output.is_complete());

    assert_eq!(fx.remote.range_requests(), 1);
    assert_eq!(fx.remote.day_requests(day(9)), 1);
    assert_eq!(fx.remote.day_requests(day(10)), 1);
    assert!((1..=8).all(|d| fx.remote.day_requests(day(d)) == 0));

    // Gap completion order does not matter: the upgrade lifts every fetched
    // day before the latest data to the same stamp.
    for d in [1, 2, 3, 9] {
        assert_eq!(fx.stamp(day(d)), Some(day(10)), "day {d}");
    }
    assert_eq!(fx.stamp(day(10)), None);
}

#[test]
fn failed_bulk_gap_leaves_daily_gap_intact() {
    let fx = hybrid_fixture();
    fx.remote.fail_ranges(true);

    let output = fx
        .strategy(StrategyKind::Hybrid)
        .stream_range(&RangeRequest::new(day(1), day(10)).with_direction(Direction::Asc));

    let expected: Vec<String> = (4..=10).map(|d| format!("log_{}", day(d))).collect();
    assert_eq!(output.ids(), expected);
    assert_eq!(output.failures.len(), 1);
    assert_eq!(
        output.failures[0].scope,
        FailureScope::Gap {
            start: day(1),
            end: day(3)
        }
    );
    assert!((1..=3).all(|d| fx.entry(day(d)).is_none()));
}

// ── 6. Legacy entries ────────────────────────────────────────────────

#[test]
fn legacy_entry_triggers_one_refetch_and_is_rewritten() {
    for kind in StrategyKind::ALL {
        let fx = Fixture::new();
        let legacy = serde_json::to_vec(&vec![Lifelog::stub("legacy", day(12))]).unwrap();
        fx.store.insert_raw(day(12), legacy);
        fx.cache(day(13), vec![daily_log(day(13))], None);
        fx.seed([daily_log(day(12))]);

        let output = fx.strategy(kind).stream_range(&RangeRequest::new(day(12), day(12)));

        assert_eq!(output.ids(), vec!["log_2023-07-12"], "{kind}");
        assert_eq!(fx.remote.request_count(), 1, "{kind}");
        let raw = String::from_utf8(fx.store.raw(day(12)).unwrap()).unwrap();
        assert!(raw.trim_start().starts_with('{'), "{kind}");
        assert_eq!(fx.stamp(day(12)), Some(day(13)), "{kind}");

        fx.remote.clear_requests();
        fx.strategy(kind).stream_range(&RangeRequest::new(day(12), day(12)));
        let expected = if kind == StrategyKind::Bulk { 1 } else { 0 };
        assert_eq!(fx.remote.request_count(), expected, "{kind}");
    }
}
