//! Property-based tests for the harness bookkeeping.

use aviutl2_conformance::session::InputInfoSnapshot;
use aviutl2_conformance::{CheckOutcome, CheckStatus, ConformanceError, ConformanceReport, TrackMonitor};
use aviutl2_sys::input::{TRACK_QUERY_COUNT, track_type};
use aviutl2_sys::{BitmapInfoHeader, InputInfoFlags, video_format};
use proptest::prelude::*;

fn status_strategy() -> impl Strategy<Value = CheckStatus> {
    prop_oneof![
        Just(CheckStatus::Pass),
        Just(CheckStatus::Fail),
        Just(CheckStatus::Gap),
        Just(CheckStatus::Skipped),
    ]
}

fn call_strategy() -> impl Strategy<Value = (i32, i32)> {
    (
        prop_oneof![Just(track_type::VIDEO), Just(track_type::AUDIO)],
        prop_oneof![Just(TRACK_QUERY_COUNT), 0i32..4],
    )
}

fn snapshot(width: i32, height: i32, bits: u16) -> InputInfoSnapshot {
    InputInfoSnapshot {
        flags: InputInfoFlags::VIDEO,
        rate: 30,
        scale: 1,
        frames: 1,
        format: Some(BitmapInfoHeader {
            size: 40,
            width,
            height,
            planes: 1,
            bit_count: bits,
            compression: video_format::BI_RGB,
            ..BitmapInfoHeader::default()
        }),
        samples: 0,
        audio_format: None,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_report_counts_partition_outcomes(statuses in prop::collection::vec(status_strategy(), 0..32)) {
        let mut report = ConformanceReport::new("p", 1, false);
        for (i, status) in statuses.iter().enumerate() {
            report.push(CheckOutcome {
                name: format!("check-{i}"),
                status: *status,
                detail: String::new(),
            });
        }
        let [pass, fail, gap, skipped] = report.counts();
        prop_assert_eq!(pass + fail + gap + skipped, statuses.len());
        prop_assert_eq!(report.failures(), fail);

        let strict = ConformanceReport { strict: true, ..report };
        prop_assert_eq!(strict.failures(), fail + gap + skipped);
        prop_assert_eq!(strict.passed(), pass == statuses.len());
    }

    #[test]
    fn prop_track_monitor_accepts_each_call_once(calls in prop::collection::vec(call_strategy(), 0..12)) {
        let mut tracks = TrackMonitor::default();
        let mut seen = std::collections::HashSet::new();
        for (kind, index) in calls {
            let key = (kind, index == TRACK_QUERY_COUNT);
            let accepted = matches!(tracks.record(kind, index), Ok(()));
            prop_assert_eq!(accepted, seen.insert(key));
        }
        let selections = tracks.selections(track_type::VIDEO) + tracks.selections(track_type::AUDIO);
        prop_assert!(selections <= 2);
    }

    #[test]
    fn prop_no_track_calls_after_read(kind in prop_oneof![Just(track_type::VIDEO), Just(track_type::AUDIO)], index in -1i32..4) {
        let mut tracks = TrackMonitor::default();
        tracks.read();
        let refused = matches!(tracks.record(kind, index), Err(ConformanceError::Contract(_)));
        prop_assert!(refused);
    }

    #[test]
    fn prop_rgb_rows_are_dword_aligned(width in 1i32..512, height in -64i32..64, bits in prop_oneof![Just(24u16), Just(32u16)]) {
        let info = snapshot(width, height, bits);
        let size = info.frame_size();
        let rows = usize::try_from(height.unsigned_abs())?;
        if rows == 0 {
            prop_assert_eq!(size, 0);
        } else {
            prop_assert_eq!(size % rows, 0);
            let stride = size / rows;
            prop_assert_eq!(stride % 4, 0);
            let min = usize::try_from(width)? * usize::from(bits) / 8;
            prop_assert!(stride >= min && stride < min + 4);
        }
    }
}
