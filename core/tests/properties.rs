use chrono::NaiveDate;
use proptest::prelude::*;
use wxsynccore::ingest::{HalfDay, PixelBuffer, RadarSourceFile, Segment};
use wxsynccore::math::{GeoPoint, LocalClock, OccupancyGrid};
use wxsynccore::processing::{
    compare_grids, stitch, DetectionMask, ImageryRasterizer, MatchHistory, MatchSample, PolarRasterizer,
    StitchWindow,
};
use wxsynccore::{ClassifierConfig, SyncConfig};

fn arb_file() -> impl Strategy<Value = (u32, bool, Vec<(u32, u8)>)> {
    (
        10u32..=16,
        any::<bool>(),
        prop::collection::vec((1u32..200, 0u8..16), 1..60),
    )
}

fn build_file(i: usize, (day, night, packets): (u32, bool, Vec<(u32, u8)>)) -> RadarSourceFile {
    let segments = packets
        .into_iter()
        .map(|(p, cat)| Segment::new(p, cat, f64::from(p), 1.0, 20.0))
        .collect();
    let half = if night { HalfDay::Night } else { HalfDay::Day };
    RadarSourceFile::new(format!("radar_{i}.json"), GeoPoint::new(33.5, 126.5), segments)
        .with_half_day(half)
        .with_date(NaiveDate::from_ymd_opt(2025, 7, day).unwrap())
}

fn arb_grid(size: usize) -> impl Strategy<Value = OccupancyGrid> {
    prop::collection::vec(prop::collection::vec(0u8..2, size), size)
        .prop_map(|rows| OccupancyGrid::from_rows(&rows).unwrap())
}

fn is_binary(grid: &OccupancyGrid) -> bool {
    grid.cells().iter().all(|&v| v <= 1)
}

proptest! {
    #[test]
    fn stitched_chunks_are_strictly_increasing(
        files in prop::collection::vec(arb_file(), 1..5),
        full in any::<bool>(),
    ) {
        let files: Vec<_> = files.into_iter().enumerate().map(|(i, f)| build_file(i, f)).collect();
        let window = if full { StitchWindow::FullFiles } else { StitchWindow::LatestDay };
        let outcome = stitch(&files, window, LocalClock::default());
        let chunks = outcome.timeline.chunks();

        for pair in chunks.windows(2) {
            prop_assert!(pair[0].packet_end < pair[1].packet_start);
            prop_assert_eq!(pair[0].packet_end + 1, pair[1].packet_start);
            prop_assert!(pair[0].start_sec <= pair[1].start_sec);
        }
        if let Some(first) = chunks.first() {
            prop_assert_eq!(first.packet_start, 1);
        }
        prop_assert_eq!(outcome.index.max_packet(), outcome.timeline.max_packet());

        for (packet, segments) in outcome.index.iter() {
            let owners = chunks.iter().filter(|c| c.contains(packet)).count();
            prop_assert_eq!(owners, 1);
            prop_assert!(segments.iter().all(|s| s.packet == packet));
        }
    }

    #[test]
    fn polar_grid_is_binary(
        arcs in prop::collection::vec((0u8..16, 0.0f64..360.0, 0.0f64..150.0, 0.0f64..150.0), 0..40),
        size in 1usize..40,
    ) {
        let config = SyncConfig { grid_size: size, ..Default::default() };
        let raster = PolarRasterizer::new(&config, GeoPoint::new(33.5, 126.5));
        let segments: Vec<_> = arcs
            .into_iter()
            .map(|(cat, bearing, a, b)| Segment::new(1, cat, bearing, a, b))
            .collect();
        let grid = raster.rasterize_segments(&segments);
        prop_assert_eq!(grid.size(), size);
        prop_assert!(is_binary(&grid));
    }

    #[test]
    fn imagery_grid_is_binary(
        pixels in prop::collection::vec(any::<u8>(), 24 * 24 * 4),
        size in 1usize..30,
    ) {
        let buffer = PixelBuffer::from_rgba(24, 24, pixels).unwrap();
        let grid = ImageryRasterizer::new(size, ClassifierConfig::default()).rasterize_pixels(&buffer);
        prop_assert_eq!(grid.size(), size);
        prop_assert!(is_binary(&grid));
    }

    #[test]
    fn masked_counts_partition_the_mask(
        (a, b) in (1usize..16).prop_flat_map(|n| (arb_grid(n), arb_grid(n))),
        dlat in -1.0f64..1.0,
        dlon in -1.0f64..1.0,
    ) {
        let site = GeoPoint::new(33.5, 126.5);
        let reference = GeoPoint::new(33.5 + dlat, 126.5 + dlon);
        let mask = DetectionMask::new(a.size(), 250.0, site, reference);
        let stats = compare_grids(&a, &b, |x, y| mask.contains(x, y)).unwrap();

        prop_assert_eq!(stats.tp + stats.fp + stats.fn_ + stats.tn, stats.total);
        let n = a.size();
        let inside = (0..n)
            .flat_map(|y| (0..n).map(move |x| (x, y)))
            .filter(|&(x, y)| mask.contains(x, y))
            .count();
        prop_assert_eq!(stats.total, inside);
        for ratio in [stats.overall_match_ratio, stats.active_overlap_ratio, stats.precision, stats.recall] {
            prop_assert!((0.0..=1.0).contains(&ratio));
        }
        if stats.total == 0 {
            prop_assert_eq!(stats.overall_match_ratio, 0.0);
        }
    }

    #[test]
    fn locked_history_never_grows(indices in prop::collection::vec(0usize..30, 1..80)) {
        let mut history = MatchHistory::new();
        let mut locked_len = None;
        for index in indices {
            history.observe_frame(index);
            history.record(MatchSample {
                frame_index: index,
                timestamp_ms: None,
                label: format!("frame {index}"),
                match_percent: 50,
            });
            match locked_len {
                Some(len) => prop_assert_eq!(history.len(), len),
                None if history.is_locked() => locked_len = Some(history.len()),
                None => {}
            }
        }
    }
}

#[test]
fn table_lookup_matches_worked_example() {
    use wxsynccore::processing::{PacketTime, PacketTimeTable};
    let table = PacketTimeTable::new(vec![
        PacketTime { packet: 1, sec: 0.0 },
        PacketTime { packet: 2, sec: 300.0 },
        PacketTime { packet: 3, sec: 600.0 },
    ]);
    assert_eq!(table.nearest(310.0), Some(2));
}
