use serde::Serialize;

/// Clock time of one global packet, in seconds since local midnight of the base day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PacketTime {
    pub packet: u32,
    pub sec: f64,
}

/// Packet clock times in packet order, built once per timeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PacketTimeTable {
    rows: Vec<PacketTime>,
}

impl PacketTimeTable {
    pub fn new(rows: Vec<PacketTime>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[PacketTime] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Packet closest in time to `sec`; ties go to the earliest row.
    pub fn nearest(&self, sec: f64) -> Option<u32> {
        let mut best: Option<(u32, f64)> = None;
        for row in &self.rows {
            let diff = (row.sec - sec).abs();
            if best.map_or(true, |(_, d)| diff < d) {
                best = Some((row.packet, diff));
            }
        }
        best.map(|(packet, _)| packet)
    }

    /// Number of packets timed in `(min(a, b), max(a, b)]`.
    pub fn count_in(&self, a: f64, b: f64) -> usize {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        self.rows.iter().filter(|r| r.sec > lo && r.sec <= hi).count()
    }
}

/// Packet chosen by frame position alone.
pub fn proportional_packet(frame_index: usize, frame_count: usize, max_packet: u32) -> u32 {
    if frame_count <= 1 || max_packet <= 1 {
        return 1;
    }
    let ratio = frame_index as f64 / (frame_count - 1) as f64;
    let packet = (1.0 + ratio * f64::from(max_packet - 1)).round();
    packet.max(1.0) as u32
}

/// One frame change as seen by the mapper.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTick {
    pub index: usize,
    pub count: usize,
    /// Frame time in the same seconds axis as the packet table.
    pub sec: Option<f64>,
}

/// Inclusive range of global packets merged for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PacketWindow {
    pub start: u32,
    pub end: u32,
}

impl PacketWindow {
    pub fn ending_at(packet: u32, trail: usize) -> Self {
        let back = u32::try_from(trail.max(1) - 1).unwrap_or(u32::MAX);
        Self {
            start: packet.saturating_sub(back).max(1),
            end: packet,
        }
    }

    pub fn len(&self) -> u32 {
        self.end + 1 - self.start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PacketSelection {
    pub packet: u32,
    pub trail: usize,
    pub window: PacketWindow,
}

/// Tracks the dynamic trail between ticks.
#[derive(Debug, Clone)]
pub struct FrameMapper {
    default_trail: usize,
    trail: usize,
    last_index: Option<usize>,
    last_sec: Option<f64>,
}

impl FrameMapper {
    pub fn new(default_trail: usize) -> Self {
        let default_trail = default_trail.max(1);
        Self {
            default_trail,
            trail: default_trail,
            last_index: None,
            last_sec: None,
        }
    }

    pub fn reset(&mut self) {
        self.trail = self.default_trail;
        self.last_index = None;
        self.last_sec = None;
    }

    pub fn map_frame(
        &mut self,
        tick: FrameTick,
        table: Option<&PacketTimeTable>,
        max_packet: u32,
    ) -> PacketSelection {
        let table = table.filter(|t| !t.is_empty());
        let packet = match (table, tick.sec) {
            (Some(table), Some(sec)) => table.nearest(sec),
            _ => None,
        }
        .unwrap_or_else(|| proportional_packet(tick.index, tick.count, max_packet));

        match self.last_index {
            None => self.trail = self.default_trail,
            Some(last) if tick.index < last => self.trail = self.default_trail,
            Some(last) if tick.index > last => {
                if let (Some(table), Some(prev), Some(cur)) = (table, self.last_sec, tick.sec) {
                    self.trail = table.count_in(prev, cur).max(1);
                }
            }
            Some(_) => {}
        }
        self.last_index = Some(tick.index);
        self.last_sec = tick.sec;

        PacketSelection {
            packet,
            trail: self.trail,
            window: PacketWindow::ending_at(packet, self.trail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(secs: &[f64]) -> PacketTimeTable {
        PacketTimeTable::new(
            secs.iter()
                .enumerate()
                .map(|(i, &sec)| PacketTime {
                    packet: i as u32 + 1,
                    sec,
                })
                .collect(),
        )
    }

    fn tick(index: usize, sec: f64) -> FrameTick {
        FrameTick {
            index,
            count: 10,
            sec: Some(sec),
        }
    }

    #[test]
    fn nearest_packet_prefers_earliest_on_ties() {
        let t = table(&[0.0, 300.0, 600.0]);
        assert_eq!(t.nearest(310.0), Some(2));
        assert_eq!(t.nearest(150.0), Some(1));
        assert_eq!(t.nearest(10_000.0), Some(3));
        assert_eq!(PacketTimeTable::default().nearest(1.0), None);
    }

    #[test]
    fn proportional_fallback() {
        assert_eq!(proportional_packet(0, 10, 100), 1);
        assert_eq!(proportional_packet(9, 10, 100), 100);
        assert_eq!(proportional_packet(3, 7, 13), 7);
        assert_eq!(proportional_packet(5, 1, 100), 1);
        assert_eq!(proportional_packet(5, 10, 1), 1);
    }

    #[test]
    fn trail_counts_packets_crossed_since_last_tick() {
        let t = table(&[0.0, 60.0, 120.0, 180.0, 240.0, 300.0]);
        let mut mapper = FrameMapper::new(3);

        let first = mapper.map_frame(tick(0, 0.0), Some(&t), 6);
        assert_eq!(first.trail, 3);
        assert_eq!(first.window, PacketWindow { start: 1, end: 1 });

        let second = mapper.map_frame(tick(1, 185.0), Some(&t), 6);
        assert_eq!(second.packet, 4);
        assert_eq!(second.trail, 3);
        assert_eq!(second.window, PacketWindow { start: 2, end: 4 });

        let small = mapper.map_frame(tick(2, 200.0), Some(&t), 6);
        assert_eq!(small.trail, 1);

        let repeat = mapper.map_frame(tick(2, 200.0), Some(&t), 6);
        assert_eq!(repeat.trail, 1);

        let back = mapper.map_frame(tick(0, 0.0), Some(&t), 6);
        assert_eq!(back.trail, 3);
    }

    #[test]
    fn trail_resets_without_time_table() {
        let mut mapper = FrameMapper::new(2);
        let a = mapper.map_frame(FrameTick { index: 4, count: 10, sec: None }, None, 50);
        assert_eq!(a.trail, 2);
        let b = mapper.map_frame(FrameTick { index: 5, count: 10, sec: None }, None, 50);
        assert_eq!(b.trail, 2);
        assert_eq!(b.packet, proportional_packet(5, 10, 50));
        mapper.reset();
        let after = mapper.map_frame(FrameTick { index: 9, count: 10, sec: Some(10.0) }, None, 50);
        assert_eq!(after.trail, 2);
    }

    #[test]
    fn window_is_clamped_at_first_packet() {
        assert_eq!(PacketWindow::ending_at(2, 5), PacketWindow { start: 1, end: 2 });
        assert_eq!(PacketWindow::ending_at(10, 0).len(), 1);
    }
}
