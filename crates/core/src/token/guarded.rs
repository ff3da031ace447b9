//! Interaction-record token for guarded projects.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::Rng;
use tokio::time::Instant;

/// Size of the packed interaction record.
pub const RECORD_LEN: usize = 16;

/// Browser window geometry reported in every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowProfile {
    pub scroll_x: u16,
    pub scroll_y: u16,
    pub inner_width: u16,
    pub inner_height: u16,
    pub outer_width: u16,
    pub outer_height: u16,
    pub screen_x: u16,
    pub screen_height: u16,
    pub avail_width: u16,
}

impl Default for WindowProfile {
    fn default() -> Self {
        Self {
            scroll_x: 0,
            scroll_y: 0,
            inner_width: 1578,
            inner_height: 690,
            outer_width: 1578,
            outer_height: 690,
            screen_x: 1699,
            screen_height: 834,
            avail_width: 1578,
        }
    }
}

/// One snapshot of interaction statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InteractionStats {
    pub touch_count: u32,
    pub visible_count: u32,
    pub unload_count: u32,
    pub stay_secs: u64,
    pub since_anchor_secs: u64,
    pub window: WindowProfile,
}

fn clamp_u8(value: u64) -> u8 {
    value.min(u8::MAX as u64) as u8
}

fn clamp_u16(value: u64) -> [u8; 2] {
    (value.min(u16::MAX as u64) as u16).to_le_bytes()
}

/// Pack interaction statistics into the fixed 16-byte record.
///
/// Layout (offset: field):
/// `0` touches, `1` scroll x, `2` visibility changes, `3` scroll y,
/// `4` inner width, `5` unload counter, `6` inner height, `7` outer width,
/// `8..10` stay seconds (u16 LE), `10..12` seconds since anchor (u16 LE),
/// `12` outer height, `13` screen x. Slots `14` and `15` carry the fallback
/// field: scroll y when bit 2 of the screen height is set, otherwise the
/// available width. Values larger than their slot are clamped.
pub fn pack_record(stats: &InteractionStats) -> [u8; RECORD_LEN] {
    let w = &stats.window;
    let mut buf = [0u8; RECORD_LEN];

    buf[0] = clamp_u8(stats.touch_count as u64);
    buf[1] = clamp_u8(w.scroll_x as u64);
    buf[2] = clamp_u8(stats.visible_count as u64);
    buf[3] = clamp_u8(w.scroll_y as u64);
    buf[4] = clamp_u8(w.inner_width as u64);
    buf[5] = clamp_u8(stats.unload_count as u64);
    buf[6] = clamp_u8(w.inner_height as u64);
    buf[7] = clamp_u8(w.outer_width as u64);
    buf[8..10].copy_from_slice(&clamp_u16(stats.stay_secs));
    buf[10..12].copy_from_slice(&clamp_u16(stats.since_anchor_secs));
    buf[12] = clamp_u8(w.outer_height as u64);
    buf[13] = clamp_u8(w.screen_x as u64);

    let fallback = if w.screen_height & 4 != 0 {
        w.scroll_y
    } else {
        w.avail_width
    };
    buf[14] = clamp_u8(fallback as u64);
    buf[15] = clamp_u8(fallback as u64);

    buf
}

/// Stateful generator for guarded projects.
///
/// Every call bumps the interaction counter, so one generator belongs to one
/// routine and is never shared.
#[derive(Debug)]
pub struct GuardedGenerator {
    began: Instant,
    generated: u32,
    window: WindowProfile,
}

impl GuardedGenerator {
    pub fn new() -> Self {
        Self::with_window(WindowProfile::default())
    }

    pub fn with_window(window: WindowProfile) -> Self {
        Self {
            began: Instant::now(),
            generated: 0,
            window,
        }
    }

    /// Number of tokens produced so far.
    pub fn generated(&self) -> u32 {
        self.generated
    }

    pub fn prepare_stage_token(&mut self) -> String {
        let mut rng = rand::thread_rng();
        let stats = InteractionStats {
            touch_count: rng.gen_range(3..10),
            visible_count: rng.gen_range(3..5),
            unload_count: self.generated,
            stay_secs: self.began.elapsed().as_secs(),
            since_anchor_secs: 0,
            window: self.window,
        };
        self.emit(&stats)
    }

    pub fn create_stage_token(&mut self, anchor: Instant) -> String {
        let mut rng = rand::thread_rng();
        let stats = InteractionStats {
            touch_count: rng.gen_range(3..10),
            visible_count: rng.gen_range(3..16),
            unload_count: self.generated,
            stay_secs: self.began.elapsed().as_secs(),
            since_anchor_secs: Instant::now().saturating_duration_since(anchor).as_secs(),
            window: self.window,
        };
        self.emit(&stats)
    }

    fn emit(&mut self, stats: &InteractionStats) -> String {
        let token = STANDARD.encode(pack_record(stats));
        self.generated = self.generated.saturating_add(1);
        token
    }
}

impl Default for GuardedGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats() -> InteractionStats {
        InteractionStats {
            touch_count: 5,
            visible_count: 3,
            unload_count: 2,
            stay_secs: 300,
            since_anchor_secs: 12,
            window: WindowProfile::default(),
        }
    }

    #[test]
    fn test_pack_record_layout() {
        let record = pack_record(&stats());

        assert_eq!(record[0], 5);
        assert_eq!(record[2], 3);
        assert_eq!(record[5], 2);
        assert_eq!(u16::from_le_bytes([record[8], record[9]]), 300);
        assert_eq!(u16::from_le_bytes([record[10], record[11]]), 12);
        // window dimensions exceed one byte
        assert_eq!(record[4], 255);
        assert_eq!(record[13], 255);
    }

    #[test]
    fn test_pack_record_clamps_wide_fields() {
        let mut s = stats();
        s.stay_secs = 1_000_000;
        s.touch_count = 4000;
        let record = pack_record(&s);

        assert_eq!(record[0], 255);
        assert_eq!(u16::from_le_bytes([record[8], record[9]]), u16::MAX);
    }

    #[test]
    fn test_pack_record_fallback_slots() {
        let mut s = stats();
        s.window.screen_height = 4;
        s.window.scroll_y = 17;
        let record = pack_record(&s);
        assert_eq!(record[14], 17);
        assert_eq!(record[15], 17);

        s.window.screen_height = 8;
        s.window.avail_width = 99;
        let record = pack_record(&s);
        assert_eq!(record[14], 99);
        assert_eq!(record[15], 99);
    }

    #[test]
    fn test_counter_increments_every_call() {
        let mut generator = GuardedGenerator::new();
        let first = generator.prepare_stage_token();
        let _ = generator.create_stage_token(Instant::now());
        let third = generator.prepare_stage_token();

        assert_eq!(generator.generated(), 3);

        let decode = |t: &str| STANDARD.decode(t).unwrap();
        assert_eq!(decode(&first).len(), RECORD_LEN);
        assert_eq!(decode(&first)[5], 0);
        assert_eq!(decode(&third)[5], 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_token_reports_time_since_anchor() {
        let mut generator = GuardedGenerator::new();
        let anchor = Instant::now();
        tokio::time::advance(std::time::Duration::from_secs(7)).await;

        let token = generator.create_stage_token(anchor);
        let record = STANDARD.decode(token).unwrap();
        assert_eq!(u16::from_le_bytes([record[10], record[11]]), 7);
    }
}
