//! Flow estimation from tapped motion commands.
//!
//! Ingestion happens on the command-dispatch context, queries on the control
//! tick context; the segment buffer is the one resource shared across both.
//! The mutex guards only the bounded append/evict/read section: no I/O and
//! no logging happen while it is held.

use crate::config::LookaheadCfg;
use crate::gcode::GcodeCommand;
use std::collections::VecDeque;
use std::sync::Mutex;

/// One parsed extruding move, volume precomputed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSegment {
    pub extruded_mm3: f32,
    pub duration_ms: u64,
    pub start_ms: u64,
    pub expiry_ms: u64,
}

impl MotionSegment {
    #[inline]
    fn end_ms(&self) -> u64 {
        self.start_ms.saturating_add(self.duration_ms)
    }
}

#[derive(Debug)]
struct EstimatorState {
    buf: VecDeque<MotionSegment>,
    /// Last commanded toolhead position, mm.
    pos: [f32; 3],
    /// Last commanded extruder position, mm of filament.
    e_pos: f32,
    absolute_e: bool,
    /// Active feed rate, mm/s.
    feed_mm_s: f32,
    last_ingest_ms: u64,
}

impl Default for EstimatorState {
    fn default() -> Self {
        Self {
            buf: VecDeque::with_capacity(64),
            pos: [0.0; 3],
            e_pos: 0.0,
            // Slicers default to absolute E; M83 switches.
            absolute_e: true,
            feed_mm_s: 0.0,
            last_ingest_ms: 0,
        }
    }
}

impl EstimatorState {
    fn evict_expired(&mut self, now_ms: u64) {
        while let Some(front) = self.buf.front() {
            if now_ms > front.expiry_ms {
                self.buf.pop_front();
            } else {
                break;
            }
        }
    }
}

pub struct FlowEstimator {
    cfg: LookaheadCfg,
    /// Filament cross-section, mm².
    area: f32,
    state: Mutex<EstimatorState>,
}

impl FlowEstimator {
    pub fn new(cfg: LookaheadCfg) -> Self {
        let area = cfg.filament_area();
        Self {
            cfg,
            area,
            state: Mutex::new(EstimatorState::default()),
        }
    }

    pub fn window_ms(&self) -> u64 {
        self.cfg.window_ms
    }

    /// Ingest one tapped command at `now_ms` (milliseconds since the session
    /// epoch). Commands older than the last-seen timestamp update parser
    /// state but never produce a segment (clock monotonicity).
    pub fn ingest(&self, cmd: &GcodeCommand, now_ms: u64) {
        let rejected = {
            let Ok(mut st) = self.state.lock() else {
                return;
            };
            match cmd {
                GcodeCommand::AbsoluteExtrusion => {
                    st.absolute_e = true;
                    false
                }
                GcodeCommand::RelativeExtrusion => {
                    st.absolute_e = false;
                    false
                }
                GcodeCommand::ResetExtruder(e) => {
                    if let Some(e) = e {
                        st.e_pos = *e;
                    }
                    false
                }
                GcodeCommand::Move(mv) => {
                    if let Some(f) = mv.f {
                        // F is mm/min on the wire.
                        st.feed_mm_s = (f / 60.0).max(0.0);
                    }
                    let target = [
                        mv.x.unwrap_or(st.pos[0]),
                        mv.y.unwrap_or(st.pos[1]),
                        mv.z.unwrap_or(st.pos[2]),
                    ];
                    let dx = target[0] - st.pos[0];
                    let dy = target[1] - st.pos[1];
                    let travel = (dx * dx + dy * dy).sqrt();
                    st.pos = target;

                    let de = match mv.e {
                        Some(e) if st.absolute_e => {
                            let d = e - st.e_pos;
                            st.e_pos = e;
                            d
                        }
                        Some(e) => {
                            st.e_pos += e;
                            e
                        }
                        None => 0.0,
                    };
                    if de <= 0.0 || st.feed_mm_s <= 0.0 {
                        false
                    } else if now_ms < st.last_ingest_ms {
                        true
                    } else {
                        // E-only moves (retraction refills, purges) take their
                        // length from the extrusion itself.
                        let length = if travel > 0.0 { travel } else { de };
                        let duration_ms = ((length / st.feed_mm_s) * 1_000.0) as u64;
                        let duration_ms = duration_ms.max(self.cfg.min_move_ms);
                        let seg = MotionSegment {
                            extruded_mm3: de * self.area,
                            duration_ms,
                            start_ms: now_ms,
                            expiry_ms: now_ms.saturating_add(self.cfg.window_ms),
                        };
                        st.last_ingest_ms = now_ms;
                        st.evict_expired(now_ms);
                        st.buf.push_back(seg);
                        false
                    }
                }
                GcodeCommand::Other => false,
            }
        };
        if rejected {
            tracing::trace!("stale motion command rejected (non-monotonic timestamp)");
        }
    }

    /// Flow of the most recently completed segment, mm³/s. Expired segments
    /// are evicted first and never contribute.
    pub fn current_flow(&self, now_ms: u64) -> f32 {
        let Ok(mut st) = self.state.lock() else {
            return 0.0;
        };
        st.evict_expired(now_ms);
        st.buf
            .iter()
            .rev()
            .find(|seg| seg.end_ms() <= now_ms)
            .map(|seg| seg.extruded_mm3 / (seg.duration_ms.max(1) as f32 / 1_000.0))
            .unwrap_or(0.0)
    }

    /// Volume of buffered segments intersecting `[now, now+horizon]`,
    /// divided by the horizon, mm³/s.
    pub fn predicted_flow(&self, now_ms: u64, horizon_ms: u64) -> f32 {
        if horizon_ms == 0 {
            return 0.0;
        }
        let Ok(mut st) = self.state.lock() else {
            return 0.0;
        };
        st.evict_expired(now_ms);
        let end = now_ms.saturating_add(horizon_ms);
        let mut volume = 0.0f32;
        for seg in &st.buf {
            let seg_end = seg.end_ms();
            let lo = seg.start_ms.max(now_ms);
            let hi = seg_end.min(end);
            if hi <= lo {
                continue;
            }
            let overlap = (hi - lo) as f32 / seg.duration_ms.max(1) as f32;
            volume += seg.extruded_mm3 * overlap.min(1.0);
        }
        volume / (horizon_ms as f32 / 1_000.0)
    }

    /// Number of live (unexpired) segments.
    pub fn segment_count(&self, now_ms: u64) -> usize {
        let Ok(mut st) = self.state.lock() else {
            return 0;
        };
        st.evict_expired(now_ms);
        st.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gcode::parse;

    fn estimator() -> FlowEstimator {
        FlowEstimator::new(LookaheadCfg::default())
    }

    #[test]
    fn extruding_move_produces_segment() {
        let est = estimator();
        est.ingest(&parse("G92 E0"), 0);
        est.ingest(&parse("G1 X10 E1.0 F600"), 0);
        // 10 mm at 10 mm/s = 1000 ms
        assert_eq!(est.segment_count(0), 1);
        let predicted = est.predicted_flow(0, 1_000);
        let area = LookaheadCfg::default().filament_area();
        let expected = 1.0 * area; // 1 mm of filament over 1 s
        assert!((predicted - expected).abs() < 1e-4);
    }

    #[test]
    fn retraction_produces_no_segment() {
        let est = estimator();
        est.ingest(&parse("M83"), 0);
        est.ingest(&parse("G1 E-2.0 F1800"), 0);
        assert_eq!(est.segment_count(0), 0);
    }

    #[test]
    fn expired_segments_never_observable() {
        let est = estimator();
        est.ingest(&parse("M83"), 0);
        est.ingest(&parse("G1 X5 E0.5 F3000"), 0);
        assert_eq!(est.segment_count(0), 1);
        let window = est.window_ms();
        assert_eq!(est.predicted_flow(window + 1, 1_000), 0.0);
        assert_eq!(est.segment_count(window + 1), 0);
    }

    #[test]
    fn zero_distance_move_floor_clamped() {
        let est = estimator();
        est.ingest(&parse("M83"), 0);
        // Zero XY travel, tiny E at high feed: duration clamps to min_move_ms.
        est.ingest(&parse("G1 E0.001 F99999"), 0);
        assert_eq!(est.segment_count(0), 1);
        let flow = est.current_flow(LookaheadCfg::default().min_move_ms + 1);
        assert!(flow.is_finite());
    }

    #[test]
    fn stale_timestamp_rejected() {
        let est = estimator();
        est.ingest(&parse("M83"), 0);
        est.ingest(&parse("G1 X5 E0.5 F3000"), 100);
        est.ingest(&parse("G1 X10 E0.5 F3000"), 50); // older than last-seen
        assert_eq!(est.segment_count(100), 1);
    }

    #[test]
    fn current_flow_uses_completed_segment_only() {
        let est = estimator();
        est.ingest(&parse("M83"), 0);
        est.ingest(&parse("G1 X30 E3.0 F600"), 0); // 3 s long
        assert_eq!(est.current_flow(1_000), 0.0); // still executing
        let flow = est.current_flow(1_999);
        assert_eq!(flow, 0.0);
    }

    #[test]
    fn absolute_mode_tracks_e_axis() {
        let est = estimator();
        est.ingest(&parse("M82"), 0);
        est.ingest(&parse("G92 E0"), 0);
        est.ingest(&parse("G1 X10 E2.0 F1200"), 0);
        est.ingest(&parse("G1 X20 E4.0 F1200"), 500);
        assert_eq!(est.segment_count(500), 2);
        // Second segment extrudes 2 mm, same as the first.
        let p1 = est.predicted_flow(0, 500);
        assert!(p1 > 0.0);
    }
}
