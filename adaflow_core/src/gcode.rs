//! Minimal motion-command parser for the command tap.
//!
//! Only the words the flow estimator needs are decoded: linear moves with
//! their axis/extrusion/feed parameters, extrusion-mode switches, and
//! extruder resets. Everything else passes through as `Other`.

/// Axis words of a `G0`/`G1` move. Absent words leave the axis unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MoveCmd {
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub z: Option<f32>,
    pub e: Option<f32>,
    /// Feed rate in mm/min, as written on the wire.
    pub f: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GcodeCommand {
    Move(MoveCmd),
    /// `M82`
    AbsoluteExtrusion,
    /// `M83`
    RelativeExtrusion,
    /// `G92` with an `E` word; `None` means E was not reset.
    ResetExtruder(Option<f32>),
    /// Anything the estimator does not care about.
    Other,
}

/// Parse one G-code line. Comments (`;`) are stripped; parsing is
/// case-insensitive on the command word.
pub fn parse(line: &str) -> GcodeCommand {
    let code = match line.split(';').next() {
        Some(c) => c.trim(),
        None => return GcodeCommand::Other,
    };
    if code.is_empty() {
        return GcodeCommand::Other;
    }
    let mut words = code.split_ascii_whitespace();
    let Some(cmd) = words.next() else {
        return GcodeCommand::Other;
    };
    match cmd.to_ascii_uppercase().as_str() {
        "G0" | "G1" => {
            let mut mv = MoveCmd::default();
            for w in words {
                let Some((axis, value)) = split_word(w) else {
                    continue;
                };
                match axis {
                    'X' => mv.x = Some(value),
                    'Y' => mv.y = Some(value),
                    'Z' => mv.z = Some(value),
                    'E' => mv.e = Some(value),
                    'F' => mv.f = Some(value),
                    _ => {}
                }
            }
            GcodeCommand::Move(mv)
        }
        "M82" => GcodeCommand::AbsoluteExtrusion,
        "M83" => GcodeCommand::RelativeExtrusion,
        "G92" => {
            let mut e = None;
            for w in words {
                if let Some(('E', value)) = split_word(w) {
                    e = Some(value);
                }
            }
            GcodeCommand::ResetExtruder(e)
        }
        _ => GcodeCommand::Other,
    }
}

fn split_word(word: &str) -> Option<(char, f32)> {
    let mut chars = word.chars();
    let axis = chars.next()?.to_ascii_uppercase();
    let value: f32 = chars.as_str().parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some((axis, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_extruding_move() {
        let cmd = parse("G1 X10.5 Y-2 E0.84 F3000");
        match cmd {
            GcodeCommand::Move(mv) => {
                assert_eq!(mv.x, Some(10.5));
                assert_eq!(mv.y, Some(-2.0));
                assert_eq!(mv.e, Some(0.84));
                assert_eq!(mv.f, Some(3000.0));
                assert_eq!(mv.z, None);
            }
            other => panic!("expected Move, got {other:?}"),
        }
    }

    #[test]
    fn strips_comments_and_ignores_unknown() {
        assert_eq!(parse("; pure comment"), GcodeCommand::Other);
        assert_eq!(parse("M104 S210"), GcodeCommand::Other);
        assert_eq!(
            parse("g1 z0.2 ; layer change"),
            GcodeCommand::Move(MoveCmd {
                z: Some(0.2),
                ..MoveCmd::default()
            })
        );
    }

    #[test]
    fn extrusion_mode_and_reset() {
        assert_eq!(parse("M83"), GcodeCommand::RelativeExtrusion);
        assert_eq!(parse("M82"), GcodeCommand::AbsoluteExtrusion);
        assert_eq!(parse("G92 E0"), GcodeCommand::ResetExtruder(Some(0.0)));
        assert_eq!(parse("G92 X0 Y0"), GcodeCommand::ResetExtruder(None));
    }

    #[test]
    fn malformed_words_are_skipped() {
        let cmd = parse("G1 Xabc E1.0");
        match cmd {
            GcodeCommand::Move(mv) => {
                assert_eq!(mv.x, None);
                assert_eq!(mv.e, Some(1.0));
            }
            other => panic!("expected Move, got {other:?}"),
        }
    }
}
