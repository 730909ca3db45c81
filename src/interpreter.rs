//! G-code Command Interpreter
//!
//! Classifies one raw command line at a time and turns linear moves into
//! material deltas. The interpreter is a small state machine:
//!
//! - **Coordinate mode**: `M82`/`G90` switch to absolute, `M83`/`G91` to relative
//! - **Layer index**: advanced by slicer layer markers while still on the first layer
//!
//! It never performs I/O and never blocks. The session total needed to turn
//! an absolute `E` position into an increment is passed in by the caller,
//! which owns the running sums.
//!
//! ## Layer markers
//!
//! Checked in order, only while the layer index is at most 1:
//!
//! | Marker | Produced by |
//! |---|---|
//! | `;LAYER:<n>` | Cura |
//! | `; layer <n>` | Simplify3D |
//! | `;BEFORE_LAYER_CHANGE` | Slic3r / PrusaSlicer |
//! | `M117 DASHBOARD_LAYER_INDICATOR` | Dashboard pre-processing |
//! | `M117 INDICATOR-Layer` | DisplayLayerProgress pre-processing |
//!
//! Post-processors such as DisplayLayerProgress keep the slicer comment and
//! add their own `M117` marker at the same boundary. Only the first marker
//! after a linear move advances the index, so one boundary counts once.
//!
//! Once the index passes 1 the markers are no longer evaluated until
//! [`CommandInterpreter::on_job_start`] resets it. Only the first-layer
//! boundary matters for accounting, so later layers are not counted.

use crate::error::CommandParseError;
use crate::models::{CoordinateMode, MaterialDelta};
use regex::{Regex, RegexSet};
use std::sync::OnceLock;

const LAYER_MARKERS: [&str; 5] = [
    r"^;LAYER:[0-9]+",
    r"^; layer [0-9]+",
    r"^;BEFORE_LAYER_CHANGE",
    r"^M117 DASHBOARD_LAYER_INDICATOR",
    r"^M117 INDICATOR-Layer",
];

fn layer_markers() -> &'static RegexSet {
    static MARKERS: OnceLock<RegexSet> = OnceLock::new();
    MARKERS.get_or_init(|| RegexSet::new(LAYER_MARKERS).expect("layer marker patterns are valid"))
}

fn instruction_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^([GMT])([0-9]+)(?:\.([0-9]+))?(?:\s|;|$)")
            .expect("instruction pattern is valid")
    })
}

/// Leading instruction of a command line, e.g. `G1` or `M117`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstructionCode {
    pub letter: char,
    pub number: u32,
    pub subcode: Option<u32>,
}

impl InstructionCode {
    pub fn is(&self, letter: char, number: u32) -> bool {
        self.letter == letter && self.number == number && self.subcode.is_none()
    }
}

/// One `<letter><number>` word of a command, e.g. `E1.25`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Word {
    pub letter: char,
    pub value: f64,
}

/// Extract the instruction code from a raw line; `None` for comments and blanks.
pub fn instruction_code(line: &str) -> Option<InstructionCode> {
    let caps = instruction_pattern().captures(line.trim_start())?;
    let letter = caps.get(1)?.as_str().chars().next()?.to_ascii_uppercase();
    let number = caps.get(2)?.as_str().parse().ok()?;
    let subcode = match caps.get(3) {
        Some(m) => Some(m.as_str().parse().ok()?),
        None => None,
    };

    Some(InstructionCode {
        letter,
        number,
        subcode,
    })
}

/// Split a command into words. Text after `;` is a comment.
///
/// Every whitespace-separated token must be a single letter followed by a
/// finite number; anything else is reported as a [`CommandParseError`].
pub fn parse_words(line: &str) -> Result<Vec<Word>, CommandParseError> {
    let body = line.split(';').next().unwrap_or_default().to_ascii_uppercase();

    body.split_whitespace()
        .map(|token| {
            let mut chars = token.chars();
            let letter = chars
                .next()
                .filter(char::is_ascii_alphabetic)
                .ok_or_else(|| CommandParseError::new(line.trim(), token))?;

            match chars.as_str().parse::<f64>() {
                Ok(value) if value.is_finite() => Ok(Word { letter, value }),
                _ => Err(CommandParseError::new(line.trim(), token)),
            }
        })
        .collect()
}

/// Whether the line is one of the recognised layer-change markers.
pub fn is_layer_marker(line: &str) -> bool {
    layer_markers().is_match(line.trim_start())
}

enum Instruction {
    AbsoluteMode,
    RelativeMode,
    LinearMove,
    Other,
}

fn classify(code: InstructionCode) -> Instruction {
    if code.is('M', 82) || code.is('G', 90) {
        Instruction::AbsoluteMode
    } else if code.is('M', 83) || code.is('G', 91) {
        Instruction::RelativeMode
    } else if code.is('G', 0) || code.is('G', 1) {
        Instruction::LinearMove
    } else {
        Instruction::Other
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommandInterpreter {
    coordinate_mode: CoordinateMode,
    current_layer: u32,
    /// A marker advanced the layer and no linear move has followed yet
    at_layer_boundary: bool,
}

impl CommandInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn coordinate_mode(&self) -> CoordinateMode {
        self.coordinate_mode
    }

    pub fn current_layer(&self) -> u32 {
        self.current_layer
    }

    /// Interpret one command.
    ///
    /// `cumulative` is the material already attributed to this job (session
    /// total plus unflushed pending material). It is only used in absolute
    /// mode, where the increment is `E - cumulative`.
    pub fn process(
        &mut self,
        raw: &str,
        cumulative: f64,
    ) -> Result<Option<MaterialDelta>, CommandParseError> {
        if self.current_layer <= 1 && !self.at_layer_boundary && is_layer_marker(raw) {
            self.current_layer += 1;
            self.at_layer_boundary = true;
        }

        let Some(code) = instruction_code(raw) else {
            return Ok(None);
        };

        match classify(code) {
            Instruction::AbsoluteMode => {
                self.coordinate_mode = CoordinateMode::Absolute;
                Ok(None)
            }
            Instruction::RelativeMode => {
                self.coordinate_mode = CoordinateMode::Relative;
                Ok(None)
            }
            Instruction::LinearMove => {
                self.at_layer_boundary = false;
                self.linear_move(raw, cumulative)
            }
            Instruction::Other => Ok(None),
        }
    }

    /// Forget mode and layer; called when a new job starts.
    pub fn on_job_start(&mut self) {
        self.coordinate_mode = CoordinateMode::Unknown;
        self.current_layer = 0;
        self.at_layer_boundary = false;
    }

    fn linear_move(
        &self,
        raw: &str,
        cumulative: f64,
    ) -> Result<Option<MaterialDelta>, CommandParseError> {
        let words = parse_words(raw)?;
        let Some(e) = words.iter().rev().find(|w| w.letter == 'E').map(|w| w.value) else {
            return Ok(None);
        };

        let delta = match self.coordinate_mode {
            CoordinateMode::Absolute => e - cumulative,
            CoordinateMode::Relative => e,
            CoordinateMode::Unknown => return Ok(None),
        };

        if self.current_layer == 0 {
            return Ok(None);
        }

        Ok(Some(MaterialDelta::new(delta, self.current_layer == 1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn on_first_layer() -> CommandInterpreter {
        let mut interpreter = CommandInterpreter::new();
        interpreter.process(";LAYER:0", 0.0).unwrap();
        interpreter
    }

    #[test]
    fn test_instruction_code() {
        let code = instruction_code("G1 X10 E5").unwrap();
        assert!(code.is('G', 1));

        let code = instruction_code("  m117 DASHBOARD_LAYER_INDICATOR 3").unwrap();
        assert!(code.is('M', 117));

        let code = instruction_code("G29.1").unwrap();
        assert_eq!(code.subcode, Some(1));
        assert!(!code.is('G', 29));

        assert!(instruction_code("; just a comment").is_none());
        assert!(instruction_code("").is_none());
        assert!(instruction_code("G1X10").is_none());
    }

    #[test]
    fn test_parse_words() {
        let words = parse_words("g1 x10.5 e-0.8 ; wipe").unwrap();
        assert_eq!(
            words,
            vec![
                Word { letter: 'G', value: 1.0 },
                Word { letter: 'X', value: 10.5 },
                Word { letter: 'E', value: -0.8 },
            ]
        );
    }

    #[test]
    fn test_parse_words_rejects_malformed_tokens() {
        let err = parse_words("G1 X10 E").unwrap_err();
        assert_eq!(err.token, "E");

        assert!(parse_words("G1 X10 *71").is_err());
        assert!(parse_words("G1 ENAN").is_err());
        assert!(parse_words("G1 10").is_err());
    }

    #[test]
    fn test_layer_markers() {
        assert!(is_layer_marker(";LAYER:0"));
        assert!(is_layer_marker("; layer 1, Z = 0.2"));
        assert!(is_layer_marker(";BEFORE_LAYER_CHANGE"));
        assert!(is_layer_marker("M117 DASHBOARD_LAYER_INDICATOR 1"));
        assert!(is_layer_marker("M117 INDICATOR-Layer1"));

        assert!(!is_layer_marker(";LAYER:"));
        assert!(!is_layer_marker(";AFTER_LAYER_CHANGE"));
        assert!(!is_layer_marker("M117 Printing..."));
    }

    #[test]
    fn test_layer_tracking_stops_after_first_layer() {
        let mut interpreter = CommandInterpreter::new();
        for _ in 0..5 {
            interpreter.process(";LAYER:7", 0.0).unwrap();
            interpreter.process("G0 Z1", 0.0).unwrap();
        }
        assert_eq!(interpreter.current_layer(), 2);

        interpreter.on_job_start();
        assert_eq!(interpreter.current_layer(), 0);
        assert_eq!(interpreter.coordinate_mode(), CoordinateMode::Unknown);
    }

    #[test]
    fn test_markers_at_one_boundary_count_once() {
        let mut interpreter = CommandInterpreter::new();
        interpreter.process("M83", 0.0).unwrap();
        interpreter.process(";LAYER:0", 0.0).unwrap();
        interpreter.process("M117 INDICATOR-Layer0", 0.0).unwrap();
        assert_eq!(interpreter.current_layer(), 1);

        let delta = interpreter.process("G1 X1 E5", 0.0).unwrap().unwrap();
        assert_eq!(delta, MaterialDelta::new(5.0, true));

        interpreter.process(";LAYER:1", 0.0).unwrap();
        interpreter.process("M117 DASHBOARD_LAYER_INDICATOR 1", 0.0).unwrap();
        assert_eq!(interpreter.current_layer(), 2);
    }

    #[test]
    fn test_mode_commands() {
        let mut interpreter = CommandInterpreter::new();

        assert_eq!(interpreter.process("M83", 0.0).unwrap(), None);
        assert_eq!(interpreter.coordinate_mode(), CoordinateMode::Relative);

        assert_eq!(interpreter.process("G90", 0.0).unwrap(), None);
        assert_eq!(interpreter.coordinate_mode(), CoordinateMode::Absolute);

        interpreter.process("G91", 0.0).unwrap();
        assert_eq!(interpreter.coordinate_mode(), CoordinateMode::Relative);

        interpreter.process("M82", 0.0).unwrap();
        assert_eq!(interpreter.coordinate_mode(), CoordinateMode::Absolute);
    }

    #[test]
    fn test_absolute_delta_uses_cumulative() {
        let mut interpreter = on_first_layer();
        interpreter.process("M82", 0.0).unwrap();

        let delta = interpreter.process("G1 X10 E5", 0.0).unwrap().unwrap();
        assert_eq!(delta, MaterialDelta::new(5.0, true));

        let delta = interpreter.process("G1 X20 E8", 5.0).unwrap().unwrap();
        assert_eq!(delta.material, 3.0);
    }

    #[test]
    fn test_relative_delta_ignores_cumulative() {
        let mut interpreter = on_first_layer();
        interpreter.process("M83", 0.0).unwrap();

        let delta = interpreter.process("G1 X10 E1.5", 100.0).unwrap().unwrap();
        assert_eq!(delta.material, 1.5);
    }

    #[test]
    fn test_no_delta_without_mode_or_layer() {
        let mut interpreter = on_first_layer();
        assert_eq!(interpreter.process("G1 X10 E5", 0.0).unwrap(), None);

        let mut interpreter = CommandInterpreter::new();
        interpreter.process("M83", 0.0).unwrap();
        assert_eq!(interpreter.process("G1 X10 E5", 0.0).unwrap(), None);
    }

    #[test]
    fn test_first_layer_share_only_on_layer_one() {
        let mut interpreter = on_first_layer();
        interpreter.process("M83", 0.0).unwrap();
        interpreter.process(";LAYER:1", 0.0).unwrap();

        let delta = interpreter.process("G1 E2", 0.0).unwrap().unwrap();
        assert_eq!(delta, MaterialDelta::new(2.0, false));
    }

    #[test]
    fn test_move_without_extrusion() {
        let mut interpreter = on_first_layer();
        interpreter.process("M83", 0.0).unwrap();
        assert_eq!(interpreter.process("G0 X10 Y10 F3000", 0.0).unwrap(), None);
    }

    #[test]
    fn test_malformed_move_is_reported() {
        let mut interpreter = on_first_layer();
        interpreter.process("M83", 0.0).unwrap();

        let err = interpreter.process("G1 X10 E1.0.0", 0.0).unwrap_err();
        assert_eq!(err.token, "E1.0.0");
        assert_eq!(interpreter.coordinate_mode(), CoordinateMode::Relative);
    }

    #[test]
    fn test_other_codes_ignored() {
        let mut interpreter = on_first_layer();
        interpreter.process("M83", 0.0).unwrap();

        for command in ["G28", "M104 S200", "G92 E0", "T0", "G2 X1 Y1 I1 J0 E3"] {
            assert_eq!(interpreter.process(command, 0.0).unwrap(), None);
        }
        assert_eq!(interpreter.coordinate_mode(), CoordinateMode::Relative);
        assert_eq!(interpreter.current_layer(), 1);
    }
}
