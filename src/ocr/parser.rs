//! Turns raw OCR text into position code, diameter and length.
//!
//! Diameter and length are recovered by an ordered list of strategies. Each
//! field keeps the first value any strategy produces, so the two fields may
//! come from different strategies. A field that no strategy recovers is left
//! empty and reported in the returned error list.

use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::ParsedData;

/// FDI position codes: 11-18, 21-28, 31-38, 41-48 (ASCII word boundaries)
const TOOTH_PATTERN: &str = r"(?-u:\b)(1[1-8]|2[1-8]|3[1-8]|4[1-8])(?-u:\b)";

/// "长度 = 13.0 mm", tolerating spaces and the label glyphs OCR confuses it with
/// ("長", "民", "代", "八", "庆").
const LENGTH_PATTERN: &str = r"(?i)[长長民代八]\s*[度庆]\s*[=＝]\s*(\d+\.?\d*)\s*m";

/// "直径 = 4.0 mm", tolerating a garbled or split second glyph
/// ("直 径", "直 人 径", "直 人 笃").
const DIAMETER_PATTERN: &str = r"(?i)直\s*[径經徑人]?\s*[径經徑笃]?\s*[=＝]\s*(\d+\.?\d*)\s*m";

/// Every "= NUMBER mm". A leading "<", "{" or "(" is a misread "4".
const VALUE_MM_PATTERN: &str = r"(?i)[=＝]\s*([<{(]?)(\d+\.?\d*)\s*m";

/// Legacy "DxL" notation, e.g. "4.0×13.0"
const DIM_PATTERN: &str = r"(\d+(?:\.\d+)?)\s*[xX×]\s*(\d+(?:\.\d+)?)";

/// Diameters are 2.5-7.0 mm; a value this large lost its decimal point.
const DIAMETER_DROPPED_DECIMAL_MIN: f64 = 10.0;
/// Lengths are 4.0-18.0 mm; a value above this lost its decimal point.
const LENGTH_DROPPED_DECIMAL_ABOVE: f64 = 20.0;
/// Smallest plausible length, used to classify a lone positional value.
const MIN_PLAUSIBLE_LENGTH: f64 = 4.0;

/// Order of the bare "= N mm" values in the data block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionalOrder {
    #[default]
    LengthFirst,
    DiameterFirst,
}

/// Normalized values produced by one strategy.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Candidates {
    pub length: Option<String>,
    pub diameter: Option<String>,
}

impl Candidates {
    fn is_complete(&self) -> bool {
        self.length.is_some() && self.diameter.is_some()
    }
}

type Strategy = fn(&TextParser, &str) -> Candidates;

const STRATEGIES: [(&str, Strategy); 3] = [
    ("labeled", TextParser::labeled),
    ("positional", TextParser::positional),
    ("legacy_dxl", TextParser::legacy_dxl),
];

/// Normalizes a raw diameter: "40" → "4.0", "4" → "4.0", "3.5" → "3.5".
pub fn normalize_diameter(raw: &str) -> Option<String> {
    let v: f64 = raw.parse().ok()?;
    if v >= DIAMETER_DROPPED_DECIMAL_MIN {
        return Some(format!("{:.1}", v / 10.0));
    }
    Some(format!("{:.1}", v))
}

/// Normalizes a raw length: "130" → "13.0", "8" → "8.0", "11.5" → "11.5".
///
/// A value that lost a leading digit ("30" for "13.0") is kept as-is and left
/// for combination validation to reject.
pub fn normalize_length(raw: &str) -> Option<String> {
    let v: f64 = raw.parse().ok()?;
    if v > LENGTH_DROPPED_DECIMAL_ABOVE {
        return Some(format!("{:.1}", v / 10.0));
    }
    Some(format!("{:.1}", v))
}

/// Compiled patterns plus the positional convention in use.
pub struct TextParser {
    tooth_re: Regex,
    length_re: Regex,
    diameter_re: Regex,
    value_mm_re: Regex,
    dim_re: Regex,
    order: PositionalOrder,
}

impl TextParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            tooth_re: Regex::new(TOOTH_PATTERN)?,
            length_re: Regex::new(LENGTH_PATTERN)?,
            diameter_re: Regex::new(DIAMETER_PATTERN)?,
            value_mm_re: Regex::new(VALUE_MM_PATTERN)?,
            dim_re: Regex::new(DIM_PATTERN)?,
            order: PositionalOrder::default(),
        })
    }

    pub fn with_order(mut self, order: PositionalOrder) -> Self {
        self.order = order;
        self
    }

    /// Parses the position-code text and the data-block text.
    ///
    /// Never fails; every unresolved field adds one entry to the error list.
    pub fn parse(&self, tooth_text: &str, extra_text: &str) -> (ParsedData, Vec<String>) {
        let mut errors = Vec::new();

        let tooth = self.extract_tooth(tooth_text);
        if tooth.is_none() {
            errors.push("tooth: position code not recognized".to_string());
        }

        let mut found = Candidates::default();
        for (name, strategy) in STRATEGIES {
            if found.is_complete() {
                break;
            }
            let next = strategy(self, extra_text);
            if found.length.is_none() && next.length.is_some() {
                debug!(strategy = name, length = ?next.length, "length resolved");
                found.length = next.length;
            }
            if found.diameter.is_none() && next.diameter.is_some() {
                debug!(strategy = name, diameter = ?next.diameter, "diameter resolved");
                found.diameter = next.diameter;
            }
        }

        if found.length.is_none() {
            errors.push("extra: implant length not recognized".to_string());
        }
        if found.diameter.is_none() {
            errors.push("extra: implant diameter not recognized".to_string());
        }

        let parsed = ParsedData {
            tooth,
            diameter: found.diameter,
            length: found.length,
        };
        (parsed, errors)
    }

    /// First valid FDI position code in the text.
    pub fn extract_tooth(&self, text: &str) -> Option<String> {
        self.tooth_re
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    /// Strategy 1: values next to their "length" / "diameter" labels.
    pub fn labeled(&self, text: &str) -> Candidates {
        let capture = |re: &Regex| {
            re.captures(text)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
        };

        Candidates {
            length: capture(&self.length_re).and_then(|raw| normalize_length(&raw)),
            diameter: capture(&self.diameter_re).and_then(|raw| normalize_diameter(&raw)),
        }
    }

    /// All raw "= N mm" values in reading order, with misread "4"s restored.
    pub fn positional_values(&self, text: &str) -> Vec<String> {
        self.value_mm_re
            .captures_iter(text)
            .filter_map(|caps| {
                let digits = caps.get(2)?.as_str();
                let noise = caps.get(1).map(|m| m.as_str()).unwrap_or("");
                Some(if noise.is_empty() {
                    digits.to_string()
                } else {
                    format!("4{}", digits)
                })
            })
            .collect()
    }

    /// Strategy 2: unlabeled "= N mm" values by position.
    ///
    /// Two or more values follow the configured order. A single value is
    /// classified by magnitude: at least 4 mm once read as a length makes it
    /// a length, anything smaller a diameter.
    pub fn positional(&self, text: &str) -> Candidates {
        let values = self.positional_values(text);

        match values.as_slice() {
            [] => Candidates::default(),
            [only] => {
                let Ok(v) = only.parse::<f64>() else {
                    return Candidates::default();
                };
                // Length-style correction here, not the diameter one (÷10 from 10):
                // "= 11.5 mm" must stay a length rather than become Ø1.15
                let as_length = if v > LENGTH_DROPPED_DECIMAL_ABOVE { v / 10.0 } else { v };
                if as_length >= MIN_PLAUSIBLE_LENGTH {
                    Candidates {
                        length: normalize_length(only),
                        diameter: None,
                    }
                } else {
                    Candidates {
                        length: None,
                        diameter: normalize_diameter(only),
                    }
                }
            }
            [first, second, ..] => {
                let (length_raw, diameter_raw) = match self.order {
                    PositionalOrder::LengthFirst => (first, second),
                    PositionalOrder::DiameterFirst => (second, first),
                };
                Candidates {
                    length: normalize_length(length_raw),
                    diameter: normalize_diameter(diameter_raw),
                }
            }
        }
    }

    /// Strategy 3: "D×L" notation, diameter first.
    pub fn legacy_dxl(&self, text: &str) -> Candidates {
        let Some(caps) = self.dim_re.captures(text) else {
            return Candidates::default();
        };
        Candidates {
            diameter: caps.get(1).and_then(|m| normalize_diameter(m.as_str())),
            length: caps.get(2).and_then(|m| normalize_length(m.as_str())),
        }
    }
}
