//! Allowed (diameter, length) pairs for the implant system shown on screen.

use serde::Serialize;

/// Diameter → allowed lengths, in table order.
pub const VALID_COMBINATIONS: &[(&str, &[&str])] = &[
    ("3.0", &["8.5", "10.0", "11.5", "13.0"]),
    ("3.5", &["8.5", "10.0", "11.5", "13.0"]),
    ("4.0", &["6.0", "7.0", "8.5", "10.0", "11.5", "13.0"]),
    ("4.5", &["6.0", "7.0", "8.5", "10.0", "11.5", "13.0"]),
    ("5.0", &["4.0", "5.0", "6.0", "7.0", "8.5", "10.0", "11.5", "13.0"]),
];

/// Result of checking one pair against [`VALID_COMBINATIONS`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CombinationValidation {
    pub valid: bool,
    pub message: Option<String>,
}

/// Returns the allowed lengths for a diameter, if the diameter is known.
pub fn allowed_lengths(diameter: &str) -> Option<&'static [&'static str]> {
    VALID_COMBINATIONS
        .iter()
        .find(|(d, _)| *d == diameter)
        .map(|(_, lengths)| *lengths)
}

pub fn is_valid_pair(diameter: &str, length: &str) -> bool {
    allowed_lengths(diameter).is_some_and(|lengths| lengths.contains(&length))
}

/// Validates a possibly incomplete pair, explaining any failure.
pub fn validate_combination(diameter: Option<&str>, length: Option<&str>) -> CombinationValidation {
    let (Some(diameter), Some(length)) = (diameter, length) else {
        return CombinationValidation {
            valid: false,
            message: Some(format!(
                "incomplete data: diameter={}, length={}",
                diameter.unwrap_or("?"),
                length.unwrap_or("?")
            )),
        };
    };

    let Some(allowed) = allowed_lengths(diameter) else {
        return CombinationValidation {
            valid: false,
            message: Some(format!("unknown implant diameter: {}", diameter)),
        };
    };

    if !allowed.contains(&length) {
        return CombinationValidation {
            valid: false,
            message: Some(format!("Ø{} × {}mm is not a valid combination", diameter, length)),
        };
    }

    CombinationValidation {
        valid: true,
        message: None,
    }
}
