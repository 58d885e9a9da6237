//! Cross-checks the OCR reading against the reference table.

use tracing::{info, warn};

use crate::combinations::{is_valid_pair, validate_combination};
use crate::ocr::{ParsedData, TableAnalysisResult};

/// Merged fields plus any advisories raised while merging.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub parsed: ParsedData,
    pub advisories: Vec<String>,
    /// True when diameter and length were taken from the table.
    pub corrected: bool,
}

/// Merges the OCR fields with the table reading.
///
/// The table only overrides when the OCR pair is invalid and the table is a
/// high-confidence, valid reading. The position code always comes from OCR.
pub fn reconcile(parsed: &ParsedData, table: &TableAnalysisResult) -> Reconciliation {
    let ocr_check = validate_combination(parsed.diameter.as_deref(), parsed.length.as_deref());
    let table_pair = usable_table_pair(table);

    let mut out = Reconciliation {
        parsed: parsed.clone(),
        ..Default::default()
    };

    match (ocr_check.valid, table_pair) {
        (false, Some((diameter, length))) => {
            let advisory = format!(
                "table correction: Ø{} × {}mm replaced by Ø{} × {}mm",
                parsed.diameter.as_deref().unwrap_or("?"),
                parsed.length.as_deref().unwrap_or("?"),
                diameter,
                length
            );
            info!("{}", advisory);
            out.parsed.diameter = Some(diameter.to_string());
            out.parsed.length = Some(length.to_string());
            out.advisories.push(advisory);
            out.corrected = true;
        }
        (false, None) => {
            if let Some(message) = ocr_check.message {
                warn!("{}", message);
                out.advisories.push(message);
            }
        }
        (true, Some((diameter, length)))
            if parsed.diameter.as_deref() != Some(diameter) || parsed.length.as_deref() != Some(length) =>
        {
            let advisory = format!(
                "table mismatch: OCR Ø{} × {}mm, table Ø{} × {}mm",
                parsed.diameter.as_deref().unwrap_or("?"),
                parsed.length.as_deref().unwrap_or("?"),
                diameter,
                length
            );
            warn!("{}", advisory);
            out.advisories.push(advisory);
        }
        (true, _) => {}
    }

    out
}

/// The table pair, if it is confident enough to act on.
fn usable_table_pair(table: &TableAnalysisResult) -> Option<(&str, &str)> {
    if !table.is_high() {
        return None;
    }
    let diameter = table.diameter.as_deref()?;
    let length = table.length.as_deref()?;
    is_valid_pair(diameter, length).then_some((diameter, length))
}
