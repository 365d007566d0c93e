use unicode_normalization::UnicodeNormalization;

use crate::error::{CoreResult, SummaryError};
use crate::model::SummaryRequest;

fn clean_text(s: &str) -> String {
    // Unicode NFC normalization + BOM strip + trim
    let mut t = s.nfc().collect::<String>();
    if t.starts_with('\u{FEFF}') {
        t.remove(0);
    }
    t.trim().to_string()
}

/// Clean up a request and reject it when it cannot name a summary.
pub fn normalize_request(mut req: SummaryRequest) -> CoreResult<SummaryRequest> {
    req.subject_id = clean_text(&req.subject_id);
    if req.subject_id.is_empty() {
        return Err(SummaryError::Validation("subject id is required".into()));
    }
    Ok(req)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Language;

    fn req(subject: &str, period: i32) -> SummaryRequest {
        SummaryRequest::new(subject, period, Language::Zh)
    }

    #[test]
    fn trims_and_strips_bom() {
        let out = normalize_request(req("\u{FEFF}  CHN \n", 2020)).unwrap();
        assert_eq!(out.subject_id, "CHN");
        assert_eq!(out.period, 2020);
    }

    #[test]
    fn unicode_nfc() {
        // "e" + combining acute accent should normalize to "é"
        let out = normalize_request(req("e\u{301}", 2000)).unwrap();
        assert_eq!(out.subject_id, "é");
    }

    #[test]
    fn blank_subject_is_rejected() {
        let err = normalize_request(req("   ", 2020)).unwrap_err();
        assert!(matches!(err, SummaryError::Validation(_)));
    }

    #[test]
    fn any_period_and_long_subject_pass_through() {
        for period in [i32::MIN, -500, 0, 1750, 2300, i32::MAX] {
            assert_eq!(normalize_request(req("CHN", period)).unwrap().period, period);
        }
        let long = "国".repeat(500);
        assert_eq!(normalize_request(req(&long, 2020)).unwrap().subject_id, long);
    }
}
