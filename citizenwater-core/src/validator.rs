//! Observation validation
//!
//! A submission is valid when it names a postcode and carries at least one
//! measurement or visual note. It is complete when every measurement, a note
//! and an image are all present. Blank strings never count as present.

use crate::error::ValidationFailure;
use crate::types::ObservationSubmission;

fn is_present(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

fn has_any(items: &[String]) -> bool {
    items.iter().any(|item| !item.trim().is_empty())
}

fn measurements(submission: &ObservationSubmission) -> [Option<f64>; 4] {
    [
        submission.temperature,
        submission.ph,
        submission.alkalinity,
        submission.turbidity,
    ]
}

/// True iff the postcode is non-blank and a measurement or note is present
pub fn validate(submission: &ObservationSubmission) -> bool {
    is_present(submission.postcode.as_deref())
        && (measurements(submission).iter().any(Option::is_some)
            || has_any(&submission.observations))
}

/// True iff all four measurements, a note and an image path are present
pub fn check_complete(submission: &ObservationSubmission) -> bool {
    measurements(submission).iter().all(Option::is_some)
        && has_any(&submission.observations)
        && has_any(&submission.image_paths)
}

/// First reason the submission cannot be stored, if any
pub fn validation_failure(submission: &ObservationSubmission) -> Option<ValidationFailure> {
    if !is_present(submission.citizen_id.as_deref()) {
        return Some(ValidationFailure::MissingCitizenId);
    }
    if !is_present(submission.postcode.as_deref()) {
        return Some(ValidationFailure::MissingPostcode);
    }
    if !validate(submission) {
        return Some(ValidationFailure::NoMeasurementOrNote);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_submission() -> ObservationSubmission {
        ObservationSubmission {
            citizen_id: Some("citizen-1".into()),
            postcode: Some("AB1 2CD".into()),
            temperature: Some(12.5),
            ph: Some(7.1),
            alkalinity: Some(110.0),
            turbidity: Some(3.2),
            observations: vec!["Clear".into()],
            image_paths: vec!["/uploads/river.jpg".into()],
        }
    }

    #[test]
    fn test_blank_postcode_is_never_valid() {
        for postcode in [None, Some(String::new()), Some("   ".to_string())] {
            let submission = ObservationSubmission {
                postcode,
                ..full_submission()
            };
            assert!(!validate(&submission));
            assert_eq!(
                validation_failure(&submission),
                Some(ValidationFailure::MissingPostcode)
            );
        }
    }

    #[test]
    fn test_single_measurement_is_valid_but_incomplete() {
        let submission = ObservationSubmission {
            citizen_id: Some("citizen-1".into()),
            postcode: Some("AB1 2CD".into()),
            ph: Some(6.8),
            ..Default::default()
        };

        assert!(validate(&submission));
        assert!(!check_complete(&submission));
        assert_eq!(validation_failure(&submission), None);
    }

    #[test]
    fn test_note_alone_is_valid() {
        let submission = ObservationSubmission {
            citizen_id: Some("citizen-1".into()),
            postcode: Some("AB1 2CD".into()),
            observations: vec!["Foamy".into()],
            ..Default::default()
        };

        assert!(validate(&submission));
    }

    #[test]
    fn test_postcode_only_is_rejected() {
        let submission = ObservationSubmission {
            citizen_id: Some("citizen-1".into()),
            postcode: Some("AB1 2CD".into()),
            observations: vec!["  ".into()],
            ..Default::default()
        };

        assert!(!validate(&submission));
        assert_eq!(
            validation_failure(&submission),
            Some(ValidationFailure::NoMeasurementOrNote)
        );
    }

    #[test]
    fn test_missing_citizen_reported_first() {
        let submission = ObservationSubmission {
            citizen_id: None,
            postcode: None,
            ..Default::default()
        };

        assert_eq!(
            validation_failure(&submission),
            Some(ValidationFailure::MissingCitizenId)
        );
    }

    #[test]
    fn test_complete_requires_every_part() {
        assert!(check_complete(&full_submission()));

        let clear_measurement: [fn(&mut ObservationSubmission); 4] = [
            |s| s.temperature = None,
            |s| s.ph = None,
            |s| s.alkalinity = None,
            |s| s.turbidity = None,
        ];
        for (i, clear) in clear_measurement.iter().enumerate() {
            let mut partial = full_submission();
            clear(&mut partial);
            assert!(validate(&partial));
            assert!(!check_complete(&partial), "measurement {} missing", i);
        }

        let without_notes = ObservationSubmission {
            observations: Vec::new(),
            ..full_submission()
        };
        assert!(!check_complete(&without_notes));

        let without_images = ObservationSubmission {
            image_paths: vec![" ".into()],
            ..full_submission()
        };
        assert!(!check_complete(&without_images));
    }
}
