// src/diagnosis.rs - Whole-leaf summary derived from the segmentation percentages

use serde::{Deserialize, Serialize};

use crate::compositor::Percentages;
use crate::contours::{Contour, Severity};

/// Overall severity band of the leaf from its combined disease share
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallSeverity {
    Healthy,
    Mild,
    Moderate,
    Severe,
}

impl OverallSeverity {
    /// Band from rust + scab percent: `< 5` healthy, `< 15` mild, `< 30` moderate
    pub fn from_percentages(percentages: &Percentages) -> Self {
        let disease = percentages.disease();
        if disease < 5.0 {
            OverallSeverity::Healthy
        } else if disease < 15.0 {
            OverallSeverity::Mild
        } else if disease < 30.0 {
            OverallSeverity::Moderate
        } else {
            OverallSeverity::Severe
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OverallSeverity::Healthy => "healthy",
            OverallSeverity::Mild => "mild",
            OverallSeverity::Moderate => "moderate",
            OverallSeverity::Severe => "severe",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiseaseKind {
    Healthy,
    Rust,
    Scab,
    MultipleDiseases,
}

impl DiseaseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiseaseKind::Healthy => "healthy",
            DiseaseKind::Rust => "rust",
            DiseaseKind::Scab => "scab",
            DiseaseKind::MultipleDiseases => "multiple_diseases",
        }
    }
}

/// Colour-ratio estimate of which disease dominates, with a confidence in `0..=1`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiseaseEstimate {
    pub disease: DiseaseKind,
    pub confidence: f64,
}

/// Treatment advice triggered by the segmentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    CopperFungicide,
    PruneRustLesions,
    PreventiveFungicide,
    IntensiveScabTreatment,
    MaintainPrevention,
    ConsultSpecialist,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::CopperFungicide => "copper_fungicide",
            Recommendation::PruneRustLesions => "prune_rust_lesions",
            Recommendation::PreventiveFungicide => "preventive_fungicide",
            Recommendation::IntensiveScabTreatment => "intensive_scab_treatment",
            Recommendation::MaintainPrevention => "maintain_prevention",
            Recommendation::ConsultSpecialist => "consult_specialist",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Recommendation::CopperFungicide => "Rust detected. Consider a copper-based fungicide.",
            Recommendation::PruneRustLesions => "Severe rust areas present. Prune the most affected parts.",
            Recommendation::PreventiveFungicide => "Scab detected. Apply a preventive fungicide treatment.",
            Recommendation::IntensiveScabTreatment => {
                "Severe scab detected. Consider intensive treatment and better ventilation."
            }
            Recommendation::MaintainPrevention => "Leaf is mostly healthy. Keep up preventive maintenance.",
            Recommendation::ConsultSpecialist => "Multiple diseases detected. Consult an agricultural specialist.",
        }
    }
}

/// Share above which a disease triggers treatment advice
const TREATMENT_THRESHOLD: f64 = 5.0;
/// Healthy share above which the leaf only needs prevention
const MOSTLY_HEALTHY: f64 = 80.0;
/// Share both diseases must exceed before a specialist is advised
const SPECIALIST_THRESHOLD: f64 = 15.0;

/// Advice in a fixed order: rust, scab, prevention, specialist
pub fn recommend(
    percentages: &Percentages,
    rust_contours: &[Contour],
    scab_contours: &[Contour],
) -> Vec<Recommendation> {
    let any_high = |contours: &[Contour]| contours.iter().any(|c| c.severity == Severity::High);
    let mut advice = Vec::new();

    if percentages.rust > TREATMENT_THRESHOLD {
        advice.push(Recommendation::CopperFungicide);
        if any_high(rust_contours) {
            advice.push(Recommendation::PruneRustLesions);
        }
    }

    if percentages.scab > TREATMENT_THRESHOLD {
        advice.push(Recommendation::PreventiveFungicide);
        if any_high(scab_contours) {
            advice.push(Recommendation::IntensiveScabTreatment);
        }
    }

    if percentages.healthy > MOSTLY_HEALTHY {
        advice.push(Recommendation::MaintainPrevention);
    }

    if percentages.rust > SPECIALIST_THRESHOLD && percentages.scab > SPECIALIST_THRESHOLD {
        advice.push(Recommendation::ConsultSpecialist);
    }

    advice
}

/// Whole-leaf diagnosis attached to CLI reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnosis {
    pub overall_severity: OverallSeverity,
    pub estimate: DiseaseEstimate,
    pub recommendations: Vec<Recommendation>,
}

/// Estimate the dominant disease from category shares.
///
/// Shares are taken as fractions of the leaf. Rust needs more than 5 % and
/// must outweigh scab; a rust leaf with more than 3 % scab is reported as
/// carrying multiple diseases.
pub fn estimate_disease(percentages: &Percentages) -> DiseaseEstimate {
    let healthy = percentages.healthy / 100.0;
    let rust = percentages.rust / 100.0;
    let scab = percentages.scab / 100.0;
    let disease = rust + scab;

    let (kind, confidence) = if healthy > 0.6 && disease < 0.1 {
        (DiseaseKind::Healthy, healthy)
    } else if rust > scab && rust > 0.05 {
        if scab > 0.03 {
            (DiseaseKind::MultipleDiseases, disease)
        } else {
            (DiseaseKind::Rust, rust * 2.0)
        }
    } else if scab > 0.05 {
        (DiseaseKind::Scab, scab * 2.0)
    } else {
        (DiseaseKind::Healthy, healthy)
    };

    DiseaseEstimate {
        disease: kind,
        confidence: confidence.clamp(0.0, 1.0),
    }
}

pub fn diagnose(
    percentages: &Percentages,
    rust_contours: &[Contour],
    scab_contours: &[Contour],
) -> Diagnosis {
    Diagnosis {
        overall_severity: OverallSeverity::from_percentages(percentages),
        estimate: estimate_disease(percentages),
        recommendations: recommend(percentages, rust_contours, scab_contours),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contours::Centroid;
    use crate::regions::BoundingBox;
    use assert_approx_eq::assert_approx_eq;

    fn pct(healthy: f64, rust: f64, scab: f64) -> Percentages {
        Percentages { healthy, rust, scab, background: 0.0 }
    }

    #[test]
    fn severity_bands() {
        assert_eq!(OverallSeverity::from_percentages(&pct(96.0, 2.0, 2.0)), OverallSeverity::Healthy);
        assert_eq!(OverallSeverity::from_percentages(&pct(93.0, 4.0, 3.0)), OverallSeverity::Mild);
        assert_eq!(OverallSeverity::from_percentages(&pct(97.0, 2.0, 1.0)), OverallSeverity::Healthy);
        assert_eq!(OverallSeverity::from_percentages(&pct(80.0, 10.0, 10.0)), OverallSeverity::Moderate);
        assert_eq!(OverallSeverity::from_percentages(&pct(40.0, 60.0, 0.0)), OverallSeverity::Severe);
    }

    #[test]
    fn severity_band_edges_belong_to_the_upper_band() {
        assert_eq!(OverallSeverity::from_percentages(&pct(95.0, 3.0, 2.0)), OverallSeverity::Mild);
        assert_eq!(OverallSeverity::from_percentages(&pct(95.01, 2.99, 2.0)), OverallSeverity::Healthy);
        assert_eq!(OverallSeverity::from_percentages(&pct(85.0, 10.0, 5.0)), OverallSeverity::Moderate);
        assert_eq!(OverallSeverity::from_percentages(&pct(70.0, 15.0, 15.0)), OverallSeverity::Severe);
    }

    #[test]
    fn clean_leaf_is_healthy() {
        let estimate = estimate_disease(&pct(95.0, 1.0, 1.0));
        assert_eq!(estimate.disease, DiseaseKind::Healthy);
        assert_approx_eq!(estimate.confidence, 0.95);
    }

    #[test]
    fn rust_with_some_scab_is_multiple() {
        let estimate = estimate_disease(&pct(70.0, 20.0, 4.0));
        assert_eq!(estimate.disease, DiseaseKind::MultipleDiseases);
        assert_approx_eq!(estimate.confidence, 0.24);

        let rust_only = estimate_disease(&pct(70.0, 20.0, 1.0));
        assert_eq!(rust_only.disease, DiseaseKind::Rust);
        assert_approx_eq!(rust_only.confidence, 0.4);
    }

    #[test]
    fn confidence_is_capped() {
        let estimate = estimate_disease(&pct(0.0, 0.0, 90.0));
        assert_eq!(estimate.disease, DiseaseKind::Scab);
        assert_approx_eq!(estimate.confidence, 1.0);
    }

    fn lesion(severity: Severity) -> Contour {
        Contour {
            area: 100,
            centroid: Centroid { x: 5.0, y: 5.0 },
            bounding_box: BoundingBox { x: 0, y: 0, width: 10, height: 10 },
            severity,
        }
    }

    #[test]
    fn rust_advice_escalates_with_high_lesions() {
        let moderate = recommend(&pct(90.0, 8.0, 2.0), &[lesion(Severity::Medium)], &[]);
        assert_eq!(moderate, vec![Recommendation::CopperFungicide, Recommendation::MaintainPrevention]);

        let severe = recommend(&pct(80.0, 20.0, 0.0), &[lesion(Severity::Low), lesion(Severity::High)], &[]);
        assert_eq!(severe, vec![Recommendation::CopperFungicide, Recommendation::PruneRustLesions]);
    }

    #[test]
    fn scab_advice_and_specialist() {
        let advice = recommend(&pct(60.0, 20.0, 20.0), &[lesion(Severity::Medium)], &[lesion(Severity::High)]);
        assert_eq!(
            advice,
            vec![
                Recommendation::CopperFungicide,
                Recommendation::PreventiveFungicide,
                Recommendation::IntensiveScabTreatment,
                Recommendation::ConsultSpecialist,
            ]
        );
    }

    #[test]
    fn thresholds_are_strict() {
        // Exactly 5 % of a disease and exactly 80 % healthy trigger nothing
        assert!(recommend(&pct(80.0, 5.0, 5.0), &[lesion(Severity::High)], &[lesion(Severity::High)]).is_empty());
        // High lesions alone do not trigger advice without enough coverage
        assert!(recommend(&pct(50.0, 1.0, 1.0), &[lesion(Severity::High)], &[]).is_empty());
        assert_eq!(recommend(&pct(100.0, 0.0, 0.0), &[], &[]), vec![Recommendation::MaintainPrevention]);
    }

    #[test]
    fn serializes_with_snake_case_kind() {
        let d = diagnose(&pct(70.0, 20.0, 4.0), &[lesion(Severity::High)], &[]);
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["overallSeverity"], "moderate");
        assert_eq!(json["estimate"]["disease"], "multiple_diseases");
        assert_eq!(json["recommendations"], serde_json::json!(["copper_fungicide", "prune_rust_lesions"]));
    }

    #[test]
    fn every_recommendation_has_a_message() {
        for advice in [
            Recommendation::CopperFungicide,
            Recommendation::PruneRustLesions,
            Recommendation::PreventiveFungicide,
            Recommendation::IntensiveScabTreatment,
            Recommendation::MaintainPrevention,
            Recommendation::ConsultSpecialist,
        ] {
            assert!(!advice.message().is_empty());
            assert_eq!(serde_json::to_value(advice).unwrap(), advice.as_str());
        }
    }
}
