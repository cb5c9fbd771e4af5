use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use csv::Writer;
use serde::Serialize;

use crate::contours::Contour;
use crate::diagnosis::Diagnosis;
use crate::errors::Result;
use crate::pipeline::Segmentation;

/// Per-image JSON report written by the CLI
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageReport<'a> {
    filename: &'a str,
    width: u32,
    height: u32,
    percentages: &'a crate::compositor::Percentages,
    contours: ReportContours<'a>,
    diagnosis: &'a Diagnosis,
    leaf_pixels: u64,
    leaf_fell_back: bool,
    processing_time: u64,
}

#[derive(Debug, Serialize)]
struct ReportContours<'a> {
    rust: &'a [Contour],
    scab: &'a [Contour],
}

/// Write `<output>/json/<filename>.json`
pub fn write_result_json<P: AsRef<Path>>(
    segmentation: &Segmentation,
    diagnosis: &Diagnosis,
    processing_time: u64,
    output_dir: P,
    filename: &str,
) -> Result<()> {
    let output_path = output_dir.as_ref().join("json").join(format!("{}.json", filename));

    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let report = ImageReport {
        filename,
        width: segmentation.leaf.width(),
        height: segmentation.leaf.height(),
        percentages: &segmentation.percentages,
        contours: ReportContours {
            rust: &segmentation.rust_contours,
            scab: &segmentation.scab_contours,
        },
        diagnosis,
        leaf_pixels: segmentation.counts.leaf,
        leaf_fell_back: segmentation.leaf_fell_back,
        processing_time,
    };

    let writer = BufWriter::new(File::create(&output_path)?);
    serde_json::to_writer_pretty(writer, &report)?;

    Ok(())
}

/// Write one row per lesion to `<output>/contours/<filename>.csv`
pub fn write_contours_csv<P: AsRef<Path>>(
    segmentation: &Segmentation,
    output_dir: P,
    filename: &str,
) -> Result<()> {
    let output_path = output_dir.as_ref().join("contours").join(format!("{}.csv", filename));

    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut writer = Writer::from_path(&output_path)?;

    writer.write_record([
        "Disease",
        "Rank",
        "Area",
        "Centroid_X",
        "Centroid_Y",
        "BBox_X",
        "BBox_Y",
        "BBox_Width",
        "BBox_Height",
        "Severity",
    ])?;

    let labelled = [("rust", &segmentation.rust_contours), ("scab", &segmentation.scab_contours)];
    for (disease, contours) in labelled {
        for (rank, contour) in contours.iter().enumerate() {
            writer.write_record(&[
                disease.to_string(),
                (rank + 1).to_string(),
                contour.area.to_string(),
                format!("{:.0}", contour.centroid.x),
                format!("{:.0}", contour.centroid.y),
                contour.bounding_box.x.to_string(),
                contour.bounding_box.y.to_string(),
                contour.bounding_box.width.to_string(),
                contour.bounding_box.height.to_string(),
                severity_label(contour),
            ])?;
        }
    }

    writer.flush()?;

    Ok(())
}

fn severity_label(contour: &Contour) -> String {
    match contour.severity {
        crate::contours::Severity::Low => "low",
        crate::contours::Severity::Medium => "medium",
        crate::contours::Severity::High => "high",
    }
    .to_string()
}

/// One line of the batch summary
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub filename: String,
    pub path: String,
    pub healthy: f64,
    pub rust: f64,
    pub scab: f64,
    pub background: f64,
    pub rust_lesions: usize,
    pub scab_lesions: usize,
    pub overall_severity: &'static str,
    pub disease: &'static str,
    pub confidence: f64,
    pub processing_time: u64,
}

impl SummaryRow {
    pub fn new(
        filename: &str,
        path: &Path,
        segmentation: &Segmentation,
        diagnosis: &Diagnosis,
        processing_time: u64,
    ) -> Self {
        let p = &segmentation.percentages;
        Self {
            filename: filename.to_string(),
            path: path.display().to_string(),
            healthy: p.healthy,
            rust: p.rust,
            scab: p.scab,
            background: p.background,
            rust_lesions: segmentation.rust_contours.len(),
            scab_lesions: segmentation.scab_contours.len(),
            overall_severity: diagnosis.overall_severity.as_str(),
            disease: diagnosis.estimate.disease.as_str(),
            confidence: diagnosis.estimate.confidence,
            processing_time,
        }
    }
}

/// Append rows to `<output>/summary.csv`, writing the header when the file is new
pub fn write_summary_csv<P: AsRef<Path>>(rows: &[SummaryRow], output_dir: P) -> Result<()> {
    let output_path = output_dir.as_ref().join("summary.csv");

    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let file_exists = output_path.exists();
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&output_path)?;
    let mut writer = Writer::from_writer(file);

    if !file_exists {
        writer.write_record([
            "Filename",
            "Path",
            "Healthy_Perc",
            "Rust_Perc",
            "Scab_Perc",
            "Background_Perc",
            "Rust_Lesions",
            "Scab_Lesions",
            "Overall_Severity",
            "Disease_Estimate",
            "Confidence",
            "Processing_Time_Ms",
        ])?;
    }

    for row in rows {
        writer.write_record(&[
            row.filename.clone(),
            row.path.clone(),
            format!("{:.6}", row.healthy),
            format!("{:.6}", row.rust),
            format!("{:.6}", row.scab),
            format!("{:.6}", row.background),
            row.rust_lesions.to_string(),
            row.scab_lesions.to_string(),
            row.overall_severity.to_string(),
            row.disease.to_string(),
            format!("{:.6}", row.confidence),
            row.processing_time.to_string(),
        ])?;
    }

    writer.flush()?;

    Ok(())
}
