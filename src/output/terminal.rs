// Colored terminal output for moderation results.
//
// This module handles all terminal-specific formatting: colors and the
// per-category table. main.rs delegates here for `analyze` and `check`.

use colored::Colorize;

use super::percent;
use crate::client::AnalysisResult;
use crate::moderation::models::{DetectorOutcome, Tier};
use crate::moderation::policy::PolicyThresholds;
use crate::moderation::service::ModerationReport;

/// Display a local moderation report.
pub fn display_report(image: &str, report: &ModerationReport, thresholds: &PolicyThresholds) {
    let decision = &report.decision;
    let risk = &decision.category_breakdown;

    println!("\n{}", format!("=== Moderation: {image} ===").bold());
    println!();
    println!(
        "  Verdict: {}   Risk: {}   Decided by: {}",
        verdict(decision.is_admitted),
        colorize_risk(decision.risk_score),
        colorize_tier(decision.decided_by),
    );

    println!();
    println!(
        "  {:<24} {:>8}  {:>9}",
        "Category".dimmed(),
        "Risk".dimmed(),
        "Threshold".dimmed(),
    );
    println!("  {}", "-".repeat(45).dimmed());
    let rows = [
        ("violence", risk.violence_risk, thresholds.high_violence),
        ("weapons", risk.weapon_risk, thresholds.high_weapon),
        (
            "weapons (via violence)",
            risk.weapon_risk_via_violence_model,
            thresholds.cross_model_weapon,
        ),
        (
            "sexual content",
            risk.sexual_content_risk,
            thresholds.high_sexual_content,
        ),
    ];
    for (name, score, threshold) in rows {
        let marker = if score > threshold {
            "!".red().bold().to_string()
        } else {
            " ".to_string()
        };
        println!(
            "  {:<24} {:>8} {} {:>8}",
            name,
            percent(score),
            marker,
            percent(threshold),
        );
    }

    if let Some(c) = &report.characteristics {
        let shape = if c.is_landscape {
            "landscape"
        } else if c.is_portrait {
            "portrait"
        } else {
            "other"
        };
        println!(
            "\n  Image: {}x{}  aspect {:.2}  variance {:.0}  ({})",
            c.width, c.height, c.aspect_ratio, c.color_variance, shape
        );
    }

    if !risk.contributing_findings.is_empty() {
        println!("\n  Contributing findings:");
        for f in &risk.contributing_findings {
            println!(
                "    {:<16} {:<22} {:>7}  {}",
                f.category.to_string(),
                f.label,
                percent(f.score),
                f.source.to_string().dimmed(),
            );
        }
    }

    let failures: Vec<(&str, String)> = report
        .reports
        .iter()
        .filter_map(|r| match &r.outcome {
            DetectorOutcome::Failure(e) => Some((r.detector.as_str(), e.to_string())),
            DetectorOutcome::Success(_) => None,
        })
        .collect();
    if !failures.is_empty() {
        println!("\n  {}", "Detector failures:".yellow());
        for (name, error) in failures {
            println!("    {} {}", format!("{name}:").yellow(), error.dimmed());
        }
    }

    print_reasons(&decision.reasons);
    println!(
        "\n  {}",
        format!("Processed in {:.2}s", report.elapsed.as_secs_f64()).dimmed()
    );
}

/// Display a result returned by a remote `lookout serve`.
pub fn display_remote_result(image: &str, result: &AnalysisResult) {
    println!("\n{}", format!("=== Moderation: {image} ===").bold());
    println!();
    println!(
        "  Verdict: {}   Risk: {}",
        verdict(result.es_apto),
        colorize_risk(result.puntuacion_riesgo),
    );

    if let Some(error) = &result.error {
        println!("  {} {}", "Error:".red(), error);
    }
    print_reasons(&result.razones);

    if let Some(secs) = result.tiempo_procesamiento {
        println!("\n  {}", format!("Processed in {secs:.2}s").dimmed());
    }
}

fn print_reasons(reasons: &[String]) {
    if reasons.is_empty() {
        return;
    }
    println!("\n  Reasons:");
    for reason in reasons {
        println!("    {} {}", "-".red(), reason);
    }
}

fn verdict(admitted: bool) -> colored::ColoredString {
    if admitted {
        "ADMITTED".green().bold()
    } else {
        "REJECTED".red().bold()
    }
}

/// Colorize a risk score by band.
fn colorize_risk(score: f64) -> colored::ColoredString {
    let text = percent(score);
    if score >= 0.6 {
        text.red().bold()
    } else if score >= 0.3 {
        text.yellow()
    } else {
        text.green()
    }
}

fn colorize_tier(tier: Tier) -> colored::ColoredString {
    match tier {
        Tier::FailClosed => tier.as_str().red().bold(),
        Tier::HardReject => tier.as_str().red(),
        Tier::CombinedRisk => tier.as_str().yellow(),
        Tier::LandscapeException | Tier::Default => tier.as_str().green(),
    }
}
