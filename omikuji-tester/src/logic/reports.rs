use anyhow::Result;
use colored::Colorize;
use omikuji_engine::EmotionDistribution;
use std::io::Write;
use std::time::Duration;

use super::{AcceptanceReport, MAX_TONE_DRIFT_POINTS};

fn percent(share: f64) -> String {
    format!("{:.1}%", share * 100.0)
}

fn shares(distribution: &EmotionDistribution) -> String {
    format!(
        "+{} ={} -{}",
        percent(distribution.positive),
        percent(distribution.neutral),
        percent(distribution.negative)
    )
}

pub fn generate_console_report<W: Write + ?Sized>(
    out: &mut W,
    report: &AcceptanceReport,
    total_duration: Duration,
) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "📊 Omikuji Acceptance Summary".bright_cyan().bold())?;
    writeln!(out, "{}", "=============================".cyan())?;

    for sweep in &report.sweeps {
        let status = if sweep.within_tolerance() {
            "✅ PASS".green()
        } else {
            "❌ FAIL".red()
        };
        writeln!(out, "{status} {}", format!("rank {}", sweep.rank).bold())?;
        writeln!(out, "   Expected tones: {}", shares(&sweep.expected))?;
        writeln!(out, "   Observed tones: {}", shares(&sweep.observed))?;
        writeln!(
            out,
            "   Drift: {:.2} points (limit {MAX_TONE_DRIFT_POINTS})",
            sweep.max_drift_points
        )?;
        writeln!(out, "   Fallback rate: {}", percent(sweep.fallback_rate))?;
        writeln!(
            out,
            "   Latency: avg {:?}, max {:?} over {} readings",
            sweep.average_latency, sweep.max_latency, sweep.iterations
        )?;
    }
    writeln!(out)?;

    writeln!(out, "{}", "🎲 Seed Reproducibility".bright_yellow().bold())?;
    writeln!(out, "{}", "=======================".yellow())?;
    for check in &report.seeds {
        let status = if check.reproducible {
            "✅".green()
        } else {
            "❌".red()
        };
        writeln!(
            out,
            "{status} seed {} ({:#018x}) at rank {}",
            check.seed.token, check.seed.value, check.rank
        )?;
    }
    writeln!(out)?;

    let dedup = if report.dedup.passed() {
        format!("✅ {} session readings without repeats", report.dedup.readings).green()
    } else {
        format!("❌ repeated: {}", report.dedup.repeated_ids.join(", ")).red()
    };
    writeln!(out, "{dedup}")?;
    writeln!(out, "Total time: {total_duration:?}")?;
    Ok(())
}

pub fn generate_json_report<W: Write + ?Sized>(out: &mut W, report: &AcceptanceReport) -> Result<()> {
    let json_output = serde_json::to_string_pretty(report)?;
    writeln!(out, "{json_output}")?;
    Ok(())
}

pub fn generate_markdown_report<W: Write + ?Sized>(
    out: &mut W,
    report: &AcceptanceReport,
) -> Result<()> {
    writeln!(out, "# Omikuji Acceptance Results\n")?;

    let passed = report.sweeps.iter().filter(|s| s.within_tolerance()).count();
    writeln!(out, "## Summary\n")?;
    writeln!(out, "- **Ranks swept**: {}", report.sweeps.len())?;
    writeln!(out, "- **Within tolerance**: {passed}")?;
    writeln!(
        out,
        "- **Seeds reproducible**: {}/{}",
        report.seeds.iter().filter(|c| c.reproducible).count(),
        report.seeds.len()
    )?;
    writeln!(
        out,
        "- **Session dedup**: {}\n",
        if report.dedup.passed() { "ok" } else { "repeats found" }
    )?;

    writeln!(out, "## Tone Distribution\n")?;
    writeln!(
        out,
        "| Rank | Expected (+/=/-) | Observed (+/=/-) | Drift (pts) | Fallback | Avg latency |"
    )?;
    writeln!(out, "|---|---|---|---|---|---|")?;
    for sweep in &report.sweeps {
        writeln!(
            out,
            "| {} | {} | {} | {:.2} | {} | {:?} |",
            sweep.rank,
            shares(&sweep.expected),
            shares(&sweep.observed),
            sweep.max_drift_points,
            percent(sweep.fallback_rate),
            sweep.average_latency
        )?;
    }
    writeln!(out)?;

    writeln!(out, "## Seeds\n")?;
    for check in &report.seeds {
        let status = if check.reproducible { "✅" } else { "❌" };
        writeln!(
            out,
            "- {status} `{}` at rank {}: {}",
            check.seed.token,
            check.rank,
            check.content_ids.join(", ")
        )?;
    }
    Ok(())
}
