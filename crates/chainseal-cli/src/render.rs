//! Terminal rendering of a [`RunReport`].

use std::path::Path;

use chainseal_chain::{
    BypassOutcome, BypassState, LinkReport, LinkStatus, Mode, RunReport, VerificationReport,
};
use chainseal_config::path::display_relative;
use console::{style, Emoji};

static CHECK: Emoji<'_, '_> = Emoji("✔ ", "[ok] ");
static CROSS: Emoji<'_, '_> = Emoji("✘ ", "[!!] ");
static WARN_ICON: Emoji<'_, '_> = Emoji("⚠ ", "[??] ");
static DOT: Emoji<'_, '_> = Emoji("● ", "[-] ");
static PACKAGE: Emoji<'_, '_> = Emoji("📦 ", "");

const RULE_WIDTH: usize = 60;

struct Section {
    passed: u32,
    warned: u32,
    failed: u32,
}

impl Section {
    fn new() -> Self {
        Self {
            passed: 0,
            warned: 0,
            failed: 0,
        }
    }

    fn heading(&self, title: &str) {
        println!();
        println!("{}", style(title).bold());
    }

    fn pass(&mut self, msg: &str) {
        self.passed += 1;
        println!("  {} {}", CHECK, style(msg).green());
    }

    fn warn(&mut self, msg: &str) {
        self.warned += 1;
        println!("  {} {}", WARN_ICON, style(msg).yellow());
    }

    fn fail(&mut self, msg: &str) {
        self.failed += 1;
        println!("  {} {}", CROSS, style(msg).red());
    }

    fn info(&self, msg: &str) {
        println!("  {} {}", DOT, style(msg).dim());
    }
}

pub fn render(report: &RunReport, root: &Path, quiet: bool) {
    if !quiet {
        render_details(report, root);
    }
    render_verdict(report);
}

fn render_details(report: &RunReport, root: &Path) {
    println!();
    println!("{}", style("chainseal").bold().cyan());
    println!("{}", style("─".repeat(RULE_WIDTH)).dim());
    println!(
        "  Mode: {}    Date: {}",
        report.mode,
        report.started_at.format("%Y-%m-%d %H:%M:%S")
    );

    let mut s = Section::new();

    s.heading("Files");
    for status in &report.preflight {
        let line = format!("{}: {}", status.role, display_relative(root, &status.path));
        if status.present {
            s.pass(&line);
        } else if report.mode == Mode::Full {
            s.fail(&line);
        } else {
            s.warn(&line);
        }
    }

    if let Some(state) = &report.update {
        s.heading("Update");
        s.pass(&format!(
            "payload: {} ({} bytes)",
            state.payload.short(),
            state.payload.len()
        ));
        s.pass(&format!(
            "installer manifest: {} ({} bytes)",
            state.installer.short(),
            state.installer.len()
        ));
        match state.bypass {
            BypassOutcome::Removed => s.pass("ExtraFiles removed"),
            BypassOutcome::AlreadyAbsent => s.info("ExtraFiles already absent"),
        }
    } else if let Some(step) = report.failed_step {
        s.heading("Update");
        s.fail(&format!("stopped at step '{}'", step));
    }

    if let Some(verification) = &report.verification {
        s.heading("Verify");
        render_verification(&mut s, verification);
    }

    if !report.errors.is_empty() {
        println!();
        println!(
            "{}",
            style(format!("{}ERRORS ({}):", CROSS, report.errors.len()))
                .red()
                .bold()
        );
        for error in &report.errors {
            println!("  - {}", error);
        }
    }

    if !report.warnings.is_empty() {
        println!();
        println!(
            "{}",
            style(format!("{}WARNINGS ({}):", WARN_ICON, report.warnings.len()))
                .yellow()
                .bold()
        );
        for warning in &report.warnings {
            println!("  - {}", warning);
        }
    }

    if !report.backups.is_empty() {
        println!();
        println!(
            "{}",
            style(format!("{}BACKUPS ({}):", PACKAGE, report.backups.len())).bold()
        );
        for backup in &report.backups {
            println!("  - {}", backup.file_name());
        }
    }

    println!();
    println!("{}", style("─".repeat(RULE_WIDTH)).dim());
    println!(
        "  {} passed, {} warnings, {} errors",
        style(s.passed).green().bold(),
        style(s.warned).yellow().bold(),
        style(s.failed).red().bold(),
    );
}

fn render_verification(s: &mut Section, verification: &VerificationReport) {
    for link in verification.links() {
        render_link(s, link);
    }

    if let Some(size) = verification.size {
        let line = format!(
            "payload size: {} bytes (recorded {})",
            size.actual,
            size.recorded
                .map_or_else(|| "none".to_string(), |n| n.to_string())
        );
        if size.matches() {
            s.pass(&line);
        } else {
            s.warn(&line);
        }
    }

    match verification.bypass {
        Some(BypassState::Active) => s.pass("signature bypass active"),
        Some(BypassState::Inactive) => s.warn("signature bypass inactive (ExtraFiles present)"),
        None => {}
    }
}

fn render_link(s: &mut Section, link: &LinkReport) {
    match &link.status {
        LinkStatus::Match => s.pass(&format!("{}: match", link.link)),
        LinkStatus::Mismatch { expected, actual } => {
            s.fail(&format!("{}: mismatch", link.link));
            s.info(&format!("recorded {}", expected));
            s.info(&format!("actual   {}", actual));
        }
        LinkStatus::Failed { kind, .. } => {
            s.fail(&format!("{}: not checked ({})", link.link, kind));
        }
    }
}

fn render_verdict(report: &RunReport) {
    let what = match report.mode {
        Mode::Full => "BUILD",
        Mode::UpdateOnly => "UPDATE",
        Mode::VerifyOnly => "VERIFICATION",
    };
    if report.is_success() {
        println!(
            "{} {}",
            CHECK,
            style(format!("{} SUCCEEDED", what)).green().bold()
        );
    } else {
        println!(
            "{} {}",
            CROSS,
            style(format!("{} FAILED ({} errors)", what, report.errors.len()))
                .red()
                .bold()
        );
    }
}
