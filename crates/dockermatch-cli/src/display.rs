use colored::*;
use dockermatch_core::report::{MatchQuality, MatchReport, MatchType};
use dockermatch_core::{DockerfileAnalysis, ImageFacts, PackageCommand};

/// Print a full match report to the terminal.
pub fn print_match_report(report: &MatchReport, dockerfile: &str, image: &str) {
    println!();
    println!(
        "{}",
        format!(
            " dockermatch v{} — {} vs {}",
            env!("CARGO_PKG_VERSION"),
            dockerfile,
            image
        )
        .bold()
    );
    println!();

    let quality = match report.quality {
        MatchQuality::Excellent | MatchQuality::Good => report.quality.label().green().bold(),
        MatchQuality::Fair => report.quality.label().yellow().bold(),
        MatchQuality::Poor | MatchQuality::VeryPoor => report.quality.label().red().bold(),
    };
    println!(
        " Overall: {} ({})",
        format!("{:.1}%", report.overall * 100.0).bold(),
        quality
    );
    println!();

    println!(" {}", "Facets".bold().underline());
    for (name, facet) in &report.facets {
        let score = format!("{:>5.1}%", facet.score * 100.0);
        let score = if facet.score >= 0.8 {
            score.green()
        } else if facet.score >= 0.5 {
            score.yellow()
        } else {
            score.red()
        };
        println!(" {} {:<14} {}  {}", "|-".dimmed(), name.to_string(), score, facet.rationale.dimmed());
    }
    println!();

    if !report.layer_matches.is_empty() {
        println!(" {}", "Layer alignment".bold().underline());
        for layer_match in &report.layer_matches {
            let marker = match layer_match.match_type {
                MatchType::Exact => "=".green(),
                MatchType::Partial => "~".yellow(),
                MatchType::None => "x".red(),
            };
            let target = match layer_match.history_index {
                Some(index) => format!("history[{}]", index),
                None => "unmatched".to_string(),
            };
            println!(
                " {} instruction[{}] -> {} (score {:.2})",
                marker, layer_match.instruction_index, target, layer_match.score
            );
        }
        println!();
    }

    if !report.mismatch_reasons.is_empty() {
        println!(" {}", "Mismatch reasons".bold().underline());
        for reason in &report.mismatch_reasons {
            println!(" {} {}", "!".red(), reason);
        }
        println!();
    }
}

/// Print the parsed instruction stream.
pub fn print_instructions(analysis: &DockerfileAnalysis) {
    println!();
    println!(
        " {} (base image: {})",
        "Instruction stream".bold().underline(),
        analysis.base_image.cyan()
    );
    if !analysis.stages.is_empty() {
        println!(" stages: {}", analysis.stages.join(", ").dimmed());
    }
    println!();
    for inst in &analysis.instructions {
        println!(
            " {:>4}  {:<10} {}",
            inst.line_number.to_string().dimmed(),
            inst.kind.to_string().bold(),
            inst.raw
        );
    }
    println!();
}

/// Print an extracted package command.
pub fn print_package_command(command: &PackageCommand) {
    println!();
    println!(
        " {} {} ({})",
        command.manager.to_string().bold(),
        command.verb,
        format!("{} packages", command.packages.len()).dimmed()
    );
    for package in &command.packages {
        match command.version_constraints.get(package) {
            Some(constraint) => println!("   {} {}", package, constraint.cyan()),
            None => println!("   {}", package),
        }
    }
    println!();
}

/// Print an image facts summary.
pub fn print_image_facts(facts: &ImageFacts) {
    println!();
    println!(" {}", "Image".bold().underline());
    println!(" {} id:           {}", "|-".dimmed(), facts.id);
    println!(" {} tags:         {}", "|-".dimmed(), facts.tags.join(", "));
    println!(
        " {} platform:     {}/{}",
        "|-".dimmed(),
        facts.os,
        facts.architecture
    );
    println!(" {} size:         {} bytes", "|-".dimmed(), facts.size_bytes);
    if !facts.config.workdir.is_empty() {
        println!(" {} workdir:      {}", "|-".dimmed(), facts.config.workdir);
    }
    if let Some(cmd) = &facts.config.cmd {
        println!(" {} cmd:          {}", "|-".dimmed(), cmd.join(" "));
    }
    if let Some(entrypoint) = &facts.config.entrypoint {
        println!(" {} entrypoint:   {}", "|-".dimmed(), entrypoint.join(" "));
    }
    println!();
    println!(" {}", "History (build order)".bold().underline());
    for (index, entry) in facts.history.iter().enumerate() {
        let marker = if entry.empty_layer { "meta".dimmed() } else { "layr".cyan() };
        println!(
            " {:>3} [{}] {:<10} {}",
            index,
            marker,
            entry.kind.to_string().bold(),
            entry.cleaned
        );
    }
    println!();
}
