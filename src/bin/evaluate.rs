use std::error::Error;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::Parser;
use plotters::prelude::*;
use tracing_subscriber::EnvFilter;

use unobot::bots::{create_bot_from_spec, label_for_spec};
use unobot::{ActionSpace, Bot, EvaluationConfig, EvaluationReport, evaluate_agent};

const DEFAULT_SEED: u64 = 0xC0FFEE_u64 << 32 | 0x5EED_u64;

#[derive(Parser, Debug)]
#[command(
    name = "evaluate",
    about = "Measure how often a bot wins from seat 0 against a set of opponents."
)]
struct Args {
    /// Spec of the evaluated bot, e.g. agent:checkpoints/uno.bin:hard
    #[arg(long)]
    agent: String,

    /// Opponent specs for seats 1.. (1-3 entries)
    #[arg(default_values_t = [String::from("random")])]
    opponents: Vec<String>,

    /// Number of games to play
    #[arg(short = 'g', long = "games", default_value_t = 100)]
    games: usize,

    /// Base RNG seed; game i is shuffled with seed + i
    #[arg(short = 's', long = "seed", default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Safety cap on steps per game; longer games count as unfinished
    #[arg(long = "max-steps", default_value_t = 2000)]
    max_steps: usize,

    /// Output chart file (png)
    #[arg(short = 'o', long = "out")]
    out: Option<PathBuf>,

    /// Print the report as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Optional JSON action-space file (defaults to the standard layout)
    #[arg(long)]
    action_space: Option<PathBuf>,
}

fn main() {
    init_tracing();
    let args = Args::parse();
    if let Err(err) = run(args) {
        eprintln!("Error: {err}");
        process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    if args.opponents.is_empty() || args.opponents.len() > 3 {
        return Err(format!(
            "expected between 1 and 3 opponents, received {}",
            args.opponents.len()
        )
        .into());
    }
    let action_space = Arc::new(match &args.action_space {
        Some(path) => ActionSpace::load(path)?,
        None => ActionSpace::standard(),
    });

    let mut agent = create_bot_from_spec(&args.agent, 0, args.seed, &action_space)?;
    let mut opponents: Vec<Box<dyn Bot>> = Vec::with_capacity(args.opponents.len());
    for (offset, spec) in args.opponents.iter().enumerate() {
        opponents.push(create_bot_from_spec(spec, offset + 1, args.seed, &action_space)?);
    }

    let config = EvaluationConfig {
        num_players: args.opponents.len() + 1,
        games: args.games,
        seed: args.seed,
        max_steps: args.max_steps,
    };
    let report = evaluate_agent(agent.as_mut(), &mut opponents, &action_space, config)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if let Some(out) = &args.out {
        let mut labels = vec![format!("{} (seat 0)", label_for_spec(&args.agent))];
        labels.extend(
            args.opponents
                .iter()
                .enumerate()
                .map(|(offset, spec)| format!("{} (seat {})", label_for_spec(spec), offset + 1)),
        );
        render_bar_chart(out, &labels, &report)?;
        println!("\nChart written to {}", out.display());
    }
    Ok(())
}

fn print_report(report: &EvaluationReport) {
    println!("Evaluation Results:");
    println!("Win Rate: {:.2}", report.win_rate());
    println!("Average Steps: {:.2}", report.average_steps());
    println!("Average Cards Drawn: {:.2}", report.average_cards_drawn());
    for (seat, wins) in report.seat_wins.iter().enumerate() {
        println!("  seat {seat}: {wins}/{} wins", report.games);
    }
    if report.unfinished > 0 {
        println!(
            "\nNote: {} game(s) hit the step limit without a winner.",
            report.unfinished
        );
    }
}

fn render_bar_chart(
    out: &Path,
    labels: &[String],
    report: &EvaluationReport,
) -> Result<(), Box<dyn Error>> {
    let games = report.games.max(1) as f64;
    let values: Vec<f64> = report
        .seat_wins
        .iter()
        .map(|wins| *wins as f64 / games * 100.0)
        .collect();

    let root = BitMapBackend::new(out, (1000, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| format!("{e}"))?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Uno Win Rates (per seat)", ("sans-serif", 28).into_font())
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d((0..values.len()).into_segmented(), 0.0f64..100.0)
        .map_err(|e| format!("{e}"))?;

    chart
        .configure_mesh()
        .y_desc("Win rate (%)")
        .x_desc("Seat")
        .x_labels(values.len())
        .x_label_formatter(&|segment| match segment {
            SegmentValue::CenterOf(idx) if *idx < labels.len() => labels[*idx].clone(),
            _ => String::new(),
        })
        .y_label_formatter(&|v| format!("{v:.0}"))
        .light_line_style(&WHITE.mix(0.0))
        .draw()
        .map_err(|e| format!("{e}"))?;

    chart
        .draw_series(values.iter().enumerate().map(|(i, value)| {
            let mut bar = Rectangle::new(
                [(SegmentValue::Exact(i), 0.0), (SegmentValue::Exact(i + 1), *value)],
                BLUE.filled(),
            );
            bar.set_margin(0, 0, 20, 20);
            bar
        }))
        .map_err(|e| format!("{e}"))?;

    root.present().map_err(|e| format!("{e}"))?;
    Ok(())
}
