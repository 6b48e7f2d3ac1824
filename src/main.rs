use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::info;

use campus_geofence::attendance::{
    student_id_for, Attempt, AttendanceError, AttendanceFlow, AttendanceStore,
    AttendanceSummary, Identity, StaticIdentity,
};
use campus_geofence::location::ReplayProvider;
use campus_geofence::{Config, VerificationDecision, DEFAULT_CONFIG_FILE};

#[derive(Parser)]
#[command(name = "campus-geofence")]
#[command(about = "Geofenced attendance verification")]
struct Cli {
    /// Configuration file [default: config.yaml, built-in defaults if absent]
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration file
    CheckConfig,
    /// Fuse recorded fixes and decide whether they are on campus
    Verify {
        /// YAML list of fixes
        #[arg(long)]
        samples: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Manage attendance sessions
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },
    /// Verify recorded fixes and mark attendance
    Mark {
        #[arg(long)]
        samples: PathBuf,
        #[arg(long)]
        session: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: Option<String>,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Attendance history of a student
    Records {
        #[arg(long)]
        email: String,
    },
}

#[derive(Subcommand)]
enum SessionCommands {
    Open { class_name: String },
    Close { id: String },
    List,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => Config::from_file(path),
        None => Config::from_file_or_default(DEFAULT_CONFIG_FILE),
    };
    let config = match loaded {
        Ok(c) => c,
        Err(e) => {
            let path = cli
                .config
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            eprintln!("Error loading {}: {}", path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::CheckConfig => check_config(&config),
        Commands::Verify { samples, json } => verify(&config, &samples, json).await,
        Commands::Session { command } => session(&config, command),
        Commands::Mark {
            samples,
            session,
            email,
            name,
            yes,
        } => mark(&config, &samples, &session, email, name, yes).await,
        Commands::Records { email } => records(&config, &email),
    }
}

fn check_config(config: &Config) -> ExitCode {
    let verifier = match config.verifier() {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    println!("Configuration is valid");
    println!(
        "  campus: {} ({:.6}, {:.6}) @ {:.0}m",
        config.campus.name.as_deref().unwrap_or("unnamed"),
        verifier.reference.latitude,
        verifier.reference.longitude,
        verifier.reference.elevation
    );
    println!(
        "  allowed distance: {:.0}m, max accuracy: {:.0}m, algorithm: {}",
        verifier.threshold_m, verifier.policy.max_acceptable_accuracy_m, verifier.algorithm
    );
    println!("  storage: {}", config.storage.base_folder.display());
    ExitCode::SUCCESS
}

async fn verify(config: &Config, samples: &Path, json: bool) -> ExitCode {
    let (verifier, mut sampler) = match (config.verifier(), config.sampler()) {
        (Ok(v), Ok(s)) => (v, s),
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let mut provider = match ReplayProvider::from_file(samples) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error reading {}: {}", samples.display(), e);
            return ExitCode::FAILURE;
        }
    };

    // Replay every recorded fix
    sampler.samples = provider.remaining();
    let fixes = sampler.acquire(&mut provider).await;

    let decision = match verifier.verify(&fixes) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if json {
        match serde_json::to_string_pretty(&decision) {
            Ok(out) => println!("{}", out),
            Err(e) => {
                eprintln!("Error serializing decision: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        print_decision(&decision);
    }

    if decision.within_range {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    }
}

fn session(config: &Config, command: SessionCommands) -> ExitCode {
    let store = config.store();
    let result = match command {
        SessionCommands::Open { class_name } => store.open_session(&class_name).map(|s| {
            println!("Opened session {} for {}", s.id, s.class_name);
        }),
        SessionCommands::Close { id } => store.close_session(&id).map(|s| {
            println!("Closed session {} ({})", s.id, s.class_name);
        }),
        SessionCommands::List => store.active_sessions().map(|sessions| {
            if sessions.is_empty() {
                println!("No active sessions");
            }
            for s in sessions {
                println!("  {}  {}  started {}", s.id, s.class_name, s.started_at);
            }
        }),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn mark(
    config: &Config,
    samples: &Path,
    session_id: &str,
    email: String,
    name: Option<String>,
    yes: bool,
) -> ExitCode {
    let (verifier, sampler) = match (config.verifier(), config.sampler()) {
        (Ok(v), Ok(s)) => (v, s),
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let provider = match ReplayProvider::from_file(samples) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error reading {}: {}", samples.display(), e);
            return ExitCode::FAILURE;
        }
    };
    let identity = StaticIdentity(Some(Identity {
        id: email.clone(),
        email: Some(email),
        name,
    }));

    let mut flow = AttendanceFlow::new(verifier, sampler, provider, identity, config.store());

    let decision = match flow.begin(session_id).await {
        Ok(Attempt::Confirming(pending)) => pending.decision,
        Ok(Attempt::Denied(decision)) => {
            print_decision(&decision);
            eprintln!(
                "{}",
                AttendanceError::OutOfRange {
                    distance_m: decision.distance_m,
                    threshold_m: decision.threshold_m,
                }
            );
            return ExitCode::from(2);
        }
        Err(e) => {
            report_attendance_error(&e);
            return ExitCode::FAILURE;
        }
    };

    print_decision(&decision);
    if !yes && !confirm_prompt("Mark attendance?") {
        flow.cancel();
        println!("Cancelled");
        return ExitCode::SUCCESS;
    }

    match flow.confirm() {
        Ok(record) => {
            info!("Record {} written", record.id);
            println!(
                "Attendance marked for {} in session {}",
                record.student_name, record.session_id
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            report_attendance_error(&e);
            ExitCode::FAILURE
        }
    }
}

fn report_attendance_error(err: &AttendanceError) {
    eprintln!("{}", err);
    if err.is_retryable() {
        eprintln!("This may be temporary, please try again.");
    }
}

fn records(config: &Config, email: &str) -> ExitCode {
    let records = match config.store().records_for_student(student_id_for(email)) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    for r in &records {
        println!(
            "  {}  {}  {}  {:.1}m",
            r.marked_at.format("%Y-%m-%d %H:%M"),
            r.session_id,
            r.status,
            r.distance_m
        );
    }
    let summary = AttendanceSummary::from_records(&records);
    println!(
        "{} sessions: {} present, {} late, {} absent ({:.0}%)",
        summary.total,
        summary.present,
        summary.late,
        summary.absent,
        summary.percentage()
    );
    ExitCode::SUCCESS
}

fn print_decision(decision: &VerificationDecision) {
    println!(
        "Distance: {:.1}m (allowed {:.0}m)",
        decision.distance_m, decision.threshold_m
    );
    println!(
        "Accuracy: ±{:.1}m ({} precision, {} sample{}{})",
        decision.accuracy_m,
        decision.precision(),
        decision.sample_count,
        if decision.sample_count == 1 { "" } else { "s" },
        if decision.fallback { ", fallback" } else { "" }
    );
    println!("Algorithm: {}", decision.algorithm);
    println!(
        "Result: {}",
        if decision.within_range {
            "within range"
        } else {
            "out of range"
        }
    );
}

fn confirm_prompt(question: &str) -> bool {
    print!("{} [y/N] ", question);
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
