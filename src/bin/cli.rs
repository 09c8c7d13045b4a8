// Local validation tool for the session sync core.
// Drives scripted sessions over the in-process loopback transport so the
// protocol can be exercised without a live media relay.

use clap::{Parser, Subcommand};
use colored::*;
use rand::Rng;
use tokio::time::{timeout, Duration};
use tracing_subscriber::EnvFilter;

use tutor_sync::booking::{self, Caller};
use tutor_sync::directory::{MemoryDirectory, UserProfile};
use tutor_sync::session::client::now_ms;
use tutor_sync::session::whiteboard::{Point, Stroke};
use tutor_sync::transport::{LoopbackSession, LoopbackTransport, TrackKind};
use tutor_sync::{
    classify, Booking, Config, Role, RoomMode, SessionClient, Viewer,
};

#[derive(Parser)]
#[command(name = "tutor-sync-cli")]
#[command(about = "Session sync core validation tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scripted tutoring session over the loopback transport
    Simulate {
        /// Number of students joining the room
        #[arg(short, long, default_value_t = 2)]
        students: usize,

        /// Use Session mode instead of Homework
        #[arg(long)]
        session_mode: bool,
    },

    /// Classify an identity string
    Classify {
        identity: String,
    },

    /// Resolve a booking key against a seeded demo directory
    Resolve {
        /// Raw booking key, e.g. "B17" or "B17_1730000000000"
        key: String,

        /// Caller identity
        #[arg(short, long, default_value = "student_john")]
        caller: String,

        /// Minutes from now the demo booking starts at (may be negative)
        #[arg(long, default_value_t = 0)]
        starts_in: i64,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Simulate {
            students,
            session_mode,
        } => simulate(students, session_mode).await,
        Commands::Classify { identity } => {
            println!("{} -> {:?}", identity, classify(&identity));
        }
        Commands::Resolve {
            key,
            caller,
            starts_in,
        } => resolve_demo(&key, &caller, starts_in).await,
    }
}

type Client = SessionClient<LoopbackSession, MemoryDirectory>;

/// Drain queued transport events until the client goes quiet.
async fn drain(client: &mut Client) {
    while let Ok(keep_going) = timeout(Duration::from_millis(50), client.process_next()).await {
        if !keep_going {
            break;
        }
    }
}

fn demo_stroke() -> Stroke {
    let mut rng = rand::thread_rng();
    Stroke {
        color: "#1e66f5".to_string(),
        size_px: 3.0,
        points: (0..4)
            .map(|_| Point {
                x: rng.gen_range(0.0..1.0),
                y: rng.gen_range(0.0..1.0),
            })
            .collect(),
    }
}

async fn seed_directory(directory: &MemoryDirectory, start_time_ms: i64) {
    directory
        .insert_profile(
            "tutor_anna",
            UserProfile {
                role: Role::Tutor,
                display_name: "Anna".to_string(),
                room_id: Some("room-anna".to_string()),
            },
        )
        .await;
    directory
        .insert_booking(Booking {
            id: "B17".to_string(),
            normalized_id: "B17".to_string(),
            tutor_id: "tutor_anna".to_string(),
            student_id: None,
            start_time_ms,
            duration_min: 60,
        })
        .await;
}

async fn simulate(student_count: usize, session_mode: bool) {
    let transport = LoopbackTransport::new();
    let directory = MemoryDirectory::new();
    let config = Config::from_env();
    seed_directory(&directory, now_ms()).await;

    let mode = if session_mode {
        RoomMode::Session
    } else {
        RoomMode::Homework
    };
    println!("{}", format!("Starting {mode:?} session...").cyan());

    let mut tutor = SessionClient::join_as_tutor(
        &transport,
        directory.clone(),
        &config,
        "tutor_anna",
        "Anna",
        "room-anna",
        mode,
        session_mode.then(|| "B17".to_string()),
    )
    .await
    .expect("tutor join failed");
    tutor.session().publish_track("mic-anna", TrackKind::Audio).await;
    tutor.session().publish_track("cam-anna", TrackKind::Video).await;
    println!(
        "{} Tutor joined, status: {:?}",
        "✓".green(),
        directory.tutor_status("tutor_anna").await
    );

    let mut students: Vec<Client> = Vec::new();
    for i in 0..student_count {
        let identity = format!("student_{:04}", i);
        let display_name = format!("Student {}", i + 1);
        let mut student = SessionClient::join_with_booking(
            &transport,
            directory.clone(),
            &config,
            &identity,
            &display_name,
            "B17",
            false,
        )
        .await
        .expect("student join failed");
        let mic = format!("mic-{identity}");
        student.session().publish_track(&mic, TrackKind::Audio).await;
        drain(&mut student).await;
        students.push(student);
        println!("{} {} joined", "✓".green(), display_name);
    }
    drain(&mut tutor).await;
    println!(
        "  Tutor status now: {:?}",
        directory.tutor_status("tutor_anna").await
    );

    if !students.is_empty() {
        let first_id = students[0].state().identity().to_string();

        println!("{}", "Granting hear+speak to the first student...".cyan());
        tutor
            .set_permission(&first_id, true, true)
            .await
            .expect("permission update failed");
        for student in students.iter_mut() {
            drain(student).await;
        }
        drain(&mut tutor).await;
        println!("{} Permission replicated", "✓".green());

        println!("{}", "First student draws on their own board...".cyan());
        students[0]
            .draw_stroke(&first_id, demo_stroke())
            .await
            .expect("own-board draw failed");
        drain(&mut tutor).await;
        println!(
            "{} Tutor now caches {} stroke(s) for {}",
            "✓".green(),
            tutor.state().boards.strokes(&first_id).len(),
            first_id
        );

        match students[0].draw_stroke("tutor_anna", demo_stroke()).await {
            Err(e) => println!("{} Cross-board draw rejected: {}", "✓".green(), e),
            Ok(_) => println!("{} Cross-board draw was not rejected", "✗".red()),
        }
    }

    println!("{}", "Observer joins silently...".cyan());
    let suffix: u32 = rand::thread_rng().gen_range(1000..9999);
    let mut observer = SessionClient::join_with_booking(
        &transport,
        directory.clone(),
        &config,
        &format!("observer_{suffix}"),
        "Observer",
        "B17",
        false,
    )
    .await
    .expect("observer join failed");
    drain(&mut observer).await;
    drain(&mut tutor).await;
    for student in students.iter_mut() {
        drain(student).await;
    }

    let tutor_view = tutor.state().tiles(Viewer::Tutor);
    let admin_view = tutor.state().tiles(Viewer::Admin);
    println!(
        "{} Tutor view: {} tile(s), admin view: {} tile(s)",
        "✓".green(),
        tutor_view.len(),
        admin_view.len()
    );
    for tile in &tutor_view {
        println!(
            "    [{}] {} {}",
            format!("{:?}", tile.role).to_lowercase(),
            tile.display_name,
            if tile.track_sid.is_some() {
                "(camera)"
            } else {
                "(placeholder)"
            }
        );
    }

    println!("{}", "Tutor leaves...".cyan());
    tutor.leave().await;
    println!(
        "{} Final tutor status: {:?}, room mode cleared: {}",
        "✓".green(),
        directory.tutor_status("tutor_anna").await,
        directory.room_mode("tutor_anna").await.is_none()
    );
}

async fn resolve_demo(key: &str, caller_id: &str, starts_in_min: i64) {
    let directory = MemoryDirectory::new();
    let start = now_ms() + starts_in_min * 60_000;
    seed_directory(&directory, start).await;

    println!("{}", format!("Resolving {key} as {caller_id}...").cyan());
    let caller = if classify(caller_id) == Role::Observer {
        Caller::privileged(caller_id)
    } else {
        Caller::student(caller_id)
    };

    match booking::resolve(&directory, key, &caller, now_ms()).await {
        Ok(access) => println!("{} Joinable, room: {}", "✓".green(), access.room_id),
        Err(e) => println!("{} Not joinable: {}", "✗".red(), e),
    }
}
