use clap::{Parser, Subcommand};
use client::GameClient;
use log::info;
use shared::{PlayerId, Request, SessionId};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Identity to act as
    #[arg(short = 'p', long)]
    player: String,

    /// Milliseconds to wait for an answer
    #[arg(short = 't', long, default_value = "2000")]
    timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open a new lobby and print its room code
    Create {
        #[arg(short, long, default_value = "")]
        name: String,
    },
    /// Join a lobby by room code
    Join {
        code: String,
        #[arg(short, long, default_value = "")]
        name: String,
    },
    /// Deal roles and begin the game (host only)
    Start { session: String },
    /// Propose a chancellor (president only)
    Nominate { session: String, nominee: String },
    /// Vote on the proposed government
    Vote {
        session: String,
        #[arg(action = clap::ArgAction::Set)]
        yes: bool,
    },
    /// Discard one of the three drawn policies (president only)
    Discard { session: String, index: usize },
    /// Enact one of the two remaining policies (chancellor only)
    Enact { session: String, index: usize },
    /// Ask the president to veto the agenda (chancellor only)
    Veto { session: String },
    /// Answer a veto request (president only)
    RespondVeto {
        session: String,
        #[arg(action = clap::ArgAction::Set)]
        accept: bool,
    },
    /// Use the pending executive power (president only)
    Power {
        session: String,
        target: Option<String>,
    },
    /// Show the public state of a session
    Show { session: String },
    /// Show your secret role and any policies you hold
    Private { session: String },
}

impl Command {
    fn into_request(self) -> Request {
        match self {
            Command::Create { name } => Request::CreateSession { display_name: name },
            Command::Join { code, name } => Request::JoinSession {
                code,
                display_name: name,
            },
            Command::Start { session } => Request::StartSession {
                session_id: SessionId::new(session),
            },
            Command::Nominate { session, nominee } => Request::NominateChancellor {
                session_id: SessionId::new(session),
                nominee_id: PlayerId::new(nominee),
            },
            Command::Vote { session, yes } => Request::CastVote {
                session_id: SessionId::new(session),
                vote: yes,
            },
            Command::Discard { session, index } => Request::DiscardPolicy {
                session_id: SessionId::new(session),
                index,
            },
            Command::Enact { session, index } => Request::EnactPolicy {
                session_id: SessionId::new(session),
                index,
            },
            Command::Veto { session } => Request::RequestVeto {
                session_id: SessionId::new(session),
            },
            Command::RespondVeto { session, accept } => Request::RespondVeto {
                session_id: SessionId::new(session),
                accept,
            },
            Command::Power { session, target } => Request::UseExecutivePower {
                session_id: SessionId::new(session),
                target: target.map(PlayerId::new),
            },
            Command::Show { session } => Request::ViewSession {
                session_id: SessionId::new(session),
            },
            Command::Private { session } => Request::ViewPrivate {
                session_id: SessionId::new(session),
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();
    info!("Connecting to: {}", args.server);

    let mut client = GameClient::connect(
        &args.server,
        PlayerId::new(args.player),
        Duration::from_millis(args.timeout),
    )
    .await?;

    let response = client.request(args.command.into_request()).await;
    client.disconnect().await?;

    println!("{:#?}", response?);
    Ok(())
}
