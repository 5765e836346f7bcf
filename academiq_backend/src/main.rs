use academiq_backend::config::ForumConfig;
use academiq_backend::database::models::Role;
use academiq_backend::node::ForumNode;
use academiq_backend::telemetry;
use academiq_backend::users::NewUser;
use academiq_backend::utils;
use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about = "AcademiQ forum backend")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (Axum) for REST/API access
    Serve,
    /// Create a user account and print its id
    CreateUser {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: Option<String>,
        /// STUDENT, FACULTY or ADMIN
        #[arg(long, default_value = "STUDENT")]
        role: Role,
        #[arg(long)]
        department: Option<String>,
        #[arg(long)]
        student_id: Option<String>,
        #[arg(long)]
        faculty_initials: Option<String>,
        #[arg(long)]
        faculty_position: Option<String>,
    },
    /// Issue a bearer token for an existing user and print it
    IssueToken {
        #[arg(long)]
        user_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    utils::print_banner();
    telemetry::init_tracing();

    let args = Args::parse();

    let config = ForumConfig::from_env()?;
    let node = ForumNode::start(config)?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => node.run_http_server().await,
        Command::CreateUser {
            name,
            email,
            role,
            department,
            student_id,
            faculty_initials,
            faculty_position,
        } => {
            let user = node.users().create_user(NewUser {
                name,
                email,
                role,
                department,
                student_id,
                faculty_initials,
                faculty_position,
            })?;
            println!("{}", user.id);
            Ok(())
        }
        Command::IssueToken { user_id } => {
            let token = node.sessions().issue_token(&user_id)?;
            println!("{token}");
            Ok(())
        }
    }
}
