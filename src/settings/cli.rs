use super::Parser;
use clap::Subcommand;

#[derive(Parser, Debug)]
#[command(name = "boxoffice", about = "Ticketing client with automatic session refresh")]
pub struct Cli {
    #[arg(long)]
    pub settings: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign in and persist the session.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "BOXOFFICE_PASSWORD")]
        password: String,
    },
    /// Create an account and persist the session.
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long, env = "BOXOFFICE_PASSWORD")]
        password: String,
        #[arg(long)]
        name: String,
    },
    /// End the session locally and on the auth service.
    Logout,
    /// Show the signed-in user.
    Whoami,
    /// Fetch the signed-in user's account record from the auth service.
    Profile,
    /// List the signed-in user's active sessions.
    Sessions,
    /// List events from the inventory service.
    Events,
    /// List the signed-in user's bookings.
    Bookings,
    /// Issue an authenticated GET and print the body.
    Get { url: String },
}
