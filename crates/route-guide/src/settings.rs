use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Route Guide - Loads a feature database and drives the route guide calls in-process
pub struct Settings {
    /// JSON feature database to load on startup
    #[clap(
        short,
        long = "db",
        value_name = "FILE",
        env = "ROUTE_GUIDE_DB",
        default_value = "testdata/route_guide_db.json"
    )]
    pub db_path: PathBuf,

    /// Capacity of the outbound stream channels
    #[clap(long, default_value = "100")]
    pub stream_buffer: usize,

    /// Number of route points to record in the RecordRoute demo
    #[clap(long, default_value = "10")]
    pub route_points: usize,

    /// Number of RouteChat sessions to run concurrently
    #[clap(long, default_value = "2")]
    pub chat_sessions: usize,

    /// Only load and summarize the database, without running the calls
    #[clap(long, default_value = "false")]
    pub skip_demo: bool,
}

impl Settings {
    /// Parse the command line, exiting with usage on error
    pub fn from_cli() -> Self {
        match Settings::try_parse() {
            Ok(args) => args,
            Err(e) => e.exit(),
        }
    }
}
