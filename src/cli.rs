use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "listend",
    version,
    about = "Listen event store and user profile API"
)]
pub struct Args {
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,
    #[arg(long, default_value_t = 8100)]
    pub port: u16,
    #[arg(long, default_value_t = false)]
    pub print_openapi: bool,
}
