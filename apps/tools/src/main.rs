use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use geocompute_integration::auth::{mint_access_token, AccessTokenConfig};
use ndvi_core::boundary_from_file;

#[derive(Parser, Debug)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a boundary file and print its geometry summary.
    InspectBoundary {
        path: PathBuf,
    },
    /// Mint a gateway bearer token for manual API calls.
    MintToken {
        #[arg(long)]
        api_key: String,
        #[arg(long)]
        api_secret_b64: String,
        #[arg(long, default_value_t = 3600)]
        ttl_seconds: i64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::InspectBoundary { path } => {
            let boundary = boundary_from_file(&path)?;
            println!("geometry type: {}", boundary.geometry_type());
            println!("vertices: {}", boundary.vertex_count());
            if let Some([min_lon, min_lat, max_lon, max_lat]) = boundary.bounding_box() {
                println!("bbox: [{min_lon}, {min_lat}] .. [{max_lon}, {max_lat}]");
            }
        }
        Command::MintToken {
            api_key,
            api_secret_b64,
            ttl_seconds,
        } => {
            let token = mint_access_token(&AccessTokenConfig {
                api_key,
                api_secret_b64,
                ttl_seconds,
            })?;
            println!("{token}");
        }
    }

    Ok(())
}
