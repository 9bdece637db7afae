//! Sheet migration server binary
//!
//! HTTP front end: upload an old workbook, download it migrated into the template.

use std::path::PathBuf;

use clap::Parser;
use sheet_migrate::api::{run_api_server, ApiConfig};
use sheet_migrate::progress::{DEFAULT_CAPACITY, DEFAULT_TTL_SECS};

#[derive(Parser, Debug)]
#[command(name = "sheet-migrate-server")]
#[command(version)]
#[command(author = "RoyalBit Inc. <admin@royalbit.ca>")]
#[command(about = "Sheet Migration Server - upload an old workbook, download it in the current template")]
#[command(long_about = r#"
Sheet Migration Server - HTTP front end for the migration engine

Endpoints:
  - POST /upload           - Multipart field 'file' (the old workbook);
                             responds with the migrated workbook
  - GET  /progress/:id     - Progress of an upload (0-100, state, message)
  - GET  /health           - Health check
  - GET  /version          - Server version info
  - GET  /                 - API documentation

Features:
  - CORS enabled for cross-origin requests
  - Graceful shutdown on SIGINT/SIGTERM
  - Request ids from X-Request-Id or ?request_id=, echoed back
  - Tracing and structured logging (RUST_LOG)

Example usage:
  sheet-migrate-server --template template.xlsm
  sheet-migrate-server --host 0.0.0.0 --port 8000 --template template.xlsm --plan plan.yaml

  curl -F "file=@old.xlsx" -H "X-Request-Id: job-1" \
    -o updated_template.xlsm http://localhost:5000/upload
  curl http://localhost:5000/progress/job-1
"#)]
struct Args {
    /// Host address to bind to (use 0.0.0.0 for all interfaces)
    #[arg(short = 'H', long, default_value = "127.0.0.1", env = "SHEET_MIGRATE_HOST")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "5000", env = "SHEET_MIGRATE_PORT")]
    port: u16,

    /// Macro-enabled template every upload is migrated into
    #[arg(short, long, env = "SHEET_MIGRATE_TEMPLATE")]
    template: PathBuf,

    /// YAML migration plan (defaults to the built-in plan)
    #[arg(long, env = "SHEET_MIGRATE_PLAN")]
    plan: Option<PathBuf>,

    /// Largest accepted upload, in megabytes
    #[arg(long, default_value = "50", env = "SHEET_MIGRATE_MAX_UPLOAD_MB")]
    max_upload_mb: usize,

    /// Progress entries kept at once
    #[arg(long, default_value_t = DEFAULT_CAPACITY)]
    progress_capacity: usize,

    /// Seconds a finished upload's progress stays queryable
    #[arg(long, default_value_t = DEFAULT_TTL_SECS)]
    progress_ttl: i64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = ApiConfig {
        host: args.host,
        port: args.port,
        template_path: args.template,
        plan_path: args.plan,
        max_upload_bytes: args.max_upload_mb.saturating_mul(1024 * 1024),
        progress_capacity: args.progress_capacity,
        progress_ttl_secs: args.progress_ttl,
    };

    run_api_server(config).await
}
