use clap::{Parser, Subcommand};
use sheet_migrate::cli;
use sheet_migrate::error::MigrateResult;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sheet-migrate")]
#[command(about = "Carry user data from an old workbook into the current macro-enabled template.")]
#[command(long_about = "Sheet Migrate - workbook layout migration

Copies the fixed data regions of an old workbook into a fresh copy of the
current template, re-applies the dropdown lists, moves the user's ad hoc
sheets across and cleans up legacy array formulas. Everything the engine
does not own in the template (macros, drawings, themes) is kept as-is.

COMMANDS:
  migrate  - Migrate an old workbook into the template
  inspect  - Show a workbook's sheets, used ranges and validations
  plan     - Print the migration plan as YAML

EXAMPLES:
  sheet-migrate migrate old.xlsx --template template.xlsm --output new.xlsm
  sheet-migrate migrate old.xlsx -t template.xlsm -o new.xlsm --plan plan.yaml -v
  sheet-migrate plan > plan.yaml
  sheet-migrate inspect new.xlsm")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(long_about = "Migrate an old workbook into the template.

STEPS (in order):
  1. Copy each fixed region (values and number formats), rewriting
     {=EndDayOfCurrentMonth} into =EndOfCurrentMonth
  2. Re-apply the list validations on the template
  3. Move every sheet between 'AD HOC→' and 'FOOTNOTES→' to just after
     the template's 'AD HOC→'
  4. Strip legacy {=...} braces left in any formula text

Nothing is written if any step fails. Use --plan to migrate with a
customised catalog (see 'sheet-migrate plan').")]
    /// Migrate an old workbook into the template
    Migrate {
        /// Path to the old workbook (.xlsx / .xlsm)
        source: PathBuf,

        /// Path to the macro-enabled template (.xlsm)
        #[arg(short, long)]
        template: PathBuf,

        /// Where to write the migrated workbook
        #[arg(short, long)]
        output: PathBuf,

        /// YAML migration plan (defaults to the built-in plan)
        #[arg(short, long)]
        plan: Option<PathBuf>,

        /// Show progress checkpoints and engine logs
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show a workbook's sheets, used ranges and validations
    Inspect {
        /// Path to the workbook (.xlsx / .xlsm)
        file: PathBuf,
    },

    #[command(long_about = "Print the migration plan as YAML.

With no arguments the built-in plan is printed; edit it and pass it back
with 'migrate --plan'. With --input an existing plan is validated and
re-printed with every default filled in.")]
    /// Print the migration plan as YAML
    Plan {
        /// Existing plan to validate and normalise
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sheet_migrate=info".into()),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> MigrateResult<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Migrate {
            source,
            template,
            output,
            plan,
            verbose,
        } => {
            if verbose {
                init_tracing();
            }
            cli::migrate(source, template, output, plan, verbose)
        }

        Commands::Inspect { file } => cli::inspect(file),

        Commands::Plan { input, output } => cli::plan(input, output),
    }
}
