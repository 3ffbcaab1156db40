use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use env_logger::Env;
use log::{LevelFilter, debug};
use ptrauth_core::{
    OptionsBuilder, PointerAuthFeatures, PointerAuthFlag, PointerAuthOptions, SigningSchema,
    SigningTechnology, TargetArch, stable_string_hash, string_discriminator,
};
use serde::Serialize;

#[derive(Parser)]
#[command(
    name = "ptrauth-demo",
    author,
    version,
    about = "Inspect resolved pointer-authentication options"
)]
struct Cli {
    #[arg(long, global = true)]
    debug: bool,
    #[arg(long, global = true, value_enum, default_value = "arm64e")]
    arch: ArchArg,
    /// Use the software signing keys instead of the hardware key file.
    #[arg(long, global = true)]
    software: bool,
    /// Extra `-fptrauth-*` / `-fno-ptrauth-*` flags, applied in order.
    #[arg(long = "flag", global = true, value_name = "FLAG", allow_hyphen_values = true)]
    flags: Vec<String>,
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ArchArg {
    Arm64,
    Arm64e,
}

impl From<ArchArg> for TargetArch {
    fn from(arg: ArchArg) -> Self {
        match arg {
            ArchArg::Arm64 => TargetArch::Arm64,
            ArchArg::Arm64e => TargetArch::Arm64e,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the schema of every pointer category and the ABI flags.
    Show {
        /// Disable a category after the defaults are installed (e.g. `CXXVTablePointers`).
        #[arg(long = "disable", value_name = "CATEGORY")]
        disabled: Vec<String>,
    },
    /// Print the forwarded `-fptrauth-*` driver flags.
    Flags,
    /// Compute the stable hash and 16-bit discriminator of a string.
    Discriminator {
        #[arg(long, value_name = "TEXT")]
        string: String,
    },
}

#[derive(Serialize)]
struct DiscriminatorReport<'a> {
    string: &'a str,
    hash: u64,
    discriminator: u16,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);
    let features = resolve_features(&cli)?;
    match &cli.command {
        Commands::Show { disabled } => {
            let options = build_options(features, disabled)?;
            cmd_show(&options, cli.json)
        }
        Commands::Flags => cmd_flags(&features, cli.json),
        Commands::Discriminator { string } => cmd_discriminator(string, cli.json),
    }
}

fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or(default));
    builder.format_timestamp(None);
    if debug {
        builder.filter_level(LevelFilter::Debug);
    }
    let _ = builder.try_init();
}

fn resolve_features(cli: &Cli) -> Result<PointerAuthFeatures> {
    let arch: TargetArch = cli.arch.into();
    let technology = if cli.software {
        SigningTechnology::Software
    } else {
        SigningTechnology::Hardware
    };
    let mut features = PointerAuthFeatures::for_arch(arch).with_technology(technology);
    for flag in &cli.flags {
        features
            .apply_flag(flag)
            .with_context(|| format!("applying driver flag {flag}"))?;
    }
    debug!("resolved features for {arch}: {features:?}");
    Ok(features)
}

fn build_options(features: PointerAuthFeatures, disabled: &[String]) -> Result<PointerAuthOptions> {
    let mut builder = OptionsBuilder::new(features);
    for category in disabled {
        builder = builder
            .with_schema_named(category, SigningSchema::disabled())
            .with_context(|| format!("disabling {category}"))?;
    }
    Ok(builder.build())
}

fn cmd_show(options: &PointerAuthOptions, json: bool) -> Result<()> {
    if json {
        return print_json(options);
    }
    for (category, schema) in options.schemas() {
        println!("{:<36} {}", category.name(), schema);
    }
    for flag in PointerAuthFlag::ALL {
        println!("{:<36} {}", flag.name(), options.flag(flag));
    }
    Ok(())
}

fn cmd_flags(features: &PointerAuthFeatures, json: bool) -> Result<()> {
    let flags = features.driver_flags();
    if json {
        return print_json(&flags);
    }
    if flags.is_empty() {
        println!("(no pointer-auth flags)");
    } else {
        println!("{}", flags.join(" "));
    }
    Ok(())
}

fn cmd_discriminator(string: &str, json: bool) -> Result<()> {
    let report = DiscriminatorReport {
        string,
        hash: stable_string_hash(string),
        discriminator: string_discriminator(string),
    };
    if json {
        return print_json(&report);
    }
    println!(
        "{:?}: hash={:#018x} discriminator={:#06x}",
        report.string, report.hash, report.discriminator
    );
    Ok(())
}

fn print_json<T: ?Sized + Serialize>(value: &T) -> Result<()> {
    let serialized = serde_json::to_string_pretty(value).context("serializing output")?;
    println!("{serialized}");
    Ok(())
}
