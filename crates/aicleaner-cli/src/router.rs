// Command routing and dispatch

use std::path::PathBuf;

use aicleaner_config::RuntimeSettings;
use clap::{Parser, Subcommand};

use crate::commands::*;
use crate::error::CliResult;

/// AICleaner - configuration migration and AI provider diagnostics
#[derive(Parser, Debug)]
#[command(name = "aicleaner")]
#[command(bin_name = "aicleaner")]
#[command(about = "AICleaner configuration migration and AI provider diagnostics")]
#[command(
    long_about = "AICleaner runtime core.\n\nMigrates legacy add-on configuration into a single unified file, with backup and rollback, and exercises the AI provider selector.\n\nQuick start:\n  • aicleaner detect     Show legacy files and migration status\n  • aicleaner migrate    Merge legacy files into the unified file\n  • aicleaner rollback   Restore the files from the newest backup\n  • aicleaner providers  Show provider health"
)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Errors only
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log level when neither --verbose nor --quiet is given
    #[arg(long, global = true, env = "AICLEANER_LOG_LEVEL", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Directory holding the add-on configuration
    #[arg(long, global = true, env = "AICLEANER_CONFIG_DIR", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// Unified configuration file (default: <config-dir>/aicleaner/config.yaml)
    #[arg(long, global = true, env = "AICLEANER_UNIFIED_CONFIG", value_name = "FILE")]
    pub unified: Option<PathBuf>,

    /// Where migration backups are kept (default: <config-dir>/.aicleaner_backups)
    #[arg(long, global = true, env = "AICLEANER_BACKUP_DIR", value_name = "DIR")]
    pub backup_dir: Option<PathBuf>,

    /// Do not migrate legacy files before running a command
    #[arg(long, global = true)]
    pub skip_migration: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// List legacy configuration files and migration status
    Detect,

    /// Merge legacy files into the unified configuration
    Migrate {
        /// Show the merge result without writing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Restore the files replaced by a migration
    Rollback {
        /// Backup directory (default: newest backup)
        #[arg(value_name = "BACKUP_DIR")]
        backup: Option<PathBuf>,
    },

    /// List migration backups
    Backups,

    /// Validate a configuration file
    Validate {
        /// File to validate (default: the unified file)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Show configured providers and their circuit state
    Providers {
        /// Run each provider's health check
        #[arg(long)]
        check: bool,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Analyze a snapshot with the first available provider
    Analyze {
        /// Image file to analyze
        #[arg(long, value_name = "FILE")]
        image: PathBuf,

        /// Instructions for the model
        #[arg(long)]
        prompt: String,

        /// Zone the snapshot belongs to
        #[arg(long)]
        zone: Option<String>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

impl Commands {
    /// Subcommand name as typed on the command line
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Detect => "detect",
            Commands::Migrate { .. } => "migrate",
            Commands::Rollback { .. } => "rollback",
            Commands::Backups => "backups",
            Commands::Validate { .. } => "validate",
            Commands::Providers { .. } => "providers",
            Commands::Analyze { .. } => "analyze",
        }
    }
}

impl Cli {
    /// Runtime settings from the environment, overridden by flags
    pub fn settings(&self) -> RuntimeSettings {
        self.settings_from(RuntimeSettings::from_env())
    }

    fn settings_from(&self, mut settings: RuntimeSettings) -> RuntimeSettings {
        if let Some(dir) = &self.config_dir {
            settings = settings.with_config_dir(dir);
        }
        if let Some(path) = &self.unified {
            settings = settings.with_unified_path(path);
        }
        if let Some(dir) = &self.backup_dir {
            settings = settings.with_backup_dir(dir);
        }
        if let Some(level) = &self.log_level {
            settings.log_level = Some(level.to_lowercase());
        }
        settings.skip_migration |= self.skip_migration;
        settings
    }
}

/// Command router
pub struct CommandRouter;

impl CommandRouter {
    /// Build the handler for a parsed command line
    pub fn handler(cli: &Cli) -> Box<dyn Command> {
        let settings = cli.settings();
        match cli.command.clone() {
            Commands::Detect => Box::new(DetectCommand::new(settings)),
            Commands::Migrate { dry_run } => Box::new(MigrateCommand::new(settings, dry_run)),
            Commands::Rollback { backup } => Box::new(RollbackCommand::new(settings, backup)),
            Commands::Backups => Box::new(BackupsCommand::new(settings)),
            Commands::Validate { file } => Box::new(ValidateCommand::new(settings, file)),
            Commands::Providers { check, json } => {
                Box::new(ProvidersCommand::new(settings, check, json))
            }
            Commands::Analyze {
                image,
                prompt,
                zone,
                json,
            } => Box::new(AnalyzeCommand::new(settings, image, prompt, zone, json)),
        }
    }

    /// Execute a parsed command line
    pub async fn execute(cli: &Cli) -> CliResult<()> {
        Self::handler(cli).execute().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_rollback_with_directory() {
        let cli = Cli::try_parse_from(["aicleaner", "rollback", "/backups/migration-1"]).unwrap();
        match cli.command {
            Commands::Rollback { backup } => {
                assert_eq!(backup, Some(PathBuf::from("/backups/migration-1")))
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_analyze() {
        let cli = Cli::try_parse_from([
            "aicleaner",
            "analyze",
            "--image",
            "kitchen.jpg",
            "--prompt",
            "What needs cleaning?",
            "--zone",
            "Kitchen",
        ])
        .unwrap();
        match cli.command {
            Commands::Analyze { image, zone, json, .. } => {
                assert_eq!(image, PathBuf::from("kitchen.jpg"));
                assert_eq!(zone.as_deref(), Some("Kitchen"));
                assert!(!json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_analyze_requires_prompt() {
        assert!(Cli::try_parse_from(["aicleaner", "analyze", "--image", "a.jpg"]).is_err());
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["aicleaner", "-v", "-q", "detect"]).is_err());
    }

    #[test]
    fn test_flags_override_settings() {
        let cli = Cli::try_parse_from([
            "aicleaner",
            "--config-dir",
            "/data",
            "--backup-dir",
            "/backups",
            "--skip-migration",
            "detect",
        ])
        .unwrap();
        let settings = cli.settings_from(RuntimeSettings::default());

        assert_eq!(settings.config_dir, PathBuf::from("/data"));
        assert_eq!(settings.backup_root(), PathBuf::from("/backups"));
        assert!(settings.skip_migration);
        assert_eq!(
            settings.legacy_paths().unified(),
            PathBuf::from("/data/aicleaner/config.yaml")
        );
    }
}
