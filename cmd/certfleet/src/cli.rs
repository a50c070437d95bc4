use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use pkg_constants::paths::DEFAULT_CONFIG;
use pkg_deploy::ArtifactProfile;
use pkg_types::NodeGroup;

#[derive(Parser, Debug)]
#[command(
    name = "certfleet",
    about = "Private PKI and certificate rollout for a server fleet"
)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(long, short, global = true, default_value = DEFAULT_CONFIG)]
    pub config: String,

    /// Local certificate directory
    #[arg(long, global = true)]
    pub cert_dir: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Wipe the certificate directory, create a new root CA and issue one
    /// certificate per manifest node
    Generate(GenerateArgs),
    /// Issue the shared HTTP-layer certificate from the existing CA
    HttpCerts(HttpCertsArgs),
    /// Push certificates to every manifest node
    Deploy(DeployArgs),
    /// Decode a PEM certificate
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Fleet manifest (YAML with `instances` or `nodes`)
    #[arg(long, short)]
    pub manifest: PathBuf,

    /// Node certificate validity in days
    #[arg(long)]
    pub days: Option<u32>,

    /// Encrypt node keys with this passphrase
    #[arg(long, env = "CERTFLEET_KEY_PASSPHRASE", hide_env_values = true)]
    pub passphrase: Option<String>,
}

#[derive(Args, Debug)]
pub struct HttpCertsArgs {
    /// SAN alias (DNS name or IP); repeatable
    #[arg(long = "alias")]
    pub aliases: Vec<String>,
}

#[derive(Args, Debug)]
pub struct DeployArgs {
    /// Fleet manifest (YAML with `instances` or `nodes`)
    #[arg(long, short)]
    pub manifest: PathBuf,

    /// Remote login user
    #[arg(long, short)]
    pub user: String,

    /// Remote login password (uses sshpass)
    #[arg(long, env = "CERTFLEET_SSH_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// SSH private key for the login
    #[arg(long)]
    pub identity: Option<PathBuf>,

    /// Certificate set to deploy: transport or http
    #[arg(long, default_value = "transport")]
    pub profile: ArtifactProfile,

    /// Restrict to node groups (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub groups: Vec<NodeGroup>,

    /// Nodes deployed at once
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Regenerate certificates before deploying
    #[arg(long)]
    pub regenerate: bool,

    /// Node certificate validity in days, with --regenerate
    #[arg(long)]
    pub days: Option<u32>,

    /// Key passphrase: encrypts keys on --regenerate and is stored in each
    /// node's secret store
    #[arg(long, env = "CERTFLEET_KEY_PASSPHRASE", hide_env_values = true)]
    pub passphrase: Option<String>,

    /// Leave the node secret store untouched
    #[arg(long)]
    pub skip_secret_store: bool,

    /// Run remote commands without sudo
    #[arg(long)]
    pub no_sudo: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// PEM certificate to decode
    pub path: PathBuf,

    /// Also verify the certificate against this CA
    #[arg(long)]
    pub ca: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_deploy() {
        let cli = Cli::try_parse_from([
            "certfleet",
            "deploy",
            "--manifest",
            "instances.yml",
            "--user",
            "ubuntu",
            "--profile",
            "http",
            "--groups",
            "master,data",
            "--concurrency",
            "4",
            "--output",
            "json",
        ])
        .unwrap();
        let Commands::Deploy(args) = cli.command else {
            panic!("expected deploy");
        };
        assert_eq!(args.profile, ArtifactProfile::Http);
        assert_eq!(args.groups, vec![NodeGroup::Master, NodeGroup::Data]);
        assert_eq!(args.concurrency, Some(4));
        assert_eq!(args.output, OutputFormat::Json);
        assert!(!args.regenerate);
    }

    #[test]
    fn unknown_group_is_rejected() {
        assert!(
            Cli::try_parse_from([
                "certfleet", "deploy", "-m", "i.yml", "-u", "x", "--groups", "hot",
            ])
            .is_err()
        );
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "certfleet",
            "http-certs",
            "--alias",
            "localhost",
            "--alias",
            "10.0.0.1",
            "--cert-dir",
            "/tmp/certs",
        ])
        .unwrap();
        assert_eq!(cli.cert_dir.as_deref(), Some("/tmp/certs"));
        let Commands::HttpCerts(args) = cli.command else {
            panic!("expected http-certs");
        };
        assert_eq!(args.aliases, vec!["localhost", "10.0.0.1"]);
    }
}
