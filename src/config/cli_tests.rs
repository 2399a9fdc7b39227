//! Tests for CLI argument parsing.

use super::cli::{Cli, Command};

mod parsing {
    use super::*;
    use clap::Parser as _;

    #[test]
    fn parse_carrier_options() {
        let cli = Cli::parse_from_iter([
            "fax-relay",
            "--account-sid",
            "AC123",
            "--auth-token",
            "secret",
            "--from-number",
            "+15550001111",
            "--carrier-url",
            "https://fax.example.test/v1/",
            "--carrier-timeout",
            "12",
        ]);

        assert_eq!(cli.account_sid.as_deref(), Some("AC123"));
        assert_eq!(cli.auth_token.as_deref(), Some("secret"));
        assert_eq!(cli.from_number.as_deref(), Some("+15550001111"));
        assert_eq!(
            cli.carrier_url.as_deref(),
            Some("https://fax.example.test/v1/")
        );
        assert_eq!(cli.carrier_timeout, Some(12));
    }

    #[test]
    fn parse_delivery_options() {
        let cli = Cli::parse_from_iter([
            "fax-relay",
            "--max-attempts",
            "3",
            "--backoff-delay",
            "60",
            "--webhook-timeout",
            "10",
        ]);

        assert_eq!(cli.max_attempts, Some(3));
        assert_eq!(cli.backoff_delay, Some(60));
        assert_eq!(cli.webhook_timeout, Some(10));
    }

    #[test]
    fn parse_queue_options() {
        let cli = Cli::parse_from_iter([
            "fax-relay",
            "--fax-queue",
            "submit",
            "--retry-queue",
            "later",
            "--webhook-queue",
            "notify",
        ]);

        assert_eq!(cli.fax_queue.as_deref(), Some("submit"));
        assert_eq!(cli.retry_queue.as_deref(), Some("later"));
        assert_eq!(cli.webhook_queue.as_deref(), Some("notify"));
    }

    #[test]
    fn parse_worker_options() {
        let cli = Cli::parse_from_iter([
            "fax-relay",
            "--activation-timeout",
            "600",
            "--redelivery-delay",
            "5",
            "--max-receive-count",
            "2",
        ]);

        assert_eq!(cli.activation_timeout, Some(600));
        assert_eq!(cli.redelivery_delay, Some(5));
        assert_eq!(cli.max_receive_count, Some(2));
    }

    #[test]
    fn parse_config_and_verbose_short_flags() {
        let cli = Cli::parse_from_iter(["fax-relay", "-c", "relay.toml", "-v"]);

        assert_eq!(
            cli.config.as_deref(),
            Some(std::path::Path::new("relay.toml"))
        );
        assert!(cli.verbose);
    }

    #[test]
    fn no_args_leaves_everything_unset() {
        let cli = Cli::parse_from_iter(["fax-relay"]);

        assert!(cli.command.is_none());
        assert!(cli.max_attempts.is_none());
        assert!(cli.backoff_delay.is_none());
        assert!(cli.config.is_none());
        assert!(!cli.verbose);
        assert!(!cli.is_init());
    }

    #[test]
    fn invalid_number_is_rejected() {
        let result = Cli::try_parse_from(["fax-relay", "--max-attempts", "many"]);
        assert!(result.is_err());
    }

    #[test]
    fn negative_delay_is_rejected() {
        let result = Cli::try_parse_from(["fax-relay", "--backoff-delay", "-5"]);
        assert!(result.is_err());
    }
}

mod init_command {
    use super::*;
    use clap::Parser as _;

    #[test]
    fn init_uses_default_output() {
        let cli = Cli::parse_from_iter(["fax-relay", "init"]);

        assert!(cli.is_init());
        match cli.command {
            Some(Command::Init { output }) => {
                assert_eq!(output, std::path::PathBuf::from("fax-relay.toml"));
            }
            None => panic!("expected init command"),
        }
    }

    #[test]
    fn init_with_custom_output() {
        let cli = Cli::parse_from_iter(["fax-relay", "init", "--output", "custom.toml"]);

        match cli.command {
            Some(Command::Init { output }) => {
                assert_eq!(output, std::path::PathBuf::from("custom.toml"));
            }
            None => panic!("expected init command"),
        }
    }

    #[test]
    fn unknown_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["fax-relay", "send"]).is_err());
    }
}
