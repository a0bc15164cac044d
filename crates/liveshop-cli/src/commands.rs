//! Command-line parsing and command handlers.

use anyhow::{bail, Context, Result};
use tracing::warn;

use liveshop_core::{AuthStore, Config, Method, RegisterData};

pub const USAGE: &str = "\
Usage: liveshop [--ephemeral] <command>

Commands:
  login <email>                               Sign in (prompts for password)
  register <email> <username> <first> <last>  Create an account and sign in
  logout                                      Sign out and forget stored credentials
  whoami                                      Restore the saved session and show the user
  get <path>                                  Authenticated GET, prints the response data
  help                                        Show this message

Options:
  --ephemeral   Keep credentials in memory only

Environment:
  LIVESHOP_API_URL   API base URL (default http://localhost:3000/api)
  RUST_LOG           Log filter (default warn)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { email: String },
    Register { email: String, username: String, first_name: String, last_name: String },
    Logout,
    WhoAmI,
    Get { path: String },
    Help,
}

/// Parse arguments into a command and the `--ephemeral` flag
pub fn parse(args: &[String]) -> Result<(Command, bool)> {
    let ephemeral = args.iter().any(|a| a == "--ephemeral");
    let rest: Vec<&str> = args
        .iter()
        .map(String::as_str)
        .filter(|a| *a != "--ephemeral")
        .collect();

    let command = match rest.as_slice() {
        [] | ["help"] | ["--help"] | ["-h"] => Command::Help,
        ["login", email] => Command::Login { email: email.to_string() },
        ["register", email, username, first, last] => Command::Register {
            email: email.to_string(),
            username: username.to_string(),
            first_name: first.to_string(),
            last_name: last.to_string(),
        },
        ["logout"] => Command::Logout,
        ["whoami"] => Command::WhoAmI,
        ["get", path] => Command::Get { path: path.to_string() },
        [other, ..] => bail!("Unknown or incomplete command: {}", other),
    };
    Ok((command, ephemeral))
}

pub async fn run(store: &AuthStore, config: &mut Config, command: Command) -> Result<()> {
    match command {
        Command::Help => {
            println!("{}", USAGE);
        }
        Command::Login { email } => {
            let password = rpassword::prompt_password("Password: ").context("Failed to read password")?;
            store.login(&email, &password).await?;
            remember_email(config, &email);
            print_signed_in(store);
        }
        Command::Register { email, username, first_name, last_name } => {
            let password = rpassword::prompt_password("Choose a password: ")
                .context("Failed to read password")?;
            let data = RegisterData { email: email.clone(), password, username, first_name, last_name };
            store.register(&data).await?;
            remember_email(config, &email);
            print_signed_in(store);
        }
        Command::Logout => {
            store.load_user().await;
            store.logout().await;
            println!("Signed out");
        }
        Command::WhoAmI => {
            store.load_user().await;
            let state = store.state();
            match state.user {
                Some(ref user) if state.is_authenticated() => {
                    println!("{} <{}>", user.display_name(), user.email);
                }
                _ => {
                    if let Some(error) = state.error {
                        bail!("Not signed in: {}", error);
                    }
                    bail!("Not signed in");
                }
            }
        }
        Command::Get { path } => {
            store.load_user().await;
            if !store.is_authenticated() {
                warn!("No valid session, sending request unauthenticated");
            }
            let data: serde_json::Value = store.api().request(Method::GET, &path, None, None).await?;
            println!("{}", serde_json::to_string_pretty(&data)?);
        }
    }
    Ok(())
}

fn print_signed_in(store: &AuthStore) {
    if let Some(user) = store.state().user {
        println!("Signed in as {} <{}>", user.display_name(), user.email);
    }
}

fn remember_email(config: &mut Config, email: &str) {
    config.last_email = Some(email.to_string());
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_login() {
        let (cmd, ephemeral) = parse(&args(&["login", "a@b.com"])).unwrap();
        assert_eq!(cmd, Command::Login { email: "a@b.com".to_string() });
        assert!(!ephemeral);
    }

    #[test]
    fn test_parse_ephemeral_anywhere() {
        let (cmd, ephemeral) = parse(&args(&["whoami", "--ephemeral"])).unwrap();
        assert_eq!(cmd, Command::WhoAmI);
        assert!(ephemeral);
    }

    #[test]
    fn test_parse_register() {
        let (cmd, _) = parse(&args(&["register", "a@b.com", "ada", "Ada", "Byron"])).unwrap();
        assert!(matches!(cmd, Command::Register { ref username, .. } if username == "ada"));
    }

    #[test]
    fn test_parse_empty_is_help() {
        assert_eq!(parse(&[]).unwrap().0, Command::Help);
    }

    #[test]
    fn test_parse_rejects_incomplete() {
        assert!(parse(&args(&["login"])).is_err());
        assert!(parse(&args(&["frobnicate"])).is_err());
    }
}
