use std::fmt;
use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use atty::Stream;
use serde_json::json;
use tracing::debug;

use crate::{CommandContext, UserError};

use super::plan::{PublishRegistry, PublishRequest};

const TOKEN_USERNAME: &str = "__token__";

/// Username/password pairs checked after the token, in order.
const PASSWORD_ENV_PAIRS: [(&str, &str); 2] = [
    ("PYSHIP_USERNAME", "PYSHIP_PASSWORD"),
    ("TWINE_USERNAME", "TWINE_PASSWORD"),
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum CredentialSource {
    Token(String),
    Env(&'static str),
    Prompt,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Token(var) => write!(f, "token from {var}"),
            CredentialSource::Env(var) => write!(f, "{var}"),
            CredentialSource::Prompt => f.write_str("prompt"),
        }
    }
}

#[derive(Clone)]
pub(crate) struct Credentials {
    pub(crate) username: String,
    pub(crate) password: String,
    pub(crate) source: CredentialSource,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

/// Interactive input used when no stored credentials exist.
pub(crate) trait Prompter {
    fn is_interactive(&self) -> bool;
    fn prompt(&self, label: &str) -> Result<String>;
}

pub(crate) struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn is_interactive(&self) -> bool {
        atty::is(Stream::Stdin) && atty::is(Stream::Stderr)
    }

    fn prompt(&self, label: &str) -> Result<String> {
        eprint!("{label}: ");
        io::stderr().flush().ok();
        let mut answer = String::new();
        io::stdin()
            .lock()
            .read_line(&mut answer)
            .context("reading credentials from stdin")?;
        Ok(answer.trim_end_matches(['\r', '\n']).to_string())
    }
}

/// Picks upload credentials: token, then username/password variables, then an
/// interactive prompt.
pub(crate) fn resolve_credentials(
    ctx: &CommandContext,
    request: &PublishRequest,
    registry: &PublishRegistry,
    prompter: &dyn Prompter,
) -> Result<Credentials> {
    let explicit_token_env = request
        .token_env
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());
    let token_env = explicit_token_env.unwrap_or(ctx.config().publish().default_token_env);
    if let Some(token) = ctx.env_var(token_env) {
        debug!(source = token_env, "using upload token");
        return Ok(Credentials {
            username: TOKEN_USERNAME.to_string(),
            password: token.to_string(),
            source: CredentialSource::Token(token_env.to_string()),
        });
    }
    if explicit_token_env.is_some() {
        let state = if ctx.env_contains(token_env) {
            "is empty"
        } else {
            "must be set"
        };
        return Err(UserError::new(
            format!("{token_env} {state}"),
            json!({
                "reason": "missing_token",
                "registry": registry.label,
                "token_env": token_env,
                "hint": format!("export {token_env}=<token> before publishing"),
            }),
        )
        .into());
    }

    for (user_var, password_var) in PASSWORD_ENV_PAIRS {
        if let (Some(username), Some(password)) = (ctx.env_var(user_var), ctx.env_var(password_var))
        {
            debug!(source = user_var, "using username/password from environment");
            return Ok(Credentials {
                username: username.to_string(),
                password: password.to_string(),
                source: CredentialSource::Env(user_var),
            });
        }
    }

    if !request.no_input && prompter.is_interactive() {
        eprintln!("Enter credentials for {}", registry.label);
        let username = prompter.prompt("Username")?;
        let password = prompter.prompt("Password")?;
        if !username.trim().is_empty() && !password.is_empty() {
            return Ok(Credentials {
                username: username.trim().to_string(),
                password,
                source: CredentialSource::Prompt,
            });
        }
    }

    Err(UserError::new(
        format!("credentials required to upload to {}", registry.label),
        json!({
            "reason": "missing_credentials",
            "registry": registry.label,
            "token_env": token_env,
            "hint": format!(
                "export {token_env}=<token>, or PYSHIP_USERNAME and PYSHIP_PASSWORD, before publishing"
            ),
        }),
    )
    .into())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::config::context::testing::context_for;
    use crate::GlobalOptions;

    struct ScriptedPrompter {
        interactive: bool,
        answers: RefCell<Vec<&'static str>>,
    }

    impl ScriptedPrompter {
        fn new(interactive: bool, answers: &[&'static str]) -> Self {
            let mut answers = answers.to_vec();
            answers.reverse();
            Self {
                interactive,
                answers: RefCell::new(answers),
            }
        }
    }

    impl Prompter for ScriptedPrompter {
        fn is_interactive(&self) -> bool {
            self.interactive
        }

        fn prompt(&self, _label: &str) -> Result<String> {
            Ok(self
                .answers
                .borrow_mut()
                .pop()
                .unwrap_or_default()
                .to_string())
        }
    }

    fn request(token_env: Option<&str>, no_input: bool) -> PublishRequest {
        PublishRequest {
            registry: None,
            token_env: token_env.map(ToString::to_string),
            dry_run: false,
            no_input,
        }
    }

    fn registry() -> PublishRegistry {
        PublishRegistry {
            label: "pypi".into(),
            url: "https://upload.pypi.org/legacy/".into(),
        }
    }

    fn resolve(
        env: &[(&str, &str)],
        request: &PublishRequest,
        prompter: &dyn Prompter,
    ) -> Result<Credentials> {
        let temp = tempfile::tempdir().unwrap();
        let mut global = GlobalOptions::default();
        let ctx = context_for(&mut global, temp.path(), env);
        resolve_credentials(&ctx, request, &registry(), prompter)
    }

    #[test]
    fn token_wins_over_passwords() {
        let prompter = ScriptedPrompter::new(false, &[]);
        let creds = resolve(
            &[
                ("PYSHIP_TOKEN", "pypi-abc"),
                ("PYSHIP_USERNAME", "alice"),
                ("PYSHIP_PASSWORD", "pw"),
            ],
            &request(None, true),
            &prompter,
        )
        .unwrap();
        assert_eq!(creds.username, "__token__");
        assert_eq!(creds.password, "pypi-abc");
        assert_eq!(creds.source, CredentialSource::Token("PYSHIP_TOKEN".into()));
        assert!(!format!("{creds:?}").contains("pypi-abc"));
    }

    #[test]
    fn twine_variables_are_a_fallback() {
        let prompter = ScriptedPrompter::new(false, &[]);
        let creds = resolve(
            &[("TWINE_USERNAME", "bob"), ("TWINE_PASSWORD", "secret")],
            &request(None, true),
            &prompter,
        )
        .unwrap();
        assert_eq!(creds.username, "bob");
        assert_eq!(creds.source, CredentialSource::Env("TWINE_USERNAME"));
    }

    #[test]
    fn explicit_token_env_must_be_set() {
        let prompter = ScriptedPrompter::new(true, &["alice", "pw"]);
        let err = resolve(
            &[("PYSHIP_TOKEN", "ignored")],
            &request(Some("CI_PYPI_TOKEN"), false),
            &prompter,
        )
        .expect_err("explicit token missing");
        let user = err.downcast_ref::<UserError>().unwrap();
        assert_eq!(user.message(), "CI_PYPI_TOKEN must be set");
    }

    #[test]
    fn prompts_only_when_interactive_and_allowed() {
        let prompter = ScriptedPrompter::new(true, &["alice", "pw"]);
        let creds = resolve(&[], &request(None, false), &prompter).unwrap();
        assert_eq!(creds.source, CredentialSource::Prompt);
        assert_eq!(creds.username, "alice");

        let prompter = ScriptedPrompter::new(true, &["alice", "pw"]);
        let err = resolve(&[], &request(None, true), &prompter).expect_err("no-input");
        let user = err.downcast_ref::<UserError>().unwrap();
        assert_eq!(user.details()["reason"], "missing_credentials");

        let prompter = ScriptedPrompter::new(false, &["alice", "pw"]);
        assert!(resolve(&[], &request(None, false), &prompter).is_err());
    }
}
