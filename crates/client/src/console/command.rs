use parlor_api::ConversationId;
use snafu::{Snafu, ensure};

/// One line of console input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { username: String, password: String },
    Register {
        username: String,
        password: String,
        confirm_password: String,
    },
    Logout,
    List,
    Open(ConversationId),
    New,
    Create(Option<String>),
    Rename { id: ConversationId, title: String },
    Chat,
    Admin,
    Filter(String),
    Dismiss,
    Reload,
    /// Switch to another chat server and remember it.
    Server(String),
    Help,
    Quit,
    Send(String),
}

#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum CommandError {
    #[snafu(display("usage: {usage}"))]
    Usage {
        stage: &'static str,
        usage: &'static str,
    },
    #[snafu(display("unknown command `/{name}`, type /help for the list"))]
    Unknown { stage: &'static str, name: String },
}

pub const HELP_TEXT: &str = "\
/login <user> <password>            sign in
/register <user> <password> <again> create an account
/logout                             sign out
/list                               reload the conversation list
/open <id>                          switch to a conversation
/new                                start an unsaved chat
/create [title]                     create an empty conversation
/rename <id> <title>                rename a conversation
/chat, /admin                       switch view
/filter [level]                     filter admin logs (empty for all)
/dismiss                            hide the banner
/reload                             re-sync with the server
/server <url>                       switch to another server and save it
/quit                               exit
anything else is sent as a message";

impl Command {
    /// Parses a line; blank input yields `None`.
    pub fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let Some(body) = line.strip_prefix('/') else {
            return Ok(Some(Self::Send(line.to_string())));
        };

        let (name, rest) = match body.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (body, ""),
        };
        let args: Vec<&str> = rest.split_whitespace().collect();

        let command = match name {
            "login" => {
                ensure!(
                    args.len() == 2,
                    UsageSnafu {
                        stage: "parse-login",
                        usage: "/login <user> <password>",
                    }
                );
                Self::Login {
                    username: args[0].to_string(),
                    password: args[1].to_string(),
                }
            }
            "register" => {
                ensure!(
                    args.len() == 3,
                    UsageSnafu {
                        stage: "parse-register",
                        usage: "/register <user> <password> <password again>",
                    }
                );
                Self::Register {
                    username: args[0].to_string(),
                    password: args[1].to_string(),
                    confirm_password: args[2].to_string(),
                }
            }
            "logout" => Self::Logout,
            "list" => Self::List,
            "open" => {
                ensure!(
                    args.len() == 1,
                    UsageSnafu {
                        stage: "parse-open",
                        usage: "/open <id>",
                    }
                );
                Self::Open(ConversationId::from(args[0]))
            }
            "new" => Self::New,
            "create" => Self::Create((!rest.is_empty()).then(|| rest.to_string())),
            "rename" => {
                let (id, title) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
                ensure!(
                    !id.is_empty(),
                    UsageSnafu {
                        stage: "parse-rename",
                        usage: "/rename <id> <title>",
                    }
                );
                Self::Rename {
                    id: ConversationId::from(id),
                    title: title.trim().to_string(),
                }
            }
            "chat" => Self::Chat,
            "admin" => Self::Admin,
            "filter" => Self::Filter(rest.to_string()),
            "dismiss" => Self::Dismiss,
            "reload" => Self::Reload,
            "server" => {
                ensure!(
                    args.len() == 1,
                    UsageSnafu {
                        stage: "parse-server",
                        usage: "/server <url>",
                    }
                );
                Self::Server(args[0].to_string())
            }
            "help" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => {
                return UnknownSnafu {
                    stage: "parse-command",
                    name: other.to_string(),
                }
                .fail();
            }
        };

        Ok(Some(command))
    }
}
