use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serenity::all::{CreateEmbed, CreateEmbedAuthor, CreateEmbedFooter};
use thiserror::Error;

use crate::schedule::ScheduleError;
use crate::state::{BotState, TeamError};
use crate::storage::StorageError;

mod get;
mod help;
mod reminders;
mod set;
mod team;
mod update;

pub const PREFIX: &str = "!";

const EMBED_COLOUR: u32 = 0x2ecc71;
const THUMBNAIL: &str = "https://www.gstatic.com/images/branding/product/2x/sheets_48dp.png";

pub struct CommandInfo {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub summary: &'static str,
    pub examples: &'static [(&'static str, &'static str)],
}

pub const COMMANDS: &[CommandInfo] = &[
    CommandInfo {
        name: "help",
        aliases: &[],
        summary: "List the commands, or explain one.",
        examples: &[("!help", "List every command."), ("!help set", "Explain !set.")],
    },
    CommandInfo {
        name: "get",
        aliases: &[],
        summary: "Get information from the configured spreadsheet.",
        examples: &[
            ("!get week", "Show the schedule for this week."),
            ("!get today", "Show who is available today."),
            ("!get unscheduled", "Show scrim blocks nobody has claimed yet."),
        ],
    },
    CommandInfo {
        name: "update",
        aliases: &[],
        summary: "Reload the spreadsheet if it changed.",
        examples: &[("!update", "Update the sheet. :)")],
    },
    CommandInfo {
        name: "set",
        aliases: &[],
        summary: "Update cells on the spreadsheet.",
        examples: &[
            ("!set <day> [<time range>] <activities>", "Update the week schedule."),
            ("!set <player> <day> [<time range>] <responses>", "Update player availability."),
            ("!set monday 4-6 scrim", "Set the 4-6 block on Monday to Scrim."),
            ("!set tydra monday 4-8 no, yes", "Give one response per block with commas."),
            ("!set monday free", "One value over a range sets every block to it."),
        ],
    },
    CommandInfo {
        name: "set_note",
        aliases: &[],
        summary: "Add notes on the week schedule.",
        examples: &[
            ("!set_note monday 4-6 Inked", "Block out the 4-6 scrim for Inked."),
            ("!set_note monday 4-6 none", "Clear the note."),
        ],
    },
    CommandInfo {
        name: "save",
        aliases: &[],
        summary: "Save the week schedule as the default.",
        examples: &[("!save", "Remember this week's activities for !reset.")],
    },
    CommandInfo {
        name: "reset",
        aliases: &[],
        summary: "Reset the week schedule on the sheet to the default.",
        examples: &[("!reset", "Load the week saved with !save.")],
    },
    CommandInfo {
        name: "add_team",
        aliases: &[],
        summary: "Add a team to the server.",
        examples: &[("!add_team Academy #academy", "Add a team that lives in #academy.")],
    },
    CommandInfo {
        name: "add_channel",
        aliases: &["add_channels"],
        summary: "Add one or more channels to a team.",
        examples: &[("!add_channel #scrims #vods", "Answer for this team in both channels.")],
    },
    CommandInfo {
        name: "set_sheet",
        aliases: &[],
        summary: "Set the spreadsheet of this team.",
        examples: &[
            ("!set_sheet <spreadsheet id>", "Track a spreadsheet."),
            ("!set_sheet <spreadsheet id> 10", "Track it, checking for changes every 10 minutes."),
        ],
    },
    CommandInfo {
        name: "reminders",
        aliases: &[],
        summary: "Get reminder config for this team.",
        examples: &[("!reminders", "Show the reminder config for this team.")],
    },
    CommandInfo {
        name: "reminders_set",
        aliases: &[],
        summary: "Update reminder config.",
        examples: &[
            ("!reminders_set activities Scrim", "Only remind about scrims."),
            ("!reminders_set channel #announcements", "Send reminders to #announcements."),
            ("!reminders_set role 123456789", "Mention this role in reminders."),
        ],
    },
    CommandInfo {
        name: "reminders_add",
        aliases: &[],
        summary: "Add an item to a field in the reminder config.",
        examples: &[
            ("!reminders_add activities Scrim", "Add \"Scrim\" to the activities list."),
            ("!reminders_add intervals 5", "Also remind 5 minutes before."),
        ],
    },
    CommandInfo {
        name: "reminders_del",
        aliases: &[],
        summary: "Remove an item from a field in the reminder config.",
        examples: &[("!reminders_del activities Scrim", "Remove \"Scrim\" from the activities list.")],
    },
];

pub fn lookup(name: &str) -> Option<&'static CommandInfo> {
    let name = name.to_lowercase();

    COMMANDS
        .iter()
        .find(|command| command.name == name || command.aliases.iter().any(|alias| *alias == name))
}

/// Where a command was sent from.
#[derive(Clone, Copy, Debug)]
pub struct Invocation {
    pub guild_id: Option<u64>,
    pub channel_id: u64,
}

impl Invocation {
    pub fn guild(&self) -> Result<u64, CommandError> {
        self.guild_id.ok_or(CommandError::Team(TeamError::NoTeam))
    }
}

/// A Discord embed, kept as plain data until it is sent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EmbedView {
    pub title: String,
    pub link: Option<String>,
    pub footer: Option<String>,
    pub fields: Vec<(String, String, bool)>,
}

impl EmbedView {
    pub fn build(self) -> CreateEmbed {
        let mut author = CreateEmbedAuthor::new(self.title);
        if let Some(link) = self.link {
            author = author.url(link);
        }

        let mut embed = CreateEmbed::new()
            .colour(EMBED_COLOUR)
            .thumbnail(THUMBNAIL)
            .author(author)
            .fields(self.fields);
        if let Some(footer) = self.footer {
            embed = embed.footer(CreateEmbedFooter::new(footer));
        }
        embed
    }
}

pub type Followup = Pin<Box<dyn Future<Output = String> + Send>>;

pub enum Reply {
    Text(String),
    Embed(EmbedView),
    /// Sent right away, then edited to the outcome once it is known.
    Progress { message: String, outcome: Followup },
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Reply::Embed(embed) => f.debug_tuple("Embed").field(embed).finish(),
            Reply::Progress { message, .. } => f
                .debug_struct("Progress")
                .field("message", message)
                .finish_non_exhaustive(),
        }
    }
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Reply::Text(text.into())
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Team(#[from] TeamError),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl CommandError {
    /// Missing configuration or bad input; answered, not logged as a fault.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            CommandError::Team(TeamError::NoTeam | TeamError::NoSpreadsheet | TeamError::Rejected(_))
        )
    }

    pub fn user_message(&self) -> String {
        match self {
            CommandError::Team(TeamError::Storage(_)) | CommandError::Storage(_) => {
                "Error saving, try again later. :(".to_string()
            }
            CommandError::Team(e) => e.to_string(),
            CommandError::Schedule(ScheduleError::AlreadyUpdating) => "Already updating.".to_string(),
            CommandError::Schedule(ScheduleError::Storage(_)) => {
                "Updated the sheet, but saving a copy failed.".to_string()
            }
            CommandError::Schedule(_) => "Error updating the spreadsheet. :(".to_string(),
        }
    }
}

/// `<#123>` to `123`.
pub fn parse_channel_mention(mention: &str) -> Option<u64> {
    mention
        .strip_prefix("<#")?
        .strip_suffix('>')?
        .parse()
        .ok()
}

/// Run the command in a message, if it holds one.
pub async fn dispatch(
    bot: &BotState,
    at: &Invocation,
    content: &str,
) -> Option<Result<Reply, CommandError>> {
    let content = content.strip_prefix(PREFIX)?;
    let words: Vec<&str> = content.split_whitespace().collect();
    let (name, args) = words.split_first()?;
    let command = lookup(name)?;

    Some(match command.name {
        "help" => Ok(help::run(args)),
        "get" => get::run(bot, at, args).await,
        "update" => update::run(bot, at).await,
        "set" => set::set(bot, at, args).await,
        "set_note" => set::set_note(bot, at, args).await,
        "save" => set::save(bot, at).await,
        "reset" => set::reset(bot, at).await,
        "add_team" => team::add_team(bot, at, args).await,
        "add_channel" => team::add_channel(bot, at, args).await,
        "set_sheet" => team::set_sheet(bot, at, args).await,
        "reminders" => reminders::show(bot, at).await,
        "reminders_set" => reminders::set(bot, at, args).await,
        "reminders_add" => reminders::add(bot, at, args).await,
        "reminders_del" => reminders::del(bot, at, args).await,
        _ => Ok(Reply::text(format!("No command named {:?}", name))),
    })
}
