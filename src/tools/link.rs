use clap::{Command, CommandFactory, Parser, Subcommand};
use serde_json::json;

use crate::args::StringInput;
use crate::link::{self, LinkMode};
use crate::tool::{Output, Tool};

#[derive(Parser, Debug)]
#[command(
    name = "link",
    about = "Rewrite share links into their direct-access form"
)]
pub struct LinkTool {
    #[command(subcommand)]
    command: LinkCommand,
}

#[derive(Subcommand, Debug)]
enum LinkCommand {
    /// Rewrite a Google Drive, Docs, Sheets or Slides share link
    Drive {
        /// The share link, or "-" to read it from stdin
        link: StringInput,
    },
    /// Validate a website URL without rewriting it
    Website {
        /// The URL, or "-" to read it from stdin
        link: StringInput,
    },
}

impl Tool for LinkTool {
    fn cli() -> Command {
        LinkTool::command()
    }

    fn execute(&self) -> anyhow::Result<Option<Output>> {
        let (mode, raw) = match &self.command {
            LinkCommand::Drive { link } => (LinkMode::Drive, link),
            LinkCommand::Website { link } => (LinkMode::Website, link),
        };

        let normalized = link::normalize(mode, raw.as_ref())?;

        Ok(Some(Output::JsonValue(json!({
            "direct_link": normalized.url,
            "kind": normalized.kind.as_str(),
            "action": normalized.kind.action(),
        }))))
    }
}
