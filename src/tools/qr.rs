use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Command, CommandFactory, Parser, Subcommand};
use csscolorparser::Color;
use image::Rgba;
use serde_json::json;
use tracing::info;

use crate::args::StringInput;
use crate::compose::{self, QrStyle};
use crate::error::Error;
use crate::link::{self, LinkMode, NormalizedLink};
use crate::logo::{Logo, MAX_LOGO_BYTES};
use crate::tool::{Output, Tool};

#[derive(Parser, Debug)]
#[command(
    name = "qr",
    about = "Generate a QR code PNG for a share link or website URL"
)]
pub struct QrTool {
    #[command(subcommand)]
    command: QrCommand,
}

#[derive(Subcommand, Debug)]
enum QrCommand {
    /// Encode the direct-download form of a Google Drive share link
    Drive {
        /// The share link, or "-" to read it from stdin
        link: StringInput,

        #[command(flatten)]
        render: RenderArgs,
    },
    /// Encode a website URL exactly as given
    Website {
        /// The URL, or "-" to read it from stdin
        link: StringInput,

        #[command(flatten)]
        render: RenderArgs,
    },
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Foreground color as a CSS color; the background stays white
    #[arg(long, default_value = "#000000")]
    color: String,

    /// PNG, JPEG, GIF or SVG file to clip into the center of the code
    #[arg(long)]
    logo: Option<PathBuf>,

    /// Save the PNG to a file instead of writing it to stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print a JSON summary with a data URL instead of raw PNG bytes
    #[arg(long, conflicts_with = "output")]
    data_url: bool,
}

impl Tool for QrTool {
    fn cli() -> Command {
        QrTool::command()
    }

    fn execute(&self) -> anyhow::Result<Option<Output>> {
        let (mode, raw, render) = match &self.command {
            QrCommand::Drive { link, render } => (LinkMode::Drive, link, render),
            QrCommand::Website { link, render } => (LinkMode::Website, link, render),
        };

        let normalized = link::normalize(mode, raw.as_ref())?;
        let style = render.style()?;

        let image = compose::compose(&normalized.url, &style)?;
        let png = compose::encode_png(&image)?;

        if let Some(path) = &render.output {
            fs::write(path, &png)
                .with_context(|| format!("Could not write {}", path.display()))?;
            info!(path = %path.display(), "wrote QR code");

            return Ok(Some(Output::JsonValue(summary(
                &normalized,
                json!({ "output": path.display().to_string() }),
            ))));
        }

        if render.data_url {
            return Ok(Some(Output::JsonValue(summary(
                &normalized,
                json!({
                    "filename": mode.suggested_filename(),
                    "data_url": compose::png_data_url(&png),
                }),
            ))));
        }

        Ok(Some(Output::Bytes(png)))
    }
}

/// The normalization summary every JSON response carries, merged with the
/// fields specific to the output mode.
fn summary(normalized: &NormalizedLink, extra: serde_json::Value) -> serde_json::Value {
    let mut value = json!({
        "direct_link": normalized.url,
        "kind": normalized.kind.as_str(),
        "action": normalized.kind.action(),
    });

    if let (Some(base), Some(extra)) = (value.as_object_mut(), extra.as_object()) {
        for (key, field) in extra {
            base.insert(key.clone(), field.clone());
        }
    }

    value
}

impl RenderArgs {
    fn style(&self) -> anyhow::Result<QrStyle> {
        let color = self
            .color
            .parse::<Color>()
            .with_context(|| format!("Could not parse foreground color {:?}", self.color))?;
        let [r, g, b, _] = color.to_rgba8();

        let logo = match &self.logo {
            Some(path) => load_logo(path)?,
            None => Logo::Mark,
        };

        Ok(QrStyle {
            foreground: Rgba([r, g, b, 255]),
            logo,
        })
    }
}

/// Read caller artwork, checking the size cap against the file metadata
/// before pulling the contents into memory.
fn load_logo(path: &Path) -> anyhow::Result<Logo> {
    let metadata =
        fs::metadata(path).with_context(|| format!("Could not stat {}", path.display()))?;
    if metadata.len() >= MAX_LOGO_BYTES as u64 {
        return Err(Error::LogoTooLarge {
            size: metadata.len() as usize,
        }
        .into());
    }

    let bytes =
        fs::read(path).with_context(|| format!("Could not read {}", path.display()))?;
    Ok(Logo::custom(bytes)?)
}
