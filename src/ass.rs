//! Advanced SubStation Alpha (`.ass`) output with karaoke tags.

use crate::captions::CaptionCue;
use crate::karaoke::{karaoke_spans, karaoke_text};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// The single style every dialogue line uses.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleStyle {
    pub name: String,
    pub font: String,
    pub font_size: u32,
    pub primary_colour: String,
    pub outline_colour: String,
    pub back_colour: String,
    pub bold: bool,
    pub border_style: u32,
    pub outline: u32,
    pub shadow: u32,
    /// Numpad-style alignment; 5 is middle-center.
    pub alignment: u32,
    pub margin_l: u32,
    pub margin_r: u32,
    pub margin_v: u32,
    pub play_res_x: u32,
    pub play_res_y: u32,
}

impl Default for SubtitleStyle {
    fn default() -> Self {
        Self {
            name: "Burst".to_string(),
            font: "Futura".to_string(),
            font_size: 96,
            primary_colour: "&H00FF99FF".to_string(),
            outline_colour: "&H00000000".to_string(),
            back_colour: "&H64000000".to_string(),
            bold: true,
            border_style: 1,
            outline: 4,
            shadow: 0,
            alignment: 5,
            margin_l: 30,
            margin_r: 30,
            margin_v: 200,
            play_res_x: 1920,
            play_res_y: 1080,
        }
    }
}

/// `H:MM:SS.CC`, truncating (never rounding) to the centisecond.
pub fn format_ass_time(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    let whole = seconds.trunc() as u64;
    let hours = whole / 3600;
    let minutes = (whole % 3600) / 60;
    let secs = whole % 60;
    let centis = ((seconds - seconds.trunc()) * 100.0) as u64;
    format!("{}:{:02}:{:02}.{:02}", hours, minutes, secs, centis)
}

fn header(style: &SubtitleStyle) -> String {
    // ASS encodes booleans as -1 / 0.
    let bold = if style.bold { -1 } else { 0 };
    format!(
        "[Script Info]
ScriptType: v4.00+
PlayResX: {res_x}
PlayResY: {res_y}

[V4+ Styles]
Format: Name, Fontname, Fontsize, PrimaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding
Style: {name},{font},{size},{primary},{outline_colour},{back},{bold},0,0,0,100,100,0,0,{border},{outline},{shadow},{align},{ml},{mr},{mv},1

[Events]
Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text
",
        res_x = style.play_res_x,
        res_y = style.play_res_y,
        name = style.name,
        font = style.font,
        size = style.font_size,
        primary = style.primary_colour,
        outline_colour = style.outline_colour,
        back = style.back_colour,
        bold = bold,
        border = style.border_style,
        outline = style.outline,
        shadow = style.shadow,
        align = style.alignment,
        ml = style.margin_l,
        mr = style.margin_r,
        mv = style.margin_v,
    )
}

/// Builds the whole document: header, then one `Dialogue` line per cue.
pub fn render_document(cues: &[CaptionCue], style: &SubtitleStyle) -> String {
    let mut doc = header(style);
    for cue in cues {
        let text = karaoke_text(&karaoke_spans(cue));
        debug!("Cue {}: {:.2}-{:.2} {}", cue.index, cue.start, cue.end, text);
        doc.push_str(&format!(
            "Dialogue: 0,{},{},{},,0,0,0,,{}\n",
            format_ass_time(cue.start),
            format_ass_time(cue.end),
            style.name,
            text
        ));
    }
    doc
}

pub fn write_document(path: &Path, cues: &[CaptionCue], style: &SubtitleStyle) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, render_document(cues, style))?;
    info!("Wrote {} subtitle lines to {}", cues.len(), path.display());
    Ok(())
}
