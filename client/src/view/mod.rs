//! Text views for the terminal.
//!
//! Pure functions from store snapshots to strings; the CLI prints them and
//! the tests compare them. Nothing here touches the network.

use serde::Serialize;

use crate::images::ImageState;
use crate::models::{Artist, ImageRecord};
use crate::status::{ErrorFlag, Snackbar, SnackbarKind, StatusState};
use crate::wallet::WalletState;

pub const GENERATE_LABEL: &str = "Generate Images";
pub const GENERATING_LABEL: &str = "Generating Images";
pub const CONNECT_LABEL: &str = "Connect";
pub const CONNECTED_LABEL: &str = "Connected";

/// State of the submit control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitControl {
    pub label: &'static str,
    pub disabled: bool,
}

impl SubmitControl {
    /// Disabled while a job is loading or no wallet is connected.
    pub fn from_state(status: &StatusState, wallet: &WalletState) -> Self {
        let loading = status.is_loading();
        Self {
            label: if loading { GENERATING_LABEL } else { GENERATE_LABEL },
            disabled: loading || !wallet.is_connected,
        }
    }
}

pub fn wallet_button_label(wallet: &WalletState) -> &'static str {
    if wallet.is_connected {
        CONNECTED_LABEL
    } else {
        CONNECT_LABEL
    }
}

/// Multi-line card for one artist.
pub fn render_artist_card(artist: &Artist) -> String {
    let mut out = format!("🎨 [{}] {}\n   Style: {}\n", artist.artist_id, artist.name, artist.style);
    if !artist.description.is_empty() {
        out.push_str(&format!("   {}\n", artist.description));
    }
    if !artist.portfolio.is_empty() {
        out.push_str(&format!("   Portfolio: {}\n", artist.portfolio));
    }
    if !artist.thumbnails.is_empty() {
        out.push_str(&format!("   Thumbnails: {}\n", artist.thumbnails.len()));
    }
    out
}

/// Status banner: loading line, error line and message, whichever apply.
pub fn render_status(status: &StatusState) -> String {
    let mut lines = Vec::new();

    if let Some(loading) = status.is_loading.as_deref().filter(|l| !l.is_empty()) {
        lines.push(format!("⏳ {}", loading));
    }
    match &status.is_error {
        ErrorFlag::Text(text) if !text.is_empty() => lines.push(format!("❌ {}", text)),
        ErrorFlag::Flag(true) => lines.push("❌ Error".to_string()),
        _ => {}
    }
    if status.is_message || status.is_error.is_set() {
        let message = &status.message;
        if !message.title.is_empty() {
            lines.push(format!("   {}", message.title));
        }
        if !message.description.is_empty() && message.description != message.title {
            lines.push(format!("   {}", message.description));
        }
        if let Some(link) = &message.link {
            lines.push(format!("   🔗 {}", link));
        }
    }

    lines.join("\n")
}

/// One line for a visible snackbar, `None` once closed.
pub fn render_snackbar(snackbar: &Snackbar) -> Option<String> {
    if !snackbar.open {
        return None;
    }
    let icon = match snackbar.kind {
        SnackbarKind::Success => "✅",
        SnackbarKind::Info => "ℹ️ ",
        SnackbarKind::Warning => "⚠️ ",
        SnackbarKind::Error => "❌",
    };
    Some(format!("{} {}", icon, snackbar.message))
}

/// Prompt line with the selected artist, if any.
pub fn render_prompt(state: &ImageState) -> String {
    match &state.artist {
        Some(artist) => format!("🎨 {} - \"{}\"", artist.name, state.prompt),
        None => format!("✏️  \"{}\"", state.prompt),
    }
}

/// One generated image and the file name it downloads to.
pub fn render_image_card(index: usize, url: &str, filename: &str) -> String {
    format!("🖼️  Image {}: {}\n   ⬇ {}.png", index + 1, url, filename)
}

pub fn render_image_record(record: &ImageRecord) -> String {
    let state = if record.is_cancelled {
        "cancelled"
    } else if record.is_complete {
        "complete"
    } else {
        "running"
    };
    format!(
        "🖼️  #{} [{}] artist {}: {}",
        record.id, state, record.artist, record.prompt
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatusMessage;

    fn connected() -> WalletState {
        WalletState {
            is_connected: true,
            accounts: vec!["0xaaa".into()],
        }
    }

    #[test]
    fn test_submit_control_disabled_while_loading() {
        let mut status = StatusState::default();
        let control = SubmitControl::from_state(&status, &connected());
        assert_eq!(control, SubmitControl { label: GENERATE_LABEL, disabled: false });

        status.is_loading = Some("Submitting".into());
        let control = SubmitControl::from_state(&status, &connected());
        assert_eq!(control.label, "Generating Images");
        assert!(control.disabled);
    }

    #[test]
    fn test_submit_control_needs_wallet() {
        let control = SubmitControl::from_state(&StatusState::default(), &WalletState::default());
        assert_eq!(control.label, "Generate Images");
        assert!(control.disabled);
    }

    #[test]
    fn test_wallet_button() {
        assert_eq!(wallet_button_label(&WalletState::default()), "Connect");
        assert_eq!(wallet_button_label(&connected()), "Connected");
    }

    #[test]
    fn test_render_status_with_link() {
        let status = StatusState {
            is_loading: Some("Waiting for block".into()),
            is_error: ErrorFlag::None,
            is_message: true,
            message: StatusMessage::new("Be patient", "Check Status in block explorer")
                .with_link("https://filfox.info/en/message/0x1"),
        };
        assert_eq!(
            render_status(&status),
            "⏳ Waiting for block\n   Be patient\n   Check Status in block explorer\n   🔗 https://filfox.info/en/message/0x1"
        );
    }

    #[test]
    fn test_render_error_does_not_repeat_text() {
        let status = StatusState {
            is_loading: None,
            is_error: ErrorFlag::Flag(true),
            is_message: false,
            message: StatusMessage::new("out of gas", "out of gas"),
        };
        assert_eq!(render_status(&status), "❌ Error\n   out of gas");
        assert_eq!(render_status(&StatusState::default()), "");
    }

    #[test]
    fn test_render_snackbar() {
        let mut snackbar = Snackbar {
            kind: SnackbarKind::Error,
            open: true,
            message: "rejected".into(),
        };
        assert_eq!(render_snackbar(&snackbar).as_deref(), Some("❌ rejected"));
        snackbar.open = false;
        assert!(render_snackbar(&snackbar).is_none());
    }

    #[test]
    fn test_render_artist_card() {
        let artist = Artist {
            artist_id: "1".into(),
            name: "Vincent van Gogh".into(),
            style: "Post-Impressionism".into(),
            description: String::new(),
            portfolio: "https://example.org/vangogh".into(),
            thumbnails: vec![],
        };
        let card = render_artist_card(&artist);
        assert!(card.starts_with("🎨 [1] Vincent van Gogh\n"));
        assert!(card.contains("Portfolio: https://example.org/vangogh"));
        assert!(!card.contains("Thumbnails"));
    }

    #[test]
    fn test_render_prompt_and_image_card() {
        let mut state = ImageState {
            prompt: "a cat".into(),
            ..ImageState::default()
        };
        assert_eq!(render_prompt(&state), "✏️  \"a cat\"");

        state.artist = Some(Artist {
            artist_id: "0".into(),
            name: "Claude Monet".into(),
            style: "Impressionism".into(),
            description: String::new(),
            portfolio: String::new(),
            thumbnails: vec![],
        });
        assert_eq!(render_prompt(&state), "🎨 Claude Monet - \"a cat\"");

        assert_eq!(
            render_image_card(0, "https://x/1/image_0.png", "acat-Image_0"),
            "🖼️  Image 1: https://x/1/image_0.png\n   ⬇ acat-Image_0.png"
        );
    }
}
